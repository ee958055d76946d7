use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure of any updater stage.
///
/// The error is `Clone` so the same value can be delivered to error
/// listeners and returned to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdaterError {
    #[error("Network error during {operation}: {details}")]
    Network {
        operation: &'static str,
        details: String,
        timed_out: bool,
    },

    #[error("Server returned HTTP {status}{body_snippet}")]
    Server {
        status: u16,
        body_snippet: String,
    },

    #[error("Invalid response from server: {details}")]
    Protocol { details: String },

    #[error("{0}")]
    InvalidState(String),

    #[error("Downloaded file failed integrity check: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("Installer not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("{context} ({kind}): {message}")]
    Io {
        context: &'static str,
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Invalid updater configuration: {0}")]
    InvalidConfig(String),

    #[error("{operation} was cancelled")]
    Cancelled { operation: &'static str },
}

impl UpdaterError {
    pub(crate) fn network(operation: &'static str, error: &reqwest::Error) -> Self {
        Self::Network {
            operation,
            details: error.to_string(),
            timed_out: error.is_timeout(),
        }
    }

    pub(crate) fn protocol(details: impl Into<String>) -> Self {
        Self::Protocol {
            details: details.into(),
        }
    }

    pub(crate) fn io_with_path(context: &'static str, path: &Path, error: &std::io::Error) -> Self {
        Self::Io {
            context,
            kind: error.kind(),
            message: format!("{}: {error}", path.display()),
        }
    }

    pub(crate) fn server(status: reqwest::StatusCode, body: Option<&str>) -> Self {
        Self::Server {
            status: status.as_u16(),
            body_snippet: body.map(response_snippet).unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network { timed_out: true, .. })
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

const BODY_SNIPPET_CHARS: usize = 160;

fn response_snippet(body: &str) -> String {
    let snippet: String = body.trim().chars().take(BODY_SNIPPET_CHARS).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

#[cfg(test)]
mod tests {
    use super::UpdaterError;

    #[test]
    fn server_error_includes_trimmed_body_snippet() {
        let error = UpdaterError::server(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            Some("  boom  \n"),
        );

        assert_eq!(error.to_string(), "Server returned HTTP 500: boom");
        assert!(matches!(error, UpdaterError::Server { status: 500, .. }));
    }

    #[test]
    fn server_error_without_body_has_no_suffix() {
        let error = UpdaterError::server(reqwest::StatusCode::NOT_FOUND, Some(""));
        assert_eq!(error.to_string(), "Server returned HTTP 404");
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(500);
        let UpdaterError::Server { body_snippet, .. } =
            UpdaterError::server(reqwest::StatusCode::BAD_GATEWAY, Some(&body))
        else {
            panic!("expected server error");
        };
        assert_eq!(body_snippet.len(), 2 + 160);
    }

    #[test]
    fn io_error_conversion_keeps_kind_and_path() {
        let error = UpdaterError::io_with_path(
            "failed to open installer",
            std::path::Path::new("/tmp/setup.exe"),
            &std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );

        assert!(matches!(
            error,
            UpdaterError::Io { kind: std::io::ErrorKind::PermissionDenied, ref message, .. }
                if message.contains("/tmp/setup.exe")
        ));
    }

    #[test]
    fn cancelled_and_timeout_predicates() {
        assert!(UpdaterError::Cancelled { operation: "update check" }.is_cancelled());
        assert!(
            UpdaterError::Network {
                operation: "download",
                details: "timed out".to_string(),
                timed_out: true,
            }
            .is_timeout()
        );
        assert!(!UpdaterError::InvalidState("x".to_string()).is_timeout());
    }
}
