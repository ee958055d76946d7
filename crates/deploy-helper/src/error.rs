use deploy_helper_core::UpdaterError;
use thiserror::Error;

use crate::settings::SettingsError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Updater(#[from] UpdaterError),

    #[error("Failed to read your answer: {0}")]
    Prompt(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CliError {
    /// Follow-up advice printed under the error message, if any.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Updater(UpdaterError::Network { .. }) => {
                Some("Could not reach the update server. Check that it is running.")
            }
            Self::Updater(UpdaterError::InvalidConfig(_)) => Some(
                "Set the value in settings.json or pass it on the command line (see --help).",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use deploy_helper_core::UpdaterError;

    use super::CliError;

    #[test]
    fn network_failures_suggest_checking_the_server() {
        let error = CliError::from(UpdaterError::Network {
            operation: "update check",
            details: "connection refused".to_string(),
            timed_out: false,
        });
        assert!(error.hint().is_some_and(|hint| hint.contains("update server")));
    }

    #[test]
    fn updater_errors_display_unchanged() {
        let inner = UpdaterError::Cancelled {
            operation: "update download",
        };
        let error = CliError::from(inner.clone());

        assert_eq!(error.to_string(), inner.to_string());
        assert!(error.hint().is_none());
    }
}
