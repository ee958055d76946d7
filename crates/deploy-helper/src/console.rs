use std::fmt::Write as _;
use std::io::{self, BufRead, Write};

use deploy_helper_core::{DownloadProgress, UpdateInfo};

pub fn describe_update(info: &UpdateInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Current version: v{}", info.current_version);
    let _ = writeln!(
        out,
        "Latest version:  {}",
        info.latest_version
            .as_deref()
            .map_or_else(|| "unknown".to_string(), |version| format!("v{version}"))
    );
    let _ = writeln!(
        out,
        "Update available: {}",
        if info.update_available { "yes" } else { "no" }
    );

    if info.update_available {
        if info.is_mandatory {
            let _ = writeln!(out, "This update is mandatory.");
        }
        if let Some(size) = info.file_size {
            let _ = writeln!(out, "Download size: {}", format_bytes(size));
        }
        let notes = info
            .release_notes
            .as_deref()
            .map(str::trim)
            .filter(|notes| !notes.is_empty())
            .unwrap_or("none");
        let _ = write!(out, "\nRelease notes:\n{notes}\n");
    }
    out
}

pub fn format_progress(progress: &DownloadProgress) -> String {
    match progress.percentage() {
        Some(percentage) => format!(
            "Downloading... {percentage:5.1}% ({} / {})",
            format_bytes(progress.bytes_received),
            format_bytes(progress.total_bytes)
        ),
        None => format!("Downloading... {}", format_bytes(progress.bytes_received)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Redraw the progress line in place.
pub fn print_progress(progress: &DownloadProgress) {
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "\r{}", format_progress(progress));
    let _ = stdout.flush();
}

/// Ask a yes/no question; anything other than `y` or `yes` means no.
///
/// # Errors
/// Returns an error when the prompt cannot be written or the answer read.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    write!(output, "{question} (y/n): ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use deploy_helper_core::{DownloadProgress, UpdateInfo};

    use super::{confirm, describe_update, format_bytes, format_progress};

    #[test]
    fn describes_available_update_with_notes() {
        let info = UpdateInfo {
            update_available: true,
            current_version: "1.0.0".to_string(),
            latest_version: Some("1.2.0".to_string()),
            is_mandatory: true,
            release_notes: Some("Bug fixes".to_string()),
            file_size: Some(2 * 1024 * 1024),
            ..UpdateInfo::default()
        };

        let text = describe_update(&info);

        assert!(text.contains("Current version: v1.0.0"));
        assert!(text.contains("Latest version:  v1.2.0"));
        assert!(text.contains("Update available: yes"));
        assert!(text.contains("mandatory"));
        assert!(text.contains("Download size: 2.0 MiB"));
        assert!(text.ends_with("Release notes:\nBug fixes\n"));
    }

    #[test]
    fn describes_up_to_date_result_without_notes() {
        let info = UpdateInfo {
            current_version: "1.0.0".to_string(),
            ..UpdateInfo::default()
        };

        let text = describe_update(&info);

        assert!(text.contains("Latest version:  unknown"));
        assert!(text.contains("Update available: no"));
        assert!(!text.contains("Release notes"));
    }

    #[test]
    fn progress_line_shows_percentage_when_size_is_known() {
        let line = format_progress(&DownloadProgress {
            bytes_received: 512 * 1024,
            total_bytes: 1024 * 1024,
        });
        assert_eq!(line, "Downloading...  50.0% (512.0 KiB / 1.0 MiB)");
    }

    #[test]
    fn progress_line_without_size_shows_bytes_only() {
        let line = format_progress(&DownloadProgress {
            bytes_received: 100,
            total_bytes: 0,
        });
        assert_eq!(line, "Downloading... 100 B");
    }

    #[test]
    fn byte_sizes_use_binary_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn confirm_accepts_yes_variants_only() {
        for (answer, expected) in [("y\n", true), ("YES\n", true), ("n\n", false), ("\n", false), ("", false)] {
            let mut input = answer.as_bytes();
            let mut output = Vec::new();

            let confirmed = confirm(&mut input, &mut output, "Install now?")
                .expect("prompt should succeed");

            assert_eq!(confirmed, expected, "answer {answer:?}");
            assert_eq!(output, b"Install now? (y/n): ");
        }
    }
}
