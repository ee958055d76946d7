use std::convert::Infallible;
use std::path::Path;

use deploy_helper_platform::Detach;
use log::info;

use crate::error::UpdaterError;

pub const DEFAULT_INSTALLER_ARGS: &[&str] = &["/silent"];

/// Start the installer as an independent process and return its pid.
///
/// `args` defaults to [`DEFAULT_INSTALLER_ARGS`] when `None`.
///
/// # Errors
/// Returns [`UpdaterError::NotFound`] when no file exists at
/// `installer_path`, and an I/O error when the process cannot be spawned.
pub fn launch_installer(installer_path: &Path, args: Option<&[String]>) -> Result<u32, UpdaterError> {
    if !installer_path.is_file() {
        return Err(UpdaterError::NotFound {
            path: installer_path.to_path_buf(),
        });
    }

    #[cfg(unix)]
    ensure_executable(installer_path)?;

    let mut command = std::process::Command::new(installer_path);
    match args {
        Some(args) => command.args(args),
        None => command.args(DEFAULT_INSTALLER_ARGS),
    };
    if let Some(dir) = installer_path.parent() {
        command.current_dir(dir);
    }

    info!("Launching installer: {}", installer_path.display());
    let child = command.detach().spawn().map_err(|error| {
        UpdaterError::io_with_path("failed to launch installer", installer_path, &error)
    })?;
    Ok(child.id())
}

/// Launch the installer and terminate the current process with status 0.
///
/// This is a one-way transition: on success it never returns. Callers are
/// expected to have obtained the user's confirmation beforehand.
///
/// # Errors
/// Returns the launch error when the installer is missing or cannot start;
/// the process keeps running in that case.
pub fn install_and_restart(
    installer_path: &Path,
    args: Option<&[String]>,
) -> Result<Infallible, UpdaterError> {
    let pid = launch_installer(installer_path, args)?;
    info!("Installer started with pid {pid}, exiting");
    log::logger().flush();
    std::process::exit(0)
}

#[cfg(unix)]
fn ensure_executable(path: &Path) -> Result<(), UpdaterError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)
        .map_err(|error| UpdaterError::io_with_path("failed to inspect installer", path, &error))?;
    let mut permissions = metadata.permissions();
    if permissions.mode() & 0o111 == 0 {
        permissions.set_mode(permissions.mode() | 0o755);
        std::fs::set_permissions(path, permissions).map_err(|error| {
            UpdaterError::io_with_path("failed to mark installer executable", path, &error)
        })?;
    }
    Ok(())
}
