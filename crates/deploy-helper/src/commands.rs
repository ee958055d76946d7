use std::io;
use std::path::PathBuf;

use deploy_helper_core::{AutoUpdater, CancellationToken, ProgressSink, UpdateInfo, UpdaterError};
use log::info;

use crate::cli::Commands;
use crate::console::{self, confirm, describe_update};
use crate::error::CliError;
use crate::settings::Settings;

/// Run one CLI command to completion.
///
/// # Errors
/// Returns the first failure; cancellation via `cancel` surfaces as
/// [`UpdaterError::Cancelled`].
pub async fn run(
    command: Commands,
    settings: &Settings,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    match command {
        Commands::Check => check(settings, cancel).await,
        Commands::Download => download(settings, cancel).await,
        Commands::Update {
            yes,
            installer_args,
        } => update(settings, yes, installer_args.as_deref(), cancel).await,
        Commands::Watch { .. } => watch(settings, cancel).await,
    }
}

async fn check(settings: &Settings, cancel: &CancellationToken) -> Result<(), CliError> {
    let updater = AutoUpdater::new(settings.to_updater_config(false)?)?;
    check_and_describe(&updater, cancel).await?;
    Ok(())
}

async fn download(settings: &Settings, cancel: &CancellationToken) -> Result<(), CliError> {
    let updater = AutoUpdater::new(settings.to_updater_config(false)?)?;
    let info = check_and_describe(&updater, cancel).await?;
    if info.update_available {
        fetch_installer(&updater, &info, cancel).await?;
    }
    Ok(())
}

async fn update(
    settings: &Settings,
    assume_yes: bool,
    installer_args: Option<&[String]>,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let updater = AutoUpdater::new(settings.to_updater_config(false)?)?;
    let info = check_and_describe(&updater, cancel).await?;
    if !info.update_available {
        return Ok(());
    }

    if !info.is_mandatory && !assume_yes && !ask("Download the update now?", cancel).await? {
        println!("Skipping the update.");
        return Ok(());
    }

    let path = fetch_installer(&updater, &info, cancel).await?;

    if !assume_yes && !ask("\nInstall and restart now?", cancel).await? {
        println!("\nRun the installer manually later: {}", path.display());
        return Ok(());
    }

    println!("Starting installer...");
    match updater.install_and_restart(&path, installer_args)? {}
}

async fn watch(settings: &Settings, cancel: &CancellationToken) -> Result<(), CliError> {
    let config = settings.to_updater_config(true)?;
    if config.auto_check_interval().is_none() {
        return Err(UpdaterError::InvalidConfig(
            "watch needs auto_check_interval_minutes of at least 1".to_string(),
        )
        .into());
    }

    println!(
        "Checking for updates every {} minute(s). Press Ctrl-C to stop.",
        config.auto_check_interval_minutes()
    );
    let updater = AutoUpdater::builder(config)
        .on_update_checked(|info| println!("{}", watch_line(info)))
        .on_error(|error| eprintln!("[error] {error}"))
        .build()?;

    cancel.cancelled().await;
    updater.shutdown().await;
    println!("Stopped watching for updates.");
    Ok(())
}

async fn check_and_describe(
    updater: &AutoUpdater,
    cancel: &CancellationToken,
) -> Result<UpdateInfo, CliError> {
    println!("Checking for updates...\n");
    let info = updater.check_for_update(cancel).await?;
    print!("{}", describe_update(&info));
    if !info.update_available {
        println!("\nYou are running the latest version.");
    }
    Ok(info)
}

async fn fetch_installer(
    updater: &AutoUpdater,
    info: &UpdateInfo,
    cancel: &CancellationToken,
) -> Result<PathBuf, CliError> {
    println!("\nDownloading update...");
    let sink: &ProgressSink = &console::print_progress;
    let result = updater.download_update(info, Some(sink), cancel).await;
    println!();

    let path = result?;
    println!("Download complete: {}", path.display());
    Ok(path)
}

async fn ask(question: &'static str, cancel: &CancellationToken) -> Result<bool, CliError> {
    let prompt = tokio::task::spawn_blocking(move || {
        confirm(&mut io::stdin().lock(), &mut io::stdout(), question)
    });

    tokio::select! {
        () = cancel.cancelled() => {
            info!("Prompt interrupted");
            Err(UpdaterError::Cancelled { operation: "confirmation" }.into())
        }
        answer = prompt => Ok(answer??),
    }
}

fn watch_line(info: &UpdateInfo) -> String {
    if !info.update_available {
        return format!("[check] Up to date (v{})", info.current_version);
    }

    let latest = info.latest_version.as_deref().unwrap_or("unknown");
    if info.is_mandatory {
        format!("[update] v{latest} is available (mandatory)")
    } else {
        format!("[update] v{latest} is available")
    }
}
