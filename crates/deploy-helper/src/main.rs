mod cli;
mod commands;
mod console;
mod error;
mod logging;
mod settings;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use deploy_helper_core::CancellationToken;
use log::{error, info};

use crate::cli::Cli;
use crate::settings::Settings;

/// Upper bound on waiting for blocking work (such as an unanswered prompt)
/// after the command finished.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(error) => {
            eprintln!("Error: {error}");
            return ExitCode::FAILURE;
        }
    };
    cli.apply_overrides(&mut settings);

    logging::init_logging(
        cli.verbose || settings.debug_logging,
        settings.max_log_size_bytes,
    );
    info!(
        "deploy-helper {} starting: {:?}",
        env!("CARGO_PKG_VERSION"),
        cli.command
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("Error: failed to start async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let result = runtime.block_on(async {
        spawn_interrupt_handler(cancel.clone());
        commands::run(cli.command, &settings, &cancel).await
    });
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error}");
            eprintln!("\nError: {error}");
            if let Some(hint) = error.hint() {
                eprintln!("{hint}");
            }
            ExitCode::FAILURE
        }
    };
    log::logger().flush();
    code
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            cancel.cancel();
        }
    });
}
