use std::path::PathBuf;

use clap::{Parser, Subcommand};
use deploy_helper_core::Channel;

use crate::settings::Settings;

/// Check for, download and install application updates from a DeployHelper
/// server.
#[derive(Parser, Debug)]
#[command(name = "deploy-helper", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to settings.json in the config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Update server base URL
    #[arg(long, global = true, value_name = "URL", env = "DEPLOY_HELPER_SERVER")]
    pub server: Option<String>,

    /// Application identifier registered on the server
    #[arg(long, global = true, value_name = "ID")]
    pub app_id: Option<String>,

    /// Version of the installed application
    #[arg(long, global = true, value_name = "VERSION")]
    pub current_version: Option<String>,

    /// Release channel: stable, beta or alpha
    #[arg(long, global = true)]
    pub channel: Option<Channel>,

    /// Directory downloaded installers are written to
    #[arg(long, global = true, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print debug logs to the terminal
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Ask the server whether a newer version exists
    Check,

    /// Check and download the installer when an update exists
    Download,

    /// Check, download and run the installer after confirmation
    Update {
        /// Answer yes to every confirmation
        #[arg(short, long)]
        yes: bool,

        /// Arguments passed to the installer instead of /silent
        #[arg(long, num_args = 1.., allow_hyphen_values = true, value_name = "ARGS")]
        installer_args: Option<Vec<String>>,
    },

    /// Check periodically and print each result until interrupted
    Watch {
        /// Minutes between checks (overrides the settings file)
        #[arg(long, value_name = "MINUTES")]
        interval: Option<u64>,
    },
}

impl Cli {
    /// Apply command-line values on top of the loaded settings.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(server) = &self.server {
            settings.server_url.clone_from(server);
        }
        if let Some(app_id) = &self.app_id {
            settings.app_id.clone_from(app_id);
        }
        if let Some(version) = &self.current_version {
            settings.current_version.clone_from(version);
        }
        if let Some(channel) = self.channel {
            settings.channel = channel;
        }
        if let Some(dir) = &self.download_dir {
            settings.download_dir = Some(dir.clone());
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_secs = timeout;
        }
        if let Commands::Watch {
            interval: Some(interval),
        } = self.command
        {
            settings.auto_check_interval_minutes = interval;
        }
    }
}
