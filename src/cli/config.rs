//! Config subcommand implementation.

use super::{config_path, load_config, RemoteArgs};
use crate::config::{deployed_version, Paths};
use crate::error::CliResult;
use crate::output;
use clap::{Parser, Subcommand};
use std::path::Path;

/// Inspect or update the configuration.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration
    Show {
        #[command(flatten)]
        remote: RemoteArgs,

        /// Print the configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace the local file with the remote configuration, keeping a `.backup`
    Pull {
        /// Remote configuration service base URL
        #[arg(long, env = "SCANTAG_REMOTE_URL", value_name = "URL")]
        remote_url: String,

        /// Device name sent to the remote service (defaults to the host name)
        #[arg(long, value_name = "NAME")]
        device: Option<String>,
    },
}

impl ConfigCommand {
    /// Execute the config command.
    pub async fn execute(&self, config: Option<&Path>) -> CliResult<()> {
        let paths = Paths::resolve()?;
        let path = config_path(config, &paths);

        match &self.action {
            ConfigAction::Show { remote, json } => {
                let load = load_config(&path, remote).await?;
                for warning in &load.warnings {
                    output::print_warning(warning);
                }
                if *json {
                    output::print_config_json(&load.config)?;
                } else {
                    output::print_config(&load, &deployed_version(&paths.version_file()));
                }
            }
            ConfigAction::Pull { remote_url, device } => {
                let remote = RemoteArgs {
                    remote: true,
                    remote_url: Some(remote_url.clone()),
                    device: device.clone(),
                };
                let client = remote.client()?;
                let backup = client.pull_to(&path).await?;

                output::print_success(&format!(
                    "Configuration for '{}' from {} written to {}",
                    client.device(),
                    client.base_url(),
                    path.display()
                ));
                if let Some(backup) = backup {
                    output::print_info(&format!("Previous file kept at {}", backup.display()));
                }
            }
        }

        Ok(())
    }
}
