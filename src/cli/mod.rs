//! CLI subcommand definitions and handlers.
//!
//! - `scantag run` - Bridge every configured scanner (the default)
//! - `scantag config show` - Print the resolved configuration
//! - `scantag config pull` - Replace the local file with the remote configuration

mod config;
mod run;

pub use config::ConfigCommand;
pub use run::RunCommand;

use crate::config::{AppConfig, ConfigLoad, Paths, RemoteConfigClient};
use crate::error::{CliError, CliResult};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// scantag - Serial barcode scanner to OPC UA bridge.
///
/// Each configured scanner gets its own session: scanned codes are published
/// to the tag server, and the scanner is acknowledged once the controller
/// confirms the code.
#[derive(Parser, Debug)]
#[command(name = "scantag")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bridges serial barcode scanners to an OPC UA tag server", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Force DEBUG logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run all configured scanner sessions
    #[command(alias = "r")]
    Run(RunCommand),

    /// Inspect or update the configuration
    #[command(alias = "c")]
    Config(ConfigCommand),
}

/// Where to fetch remote configuration from.
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteArgs {
    /// Load configuration from the remote service, falling back to the local file
    #[arg(long)]
    pub remote: bool,

    /// Remote configuration service base URL
    #[arg(long, env = "SCANTAG_REMOTE_URL", value_name = "URL")]
    pub remote_url: Option<String>,

    /// Device name sent to the remote service (defaults to the host name)
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,
}

impl RemoteArgs {
    /// Build a client, failing if no service URL is known.
    pub fn client(&self) -> CliResult<RemoteConfigClient> {
        let url = self.remote_url.as_deref().ok_or_else(|| {
            CliError::Other("no remote URL; pass --remote-url or set SCANTAG_REMOTE_URL".into())
        })?;
        Ok(RemoteConfigClient::new(url, self.device.clone())?)
    }
}

/// `--config` if given, else the default lookup.
pub(crate) fn config_path(explicit: Option<&Path>, paths: &Paths) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.config_file())
}

/// Load the local file, or the remote configuration when `--remote` is set.
pub(crate) async fn load_config(path: &Path, remote: &RemoteArgs) -> CliResult<ConfigLoad> {
    if remote.remote {
        Ok(remote.client()?.fetch_or_local(path).await?)
    } else {
        Ok(AppConfig::load_from(path)?)
    }
}
