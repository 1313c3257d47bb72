//! Run subcommand implementation.
//!
//! Handles `scantag run`: loads configuration, starts logging and supervises
//! one session per configured scanner until interrupted or a session dies.

use super::{config_path, load_config, RemoteArgs};
use crate::config::{deployed_version, Paths};
use crate::error::{CliError, CliResult};
use crate::logging;
use crate::output;
use crate::serial::SerialPortOpener;
use crate::supervisor::{Supervisor, SupervisorReport};
use crate::tagbus::{OpcUaTagBus, DEFAULT_ENDPOINT};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Run all configured scanner sessions.
#[derive(Parser, Debug)]
pub struct RunCommand {
    /// OPC UA server endpoint
    #[arg(long, env = "SCANTAG_OPC_URL", default_value = DEFAULT_ENDPOINT, value_name = "URL")]
    pub opc_url: String,

    /// Directory for log files (defaults to `log/` next to the executable)
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Seconds to wait for each session to stop before aborting it
    #[arg(long, value_name = "SECS", default_value = "5")]
    pub join_timeout: u64,

    #[command(flatten)]
    pub remote: RemoteArgs,
}

impl RunCommand {
    /// `run` with every option at its default, honouring environment overrides.
    pub fn defaults() -> CliResult<Self> {
        Self::try_parse_from(["run"]).map_err(|e| CliError::Other(e.to_string()))
    }

    /// Execute the run command.
    pub async fn execute(&self, config: Option<&Path>, verbose: bool) -> CliResult<SupervisorReport> {
        let paths = Paths::resolve()?;
        let config_file = config_path(config, &paths);
        let load = load_config(&config_file, &self.remote).await?;

        let log_dir = self.log_dir.clone().unwrap_or_else(|| paths.log_dir());
        let log_file = logging::init(load.config.log_level, verbose, &log_dir)?;

        let deployed = deployed_version(&paths.version_file());
        info!(
            version = env!("CARGO_PKG_VERSION"),
            deployment = %deployed,
            log_file = %log_file.display(),
            "scantag starting"
        );
        info!(source = %load.source, scanners = load.config.scanners.len(), "configuration loaded");
        for warning in &load.warnings {
            warn!(message = %warning, "configuration warning");
        }
        if let Err(e) = logging::cleanup_old_logs(&log_dir, load.config.log_retention_days) {
            warn!(dir = %log_dir.display(), error = %e, "log cleanup failed");
        }

        let bus = Arc::new(OpcUaTagBus::new(self.opc_url.clone(), paths.pki_dir()));
        output::print_startup_banner(&load, bus.endpoint(), &deployed);

        let supervisor = Supervisor::new(Arc::new(SerialPortOpener), bus)
            .with_join_timeout(Duration::from_secs(self.join_timeout));

        let report = supervisor.run(load.config.scanners, interrupted()).await;

        info!(reason = %report.reason, "scantag stopped");
        output::print_report(&report);
        Ok(report)
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn interrupted() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = term.recv() => info!("SIGTERM received"),
                }
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
