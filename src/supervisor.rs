//! Multi-session supervisor.
//!
//! Starts one task per configured scanner, watches them once a second and
//! brings every session down together as soon as one of them ends or an
//! interrupt arrives. Sessions are never restarted.

use crate::config::ScannerConfig;
use crate::error::SessionResult;
use crate::serial::PortOpener;
use crate::session::run_session;
use crate::tagbus::SharedTagBus;
use crate::types::ShutdownSignal;
use futures::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How often session liveness is checked.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Default per-session join bound during shutdown.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why the supervisor stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A session terminated on its own.
    SessionEnded { name: String },
    /// Ctrl-C, SIGTERM or an external shutdown request.
    Interrupted,
    /// Nothing was configured.
    NoScanners,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionEnded { name } => write!(f, "{} ended", name),
            Self::Interrupted => write!(f, "interrupted"),
            Self::NoScanners => write!(f, "no scanners configured"),
        }
    }
}

/// How one session finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Stopped,
    Failed(String),
    Panicked,
    /// Still running after the join bound; the task was aborted.
    Unresponsive,
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Panicked => write!(f, "panicked"),
            Self::Unresponsive => write!(f, "unresponsive"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub name: String,
    pub port: String,
    pub outcome: SessionOutcome,
}

/// Result of a supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorReport {
    pub reason: StopReason,
    pub sessions: Vec<SessionSummary>,
}

impl SupervisorReport {
    /// A run that ended because a session died is a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self.reason, StopReason::SessionEnded { .. })
    }
}

/// Runtime handle for one spawned session.
pub struct SessionHandle {
    pub name: String,
    pub port: String,
    task: JoinHandle<SessionResult<()>>,
}

impl SessionHandle {
    pub fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    async fn join(mut self, bound: Duration) -> SessionSummary {
        let joined = timeout(bound, &mut self.task).await;
        let outcome = match joined {
            Ok(Ok(Ok(()))) => SessionOutcome::Stopped,
            Ok(Ok(Err(e))) => SessionOutcome::Failed(e.to_string()),
            Ok(Err(e)) if e.is_panic() => {
                error!(scanner = %self.name, "session panicked");
                SessionOutcome::Panicked
            }
            Ok(Err(e)) => SessionOutcome::Failed(e.to_string()),
            Err(_) => {
                warn!(scanner = %self.name, timeout = ?bound, "session did not stop in time, aborting");
                self.task.abort();
                SessionOutcome::Unresponsive
            }
        };

        debug!(scanner = %self.name, outcome = %outcome, "session joined");
        SessionSummary {
            name: self.name,
            port: self.port,
            outcome,
        }
    }
}

/// Owns the shared resources every session needs.
pub struct Supervisor {
    opener: Arc<dyn PortOpener>,
    bus: SharedTagBus,
    shutdown: ShutdownSignal,
    join_timeout: Duration,
}

impl Supervisor {
    pub fn new(opener: Arc<dyn PortOpener>, bus: SharedTagBus) -> Self {
        Self {
            opener,
            bus,
            shutdown: ShutdownSignal::new(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }

    pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
        self.join_timeout = join_timeout;
        self
    }

    /// The flag shared with every session. Triggering it stops the run.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Spawn one `Scanner-<n>` task per config, in order.
    pub fn spawn(&self, scanners: Vec<ScannerConfig>) -> Vec<SessionHandle> {
        scanners
            .into_iter()
            .enumerate()
            .map(|(idx, config)| {
                let name = format!("Scanner-{}", idx + 1);
                let port = config.port.clone();
                info!(scanner = %name, port = %port, "starting session");

                let task = tokio::spawn(run_session(
                    name.clone(),
                    config,
                    Arc::clone(&self.opener),
                    Arc::clone(&self.bus),
                    self.shutdown.clone(),
                ));
                SessionHandle { name, port, task }
            })
            .collect()
    }

    /// Run every scanner until one ends or `interrupt` resolves, then stop
    /// and join them all.
    pub async fn run<F>(&self, scanners: Vec<ScannerConfig>, interrupt: F) -> SupervisorReport
    where
        F: Future<Output = ()>,
    {
        if scanners.is_empty() {
            warn!("no scanners configured");
            return SupervisorReport {
                reason: StopReason::NoScanners,
                sessions: Vec::new(),
            };
        }

        let handles = self.spawn(scanners);
        let reason = self.monitor(&handles, interrupt).await;

        if self.shutdown.trigger() {
            info!(reason = %reason, "shutting down all sessions");
        }

        let bound = self.join_timeout;
        let sessions = join_all(handles.into_iter().map(|h| h.join(bound))).await;
        SupervisorReport { reason, sessions }
    }

    async fn monitor<F>(&self, handles: &[SessionHandle], interrupt: F) -> StopReason
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        let mut ticker = interval(MONITOR_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut interrupt => {
                    info!("interrupt received");
                    return StopReason::Interrupted;
                }
                _ = ticker.tick() => {
                    if self.shutdown.is_triggered() {
                        info!("shutdown requested");
                        return StopReason::Interrupted;
                    }
                    if let Some(dead) = handles.iter().find(|h| !h.is_alive()) {
                        warn!(scanner = %dead.name, port = %dead.port, "session ended");
                        return StopReason::SessionEnded { name: dead.name.clone() };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scanner, MockOpener, MockSerial, MockTagBus};
    use crate::types::TagValue;
    use tokio::time::{sleep, Instant};

    fn fixture() -> (Arc<MockOpener>, Arc<MockTagBus>) {
        (Arc::new(MockOpener::new()), Arc::new(MockTagBus::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_session_stops_the_rest() {
        let (opener, bus) = fixture();
        let healthy = scanner(1, "/dev/ttyS1");
        bus.set(&healthy.health_tag, 0i64);
        let recorder = opener.add(MockSerial::new("/dev/ttyS1"));
        let supervisor = Supervisor::new(opener, bus.clone());

        let start = Instant::now();
        let report = supervisor
            .run(
                vec![scanner(0, "/dev/ttyMISSING"), healthy.clone()],
                std::future::pending(),
            )
            .await;

        assert_eq!(
            report.reason,
            StopReason::SessionEnded {
                name: "Scanner-1".into()
            }
        );
        assert!(report.is_failure());
        assert!(matches!(report.sessions[0].outcome, SessionOutcome::Failed(_)));
        assert_eq!(report.sessions[1].name, "Scanner-2");
        assert_eq!(report.sessions[1].outcome, SessionOutcome::Stopped);
        assert!(start.elapsed() <= MONITOR_INTERVAL + Duration::from_millis(200));

        assert!(recorder.is_closed());
        assert_eq!(
            bus.get(&healthy.health_message_tag),
            Some(TagValue::Text("Stopped - shutdown requested".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_stops_everything() {
        let (opener, bus) = fixture();
        let recorders = [
            opener.add(MockSerial::new("/dev/ttyS0")),
            opener.add(MockSerial::new("/dev/ttyS1")),
        ];
        let supervisor = Supervisor::new(opener, bus);

        let report = supervisor
            .run(
                vec![scanner(0, "/dev/ttyS0"), scanner(1, "/dev/ttyS1")],
                sleep(Duration::from_secs(3)),
            )
            .await;

        assert_eq!(report.reason, StopReason::Interrupted);
        assert!(!report.is_failure());
        assert!(report
            .sessions
            .iter()
            .all(|s| s.outcome == SessionOutcome::Stopped));
        assert!(recorders.iter().all(|p| p.is_closed()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_shutdown_request() {
        let (opener, bus) = fixture();
        opener.add(MockSerial::new("/dev/ttyS0"));
        let supervisor = Supervisor::new(opener, bus);
        let shutdown = supervisor.shutdown_signal();

        tokio::spawn(async move {
            sleep(Duration::from_millis(1500)).await;
            shutdown.trigger();
        });
        let report = supervisor
            .run(vec![scanner(0, "/dev/ttyS0")], std::future::pending())
            .await;

        assert_eq!(report.reason, StopReason::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wedged_session_is_aborted() {
        let (opener, bus) = fixture();
        opener.add(MockSerial::new("/dev/ttyS0").hanging());
        let supervisor =
            Supervisor::new(opener, bus).with_join_timeout(Duration::from_secs(2));

        let start = Instant::now();
        let report = supervisor
            .run(vec![scanner(0, "/dev/ttyS0")], sleep(Duration::from_secs(1)))
            .await;

        assert_eq!(report.sessions[0].outcome, SessionOutcome::Unresponsive);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_no_scanners() {
        let (opener, bus) = fixture();
        let supervisor = Supervisor::new(opener, bus);

        let report = supervisor.run(Vec::new(), std::future::pending()).await;

        assert_eq!(report.reason, StopReason::NoScanners);
        assert!(report.sessions.is_empty());
    }
}
