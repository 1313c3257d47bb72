//! Per-scanner session: owns one serial channel and bridges it to the tag bus.
//!
//! Each loop iteration checks the shutdown flag, handles at most one scanned
//! line, advances the heartbeat and sleeps for [`IDLE_SLEEP`]. Only serial
//! transport faults end a session; tag bus faults are logged and survived.

mod handshake;
mod heartbeat;

pub use handshake::{
    CycleReport, Handshake, HandshakeState, BEEP_SPACING, CONFIRM_ATTEMPTS, POLL_INTERVAL,
};
pub use heartbeat::{Heartbeat, HEARTBEAT_TICKS};

use crate::config::ScannerConfig;
use crate::error::{SessionError, SessionResult};
use crate::serial::{BoxedChannel, PortOpener};
use crate::tagbus::{SharedTagBus, TagBus};
use crate::types::{ShutdownSignal, TagValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Sleep at the end of every loop iteration.
pub const IDLE_SLEEP: Duration = Duration::from_millis(100);

/// Prefix of the health message written when a session ends.
pub const STOPPED_PREFIX: &str = "Stopped - ";

/// Health message written on cooperative shutdown.
pub const SHUTDOWN_REASON: &str = "shutdown requested";

/// One scanner's running session.
pub struct Session {
    config: ScannerConfig,
    channel: BoxedChannel,
    bus: SharedTagBus,
    shutdown: ShutdownSignal,
    heartbeat: Heartbeat,
}

impl Session {
    pub fn new(
        config: ScannerConfig,
        channel: BoxedChannel,
        bus: SharedTagBus,
        shutdown: ShutdownSignal,
    ) -> Self {
        let heartbeat = Heartbeat::new(config.health_tag.clone());
        Self {
            config,
            channel,
            bus,
            shutdown,
            heartbeat,
        }
    }

    /// Open the configured port and build a session on it.
    pub async fn open(
        config: ScannerConfig,
        opener: &dyn PortOpener,
        bus: SharedTagBus,
        shutdown: ShutdownSignal,
    ) -> SessionResult<Self> {
        let channel = opener
            .open(&config)
            .await
            .map_err(SessionError::PortOpen)?;
        Ok(Self::new(config, channel, bus, shutdown))
    }

    /// Run until shutdown or a transport fault. The health tags are updated
    /// and the port is closed on every exit path.
    pub async fn run(mut self) -> SessionResult<()> {
        info!(port = %self.channel.port_name(), "listening for scans");

        let result = self.serve().await;
        let reason = match &result {
            Ok(()) => {
                info!("session stopping on request");
                SHUTDOWN_REASON.to_string()
            }
            Err(e) => {
                error!(error = %e, "session failed");
                e.to_string()
            }
        };

        report_stopped(&self.config, self.bus.as_ref(), &reason).await;
        self.channel.close().await;
        result
    }

    async fn serve(&mut self) -> SessionResult<()> {
        while !self.shutdown.is_triggered() {
            if self.channel.pending().await.map_err(SessionError::Transport)? {
                let line = self
                    .channel
                    .read_line()
                    .await
                    .map_err(SessionError::Transport)?;
                let code = line.trim();

                if code.is_empty() {
                    debug!("ignoring empty line");
                } else {
                    info!(code, "scanned");
                    let report = Handshake::new(&self.config, self.bus.as_ref(), &self.shutdown)
                        .run(&mut *self.channel, code)
                        .await;
                    debug!(
                        outcome = %report.outcome,
                        polls = report.polls,
                        beeps = report.beeps_sent,
                        "cycle finished"
                    );
                }
            }

            self.heartbeat.tick(self.bus.as_ref()).await;
            self.shutdown.sleep(IDLE_SLEEP).await;
        }
        Ok(())
    }
}

/// Zero the health counter and publish why the session ended.
async fn report_stopped(config: &ScannerConfig, bus: &dyn TagBus, reason: &str) {
    let health = &config.health_tag;
    if let Err(e) = bus.write_tag(health, TagValue::Int(0)).await {
        warn!(tag = %health, error = %e, "failed to zero health tag");
    }

    let message_tag = &config.health_message_tag;
    let message = format!("{STOPPED_PREFIX}{reason}");
    if let Err(e) = bus.write_tag(message_tag, TagValue::Text(message)).await {
        warn!(tag = %message_tag, error = %e, "failed to write health message");
    }
}

/// Open and run one scanner session under a `session` tracing span.
///
/// An open failure is returned without touching the health tags.
pub async fn run_session(
    name: String,
    config: ScannerConfig,
    opener: Arc<dyn PortOpener>,
    bus: SharedTagBus,
    shutdown: ShutdownSignal,
) -> SessionResult<()> {
    let span = info_span!("session", scanner = %name, port = %config.port);

    async move {
        let session = match Session::open(config, opener.as_ref(), bus, shutdown).await {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "cannot start session");
                return Err(e);
            }
        };
        session.run().await
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SerialError;
    use crate::serial::{ACK, BEEP};
    use crate::testing::{scanner, MockOpener, MockSerial, MockTagBus};
    use tokio::time::{sleep, Instant};

    fn bus_for(config: &ScannerConfig) -> Arc<MockTagBus> {
        let bus = Arc::new(MockTagBus::new());
        bus.set(&config.barcode_response_tag, false);
        bus.set(&config.beep_count_tag, 0i64);
        bus.set(&config.health_tag, 0i64);
        bus
    }

    fn spawn(
        config: ScannerConfig,
        channel: MockSerial,
        bus: Arc<MockTagBus>,
        shutdown: ShutdownSignal,
    ) -> tokio::task::JoinHandle<SessionResult<()>> {
        let session = Session::new(config, Box::new(channel), bus, shutdown);
        tokio::spawn(session.run())
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_heartbeats() {
        let config = scanner(0, "/dev/ttyS0");
        let bus = bus_for(&config);
        let shutdown = ShutdownSignal::new();
        let handle = spawn(
            config.clone(),
            MockSerial::new("/dev/ttyS0"),
            bus.clone(),
            shutdown.clone(),
        );

        sleep(Duration::from_millis(30_500)).await;
        shutdown.trigger();
        handle.await.unwrap().unwrap();

        assert_eq!(
            bus.writes_to(&config.health_tag),
            vec![
                TagValue::Int(1),
                TagValue::Int(2),
                TagValue::Int(3),
                TagValue::Int(0),
            ]
        );
        assert!(bus.writes_to(&config.barcode_tag).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_is_handled_and_empty_lines_ignored() {
        let config = scanner(0, "/dev/ttyS0");
        let bus = bus_for(&config);
        bus.confirm_on_read(&config.barcode_response_tag, 1);
        let channel = MockSerial::new("/dev/ttyS0").with_lines(&["", "ABC123", "   "]);
        let recorder = channel.recorder();
        let shutdown = ShutdownSignal::new();
        let handle = spawn(config.clone(), channel, bus.clone(), shutdown.clone());

        sleep(Duration::from_secs(2)).await;
        shutdown.trigger();
        handle.await.unwrap().unwrap();

        assert_eq!(
            bus.writes_to(&config.barcode_tag),
            vec![TagValue::Text("ABC123".into())]
        );
        assert_eq!(recorder.bytes(), vec![ACK]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reports_and_closes() {
        let config = scanner(0, "/dev/ttyS0");
        let bus = bus_for(&config);
        let channel = MockSerial::new("/dev/ttyS0");
        let recorder = channel.recorder();
        let shutdown = ShutdownSignal::new();
        let handle = spawn(config.clone(), channel, bus.clone(), shutdown.clone());

        sleep(Duration::from_millis(250)).await;
        let triggered_at = Instant::now();
        shutdown.trigger();
        handle.await.unwrap().unwrap();

        assert!(triggered_at.elapsed() <= IDLE_SLEEP);
        assert!(recorder.is_closed());
        assert_eq!(bus.get(&config.health_tag), Some(TagValue::Int(0)));
        assert_eq!(
            bus.get(&config.health_message_tag),
            Some(TagValue::Text("Stopped - shutdown requested".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_cycle_skips_remaining_scans() {
        let config = scanner(0, "/dev/ttyS0");
        let bus = bus_for(&config);
        let channel = MockSerial::new("/dev/ttyS0").with_lines(&["A", "B", "C"]);
        let recorder = channel.recorder();
        let shutdown = ShutdownSignal::new();
        let handle = spawn(config.clone(), channel, bus.clone(), shutdown.clone());

        sleep(Duration::from_millis(500)).await;
        shutdown.trigger();
        handle.await.unwrap().unwrap();

        assert_eq!(
            bus.writes_to(&config.barcode_tag),
            vec![TagValue::Text("A".into())]
        );
        assert!(recorder.bytes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_beeps_stops_promptly() {
        let config = scanner(0, "/dev/ttyS0");
        let bus = bus_for(&config);
        bus.set(&config.beep_count_tag, 20i64);
        bus.confirm_on_read(&config.barcode_response_tag, 1);
        let channel = MockSerial::new("/dev/ttyS0").with_lines(&["B"]);
        let recorder = channel.recorder();
        let shutdown = ShutdownSignal::new();
        let handle = spawn(config.clone(), channel, bus.clone(), shutdown.clone());

        sleep(Duration::from_millis(300)).await;
        let triggered_at = Instant::now();
        shutdown.trigger();
        handle.await.unwrap().unwrap();

        assert!(triggered_at.elapsed() <= IDLE_SLEEP);
        assert_eq!(recorder.bytes(), vec![ACK, BEEP]);
        assert_eq!(
            bus.get(&config.health_message_tag),
            Some(TagValue::Text("Stopped - shutdown requested".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_fault_is_fatal() {
        let config = scanner(0, "/dev/ttyS0");
        let bus = bus_for(&config);
        let channel = MockSerial::new("/dev/ttyS0").failing_when_drained();
        let recorder = channel.recorder();
        let handle = spawn(config.clone(), channel, bus.clone(), ShutdownSignal::new());

        let result = handle.await.unwrap();

        assert!(matches!(
            result,
            Err(SessionError::Transport(SerialError::Io(_)))
        ));
        assert!(recorder.is_closed());
        assert_eq!(bus.get(&config.health_tag), Some(TagValue::Int(0)));
        match bus.get(&config.health_message_tag) {
            Some(TagValue::Text(message)) => {
                assert!(message.starts_with("Stopped - serial transport fault"))
            }
            other => panic!("unexpected health message: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tag_bus_outage_is_survived() {
        let config = scanner(0, "/dev/ttyS0");
        let bus = bus_for(&config);
        bus.fail_writes(&config.barcode_tag);
        bus.fail_reads(&config.barcode_response_tag);
        bus.fail_reads(&config.health_tag);
        let channel = MockSerial::new("/dev/ttyS0").with_lines(&["LOST"]);
        let shutdown = ShutdownSignal::new();
        let handle = spawn(config.clone(), channel, bus.clone(), shutdown.clone());

        sleep(Duration::from_secs(15)).await;
        assert!(!handle.is_finished());
        shutdown.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_open_failure_leaves_health_alone() {
        let config = scanner(0, "/dev/ttyMISSING");
        let bus = bus_for(&config);
        let opener: Arc<dyn PortOpener> = Arc::new(MockOpener::new());

        let result = run_session(
            "Scanner-1".into(),
            config,
            opener,
            bus.clone(),
            ShutdownSignal::new(),
        )
        .await;

        assert!(matches!(result, Err(SessionError::PortOpen(_))));
        assert!(bus.log().is_empty());
    }
}
