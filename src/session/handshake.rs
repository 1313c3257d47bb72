//! Publish / confirm / acknowledge cycle for one scanned code.
//!
//! ```text
//! Idle ──scan──▶ Published ──true within 20 polls──▶ Confirmed ──▶ Idle
//!                    │
//!                    └──────── 20 polls, no true ───▶ TimedOut ──▶ Idle
//! ```

use crate::config::ScannerConfig;
use crate::serial::{SerialChannel, ACK, BEEP};
use crate::tagbus::TagBus;
use crate::types::{ShutdownSignal, TagValue};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Spacing between confirmation polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Confirmation polls before giving up (~2 s).
pub const CONFIRM_ATTEMPTS: u32 = 20;

/// Spacing between beep pulses.
pub const BEEP_SPACING: Duration = Duration::from_millis(500);

/// Position of a session in the handshake cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the scanner to send a code.
    Idle,
    /// Code written to the tag server; polling for confirmation.
    Published,
    /// Controller confirmed; scanner is being acknowledged.
    Confirmed,
    /// No confirmation arrived; the cycle was abandoned.
    TimedOut,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Published => write!(f, "published"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// What happened during one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// `Confirmed` or `TimedOut`.
    pub outcome: HandshakeState,
    /// Confirmation polls performed.
    pub polls: u32,
    /// Whether the ACK byte reached the scanner.
    pub acknowledged: bool,
    pub beeps_requested: u32,
    pub beeps_sent: u32,
}

impl CycleReport {
    fn new(outcome: HandshakeState, polls: u32) -> Self {
        Self {
            outcome,
            polls,
            acknowledged: false,
            beeps_requested: 0,
            beeps_sent: 0,
        }
    }
}

/// Runs handshake cycles against one scanner's tags.
pub struct Handshake<'a> {
    config: &'a ScannerConfig,
    bus: &'a dyn TagBus,
    shutdown: &'a ShutdownSignal,
}

impl<'a> Handshake<'a> {
    pub fn new(config: &'a ScannerConfig, bus: &'a dyn TagBus, shutdown: &'a ShutdownSignal) -> Self {
        Self {
            config,
            bus,
            shutdown,
        }
    }

    /// Handle one scanned `code` to completion or timeout.
    pub async fn run(&self, channel: &mut dyn SerialChannel, code: &str) -> CycleReport {
        self.publish(code).await;

        let (outcome, polls) = self.await_confirmation().await;
        debug!(polls, outcome = %outcome, "confirmation polling finished");

        let mut report = CycleReport::new(outcome, polls);
        match outcome {
            HandshakeState::Confirmed => self.acknowledge(channel, &mut report).await,
            _ => info!(code, "scan not confirmed, waiting for the scanner to resend"),
        }
        report
    }

    /// Clear the confirmation tag, then publish the code. Always in that order.
    async fn publish(&self, code: &str) {
        let response = &self.config.barcode_response_tag;
        if let Err(e) = self.bus.write_tag(response, TagValue::Bool(false)).await {
            warn!(tag = %response, error = %e, "failed to clear confirmation before publishing");
        }

        let barcode = &self.config.barcode_tag;
        if let Err(e) = self.bus.write_tag(barcode, TagValue::from(code)).await {
            warn!(tag = %barcode, error = %e, "failed to publish scanned code");
        }
        debug!(state = %HandshakeState::Published, "awaiting confirmation");
    }

    /// Poll the confirmation tag. A failed read still uses up an attempt.
    async fn await_confirmation(&self) -> (HandshakeState, u32) {
        let response = &self.config.barcode_response_tag;

        for attempt in 1..=CONFIRM_ATTEMPTS {
            if self.shutdown.is_triggered() {
                debug!(attempt, "shutdown requested during confirmation polling");
                return (HandshakeState::TimedOut, attempt - 1);
            }

            match self.bus.read_tag(response).await {
                Ok(value) if value.is_confirmation() => {
                    return (HandshakeState::Confirmed, attempt);
                }
                Ok(_) => {}
                Err(e) => warn!(tag = %response, attempt, error = %e, "confirmation poll failed"),
            }

            if attempt < CONFIRM_ATTEMPTS {
                self.shutdown.sleep(POLL_INTERVAL).await;
            }
        }

        (HandshakeState::TimedOut, CONFIRM_ATTEMPTS)
    }

    /// ACK the scanner, clear the confirmation, then beep as requested.
    async fn acknowledge(&self, channel: &mut dyn SerialChannel, report: &mut CycleReport) {
        if let Err(e) = channel.write_byte(ACK).await {
            error!(error = %e, "failed to send ACK, abandoning cycle");
            return;
        }
        report.acknowledged = true;
        info!("scan confirmed, ACK sent");

        let response = &self.config.barcode_response_tag;
        if let Err(e) = self.bus.write_tag(response, TagValue::Bool(false)).await {
            warn!(tag = %response, error = %e, "failed to clear confirmation");
        }

        report.beeps_requested = self.beep_count().await;
        for pulse in 1..=report.beeps_requested {
            if self.shutdown.is_triggered() {
                debug!(
                    pulse,
                    requested = report.beeps_requested,
                    "shutdown requested, skipping remaining beeps"
                );
                break;
            }
            match channel.write_byte(BEEP).await {
                Ok(()) => report.beeps_sent += 1,
                Err(e) => warn!(pulse, error = %e, "beep pulse failed"),
            }
            self.shutdown.sleep(BEEP_SPACING).await;
        }
    }

    /// Requested beep count; anything but a non-negative integer means zero.
    async fn beep_count(&self) -> u32 {
        let tag = &self.config.beep_count_tag;
        match self.bus.read_tag(tag).await {
            Ok(TagValue::Int(n)) if n >= 0 => u32::try_from(n).unwrap_or(u32::MAX),
            Ok(TagValue::Int(n)) => {
                warn!(tag = %tag, count = n, "negative beep count, not beeping");
                0
            }
            Ok(other) => {
                warn!(tag = %tag, kind = other.kind(), "beep count is not an integer, not beeping");
                0
            }
            Err(e) => {
                warn!(tag = %tag, error = %e, "failed to read beep count, not beeping");
                0
            }
        }
    }
}
