//! Per-scanner configuration.
//!
//! The on-disk shape keeps the field names the plant configuration service
//! already emits (`baudrate`, `barcode_node`, ...). Missing tag ids default to
//! a block of five consecutive node ids per scanner index.

use crate::types::TagId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_PORT: &str = "/dev/ttyS0";
const DEFAULT_BAUD_RATE: u32 = 9600;
const DEFAULT_READ_TIMEOUT_SECS: f64 = 10.0;

/// First node id of scanner 0; each scanner owns five consecutive ids.
const TAG_BASE: u32 = 100_001;
const TAGS_PER_SCANNER: u32 = 5;

/// Immutable descriptor for one scanner session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannerConfig {
    /// Serial device path.
    pub port: String,
    #[serde(rename = "baudrate")]
    pub baud_rate: u32,
    /// Serial read timeout in seconds.
    #[serde(rename = "timeout")]
    pub read_timeout_secs: f64,
    #[serde(rename = "rtscts")]
    pub rts_cts: bool,
    #[serde(rename = "dsrdtr")]
    pub dsr_dtr: bool,
    /// Receives the scanned code.
    #[serde(rename = "barcode_node")]
    pub barcode_tag: TagId,
    /// Set to `true` by the controller to confirm a scan.
    #[serde(rename = "barcode_response_node")]
    pub barcode_response_tag: TagId,
    /// Number of beeps to emit after a confirmed scan.
    #[serde(rename = "barcode_beep_count")]
    pub beep_count_tag: TagId,
    /// Heartbeat counter, 0 when the session has stopped.
    #[serde(rename = "barcode_health_check")]
    pub health_tag: TagId,
    /// Reason the session stopped.
    #[serde(rename = "barcode_health_check_message")]
    pub health_message_tag: TagId,
}

impl ScannerConfig {
    /// Defaults for the scanner at position `index` in the configuration.
    pub fn default_for(index: usize) -> Self {
        ScannerEntry::default().resolve(index)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.read_timeout_secs.max(0.0))
    }
}

/// Scanner entry as it appears in a configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ScannerEntry {
    port: Option<String>,
    baudrate: Option<u32>,
    timeout: Option<f64>,
    rtscts: Option<bool>,
    dsrdtr: Option<bool>,
    barcode_node: Option<TagId>,
    barcode_response_node: Option<TagId>,
    barcode_beep_count: Option<TagId>,
    barcode_health_check: Option<TagId>,
    barcode_health_check_message: Option<TagId>,
}

impl ScannerEntry {
    /// Fill in defaults for the scanner at `index`.
    pub(crate) fn resolve(self, index: usize) -> ScannerConfig {
        let base = TAG_BASE + index as u32 * TAGS_PER_SCANNER;
        let tag = |explicit: Option<TagId>, offset: u32| {
            explicit.unwrap_or_else(|| TagId::numeric(1, base + offset))
        };

        ScannerConfig {
            port: self.port.unwrap_or_else(|| DEFAULT_PORT.to_string()),
            baud_rate: self.baudrate.unwrap_or(DEFAULT_BAUD_RATE),
            read_timeout_secs: self.timeout.unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
            rts_cts: self.rtscts.unwrap_or(false),
            dsr_dtr: self.dsrdtr.unwrap_or(false),
            barcode_tag: tag(self.barcode_node, 0),
            barcode_response_tag: tag(self.barcode_response_node, 1),
            beep_count_tag: tag(self.barcode_beep_count, 2),
            health_tag: tag(self.barcode_health_check, 3),
            health_message_tag: tag(self.barcode_health_check_message, 4),
        }
    }
}
