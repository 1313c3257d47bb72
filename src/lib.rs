//! # scantag - Serial barcode scanner to OPC UA bridge
//!
//! scantag connects one or more serial barcode scanners to an OPC UA tag
//! server. Every scanned code goes through a publish / confirm / acknowledge
//! handshake with the controller, and each scanner session keeps a heartbeat
//! counter on the server so the controller can see the bridge is alive.
//!
//! ## Features
//!
//! - **Session per scanner**: one tokio task per serial port, supervised together
//! - **Handshake**: publish the code, wait up to ~2 s for confirmation, then ACK and beep
//! - **Heartbeat**: health counter incremented about every 10 s, zeroed with a reason on stop
//! - **Configuration**: local JSON file or the remote configuration service
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use scantag::config::AppConfig;
//! use scantag::serial::SerialPortOpener;
//! use scantag::supervisor::Supervisor;
//! use scantag::tagbus::OpcUaTagBus;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let load = AppConfig::load_from(Path::new("scantag.json")).unwrap();
//!     let bus = Arc::new(OpcUaTagBus::new("opc.tcp://plc:4840", "pki"));
//!     let supervisor = Supervisor::new(Arc::new(SerialPortOpener), bus);
//!
//!     let report = supervisor
//!         .run(load.config.scanners, async { tokio::signal::ctrl_c().await.unwrap() })
//!         .await;
//!     println!("stopped: {}", report.reason);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Tag identifiers, tag values and the shutdown flag
//! - [`tagbus`] - The `TagBus` trait and its OPC UA implementation
//! - [`serial`] - The `SerialChannel` trait and its `serialport` implementation
//! - [`session`] - Per-scanner handshake engine and heartbeat
//! - [`supervisor`] - Starts, monitors and stops all sessions
//! - [`config`] - Local and remote configuration
//! - [`error`] - Error types for each layer

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod serial;
pub mod session;
pub mod supervisor;
pub mod tagbus;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{AppConfig, ScannerConfig};
pub use error::{CliError, SessionError};
pub use supervisor::{StopReason, Supervisor, SupervisorReport};
pub use types::{ShutdownSignal, TagId, TagValue};
