//! Serial channel abstraction.
//!
//! A session owns exactly one [`SerialChannel`]; nothing else touches it.
//! Channels are produced by a [`PortOpener`] so that tests can substitute
//! scripted devices.

mod port;

pub use port::{SerialLine, SerialPortOpener};

use crate::config::ScannerConfig;
use crate::error::SerialResult;
use async_trait::async_trait;

/// ACK byte sent to the scanner when a scan is confirmed.
pub const ACK: u8 = 0x06;

/// BEL byte; each one makes the scanner beep once.
pub const BEEP: u8 = 0x07;

/// An open, exclusively owned serial connection to a scanner.
#[async_trait]
pub trait SerialChannel: Send {
    /// Device path, for log lines.
    fn port_name(&self) -> &str;

    /// Whether received data is waiting. Never blocks.
    async fn pending(&mut self) -> SerialResult<bool>;

    /// Read one line, decoded and trimmed. Returns what was received if the
    /// read timeout expires before a newline.
    async fn read_line(&mut self) -> SerialResult<String>;

    /// Write a single byte.
    async fn write_byte(&mut self, byte: u8) -> SerialResult<()>;

    /// Close the channel. Further calls fail.
    async fn close(&mut self);
}

/// A boxed channel for dynamic dispatch.
pub type BoxedChannel = Box<dyn SerialChannel>;

/// Opens serial channels from scanner configuration.
#[async_trait]
pub trait PortOpener: Send + Sync {
    async fn open(&self, config: &ScannerConfig) -> SerialResult<BoxedChannel>;
}
