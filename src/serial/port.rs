//! `serialport` implementation of the serial channel.
//!
//! `serialport` is blocking, so every operation hops onto tokio's blocking
//! pool. The port sits behind a mutex only so it can be moved into those
//! closures; a session never issues overlapping calls.

use super::{BoxedChannel, PortOpener, SerialChannel};
use crate::config::ScannerConfig;
use crate::error::{SerialError, SerialResult};
use async_trait::async_trait;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// A scanner connected over a serial line.
pub struct SerialLine {
    name: String,
    port: Option<SharedPort>,
}

impl SerialLine {
    /// Open the port described by `config`. Blocks.
    pub fn open_blocking(config: &ScannerConfig) -> SerialResult<Self> {
        let flow = if config.rts_cts {
            FlowControl::Hardware
        } else {
            FlowControl::None
        };

        let mut port = serialport::new(config.port.as_str(), config.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(flow)
            .timeout(config.read_timeout())
            .open()
            .map_err(|e| SerialError::Open {
                port: config.port.clone(),
                reason: e.to_string(),
            })?;

        // serialport has no DSR/DTR flow mode; assert DTR so the scanner sees a host.
        if config.dsr_dtr {
            port.write_data_terminal_ready(true)?;
        }

        debug!(port = %config.port, baud = config.baud_rate, "serial port opened");
        Ok(Self {
            name: config.port.clone(),
            port: Some(Arc::new(Mutex::new(port))),
        })
    }

    async fn with_port<T, F>(&self, op: F) -> SerialResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Box<dyn SerialPort>) -> SerialResult<T> + Send + 'static,
    {
        let port = self
            .port
            .clone()
            .ok_or_else(|| SerialError::Closed(self.name.clone()))?;

        tokio::task::spawn_blocking(move || {
            let mut guard = port
                .lock()
                .map_err(|_| SerialError::Worker("serial port lock poisoned".into()))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| SerialError::Worker(e.to_string()))?
    }
}

#[async_trait]
impl SerialChannel for SerialLine {
    fn port_name(&self) -> &str {
        &self.name
    }

    async fn pending(&mut self) -> SerialResult<bool> {
        self.with_port(|port| Ok(port.bytes_to_read()? > 0)).await
    }

    async fn read_line(&mut self) -> SerialResult<String> {
        let name = self.name.clone();
        self.with_port(move |port| {
            let raw = read_raw_line(&mut **port)?;
            if std::str::from_utf8(&raw).is_err() {
                warn!(port = %name, "scanner sent invalid UTF-8, decoding lossily");
            }
            Ok(decode_line(&raw))
        })
        .await
    }

    async fn write_byte(&mut self, byte: u8) -> SerialResult<()> {
        self.with_port(move |port| {
            port.write_all(&[byte])?;
            port.flush()?;
            Ok(())
        })
        .await
    }

    async fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(port = %self.name, "serial port closed");
        }
    }
}

/// Opens real serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortOpener;

#[async_trait]
impl PortOpener for SerialPortOpener {
    async fn open(&self, config: &ScannerConfig) -> SerialResult<BoxedChannel> {
        let config = config.clone();
        let line = tokio::task::spawn_blocking(move || SerialLine::open_blocking(&config))
            .await
            .map_err(|e| SerialError::Worker(e.to_string()))??;
        Ok(Box::new(line))
    }
}

/// Read up to and including `\n`, stopping early when the read timeout expires.
fn read_raw_line<R: Read + ?Sized>(reader: &mut R) -> SerialResult<Vec<u8>> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        match reader.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                line.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(line)
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}
