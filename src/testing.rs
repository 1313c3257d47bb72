//! In-memory tag bus and serial doubles for unit tests.
//!
//! None of these ever block or touch real I/O, so tests can run on tokio's
//! paused clock and cover multi-second windows instantly.

use crate::config::ScannerConfig;
use crate::error::{SerialError, SerialResult, TagError, TagResult};
use crate::serial::{BoxedChannel, PortOpener, SerialChannel};
use crate::tagbus::TagBus;
use crate::types::{TagId, TagValue};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

/// One tag bus call, as recorded by [`MockTagBus`].
#[derive(Debug, Clone, PartialEq)]
pub enum BusOp {
    Read(TagId),
    Write(TagId, TagValue),
}

#[derive(Default)]
struct BusState {
    values: HashMap<TagId, TagValue>,
    log: Vec<BusOp>,
    /// Reads since the last write, per tag.
    reads_since_write: HashMap<TagId, u32>,
    /// Tag reads `true` on this read after the latest write.
    confirm_on_read: HashMap<TagId, u32>,
    failing_reads: HashSet<TagId>,
    failing_writes: HashSet<TagId>,
}

/// Tag bus backed by a map, recording every call in order.
#[derive(Default)]
pub struct MockTagBus {
    state: Mutex<BusState>,
}

impl MockTagBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, tag: &TagId, value: impl Into<TagValue>) {
        let mut state = self.state.lock().unwrap();
        state.values.insert(tag.clone(), value.into());
    }

    pub fn get(&self, tag: &TagId) -> Option<TagValue> {
        self.state.lock().unwrap().values.get(tag).cloned()
    }

    /// Make `tag` read `true` on the `nth` read after each write to it.
    pub fn confirm_on_read(&self, tag: &TagId, nth: u32) {
        let mut state = self.state.lock().unwrap();
        state.confirm_on_read.insert(tag.clone(), nth);
    }

    pub fn fail_reads(&self, tag: &TagId) {
        self.state.lock().unwrap().failing_reads.insert(tag.clone());
    }

    pub fn fail_writes(&self, tag: &TagId) {
        self.state.lock().unwrap().failing_writes.insert(tag.clone());
    }

    pub fn log(&self) -> Vec<BusOp> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn reads_of(&self, tag: &TagId) -> usize {
        self.log()
            .iter()
            .filter(|op| matches!(op, BusOp::Read(t) if t == tag))
            .count()
    }

    pub fn writes_to(&self, tag: &TagId) -> Vec<TagValue> {
        self.log()
            .into_iter()
            .filter_map(|op| match op {
                BusOp::Write(t, v) if &t == tag => Some(v),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl TagBus for MockTagBus {
    async fn read_tag(&self, tag: &TagId) -> TagResult<TagValue> {
        let mut state = self.state.lock().unwrap();
        state.log.push(BusOp::Read(tag.clone()));

        if state.failing_reads.contains(tag) {
            return Err(TagError::Read {
                tag: tag.to_string(),
                reason: "mock read failure".into(),
            });
        }

        let count = {
            let count = state.reads_since_write.entry(tag.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if let Some(&nth) = state.confirm_on_read.get(tag) {
            return Ok(TagValue::Bool(count >= nth));
        }

        state.values.get(tag).cloned().ok_or_else(|| TagError::Read {
            tag: tag.to_string(),
            reason: "no such tag".into(),
        })
    }

    async fn write_tag(&self, tag: &TagId, value: TagValue) -> TagResult<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push(BusOp::Write(tag.clone(), value.clone()));

        if state.failing_writes.contains(tag) {
            return Err(TagError::Write {
                tag: tag.to_string(),
                reason: "mock write failure".into(),
            });
        }

        state.reads_since_write.insert(tag.clone(), 0);
        state.values.insert(tag.clone(), value);
        Ok(())
    }
}

/// Observable side of a [`MockSerial`], kept by the test after the channel
/// is handed to a session.
#[derive(Clone, Default)]
pub struct SerialRecorder {
    written: Arc<Mutex<Vec<(Instant, u8)>>>,
    closed: Arc<AtomicBool>,
}

impl SerialRecorder {
    pub fn bytes(&self) -> Vec<u8> {
        self.written.lock().unwrap().iter().map(|(_, b)| *b).collect()
    }

    pub fn writes(&self) -> Vec<(Instant, u8)> {
        self.written.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Scripted serial device: yields queued lines, records written bytes.
pub struct MockSerial {
    name: String,
    lines: VecDeque<String>,
    /// Fail `pending` once the queued lines are consumed.
    fail_when_drained: bool,
    /// Never answer `pending`, like a wedged driver.
    hang: bool,
    failing_bytes: HashSet<u8>,
    recorder: SerialRecorder,
}

impl MockSerial {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: VecDeque::new(),
            fail_when_drained: false,
            hang: false,
            failing_bytes: HashSet::new(),
            recorder: SerialRecorder::default(),
        }
    }

    pub fn with_lines(mut self, lines: &[&str]) -> Self {
        self.lines = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn failing_when_drained(mut self) -> Self {
        self.fail_when_drained = true;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn failing_writes_of(mut self, byte: u8) -> Self {
        self.failing_bytes.insert(byte);
        self
    }

    pub fn recorder(&self) -> SerialRecorder {
        self.recorder.clone()
    }
}

#[async_trait]
impl SerialChannel for MockSerial {
    fn port_name(&self) -> &str {
        &self.name
    }

    async fn pending(&mut self) -> SerialResult<bool> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.recorder.is_closed() {
            return Err(SerialError::Closed(self.name.clone()));
        }
        if self.lines.is_empty() && self.fail_when_drained {
            return Err(SerialError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            )));
        }
        Ok(!self.lines.is_empty())
    }

    async fn read_line(&mut self) -> SerialResult<String> {
        Ok(self.lines.pop_front().unwrap_or_default())
    }

    async fn write_byte(&mut self, byte: u8) -> SerialResult<()> {
        if self.failing_bytes.contains(&byte) {
            return Err(SerialError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "mock write failure",
            )));
        }
        self.recorder
            .written
            .lock()
            .unwrap()
            .push((Instant::now(), byte));
        Ok(())
    }

    async fn close(&mut self) {
        self.recorder.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out pre-built [`MockSerial`] channels by port name.
#[derive(Default)]
pub struct MockOpener {
    channels: Mutex<HashMap<String, MockSerial>>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel; returns its recorder.
    pub fn add(&self, channel: MockSerial) -> SerialRecorder {
        let recorder = channel.recorder();
        self.channels
            .lock()
            .unwrap()
            .insert(channel.name.clone(), channel);
        recorder
    }
}

#[async_trait]
impl PortOpener for MockOpener {
    async fn open(&self, config: &ScannerConfig) -> SerialResult<BoxedChannel> {
        self.channels
            .lock()
            .unwrap()
            .remove(&config.port)
            .map(|c| Box::new(c) as BoxedChannel)
            .ok_or_else(|| SerialError::Open {
                port: config.port.clone(),
                reason: "no such device".into(),
            })
    }
}

/// Scanner config on `port` with the default tag block for `index`.
pub fn scanner(index: usize, port: &str) -> ScannerConfig {
    let mut config = ScannerConfig::default_for(index);
    config.port = port.to_string();
    config
}
