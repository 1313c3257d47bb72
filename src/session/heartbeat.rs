use crate::tagbus::TagBus;
use crate::types::{TagId, TagValue};
use tracing::{debug, warn};

/// Loop iterations between heartbeats (~10 s at the idle cadence).
pub const HEARTBEAT_TICKS: u32 = 100;

/// Increments the health tag every [`HEARTBEAT_TICKS`] loop iterations.
///
/// Failures are logged and never end the session.
#[derive(Debug)]
pub struct Heartbeat {
    tag: TagId,
    counter: u32,
}

impl Heartbeat {
    pub fn new(tag: TagId) -> Self {
        Self { tag, counter: 0 }
    }

    /// Count one loop iteration. Returns the value written when a beat was due
    /// and succeeded.
    pub async fn tick(&mut self, bus: &dyn TagBus) -> Option<i64> {
        self.counter += 1;
        if self.counter < HEARTBEAT_TICKS {
            return None;
        }
        self.counter = 0;
        self.beat(bus).await
    }

    async fn beat(&self, bus: &dyn TagBus) -> Option<i64> {
        let current = match bus.read_tag(&self.tag).await {
            Ok(TagValue::Int(n)) => n,
            Ok(other) => {
                warn!(tag = %self.tag, kind = other.kind(), "health tag is not an integer, skipping heartbeat");
                return None;
            }
            Err(e) => {
                warn!(tag = %self.tag, error = %e, "failed to read health tag");
                return None;
            }
        };

        let next = current.saturating_add(1);
        match bus.write_tag(&self.tag, TagValue::Int(next)).await {
            Ok(()) => {
                debug!(health = next, "heartbeat");
                Some(next)
            }
            Err(e) => {
                warn!(tag = %self.tag, error = %e, "failed to write heartbeat");
                None
            }
        }
    }
}
