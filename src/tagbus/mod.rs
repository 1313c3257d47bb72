//! Tag bus abstraction.
//!
//! Sessions talk to the automation server only through [`TagBus`]. Every call
//! is a complete transaction; implementations must not rely on ordering or a
//! persistent connection between calls.

mod opc;

pub use opc::{OpcUaTagBus, DEFAULT_ENDPOINT};

use crate::error::TagResult;
use crate::types::{TagId, TagValue};
use async_trait::async_trait;
use std::sync::Arc;

/// Read/write access to tags on the automation server.
///
/// # Example
///
/// ```ignore
/// use scantag::tagbus::TagBus;
/// use scantag::types::{TagId, TagValue};
///
/// async fn clear<B: TagBus>(bus: &B, tag: &TagId) {
///     let _ = bus.write_tag(tag, TagValue::Bool(false)).await;
/// }
/// ```
#[async_trait]
pub trait TagBus: Send + Sync {
    /// Read the current value of `tag`.
    async fn read_tag(&self, tag: &TagId) -> TagResult<TagValue>;

    /// Write `value` to `tag`.
    async fn write_tag(&self, tag: &TagId, value: TagValue) -> TagResult<()>;
}

/// A shared tag bus for dynamic dispatch across sessions.
pub type SharedTagBus = Arc<dyn TagBus>;
