//! Core type definitions using newtype patterns for type safety.

mod shutdown;
mod tag;

pub use shutdown::ShutdownSignal;
pub use tag::{TagId, TagValue};
