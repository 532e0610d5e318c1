//! Message plumbing for sub-task delivery and chatter events.
//!
//! This module contains:
//! - `ChannelWorkQueue`: in-process work queue on a tokio broadcast channel
//! - `MockWorkQueue`: records sends for tests
//! - Chatter sinks: tracing log, broadcast channel, mock

#[cfg(feature = "channel")]
pub mod channel;
pub mod chatter;
pub mod mock;

#[cfg(feature = "channel")]
pub use channel::ChannelWorkQueue;
pub use chatter::{ChannelChatterSink, LogChatterSink, MockChatterSink};
pub use mock::MockWorkQueue;
