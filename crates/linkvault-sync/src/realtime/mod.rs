//! Realtime change feed over the Phoenix channel protocol.

mod client;
mod protocol;

pub use client::{RealtimeConfig, RealtimeFeed, RealtimeStream};
pub use protocol::{channel_topic, realtime_url, PhoenixMessage};
