//! Mapping from message types to their destination sinks.

use groundlink_wire::{ChannelId, MessageType};

/// Where a decoded inbound frame should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    /// Acknowledgement; nothing to deliver.
    Ignore,
    /// Free-text log line for the operator console.
    EmitText,
    /// Sample payload bound for a channel sink. The caller must have
    /// validated `payload_len % record_size == 0` before delivering.
    Deliver(ChannelId),
    /// A type the stand should never send downstream (command codes, the
    /// generic payload code). Logged and dropped.
    Reject,
}

/// Route an inbound message type to its sink.
///
/// Keeping this a pure table lets the worker apply one uniform size check
/// before any per-type branching.
pub fn route(msg_type: MessageType) -> RouteTarget {
    if let Some(channel) = msg_type.channel() {
        return RouteTarget::Deliver(channel);
    }
    match msg_type {
        MessageType::AckValue => RouteTarget::Ignore,
        MessageType::Text => RouteTarget::EmitText,
        _ => RouteTarget::Reject,
    }
}
