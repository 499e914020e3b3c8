//! Wire-level building blocks for the test-stand telemetry link.
//!
//! Byte-layout profiles for the known remote endpoint variants, the closed
//! set of message type codes spoken by the data acquisition firmware, and a
//! codec for the compact binary framing those endpoints use. No I/O happens
//! here; everything operates on byte slices and accumulation buffers.

pub mod codec;
pub mod error;
pub mod message;
pub mod profile;

pub use codec::{
    decode_header, decode_record, encode_command, encode_header, encode_text, extract_frame,
    split_records, Frame, SampleRecord, DEFAULT_MAX_PAYLOAD,
};
pub use error::{Result, WireError};
pub use message::{ChannelId, MessageType};
pub use profile::{default_selector, ProfileSelector, WireProfile, GENERIC_PROFILE, PI_PROFILE};
