//! Encoding and decoding of the test stand's binary framing.
//!
//! Every frame is one header plus zero or more fixed-size payload records.
//! Header layout comes entirely from the active [`WireProfile`]; the codec
//! itself never branches on the endpoint variant.

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::error::{Result, WireError};
use crate::message::MessageType;
use crate::profile::WireProfile;

/// Default maximum payload size accepted from the wire: 64 KiB.
///
/// The stand sends at most a few hundred records per frame; anything near
/// this limit means the stream has lost framing.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// One header plus its payload as sent over the transport.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The decoded message type code.
    pub msg_type: MessageType,
    /// The payload bytes, excluding the header.
    pub payload: Bytes,
}

impl Frame {
    /// Payload length in bytes.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

/// One fixed-size payload record: a raw sensor reading and its capture time.
///
/// The firmware's struct tables declare a 2-byte reading field, but every
/// decode site in the reference system unpacks two 8-byte integers. The
/// 16-byte two-`u64` little-endian layout is canonical here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRecord {
    /// Raw sensor value, uncalibrated.
    pub raw: u64,
    /// Firmware capture timestamp.
    pub timestamp: u64,
}

/// Encode a frame header into `dst`.
///
/// Wire format (profile-defined sizes; `pi` variant shown):
/// ```text
/// ┌───────────┬──────────┬────────────────┬──────────┐
/// │ Type (1B) │ Pad      │ Length (4B LE) │ Pad      │
/// └───────────┴──────────┴────────────────┴──────────┘
/// ```
pub fn encode_header(
    msg_type: MessageType,
    payload_len: u32,
    profile: &WireProfile,
    dst: &mut BytesMut,
) {
    let start = dst.len();
    dst.resize(start + profile.header_size, 0);
    dst[start + profile.header_type_offset] = msg_type.as_u8();
    let len_at = start + profile.header_len_offset;
    dst[len_at..len_at + 4].copy_from_slice(&payload_len.to_le_bytes());
}

/// Encode a command frame: a lone header with a zero-length payload.
pub fn encode_command(msg_type: MessageType, profile: &WireProfile) -> BytesMut {
    let mut buf = BytesMut::with_capacity(profile.header_size);
    encode_header(msg_type, 0, profile, &mut buf);
    buf
}

/// Encode a free-text frame: a `Text` header followed by UTF-8 bytes.
pub fn encode_text(text: &str, profile: &WireProfile) -> Result<BytesMut> {
    if text.len() > u32::MAX as usize {
        return Err(WireError::PayloadTooLarge {
            size: text.len(),
            max: u32::MAX as usize,
        });
    }
    let mut buf = BytesMut::with_capacity(profile.header_size + text.len());
    encode_header(MessageType::Text, text.len() as u32, profile, &mut buf);
    buf.extend_from_slice(text.as_bytes());
    Ok(buf)
}

/// Decode a frame header from a byte slice.
///
/// Operates on byte-range slices of the received buffer; no per-field
/// allocation.
pub fn decode_header(src: &[u8], profile: &WireProfile) -> Result<(MessageType, usize)> {
    if src.len() < profile.header_size {
        return Err(WireError::ShortHeader {
            got: src.len(),
            need: profile.header_size,
        });
    }
    let len_at = profile.header_len_offset;
    let payload_len = u32::from_le_bytes(src[len_at..len_at + 4].try_into().unwrap()) as usize;
    let msg_type = MessageType::from_u8(src[profile.header_type_offset])?;
    Ok((msg_type, payload_len))
}

/// Decode one payload record from a byte slice.
pub fn decode_record(src: &[u8], profile: &WireProfile) -> Result<SampleRecord> {
    if src.len() < profile.record_size {
        return Err(WireError::ShortRecord {
            got: src.len(),
            need: profile.record_size,
        });
    }
    Ok(SampleRecord {
        raw: u64::from_le_bytes(src[0..8].try_into().unwrap()),
        timestamp: u64::from_le_bytes(src[8..16].try_into().unwrap()),
    })
}

/// Split a payload into its fixed-size records.
///
/// A payload whose length is not a whole number of records is a framing
/// error; no records are produced.
pub fn split_records<'a>(
    payload: &'a [u8],
    profile: &WireProfile,
) -> Result<impl Iterator<Item = SampleRecord> + 'a> {
    if payload.len() % profile.record_size != 0 {
        return Err(WireError::PayloadNotRecordAligned {
            len: payload.len(),
            record_size: profile.record_size,
        });
    }
    Ok(payload
        .chunks_exact(profile.record_size)
        .map(|chunk| SampleRecord {
            raw: u64::from_le_bytes(chunk[0..8].try_into().unwrap()),
            timestamp: u64::from_le_bytes(chunk[8..16].try_into().unwrap()),
        }))
}

/// Extract the next complete frame from an accumulation buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
///
/// A frame with an unknown type code is also consumed in full before the
/// error is returned, so the stream stays framed and the caller can drop
/// the offending frame and keep reading.
pub fn extract_frame(
    src: &mut BytesMut,
    profile: &WireProfile,
    max_payload: usize,
) -> Result<Option<Frame>> {
    if src.len() < profile.header_size {
        return Ok(None); // Need more data
    }

    let len_at = profile.header_len_offset;
    let payload_len = u32::from_le_bytes(src[len_at..len_at + 4].try_into().unwrap()) as usize;

    if payload_len > max_payload {
        return Err(WireError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = profile.header_size + payload_len;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let type_code = src[profile.header_type_offset];
    src.advance(profile.header_size);
    let payload = src.split_to(payload_len).freeze();

    let msg_type = MessageType::from_u8(type_code)?;
    trace!(
        msg_type = msg_type.name(),
        payload_len,
        "extracted frame"
    );
    Ok(Some(Frame { msg_type, payload }))
}
