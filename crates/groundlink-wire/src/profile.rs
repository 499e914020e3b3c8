//! Byte-layout profiles for the known remote endpoint variants.
//!
//! The flight computer and the generic localhost test server frame their
//! messages identically except for header size and padding. Keeping those
//! constants in a profile lets one codec serve both without branching at
//! call sites.

use std::net::IpAddr;

use crate::error::{Result, WireError};

/// The set of byte-layout constants describing header and payload structure
/// for one class of remote endpoint. All multi-byte fields are
/// little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireProfile {
    /// Short name for diagnostics.
    pub name: &'static str,
    /// Total header size on the wire.
    pub header_size: usize,
    /// Offset of the one-byte message type code within the header.
    pub header_type_offset: usize,
    /// Offset of the `u32` payload length field within the header.
    pub header_len_offset: usize,
    /// Width of the payload length field.
    pub header_len_size: usize,
    /// Trailing pad bytes after the length field.
    pub header_end_pad: usize,
    /// Fixed size of one payload record.
    pub record_size: usize,
}

/// The primary target: the Pi data acquisition unit on the test stand.
/// 8-byte header, length at offset 4, no trailing pad.
pub const PI_PROFILE: WireProfile = WireProfile {
    name: "pi",
    header_size: 8,
    header_type_offset: 0,
    header_len_offset: 4,
    header_len_size: 4,
    header_end_pad: 0,
    record_size: 16,
};

/// Generic endpoints, usually a localhost server used for bench tests.
/// 16-byte header, length at offset 8, four pad bytes at the end.
pub const GENERIC_PROFILE: WireProfile = WireProfile {
    name: "generic",
    header_size: 16,
    header_type_offset: 0,
    header_len_offset: 8,
    header_len_size: 4,
    header_end_pad: 4,
    record_size: 16,
};

impl WireProfile {
    /// Check the profile's layout constants for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.header_size < self.header_type_offset + 1 {
            return Err(WireError::InvalidProfile("type code past end of header"));
        }
        if self.header_size < self.header_len_offset + self.header_len_size {
            return Err(WireError::InvalidProfile("length field past end of header"));
        }
        if self.header_len_size != 4 {
            return Err(WireError::InvalidProfile("length field must be 4 bytes"));
        }
        if self.header_len_offset + self.header_len_size + self.header_end_pad != self.header_size {
            return Err(WireError::InvalidProfile("pad bytes do not fill the header"));
        }
        if self.record_size < 16 {
            return Err(WireError::InvalidProfile(
                "record must hold two u64 fields",
            ));
        }
        Ok(())
    }
}

/// Chooses the wire profile for a peer, once per connection.
///
/// Replaces the original deployment's reverse-DNS hostname comparison with
/// an injectable capability that needs no network access. Deployments that
/// really do want hostname-based selection supply their own closure.
pub type ProfileSelector = dyn Fn(IpAddr) -> &'static WireProfile + Send + Sync;

/// Default selection: loopback peers are assumed to be the generic bench
/// server; anything else is the Pi on the stand.
pub fn default_selector(peer: IpAddr) -> &'static WireProfile {
    if peer.is_loopback() {
        &GENERIC_PROFILE
    } else {
        &PI_PROFILE
    }
}
