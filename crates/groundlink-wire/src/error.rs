/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Fewer bytes than one header requires.
    #[error("short header ({got} bytes, need {need})")]
    ShortHeader { got: usize, need: usize },

    /// Fewer bytes than one payload record requires.
    #[error("short payload record ({got} bytes, need {need})")]
    ShortRecord { got: usize, need: usize },

    /// A type code outside the closed message set.
    #[error("unknown message type code {0:#04x}")]
    UnknownMessageType(u8),

    /// A payload whose length is not a whole number of records.
    #[error("payload length {len} is not a multiple of the {record_size}-byte record size")]
    PayloadNotRecordAligned { len: usize, record_size: usize },

    /// A declared payload length above the configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A wire profile whose layout constants are inconsistent.
    #[error("invalid wire profile: {0}")]
    InvalidProfile(&'static str),
}

pub type Result<T> = std::result::Result<T, WireError>;
