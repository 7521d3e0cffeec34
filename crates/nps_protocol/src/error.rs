//! Error types produced by the codec and the stream framer.

use thiserror::Error;

/// Failure to interpret a buffer as an NPS frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer cannot even hold the code and length fields.
    #[error("frame too short: got {len} byte(s), need at least 4")]
    TooShort { len: usize },
}

/// Failure to serialize a [`crate::Message`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Declared length is below the 4-byte minimum.
    #[error("declared length {declared} is below the 4-byte minimum")]
    InvalidLength { declared: u16 },

    /// Declared length does not describe the body that would be written.
    #[error("declared length {declared} does not match a {body}-byte body (expected {expected})")]
    LengthMismatch {
        declared: u16,
        body: usize,
        expected: usize,
    },

    /// The body cannot be described by a 16-bit length field.
    #[error("body of {body} bytes exceeds the maximum of {max}")]
    BodyTooLarge { body: usize, max: usize },
}

/// Errors raised while splitting a byte stream into frames.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream announced a frame shorter than its own header.
    #[error("stream declared an impossible frame length of {declared}")]
    InvalidLength { declared: u16 },
}
