//! The NPS message value type and its byte codec.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::codes::message_name;
use crate::error::{DecodeError, EncodeError};

/// Smallest buffer that still carries a code and a length.
pub const MIN_FRAME_LEN: usize = 4;

/// Size of the full header preceding the body.
pub const HEADER_LEN: usize = 12;

/// Largest body a 16-bit length field can describe.
pub const MAX_BODY_LEN: usize = u16::MAX as usize - HEADER_LEN;

/// Length of a frame carrying version and reserved but no body.
const VERSIONED_LEN: usize = 8;

/// Which way a message is travelling relative to this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Received from a client.
    #[default]
    Inbound,
    /// Produced by this server.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "in"),
            Direction::Outbound => write!(f, "out"),
        }
    }
}

/// A single NPS frame.
///
/// `length` is kept as an explicit field rather than derived because decoded
/// frames report whatever the peer declared. [`Message::new`] always produces a
/// self-consistent value; [`encode`] refuses inconsistent ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub code: u16,
    pub length: u16,
    pub version: u16,
    pub reserved: u16,
    pub body: Bytes,
    pub direction: Direction,
}

impl Message {
    /// Builds an outbound frame with a full header and `length = 12 + body.len()`.
    ///
    /// # Arguments
    ///
    /// * `code` - Message code, see [`crate::codes`]
    /// * `body` - Payload copied after the 12-byte header
    ///
    /// A body longer than [`MAX_BODY_LEN`] saturates the length field and is
    /// rejected later by [`encode`].
    pub fn new(code: u16, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let length = u16::try_from(HEADER_LEN + body.len()).unwrap_or(u16::MAX);
        Self {
            code,
            length,
            version: 0,
            reserved: 0,
            body,
            direction: Direction::Outbound,
        }
    }

    /// Builds a 4-byte, code-and-length-only frame.
    pub fn short(code: u16) -> Self {
        Self {
            code,
            length: MIN_FRAME_LEN as u16,
            version: 0,
            reserved: 0,
            body: Bytes::new(),
            direction: Direction::Outbound,
        }
    }

    /// Builds an 8-byte frame carrying only the version and reserved words.
    ///
    /// Clients send heartbeats in this form.
    pub fn versioned(code: u16, version: u16) -> Self {
        Self {
            code,
            length: VERSIONED_LEN as u16,
            version,
            reserved: 0,
            body: Bytes::new(),
            direction: Direction::Outbound,
        }
    }

    /// Human readable name of this frame's code, `"Unknown"` when unmapped.
    pub fn name(&self) -> &'static str {
        message_name(self.code)
    }

    /// One-line dump used by debug logging.
    pub fn summary(&self) -> String {
        format!(
            "{} {} (0x{:04x}) len={} ver={} body={}",
            self.direction,
            self.name(),
            self.code,
            self.length,
            self.version,
            hex::encode(&self.body)
        )
    }

    /// Serializes this message. See [`encode`].
    ///
    /// # Returns
    ///
    /// The wire bytes, exactly `length` long, or an [`EncodeError`] when the
    /// declared length does not fit the body.
    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        encode(self)
    }
}

/// Serializes a message into its wire representation.
///
/// Accepted declared lengths are 4 and 8 for body-less frames, otherwise
/// exactly `12 + body.len()`.
pub fn encode(message: &Message) -> Result<Bytes, EncodeError> {
    let body_len = message.body.len();
    if body_len > MAX_BODY_LEN {
        return Err(EncodeError::BodyTooLarge {
            body: body_len,
            max: MAX_BODY_LEN,
        });
    }

    let declared = message.length as usize;
    if declared < MIN_FRAME_LEN {
        return Err(EncodeError::InvalidLength {
            declared: message.length,
        });
    }

    let consistent = match declared {
        MIN_FRAME_LEN | VERSIONED_LEN => body_len == 0,
        d => d == HEADER_LEN + body_len,
    };
    if !consistent {
        return Err(EncodeError::LengthMismatch {
            declared: message.length,
            body: body_len,
            expected: HEADER_LEN + body_len,
        });
    }

    let mut buf = BytesMut::with_capacity(declared);
    buf.put_u16(message.code);
    buf.put_u16(message.length);
    if declared > MIN_FRAME_LEN {
        buf.put_u16(message.version);
        buf.put_u16(message.reserved);
    }
    if declared > VERSIONED_LEN {
        buf.put_u32(u32::from(message.length));
        buf.put_slice(&message.body);
    }

    Ok(buf.freeze())
}

/// Parses a raw buffer into an inbound [`Message`].
///
/// Only a buffer shorter than 4 bytes is rejected. Fields the buffer is too
/// short to carry read as zero / empty so callers can still route and log the
/// frame.
pub fn decode(raw: &[u8]) -> Result<Message, DecodeError> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(DecodeError::TooShort { len: raw.len() });
    }

    let code = u16::from_be_bytes([raw[0], raw[1]]);
    let length = u16::from_be_bytes([raw[2], raw[3]]);

    let (version, reserved) = if length as usize > MIN_FRAME_LEN {
        (read_u16(raw, 4), read_u16(raw, 6))
    } else {
        (0, 0)
    };

    let body = if length as usize > VERSIONED_LEN && raw.len() > HEADER_LEN {
        Bytes::copy_from_slice(&raw[HEADER_LEN..])
    } else {
        Bytes::new()
    };

    Ok(Message {
        code,
        length,
        version,
        reserved,
        body,
        direction: Direction::Inbound,
    })
}

fn read_u16(raw: &[u8], offset: usize) -> u16 {
    raw.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .unwrap_or(0)
}
