//! Bounds-checked access to message bodies.

use nps_protocol::Message;

use crate::error::ServerError;

/// Reads big-endian fields out of a message body.
///
/// Offsets are relative to the body, which starts at byte 12 of the frame.
pub struct BodyReader<'a> {
    code: u16,
    body: &'a [u8],
}

impl<'a> BodyReader<'a> {
    pub fn new(message: &'a Message) -> Self {
        Self {
            code: message.code,
            body: &message.body,
        }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32, ServerError> {
        let raw = self.slice(offset, 4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn i32_at(&self, offset: usize) -> Result<i32, ServerError> {
        let raw = self.slice(offset, 4)?;
        Ok(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Everything from `offset` to the end of the body.
    pub fn rest(&self, offset: usize) -> Result<&'a [u8], ServerError> {
        self.body.get(offset..).ok_or_else(|| self.malformed(offset, 0))
    }

    /// Text from `offset` up to the first NUL, or the end of the body.
    pub fn c_string_at(&self, offset: usize) -> Result<String, ServerError> {
        let rest = self.rest(offset)?;
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        Ok(String::from_utf8_lossy(&rest[..end]).into_owned())
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], ServerError> {
        self.body
            .get(offset..offset + len)
            .ok_or_else(|| self.malformed(offset, len))
    }

    fn malformed(&self, offset: usize, len: usize) -> ServerError {
        ServerError::MalformedBody {
            code: self.code,
            reason: format!(
                "need {len} byte(s) at offset {offset}, body has {}",
                self.body.len()
            ),
        }
    }
}
