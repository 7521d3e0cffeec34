//! Stream framing for NPS over TCP.
//!
//! The codec yields raw frames rather than decoded [`crate::Message`]s: the
//! dispatcher owns decoding so that it can decrypt envelopes first.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::FrameError;
use crate::message::MIN_FRAME_LEN;

/// Splits a byte stream on the 16-bit length at offset 2.
#[derive(Debug, Clone, Copy, Default)]
pub struct NpsFrameCodec;

impl NpsFrameCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for NpsFrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < MIN_FRAME_LEN {
            return Ok(None);
        }

        let declared = u16::from_be_bytes([src[2], src[3]]);
        let length = declared as usize;
        if length < MIN_FRAME_LEN {
            return Err(FrameError::InvalidLength { declared });
        }

        if src.len() < length {
            src.reserve(length - src.len());
            return Ok(None);
        }

        trace!(length, buffered = src.len(), "Framed NPS message");
        Ok(Some(src.split_to(length).freeze()))
    }
}

impl Encoder<Bytes> for NpsFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waits_for_header() {
        let mut codec = NpsFrameCodec::new();
        let mut buf = BytesMut::from(&[0x01, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_waits_for_full_body() {
        let mut codec = NpsFrameCodec::new();
        let mut buf = BytesMut::from(&[0x05, 0x32, 0x00, 0x10, 0x00, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0u8; 10]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.len(), 16);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_splits_back_to_back_frames() {
        let mut codec = NpsFrameCodec::new();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x02, 0x07, 0x00, 0x04]);
        buf.extend_from_slice(&[0x02, 0x17, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00]);

        let first = codec.decode(&mut buf).unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&first[..2], &[0x02, 0x07]);
        assert_eq!(second.len(), 8);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_rejects_impossible_length() {
        let mut codec = NpsFrameCodec::new();
        let mut buf = BytesMut::from(&[0x01, 0x00, 0x00, 0x02][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(FrameError::InvalidLength { declared: 2 })
        ));
    }
}
