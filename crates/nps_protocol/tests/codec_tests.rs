//! Byte-level codec scenarios taken from captured client traffic.

use bytes::Bytes;
use futures::StreamExt;
use nps_protocol::codes::{NPS_GET_PERSONA_MAPS, NPS_HEARTBEAT_ACK};
use nps_protocol::{decode, encode, message_name, Direction, Message, NpsFrameCodec};
use tokio_util::codec::FramedRead;

const HEARTBEAT_ACK_FRAME: [u8; 12] = [
    0x01, 0x27, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0C,
];

#[test]
fn test_empty_body_frame_reencodes_identically() {
    let message = decode(&HEARTBEAT_ACK_FRAME).expect("valid frame");
    assert_eq!(message.code, NPS_HEARTBEAT_ACK);
    assert_eq!(message.length, 12);
    assert_eq!(message.version, 0);
    assert!(message.body.is_empty());

    let encoded = encode(&message).expect("consistent frame");
    assert_eq!(&encoded[..], &HEARTBEAT_ACK_FRAME[..]);
}

#[test]
fn test_persona_maps_request_body_offset() {
    let mut raw = vec![0x05, 0x32, 0x00, 0x10, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10];
    raw.extend_from_slice(&5_551_212u32.to_be_bytes());

    let message = decode(&raw).expect("valid frame");
    assert_eq!(message.code, NPS_GET_PERSONA_MAPS);
    assert_eq!(message.version, 0x0101);
    assert_eq!(message.name(), "NPS_GET_PERSONA_MAPS");
    assert_eq!(&message.body[..], &5_551_212u32.to_be_bytes());
    assert_eq!(message.direction, Direction::Inbound);
}

#[test]
fn test_outbound_frame_preserves_fields() {
    let mut message = Message::new(0x607, Bytes::from_static(b"persona"));
    message.version = 0x0101;
    message.direction = Direction::Inbound;
    let decoded = decode(&encode(&message).unwrap()).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn test_unknown_code_still_decodes() {
    let message = decode(&[0xBE, 0xEF, 0x00, 0x04]).unwrap();
    assert_eq!(message_name(message.code), "Unknown");
    assert_eq!(message.length, 4);
}

#[tokio::test]
async fn test_framed_reader_splits_stream() {
    let mut stream = Vec::new();
    stream.extend_from_slice(&HEARTBEAT_ACK_FRAME);
    stream.extend_from_slice(&encode(&Message::new(0x532, vec![0, 0, 0, 7])).unwrap());
    stream.extend_from_slice(&[0x02, 0x07, 0x00, 0x04]);

    let mut frames = FramedRead::new(&stream[..], NpsFrameCodec::new());
    let mut codes = Vec::new();
    while let Some(frame) = frames.next().await {
        let frame = frame.expect("well-formed stream");
        codes.push(decode(&frame).unwrap().code);
    }

    assert_eq!(codes, vec![0x127, 0x532, 0x207]);
}
