//! # NPS Protocol
//!
//! Wire-level building blocks for the NPS family of game services (login, persona
//! and lobby). Everything in this crate is pure data transformation: no sockets,
//! no state, no knowledge of which service a frame belongs to.
//!
//! ## Frame layout
//!
//! All multi-byte integers are big-endian.
//!
//! | Offset | Size | Field      | Present when   |
//! |--------|------|------------|----------------|
//! | 0      | 2    | `code`     | always         |
//! | 2      | 2    | `length`   | always         |
//! | 4      | 2    | `version`  | `length > 4`   |
//! | 6      | 2    | `reserved` | `length > 4`   |
//! | 8      | 4    | `length`   | `length > 8`   |
//! | 12     | n    | body       | `length > 8`   |
//!
//! For any frame carrying a body, `length == 12 + body.len()`.
//!
//! ## Modules
//!
//! * [`message`] - the [`Message`] value type plus [`encode`] / [`decode`]
//! * [`codes`] - message code constants and the static code → name table
//! * [`framing`] - a `tokio_util` codec that splits a TCP stream into whole frames
//! * [`error`] - codec error types

pub mod codes;
pub mod error;
pub mod framing;
pub mod message;

pub use codes::message_name;
pub use error::{DecodeError, EncodeError, FrameError};
pub use framing::NpsFrameCodec;
pub use message::{decode, encode, Direction, Message, HEADER_LEN, MAX_BODY_LEN, MIN_FRAME_LEN};
