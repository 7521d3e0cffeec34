//! Per-socket connection state.
//!
//! A [`Connection`] is owned by exactly one connection task; handlers receive
//! it as `&mut` for the duration of a single frame, so there is never more than
//! one writer.

pub mod cipher;
pub mod session;

pub use cipher::{CipherFactory, FrameCipher, PlaintextCipher, PlaintextCipherFactory};
pub use session::{Connection, ConnectionStatus, SessionKey};
