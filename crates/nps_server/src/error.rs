//! Error taxonomy for the server library.

use nps_protocol::{DecodeError, EncodeError};
use thiserror::Error;

use crate::connection::ConnectionStatus;
use crate::registry::ServiceName;

/// Every failure the server library can surface.
///
/// Failures are scoped to one connection: [`ServerError::keeps_connection_open`]
/// tells the connection task whether to keep reading or tear the socket down.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// No handler is registered for the local port a frame arrived on.
    #[error("No handler registered for local port {0}")]
    UnroutablePort(u16),

    #[error("{handler} handler does not understand message code 0x{code:04x}")]
    UnknownMessageCode { handler: &'static str, code: u16 },

    #[error("Service {0} is not registered")]
    NotRegistered(ServiceName),

    #[error("No session for customer {0}")]
    SessionNotFound(u32),

    #[error("No persona with id {0}")]
    PersonaNotFound(u32),

    /// A body was too short or otherwise unreadable for its message code.
    #[error("Malformed body for message code 0x{code:04x}: {reason}")]
    MalformedBody { code: u16, reason: String },

    #[error("Connection {connection} cannot move from {from} to {to}")]
    InvalidTransition {
        connection: String,
        from: ConnectionStatus,
        to: ConnectionStatus,
    },

    #[error("Encryption is already enabled on connection {0}")]
    EncryptionAlreadyEnabled(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Whether the connection that produced this error should keep reading.
    ///
    /// Bad input from a peer is logged and skipped; anything that leaves the
    /// connection in an unknown protocol state closes it.
    pub fn keeps_connection_open(&self) -> bool {
        matches!(
            self,
            ServerError::Decode(_)
                | ServerError::UnroutablePort(_)
                | ServerError::MalformedBody { .. }
                | ServerError::SessionNotFound(_)
                | ServerError::PersonaNotFound(_)
        )
    }
}
