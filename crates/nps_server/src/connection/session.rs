//! Connection lifecycle and session keys.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::connection::FrameCipher;
use crate::error::ServerError;

/// Size in bytes of the session key slot.
pub const SESSION_KEY_LEN: usize = 32;

/// Lifecycle state of a connection. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Inactive,
    Active,
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Inactive => "INACTIVE",
            ConnectionStatus::Active => "ACTIVE",
            ConnectionStatus::Closed => "CLOSED",
        };
        f.write_str(label)
    }
}

/// A 32-byte session key, carried on the wire and in storage as 64 lowercase
/// hex characters.
///
/// Input that is already 64 hex characters is taken as-is. Anything else is
/// copied into a zeroed 32-byte slot (truncated when longer) and hex encoded.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    pub fn from_bytes(bytes: [u8; SESSION_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_input(input: &str) -> Self {
        let mut slot = [0u8; SESSION_KEY_LEN];
        if input.len() == SESSION_KEY_LEN * 2 && hex::decode_to_slice(input, &mut slot).is_ok() {
            return Self(slot);
        }

        let mut slot = [0u8; SESSION_KEY_LEN];
        let raw = input.as_bytes();
        let n = raw.len().min(SESSION_KEY_LEN);
        slot[..n].copy_from_slice(&raw[..n]);
        Self(slot)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }

    /// The 64-character hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 16 hex characters, the short key older clients echo back.
    pub fn short_key(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl From<&str> for SessionKey {
    fn from(input: &str) -> Self {
        Self::from_input(input)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// Keys never end up in logs in full.
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({}..)", self.short_key())
    }
}

/// State for one client socket.
pub struct Connection {
    id: String,
    local_port: u16,
    remote_addr: Option<SocketAddr>,
    status: ConnectionStatus,
    session_key: Option<SessionKey>,
    customer_id: Option<u32>,
    cipher: Option<Box<dyn FrameCipher>>,
    connected_at: Instant,
    last_activity: Instant,
}

impl Connection {
    /// Creates an `INACTIVE` connection with no encryption and no key.
    pub fn new(id: impl Into<String>, local_port: u16) -> Self {
        let now = Instant::now();
        Self {
            id: id.into(),
            local_port,
            remote_addr: None,
            status: ConnectionStatus::Inactive,
            session_key: None,
            customer_id: None,
            cipher: None,
            connected_at: now,
            last_activity: now,
        }
    }

    /// Creates the connection for a freshly accepted socket.
    ///
    /// The id joins the peer address and the local port, which is unique for
    /// as long as the socket lives.
    pub fn accepted(remote_addr: SocketAddr, local_port: u16) -> Self {
        let mut connection = Self::new(format!("{remote_addr}_{local_port}"), local_port);
        connection.remote_addr = Some(remote_addr);
        connection
    }

    /// Stable identifier used in every log line about this connection.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Port of the listener that accepted the socket. Never changes.
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Peer address, `None` for connections built without a socket.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether the connection is `ACTIVE`.
    pub fn is_active(&self) -> bool {
        self.status == ConnectionStatus::Active
    }

    /// Whether the connection reached the terminal `CLOSED` state.
    pub fn is_closed(&self) -> bool {
        self.status == ConnectionStatus::Closed
    }

    /// `INACTIVE -> ACTIVE`. Activating an active connection is a no-op; a
    /// closed connection can never come back.
    pub fn activate(&mut self) -> Result<(), ServerError> {
        match self.status {
            ConnectionStatus::Inactive => {
                self.status = ConnectionStatus::Active;
                debug!(connection = %self.id, "Connection active");
                Ok(())
            }
            ConnectionStatus::Active => Ok(()),
            ConnectionStatus::Closed => Err(ServerError::InvalidTransition {
                connection: self.id.clone(),
                from: ConnectionStatus::Closed,
                to: ConnectionStatus::Active,
            }),
        }
    }

    /// Moves to `CLOSED` from any state and drops the cipher.
    pub fn close(&mut self) {
        if self.status != ConnectionStatus::Closed {
            debug!(connection = %self.id, from = %self.status, "Connection closed");
            self.status = ConnectionStatus::Closed;
            self.cipher = None;
        }
    }

    /// Stores the session key, normalising `key` into the 32-byte slot.
    pub fn set_session_key(&mut self, key: impl Into<SessionKey>) -> &SessionKey {
        self.session_key.insert(key.into())
    }

    /// The session key, once a login has set one.
    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    /// Customer bound to this connection by a login.
    pub fn customer_id(&self) -> Option<u32> {
        self.customer_id
    }

    pub fn set_customer_id(&mut self, customer_id: u32) {
        self.customer_id = Some(customer_id);
    }

    /// Turns encryption on. Only allowed once, and only while `ACTIVE`.
    ///
    /// # Arguments
    ///
    /// * `cipher` - Cipher keyed for this connection's session
    ///
    /// # Returns
    ///
    /// [`ServerError::EncryptionAlreadyEnabled`] on a second call. The cipher
    /// already in place is kept.
    pub fn enable_encryption(&mut self, cipher: Box<dyn FrameCipher>) -> Result<(), ServerError> {
        if self.cipher.is_some() {
            return Err(ServerError::EncryptionAlreadyEnabled(self.id.clone()));
        }
        if self.status != ConnectionStatus::Active {
            return Err(ServerError::Internal(format!(
                "cannot enable encryption on {} connection {}",
                self.status, self.id
            )));
        }
        self.cipher = Some(cipher);
        debug!(connection = %self.id, "Encryption enabled");
        Ok(())
    }

    /// Whether [`Connection::enable_encryption`] has succeeded.
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// The active cipher. Always `Some` while [`Connection::is_encrypted`].
    pub fn cipher_mut(&mut self) -> Option<&mut (dyn FrameCipher + 'static)> {
        self.cipher.as_deref_mut()
    }

    /// Records inbound traffic.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Time since the last inbound frame.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("local_port", &self.local_port)
            .field("status", &self.status)
            .field("customer_id", &self.customer_id)
            .field("session_key", &self.session_key)
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::PlaintextCipher;

    #[test]
    fn test_new_connection_defaults() {
        let connection = Connection::new("c1", 8226);
        assert_eq!(connection.status(), ConnectionStatus::Inactive);
        assert!(!connection.is_encrypted());
        assert!(connection.session_key().is_none());
        assert_eq!(connection.local_port(), 8226);
    }

    #[test]
    fn test_accepted_id_combines_peer_and_port() {
        let connection = Connection::accepted("10.0.0.5:51000".parse().unwrap(), 8228);
        assert_eq!(connection.id(), "10.0.0.5:51000_8228");
        assert_eq!(connection.remote_addr().unwrap().port(), 51000);
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut connection = Connection::new("c1", 7003);
        connection.activate().unwrap();
        connection.activate().unwrap();
        assert!(connection.is_active());

        connection.close();
        connection.close();
        assert!(connection.is_closed());

        let err = connection.activate().unwrap_err();
        assert!(matches!(
            err,
            ServerError::InvalidTransition {
                from: ConnectionStatus::Closed,
                to: ConnectionStatus::Active,
                ..
            }
        ));
    }

    #[test]
    fn test_inactive_can_close_directly() {
        let mut connection = Connection::new("c1", 7003);
        connection.close();
        assert!(connection.is_closed());
    }

    #[test]
    fn test_session_key_pads_short_input() {
        let mut connection = Connection::new("c1", 7003);
        let key = connection.set_session_key("123").to_hex();
        assert_eq!(key.len(), 64);
        assert!(key.starts_with("313233"));
        assert!(key[6..].chars().all(|c| c == '0'));
    }

    #[test]
    fn test_session_key_keeps_hex_input() {
        let input = "AB".repeat(32);
        let key = SessionKey::from_input(&input);
        assert_eq!(key.to_hex(), "ab".repeat(32));
        assert_eq!(key.short_key(), "ab".repeat(8));
    }

    #[test]
    fn test_session_key_truncates_long_input() {
        let key = SessionKey::from_input(&"z".repeat(80));
        assert_eq!(key.as_bytes(), &[b'z'; SESSION_KEY_LEN]);
    }

    #[test]
    fn test_encryption_requires_active_and_enables_once() {
        let mut connection = Connection::new("c1", 7003);
        assert!(connection.enable_encryption(Box::new(PlaintextCipher)).is_err());

        connection.activate().unwrap();
        connection.enable_encryption(Box::new(PlaintextCipher)).unwrap();
        assert!(connection.is_encrypted());

        let err = connection.enable_encryption(Box::new(PlaintextCipher)).unwrap_err();
        assert!(matches!(err, ServerError::EncryptionAlreadyEnabled(_)));
    }

    #[test]
    fn test_close_drops_cipher() {
        let mut connection = Connection::new("c1", 7003);
        connection.activate().unwrap();
        connection.enable_encryption(Box::new(PlaintextCipher)).unwrap();
        connection.close();
        assert!(!connection.is_encrypted());
    }
}
