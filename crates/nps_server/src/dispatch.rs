//! Packet dispatcher.
//!
//! Turns one raw inbound frame into one encoded response by way of the handler
//! registered for the frame's local port. Encrypted envelopes are opened before
//! the handler sees them and sealed again on the way out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use nps_protocol::codes::NPS_CRYPTO_DES_CBC;
use nps_protocol::{decode, Message};
use tracing::{debug, error, trace, warn};

use crate::connection::{Connection, FrameCipher};
use crate::error::ServerError;
use crate::handlers::ProtocolHandler;

/// Running totals for every frame the dispatcher has seen.
#[derive(Debug, Default)]
pub struct DispatchStats {
    dispatched: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
    encrypted: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSnapshot {
    pub dispatched: u64,
    pub ignored: u64,
    pub failed: u64,
    pub encrypted: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            encrypted: self.encrypted.load(Ordering::Relaxed),
        }
    }
}

/// Routes frames to handlers by the local port they arrived on.
pub struct PacketDispatcher {
    routes: HashMap<u16, Arc<dyn ProtocolHandler>>,
    stats: Arc<DispatchStats>,
}

impl PacketDispatcher {
    /// Creates a dispatcher with no routes and its own counters.
    pub fn new() -> Self {
        Self::with_stats(Arc::new(DispatchStats::default()))
    }

    /// Creates a dispatcher that reports into shared `stats`.
    pub fn with_stats(stats: Arc<DispatchStats>) -> Self {
        Self {
            routes: HashMap::new(),
            stats,
        }
    }

    /// Binds `handler` to `port`, returning any handler it replaced.
    pub fn route(
        &mut self,
        port: u16,
        handler: Arc<dyn ProtocolHandler>,
    ) -> Option<Arc<dyn ProtocolHandler>> {
        debug!(port, handler = handler.name(), "Route added");
        self.routes.insert(port, handler)
    }

    /// Builder form of [`PacketDispatcher::route`].
    pub fn with_route(mut self, port: u16, handler: Arc<dyn ProtocolHandler>) -> Self {
        self.route(port, handler);
        self
    }

    /// The handler that owns `port`, if any.
    pub fn handler_for(&self, port: u16) -> Option<&Arc<dyn ProtocolHandler>> {
        self.routes.get(&port)
    }

    /// Every routed port in ascending order.
    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<_> = self.routes.keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    /// Handles one raw frame for `connection`.
    ///
    /// # Arguments
    ///
    /// * `local_port` - Port of the listener the frame arrived on
    /// * `raw` - One complete frame as read off the socket
    /// * `connection` - State of the connection that sent the frame
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` for buffers too short to be frames; those are logged
    /// and dropped. Every other frame either yields encoded response bytes or
    /// an error the caller applies its propagation policy to.
    pub async fn dispatch(
        &self,
        local_port: u16,
        raw: &[u8],
        connection: &mut Connection,
    ) -> Result<Option<Bytes>, ServerError> {
        let result = self.dispatch_frame(local_port, raw, connection).await;
        let counter = match &result {
            Ok(Some(_)) => &self.stats.dispatched,
            Ok(None) => &self.stats.ignored,
            Err(_) => &self.stats.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    async fn dispatch_frame(
        &self,
        local_port: u16,
        raw: &[u8],
        connection: &mut Connection,
    ) -> Result<Option<Bytes>, ServerError> {
        let request = match decode(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(connection = connection.id(), port = local_port, error = %e, "Ignoring non-protocol frame");
                return Ok(None);
            }
        };

        if connection.is_closed() {
            return Err(ServerError::Network(format!(
                "connection {} is closed",
                connection.id()
            )));
        }
        connection.touch();

        debug!(
            connection = connection.id(),
            port = local_port,
            code = %format_args!("0x{:04x}", request.code),
            name = request.name(),
            length = request.length,
            "Dispatching frame"
        );
        trace!("{}", request.summary());

        let Some(handler) = self.handler_for(local_port) else {
            error!(connection = connection.id(), port = local_port, "No handler for port");
            return Err(ServerError::UnroutablePort(local_port));
        };

        if request.code == NPS_CRYPTO_DES_CBC && connection.is_encrypted() {
            self.stats.encrypted.fetch_add(1, Ordering::Relaxed);
            return self
                .dispatch_envelope(handler.as_ref(), &request, connection)
                .await
                .map(Some);
        }

        let response = invoke(handler.as_ref(), connection, &request).await?;
        trace!("{}", response.summary());
        Ok(Some(response.encode()?))
    }

    async fn dispatch_envelope(
        &self,
        handler: &dyn ProtocolHandler,
        envelope: &Message,
        connection: &mut Connection,
    ) -> Result<Bytes, ServerError> {
        let plaintext = cipher(connection)?.decrypt(&envelope.body)?;
        let inner = decode(&plaintext)?;
        debug!(
            connection = connection.id(),
            code = %format_args!("0x{:04x}", inner.code),
            name = inner.name(),
            "Opened encrypted frame"
        );

        let response = invoke(handler, connection, &inner).await?;
        let sealed = cipher(connection)?.encrypt(&response.encode()?)?;
        Ok(Message::new(NPS_CRYPTO_DES_CBC, sealed).encode()?)
    }
}

impl Default for PacketDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

async fn invoke(
    handler: &dyn ProtocolHandler,
    connection: &mut Connection,
    request: &Message,
) -> Result<Message, ServerError> {
    match handler.handle(connection, request).await {
        Err(ServerError::UnknownMessageCode { handler: name, code }) => {
            match handler.failure_reply(request) {
                Some(reply) => {
                    warn!(
                        connection = connection.id(),
                        handler = name,
                        code = %format_args!("0x{code:04x}"),
                        "Unknown message code, sending failure reply"
                    );
                    Ok(reply)
                }
                None => {
                    error!(
                        connection = connection.id(),
                        handler = name,
                        code = %format_args!("0x{code:04x}"),
                        "Unknown message code"
                    );
                    Err(ServerError::UnknownMessageCode { handler: name, code })
                }
            }
        }
        other => other,
    }
}

fn cipher(connection: &mut Connection) -> Result<&mut (dyn FrameCipher + 'static), ServerError> {
    let id = connection.id().to_string();
    connection
        .cipher_mut()
        .ok_or_else(|| ServerError::Internal(format!("connection {id} lost its cipher mid-frame")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nps_protocol::codes::{NPS_ACK, NPS_HEARTBEAT_ACK};
    use nps_protocol::encode;

    /// Echoes the request code back with the body reversed.
    struct EchoHandler;

    #[async_trait]
    impl ProtocolHandler for EchoHandler {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn handle(
            &self,
            _connection: &mut Connection,
            message: &Message,
        ) -> Result<Message, ServerError> {
            if message.code == 0xFFFF {
                return Err(ServerError::UnknownMessageCode { handler: "echo", code: 0xFFFF });
            }
            let mut body = message.body.to_vec();
            body.reverse();
            Ok(Message::new(message.code, body))
        }
    }

    struct LenientHandler;

    #[async_trait]
    impl ProtocolHandler for LenientHandler {
        fn name(&self) -> &'static str {
            "lenient"
        }

        async fn handle(&self, _: &mut Connection, message: &Message) -> Result<Message, ServerError> {
            Err(ServerError::UnknownMessageCode { handler: "lenient", code: message.code })
        }

        fn failure_reply(&self, _request: &Message) -> Option<Message> {
            Some(Message::short(NPS_ACK))
        }
    }

    /// Adds one to every byte on the way out, subtracts on the way in.
    struct ShiftCipher;

    impl FrameCipher for ShiftCipher {
        fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, ServerError> {
            Ok(plaintext.iter().map(|b| b.wrapping_add(1)).collect())
        }

        fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, ServerError> {
            Ok(ciphertext.iter().map(|b| b.wrapping_sub(1)).collect())
        }
    }

    fn active(port: u16) -> Connection {
        let mut connection = Connection::new(format!("peer_{port}"), port);
        connection.activate().unwrap();
        connection
    }

    fn echo_dispatcher() -> PacketDispatcher {
        PacketDispatcher::new().with_route(8228, Arc::new(EchoHandler))
    }

    #[tokio::test]
    async fn test_routes_by_local_port() {
        let dispatcher = echo_dispatcher();
        let mut connection = active(8228);
        let raw = encode(&Message::new(0x532, vec![1, 2, 3])).unwrap();

        let response = dispatcher.dispatch(8228, &raw, &mut connection).await.unwrap().unwrap();
        let decoded = decode(&response).unwrap();
        assert_eq!(decoded.code, 0x532);
        assert_eq!(&decoded.body[..], &[3, 2, 1]);
        assert_eq!(dispatcher.stats().snapshot().dispatched, 1);
    }

    #[tokio::test]
    async fn test_frame_only_reaches_its_own_port() {
        use crate::handlers::{LoginHandler, PersonaHandler};
        use crate::store::{InMemoryPersonaDirectory, InMemorySessionStore};

        let dispatcher = PacketDispatcher::new()
            .with_route(8226, Arc::new(LoginHandler::new(Arc::new(InMemorySessionStore::new()))))
            .with_route(8228, Arc::new(PersonaHandler::new(Arc::new(InMemoryPersonaDirectory::seeded()))));
        assert_eq!(dispatcher.ports(), vec![8226, 8228]);
        assert_eq!(dispatcher.handler_for(8226).unwrap().name(), "login");

        let raw = encode(&Message::new(0x532, 5_551_212u32.to_be_bytes().to_vec())).unwrap();

        let mut login_side = active(8226);
        let err = dispatcher.dispatch(8226, &raw, &mut login_side).await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::UnknownMessageCode { handler: "login", code: 0x532 }
        ));

        let mut persona_side = active(8228);
        let response = dispatcher.dispatch(8228, &raw, &mut persona_side).await.unwrap().unwrap();
        assert_eq!(decode(&response).unwrap().code, 0x607);
    }

    #[tokio::test]
    async fn test_unroutable_port() {
        let dispatcher = echo_dispatcher();
        let mut connection = active(9999);
        let raw = encode(&Message::new(0x532, vec![])).unwrap();

        let err = dispatcher.dispatch(9999, &raw, &mut connection).await.unwrap_err();
        assert!(matches!(err, ServerError::UnroutablePort(9999)));
        assert!(err.keeps_connection_open());
        assert_eq!(dispatcher.stats().snapshot().failed, 1);
    }

    #[tokio::test]
    async fn test_short_buffer_is_ignored() {
        let dispatcher = echo_dispatcher();
        let mut connection = active(8228);
        let result = dispatcher.dispatch(8228, &[0x01, 0x00, 0x00], &mut connection).await;
        assert!(matches!(result, Ok(None)));
        assert_eq!(dispatcher.stats().snapshot().ignored, 1);
    }

    #[tokio::test]
    async fn test_unknown_code_without_failure_reply() {
        let dispatcher = echo_dispatcher();
        let mut connection = active(8228);
        let raw = encode(&Message::new(0xFFFF, vec![])).unwrap();

        let err = dispatcher.dispatch(8228, &raw, &mut connection).await.unwrap_err();
        assert!(matches!(err, ServerError::UnknownMessageCode { code: 0xFFFF, .. }));
        assert!(!err.keeps_connection_open());
    }

    #[tokio::test]
    async fn test_unknown_code_with_failure_reply() {
        let dispatcher = PacketDispatcher::new().with_route(7003, Arc::new(LenientHandler));
        let mut connection = active(7003);
        let raw = encode(&Message::new(0x0999, vec![])).unwrap();

        let response = dispatcher.dispatch(7003, &raw, &mut connection).await.unwrap().unwrap();
        assert_eq!(&response[..], &[0x02, 0x07, 0x00, 0x04]);
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_frames() {
        let dispatcher = echo_dispatcher();
        let mut connection = active(8228);
        connection.close();
        let raw = encode(&Message::new(0x532, vec![])).unwrap();
        assert!(dispatcher.dispatch(8228, &raw, &mut connection).await.is_err());
    }

    #[tokio::test]
    async fn test_encrypted_envelope_round_trip() {
        let dispatcher = echo_dispatcher();
        let mut connection = active(8228);
        connection.enable_encryption(Box::new(ShiftCipher)).unwrap();

        let inner = encode(&Message::new(0x128, vec![9, 8])).unwrap();
        let sealed: Vec<u8> = inner.iter().map(|b| b.wrapping_add(1)).collect();
        let raw = encode(&Message::new(NPS_CRYPTO_DES_CBC, sealed)).unwrap();

        let response = dispatcher.dispatch(8228, &raw, &mut connection).await.unwrap().unwrap();
        let envelope = decode(&response).unwrap();
        assert_eq!(envelope.code, NPS_CRYPTO_DES_CBC);

        let opened: Vec<u8> = envelope.body.iter().map(|b| b.wrapping_sub(1)).collect();
        let reply = decode(&opened).unwrap();
        assert_eq!(reply.code, 0x128);
        assert_eq!(&reply.body[..], &[8, 9]);
        assert_eq!(dispatcher.stats().snapshot().encrypted, 1);
    }

    #[tokio::test]
    async fn test_cleartext_on_encrypted_connection_stays_cleartext() {
        let dispatcher = echo_dispatcher();
        let mut connection = active(8228);
        connection.enable_encryption(Box::new(ShiftCipher)).unwrap();

        let raw = encode(&Message::new(NPS_HEARTBEAT_ACK, vec![])).unwrap();
        let response = dispatcher.dispatch(8228, &raw, &mut connection).await.unwrap().unwrap();
        assert_eq!(decode(&response).unwrap().code, NPS_HEARTBEAT_ACK);
    }

    #[tokio::test]
    async fn test_envelope_on_plain_connection_goes_to_handler() {
        let dispatcher = echo_dispatcher();
        let mut connection = active(8228);
        let raw = encode(&Message::new(NPS_CRYPTO_DES_CBC, vec![1, 2])).unwrap();

        let response = dispatcher.dispatch(8228, &raw, &mut connection).await.unwrap().unwrap();
        let decoded = decode(&response).unwrap();
        assert_eq!(decoded.code, NPS_CRYPTO_DES_CBC);
        assert_eq!(&decoded.body[..], &[2, 1]);
    }
}
