//! Login service: authenticates a customer and issues the session key.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use nps_protocol::codes::{NPS_USER_LOGIN, NPS_USER_VALID};
use nps_protocol::Message;
use rand::RngCore;
use tracing::info;

use crate::connection::session::SESSION_KEY_LEN;
use crate::connection::{Connection, SessionKey};
use crate::error::ServerError;
use crate::handlers::{unknown_code, BodyReader, ProtocolHandler};
use crate::store::{SessionRecord, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginOperation {
    UserLogin,
}

impl LoginOperation {
    fn from_code(code: u16) -> Option<Self> {
        match code {
            NPS_USER_LOGIN => Some(LoginOperation::UserLogin),
            _ => None,
        }
    }
}

pub struct LoginHandler {
    sessions: Arc<dyn SessionStore>,
}

impl LoginHandler {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }

    /// `0x501`: body is `customer_id: u32` followed by a NUL-terminated context id.
    async fn user_login(
        &self,
        connection: &mut Connection,
        message: &Message,
    ) -> Result<Message, ServerError> {
        let reader = BodyReader::new(message);
        let customer_id = reader.u32_at(0)?;
        let context_id = reader.c_string_at(4)?;

        let key = generate_session_key(customer_id);
        connection.set_customer_id(customer_id);
        connection.set_session_key(key.clone());

        self.sessions
            .put(SessionRecord {
                customer_id,
                session_key: key.clone(),
                context_id,
                connection_id: connection.id().to_string(),
            })
            .await?;

        info!(
            connection = connection.id(),
            customer = customer_id,
            skey = %key.short_key(),
            "🔑 Customer logged in"
        );

        let hex_key = key.to_hex();
        let mut body = BytesMut::with_capacity(4 + hex_key.len());
        body.put_u32(customer_id);
        body.put_slice(hex_key.as_bytes());
        Ok(Message::new(NPS_USER_VALID, body.freeze()))
    }
}

#[async_trait]
impl ProtocolHandler for LoginHandler {
    fn name(&self) -> &'static str {
        "login"
    }

    async fn handle(
        &self,
        connection: &mut Connection,
        message: &Message,
    ) -> Result<Message, ServerError> {
        match LoginOperation::from_code(message.code) {
            Some(LoginOperation::UserLogin) => self.user_login(connection, message).await,
            None => Err(unknown_code(self.name(), message.code)),
        }
    }
}

/// Random bytes with the customer id in the last four, so a key can be traced
/// back to its owner without a store lookup.
fn generate_session_key(customer_id: u32) -> SessionKey {
    let mut bytes = [0u8; SESSION_KEY_LEN];
    let split = SESSION_KEY_LEN - 4;
    rand::rng().fill_bytes(&mut bytes[..split]);
    bytes[split..].copy_from_slice(&customer_id.to_be_bytes());
    SessionKey::from_bytes(bytes)
}
