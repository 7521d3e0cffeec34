//! Lobby service: keyed login, heartbeats and channel lists.
//!
//! A successful `NPS_LOGIN` switches the connection to encrypted traffic; from
//! then on most requests arrive inside `NPS_CRYPTO_DES_CBC` envelopes, which
//! the dispatcher opens before they reach this handler.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use nps_protocol::codes::{
    NPS_GET_MINI_USER_LIST, NPS_HEARTBEAT, NPS_HEARTBEAT_ACK, NPS_INVALID_KEY, NPS_LOGIN,
    NPS_LOGIN_RESP, NPS_MINI_RIFF_LIST, NPS_MINI_USER_LIST, NPS_SEND_MINI_RIFF_LIST,
};
use nps_protocol::Message;
use tracing::{debug, info, warn};

use crate::connection::{CipherFactory, Connection};
use crate::error::ServerError;
use crate::handlers::{unknown_code, BodyReader, ProtocolHandler};
use crate::store::{PersonaDirectory, PersonaRecord, SessionStore};

/// Width of the NUL-padded channel name in a riff list.
const CHANNEL_NAME_LEN: usize = 32;

/// A chat channel advertised in the riff list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyChannel {
    pub id: u32,
    pub name: String,
    pub population: u16,
}

impl LobbyChannel {
    /// Creates a channel entry. Names longer than 32 bytes are cut on the wire.
    pub fn new(id: u32, name: impl Into<String>, population: u16) -> Self {
        Self {
            id,
            name: name.into(),
            population,
        }
    }

    /// The channels a fresh lobby advertises.
    pub fn default_channels() -> Vec<LobbyChannel> {
        vec![
            LobbyChannel::new(0, "CTRL", 0),
            LobbyChannel::new(191, "MC141", 0),
            LobbyChannel::new(192, "MCCHAT", 0),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LobbyOperation {
    Login,
    Heartbeat,
    GetMiniUserList,
    SendMiniRiffList,
}

impl LobbyOperation {
    fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            NPS_LOGIN => LobbyOperation::Login,
            NPS_HEARTBEAT => LobbyOperation::Heartbeat,
            NPS_GET_MINI_USER_LIST => LobbyOperation::GetMiniUserList,
            NPS_SEND_MINI_RIFF_LIST => LobbyOperation::SendMiniRiffList,
            _ => return None,
        })
    }
}

/// Handler for the lobby port.
pub struct LobbyHandler {
    personas: Arc<dyn PersonaDirectory>,
    sessions: Arc<dyn SessionStore>,
    ciphers: Arc<dyn CipherFactory>,
    channels: Vec<LobbyChannel>,
}

impl LobbyHandler {
    /// # Arguments
    ///
    /// * `personas` - Resolves the persona named in a lobby login
    /// * `sessions` - Holds the keys issued by the login service
    /// * `ciphers` - Builds the cipher a successful login switches on
    pub fn new(
        personas: Arc<dyn PersonaDirectory>,
        sessions: Arc<dyn SessionStore>,
        ciphers: Arc<dyn CipherFactory>,
    ) -> Self {
        Self {
            personas,
            sessions,
            ciphers,
            channels: LobbyChannel::default_channels(),
        }
    }

    /// Replaces the advertised channel list.
    pub fn with_channels(mut self, channels: Vec<LobbyChannel>) -> Self {
        self.channels = channels;
        self
    }

    /// Reply to a client heartbeat.
    pub fn heartbeat_reply() -> Message {
        Message::new(NPS_HEARTBEAT_ACK, Bytes::new())
    }

    /// `0x100`: body starts with the persona id. The persona's customer must
    /// already hold a session issued by the login service.
    async fn login(
        &self,
        connection: &mut Connection,
        message: &Message,
    ) -> Result<Message, ServerError> {
        let persona_id = BodyReader::new(message).u32_at(0)?;

        let persona = match self.resolve_persona(persona_id).await {
            Ok(persona) => persona,
            Err(ServerError::PersonaNotFound(_)) => {
                warn!(connection = connection.id(), persona = persona_id, "Lobby login for unknown persona");
                return Ok(invalid_key_reply(persona_id));
            }
            Err(e) => return Err(e),
        };

        // An encrypted connection is already keyed; a repeat login must not
        // re-key it or move it to another customer.
        if connection.is_encrypted() {
            if connection.customer_id() == Some(persona.customer_id) {
                debug!(connection = connection.id(), persona = persona_id, "Repeat lobby login");
                return Ok(login_reply(&persona));
            }
            warn!(
                connection = connection.id(),
                persona = persona_id,
                customer = persona.customer_id,
                "Lobby login for another customer on a keyed connection"
            );
            return Ok(invalid_key_reply(persona_id));
        }

        let session = match self.sessions.get(persona.customer_id).await {
            Ok(session) => session,
            Err(ServerError::SessionNotFound(customer)) => {
                warn!(connection = connection.id(), customer, "Lobby login without a session");
                return Ok(invalid_key_reply(persona_id));
            }
            Err(e) => return Err(e),
        };

        connection.set_customer_id(persona.customer_id);
        let key = connection.set_session_key(session.session_key).clone();
        connection.enable_encryption(self.ciphers.create(&key))?;

        info!(
            connection = connection.id(),
            customer = persona.customer_id,
            persona = persona_id,
            "🎮 Lobby login accepted"
        );

        Ok(login_reply(&persona))
    }

    async fn resolve_persona(&self, persona_id: u32) -> Result<PersonaRecord, ServerError> {
        self.personas
            .find_by_persona_id(persona_id)
            .await?
            .into_iter()
            .next()
            .ok_or(ServerError::PersonaNotFound(persona_id))
    }

    /// `0x128`: body starts with the channel id.
    fn mini_user_list(&self, message: &Message) -> Result<Message, ServerError> {
        let channel_id = BodyReader::new(message).u32_at(0)?;
        let mut body = BytesMut::with_capacity(8);
        body.put_u32(channel_id);
        body.put_u32(0);
        Ok(Message::new(NPS_MINI_USER_LIST, body.freeze()))
    }

    fn mini_riff_list(&self) -> Result<Message, ServerError> {
        let count = u32::try_from(self.channels.len())
            .map_err(|_| ServerError::Internal("too many lobby channels".to_string()))?;

        let mut body = BytesMut::with_capacity(4 + self.channels.len() * (4 + CHANNEL_NAME_LEN + 2));
        body.put_u32(count);
        for channel in &self.channels {
            let mut name = [0u8; CHANNEL_NAME_LEN];
            let raw = channel.name.as_bytes();
            let n = raw.len().min(CHANNEL_NAME_LEN);
            name[..n].copy_from_slice(&raw[..n]);

            body.put_u32(channel.id);
            body.put_slice(&name);
            body.put_u16(channel.population);
        }
        Ok(Message::new(NPS_MINI_RIFF_LIST, body.freeze()))
    }
}

#[async_trait]
impl ProtocolHandler for LobbyHandler {
    fn name(&self) -> &'static str {
        "lobby"
    }

    async fn handle(
        &self,
        connection: &mut Connection,
        message: &Message,
    ) -> Result<Message, ServerError> {
        let Some(operation) = LobbyOperation::from_code(message.code) else {
            return Err(unknown_code(self.name(), message.code));
        };
        debug!(connection = connection.id(), ?operation, "Lobby request");

        match operation {
            LobbyOperation::Login => self.login(connection, message).await,
            LobbyOperation::Heartbeat => Ok(Self::heartbeat_reply()),
            LobbyOperation::GetMiniUserList => self.mini_user_list(message),
            LobbyOperation::SendMiniRiffList => self.mini_riff_list(),
        }
    }
}

/// `customer_id: u32`, `persona_id: u32`, then the 30-byte persona name.
fn login_reply(persona: &PersonaRecord) -> Message {
    let name = persona.name_field();
    let mut body = BytesMut::with_capacity(8 + name.len());
    body.put_u32(persona.customer_id);
    body.put_u32(persona.persona_id);
    body.put_slice(&name);
    Message::new(NPS_LOGIN_RESP, body.freeze())
}

fn invalid_key_reply(persona_id: u32) -> Message {
    Message::new(NPS_INVALID_KEY, persona_id.to_be_bytes().to_vec())
}
