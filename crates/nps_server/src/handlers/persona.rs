//! Persona service: persona listing, selection and name checks.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use nps_protocol::codes::{
    NPS_ACK, NPS_CHECK_TOKEN, NPS_GAME_ACCOUNT_INFO, NPS_GET_PERSONA_MAPS, NPS_LOGOUT_ACK,
    NPS_NEW_GAME_ACCOUNT, NPS_REGISTER_GAME_LOGIN, NPS_REGISTER_GAME_LOGOUT, NPS_USER_VALID,
    NPS_VALIDATE_PERSONA_NAME,
};
use nps_protocol::Message;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::ServerError;
use crate::handlers::{unknown_code, BodyReader, ProtocolHandler};
use crate::store::{PersonaDirectory, PersonaRecord, PERSONA_NAME_LEN};

const SELECT_PERSONA_BODY_LEN: usize = 251;
const LOGOUT_BODY_LEN: usize = 257;
const VALIDATION_BODY_LEN: usize = 256;

/// Bytes per persona in a persona map: id, shard, max personas, name.
const PERSONA_ENTRY_LEN: usize = 4 + 4 + 1 + PERSONA_NAME_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersonaOperation {
    SelectPersona,
    NewGameAccount,
    Logout,
    GetPersonaMaps,
    ValidatePersonaName,
    ValidateLicencePlate,
}

impl PersonaOperation {
    fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            NPS_REGISTER_GAME_LOGIN => PersonaOperation::SelectPersona,
            NPS_NEW_GAME_ACCOUNT => PersonaOperation::NewGameAccount,
            NPS_REGISTER_GAME_LOGOUT => PersonaOperation::Logout,
            NPS_GET_PERSONA_MAPS => PersonaOperation::GetPersonaMaps,
            NPS_VALIDATE_PERSONA_NAME => PersonaOperation::ValidatePersonaName,
            NPS_CHECK_TOKEN => PersonaOperation::ValidateLicencePlate,
            _ => return None,
        })
    }
}

pub struct PersonaHandler {
    personas: Arc<dyn PersonaDirectory>,
}

impl PersonaHandler {
    pub fn new(personas: Arc<dyn PersonaDirectory>) -> Self {
        Self { personas }
    }

    async fn get_persona_maps(&self, message: &Message) -> Result<Message, ServerError> {
        let customer_id = BodyReader::new(message).u32_at(0)?;
        let personas = self.personas.find_by_customer_id(customer_id).await;
        info!(customer = customer_id, count = personas.len(), "👤 Persona maps requested");
        Ok(Message::new(NPS_GAME_ACCOUNT_INFO, persona_maps_body(&personas)?))
    }

    fn validate_persona_name(&self, message: &Message) -> Result<Message, ServerError> {
        let reader = BodyReader::new(message);
        let customer_id = reader.i32_at(0)?;
        let raw = reader.rest(6)?;
        let name_end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let requested = String::from_utf8_lossy(&raw[..name_end]);
        let service = raw
            .iter()
            .position(|&b| b == b'\n')
            .map(|idx| String::from_utf8_lossy(&raw[idx + 1..]).into_owned())
            .unwrap_or_default();
        debug!(customer = customer_id, %requested, %service, "Validating persona name");
        Ok(Message::new(NPS_USER_VALID, zeroed(VALIDATION_BODY_LEN)))
    }

    fn validate_licence_plate(&self, message: &Message) -> Result<Message, ServerError> {
        let reader = BodyReader::new(message);
        let customer_id = reader.i32_at(0)?;
        let plate = reader.c_string_at(5)?;
        debug!(customer = customer_id, %plate, "Validating licence plate");
        Ok(Message::new(NPS_ACK, zeroed(VALIDATION_BODY_LEN)))
    }
}

#[async_trait]
impl ProtocolHandler for PersonaHandler {
    fn name(&self) -> &'static str {
        "persona"
    }

    async fn handle(
        &self,
        connection: &mut Connection,
        message: &Message,
    ) -> Result<Message, ServerError> {
        let Some(operation) = PersonaOperation::from_code(message.code) else {
            return Err(unknown_code(self.name(), message.code));
        };
        debug!(connection = connection.id(), ?operation, "Persona request");

        match operation {
            PersonaOperation::SelectPersona => {
                Ok(Message::new(NPS_ACK, zeroed(SELECT_PERSONA_BODY_LEN)))
            }
            PersonaOperation::NewGameAccount => Ok(Message::new(NPS_USER_VALID, Bytes::new())),
            PersonaOperation::Logout => {
                info!(connection = connection.id(), customer = ?connection.customer_id(), "👋 Game logout");
                Ok(Message::new(NPS_LOGOUT_ACK, zeroed(LOGOUT_BODY_LEN)))
            }
            PersonaOperation::GetPersonaMaps => self.get_persona_maps(message).await,
            PersonaOperation::ValidatePersonaName => self.validate_persona_name(message),
            PersonaOperation::ValidateLicencePlate => self.validate_licence_plate(message),
        }
    }
}

/// `count: u16`, then per persona `persona_id: u32`, `shard_id: u32`,
/// `max_personas: u8` and the 30-byte name. An empty list is a valid reply.
fn persona_maps_body(personas: &[PersonaRecord]) -> Result<Bytes, ServerError> {
    let count = u16::try_from(personas.len())
        .map_err(|_| ServerError::Internal(format!("{} personas do not fit a map", personas.len())))?;

    let mut body = BytesMut::with_capacity(2 + personas.len() * PERSONA_ENTRY_LEN);
    body.put_u16(count);
    for persona in personas {
        body.put_u32(persona.persona_id);
        body.put_u32(persona.shard_id);
        body.put_u8(persona.max_personas);
        body.put_slice(&persona.name_field());
    }
    Ok(body.freeze())
}

fn zeroed(len: usize) -> Bytes {
    Bytes::from(vec![0u8; len])
}
