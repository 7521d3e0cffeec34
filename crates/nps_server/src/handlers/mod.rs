//! Protocol handler framework.
//!
//! One handler serves one listener port. Each handler maps inbound message
//! codes to an operation enum and answers with exactly one response frame per
//! request; codes outside its table fail with
//! [`ServerError::UnknownMessageCode`].

pub mod body;
pub mod lobby;
pub mod login;
pub mod persona;

use async_trait::async_trait;
use nps_protocol::Message;

use crate::connection::Connection;
use crate::error::ServerError;

pub use body::BodyReader;
pub use lobby::{LobbyChannel, LobbyHandler};
pub use login::LoginHandler;
pub use persona::PersonaHandler;

#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Handles one decoded frame and produces the response frame.
    async fn handle(
        &self,
        connection: &mut Connection,
        message: &Message,
    ) -> Result<Message, ServerError>;

    /// Frame sent instead of closing the connection when `request` carries a
    /// code this handler does not know. `None` means the connection is closed.
    fn failure_reply(&self, _request: &Message) -> Option<Message> {
        None
    }
}

pub(crate) fn unknown_code(handler: &'static str, code: u16) -> ServerError {
    ServerError::UnknownMessageCode { handler, code }
}
