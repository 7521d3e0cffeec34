//! # NPS Server
//!
//! The network-facing core of the legacy game services: the login, persona and
//! lobby endpoints that retail clients talk to over raw TCP.
//!
//! ## Architecture Overview
//!
//! * **Connections** ([`connection`]) - per-socket state: lifecycle, session
//!   key, customer and the optional frame cipher
//! * **Service Registry** ([`registry`]) - process-wide directory every
//!   listener registers its bound address in before accepting traffic
//! * **Packet Dispatcher** ([`dispatch`]) - decodes a raw frame, opens
//!   encrypted envelopes, routes by local port and encodes the reply
//! * **Protocol Handlers** ([`handlers`]) - code-table driven login, persona
//!   and lobby services
//! * **Stores** ([`store`]) - session and persona collaborators behind traits
//! * **Server** ([`server`]) - listeners, accept loops and connection tasks
//!
//! ### Message Flow
//!
//! 1. A connection task reads one whole frame off the socket
//! 2. The dispatcher decodes it and picks the handler for the local port
//! 3. The handler answers with exactly one response frame
//! 4. The response is encoded (and encrypted when the request was) and written
//!    back before the next frame is read
//!
//! ## Error Handling
//!
//! All failures are [`ServerError`] values scoped to a single connection. The
//! connection task consults [`ServerError::keeps_connection_open`] to decide
//! between skipping the frame and closing the socket; nothing a client sends
//! can stop the listeners.

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod server;
pub mod store;

pub use config::ServerConfig;
pub use connection::{CipherFactory, Connection, ConnectionStatus, FrameCipher, SessionKey};
pub use dispatch::{DispatchSnapshot, DispatchStats, PacketDispatcher};
pub use error::ServerError;
pub use handlers::ProtocolHandler;
pub use registry::{ServiceAddress, ServiceName, ServiceRegistry};
pub use server::{Collaborators, NpsServer, ServiceBinding};

/// Creates a server with default configuration and in-memory stores.
pub fn create_server() -> NpsServer {
    NpsServer::new(ServerConfig::default(), Collaborators::default())
}

/// Creates a server with the given configuration and in-memory stores.
pub fn create_server_with_config(config: ServerConfig) -> NpsServer {
    NpsServer::new(config, Collaborators::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_server_uses_retail_ports() {
        let server = create_server();
        assert_eq!(server.config().login_port, 8226);
        assert_eq!(server.config().persona_port, 8228);
        assert_eq!(server.config().lobby_port, 7003);
    }
}
