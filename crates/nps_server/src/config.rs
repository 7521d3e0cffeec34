//! Server configuration types and defaults.

use std::net::IpAddr;
use std::time::Duration;

/// Login service port used by retail clients.
pub const DEFAULT_LOGIN_PORT: u16 = 8226;
/// Persona service port used by retail clients.
pub const DEFAULT_PERSONA_PORT: u16 = 8228;
/// Lobby service port used by retail clients.
pub const DEFAULT_LOBBY_PORT: u16 = 7003;

/// Configuration for the NPS listeners.
///
/// A port of `0` asks the OS for an ephemeral port; the bound port is what gets
/// routed and registered.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address every listener binds to
    pub host: IpAddr,

    pub login_port: u16,
    pub persona_port: u16,
    pub lobby_port: u16,

    /// Maximum number of concurrent client connections across all listeners
    pub max_connections: usize,

    /// Idle window in seconds before a silent connection is closed
    pub connection_timeout: u64,
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            login_port: DEFAULT_LOGIN_PORT,
            persona_port: DEFAULT_PERSONA_PORT,
            lobby_port: DEFAULT_LOBBY_PORT,
            max_connections: 1000,
            connection_timeout: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        let config = ServerConfig::default();
        assert_eq!(config.login_port, 8226);
        assert_eq!(config.persona_port, 8228);
        assert_eq!(config.lobby_port, 7003);
        assert_eq!(config.idle_timeout(), Duration::from_secs(60));
    }
}
