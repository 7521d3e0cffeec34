//! Configuration management.
//!
//! Loads the TOML configuration file (writing a default one on first run),
//! validates it, and converts it into the library's [`ServerConfig`].

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use nps_server::config::{DEFAULT_LOBBY_PORT, DEFAULT_LOGIN_PORT, DEFAULT_PERSONA_PORT};
use nps_server::ServerConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_login_port() -> u16 {
    DEFAULT_LOGIN_PORT
}

fn default_persona_port() -> u16 {
    DEFAULT_PERSONA_PORT
}

fn default_lobby_port() -> u16 {
    DEFAULT_LOBBY_PORT
}

fn default_max_connections() -> usize {
    1000
}

/// Default for connection_timeout
pub fn default_connection_timeout() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host every listener binds to
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_login_port")]
    pub login_port: u16,
    #[serde(default = "default_persona_port")]
    pub persona_port: u16,
    #[serde(default = "default_lobby_port")]
    pub lobby_port: u16,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Idle timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            login_port: default_login_port(),
            persona_port: default_persona_port(),
            lobby_port: default_lobby_port(),
            max_connections: default_max_connections(),
            connection_timeout: default_connection_timeout(),
        }
    }
}

/// Where persona records come from. Without a file the built-in seed
/// accounts are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSettings {
    pub personas_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter
    #[serde(default = "default_log_level")]
    pub level: String,
    /// JSON formatting
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, creating it with defaults when missing.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            host: self.server.host.parse::<IpAddr>()?,
            login_port: self.server.login_port,
            persona_port: self.server.persona_port,
            lobby_port: self.server.lobby_port,
            max_connections: self.server.max_connections,
            connection_timeout: self.server.connection_timeout,
        })
    }

    pub fn personas_path(&self) -> Option<PathBuf> {
        self.data.personas_file.as_ref().map(PathBuf::from)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.host.parse::<IpAddr>().is_err() {
            return Err(format!("Invalid bind host: {}", self.server.host));
        }

        let ports = [
            ("login", self.server.login_port),
            ("persona", self.server.persona_port),
            ("lobby", self.server.lobby_port),
        ];
        let mut seen = HashSet::new();
        for (service, port) in ports {
            if port == 0 {
                return Err(format!("The {service} port must not be 0"));
            }
            if !seen.insert(port) {
                return Err(format!("Port {port} is assigned to more than one service"));
            }
        }

        if self.server.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        if self.server.connection_timeout == 0 {
            return Err("connection_timeout must be greater than 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.login_port, 8226);
        assert_eq!(config.server.persona_port, 8228);
        assert_eq!(config.server.lobby_port, 7003);
        assert_eq!(config.logging.level, "info");
        assert!(config.data.personas_file.is_none());
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&config_path).await.unwrap();
        assert!(config_path.exists());
        assert_eq!(config.server.lobby_port, 7003);

        let reloaded = AppConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(reloaded.server.login_port, config.server.login_port);
    }

    #[tokio::test]
    async fn test_load_partial_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        tokio::fs::write(
            &config_path,
            "[server]\nhost = \"127.0.0.1\"\nlobby_port = 17003\n\n[logging]\njson_format = true\n",
        )
        .await
        .unwrap();

        let config = AppConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.lobby_port, 17003);
        assert_eq!(config.server.login_port, 8226);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.json_format);
    }

    #[tokio::test]
    async fn test_load_invalid_toml() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        tokio::fs::write(&config_path, "[server\nhost = ").await.unwrap();
        assert!(AppConfig::load_from_file(&config_path).await.is_err());
    }

    #[test]
    fn test_to_server_config_conversion() {
        let mut config = AppConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.connection_timeout = 15;

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.host, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(server_config.lobby_port, 7003);
        assert_eq!(server_config.connection_timeout, 15);
        assert_eq!(server_config.max_connections, 1000);
    }

    #[test]
    fn test_validation_invalid_host() {
        let mut config = AppConfig::default();
        config.server.host = "not-an-ip".to_string();
        assert!(config.validate().is_err());
        assert!(config.to_server_config().is_err());
    }

    #[test]
    fn test_validation_ports() {
        let mut config = AppConfig::default();
        config.server.persona_port = config.server.login_port;
        assert!(config.validate().unwrap_err().contains("more than one service"));

        let mut config = AppConfig::default();
        config.server.lobby_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_limits() {
        let mut config = AppConfig::default();
        config.server.connection_timeout = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_log_levels() {
        let mut config = AppConfig::default();
        for level in ["trace", "debug", "info", "warn", "error"] {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok());
        }
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_personas_path() {
        let mut config = AppConfig::default();
        assert!(config.personas_path().is_none());
        config.data.personas_file = Some("personas.json".to_string());
        assert_eq!(config.personas_path(), Some(PathBuf::from("personas.json")));
    }
}
