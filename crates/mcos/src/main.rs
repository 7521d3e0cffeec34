//! Server binary for the NPS login, persona and lobby services.
//!
//! Parses the command line, loads and validates the configuration file, sets
//! up logging, and runs [`NpsServer`] until a termination signal arrives.

mod cli;
mod config;
mod logging;
mod signals;

use std::sync::Arc;

use nps_server::store::InMemoryPersonaDirectory;
use nps_server::{Collaborators, NpsServer};
use tracing::{error, info};

use crate::cli::CliArgs;
use crate::config::AppConfig;
use crate::logging::setup_logging;
use crate::signals::setup_signal_handlers;

/// Seconds between statistics lines.
const STATS_INTERVAL_SECS: u64 = 60;

pub struct Application {
    config: AppConfig,
    server: Arc<NpsServer>,
}

impl Application {
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        // Configuration is loaded before logging exists, so it is read first.
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(host) = args.bind_host {
            config.server.host = host;
        }
        if let Some(personas) = args.personas_file {
            config.data.personas_file = Some(personas.to_string_lossy().to_string());
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {}", e).into());
        }

        setup_logging(&config.logging)?;
        display_banner();

        let mut collaborators = Collaborators::default();
        if let Some(path) = config.personas_path() {
            collaborators.personas = Arc::new(InMemoryPersonaDirectory::load_from_file(&path).await?);
        }

        let server = NpsServer::new(config.to_server_config()?, collaborators);
        info!("📂 Config: {}", args.config_path.display());

        Ok(Self {
            config,
            server: Arc::new(server),
        })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("📋 Configuration Summary:");
        info!("  🌐 Host: {}", self.config.server.host);
        info!(
            "  🔌 Ports: login {} | persona {} | lobby {}",
            self.config.server.login_port, self.config.server.persona_port, self.config.server.lobby_port
        );
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!("  ⏱️ Idle timeout: {}s", self.config.server.connection_timeout);

        let server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move {
                match server.start().await {
                    Ok(()) => info!("✅ Server completed successfully"),
                    Err(e) => {
                        error!("❌ Server error: {:?}", e);
                        std::process::exit(1);
                    }
                }
            })
        };

        let monitoring_handle = {
            let server = self.server.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(STATS_INTERVAL_SECS));
                let mut last_dispatched = 0u64;

                loop {
                    interval.tick().await;

                    let stats = server.stats().snapshot();
                    let this_period = stats.dispatched - last_dispatched;
                    last_dispatched = stats.dispatched;

                    info!(
                        "📊 {} frames/min | {} connections | {} ignored | {} failed | {} encrypted",
                        this_period,
                        server.active_connections(),
                        stats.ignored,
                        stats.failed,
                        stats.encrypted
                    );
                }
            })
        };

        info!("🛑 Press Ctrl+C to gracefully shutdown");
        setup_signal_handlers().await?;

        info!("🛑 Shutdown signal received, initiating graceful shutdown...");
        monitoring_handle.abort();
        self.server.shutdown().await?;

        if let Err(e) = server_handle.await {
            error!("Server task ended abnormally: {}", e);
        }

        let stats = self.server.stats().snapshot();
        info!("📊 Final Statistics:");
        info!("  - Frames dispatched: {}", stats.dispatched);
        info!("  - Frames ignored: {}", stats.ignored);
        info!("  - Frames failed: {}", stats.failed);
        info!("👋 Shutdown complete");

        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║              🏁 MCOS SERVER              ║");
    info!("║                 v{:<8}                ║", version);
    info!("║   Login · Persona · Lobby over NPS/TCP   ║");
    info!("╚══════════════════════════════════════════╝");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn args_for(config_path: PathBuf) -> CliArgs {
        CliArgs {
            config_path,
            bind_host: None,
            personas_file: None,
            log_level: None,
            json_logs: false,
        }
    }

    #[tokio::test]
    async fn test_invalid_override_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let mut args = args_for(temp_dir.path().join("config.toml"));
        args.bind_host = Some("nowhere".to_string());

        let result = Application::new(args).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_persona_file_fails_startup() {
        let temp_dir = tempdir().unwrap();
        let mut args = args_for(temp_dir.path().join("config.toml"));
        args.personas_file = Some(temp_dir.path().join("missing.json"));

        assert!(Application::new(args).await.is_err());
    }
}
