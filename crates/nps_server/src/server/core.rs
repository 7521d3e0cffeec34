//! Core server implementation.
//!
//! `NpsServer` binds one listener per NPS service, routes each listener's
//! traffic to its protocol handler through a shared [`PacketDispatcher`], and
//! publishes every bound address in the [`ServiceRegistry`] before accepting
//! traffic.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::connection::{CipherFactory, PlaintextCipherFactory};
use crate::dispatch::{DispatchStats, PacketDispatcher};
use crate::error::ServerError;
use crate::handlers::{LobbyHandler, LoginHandler, PersonaHandler, ProtocolHandler};
use crate::registry::{ServiceAddress, ServiceName, ServiceRegistry};
use crate::server::connection_task::handle_connection;
use crate::server::listener::{bind_listener, Acceptor};
use crate::store::{InMemoryPersonaDirectory, InMemorySessionStore, PersonaDirectory, SessionStore};

/// Pause after a failed `accept` before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// The stores and cipher factory shared by the built-in handlers.
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionStore>,
    pub personas: Arc<dyn PersonaDirectory>,
    pub ciphers: Arc<dyn CipherFactory>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            sessions: Arc::new(InMemorySessionStore::new()),
            personas: Arc::new(InMemoryPersonaDirectory::seeded()),
            ciphers: Arc::new(PlaintextCipherFactory),
        }
    }
}

/// One service to listen for: its registry name, the port to bind and the
/// handler that owns the port.
#[derive(Clone)]
pub struct ServiceBinding {
    pub name: ServiceName,
    pub port: u16,
    pub handler: Arc<dyn ProtocolHandler>,
}

impl ServiceBinding {
    /// # Arguments
    ///
    /// * `name` - Name published in the registry
    /// * `port` - Port to bind, `0` for an ephemeral one
    /// * `handler` - Handler for every frame arriving on that port
    pub fn new(name: ServiceName, port: u16, handler: Arc<dyn ProtocolHandler>) -> Self {
        Self { name, port, handler }
    }
}

/// The NPS game server.
///
/// # Lifecycle
///
/// 1. [`NpsServer::new`] wires the login, persona and lobby handlers to the
///    configured ports
/// 2. [`NpsServer::start`] binds every listener, registers the bound
///    addresses and runs the accept loops
/// 3. [`NpsServer::shutdown`] stops the accept loops and every open connection
pub struct NpsServer {
    config: ServerConfig,
    services: Vec<ServiceBinding>,
    registry: ServiceRegistry,
    stats: Arc<DispatchStats>,
    connection_limit: Arc<Semaphore>,
    shutdown_sender: watch::Sender<bool>,
}

impl NpsServer {
    /// Creates a server running the login, persona and lobby services.
    pub fn new(config: ServerConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            sessions,
            personas,
            ciphers,
        } = collaborators;

        let services = vec![
            ServiceBinding::new(
                ServiceName::Login,
                config.login_port,
                Arc::new(LoginHandler::new(sessions.clone())),
            ),
            ServiceBinding::new(
                ServiceName::Persona,
                config.persona_port,
                Arc::new(PersonaHandler::new(personas.clone())),
            ),
            ServiceBinding::new(
                ServiceName::Lobby,
                config.lobby_port,
                Arc::new(LobbyHandler::new(personas, sessions, ciphers)),
            ),
        ];

        Self::with_services(config, services)
    }

    /// Creates a server for an arbitrary set of services. The per-service
    /// ports in `config` are ignored in favour of each binding's port.
    pub fn with_services(config: ServerConfig, services: Vec<ServiceBinding>) -> Self {
        let (shutdown_sender, _) = watch::channel(false);
        let connection_limit = Arc::new(Semaphore::new(config.max_connections));
        Self {
            config,
            services,
            registry: ServiceRegistry::new(),
            stats: Arc::new(DispatchStats::default()),
            connection_limit,
            shutdown_sender,
        }
    }

    /// Uses `registry` instead of a private one, so several servers can share a
    /// directory.
    pub fn with_registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The configuration the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle to the registry every bound service is published in.
    pub fn registry(&self) -> ServiceRegistry {
        self.registry.clone()
    }

    /// Frame counters shared by every listener.
    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    /// Number of client sockets currently being served.
    pub fn active_connections(&self) -> usize {
        self.config.max_connections - self.connection_limit.available_permits()
    }

    /// Binds all listeners and serves until [`NpsServer::shutdown`] is called.
    ///
    /// Binding happens before anything is registered or accepted, so a port
    /// conflict fails startup as a whole. Routes are keyed by the port each
    /// listener actually bound, which makes port `0` usable in tests.
    ///
    /// # Returns
    ///
    /// `Ok(())` once shutdown was requested, including a request made before
    /// `start` was called. Accept failures never end the server.
    pub async fn start(&self) -> Result<(), ServerError> {
        info!("🚀 Starting NPS services on {}", self.config.host);

        let mut shutdown = self.shutdown_sender.subscribe();
        let mut dispatcher = PacketDispatcher::with_stats(self.stats.clone());
        let mut listeners = Vec::with_capacity(self.services.len());

        for binding in &self.services {
            let listener = bind_listener(SocketAddr::new(self.config.host, binding.port))?;
            let local_addr = listener
                .local_addr()
                .map_err(|e| ServerError::Network(format!("Failed to read bound address: {e}")))?;

            if dispatcher.route(local_addr.port(), binding.handler.clone()).is_some() {
                return Err(ServerError::Config(format!(
                    "port {} is bound by more than one service",
                    local_addr.port()
                )));
            }
            info!("✅ {} listener bound on {}", binding.name, local_addr);
            listeners.push((binding.name, local_addr, listener));
        }

        for (name, local_addr, _) in &listeners {
            self.registry
                .register(*name, ServiceAddress::from(*local_addr))
                .await;
        }

        info!("🎮 Ready to accept connections on ports {:?}", dispatcher.ports());
        let dispatcher = Arc::new(dispatcher);
        let idle_timeout = self.config.idle_timeout();

        let mut accept_futures = listeners
            .into_iter()
            .map(|(name, local_addr, listener)| {
                accept_loop(
                    name,
                    listener,
                    local_addr.port(),
                    dispatcher.clone(),
                    self.connection_limit.clone(),
                    shutdown.clone(),
                    idle_timeout,
                )
            })
            .collect::<FuturesUnordered<_>>();

        let already_stopped = *shutdown.borrow_and_update();
        if already_stopped {
            info!("Shutdown was requested before startup completed");
        } else {
            // Accept loops never finish; with no services the first branch is
            // simply disabled.
            tokio::select! {
                Some(()) = accept_futures.next() => {}
                _ = shutdown.changed() => {
                    info!("Shutdown signal received");
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Stops the accept loops and asks every connection task to close.
    ///
    /// The request is sticky: a `start` that has not subscribed yet still sees
    /// it and returns right after binding.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        self.shutdown_sender.send_replace(true);
        Ok(())
    }
}

/// Accepts sockets from `listener` forever, spawning one task per connection.
///
/// A failed `accept` (descriptor exhaustion, an aborted handshake) is logged
/// and retried after a short pause; it never stops this service or its
/// siblings.
pub(crate) async fn accept_loop<A: Acceptor>(
    name: ServiceName,
    listener: A,
    local_port: u16,
    dispatcher: Arc<PacketDispatcher>,
    connection_limit: Arc<Semaphore>,
    shutdown: watch::Receiver<bool>,
    idle_timeout: Duration,
) {
    loop {
        match listener.accept().await {
            Ok((stream, remote_addr)) => {
                let Ok(permit) = connection_limit.clone().try_acquire_owned() else {
                    warn!("🚫 Connection limit reached, refusing {} on {}", remote_addr, name);
                    continue;
                };

                let dispatcher = dispatcher.clone();
                let shutdown = shutdown.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = handle_connection(
                        stream,
                        remote_addr,
                        local_port,
                        dispatcher,
                        idle_timeout,
                        shutdown,
                    )
                    .await
                    {
                        error!("Connection error: {:?}", e);
                    }
                });
            }
            Err(e) => {
                warn!("⚠️ Failed to accept connection on {}: {}, retrying", name, e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}
