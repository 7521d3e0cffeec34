//! Process-wide service directory.
//!
//! Every listener registers the address it actually bound before it accepts
//! traffic; anything that needs to reach a sibling service looks it up here
//! instead of hard-coding ports.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::ServerError;

/// Names a service can register under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceName {
    Database,
    Login,
    Persona,
    Lobby,
    Shard,
    Patch,
    Proxy,
    Admin,
    Router,
}

impl ServiceName {
    /// Every name, in declaration order.
    pub const ALL: [ServiceName; 9] = [
        ServiceName::Database,
        ServiceName::Login,
        ServiceName::Persona,
        ServiceName::Lobby,
        ServiceName::Shard,
        ServiceName::Patch,
        ServiceName::Proxy,
        ServiceName::Admin,
        ServiceName::Router,
    ];

    /// Upper-case form used in logs and serialized data.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Database => "DATABASE",
            ServiceName::Login => "LOGIN",
            ServiceName::Persona => "PERSONA",
            ServiceName::Lobby => "LOBBY",
            ServiceName::Shard => "SHARD",
            ServiceName::Patch => "PATCH",
            ServiceName::Proxy => "PROXY",
            ServiceName::Admin => "ADMIN",
            ServiceName::Router => "ROUTER",
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a service can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceAddress {
    pub host: String,
    pub port: u16,
}

impl ServiceAddress {
    /// # Arguments
    ///
    /// * `host` - Host name or IP literal peers should dial
    /// * `port` - TCP port the service listens on
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<SocketAddr> for ServiceAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Shared map from [`ServiceName`] to [`ServiceAddress`].
///
/// Cloning shares the underlying map. Each entry is replaced as a whole value
/// under the write lock, so readers see either the old address or the new one.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Arc<RwLock<HashMap<ServiceName, ServiceAddress>>>,
}

impl ServiceRegistry {
    /// Creates an empty registry. Clone it to share it between servers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the address for `name`.
    ///
    /// Other entries are left untouched. Registering the same address twice is
    /// a no-op apart from the lock round trip.
    pub async fn register(&self, name: ServiceName, address: ServiceAddress) {
        let previous = self.services.write().await.insert(name, address.clone());
        match previous {
            Some(old) if old != address => {
                info!(service = %name, %old, new = %address, "🔁 Service re-registered")
            }
            Some(_) => {}
            None => info!(service = %name, %address, "📍 Service registered"),
        }
    }

    /// Resolves `name`.
    ///
    /// # Returns
    ///
    /// The last address registered under `name`, or
    /// [`ServerError::NotRegistered`] when nothing ever registered it. Liveness
    /// of the registered process is not checked.
    pub async fn lookup(&self, name: ServiceName) -> Result<ServiceAddress, ServerError> {
        self.services
            .read()
            .await
            .get(&name)
            .cloned()
            .ok_or(ServerError::NotRegistered(name))
    }

    /// All current registrations, ordered by name.
    pub async fn snapshot(&self) -> Vec<(ServiceName, ServiceAddress)> {
        let mut entries: Vec<_> = self
            .services
            .read()
            .await
            .iter()
            .map(|(name, address)| (*name, address.clone()))
            .collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }
}
