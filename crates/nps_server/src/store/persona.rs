//! Persona directory.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ServerError;

/// Width of the NUL-padded name field on the wire.
pub const PERSONA_NAME_LEN: usize = 30;

/// A playable identity belonging to a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaRecord {
    pub customer_id: u32,
    pub persona_id: u32,
    pub max_personas: u8,
    pub name: String,
    pub shard_id: u32,
}

impl PersonaRecord {
    pub fn new(
        customer_id: u32,
        persona_id: u32,
        max_personas: u8,
        name: impl Into<String>,
        shard_id: u32,
    ) -> Self {
        Self {
            customer_id,
            persona_id,
            max_personas,
            name: name.into(),
            shard_id,
        }
    }

    /// The name as a 30-byte NUL-padded field, truncated when longer.
    pub fn name_field(&self) -> [u8; PERSONA_NAME_LEN] {
        let mut field = [0u8; PERSONA_NAME_LEN];
        let raw = self.name.as_bytes();
        let n = raw.len().min(PERSONA_NAME_LEN);
        field[..n].copy_from_slice(&raw[..n]);
        field
    }
}

#[async_trait]
pub trait PersonaDirectory: Send + Sync {
    /// Fails with [`ServerError::PersonaNotFound`] when nothing matches.
    async fn find_by_persona_id(&self, persona_id: u32) -> Result<Vec<PersonaRecord>, ServerError>;

    /// Every persona owned by `customer_id`; empty when there are none.
    async fn find_by_customer_id(&self, customer_id: u32) -> Vec<PersonaRecord>;
}

/// Read-only directory held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryPersonaDirectory {
    personas: Vec<PersonaRecord>,
}

impl InMemoryPersonaDirectory {
    pub fn new(personas: Vec<PersonaRecord>) -> Self {
        Self { personas }
    }

    /// The three accounts retail test clients log in with.
    pub fn seeded() -> Self {
        Self::new(vec![
            PersonaRecord::new(2_868_969_472, 0x0000_0001, 1, "Doc Joe", 0x2c),
            PersonaRecord::new(5_551_212, 0x0084_5FED, 2, "Dr Brown", 0x2c),
            PersonaRecord::new(5_551_212, 0x0084_5FEE, 2, "Morty Dr", 0x2c),
        ])
    }

    pub fn from_json(json: &str) -> Result<Self, ServerError> {
        let personas: Vec<PersonaRecord> = serde_json::from_str(json)
            .map_err(|e| ServerError::Config(format!("Invalid persona data: {e}")))?;
        Ok(Self::new(personas))
    }

    pub async fn load_from_file(path: &Path) -> Result<Self, ServerError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ServerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let directory = Self::from_json(&content)?;
        info!("👤 Loaded {} persona(s) from {}", directory.len(), path.display());
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl Default for InMemoryPersonaDirectory {
    fn default() -> Self {
        Self::seeded()
    }
}

#[async_trait]
impl PersonaDirectory for InMemoryPersonaDirectory {
    async fn find_by_persona_id(&self, persona_id: u32) -> Result<Vec<PersonaRecord>, ServerError> {
        let matches: Vec<_> = self
            .personas
            .iter()
            .filter(|p| p.persona_id == persona_id)
            .cloned()
            .collect();
        if matches.is_empty() {
            return Err(ServerError::PersonaNotFound(persona_id));
        }
        Ok(matches)
    }

    async fn find_by_customer_id(&self, customer_id: u32) -> Vec<PersonaRecord> {
        self.personas
            .iter()
            .filter(|p| p.customer_id == customer_id)
            .cloned()
            .collect()
    }
}
