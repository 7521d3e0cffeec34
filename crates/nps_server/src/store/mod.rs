//! Collaborators the handlers read and write through.
//!
//! Both stores are traits so that a database-backed implementation can be
//! swapped in; the in-memory versions are what the binary ships with.

pub mod persona;
pub mod session;

pub use persona::{InMemoryPersonaDirectory, PersonaDirectory, PersonaRecord, PERSONA_NAME_LEN};
pub use session::{InMemorySessionStore, SessionRecord, SessionStore};
