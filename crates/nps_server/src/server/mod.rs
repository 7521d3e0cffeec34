//! TCP runtime: listeners, accept loops and per-connection tasks.

mod connection_task;
pub mod core;
mod listener;

pub use self::core::{Collaborators, NpsServer, ServiceBinding};
