//! In-memory state storage modules.
//!
//! Stores manage runtime state that doesn't belong in the database:
//! - `WorldRegistry` - the catalog of known worlds and their flags
//! - `IdleWorldTracker` - when each loaded world last became empty

pub mod idle_tracker;
pub mod world_registry;

// Re-export store types
pub use idle_tracker::{IdleEntry, IdleWorldTracker};
pub use world_registry::{RegistryError, UpsertMode, WorldRegistry};
