//! Domain entities - Core business objects with identity

mod role;
mod world_record;

pub use role::{default_capability_for, Permission, RoleDefinition, DEFAULT_CAPABILITY_PREFIX};
pub use world_record::{AllowedWorldKinds, WorldKind, WorldRecord};
