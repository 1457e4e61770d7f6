//! Build-world domain types.
//!
//! Pure data and invariants with no I/O: world records, role definitions and
//! the permission kinds they grant.

pub mod entities;
pub mod error;
pub mod value_objects;

pub use entities::{
    default_capability_for, AllowedWorldKinds, Permission, RoleDefinition, WorldKind,
    WorldRecord, DEFAULT_CAPABILITY_PREFIX,
};
pub use error::DomainError;
pub use value_objects::{CapabilityId, PrincipalId, WorldName};
