//! Repository port traits for persisted world metadata.

use async_trait::async_trait;
use buildsys_domain::{RoleDefinition, WorldName, WorldRecord};

use super::error::{ConfigError, RepoError};

// =============================================================================
// World Metadata Storage
// =============================================================================

/// Persisted world records (one row per world).
///
/// `loaded` is runtime state and is never written; records come back with
/// `loaded == false`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorldStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<WorldRecord>, RepoError>;
    async fn insert(&self, record: &WorldRecord) -> Result<(), RepoError>;
    async fn update(&self, name: &WorldName, hidden: bool, locked: bool) -> Result<(), RepoError>;
    async fn delete(&self, name: &WorldName) -> Result<(), RepoError>;
}

// =============================================================================
// Role Configuration
// =============================================================================

/// Supplies role definitions once at startup.
#[async_trait]
pub trait RoleSource: Send + Sync {
    async fn load_roles(&self) -> Result<Vec<RoleDefinition>, ConfigError>;
}
