//! External service port traits (world storage engine, authorization).

use async_trait::async_trait;
use buildsys_domain::{CapabilityId, PrincipalId, WorldKind, WorldName};

use super::error::{AuthError, StorageError};

// =============================================================================
// World Storage Engine
// =============================================================================

/// The engine that physically stores, loads and unloads worlds.
///
/// Its world list is the ground truth for which worlds exist.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorldStorageEngine: Send + Sync {
    /// Names of every world currently on disk.
    async fn list_world_names(&self) -> Result<Vec<String>, StorageError>;

    /// Names of every world currently loaded into the running server.
    async fn list_loaded_worlds(&self) -> Result<Vec<String>, StorageError>;

    /// Generate a new world and leave it loaded.
    async fn create(&self, name: &WorldName, kind: WorldKind) -> Result<(), StorageError>;

    async fn load(&self, name: &WorldName) -> Result<(), StorageError>;

    /// Unload without saving. Unloading a world that is not loaded is not an error.
    async fn unload(&self, name: &WorldName) -> Result<(), StorageError>;

    async fn delete(&self, name: &WorldName) -> Result<(), StorageError>;
}

// =============================================================================
// Authorization
// =============================================================================

/// Answers whether a principal currently holds an opaque capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    async fn principal_has_capability(
        &self,
        principal: &PrincipalId,
        capability: &CapabilityId,
    ) -> Result<bool, AuthError>;
}
