//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Persisted world metadata (could swap SQLite -> MySQL)
//! - The world storage engine (directory-backed here, a game server in production)
//! - Authorization (grants file here, the host's permission system in production)
//! - Role configuration
//! - Clock (for testing)

mod error;
mod external;
mod repos;
mod testing;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{RoleSource, WorldStore};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{AuthorizationProvider, WorldStorageEngine};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use external::{MockAuthorizationProvider, MockWorldStorageEngine};
#[cfg(test)]
pub use repos::MockWorldStore;
#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;

// =============================================================================
// Error Types
// =============================================================================
pub use error::{AuthError, ConfigError, RepoError, StorageError};
