//! Role definitions - named capability bundles loaded from configuration

use serde::{Deserialize, Serialize};

use crate::entities::world_record::{AllowedWorldKinds, WorldKind};
use crate::error::DomainError;
use crate::value_objects::CapabilityId;

/// Capability prefix used when a role does not name its own capability.
pub const DEFAULT_CAPABILITY_PREFIX: &str = "buildsystem.";

/// A build-system permission kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Create a world using the given generator
    CreateKind(WorldKind),
    /// Filter the world list by name
    Search,
    /// Enter (teleport to) a world
    Teleport,
    /// List worlds owned by others
    SeeAllWorlds,
    /// Delete worlds owned by others
    Delete,
    /// Lock/unlock worlds and enter locked ones
    Lock,
    /// Hide/show worlds and see hidden ones
    Hide,
}

/// A named capability bundle.
///
/// A principal "has" a role when it holds `required_capability`; the role
/// then grants exactly the permissions its own flags allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    key: String,
    required_capability: CapabilityId,
    allowed_kinds: AllowedWorldKinds,
    can_search: bool,
    can_teleport: bool,
    can_see_all_worlds: bool,
    can_delete: bool,
    can_lock: bool,
    can_hide: bool,
}

impl RoleDefinition {
    /// Create a role with the default flag values: search and teleport
    /// allowed, everything else denied, no creatable world kinds.
    pub fn new(
        key: impl Into<String>,
        required_capability: CapabilityId,
    ) -> Result<Self, DomainError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(DomainError::validation("Role key cannot be empty"));
        }
        Ok(Self {
            key,
            required_capability,
            allowed_kinds: AllowedWorldKinds::None,
            can_search: true,
            can_teleport: true,
            can_see_all_worlds: false,
            can_delete: false,
            can_lock: false,
            can_hide: false,
        })
    }

    /// Create a role whose capability is `buildsystem.<key lowercased>`.
    pub fn with_default_capability(key: impl Into<String>) -> Result<Self, DomainError> {
        let key = key.into();
        let capability = CapabilityId::new(default_capability_for(&key))?;
        Self::new(key, capability)
    }

    pub fn with_allowed_kinds(mut self, kinds: AllowedWorldKinds) -> Self {
        self.allowed_kinds = kinds;
        self
    }

    pub fn with_search(mut self, allowed: bool) -> Self {
        self.can_search = allowed;
        self
    }

    pub fn with_teleport(mut self, allowed: bool) -> Self {
        self.can_teleport = allowed;
        self
    }

    pub fn with_see_all_worlds(mut self, allowed: bool) -> Self {
        self.can_see_all_worlds = allowed;
        self
    }

    pub fn with_delete(mut self, allowed: bool) -> Self {
        self.can_delete = allowed;
        self
    }

    pub fn with_lock(mut self, allowed: bool) -> Self {
        self.can_lock = allowed;
        self
    }

    pub fn with_hide(mut self, allowed: bool) -> Self {
        self.can_hide = allowed;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn required_capability(&self) -> &CapabilityId {
        &self.required_capability
    }

    pub fn allowed_kinds(&self) -> &AllowedWorldKinds {
        &self.allowed_kinds
    }

    /// Whether this role grants `permission`.
    ///
    /// Each permission kind is answered by its own flag only.
    pub fn grants(&self, permission: Permission) -> bool {
        match permission {
            Permission::CreateKind(kind) => self.allowed_kinds.allows(kind),
            Permission::Search => self.can_search,
            Permission::Teleport => self.can_teleport,
            Permission::SeeAllWorlds => self.can_see_all_worlds,
            Permission::Delete => self.can_delete,
            Permission::Lock => self.can_lock,
            Permission::Hide => self.can_hide,
        }
    }
}

/// `buildsystem.<key lowercased>`
pub fn default_capability_for(key: &str) -> String {
    format!("{}{}", DEFAULT_CAPABILITY_PREFIX, key.trim().to_lowercase())
}
