//! Role definitions read from a JSON file.
//!
//! The file is one object keyed by role name. Every field of a role is
//! optional and falls back to its default:
//!
//! ```json
//! {
//!   "builder": { "allowed-world-kinds": ["flat"] },
//!   "admin": {
//!     "permission": "server.admin",
//!     "allowed-world-kinds": ["EMPTY", "FLAT"],
//!     "see-all-worlds": true,
//!     "delete-worlds": true,
//!     "lock-worlds": true,
//!     "hide-worlds": true
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use buildsys_domain::{default_capability_for, AllowedWorldKinds, CapabilityId, RoleDefinition};
use serde::Deserialize;

use crate::infrastructure::ports::{ConfigError, RoleSource};

/// One role as written in the file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RoleSection {
    permission: Option<String>,
    allowed_world_kinds: Option<Vec<String>>,
    allow_search: Option<bool>,
    allow_teleport: Option<bool>,
    see_all_worlds: Option<bool>,
    delete_worlds: Option<bool>,
    lock_worlds: Option<bool>,
    hide_worlds: Option<bool>,
}

impl RoleSection {
    fn into_role(self, key: String) -> Result<RoleDefinition, ConfigError> {
        let invalid = |e: buildsys_domain::DomainError| {
            ConfigError::Invalid(format!("role '{}': {}", key, e))
        };
        let capability = self
            .permission
            .unwrap_or_else(|| default_capability_for(&key));
        let capability = CapabilityId::new(capability).map_err(invalid)?;
        let allowed_kinds = self
            .allowed_world_kinds
            .map(AllowedWorldKinds::parse_lenient)
            .unwrap_or_default();

        Ok(RoleDefinition::new(key.clone(), capability)
            .map_err(invalid)?
            .with_allowed_kinds(allowed_kinds)
            .with_search(self.allow_search.unwrap_or(true))
            .with_teleport(self.allow_teleport.unwrap_or(true))
            .with_see_all_worlds(self.see_all_worlds.unwrap_or(false))
            .with_delete(self.delete_worlds.unwrap_or(false))
            .with_lock(self.lock_worlds.unwrap_or(false))
            .with_hide(self.hide_worlds.unwrap_or(false)))
    }
}

/// Parse a roles document. `source` names the document in errors.
pub fn parse_roles(json: &str, source: &str) -> Result<Vec<RoleDefinition>, ConfigError> {
    let sections: BTreeMap<String, RoleSection> =
        serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            path: source.to_string(),
            message: e.to_string(),
        })?;

    sections
        .into_iter()
        .map(|(key, section)| section.into_role(key))
        .collect()
}

/// Reads roles from a JSON file on each `load_roles` call.
pub struct JsonRoleSource {
    path: PathBuf,
}

impl JsonRoleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RoleSource for JsonRoleSource {
    async fn load_roles(&self) -> Result<Vec<RoleDefinition>, ConfigError> {
        let label = self.path.display().to_string();
        let json = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::Io {
                path: label.clone(),
                message: e.to_string(),
            })?;
        let roles = parse_roles(&json, &label)?;
        tracing::info!(path = %label, count = roles.len(), "Loaded role definitions");
        Ok(roles)
    }
}
