//! Authorization provider backed by a JSON grants file.
//!
//! The file maps principal ids to the capabilities they hold:
//!
//! ```json
//! { "bob": ["buildsystem.builder"], "alice": ["buildsystem.builder", "server.admin"] }
//! ```
//!
//! Grants are read once at startup.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use buildsys_domain::{CapabilityId, PrincipalId};

use crate::infrastructure::ports::{AuthError, AuthorizationProvider, ConfigError};

type Grants = HashMap<PrincipalId, HashSet<String>>;

pub struct GrantsFileAuthorization {
    grants: Grants,
}

impl GrantsFileAuthorization {
    /// Read the grants file. A missing file means nobody holds anything.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let grants = read_grants(path.as_ref()).await?;
        Ok(Self { grants })
    }
}

async fn read_grants(path: &Path) -> Result<Grants, ConfigError> {
    let label = path.display().to_string();
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                path = %label,
                "Grants file not found, no principal holds any capability"
            );
            return Ok(Grants::new());
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: label,
                message: e.to_string(),
            })
        }
    };
    parse_grants(&json, &label)
}

/// Parse a grants document. `source` names the document in errors.
pub fn parse_grants(json: &str, source: &str) -> Result<Grants, ConfigError> {
    let raw: HashMap<String, Vec<String>> =
        serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            path: source.to_string(),
            message: e.to_string(),
        })?;

    let mut grants = Grants::with_capacity(raw.len());
    for (principal, capabilities) in raw {
        let principal = PrincipalId::new(principal)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", source, e)))?;
        // Principals compare without case, so merge entries that collide.
        grants
            .entry(principal)
            .or_default()
            .extend(capabilities.into_iter().map(|c| c.trim().to_string()));
    }
    Ok(grants)
}

#[async_trait]
impl AuthorizationProvider for GrantsFileAuthorization {
    async fn principal_has_capability(
        &self,
        principal: &PrincipalId,
        capability: &CapabilityId,
    ) -> Result<bool, AuthError> {
        Ok(self
            .grants
            .get(principal)
            .is_some_and(|held| held.contains(capability.as_str())))
    }
}
