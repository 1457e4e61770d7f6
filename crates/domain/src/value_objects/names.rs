//! Validated name newtypes for domain entities
//!
//! These newtypes ensure that names are valid by construction:
//! - Non-empty
//! - Within length limits
//! - Trimmed of leading/trailing whitespace
//!
//! `WorldName` and `PrincipalId` compare case-insensitively; their `Display`
//! keeps the casing they were created with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::DomainError;

/// Maximum length for world names (they double as storage directory names)
const MAX_WORLD_NAME_LENGTH: usize = 64;

/// Maximum length for principal ids and capability ids
const MAX_ID_LENGTH: usize = 200;

fn hash_ignore_ascii_case<H: Hasher>(value: &str, state: &mut H) {
    for b in value.bytes() {
        state.write_u8(b.to_ascii_lowercase());
    }
    state.write_u8(0xff);
}

// ============================================================================
// WorldName
// ============================================================================

/// A validated world name (ASCII letters, digits, `_` and `-`; <=64 chars).
///
/// Equality and hashing ignore ASCII case, which makes the name usable
/// directly as the registry identity key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorldName(String);

impl WorldName {
    /// Create a new validated world name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if:
    /// - The name is empty after trimming
    /// - The name exceeds 64 characters after trimming
    /// - The name contains anything other than ASCII letters, digits, `_` or `-`
    pub fn new(name: impl Into<String>) -> Result<Self, DomainError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("World name cannot be empty"));
        }
        if trimmed.len() > MAX_WORLD_NAME_LENGTH {
            return Err(DomainError::validation(format!(
                "World name cannot exceed {} characters",
                MAX_WORLD_NAME_LENGTH
            )));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(DomainError::validation(format!(
                "World name contains invalid character '{}'",
                bad
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive substring match.
    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        self.0
            .to_ascii_lowercase()
            .contains(&needle.to_ascii_lowercase())
    }
}

impl PartialEq for WorldName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for WorldName {}

impl Hash for WorldName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ignore_ascii_case(&self.0, state);
    }
}

impl fmt::Display for WorldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WorldName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<WorldName> for String {
    fn from(name: WorldName) -> String {
        name.0
    }
}

// ============================================================================
// PrincipalId
// ============================================================================

/// The acting user whose permissions are evaluated (non-empty, <=200 chars).
///
/// Compared case-insensitively, the same way world ownership is checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("Principal id cannot be empty"));
        }
        if trimmed.len() > MAX_ID_LENGTH {
            return Err(DomainError::validation(format!(
                "Principal id cannot exceed {} characters",
                MAX_ID_LENGTH
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for PrincipalId {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for PrincipalId {}

impl Hash for PrincipalId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_ignore_ascii_case(&self.0, state);
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PrincipalId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PrincipalId> for String {
    fn from(id: PrincipalId) -> String {
        id.0
    }
}

// ============================================================================
// CapabilityId
// ============================================================================

/// An opaque authorization fact identifier (e.g. `buildsystem.builder`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CapabilityId(String);

impl CapabilityId {
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("Capability id cannot be empty"));
        }
        if trimmed.len() > MAX_ID_LENGTH {
            return Err(DomainError::validation(format!(
                "Capability id cannot exceed {} characters",
                MAX_ID_LENGTH
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CapabilityId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CapabilityId> for String {
    fn from(id: CapabilityId) -> String {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn world_name_trims_whitespace() {
        let name = WorldName::new("  alpha  ").unwrap();
        assert_eq!(name.as_str(), "alpha");
    }

    #[test]
    fn world_name_rejects_empty() {
        assert!(WorldName::new("").is_err());
        assert!(WorldName::new("   ").is_err());
    }

    #[test]
    fn world_name_rejects_too_long() {
        assert!(WorldName::new("a".repeat(MAX_WORLD_NAME_LENGTH)).is_ok());
        assert!(WorldName::new("a".repeat(MAX_WORLD_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn world_name_rejects_path_characters() {
        assert!(WorldName::new("../etc").is_err());
        assert!(WorldName::new("my world").is_err());
        assert!(WorldName::new("build_1-test").is_ok());
    }

    #[test]
    fn world_name_equality_ignores_case() {
        let a = WorldName::new("Alpha").unwrap();
        let b = WorldName::new("aLPHA").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Alpha");

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn world_name_substring_ignores_case() {
        let name = WorldName::new("SkyCastle").unwrap();
        assert!(name.contains_ignore_case("castle"));
        assert!(name.contains_ignore_case("SKY"));
        assert!(!name.contains_ignore_case("tower"));
    }

    #[test]
    fn world_name_deserialize_validates() {
        let ok: Result<WorldName, _> = serde_json::from_str("\"alpha\"");
        assert!(ok.is_ok());
        let bad: Result<WorldName, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }

    #[test]
    fn principal_equality_ignores_case() {
        let a = PrincipalId::new("Bob").unwrap();
        let b = PrincipalId::new("bob").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn capability_is_case_sensitive() {
        let a = CapabilityId::new("buildsystem.admin").unwrap();
        let b = CapabilityId::new("BuildSystem.Admin").unwrap();
        assert_ne!(a, b);
        assert!(CapabilityId::new(" ").is_err());
    }
}
