//! World record - one build world known to the server

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{PrincipalId, WorldName};

/// Generator used when a world was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorldKind {
    /// Void world with a single spawn platform
    Empty,
    /// Superflat terrain
    Flat,
}

impl WorldKind {
    pub fn all() -> &'static [WorldKind] {
        &[WorldKind::Empty, WorldKind::Flat]
    }

    /// Stable identifier used in persisted rows and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorldKind::Empty => "EMPTY",
            WorldKind::Flat => "FLAT",
        }
    }
}

impl fmt::Display for WorldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorldKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EMPTY" => Ok(WorldKind::Empty),
            "FLAT" => Ok(WorldKind::Flat),
            _ => Err(DomainError::parse(format!("Unknown world kind: {}", s))),
        }
    }
}

/// Set of world kinds a role may create.
///
/// `None` is the explicit sentinel used when the configured list is absent,
/// empty, or contains nothing parseable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AllowedWorldKinds {
    #[default]
    None,
    Kinds(BTreeSet<WorldKind>),
}

impl AllowedWorldKinds {
    pub fn from_kinds(kinds: impl IntoIterator<Item = WorldKind>) -> Self {
        let kinds: BTreeSet<WorldKind> = kinds.into_iter().collect();
        if kinds.is_empty() {
            Self::None
        } else {
            Self::Kinds(kinds)
        }
    }

    /// Parse configured entries, silently skipping unknown ones.
    pub fn parse_lenient<S: AsRef<str>>(entries: impl IntoIterator<Item = S>) -> Self {
        Self::from_kinds(
            entries
                .into_iter()
                .filter_map(|entry| entry.as_ref().parse::<WorldKind>().ok()),
        )
    }

    pub fn allows(&self, kind: WorldKind) -> bool {
        match self {
            Self::None => false,
            Self::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

/// A build world and its mutable flags.
///
/// # Invariants
///
/// - `name` is the identity key and compares case-insensitively
/// - `loaded` is a cached view of runtime state, never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct WorldRecord {
    name: WorldName,
    owner: PrincipalId,
    kind: WorldKind,
    created_at: DateTime<Utc>,
    hidden: bool,
    locked: bool,
    loaded: bool,
}

impl WorldRecord {
    /// Create a visible, unlocked, unloaded world record.
    pub fn new(
        name: WorldName,
        owner: PrincipalId,
        kind: WorldKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            owner,
            kind,
            created_at,
            hidden: false,
            locked: false,
            loaded: false,
        }
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn with_loaded(mut self, loaded: bool) -> Self {
        self.loaded = loaded;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn name(&self) -> &WorldName {
        &self.name
    }

    #[inline]
    pub fn owner(&self) -> &PrincipalId {
        &self.owner
    }

    #[inline]
    pub fn kind(&self) -> WorldKind {
        self.kind
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_owned_by(&self, principal: &PrincipalId) -> bool {
        &self.owner == principal
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    /// Flip the hidden flag and return the new value.
    pub fn toggle_hidden(&mut self) -> bool {
        self.hidden = !self.hidden;
        self.hidden
    }

    /// Flip the locked flag and return the new value.
    pub fn toggle_locked(&mut self) -> bool {
        self.locked = !self.locked;
        self.locked
    }
}
