//! World lifecycle use cases.
//!
//! Every operation checks permissions first, then drives the storage engine,
//! the persisted store and the registry in that order. The registry never does
//! I/O itself, so persistence of each registry change happens here.

use std::sync::Arc;

use buildsys_domain::{DomainError, Permission, PrincipalId, WorldKind, WorldName, WorldRecord};
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::infrastructure::ports::{
    ClockPort, RepoError, StorageError, WorldStorageEngine, WorldStore,
};
use crate::stores::{IdleWorldTracker, RegistryError, UpsertMode, WorldRegistry};
use crate::use_cases::listing::WorldListing;
use crate::use_cases::permissions::PermissionResolver;

/// Errors surfaced to the user for world operations. All are recoverable.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Not permitted to {0}")]
    Forbidden(String),
    #[error("World not found: {0}")]
    NotFound(String),
    #[error("World already exists: {0}")]
    Duplicate(String),
    #[error("World {name} is already {state}")]
    AlreadyInState { name: String, state: &'static str },
    #[error("Invalid world name: {0}")]
    InvalidName(#[from] DomainError),
    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<RegistryError> for WorldError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound { name } => Self::NotFound(name),
            RegistryError::Duplicate { name } => Self::Duplicate(name),
        }
    }
}

/// A boolean world flag that users can flip.
#[derive(Debug, Clone, Copy)]
enum Flag {
    Hidden,
    Locked,
}

impl Flag {
    fn permission(self) -> Permission {
        match self {
            Flag::Hidden => Permission::Hide,
            Flag::Locked => Permission::Lock,
        }
    }

    fn get(self, record: &WorldRecord) -> bool {
        match self {
            Flag::Hidden => record.is_hidden(),
            Flag::Locked => record.is_locked(),
        }
    }

    fn set(self, record: &mut WorldRecord, value: bool) {
        match self {
            Flag::Hidden => record.set_hidden(value),
            Flag::Locked => record.set_locked(value),
        }
    }

    fn state(self, value: bool) -> &'static str {
        match (self, value) {
            (Flag::Hidden, true) => "hidden",
            (Flag::Hidden, false) => "visible",
            (Flag::Locked, true) => "locked",
            (Flag::Locked, false) => "unlocked",
        }
    }

    fn action(self, value: bool) -> &'static str {
        match (self, value) {
            (Flag::Hidden, true) => "hide worlds",
            (Flag::Hidden, false) => "show worlds",
            (Flag::Locked, true) => "lock worlds",
            (Flag::Locked, false) => "unlock worlds",
        }
    }
}

pub struct WorldLifecycle {
    registry: Arc<WorldRegistry>,
    tracker: Arc<IdleWorldTracker>,
    permissions: Arc<PermissionResolver>,
    listing: Arc<WorldListing>,
    store: Arc<dyn WorldStore>,
    storage: Arc<dyn WorldStorageEngine>,
    clock: Arc<dyn ClockPort>,
    /// Serializes flag changes per world from registry update to persisted write.
    flag_locks: DashMap<WorldName, Arc<Mutex<()>>>,
}

impl WorldLifecycle {
    pub fn new(
        registry: Arc<WorldRegistry>,
        tracker: Arc<IdleWorldTracker>,
        permissions: Arc<PermissionResolver>,
        listing: Arc<WorldListing>,
        store: Arc<dyn WorldStore>,
        storage: Arc<dyn WorldStorageEngine>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            registry,
            tracker,
            permissions,
            listing,
            store,
            storage,
            clock,
            flag_locks: DashMap::new(),
        }
    }

    /// Principals without any role get no build-system menu at all.
    pub async fn can_open_menu(&self, principal: &PrincipalId) -> bool {
        self.permissions.has_any_role(principal).await
    }

    async fn require(
        &self,
        principal: &PrincipalId,
        permission: Permission,
        action: &str,
    ) -> Result<(), WorldError> {
        if self.permissions.has(principal, permission).await {
            Ok(())
        } else {
            Err(WorldError::Forbidden(action.to_string()))
        }
    }

    async fn find(&self, name: &WorldName) -> Result<WorldRecord, WorldError> {
        self.registry
            .find(name)
            .await
            .ok_or_else(|| WorldError::NotFound(name.to_string()))
    }

    /// Create a new, loaded world owned by `principal`.
    pub async fn create(
        &self,
        principal: &PrincipalId,
        name: &str,
        kind: WorldKind,
    ) -> Result<WorldRecord, WorldError> {
        self.require(
            principal,
            Permission::CreateKind(kind),
            &format!("create {} worlds", kind),
        )
        .await?;
        let name = WorldName::new(name)?;
        if self.registry.exists(&name).await {
            return Err(WorldError::Duplicate(name.to_string()));
        }

        self.storage.create(&name, kind).await?;
        let now = self.clock.now();
        let record = WorldRecord::new(name.clone(), principal.clone(), kind, now).with_loaded(true);

        if let Err(e) = self.store.insert(&record).await {
            if let Err(cleanup) = self.storage.delete(&name).await {
                tracing::warn!(
                    world = %name,
                    error = %cleanup,
                    "Failed to remove storage world after persist failure"
                );
            }
            return Err(e.into());
        }

        self.registry
            .upsert(record.clone(), UpsertMode::CreateOnly)
            .await?;
        // Nobody is inside yet; let the sweep unload it if nobody comes.
        self.tracker.mark_empty(&name, now);

        tracing::info!(world = %name, owner = %principal, kind = %kind, "Created world");
        Ok(record)
    }

    /// Delete a world. Owners may always delete their own worlds.
    pub async fn delete(
        &self,
        principal: &PrincipalId,
        name: &WorldName,
    ) -> Result<WorldRecord, WorldError> {
        let record = self.find(name).await?;
        if !record.is_owned_by(principal)
            && !self.permissions.has(principal, Permission::Delete).await
        {
            return Err(WorldError::Forbidden("delete other players' worlds".to_string()));
        }

        self.tracker.forget(name);
        if record.is_loaded() {
            self.storage.unload(name).await?;
        }
        match self.storage.delete(name).await {
            Ok(()) => {}
            Err(StorageError::WorldNotFound(_)) => {
                tracing::debug!(world = %name, "World already gone from storage");
            }
            Err(e) => return Err(e.into()),
        }
        self.store.delete(name).await?;
        self.registry.remove(name).await;
        self.flag_locks.remove(name);

        tracing::info!(world = %name, by = %principal, "Deleted world");
        Ok(record)
    }

    pub async fn hide(&self, principal: &PrincipalId, name: &WorldName) -> Result<(), WorldError> {
        self.set_flag(principal, name, Flag::Hidden, true).await
    }

    pub async fn show(&self, principal: &PrincipalId, name: &WorldName) -> Result<(), WorldError> {
        self.set_flag(principal, name, Flag::Hidden, false).await
    }

    pub async fn lock(&self, principal: &PrincipalId, name: &WorldName) -> Result<(), WorldError> {
        self.set_flag(principal, name, Flag::Locked, true).await
    }

    pub async fn unlock(
        &self,
        principal: &PrincipalId,
        name: &WorldName,
    ) -> Result<(), WorldError> {
        self.set_flag(principal, name, Flag::Locked, false).await
    }

    async fn set_flag(
        &self,
        principal: &PrincipalId,
        name: &WorldName,
        flag: Flag,
        value: bool,
    ) -> Result<(), WorldError> {
        self.require(principal, flag.permission(), flag.action(value))
            .await?;

        let world_lock = Arc::clone(&self.flag_locks.entry(name.clone()).or_default());
        let _guard = world_lock.lock().await;

        let (hidden, locked) = self
            .registry
            .update(name, |record| {
                if flag.get(record) == value {
                    return Err(WorldError::AlreadyInState {
                        name: record.name().to_string(),
                        state: flag.state(value),
                    });
                }
                flag.set(record, value);
                Ok((record.is_hidden(), record.is_locked()))
            })
            .await?;

        if let Err(e) = self.store.update(name, hidden, locked).await {
            let reverted = self
                .registry
                .update(name, |record| {
                    flag.set(record, !value);
                    Ok::<_, RegistryError>(())
                })
                .await;
            if let Err(revert) = reverted {
                tracing::warn!(world = %name, error = %revert, "Could not roll back world flag");
            }
            return Err(e.into());
        }

        tracing::info!(
            world = %name,
            by = %principal,
            state = flag.state(value),
            "World flag changed"
        );
        Ok(())
    }

    /// Teleport check: load the world if needed and return it.
    ///
    /// Hidden worlds the principal cannot list are reported as not found.
    pub async fn enter(
        &self,
        principal: &PrincipalId,
        name: &WorldName,
    ) -> Result<WorldRecord, WorldError> {
        self.require(principal, Permission::Teleport, "teleport to worlds")
            .await?;
        let record = self.find(name).await?;

        if record.is_hidden()
            && !record.is_owned_by(principal)
            && !self.permissions.has(principal, Permission::Hide).await
        {
            return Err(WorldError::NotFound(name.to_string()));
        }
        if record.is_locked() && !self.permissions.has(principal, Permission::Lock).await {
            return Err(WorldError::Forbidden("enter locked worlds".to_string()));
        }

        if record.is_loaded() {
            return Ok(record);
        }
        self.storage.load(name).await?;
        self.registry.set_loaded(name, true).await?;
        // Until the host reports the arrival the world counts as empty.
        self.tracker.mark_empty(name, self.clock.now());
        tracing::info!(world = %name, "Loaded world");
        Ok(record.with_loaded(true))
    }

    pub async fn list(&self, principal: &PrincipalId) -> Vec<WorldRecord> {
        self.listing.list_for(principal, "").await
    }

    pub async fn search(
        &self,
        principal: &PrincipalId,
        term: &str,
    ) -> Result<Vec<WorldRecord>, WorldError> {
        if !term.trim().is_empty() {
            self.require(principal, Permission::Search, "search worlds")
                .await?;
        }
        Ok(self.listing.list_for(principal, term).await)
    }
}
