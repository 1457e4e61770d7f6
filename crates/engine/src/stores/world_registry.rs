//! World registry - the in-process catalog of known worlds.
//!
//! Owns every `WorldRecord` for the lifetime of the process. The registry does
//! no I/O; callers persist each mutation themselves.
//!
//! All mutations take the write lock for their whole duration, so a concurrent
//! `all()` snapshot never observes a half-applied change.

use std::collections::{BTreeMap, HashMap};

use buildsys_domain::{WorldName, WorldRecord};
use tokio::sync::RwLock;

/// Errors from registry mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("World not found: {name}")]
    NotFound { name: String },

    #[error("World already exists: {name}")]
    Duplicate { name: String },
}

impl RegistryError {
    pub fn not_found(name: &WorldName) -> Self {
        Self::NotFound {
            name: name.to_string(),
        }
    }

    pub fn duplicate(name: &WorldName) -> Self {
        Self::Duplicate {
            name: name.to_string(),
        }
    }
}

/// How `upsert` treats an existing record with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertMode {
    /// Replace the existing record in place (keeps its list position).
    Replace,
    /// Fail with `RegistryError::Duplicate` if the name is taken.
    CreateOnly,
}

#[derive(Default)]
struct Inner {
    /// Insertion sequence -> record. Iteration order is the list order.
    records: BTreeMap<u64, WorldRecord>,
    /// Case-insensitive name -> insertion sequence.
    index: HashMap<WorldName, u64>,
    next_seq: u64,
}

impl Inner {
    fn get_mut(&mut self, name: &WorldName) -> Option<&mut WorldRecord> {
        let seq = *self.index.get(name)?;
        self.records.get_mut(&seq)
    }
}

/// In-memory world catalog keyed by case-insensitive name.
#[derive(Default)]
pub struct WorldRegistry {
    inner: RwLock<Inner>,
}

impl WorldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record by case-insensitive name.
    pub async fn upsert(&self, record: WorldRecord, mode: UpsertMode) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        if let Some(&seq) = inner.index.get(record.name()) {
            if mode == UpsertMode::CreateOnly {
                return Err(RegistryError::duplicate(record.name()));
            }
            // Re-key so the stored name carries the casing of the new record.
            inner.index.remove(record.name());
            inner.index.insert(record.name().clone(), seq);
            inner.records.insert(seq, record);
            return Ok(());
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.index.insert(record.name().clone(), seq);
        inner.records.insert(seq, record);
        Ok(())
    }

    pub async fn find(&self, name: &WorldName) -> Option<WorldRecord> {
        let inner = self.inner.read().await;
        let seq = inner.index.get(name)?;
        inner.records.get(seq).cloned()
    }

    pub async fn exists(&self, name: &WorldName) -> bool {
        self.inner.read().await.index.contains_key(name)
    }

    /// Remove a record. Absent names are a no-op so delete stays idempotent.
    pub async fn remove(&self, name: &WorldName) -> Option<WorldRecord> {
        let mut inner = self.inner.write().await;
        let seq = inner.index.remove(name)?;
        inner.records.remove(&seq)
    }

    /// Snapshot of every record in insertion order.
    pub async fn all(&self) -> Vec<WorldRecord> {
        self.inner.read().await.records.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Flip `hidden` and return the new value.
    pub async fn toggle_hidden(&self, name: &WorldName) -> Result<bool, RegistryError> {
        self.update(name, |record| Ok(record.toggle_hidden())).await
    }

    /// Flip `locked` and return the new value.
    pub async fn toggle_locked(&self, name: &WorldName) -> Result<bool, RegistryError> {
        self.update(name, |record| Ok(record.toggle_locked())).await
    }

    pub async fn set_loaded(&self, name: &WorldName, loaded: bool) -> Result<(), RegistryError> {
        self.update(name, |record| {
            record.set_loaded(loaded);
            Ok(())
        })
        .await
    }

    /// Apply `f` to the named record under the write lock.
    ///
    /// If `f` returns an error the record is left exactly as it was.
    pub async fn update<T, E, F>(&self, name: &WorldName, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WorldRecord) -> Result<T, E>,
        E: From<RegistryError>,
    {
        let mut inner = self.inner.write().await;
        let record = inner
            .get_mut(name)
            .ok_or_else(|| RegistryError::not_found(name))?;
        let mut draft = record.clone();
        let value = f(&mut draft)?;
        *record = draft;
        Ok(value)
    }
}
