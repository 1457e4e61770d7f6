//! Startup reconciliation between persisted world records and the storage engine.
//!
//! The storage engine is the ground truth for which worlds exist. Persisted
//! rows for worlds it no longer has are deleted; everything else is loaded
//! into the registry with its `loaded` flag seeded from the engine.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use buildsys_domain::WorldName;

use crate::infrastructure::ports::{RepoError, StorageError, WorldStorageEngine, WorldStore};
use crate::stores::{RegistryError, UpsertMode, WorldRegistry};

/// Reconciliation could not complete; the process must not start.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("World store unavailable during startup: {0}")]
    Store(#[from] RepoError),

    #[error("World storage unavailable during startup: {0}")]
    Storage(#[from] StorageError),

    #[error("Registry rejected world record: {0}")]
    Registry(#[from] RegistryError),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Failed to delete orphaned record for world {name}: {source}")]
    OrphanDelete {
        name: String,
        #[source]
        source: RepoError,
    },
}

/// What reconciliation kept and what it threw away.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub retained: Vec<WorldName>,
    pub removed: Vec<WorldName>,
    /// Retained worlds the storage engine already has loaded.
    pub loaded: Vec<WorldName>,
}

pub struct StartupReconciler {
    store: Arc<dyn WorldStore>,
    storage: Arc<dyn WorldStorageEngine>,
    registry: Arc<WorldRegistry>,
    timeout: Duration,
}

impl StartupReconciler {
    pub fn new(
        store: Arc<dyn WorldStore>,
        storage: Arc<dyn WorldStorageEngine>,
        registry: Arc<WorldRegistry>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            storage,
            registry,
            timeout,
        }
    }

    /// Populate the registry from the persisted store, dropping orphans.
    ///
    /// Both collaborator listings are fetched before the registry is touched,
    /// so a failure leaves the registry as it was.
    pub async fn run(&self) -> Result<ReconcileReport, ReconcileError> {
        let records = self.bounded("load_all", self.store.load_all()).await?;
        let on_disk: HashSet<String> = self
            .bounded("list_world_names", self.storage.list_world_names())
            .await?
            .into_iter()
            .map(|name| name.to_ascii_lowercase())
            .collect();
        let loaded = self.loaded_worlds().await;

        let mut report = ReconcileReport::default();
        for record in records {
            let key = record.name().as_str().to_ascii_lowercase();
            if on_disk.contains(&key) {
                let is_loaded = loaded.contains(&key);
                report.retained.push(record.name().clone());
                if is_loaded {
                    report.loaded.push(record.name().clone());
                }
                self.registry
                    .upsert(record.with_loaded(is_loaded), UpsertMode::Replace)
                    .await?;
                continue;
            }

            let name = record.name().clone();
            self.bounded("delete", self.store.delete(&name))
                .await
                .map_err(|e| match e {
                    ReconcileError::Store(source) => ReconcileError::OrphanDelete {
                        name: name.to_string(),
                        source,
                    },
                    other => other,
                })?;
            self.registry.remove(&name).await;
            tracing::info!(world = %name, "Removed orphaned world record");
            report.removed.push(name);
        }

        tracing::info!(
            retained = report.retained.len(),
            removed = report.removed.len(),
            loaded = report.loaded.len(),
            "Startup reconciliation complete"
        );
        Ok(report)
    }

    /// Lower-cased names the engine currently has loaded.
    ///
    /// `loaded` is only a cached view, so a failure here degrades to
    /// "nothing loaded" instead of aborting startup.
    async fn loaded_worlds(&self) -> HashSet<String> {
        match self
            .bounded("list_loaded_worlds", self.storage.list_loaded_worlds())
            .await
        {
            Ok(names) => names
                .into_iter()
                .map(|name| name.to_ascii_lowercase())
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not list loaded worlds, assuming none");
                HashSet::new()
            }
        }
    }

    async fn bounded<T, E>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, ReconcileError>
    where
        ReconcileError: From<E>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(ReconcileError::from),
            Err(_) => Err(ReconcileError::Timeout {
                operation,
                timeout: self.timeout,
            }),
        }
    }
}
