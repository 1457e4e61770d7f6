//! Directory-backed world storage engine.
//!
//! Each world is a directory under the root holding a `world.json` manifest.
//! "Loaded" is tracked in memory; a host game server would replace this
//! adapter with one that drives its own world loader.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use buildsys_domain::{WorldKind, WorldName};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};

use crate::infrastructure::ports::{StorageError, WorldStorageEngine};

const MANIFEST_FILE: &str = "world.json";

#[derive(Debug, Serialize, Deserialize)]
struct WorldManifest {
    name: String,
    kind: WorldKind,
}

pub struct DirectoryWorldStorage {
    root: PathBuf,
    loaded: DashSet<WorldName>,
}

impl DirectoryWorldStorage {
    /// Open (and create if needed) the worlds root directory.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", root.display(), e)))?;
        Ok(Self {
            root,
            loaded: DashSet::new(),
        })
    }

    /// Names of all world directories, in directory order.
    async fn scan(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", self.root.display(), e)))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io("scan", e))?
        {
            let path = entry.path();
            if !tokio::fs::try_exists(path.join(MANIFEST_FILE))
                .await
                .unwrap_or(false)
            {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Directory of an existing world, matched without case.
    async fn resolve(&self, name: &WorldName) -> Result<Option<PathBuf>, StorageError> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .find(|dir| dir.eq_ignore_ascii_case(name.as_str()))
            .map(|dir| self.root.join(dir)))
    }
}

#[async_trait]
impl WorldStorageEngine for DirectoryWorldStorage {
    async fn list_world_names(&self) -> Result<Vec<String>, StorageError> {
        self.scan().await
    }

    async fn list_loaded_worlds(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.loaded.iter().map(|name| name.to_string()).collect())
    }

    async fn create(&self, name: &WorldName, kind: WorldKind) -> Result<(), StorageError> {
        if self.resolve(name).await?.is_some() {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }

        let dir = self.root.join(name.as_str());
        tokio::fs::create_dir(&dir).await.map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => StorageError::AlreadyExists(name.to_string()),
            _ => StorageError::io("create", e),
        })?;

        let manifest = WorldManifest {
            name: name.to_string(),
            kind,
        };
        let json =
            serde_json::to_vec_pretty(&manifest).map_err(|e| StorageError::io("create", e))?;
        tokio::fs::write(dir.join(MANIFEST_FILE), json)
            .await
            .map_err(|e| StorageError::io("create", e))?;

        self.loaded.insert(name.clone());
        tracing::debug!(world = %name, path = %dir.display(), "Created world directory");
        Ok(())
    }

    async fn load(&self, name: &WorldName) -> Result<(), StorageError> {
        if self.resolve(name).await?.is_none() {
            return Err(StorageError::WorldNotFound(name.to_string()));
        }
        self.loaded.insert(name.clone());
        Ok(())
    }

    async fn unload(&self, name: &WorldName) -> Result<(), StorageError> {
        self.loaded.remove(name);
        Ok(())
    }

    async fn delete(&self, name: &WorldName) -> Result<(), StorageError> {
        let dir = self
            .resolve(name)
            .await?
            .ok_or_else(|| StorageError::WorldNotFound(name.to_string()))?;
        self.loaded.remove(name);
        tokio::fs::remove_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io("delete", e))?;
        tracing::debug!(world = %name, path = %dir.display(), "Deleted world directory");
        Ok(())
    }
}
