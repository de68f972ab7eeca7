// src/stores/artifacts.rs

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    /// Writes (or overwrites) one artifact, creating parent directories.
    async fn write(&self, path: &str, data: Vec<u8>) -> AppResult<()>;

    /// Returns `NotFound` when absent.
    async fn read(&self, path: &str) -> AppResult<Vec<u8>>;

    async fn exists(&self, path: &str) -> AppResult<bool>;

    /// Recursively deletes a directory. Absent directories are not an error.
    async fn delete_tree(&self, dir: &str) -> AppResult<()>;
}

/// Local filesystem store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || path.is_empty() {
            return Err(AppError::Validation(format!("invalid artifact path: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn write(&self, path: &str, data: Vec<u8>) -> AppResult<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, data).await?;
        Ok(())
    }

    async fn read(&self, path: &str) -> AppResult<Vec<u8>> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| AppError::from(e).context(&format!("read artifact {path}")))
    }

    async fn exists(&self, path: &str) -> AppResult<bool> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full).await?)
    }

    async fn delete_tree(&self, dir: &str) -> AppResult<()> {
        let full = self.resolve(dir)?;
        match tokio::fs::remove_dir_all(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of every stored artifact, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.blobs
            .lock()
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.blobs
            .lock()
            .map_err(|_| AppError::Internal("lock poisoned".into()))
    }
}

fn dir_prefix(dir: &str) -> String {
    format!("{}/", dir.trim_end_matches('/'))
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn write(&self, path: &str, data: Vec<u8>) -> AppResult<()> {
        self.lock()?.insert(path.to_string(), data);
        Ok(())
    }

    async fn read(&self, path: &str) -> AppResult<Vec<u8>> {
        self.lock()?
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("artifact {path}")))
    }

    async fn exists(&self, path: &str) -> AppResult<bool> {
        let blobs = self.lock()?;
        let prefix = dir_prefix(path);
        Ok(blobs.contains_key(path) || blobs.keys().any(|k| k.starts_with(&prefix)))
    }

    async fn delete_tree(&self, dir: &str) -> AppResult<()> {
        let prefix = dir_prefix(dir);
        self.lock()?.retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}
