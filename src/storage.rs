//! Artifact storage: where figures and rendered summaries end up.
//!
//! A store is an explicit object handed to the run at construction, never a
//! process-global path. Keys are relative, `/`-separated names such as
//! `figures/paper/paper_page1_img1.jpeg` or `summaries/paper_summary.pdf`.
//!
//! Writes happen from inside the blocking extraction task, so the trait is
//! synchronous.

use crate::error::DigestError;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Storage backend for run artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Write `bytes` under `key`, replacing any previous artifact, and return
    /// the caller-facing location of the stored bytes.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<String, DigestError>;

    /// Read the artifact stored under `key`.
    fn read(&self, key: &str) -> Result<Vec<u8>, DigestError>;

    /// Whether an artifact exists under `key`.
    fn exists(&self, key: &str) -> bool {
        self.read(key).is_ok()
    }
}

/// Reject keys that could escape the store root.
pub fn validate_key(key: &str) -> Result<(), DigestError> {
    if key.is_empty() || key.contains('\\') {
        return Err(DigestError::InvalidStorageKey(key.to_string()));
    }
    let path = Path::new(key);
    let ok = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !ok {
        return Err(DigestError::InvalidStorageKey(key.to_string()));
    }
    Ok(())
}

// ── DirStore ─────────────────────────────────────────────────────────────

/// Filesystem store rooted at a caller-chosen run directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Create the root directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, DigestError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| DigestError::StorageFailed {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path an artifact key maps to.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, DigestError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

impl ArtifactStore for DirStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<String, DigestError> {
        let path = self.path_for(key)?;
        let io_err = |source| DigestError::StorageFailed {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&path, bytes).map_err(io_err)?;
        debug!("Stored {} ({} bytes)", path.display(), bytes.len());
        Ok(path.display().to_string())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, DigestError> {
        let path = self.path_for(key)?;
        std::fs::read(&path).map_err(|source| DigestError::StorageFailed {
            key: key.to_string(),
            source,
        })
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).map(|p| p.is_file()).unwrap_or(false)
    }
}

// ── MemoryStore ──────────────────────────────────────────────────────────

/// In-memory store. Locations are `mem://{key}`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.items
            .lock()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(key: &str) -> DigestError {
    DigestError::StorageFailed {
        key: key.to_string(),
        source: std::io::Error::other("memory store lock poisoned"),
    }
}

impl ArtifactStore for MemoryStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<String, DigestError> {
        validate_key(key)?;
        let mut items = self.items.lock().map_err(|_| poisoned(key))?;
        items.insert(key.to_string(), bytes.to_vec());
        Ok(format!("mem://{key}"))
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, DigestError> {
        let items = self.items.lock().map_err(|_| poisoned(key))?;
        items
            .get(key)
            .cloned()
            .ok_or_else(|| DigestError::StorageFailed {
                key: key.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }
}
