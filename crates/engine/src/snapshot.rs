//! Durable snapshot persistence as a get/set blob store.

use crate::error::SnapshotError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

/// Blob store holding the serialized user store.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the last saved snapshot, `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<Vec<u8>>, SnapshotError>;

    /// Replace the saved snapshot wholesale.
    async fn save(&self, bytes: Vec<u8>) -> Result<(), SnapshotError>;
}

/// Snapshot kept in a single JSON file.
///
/// Saves write a sibling temporary file and rename it over the target.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Vec<u8>>, SnapshotError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, bytes: Vec<u8>) -> Result<(), SnapshotError> {
        let temp = self.temp_path();
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

/// In-memory snapshot store. Can be told to fail saves.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    data: Mutex<Option<Vec<u8>>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with existing snapshot bytes.
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data: Mutex::new(Some(bytes)),
            ..Default::default()
        }
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Last saved bytes.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Vec<u8>>, SnapshotError> {
        Ok(self.bytes())
    }

    async fn save(&self, bytes: Vec<u8>) -> Result<(), SnapshotError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SnapshotError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "mock: save failed",
            )));
        }
        *self
            .data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(bytes);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
