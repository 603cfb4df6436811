//! Audit storage backends.

use crate::error::AuditError;
use crate::event::AuditEvent;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

/// Trait for audit storage backends.
#[async_trait]
pub trait AuditStorage: Send + Sync {
    /// Store an audit event.
    async fn store(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullStorage;

impl NullStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditStorage for NullStorage {
    async fn store(&self, _event: &AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Console storage (one JSON object per line on stdout).
#[derive(Debug, Default)]
pub struct ConsoleStorage;

impl ConsoleStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditStorage for ConsoleStorage {
    async fn store(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let json = serde_json::to_string(event)?;
        println!("{}", json);
        Ok(())
    }
}

/// File storage (appends JSON Lines, creating the file if needed).
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // Serializes appends from concurrent sessions.
    lock: Mutex<()>,
}

impl FileStorage {
    /// Create a new file storage, creating parent directories.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| AuditError::SinkUnavailable {
                path: path.clone(),
                source,
            })?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditStorage for FileStorage {
    async fn store(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let json = serde_json::to_string(event)?;
        let _guard = self
            .lock
            .lock()
            .map_err(|e| AuditError::StorageError(format!("Audit file lock poisoned: {}", e)))?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// File plus console.
#[derive(Debug)]
pub struct DualStorage {
    file: FileStorage,
    console: ConsoleStorage,
}

impl DualStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        Ok(Self {
            file: FileStorage::new(path)?,
            console: ConsoleStorage::new(),
        })
    }
}

#[async_trait]
impl AuditStorage for DualStorage {
    async fn store(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.file.store(event).await?;
        self.console.store(event).await
    }
}

/// Keeps events in memory; used by tests and the `check` command.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything stored so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AuditStorage for MemoryStorage {
    async fn store(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events
            .write()
            .map_err(|e| AuditError::StorageError(format!("Failed to acquire write lock: {}", e)))?
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SessionIdentity;
    use sqlward_core::OpMode;

    fn event() -> AuditEvent {
        AuditEvent::session(&SessionIdentity::default(), OpMode::Check, 1, 0, 5)
    }

    #[tokio::test]
    async fn test_file_storage_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("audit.jsonl");
        let storage = FileStorage::new(&path).unwrap();

        storage.store(&event()).await.unwrap();
        storage.store(&event()).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: AuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.kind(), "session");
    }

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();
        storage.store(&event()).await.unwrap();
        assert_eq!(storage.events().len(), 1);
    }

    #[tokio::test]
    async fn test_null_and_console_do_not_fail() {
        NullStorage::new().store(&event()).await.unwrap();
        ConsoleStorage::new().store(&event()).await.unwrap();
    }
}
