// src/registry/file.rs

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex as AsyncMutex;

use super::memory::MemoryRegistry;
use super::{RegistryError, RegistryResult, RegistryStore, Snapshot};

/// The name of the registry document inside a file registry directory.
pub const REGISTRY_DOCUMENT: &str = "registry.json";

/// An offline registry: the whole tree lives in one JSON document on disk.
///
/// Reads are served from memory. Every write is applied to a copy of the tree, the
/// document is rewritten through a temporary file and an atomic rename, and only
/// then does the copy replace the in-memory tree.
#[derive(Debug)]
pub struct FileRegistry {
    dir: PathBuf,
    tree: MemoryRegistry,
    write_lock: AsyncMutex<()>,
}

impl FileRegistry {
    /// Opens (or creates) the registry stored in `dir`.
    pub fn open(dir: &Path) -> RegistryResult<Self> {
        fs::create_dir_all(dir)?;
        let document = dir.join(REGISTRY_DOCUMENT);
        let tree = match fs::read(&document) {
            Ok(bytes) => {
                log::debug!("Loading file registry from '{}'", document.display());
                MemoryRegistry::from_value(serde_json::from_slice(&bytes)?)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!(
                    "No registry document at '{}'. Starting empty.",
                    document.display()
                );
                MemoryRegistry::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            tree,
            write_lock: AsyncMutex::new(()),
        })
    }

    /// The directory holding the registry document (and, for local publishing, packages).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write_batch(&self, values: BTreeMap<String, Value>) -> RegistryResult<()> {
        // Serialize writers so documents hit the disk in the order they were applied.
        let _guard = self.write_lock.lock().await;
        let next = self.tree.with_batch(&values)?;
        let dir = self.dir.clone();
        let next = tokio::task::spawn_blocking(move || persist(&dir, &next).map(|()| next))
            .await
            .map_err(|e| RegistryError::Io(std::io::Error::other(e)))??;
        // Memory only moves forward once the document is on disk.
        self.tree.replace_tree(next);
        Ok(())
    }
}

fn persist(dir: &Path, tree: &Value) -> RegistryResult<()> {
    let bytes = serde_json::to_vec_pretty(tree)?;
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(&bytes)?;
    temp.flush()?;
    temp.persist(dir.join(REGISTRY_DOCUMENT))
        .map_err(|e| RegistryError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl RegistryStore for FileRegistry {
    async fn get(&self, path: &str) -> RegistryResult<Snapshot> {
        self.tree.get_sync(path)
    }

    async fn set(&self, path: &str, value: Value) -> RegistryResult<()> {
        let mut values = BTreeMap::new();
        values.insert(path.to_string(), value);
        self.write_batch(values).await
    }

    async fn update(&self, values: BTreeMap<String, Value>) -> RegistryResult<()> {
        self.write_batch(values).await
    }

    async fn remove(&self, path: &str) -> RegistryResult<()> {
        self.set(path, Value::Null).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_writes_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let registry = FileRegistry::open(dir.path()).unwrap();
            registry.set("users/u1", json!({ "username": "ana" })).await.unwrap();
        }

        let reopened = FileRegistry::open(dir.path()).unwrap();
        let snap = reopened.get("users/u1/username").await.unwrap();
        assert_eq!(snap.val(), Some(&json!("ana")));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(REGISTRY_DOCUMENT), "not json").unwrap();
        assert!(matches!(
            FileRegistry::open(dir.path()),
            Err(RegistryError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("registry");
        let registry = FileRegistry::open(&root).unwrap();
        registry.set("users/u1", json!({ "username": "ana" })).await.unwrap();

        fs::remove_dir_all(&root).unwrap();
        assert!(registry.set("users/u2", json!({ "username": "bo" })).await.is_err());

        assert!(!registry.exists("users/u2").await.unwrap());
        assert_eq!(
            registry.get("users/u1/username").await.unwrap().val(),
            Some(&json!("ana"))
        );
    }
}
