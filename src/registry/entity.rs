// src/registry/entity.rs

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{RegistryResult, RegistryStore, Snapshot};
use crate::core::cache::EntityCache;

/// A typed, cached repository for one kind of registry record.
///
/// Reads fill the cache; every write made through the manager invalidates the
/// written path and everything above or below it. Writes made directly on the store
/// (multi-path updates spanning several record kinds) must call [`Self::invalidate`]
/// for the paths they touched.
pub struct EntityManager<T> {
    store: Arc<dyn RegistryStore>,
    cache: EntityCache,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for EntityManager<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("type", &std::any::type_name::<T>())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl<T> EntityManager<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a manager over `store` with an empty cache.
    pub fn new(store: Arc<dyn RegistryStore>, name: &'static str) -> Self {
        Self {
            store,
            cache: EntityCache::new(name),
            _marker: PhantomData,
        }
    }

    /// Reads and decodes the record at `path`.
    pub async fn get(&self, path: &str) -> RegistryResult<Option<T>> {
        if let Some(value) = self.cache.get(path) {
            return Snapshot::new(path, Some(value)).decode();
        }
        let snapshot = self.store.get(path).await?;
        let decoded = snapshot.decode()?;
        if let Some(value) = snapshot.into_val() {
            self.cache.set(path, value);
        }
        Ok(decoded)
    }

    /// Reads the record at `path`, bypassing and refreshing the cache.
    pub async fn get_fresh(&self, path: &str) -> RegistryResult<Option<T>> {
        self.cache.remove(path);
        self.get(path).await
    }

    /// `true` if a record exists at `path`.
    pub async fn exists(&self, path: &str) -> RegistryResult<bool> {
        Ok(self.get(path).await?.is_some())
    }

    /// Replaces the record at `path`.
    pub async fn set(&self, path: &str, record: &T) -> RegistryResult<()> {
        let value = serde_json::to_value(record)?;
        self.invalidate(path);
        self.store.set(path, value.clone()).await?;
        self.cache.set(path, value);
        Ok(())
    }

    /// Merges `fields` into the record at `path` (a multi-path update of its children).
    pub async fn update(&self, path: &str, fields: Map<String, Value>) -> RegistryResult<()> {
        let values: BTreeMap<String, Value> = fields
            .into_iter()
            .map(|(field, value)| (format!("{}/{}", path.trim_end_matches('/'), field), value))
            .collect();
        self.invalidate(path);
        self.store.update(values).await
    }

    /// Removes the record at `path`.
    pub async fn remove(&self, path: &str) -> RegistryResult<()> {
        self.invalidate(path);
        self.store.remove(path).await
    }

    /// Drops cached values at `path` and at every ancestor of it.
    ///
    /// Descendants are cached under their own paths, so those are dropped too.
    pub fn invalidate(&self, path: &str) {
        let path = path.trim_matches('/');
        let mut prefix = String::new();
        for segment in path.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            self.cache.remove(&prefix);
        }
        let nested = format!("{}/", path);
        self.cache.retain(|cached| !cached.starts_with(&nested));
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn RegistryStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecipeVersionsInfo;
    use crate::registry::memory::MemoryRegistry;
    use serde_json::json;

    fn manager() -> (Arc<MemoryRegistry>, EntityManager<RecipeVersionsInfo>) {
        let store = Arc::new(MemoryRegistry::new());
        let manager = EntityManager::new(store.clone() as Arc<dyn RegistryStore>, "versionsInfo");
        (store, manager)
    }

    #[tokio::test]
    async fn test_get_caches_until_invalidated() {
        let (store, manager) = manager();
        store
            .set("r/versionsInfo", json!({ "last": "1.0.0" }))
            .await
            .unwrap();

        let first = manager.get("r/versionsInfo").await.unwrap().unwrap();
        assert_eq!(first.last, "1.0.0");

        // A write that bypasses the manager is not seen until invalidation.
        store
            .set("r/versionsInfo", json!({ "last": "2.0.0" }))
            .await
            .unwrap();
        assert_eq!(manager.get("r/versionsInfo").await.unwrap().unwrap().last, "1.0.0");

        manager.invalidate("r/versionsInfo");
        assert_eq!(manager.get("r/versionsInfo").await.unwrap().unwrap().last, "2.0.0");
    }

    #[tokio::test]
    async fn test_set_and_update_through_manager() {
        let (_store, manager) = manager();
        let info = RecipeVersionsInfo {
            last: "1.0.0".into(),
            ..Default::default()
        };
        manager.set("r/versionsInfo", &info).await.unwrap();

        let mut fields = Map::new();
        fields.insert("last".into(), json!("1.1.0"));
        manager.update("r/versionsInfo", fields).await.unwrap();

        assert_eq!(manager.get("r/versionsInfo").await.unwrap().unwrap().last, "1.1.0");
    }

    #[tokio::test]
    async fn test_missing_record_is_none_and_not_cached() {
        let (store, manager) = manager();
        assert!(manager.get("r/versionsInfo").await.unwrap().is_none());
        store
            .set("r/versionsInfo", json!({ "last": "1.0.0" }))
            .await
            .unwrap();
        assert!(manager.exists("r/versionsInfo").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_drops_record() {
        let (_store, manager) = manager();
        let info = RecipeVersionsInfo {
            last: "1.0.0".into(),
            ..Default::default()
        };
        manager.set("r/versionsInfo", &info).await.unwrap();
        manager.remove("r/versionsInfo").await.unwrap();
        assert!(manager.get("r/versionsInfo").await.unwrap().is_none());
    }
}
