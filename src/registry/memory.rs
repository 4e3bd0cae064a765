// src/registry/memory.rs

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{RegistryResult, RegistryStore, Snapshot, split_path};

/// An in-process registry: one JSON tree behind a lock.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    root: Mutex<Value>,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
        }
    }

    /// Creates a registry holding `root` as its whole tree.
    pub fn from_value(root: Value) -> Self {
        let root = if root.is_object() {
            root
        } else {
            Value::Object(Map::new())
        };
        Self {
            root: Mutex::new(root),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.root.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A deep copy of the whole tree.
    pub fn snapshot_tree(&self) -> Value {
        self.lock().clone()
    }

    /// Reads synchronously. Shared with the file-backed registry.
    pub(crate) fn get_sync(&self, path: &str) -> RegistryResult<Snapshot> {
        let segments = split_path(path)?;
        let root = self.lock();
        let mut node = &*root;
        for segment in segments {
            match node.get(segment) {
                Some(child) => node = child,
                None => return Ok(Snapshot::new(path, None)),
            }
        }
        Ok(Snapshot::new(path, Some(node.clone())))
    }

    /// Applies a batch of writes under one lock. Paths are validated before any
    /// write happens, so a bad path leaves the tree untouched.
    pub(crate) fn apply_sync(&self, values: &BTreeMap<String, Value>) -> RegistryResult<()> {
        let parsed = parse_batch(values)?;
        let mut root = self.lock();
        for (segments, value) in parsed {
            write_at(&mut root, &segments, value.clone());
        }
        Ok(())
    }

    /// The tree as it would be after `values`, leaving this registry unchanged.
    pub(crate) fn with_batch(&self, values: &BTreeMap<String, Value>) -> RegistryResult<Value> {
        let parsed = parse_batch(values)?;
        let mut next = self.snapshot_tree();
        for (segments, value) in parsed {
            write_at(&mut next, &segments, value.clone());
        }
        Ok(next)
    }

    /// Swaps in `root` as the whole tree.
    pub(crate) fn replace_tree(&self, root: Value) {
        *self.lock() = root;
    }
}

fn parse_batch(values: &BTreeMap<String, Value>) -> RegistryResult<Vec<(Vec<String>, &Value)>> {
    let mut parsed = Vec::with_capacity(values.len());
    for (path, value) in values {
        let segments: Vec<String> = split_path(path)?.into_iter().map(str::to_string).collect();
        parsed.push((segments, value));
    }
    Ok(parsed)
}

/// Writes `value` at `segments`, creating parents on the way. `null` deletes and
/// prunes parents left empty.
fn write_at(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = if value.is_null() {
            Value::Object(Map::new())
        } else {
            value
        };
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Some(map) = node.as_object_mut() else {
        return;
    };

    if rest.is_empty() {
        if value.is_null() {
            map.remove(head);
        } else {
            map.insert(head.clone(), value);
        }
        return;
    }

    if value.is_null() && !map.contains_key(head) {
        return;
    }
    let child = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    write_at(child, rest, value);

    let child_is_empty = child.as_object().is_some_and(Map::is_empty);
    if child_is_empty {
        map.remove(head);
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistry {
    async fn get(&self, path: &str) -> RegistryResult<Snapshot> {
        self.get_sync(path)
    }

    async fn set(&self, path: &str, value: Value) -> RegistryResult<()> {
        let mut values = BTreeMap::new();
        values.insert(path.to_string(), value);
        self.apply_sync(&values)
    }

    async fn update(&self, values: BTreeMap<String, Value>) -> RegistryResult<()> {
        self.apply_sync(&values)
    }

    async fn remove(&self, path: &str) -> RegistryResult<()> {
        self.set(path, Value::Null).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_and_get_nested() {
        let registry = MemoryRegistry::new();
        registry
            .set("recipes/gulp/public/mylib/info", json!({ "name": "mylib" }))
            .await
            .unwrap();

        let snap = registry.get("recipes/gulp/public/mylib/info").await.unwrap();
        assert!(snap.exists());
        assert_eq!(snap.val().unwrap()["name"], "mylib");

        let parent = registry.get("recipes/gulp/public/mylib").await.unwrap();
        assert!(parent.val().unwrap().get("info").is_some());

        assert!(!registry.exists("recipes/gulp/public/other").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_is_multi_path() {
        let registry = MemoryRegistry::new();
        let mut values = BTreeMap::new();
        values.insert("a/x".to_string(), json!(1));
        values.insert("b/y".to_string(), json!("two"));
        registry.update(values).await.unwrap();

        assert_eq!(registry.get("a/x").await.unwrap().val(), Some(&json!(1)));
        assert_eq!(registry.get("b/y").await.unwrap().val(), Some(&json!("two")));
    }

    #[tokio::test]
    async fn test_update_with_bad_path_writes_nothing() {
        let registry = MemoryRegistry::new();
        let mut values = BTreeMap::new();
        values.insert("a/x".to_string(), json!(1));
        values.insert("b/1.0".to_string(), json!(2));
        assert!(registry.update(values).await.is_err());
        assert!(!registry.exists("a/x").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_prunes_empty_parents() {
        let registry = MemoryRegistry::new();
        registry.set("a/b/c", json!(true)).await.unwrap();
        registry.remove("a/b/c").await.unwrap();
        assert!(!registry.exists("a").await.unwrap());
        assert_eq!(registry.snapshot_tree(), json!({}));
    }

    #[tokio::test]
    async fn test_null_in_update_deletes() {
        let registry = MemoryRegistry::from_value(json!({ "k": { "v": 1, "w": 2 } }));
        let mut values = BTreeMap::new();
        values.insert("k/v".to_string(), Value::Null);
        registry.update(values).await.unwrap();
        assert_eq!(registry.snapshot_tree(), json!({ "k": { "w": 2 } }));
    }
}
