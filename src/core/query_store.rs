// src/core/query_store.rs

//! Resolution of `name[@range]` queries to a concrete published version.

use crate::core::cache::{RecipeQueryCache, recipe_cache_key};
use crate::core::error::{RecipeError, RecipeResult};
use crate::core::identifier::{
    RecipeQuery, max_satisfying, parse_version_query, validate_recipe_name,
};
use crate::models::RecipeVersionsInfo;
use crate::registry::entity::EntityManager;
use crate::registry::paths;

/// A query resolved to one published version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResultData {
    pub name: String,
    pub scope: String,
    pub recipe_type: String,
    pub version_number: String,
}

impl QueryResultData {
    /// `type-scope-name-version`, the key the recipe cache uses.
    pub fn cache_key(&self) -> String {
        recipe_cache_key(
            &self.recipe_type,
            &self.scope,
            &self.name,
            &self.version_number,
        )
    }
}

/// Resolves recipe queries against the `versionsInfo` records of the registry.
///
/// Results are cached by the raw query string for the lifetime of the store: once
/// `"mylib"` has resolved to `1.2.0`, a later publish of `1.3.0` is not seen until
/// the entry is dropped with [`Self::invalidate`] or [`Self::clear`], or the query is
/// re-run with [`Self::query_fresh`]. Repeated resolution in one process is stable.
#[derive(Debug)]
pub struct RecipeQueryStore {
    versions: EntityManager<RecipeVersionsInfo>,
    cache: RecipeQueryCache,
}

impl RecipeQueryStore {
    pub fn new(versions: EntityManager<RecipeVersionsInfo>) -> Self {
        Self {
            versions,
            cache: RecipeQueryCache::new("queries"),
        }
    }

    pub async fn query(&self, query: &str) -> RecipeResult<QueryResultData> {
        if let Some(hit) = self.cache.get(query) {
            return Ok(hit);
        }
        let result = self.resolve(query).await?;
        log::debug!("Resolved '{}' to {}", query, result.version_number);
        self.cache.set(query, result.clone());
        Ok(result)
    }

    /// Resolves `query` against the current registry state and replaces the cached
    /// answer.
    pub async fn query_fresh(&self, query: &str) -> RecipeResult<QueryResultData> {
        let parsed = RecipeQuery::parse(query);
        validate_recipe_name(&parsed.name)?;
        self.versions.invalidate(&paths::versions_info(
            &parsed.recipe_type,
            &parsed.scope,
            &parsed.name,
        ));
        self.cache.remove(query);
        self.query(query).await
    }

    /// Drops the cached answer for `query`. Returns `true` if there was one.
    pub fn invalidate(&self, query: &str) -> bool {
        self.cache.remove(query)
    }

    /// Drops every cached answer.
    pub fn clear(&self) {
        self.cache.clear();
    }

    async fn resolve(&self, query: &str) -> RecipeResult<QueryResultData> {
        let parsed = RecipeQuery::parse(query);
        validate_recipe_name(&parsed.name)?;

        let path = paths::versions_info(&parsed.recipe_type, &parsed.scope, &parsed.name);
        let info = self
            .versions
            .get(&path)
            .await?
            .ok_or_else(|| RecipeError::RecipeDoesNotExist {
                name: parsed.name.clone(),
            })?;

        let version_number = if parsed.version_query.trim().is_empty() {
            if info.last.is_empty() {
                return Err(RecipeError::RecipeDoesNotExist { name: parsed.name });
            }
            info.last
        } else {
            let range = parse_version_query(&parsed.version_query)?;
            max_satisfying(info.all.values().map(String::as_str), &range)
                .ok_or_else(|| RecipeError::NoVersionMatch {
                    name: parsed.name.clone(),
                    query: parsed.version_query.clone(),
                })?
                .to_string()
        };

        Ok(QueryResultData {
            name: parsed.name,
            scope: parsed.scope,
            recipe_type: parsed.recipe_type,
            version_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::memory::MemoryRegistry;
    use crate::registry::{RegistryStore, escape_key};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn versions_record(all: &[&str], last: &str) -> Value {
        let all: serde_json::Map<String, Value> = all
            .iter()
            .map(|v| (escape_key(v), json!(v)))
            .collect();
        json!({ "last": last, "all": all, "createdAt": 1, "updatedAt": 1 })
    }

    async fn store_with(record: Value) -> (Arc<MemoryRegistry>, RecipeQueryStore) {
        let registry = Arc::new(MemoryRegistry::new());
        registry
            .set("recipes/gulp/public/mylib/versionsInfo", record)
            .await
            .unwrap();
        let store = RecipeQueryStore::new(EntityManager::new(
            registry.clone() as Arc<dyn RegistryStore>,
            "versionsInfo",
        ));
        (registry, store)
    }

    fn mylib() -> Value {
        versions_record(&["1.0.0", "1.1.0", "1.2.0", "2.0.0"], "1.2.0")
    }

    #[tokio::test]
    async fn test_caret_range_resolves_to_highest_match() {
        let (_, store) = store_with(mylib()).await;
        let result = store.query("mylib@^1.0.0").await.unwrap();
        assert_eq!(result.version_number, "1.2.0");
        assert_eq!(result.cache_key(), "gulp-public-mylib-1.2.0");
    }

    #[tokio::test]
    async fn test_bare_name_resolves_to_last() {
        // `last` wins even though 2.0.0 is numerically higher.
        let (_, store) = store_with(mylib()).await;
        assert_eq!(store.query("mylib").await.unwrap().version_number, "1.2.0");
    }

    #[tokio::test]
    async fn test_exact_version_and_other_ranges() {
        let (_, store) = store_with(mylib()).await;
        assert_eq!(store.query("mylib@1.1.0").await.unwrap().version_number, "1.1.0");
        assert_eq!(store.query("mylib@>=1.1.0").await.unwrap().version_number, "2.0.0");
        assert_eq!(store.query("mylib@~1.0").await.unwrap().version_number, "1.0.0");
    }

    #[tokio::test]
    async fn test_unsatisfiable_range_is_no_version_match() {
        let (_, store) = store_with(mylib()).await;
        assert!(matches!(
            store.query("mylib@^3.0.0").await,
            Err(RecipeError::NoVersionMatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_recipe_does_not_exist() {
        let (_, store) = store_with(mylib()).await;
        assert!(matches!(
            store.query("other").await,
            Err(RecipeError::RecipeDoesNotExist { ref name }) if name == "other"
        ));
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected_before_lookup() {
        let (_, store) = store_with(mylib()).await;
        assert!(matches!(
            store.query("My-Lib").await,
            Err(RecipeError::RecipeInvalid { .. })
        ));
    }

    #[tokio::test]
    async fn test_cached_answer_is_stale_until_refreshed() {
        let (registry, store) = store_with(mylib()).await;
        assert_eq!(store.query("mylib").await.unwrap().version_number, "1.2.0");

        registry
            .set(
                "recipes/gulp/public/mylib/versionsInfo",
                versions_record(&["1.0.0", "1.1.0", "1.2.0", "1.3.0", "2.0.0"], "1.3.0"),
            )
            .await
            .unwrap();

        assert_eq!(store.query("mylib").await.unwrap().version_number, "1.2.0");
        assert_eq!(store.query_fresh("mylib").await.unwrap().version_number, "1.3.0");
        assert_eq!(store.query("mylib").await.unwrap().version_number, "1.3.0");
    }
}
