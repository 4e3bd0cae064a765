// src/core/recipe_store.rs

//! Cached loading of manifests, installed recipes and local tasks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants::RECIPE_MANIFEST_FILENAME;
use crate::core::cache::{
    ElfCache, RecipeCache, RecipeFileCache, recipe_cache_key, recipe_file_cache_key,
};
use crate::core::error::{RecipeError, RecipeResult};
use crate::core::recipe::{ElfTask, Recipe, RecipeLoader};
use crate::core::recipe_file::RecipeFile;

/// Where a recipe version is installed: `<recipes>/<type>/<scope>/<name>/<version>`.
pub fn recipe_dir(
    recipes_dir: &Path,
    recipe_type: &str,
    scope: &str,
    name: &str,
    version: &str,
) -> PathBuf {
    recipes_dir
        .join(recipe_type)
        .join(scope)
        .join(name)
        .join(version)
}

/// Loads manifests, cached by normalized path.
#[derive(Debug)]
pub struct RecipeFileStore {
    cache: RecipeFileCache,
}

impl Default for RecipeFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeFileStore {
    pub fn new() -> Self {
        Self {
            cache: RecipeFileCache::new("recipeFiles"),
        }
    }

    /// Returns the manifest at `path`, or `None` if there is no file there.
    pub async fn load_recipe_file(&self, path: &Path) -> RecipeResult<Option<Arc<RecipeFile>>> {
        let key = recipe_file_cache_key(path);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Some(hit));
        }
        match RecipeFile::load_from_file(path).await {
            Ok(file) => {
                let file = Arc::new(file);
                self.cache.set(key, file.clone());
                Ok(Some(file))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Forgets the manifest at `path`.
    pub fn invalidate(&self, path: &Path) {
        self.cache.remove(&recipe_file_cache_key(path));
    }
}

/// Loads installed recipes, cached by `(type, scope, name, version)`.
#[derive(Debug)]
pub struct RecipeStore {
    recipes_dir: PathBuf,
    files: Arc<RecipeFileStore>,
    loader: Arc<dyn RecipeLoader>,
    cache: RecipeCache,
}

impl RecipeStore {
    pub fn new(
        recipes_dir: impl Into<PathBuf>,
        files: Arc<RecipeFileStore>,
        loader: Arc<dyn RecipeLoader>,
    ) -> Self {
        Self {
            recipes_dir: recipes_dir.into(),
            files,
            loader,
            cache: RecipeCache::new("recipes"),
        }
    }

    /// The manifest path of an installed version.
    pub fn manifest_path(&self, recipe_type: &str, scope: &str, name: &str, version: &str) -> PathBuf {
        recipe_dir(&self.recipes_dir, recipe_type, scope, name, version)
            .join(RECIPE_MANIFEST_FILENAME)
    }

    pub async fn load_recipe(
        &self,
        recipe_type: &str,
        scope: &str,
        name: &str,
        version: &str,
    ) -> RecipeResult<Arc<Recipe>> {
        let key = recipe_cache_key(recipe_type, scope, name, version);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let path = self.manifest_path(recipe_type, scope, name, version);
        let file = self
            .files
            .load_recipe_file(&path)
            .await?
            .ok_or_else(|| RecipeError::RecipeDoesNotExist {
                name: name.to_string(),
            })?;

        let recipe = Arc::new(Recipe::new(file, self.loader.clone()));
        self.cache.set(key, recipe.clone());
        Ok(recipe)
    }
}

/// Finds local tasks by name in an ordered list of directories.
///
/// A task called `lint` is the manifest `<dir>/lint/recipe.json` in the first
/// directory that has one.
#[derive(Debug)]
pub struct ElfStore {
    dirs: Vec<PathBuf>,
    files: Arc<RecipeFileStore>,
    loader: Arc<dyn RecipeLoader>,
    cache: ElfCache,
}

impl ElfStore {
    pub fn new(dirs: Vec<PathBuf>, files: Arc<RecipeFileStore>, loader: Arc<dyn RecipeLoader>) -> Self {
        Self {
            dirs,
            files,
            loader,
            cache: ElfCache::new("elves"),
        }
    }

    /// Returns the task called `name`, or `None` if no directory has it.
    pub async fn find(&self, name: &str) -> RecipeResult<Option<Arc<ElfTask>>> {
        if let Some(hit) = self.cache.get(name) {
            return Ok(Some(hit));
        }
        for dir in &self.dirs {
            let path = dir.join(name).join(RECIPE_MANIFEST_FILENAME);
            if let Some(file) = self.files.load_recipe_file(&path).await? {
                log::debug!("Found local task '{}' at '{}'", name, path.display());
                let task = Arc::new(ElfTask::new(file, self.loader.clone()));
                self.cache.set(name, task.clone());
                return Ok(Some(task));
            }
        }
        Ok(None)
    }

    pub async fn get(&self, name: &str) -> RecipeResult<Arc<ElfTask>> {
        self.find(name)
            .await?
            .ok_or_else(|| RecipeError::RecipeDoesNotExist {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::recipe::ProcessLoader;
    use std::fs;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, name: &str, version: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(RECIPE_MANIFEST_FILENAME),
            format!(r#"{{"name":"{}","version":"{}"}}"#, name, version),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_file_store_missing_is_none_and_hits_are_cached() {
        let dir = TempDir::new().unwrap();
        let store = RecipeFileStore::new();
        let path = dir.path().join(RECIPE_MANIFEST_FILENAME);
        assert!(store.load_recipe_file(&path).await.unwrap().is_none());

        write_manifest(dir.path(), "a", "1.0.0");
        let first = store.load_recipe_file(&path).await.unwrap().unwrap();

        // Changes on disk are not seen until invalidation.
        write_manifest(dir.path(), "a", "2.0.0");
        let second = store.load_recipe_file(&path).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        store.invalidate(&path);
        let third = store.load_recipe_file(&path).await.unwrap().unwrap();
        assert_eq!(third.version(), "2.0.0");
    }

    #[tokio::test]
    async fn test_file_store_propagates_invalid_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(RECIPE_MANIFEST_FILENAME);
        fs::write(&path, r#"{"name":"a"}"#).unwrap();
        assert!(matches!(
            RecipeFileStore::new().load_recipe_file(&path).await,
            Err(RecipeError::InvalidRecipeFile { .. })
        ));
    }

    #[tokio::test]
    async fn test_recipe_store_loads_installed_version() {
        let dir = TempDir::new().unwrap();
        let store = RecipeStore::new(
            dir.path(),
            Arc::new(RecipeFileStore::new()),
            Arc::new(ProcessLoader::new(dir.path())),
        );

        assert!(matches!(
            store.load_recipe("gulp", "public", "mylib", "1.0.0").await,
            Err(RecipeError::RecipeDoesNotExist { .. })
        ));

        write_manifest(
            &recipe_dir(dir.path(), "gulp", "public", "mylib", "1.0.0"),
            "mylib",
            "1.0.0",
        );
        let recipe = store.load_recipe("gulp", "public", "mylib", "1.0.0").await.unwrap();
        assert_eq!(recipe.version(), "1.0.0");
        let again = store.load_recipe("gulp", "public", "mylib", "1.0.0").await.unwrap();
        assert!(Arc::ptr_eq(&recipe, &again));
    }

    #[tokio::test]
    async fn test_elf_store_searches_dirs_in_order() {
        let project = TempDir::new().unwrap();
        let bundled = TempDir::new().unwrap();
        write_manifest(&bundled.path().join("lint"), "lint", "0.1.0");
        write_manifest(&bundled.path().join("fmt"), "fmt", "0.1.0");
        write_manifest(&project.path().join("lint"), "lint", "0.2.0");

        let store = ElfStore::new(
            vec![project.path().to_path_buf(), bundled.path().to_path_buf()],
            Arc::new(RecipeFileStore::new()),
            Arc::new(ProcessLoader::new(project.path())),
        );

        let lint = store.get("lint").await.unwrap();
        assert_eq!(lint.dir(), project.path().join("lint"));
        assert!(store.find("fmt").await.unwrap().is_some());
        assert!(matches!(
            store.get("missing").await,
            Err(RecipeError::RecipeDoesNotExist { .. })
        ));
    }
}
