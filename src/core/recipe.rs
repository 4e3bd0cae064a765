// src/core/recipe.rs

//! The runnable unit.
//!
//! A recipe holds its manifest and loads its implementation lazily through a
//! [`RecipeLoader`] on first run. The loaded implementation is kept on the instance
//! and reused by later runs. Errors from the implementation are returned unchanged.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::core::error::{RecipeError, RecipeResult};
use crate::core::recipe_file::RecipeFile;
use crate::system::executor::{self, ProcessSpec};

/// What a loader needs to locate an implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeEntry {
    pub name: String,
    /// `None` for unversioned local tasks.
    pub version: Option<String>,
    /// The package directory.
    pub dir: PathBuf,
    /// The entry point declared by the manifest.
    pub main: String,
}

/// A loaded recipe implementation.
#[async_trait]
pub trait RecipeImpl: Send + Sync + std::fmt::Debug {
    async fn run(&self, args: &[String]) -> RecipeResult<Value>;
}

/// Turns an entry into a runnable implementation.
#[async_trait]
pub trait RecipeLoader: Send + Sync + std::fmt::Debug {
    async fn load(&self, entry: &RecipeEntry) -> RecipeResult<Arc<dyn RecipeImpl>>;
}

/// Load-once holder shared by [`Recipe`] and [`ElfTask`].
#[derive(Debug)]
struct LazyImpl {
    entry: RecipeEntry,
    loader: Arc<dyn RecipeLoader>,
    loaded: OnceCell<Arc<dyn RecipeImpl>>,
}

impl LazyImpl {
    fn new(entry: RecipeEntry, loader: Arc<dyn RecipeLoader>) -> Self {
        Self {
            entry,
            loader,
            loaded: OnceCell::new(),
        }
    }

    async fn run(&self, args: &[String]) -> RecipeResult<Value> {
        let implementation = self
            .loaded
            .get_or_try_init(|| async {
                log::debug!("Loading implementation of '{}'", self.entry.name);
                self.loader.load(&self.entry).await
            })
            .await?;
        implementation.run(args).await
    }
}

/// A published recipe at one version.
#[derive(Debug)]
pub struct Recipe {
    recipe_file: Arc<RecipeFile>,
    implementation: LazyImpl,
}

impl Recipe {
    pub fn new(recipe_file: Arc<RecipeFile>, loader: Arc<dyn RecipeLoader>) -> Self {
        let entry = RecipeEntry {
            name: recipe_file.name().to_string(),
            version: Some(recipe_file.version().to_string()),
            dir: recipe_file.dir().to_path_buf(),
            main: recipe_file.main().to_string(),
        };
        Self {
            recipe_file,
            implementation: LazyImpl::new(entry, loader),
        }
    }

    pub fn name(&self) -> &str {
        self.recipe_file.name()
    }

    pub fn version(&self) -> &str {
        self.recipe_file.version()
    }

    pub fn recipe_file(&self) -> &RecipeFile {
        &self.recipe_file
    }

    pub fn dependencies(&self) -> &BTreeMap<String, String> {
        self.recipe_file.dependencies()
    }

    /// Runs the recipe with `args`, loading its implementation on first use.
    pub async fn run_recipe(&self, args: &[String]) -> RecipeResult<Value> {
        self.implementation.run(args).await
    }
}

/// An unversioned local task. Same behavior as [`Recipe`], found by name on disk
/// instead of through the registry.
#[derive(Debug)]
pub struct ElfTask {
    recipe_file: Arc<RecipeFile>,
    implementation: LazyImpl,
}

impl ElfTask {
    pub fn new(recipe_file: Arc<RecipeFile>, loader: Arc<dyn RecipeLoader>) -> Self {
        let entry = RecipeEntry {
            name: recipe_file.name().to_string(),
            version: None,
            dir: recipe_file.dir().to_path_buf(),
            main: recipe_file.main().to_string(),
        };
        Self {
            recipe_file,
            implementation: LazyImpl::new(entry, loader),
        }
    }

    pub fn name(&self) -> &str {
        self.recipe_file.name()
    }

    pub fn dir(&self) -> &Path {
        self.recipe_file.dir()
    }

    pub fn dependencies(&self) -> &BTreeMap<String, String> {
        self.recipe_file.dependencies()
    }

    pub async fn run(&self, args: &[String]) -> RecipeResult<Value> {
        self.implementation.run(args).await
    }
}

// --- Process loader ---

/// Runs `main` as a command line.
///
/// Tokens of `main` naming a file inside the package directory are made absolute, so
/// `"main": "node build.js"` and `"main": "run.sh"` both work from any working
/// directory. The process runs in `cwd` with `RECIPE_NAME`, `RECIPE_VERSION` and
/// `RECIPE_DIR` set; caller arguments are appended.
#[derive(Debug, Clone)]
pub struct ProcessLoader {
    cwd: PathBuf,
}

impl ProcessLoader {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }
}

#[async_trait]
impl RecipeLoader for ProcessLoader {
    async fn load(&self, entry: &RecipeEntry) -> RecipeResult<Arc<dyn RecipeImpl>> {
        let manifest = entry.dir.join(crate::constants::RECIPE_MANIFEST_FILENAME);
        let mut spec = ProcessSpec::from_command_line(&entry.main).map_err(|e| {
            RecipeError::InvalidRecipeFile {
                path: manifest.clone(),
                reason: format!("'main' is not a valid command line: {}", e),
            }
        })?;

        let mut found_file = false;
        for token in std::iter::once(&mut spec.program).chain(spec.args.iter_mut()) {
            let candidate = entry.dir.join(token.as_str());
            if tokio::fs::metadata(&candidate)
                .await
                .is_ok_and(|m| m.is_file())
            {
                *token = dunce::simplified(&candidate).to_string_lossy().into_owned();
                found_file = true;
            }
        }
        if !found_file && spec.args.is_empty() {
            return Err(RecipeError::InvalidRecipeFile {
                path: manifest,
                reason: format!("entry point '{}' not found in the package", entry.main),
            });
        }

        spec.env.insert("RECIPE_NAME".into(), entry.name.clone());
        spec.env.insert(
            "RECIPE_VERSION".into(),
            entry.version.clone().unwrap_or_default(),
        );
        spec.env.insert(
            "RECIPE_DIR".into(),
            dunce::simplified(&entry.dir).to_string_lossy().into_owned(),
        );

        Ok(Arc::new(ProcessRecipe {
            spec,
            cwd: self.cwd.clone(),
        }))
    }
}

#[derive(Debug)]
struct ProcessRecipe {
    spec: ProcessSpec,
    cwd: PathBuf,
}

#[async_trait]
impl RecipeImpl for ProcessRecipe {
    async fn run(&self, args: &[String]) -> RecipeResult<Value> {
        let mut spec = self.spec.clone();
        spec.args.extend(args.iter().cloned());
        executor::execute(&spec, &self.cwd).await?;
        Ok(Value::Null)
    }
}
