// src/core/runner.rs

//! The top-level entry points for running recipes and local tasks.
//!
//! `get` binds an identifier and any extra arguments once and returns a handle; each
//! `invoke` then runs the whole chain in order:
//!
//! 1. resolve the concrete version,
//! 2. make sure that version is installed and load it,
//! 3. load the package manager (once per process),
//! 4. probe the recipe's dependencies, skipping those already verified,
//! 5. install the unresolved ones in one batch,
//! 6. run the recipe with the caller's arguments followed by the bound ones.
//!
//! Any failure stops the chain and is returned as is. Nothing is retried.

use serde_json::Value;
use std::sync::Arc;

use crate::core::dependency_gate::DependencyGate;
use crate::core::error::RecipeResult;
use crate::core::identifier::RecipeIdentifier;
use crate::core::installer::RecipeInstaller;
use crate::core::query_store::{QueryResultData, RecipeQueryStore};
use crate::core::recipe::Recipe;
use crate::core::recipe_store::{ElfStore, RecipeStore};

/// Resolves, installs and runs registry recipes.
#[derive(Debug)]
pub struct RecipeRunner {
    queries: Arc<RecipeQueryStore>,
    installer: Arc<RecipeInstaller>,
    recipes: Arc<RecipeStore>,
    gate: Arc<DependencyGate>,
}

impl RecipeRunner {
    /// Wires the runner over its stores and the shared dependency gate.
    pub fn new(
        queries: Arc<RecipeQueryStore>,
        installer: Arc<RecipeInstaller>,
        recipes: Arc<RecipeStore>,
        gate: Arc<DependencyGate>,
    ) -> Self {
        Self {
            queries,
            installer,
            recipes,
            gate,
        }
    }

    /// Binds `identifier` (`name` or `name@range`) and `extra_args`.
    pub fn get(self: &Arc<Self>, identifier: &str, extra_args: Vec<String>) -> BoundRecipe {
        BoundRecipe {
            runner: Arc::clone(self),
            identifier: RecipeIdentifier::parse(identifier),
            extra_args,
        }
    }

    /// Steps 1 and 2: resolves, installs and loads a recipe without running it.
    pub async fn install(&self, identifier: &RecipeIdentifier) -> RecipeResult<(QueryResultData, Arc<Recipe>)> {
        let resolved = self.queries.query(&identifier.to_string()).await?;
        self.installer.ensure_installed(&resolved).await?;
        let recipe = self
            .recipes
            .load_recipe(
                &resolved.recipe_type,
                &resolved.scope,
                &resolved.name,
                &resolved.version_number,
            )
            .await?;
        Ok((resolved, recipe))
    }

    /// The query store, for explicit cache refreshes.
    pub fn queries(&self) -> &RecipeQueryStore {
        &self.queries
    }
}

/// A recipe bound by [`RecipeRunner::get`], ready to be invoked any number of times.
#[derive(Debug, Clone)]
pub struct BoundRecipe {
    runner: Arc<RecipeRunner>,
    identifier: RecipeIdentifier,
    extra_args: Vec<String>,
}

impl BoundRecipe {
    /// The identifier this handle was bound to.
    pub fn identifier(&self) -> &RecipeIdentifier {
        &self.identifier
    }

    /// Runs the whole chain and returns what the recipe produced.
    pub async fn invoke(&self, caller_args: Vec<String>) -> RecipeResult<Value> {
        let (resolved, recipe) = self.runner.install(&self.identifier).await?;
        self.runner
            .gate
            .ensure_dependencies(recipe.dependencies())
            .await?;

        log::info!("Running '{}@{}'", resolved.name, resolved.version_number);
        let args = join_args(caller_args, &self.extra_args);
        recipe.run_recipe(&args).await
    }
}

/// Runs unversioned local tasks. Same chain as [`RecipeRunner`] without steps 1
/// and 2.
#[derive(Debug)]
pub struct ElfRunner {
    elves: Arc<ElfStore>,
    gate: Arc<DependencyGate>,
}

impl ElfRunner {
    /// Shares `gate` with the recipe runner so both load the package manager once.
    pub fn new(elves: Arc<ElfStore>, gate: Arc<DependencyGate>) -> Self {
        Self { elves, gate }
    }

    /// Binds the local task `name` and `extra_args`.
    pub fn get(self: &Arc<Self>, name: &str, extra_args: Vec<String>) -> BoundElf {
        BoundElf {
            runner: Arc::clone(self),
            name: name.to_string(),
            extra_args,
        }
    }

    /// `true` if a local task called `name` exists.
    pub async fn has(&self, name: &str) -> RecipeResult<bool> {
        Ok(self.elves.find(name).await?.is_some())
    }
}

/// A local task bound by [`ElfRunner::get`].
#[derive(Debug, Clone)]
pub struct BoundElf {
    runner: Arc<ElfRunner>,
    name: String,
    extra_args: Vec<String>,
}

impl BoundElf {
    /// Loads the task, ensures its dependencies and runs it.
    pub async fn invoke(&self, caller_args: Vec<String>) -> RecipeResult<Value> {
        let task = self.runner.elves.get(&self.name).await?;
        self.runner
            .gate
            .ensure_dependencies(task.dependencies())
            .await?;

        log::info!("Running local task '{}'", task.name());
        let args = join_args(caller_args, &self.extra_args);
        task.run(&args).await
    }
}

fn join_args(mut caller_args: Vec<String>, extra_args: &[String]) -> Vec<String> {
    caller_args.extend(extra_args.iter().cloned());
    caller_args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::download_store::RecipeDownloadStore;
    use crate::core::error::RecipeError;
    use crate::core::package::RecipePackage;
    use crate::core::recipe::{RecipeEntry, RecipeImpl, RecipeLoader};
    use crate::core::recipe_store::RecipeFileStore;
    use crate::models::{RecipeVersionData, now_millis};
    use crate::registry::entity::EntityManager;
    use crate::registry::memory::MemoryRegistry;
    use crate::registry::{RegistryStore, paths};
    use crate::system::package_manager::{PackageManager, PackageManagerError};
    use crate::system::transport::{HttpTransport, file_url_to_path, package_url};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Debug, Default)]
    struct RecordingLoader {
        runs: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    }

    #[derive(Debug)]
    struct Recorder {
        name: String,
        runs: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    }

    #[async_trait]
    impl RecipeImpl for Recorder {
        async fn run(&self, args: &[String]) -> RecipeResult<Value> {
            self.runs
                .lock()
                .unwrap()
                .push((self.name.clone(), args.to_vec()));
            Ok(json!("done"))
        }
    }

    #[async_trait]
    impl RecipeLoader for RecordingLoader {
        async fn load(&self, entry: &RecipeEntry) -> RecipeResult<Arc<dyn RecipeImpl>> {
            Ok(Arc::new(Recorder {
                name: format!("{}@{}", entry.name, entry.version.clone().unwrap_or_default()),
                runs: self.runs.clone(),
            }))
        }
    }

    #[derive(Debug, Default)]
    struct CountingManager {
        installs: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl PackageManager for CountingManager {
        async fn load(&self) -> Result<(), PackageManagerError> {
            Ok(())
        }
        async fn is_resolvable(&self, _name: &str) -> bool {
            false
        }
        async fn install(&self, specs: &[String]) -> Result<(), PackageManagerError> {
            self.installs.lock().unwrap().push(specs.to_vec());
            Ok(())
        }
    }

    async fn publish_fixture(
        registry: &MemoryRegistry,
        server_url: &str,
        root: &Path,
        version: &str,
        deps: &str,
    ) {
        let src = root.join(format!("src-{}", version));
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(
            src.join("recipe.json"),
            format!(
                r#"{{"name":"mylib","version":"{}","dependencies":{}}}"#,
                version, deps
            ),
        )
        .unwrap();
        let package = RecipePackage::from_dir(&src).unwrap();
        let url = package_url(server_url, "gulp", "public", "mylib", version);
        package.save_to(&file_url_to_path(&url).unwrap()).unwrap();

        let now = now_millis();
        let record = RecipeVersionData {
            version: version.into(),
            hash: package.content_hash().into(),
            published: true,
            created_at: now,
            updated_at: now,
            published_at: Some(now),
        };
        registry
            .set(
                &paths::recipe_version("gulp", "public", "mylib", version),
                serde_json::to_value(record).unwrap(),
            )
            .await
            .unwrap();
    }

    struct Fixture {
        _dir: TempDir,
        runner: Arc<RecipeRunner>,
        loader_runs: Arc<Mutex<Vec<(String, Vec<String>)>>>,
        manager: Arc<CountingManager>,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let server_url = format!(
            "file://{}",
            dir.path().join("server").to_string_lossy().replace('\\', "/")
        );
        let registry = Arc::new(MemoryRegistry::new());
        publish_fixture(&registry, &server_url, dir.path(), "1.0.0", "{}").await;
        publish_fixture(&registry, &server_url, dir.path(), "1.2.0", r#"{"left-pad":"^1.3.0"}"#).await;
        registry
            .set(
                &paths::versions_info("gulp", "public", "mylib"),
                json!({
                    "last": "1.2.0",
                    "all": {
                        "1%2E0%2E0": "1.0.0",
                        "1%2E2%2E0": "1.2.0",
                    },
                }),
            )
            .await
            .unwrap();

        let store: Arc<dyn RegistryStore> = registry;
        let loader = Arc::new(RecordingLoader::default());
        let loader_runs = loader.runs.clone();
        let manager = Arc::new(CountingManager::default());
        let recipes_dir = dir.path().join("recipes");

        let runner = Arc::new(RecipeRunner::new(
            Arc::new(RecipeQueryStore::new(EntityManager::new(store.clone(), "versionsInfo"))),
            Arc::new(RecipeInstaller::new(
                &recipes_dir,
                server_url,
                EntityManager::new(store, "versions"),
                Arc::new(RecipeDownloadStore::new(
                    dir.path().join("downloads"),
                    Arc::new(HttpTransport::new()),
                )),
            )),
            Arc::new(RecipeStore::new(
                &recipes_dir,
                Arc::new(RecipeFileStore::new()),
                loader,
            )),
            Arc::new(DependencyGate::new(manager.clone())),
        ));
        Fixture {
            _dir: dir,
            runner,
            loader_runs,
            manager,
        }
    }

    #[tokio::test]
    async fn test_bound_recipe_runs_full_chain() {
        let fx = fixture().await;
        let bound = fx.runner.get("mylib@^1.0.0", vec!["--bound".into()]);

        let out = bound.invoke(vec!["caller".into()]).await.unwrap();
        assert_eq!(out, json!("done"));
        assert_eq!(
            *fx.loader_runs.lock().unwrap(),
            vec![(
                "mylib@1.2.0".to_string(),
                vec!["caller".to_string(), "--bound".to_string()]
            )]
        );
        assert_eq!(
            *fx.manager.installs.lock().unwrap(),
            vec![vec!["left-pad@^1.3.0".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_exact_version_without_dependencies_installs_nothing() {
        let fx = fixture().await;
        fx.runner.get("mylib@1.0.0", vec![]).invoke(vec![]).await.unwrap();
        assert!(fx.manager.installs.lock().unwrap().is_empty());
        assert_eq!(fx.loader_runs.lock().unwrap()[0].0, "mylib@1.0.0");
    }

    #[tokio::test]
    async fn test_unknown_recipe_aborts_chain() {
        let fx = fixture().await;
        let err = fx.runner.get("nope", vec![]).invoke(vec![]).await.unwrap_err();
        assert!(matches!(err, RecipeError::RecipeDoesNotExist { .. }));
        assert!(fx.loader_runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_elf_runner_skips_resolution() {
        let dir = TempDir::new().unwrap();
        let elf_dir = dir.path().join("lint");
        std::fs::create_dir_all(&elf_dir).unwrap();
        std::fs::write(
            elf_dir.join("recipe.json"),
            r#"{"name":"lint","version":"0.0.0"}"#,
        )
        .unwrap();

        let loader = Arc::new(RecordingLoader::default());
        let runs = loader.runs.clone();
        let runner = Arc::new(ElfRunner::new(
            Arc::new(ElfStore::new(
                vec![dir.path().to_path_buf()],
                Arc::new(RecipeFileStore::new()),
                loader,
            )),
            Arc::new(DependencyGate::new(Arc::new(CountingManager::default()))),
        ));

        assert!(runner.has("lint").await.unwrap());
        runner.get("lint", vec!["x".into()]).invoke(vec![]).await.unwrap();
        assert_eq!(runs.lock().unwrap()[0], ("lint@".to_string(), vec!["x".to_string()]));
    }
}
