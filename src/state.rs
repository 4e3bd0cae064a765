// src/state.rs

//! The composition root.
//!
//! Every process-wide service is built exactly once here and shared by `Arc`.
//! Nothing is global: commands receive the [`AppServices`] they need.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::constants::{DOWNLOADS_DIR, ELVES_DIR, PROJECT_DIR};
use crate::controllers::auth::{AuthController, RegistryAuthBackend};
use crate::controllers::publish::PublishController;
use crate::controllers::recipe_controller::RecipeController;
use crate::controllers::user::UserController;
use crate::core::config::{ConfigController, RecipeContext};
use crate::core::dependency_gate::DependencyGate;
use crate::core::download_store::RecipeDownloadStore;
use crate::core::installer::RecipeInstaller;
use crate::core::query_store::RecipeQueryStore;
use crate::core::recipe::ProcessLoader;
use crate::core::recipe_store::{ElfStore, RecipeFileStore, RecipeStore};
use crate::core::runner::{ElfRunner, RecipeRunner};
use crate::registry::RegistryStore;
use crate::registry::entity::EntityManager;
use crate::registry::file::FileRegistry;
use crate::registry::http::HttpRegistry;
use crate::registry::publication::LocalUploader;
use crate::system::package_manager::{CommandPackageManager, PackageManager};
use crate::system::transport::{HttpTransport, HttpUploader, Uploader, file_url_to_path};

#[derive(Debug, Clone)]
pub struct AppServices {
    pub config: Arc<ConfigController>,
    pub registry: Arc<dyn RegistryStore>,
    pub downloads: Arc<RecipeDownloadStore>,
    pub runner: Arc<RecipeRunner>,
    pub elves: Arc<ElfRunner>,
    pub auth: Arc<AuthController>,
    pub users: Arc<UserController>,
    pub publisher: Arc<PublishController>,
}

fn required_path(config: &ConfigController, key: &str) -> Result<PathBuf> {
    config
        .get_path(key)?
        .with_context(|| format!("Config key '{}' is not set.", key))
}

fn required_string(config: &ConfigController, key: &str) -> Result<String> {
    config
        .get_string(key)?
        .with_context(|| format!("Config key '{}' is not set.", key))
}

fn open_registry(config: &ConfigController) -> Result<Arc<dyn RegistryStore>> {
    let url = required_string(config, "registry.url")?;
    if let Some(dir) = file_url_to_path(&url) {
        log::debug!("Using file registry at '{}'", dir.display());
        let registry = FileRegistry::open(&dir)
            .with_context(|| format!("Could not open registry at '{}'", dir.display()))?;
        return Ok(Arc::new(registry));
    }
    log::debug!("Using HTTP registry at '{}'", url);
    let token = config.get_string("registry.auth")?;
    Ok(Arc::new(HttpRegistry::new(&url, token)))
}

fn command_package_manager(
    config: &ConfigController,
    recipes_dir: &std::path::Path,
) -> Result<CommandPackageManager> {
    let program = required_string(config, "package_manager.program")?;
    let install_args = config
        .get("package_manager.install_args")?
        .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
        .unwrap_or_default();
    let modules_dir = match config.get_path("package_manager.modules_dir")? {
        Some(dir) => dir,
        None => recipes_dir.join("node_modules"),
    };
    Ok(CommandPackageManager::new(
        program,
        install_args,
        recipes_dir,
        &modules_dir,
    ))
}

impl AppServices {
    /// Builds the services for `context` with the configured package manager.
    pub fn build(context: RecipeContext) -> Result<Self> {
        let config = Arc::new(ConfigController::new(context));
        let recipes_dir = required_path(&config, "recipes.dir")?;
        let manager = command_package_manager(&config, &recipes_dir)?;
        Self::with_package_manager(config, Arc::new(manager))
    }

    pub fn with_package_manager(
        config: Arc<ConfigController>,
        package_manager: Arc<dyn PackageManager>,
    ) -> Result<Self> {
        let context = config.context().clone();
        let registry = open_registry(&config)?;
        let server_url = required_string(&config, "server.url")?;
        let recipes_dir = required_path(&config, "recipes.dir")?;
        let cache_dir = required_path(&config, "cache.dir")?;

        let downloads = Arc::new(RecipeDownloadStore::new(
            cache_dir.join(DOWNLOADS_DIR),
            Arc::new(HttpTransport::new()),
        ));
        let queries = Arc::new(RecipeQueryStore::new(EntityManager::new(
            registry.clone(),
            "versionsInfo",
        )));
        let installer = Arc::new(RecipeInstaller::new(
            &recipes_dir,
            server_url.clone(),
            EntityManager::new(registry.clone(), "versions"),
            downloads.clone(),
        ));

        let loader = Arc::new(ProcessLoader::new(context.exec_path.clone()));
        let files = Arc::new(RecipeFileStore::new());
        let recipes = Arc::new(RecipeStore::new(&recipes_dir, files.clone(), loader.clone()));
        let elf_dirs = vec![
            context.exec_path.join(PROJECT_DIR).join(ELVES_DIR),
            context.user_path.join(ELVES_DIR),
            context.module_path.join(ELVES_DIR),
        ];
        let elf_store = Arc::new(ElfStore::new(elf_dirs, files, loader));

        let gate = Arc::new(DependencyGate::new(package_manager));
        let runner = Arc::new(RecipeRunner::new(queries, installer, recipes, gate.clone()));
        let elves = Arc::new(ElfRunner::new(elf_store, gate));

        let auth = Arc::new(AuthController::new(
            config.clone(),
            Arc::new(RegistryAuthBackend::new(registry.clone())),
        ));
        let users = Arc::new(UserController::new(auth.clone()));
        let uploader: Arc<dyn Uploader> = if server_url.starts_with("file://") {
            Arc::new(LocalUploader::new(registry.clone(), server_url.clone()))
        } else {
            Arc::new(HttpUploader::new(&server_url))
        };
        let publisher = Arc::new(PublishController::new(
            auth.clone(),
            RecipeController::new(registry.clone()),
            uploader,
        ));

        Ok(Self {
            config,
            registry,
            downloads,
            runner,
            elves,
            auth,
            users,
            publisher,
        })
    }
}
