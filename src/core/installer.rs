// src/core/installer.rs

//! Makes sure a resolved recipe version is unpacked under the recipes directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants::RECIPE_MANIFEST_FILENAME;
use crate::core::download_store::RecipeDownloadStore;
use crate::core::error::{RecipeError, RecipeResult};
use crate::core::package::RecipePackage;
use crate::core::query_store::QueryResultData;
use crate::core::recipe_store::recipe_dir;
use crate::models::RecipeVersionData;
use crate::registry::entity::EntityManager;
use crate::registry::paths;
use crate::system::transport::package_url;

/// Unpacks resolved versions under `<recipes_dir>/<type>/<scope>/<name>/<version>`.
#[derive(Debug)]
pub struct RecipeInstaller {
    recipes_dir: PathBuf,
    server_url: String,
    versions: EntityManager<RecipeVersionData>,
    downloads: Arc<RecipeDownloadStore>,
}

impl RecipeInstaller {
    /// Reads version records through `versions` and packages from `server_url`.
    pub fn new(
        recipes_dir: impl Into<PathBuf>,
        server_url: impl Into<String>,
        versions: EntityManager<RecipeVersionData>,
        downloads: Arc<RecipeDownloadStore>,
    ) -> Self {
        Self {
            recipes_dir: recipes_dir.into(),
            server_url: server_url.into(),
            versions,
            downloads,
        }
    }

    /// Installs `result` unless its manifest is already on disk.
    ///
    /// The version record must exist and be published. The downloaded tarball must
    /// hash to the value recorded when the version was created.
    pub async fn ensure_installed(&self, result: &QueryResultData) -> RecipeResult<PathBuf> {
        let dir = recipe_dir(
            &self.recipes_dir,
            &result.recipe_type,
            &result.scope,
            &result.name,
            &result.version_number,
        );
        let manifest = dir.join(RECIPE_MANIFEST_FILENAME);
        if tokio::fs::try_exists(&manifest).await? {
            log::trace!("'{}@{}' is already installed", result.name, result.version_number);
            return Ok(dir);
        }

        let record_path = paths::recipe_version(
            &result.recipe_type,
            &result.scope,
            &result.name,
            &result.version_number,
        );
        let record = self
            .versions
            .get(&record_path)
            .await?
            .filter(|r| r.published)
            .ok_or_else(|| RecipeError::RecipeVersionDoesNotExist {
                name: result.name.clone(),
                version: result.version_number.clone(),
            })?;

        let url = package_url(
            &self.server_url,
            &result.recipe_type,
            &result.scope,
            &result.name,
            &result.version_number,
        );
        let download = self.downloads.download(&url).await?;
        let actual = download.package.content_hash();
        if actual != record.hash {
            return Err(RecipeError::PackageIntegrity {
                name: result.name.clone(),
                version: result.version_number.clone(),
                expected: record.hash,
                actual: actual.to_string(),
            });
        }

        log::info!("Installing '{}@{}'", result.name, result.version_number);
        let target = dir.clone();
        tokio::task::spawn_blocking(move || install_staged(&download.package, &target))
            .await
            .map_err(|e| RecipeError::InvalidPackage {
                reason: format!("extraction task failed: {}", e),
            })??;
        Ok(dir)
    }
}

/// Extracts `package` next to `dir` and renames it into place, so `dir` only ever
/// appears fully unpacked.
fn install_staged(package: &RecipePackage, dir: &Path) -> RecipeResult<()> {
    let parent = dir.parent().ok_or_else(|| RecipeError::InvalidPackage {
        reason: format!("install directory '{}' has no parent", dir.display()),
    })?;
    std::fs::create_dir_all(parent)?;
    let staging = tempfile::Builder::new()
        .prefix(".installing-")
        .tempdir_in(parent)?;
    package.extract_to(staging.path())?;

    match std::fs::rename(staging.path(), dir) {
        Ok(()) => {}
        Err(_) if dir.join(RECIPE_MANIFEST_FILENAME).is_file() => {
            log::debug!("'{}' was installed concurrently", dir.display());
            return Ok(());
        }
        Err(e) if dir.exists() => {
            log::warn!(
                "Replacing incomplete install at '{}' ({})",
                dir.display(),
                e
            );
            std::fs::remove_dir_all(dir)?;
            std::fs::rename(staging.path(), dir)?;
        }
        Err(e) => return Err(e.into()),
    }
    let _ = staging.keep();
    Ok(())
}
