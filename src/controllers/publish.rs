// src/controllers/publish.rs

//! The publish pipeline.
//!
//! Steps run strictly in order and the first failure stops the chain. Nothing is
//! rolled back: an interrupted run leaves an unpublished version record that the
//! next run picks up again.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::auth::{AuthController, AuthError};
use super::recipe_controller::RecipeController;
use crate::constants::RECIPE_MANIFEST_FILENAME;
use crate::core::error::{PublishError, PublishResult, RecipeError};
use crate::core::package::RecipePackage;
use crate::core::recipe_file::RecipeFile;
use crate::system::transport::Uploader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    Authenticate,
    LoadManifest,
    Validate,
    Package,
    EnsureEntry,
    VerifyCollaborator,
    EnsureVersion,
    CreateKey,
    Upload,
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authenticate => "authenticate",
            Self::LoadManifest => "load manifest",
            Self::Validate => "validate name and version",
            Self::Package => "package contents",
            Self::EnsureEntry => "ensure registry entry",
            Self::VerifyCollaborator => "verify collaborator access",
            Self::EnsureVersion => "ensure version record",
            Self::CreateKey => "create publish key",
            Self::Upload => "upload package",
        })
    }
}

/// What a successful publish produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub name: String,
    pub version: String,
    pub hash: String,
}

#[derive(Debug)]
pub struct PublishController {
    auth: Arc<AuthController>,
    recipes: RecipeController,
    uploader: Arc<dyn Uploader>,
}

/// Accepts either a recipe directory or the path of its `recipe.json`.
fn manifest_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(RECIPE_MANIFEST_FILENAME)
    } else {
        path.to_path_buf()
    }
}

impl PublishController {
    pub fn new(
        auth: Arc<AuthController>,
        recipes: RecipeController,
        uploader: Arc<dyn Uploader>,
    ) -> Self {
        Self {
            auth,
            recipes,
            uploader,
        }
    }

    /// Publishes the recipe at `path` as the logged-in user.
    pub async fn publish(&self, path: &Path) -> PublishResult<PublishReceipt> {
        log::debug!("publish: {}", PublishStep::Authenticate);
        let user = self.auth.require_user().await.map_err(|e| match e {
            AuthError::NotLoggedIn => PublishError::NotLoggedIn,
            other => other.into(),
        })?;

        log::debug!("publish: {}", PublishStep::LoadManifest);
        let manifest_path = manifest_path(path);
        let recipe_file = RecipeFile::load_from_file(&manifest_path)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    RecipeError::InvalidRecipeFile {
                        path: manifest_path.clone(),
                        reason: "no recipe.json found".to_string(),
                    }
                } else {
                    e
                }
            })?;

        log::debug!("publish: {}", PublishStep::Validate);
        let version = recipe_file.validate()?;
        let name = recipe_file.name().to_string();
        let version = version.raw;

        log::debug!("publish: {}", PublishStep::Package);
        let dir = recipe_file.dir().to_path_buf();
        let package = tokio::task::spawn_blocking(move || RecipePackage::from_dir(&dir))
            .await
            .map_err(|e| RecipeError::InvalidPackage {
                reason: format!("packaging task failed: {}", e),
            })??;
        let hash = package.content_hash().to_string();
        log::debug!("Packed '{}@{}' ({})", name, version, hash);

        log::debug!("publish: {}", PublishStep::EnsureEntry);
        self.recipes.ensure_recipe(&name, &user).await?;

        log::debug!("publish: {}", PublishStep::VerifyCollaborator);
        self.recipes.verify_collaborator(&name, &user).await?;

        log::debug!("publish: {}", PublishStep::EnsureVersion);
        self.recipes.ensure_version(&name, &version, &hash).await?;

        log::debug!("publish: {}", PublishStep::CreateKey);
        let key = self.recipes.create_publish_key(&name, &version, &hash).await?;

        log::debug!("publish: {}", PublishStep::Upload);
        self.uploader.upload(&key.key, package.into_bytes()).await?;
        self.recipes.invalidate_version(&name, &version);

        log::info!("Published '{}@{}'", name, version);
        Ok(PublishReceipt {
            name,
            version,
            hash,
        })
    }
}
