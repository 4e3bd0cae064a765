// src/registry/publication.rs

//! Registry-side acceptance of an uploaded package.
//!
//! An upload is accepted only against an unused publish key whose name, version
//! and hash match the uploaded bytes. Acceptance stores the tarball where
//! downloads will look for it, then marks the version published in a single
//! multi-path update so readers never see a half-published version.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{RegistryStore, escape_key, paths};
use crate::constants::{RECIPE_SCOPE, RECIPE_TYPE};
use crate::core::error::{PublishError, PublishResult, RecipeError};
use crate::core::package::RecipePackage;
use crate::models::{PublishKeyData, RecipeVersionData, RecipeVersionsInfo, now_millis};
use crate::system::transport::{TransportError, Uploader, file_url_to_path, package_url};

fn mismatch(reason: String) -> PublishError {
    PublishError::PublishKeyMismatch { reason }
}

/// Accepts `bytes` as the package bound to `key` and publishes its version.
///
/// `server_url` must be a `file://` URL: the tarball is written to the location
/// [`package_url`] maps it to.
pub async fn accept_upload(
    store: &dyn RegistryStore,
    server_url: &str,
    key: &str,
    bytes: Vec<u8>,
) -> PublishResult<RecipeVersionData> {
    let key_path = paths::publish_key(key);
    let key_data: PublishKeyData = store
        .get(&key_path)
        .await?
        .decode()?
        .ok_or(PublishError::InvalidPublishKey)?;
    if key_data.used_at.is_some() {
        return Err(PublishError::PublishKeyUsed);
    }

    let package = RecipePackage::from_tarball(bytes)?;
    if package.content_hash() != key_data.recipe_hash {
        return Err(mismatch(format!(
            "hash {} differs from {}",
            package.content_hash(),
            key_data.recipe_hash
        )));
    }
    let manifest = package.manifest();
    if manifest.name() != key_data.recipe_name || manifest.version() != key_data.recipe_version_number {
        return Err(mismatch(format!(
            "package is '{}@{}', key was issued for '{}@{}'",
            manifest.name(),
            manifest.version(),
            key_data.recipe_name,
            key_data.recipe_version_number
        )));
    }

    let name = key_data.recipe_name.as_str();
    let version = key_data.recipe_version_number.as_str();
    let version_path = paths::recipe_version(RECIPE_TYPE, RECIPE_SCOPE, name, version);
    let record: RecipeVersionData = store
        .get(&version_path)
        .await?
        .decode()?
        .ok_or_else(|| RecipeError::RecipeVersionDoesNotExist {
            name: name.to_string(),
            version: version.to_string(),
        })?;
    if record.published {
        return Err(PublishError::RecipeVersionExists {
            name: name.to_string(),
            version: version.to_string(),
        });
    }
    if record.hash != key_data.recipe_hash {
        return Err(mismatch(format!(
            "version record hash {} differs from key hash {}",
            record.hash, key_data.recipe_hash
        )));
    }

    let url = package_url(server_url, RECIPE_TYPE, RECIPE_SCOPE, name, version);
    let target = file_url_to_path(&url).ok_or_else(|| TransportError::UnsupportedUrl(url.clone()))?;
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, package.bytes()).await?;
    log::debug!("Stored package for '{}@{}' at '{}'", name, version, target.display());

    let info_path = paths::versions_info(RECIPE_TYPE, RECIPE_SCOPE, name);
    let existing_info: Option<RecipeVersionsInfo> = store.get(&info_path).await?.decode()?;
    let recipe_info_path = paths::recipe_info(RECIPE_TYPE, RECIPE_SCOPE, name);
    let now = now_millis();

    let mut values = BTreeMap::new();
    values.insert(format!("{}/published", version_path), json!(true));
    values.insert(format!("{}/publishedAt", version_path), json!(now));
    values.insert(format!("{}/updatedAt", version_path), json!(now));
    values.insert(format!("{}/last", info_path), json!(version));
    values.insert(
        format!("{}/all/{}", info_path, escape_key(version)),
        json!(version),
    );
    values.insert(format!("{}/updatedAt", info_path), json!(now));
    if existing_info.is_none() {
        values.insert(format!("{}/createdAt", info_path), json!(now));
    }
    values.insert(format!("{}/lastPublishedVersion", recipe_info_path), json!(version));
    values.insert(format!("{}/updatedAt", recipe_info_path), json!(now));
    values.insert(format!("{}/usedAt", key_path), json!(now));
    values.insert(format!("{}/updatedAt", key_path), json!(now));
    store.update(values).await?;

    log::info!("Published '{}@{}'", name, version);
    Ok(RecipeVersionData {
        published: true,
        published_at: Some(now),
        updated_at: now,
        ..record
    })
}

/// Publishes straight into a local registry, standing in for a publish server.
#[derive(Debug, Clone)]
pub struct LocalUploader {
    store: Arc<dyn RegistryStore>,
    server_url: String,
}

impl LocalUploader {
    pub fn new(store: Arc<dyn RegistryStore>, server_url: impl Into<String>) -> Self {
        Self {
            store,
            server_url: server_url.into(),
        }
    }
}

#[async_trait]
impl Uploader for LocalUploader {
    async fn upload(&self, publish_key: &str, package: Vec<u8>) -> Result<(), TransportError> {
        accept_upload(self.store.as_ref(), &self.server_url, publish_key, package)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Upload {
                reason: e.to_string(),
            })
    }
}
