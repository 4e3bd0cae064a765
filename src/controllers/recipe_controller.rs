// src/controllers/recipe_controller.rs

//! Registry records a publisher needs before uploading: the recipe entry, its
//! collaborators, the version record and a publish key.

use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::constants::{RECIPE_SCOPE, RECIPE_TYPE};
use crate::core::error::{PublishError, PublishResult};
use crate::models::{
    Collaborator, CurrentUser, PublishKeyData, RecipeInfo, RecipeVersionData, now_millis,
};
use crate::registry::entity::EntityManager;
use crate::registry::{RegistryError, RegistryStore, paths};

#[derive(Debug)]
pub struct RecipeController {
    store: Arc<dyn RegistryStore>,
    infos: EntityManager<RecipeInfo>,
    collaborators: EntityManager<Collaborator>,
    versions: EntityManager<RecipeVersionData>,
    publish_keys: EntityManager<PublishKeyData>,
}

impl RecipeController {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            infos: EntityManager::new(store.clone(), "recipeInfo"),
            collaborators: EntityManager::new(store.clone(), "collaborators"),
            versions: EntityManager::new(store.clone(), "versions"),
            publish_keys: EntityManager::new(store.clone(), "publishKeys"),
            store,
        }
    }

    /// Returns the recipe entry, creating it with `owner` as its owner if absent.
    pub async fn ensure_recipe(&self, name: &str, owner: &CurrentUser) -> PublishResult<RecipeInfo> {
        let info_path = paths::recipe_info(RECIPE_TYPE, RECIPE_SCOPE, name);
        if let Some(info) = self.infos.get(&info_path).await? {
            return Ok(info);
        }

        let now = now_millis();
        let info = RecipeInfo {
            name: name.to_string(),
            scope: RECIPE_SCOPE.to_string(),
            recipe_type: RECIPE_TYPE.to_string(),
            last_published_version: None,
            created_at: now,
            updated_at: now,
        };
        let collaborator = Collaborator {
            owner: true,
            created_at: now,
            updated_at: now,
        };
        let collaborator_path = paths::collaborator(RECIPE_TYPE, RECIPE_SCOPE, name, &owner.id);

        let mut values = BTreeMap::new();
        values.insert(info_path.clone(), to_value(&info)?);
        values.insert(collaborator_path.clone(), to_value(&collaborator)?);
        self.store.update(values).await?;
        self.infos.invalidate(&info_path);
        self.collaborators.invalidate(&collaborator_path);

        log::debug!("Created registry entry for '{}' owned by '{}'", name, owner.username);
        Ok(info)
    }

    /// Fails with `AccessDenied` unless `user` collaborates on `name`.
    pub async fn verify_collaborator(&self, name: &str, user: &CurrentUser) -> PublishResult<()> {
        let path = paths::collaborator(RECIPE_TYPE, RECIPE_SCOPE, name, &user.id);
        if self.collaborators.get(&path).await?.is_some() {
            Ok(())
        } else {
            Err(PublishError::AccessDenied {
                name: name.to_string(),
            })
        }
    }

    /// Returns an unpublished version record for `hash`.
    ///
    /// A missing record is created. A record left behind by an interrupted publish
    /// is reused, rebound to `hash` if the package changed since. A published
    /// record fails with `RecipeVersionExists`.
    pub async fn ensure_version(
        &self,
        name: &str,
        version: &str,
        hash: &str,
    ) -> PublishResult<RecipeVersionData> {
        let path = paths::recipe_version(RECIPE_TYPE, RECIPE_SCOPE, name, version);
        let now = now_millis();
        match self.versions.get_fresh(&path).await? {
            Some(record) if record.published => Err(PublishError::RecipeVersionExists {
                name: name.to_string(),
                version: version.to_string(),
            }),
            Some(record) if record.hash == hash => Ok(record),
            Some(record) => {
                log::debug!("Rebinding unpublished '{}@{}' to a new package", name, version);
                let record = RecipeVersionData {
                    hash: hash.to_string(),
                    updated_at: now,
                    ..record
                };
                self.versions.set(&path, &record).await?;
                Ok(record)
            }
            None => {
                let record = RecipeVersionData {
                    version: version.to_string(),
                    hash: hash.to_string(),
                    published: false,
                    created_at: now,
                    updated_at: now,
                    published_at: None,
                };
                self.versions.set(&path, &record).await?;
                Ok(record)
            }
        }
    }

    /// Issues a single-use key bound to one name, version and package hash.
    pub async fn create_publish_key(
        &self,
        name: &str,
        version: &str,
        hash: &str,
    ) -> PublishResult<PublishKeyData> {
        let now = now_millis();
        let key = PublishKeyData {
            key: Uuid::new_v4().simple().to_string(),
            recipe_name: name.to_string(),
            recipe_version_number: version.to_string(),
            recipe_hash: hash.to_string(),
            created_at: now,
            updated_at: now,
            used_at: None,
        };
        self.publish_keys
            .set(&paths::publish_key(&key.key), &key)
            .await?;
        Ok(key)
    }

    /// Drops cached records of `name@version`, after the registry changed them.
    pub fn invalidate_version(&self, name: &str, version: &str) {
        self.versions
            .invalidate(&paths::recipe_version(RECIPE_TYPE, RECIPE_SCOPE, name, version));
        self.infos
            .invalidate(&paths::recipe_info(RECIPE_TYPE, RECIPE_SCOPE, name));
    }
}

fn to_value<T: serde::Serialize>(record: &T) -> PublishResult<serde_json::Value> {
    serde_json::to_value(record).map_err(|e| PublishError::Registry(RegistryError::from(e)))
}
