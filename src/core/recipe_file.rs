// src/core/recipe_file.rs

//! The `recipe.json` manifest.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::DEFAULT_RECIPE_MAIN;
use crate::core::error::{RecipeError, RecipeResult};
use crate::core::identifier::{RecipeVersionNumber, validate_recipe_name};

/// The contents of a `recipe.json`.
///
/// Unknown fields are kept in `extra` so a load/save cycle does not drop them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RecipeData {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A manifest together with the location it was loaded from.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeFile {
    path: PathBuf,
    data: RecipeData,
}

impl RecipeFile {
    pub fn new(path: impl Into<PathBuf>, data: RecipeData) -> Self {
        Self {
            path: path.into(),
            data,
        }
    }

    /// Parses a manifest. `name` and `version` must be present and be strings.
    pub fn from_slice(path: &Path, bytes: &[u8]) -> RecipeResult<Self> {
        let invalid = |reason: String| RecipeError::InvalidRecipeFile {
            path: path.to_path_buf(),
            reason,
        };

        let value: Value = serde_json::from_slice(bytes).map_err(|e| invalid(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| invalid("the manifest must be a JSON object".to_string()))?;
        for field in ["name", "version"] {
            match object.get(field) {
                Some(Value::String(_)) => {}
                Some(_) => return Err(invalid(format!("'{}' must be a string", field))),
                None => return Err(invalid(format!("missing required field '{}'", field))),
            }
        }

        let data: RecipeData = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
        Ok(Self::new(path, data))
    }

    /// Reads and parses the manifest at `path`.
    ///
    /// A missing file surfaces as [`RecipeError::Io`] with `NotFound`; callers that
    /// treat absence as "no recipe" check [`RecipeError::is_not_found`].
    pub async fn load_from_file(path: &Path) -> RecipeResult<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_slice(path, &bytes)
    }

    /// Writes the manifest as pretty JSON, creating parent directories.
    pub async fn save_to_file(&self, path: &Path) -> RecipeResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut json = serde_json::to_vec_pretty(&self.data)?;
        json.push(b'\n');
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory holding the manifest and the implementation files.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn data(&self) -> &RecipeData {
        &self.data
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn version(&self) -> &str {
        &self.data.version
    }

    /// The entry point, `index` when the manifest does not declare one.
    pub fn main(&self) -> &str {
        self.data
            .main
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_RECIPE_MAIN)
    }

    pub fn dependencies(&self) -> &BTreeMap<String, String> {
        &self.data.dependencies
    }

    /// Checks the name and version grammars. Required before publishing.
    pub fn validate(&self) -> RecipeResult<RecipeVersionNumber> {
        validate_recipe_name(&self.data.name)?;
        RecipeVersionNumber::parse(&self.data.version)
    }
}

/// The install specifier for a dependency: `name@req`, or just `name` when any
/// version will do.
pub fn dependency_spec(name: &str, req: &str) -> String {
    let req = req.trim();
    if req.is_empty() || req == "*" {
        name.to_string()
    } else {
        format!("{}@{}", name, req)
    }
}
