// src/core/error.rs

use std::path::PathBuf;
use thiserror::Error;

use crate::controllers::auth::AuthError;
use crate::registry::RegistryError;
use crate::system::executor::ExecutionError;
use crate::system::package_manager::PackageManagerError;
use crate::system::transport::TransportError;

/// Errors raised while resolving, installing, loading or running a recipe.
#[derive(Error, Debug)]
pub enum RecipeError {
    /// No registry entry (or local manifest) exists for the recipe name.
    #[error("Recipe '{name}' does not exist.")]
    RecipeDoesNotExist {
        /// The requested recipe name.
        name: String,
    },
    /// The recipe exists but the requested version was never published.
    #[error("Version '{version}' of recipe '{name}' does not exist.")]
    RecipeVersionDoesNotExist {
        /// The recipe name.
        name: String,
        /// The concrete version that was requested.
        version: String,
    },
    /// No published version satisfies the requested range.
    #[error("No published version of recipe '{name}' satisfies '{query}'.")]
    NoVersionMatch {
        /// The recipe name.
        name: String,
        /// The version range that could not be satisfied.
        query: String,
    },
    /// A recipe name or version number fails its grammar.
    #[error("Invalid recipe: {reason}")]
    RecipeInvalid {
        /// What is wrong with it.
        reason: String,
    },
    /// A version range could not be parsed.
    #[error("Invalid version query '{query}': {source}")]
    InvalidVersionQuery {
        /// The raw range.
        query: String,
        /// The parser error.
        #[source]
        source: semver::Error,
    },
    /// A `recipe.json` is missing required fields or cannot be parsed.
    #[error("Invalid recipe file '{path}': {reason}")]
    InvalidRecipeFile {
        /// Location of the manifest.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },
    /// A downloaded package does not match the hash recorded in the registry.
    #[error(
        "Package for '{name}@{version}' failed its integrity check (expected {expected}, got {actual})."
    )]
    PackageIntegrity {
        /// The recipe name.
        name: String,
        /// The version.
        version: String,
        /// The hash recorded in the registry.
        expected: String,
        /// The hash of the downloaded bytes.
        actual: String,
    },
    /// A package tarball is unreadable or malformed.
    #[error("Invalid recipe package: {reason}")]
    InvalidPackage {
        /// What is wrong with it.
        reason: String,
    },
    /// A filesystem I/O error occurred.
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    /// A JSON document could not be (de)serialized.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    /// The registry could not be read or written.
    #[error("Registry Error: {0}")]
    Registry(#[from] RegistryError),
    /// A package could not be fetched.
    #[error("Transport Error: {0}")]
    Transport(#[from] TransportError),
    /// The recipe implementation failed to run.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// The package manager could not be loaded or could not install dependencies.
    #[error(transparent)]
    PackageManager(#[from] PackageManagerError),
}

/// Shorthand for results in the resolution/execution pipeline.
pub type RecipeResult<T> = Result<T, RecipeError>;

impl RecipeError {
    /// Returns `true` for errors caused by a missing file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Errors raised while publishing a recipe version or accepting its upload.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("You must be logged in to publish. Run 'recipe login' first.")]
    NotLoggedIn,
    /// The publisher is not a collaborator of the recipe.
    #[error("Access denied: you are not a collaborator of recipe '{name}'.")]
    AccessDenied { name: String },
    /// The version was already published.
    #[error("Version '{version}' of recipe '{name}' already exists.")]
    RecipeVersionExists { name: String, version: String },
    #[error("Unknown publish key.")]
    InvalidPublishKey,
    #[error("Publish key has already been used.")]
    PublishKeyUsed,
    /// The uploaded package does not match what the key was issued for.
    #[error("Uploaded package does not match its publish key: {reason}")]
    PublishKeyMismatch { reason: String },
    #[error(transparent)]
    Recipe(#[from] RecipeError),
    #[error("Registry Error: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Upload(#[from] TransportError),
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PublishResult<T> = Result<T, PublishError>;
