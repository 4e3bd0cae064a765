// src/core/paths.rs

use crate::constants::APP_DIR_NAME;
use lazy_static::lazy_static;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

lazy_static! {
    static ref USER_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Could not find system cache directory.")]
    CacheDirNotFound,
    #[error("Could not determine the location of the running executable: {0}")]
    ExecutableNotFound(#[source] std::io::Error),
    #[error("Could not create directory at '{path}': {source}")]
    DirCreation {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to expand path template '{template}': {reason}")]
    Expansion { template: String, reason: String },
}

/// Returns the user-scope directory (`~/.config/recipe-runner`), creating it if needed.
///
/// Memoized: the first call computes and caches the path.
pub fn get_user_config_dir() -> Result<PathBuf, PathError> {
    let mut cached = USER_CONFIG_DIR.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(path) = &*cached {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(APP_DIR_NAME);
    ensure_dir(&config_path)?;

    *cached = Some(config_path.clone());
    Ok(config_path)
}

/// The global scope: the directory holding the running executable.
pub fn get_module_dir() -> Result<PathBuf, PathError> {
    let exe = std::env::current_exe().map_err(PathError::ExecutableNotFound)?;
    let exe = dunce::canonicalize(&exe).unwrap_or(exe);
    Ok(exe
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Default cache root (`~/.cache/recipe-runner` on Linux).
pub fn get_default_cache_dir() -> Result<PathBuf, PathError> {
    Ok(dirs::cache_dir()
        .ok_or(PathError::CacheDirNotFound)?
        .join(APP_DIR_NAME))
}

/// Creates `path` and its parents if missing.
pub fn ensure_dir(path: &std::path::Path) -> Result<(), PathError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| PathError::DirCreation {
            path: path.display().to_string(),
            source: e,
        })?;
    }
    Ok(())
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a configured path.
pub fn expand_path_template(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}
