// src/core/config.rs

//! # Layered configuration
//!
//! Configuration is a JSON object resolved from four layers, most specific last:
//! built-in defaults, global (`<module>/recipe-config.json`), user
//! (`<user>/recipe-config.json`) and project (`<cwd>/.recipe/config.json`).
//! Values are addressed with dotted keys such as `registry.url`.
//!
//! Config files may hold session credentials, so they must be regular files and, on
//! unix, readable by their owner only (mode `600`). Writes always produce such files.

use serde_json::{Map, Value, json};
use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::constants::{
    PROJECT_CONFIG_FILENAME, PROJECT_DIR, RECIPES_DIR, SCOPE_CONFIG_FILENAME,
};
use crate::core::paths::{self, PathError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Only one of --global, --user or --project may be given.")]
    TooManyContexts,
    #[error("Unknown config target '{0}'. Expected 'global', 'user' or 'project'.")]
    BadConfigTarget(String),
    #[error("Config path '{0}' exists but is not a file.")]
    ConfigNotAFile(PathBuf),
    #[error("Config file '{path}' has permissions {mode:o}; it must be 600.")]
    BadConfigSecurityPerms { path: PathBuf, mode: u32 },
    #[error("Config file '{0}' must contain a JSON object.")]
    NotAnObject(PathBuf),
    #[error("Invalid config key '{0}'.")]
    InvalidKey(String),
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Could not write config file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// The scope a command reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigTarget {
    Global,
    User,
    #[default]
    Project,
}

impl ConfigTarget {
    /// Builds a target from the `--global/--user/--project` flags. No flag means
    /// `Project`; more than one is an error.
    pub fn from_flags(global: bool, user: bool, project: bool) -> ConfigResult<Self> {
        match (global, user, project) {
            (false, false, false) | (false, false, true) => Ok(Self::Project),
            (true, false, false) => Ok(Self::Global),
            (false, true, false) => Ok(Self::User),
            _ => Err(ConfigError::TooManyContexts),
        }
    }
}

impl FromStr for ConfigTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "user" => Ok(Self::User),
            "project" => Ok(Self::Project),
            other => Err(ConfigError::BadConfigTarget(other.to_string())),
        }
    }
}

impl fmt::Display for ConfigTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Global => "global",
            Self::User => "user",
            Self::Project => "project",
        })
    }
}

/// Where configuration and recipes are resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeContext {
    /// The working directory (project scope).
    pub exec_path: PathBuf,
    /// The directory of the running executable (global scope).
    pub module_path: PathBuf,
    /// The per-user directory (user scope).
    pub user_path: PathBuf,
    pub target: ConfigTarget,
}

impl RecipeContext {
    /// The context of the current process.
    pub fn detect(target: ConfigTarget) -> ConfigResult<Self> {
        Ok(Self {
            exec_path: std::env::current_dir()?,
            module_path: paths::get_module_dir()?,
            user_path: paths::get_user_config_dir()?,
            target,
        })
    }

    /// The config file of `target`.
    pub fn config_file(&self, target: ConfigTarget) -> PathBuf {
        match target {
            ConfigTarget::Global => self.module_path.join(SCOPE_CONFIG_FILENAME),
            ConfigTarget::User => self.user_path.join(SCOPE_CONFIG_FILENAME),
            ConfigTarget::Project => self
                .exec_path
                .join(PROJECT_DIR)
                .join(PROJECT_CONFIG_FILENAME),
        }
    }
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.to_string_lossy().replace('\\', "/"))
}

fn default_config(context: &RecipeContext) -> Value {
    let cache_dir = paths::get_default_cache_dir()
        .unwrap_or_else(|_| context.user_path.join("cache"));
    let local_registry = file_url(&context.user_path.join("registry"));
    json!({
        "registry": { "url": local_registry },
        "server": { "url": local_registry },
        "recipes": { "dir": context.user_path.join(RECIPES_DIR).to_string_lossy() },
        "cache": { "dir": cache_dir.to_string_lossy() },
        "package_manager": {
            "program": "npm",
            "install_args": ["install", "--no-save"],
        },
    })
}

/// Reads and writes the layered configuration of one context.
#[derive(Debug, Clone)]
pub struct ConfigController {
    context: RecipeContext,
    defaults: Value,
}

impl ConfigController {
    pub fn new(context: RecipeContext) -> Self {
        let defaults = default_config(&context);
        Self { context, defaults }
    }

    pub fn context(&self) -> &RecipeContext {
        &self.context
    }

    /// The target commands write to unless told otherwise.
    pub fn target(&self) -> ConfigTarget {
        self.context.target
    }

    /// Reads one scope's file. A missing file is an empty object.
    pub fn load_scope(&self, target: ConfigTarget) -> ConfigResult<Map<String, Value>> {
        let path = self.context.config_file(target);
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if !meta.is_file() {
            return Err(ConfigError::ConfigNotAFile(path));
        }
        check_permissions(&path, &meta)?;

        let content = std::fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::NotAnObject(path)),
        }
    }

    fn save_scope(&self, target: ConfigTarget, map: Map<String, Value>) -> ConfigResult<()> {
        let path = self.context.config_file(target);
        if let Ok(meta) = std::fs::metadata(&path)
            && !meta.is_file()
        {
            return Err(ConfigError::ConfigNotAFile(path));
        }
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        paths::ensure_dir(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, &Value::Object(map))?;
        temp.write_all(b"\n")?;
        set_owner_only(temp.path())?;
        temp.persist(&path)?;
        log::debug!("Wrote {} config '{}'", target, path.display());
        Ok(())
    }

    /// The fully merged configuration.
    pub fn get_all(&self) -> ConfigResult<Value> {
        let mut merged = self.defaults.clone();
        for target in [ConfigTarget::Global, ConfigTarget::User, ConfigTarget::Project] {
            deep_merge(&mut merged, Value::Object(self.load_scope(target)?));
        }
        Ok(merged)
    }

    /// The merged value at `key`.
    pub fn get(&self, key: &str) -> ConfigResult<Option<Value>> {
        let segments = key_segments(key)?;
        let all = self.get_all()?;
        Ok(lookup(&all, &segments).cloned())
    }

    pub fn get_string(&self, key: &str) -> ConfigResult<Option<String>> {
        Ok(self
            .get(key)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    /// A path-valued key with `~` and environment variables expanded.
    pub fn get_path(&self, key: &str) -> ConfigResult<Option<PathBuf>> {
        match self.get_string(key)? {
            Some(raw) => Ok(Some(paths::expand_path_template(&raw)?)),
            None => Ok(None),
        }
    }

    /// Sets `key` in the file of `target`.
    pub fn set(&self, key: &str, value: Value, target: ConfigTarget) -> ConfigResult<()> {
        let segments = key_segments(key)?;
        let mut root = Value::Object(self.load_scope(target)?);
        insert_at(&mut root, &segments, value);
        match root {
            Value::Object(map) => self.save_scope(target, map),
            _ => Err(ConfigError::InvalidKey(key.to_string())),
        }
    }

    /// Removes `key` from the file of `target`. Returns `true` if it was there.
    pub fn delete(&self, key: &str, target: ConfigTarget) -> ConfigResult<bool> {
        let segments = key_segments(key)?;
        let mut root = Value::Object(self.load_scope(target)?);
        if !remove_at(&mut root, &segments) {
            return Ok(false);
        }
        match root {
            Value::Object(map) => self.save_scope(target, map).map(|()| true),
            _ => Err(ConfigError::InvalidKey(key.to_string())),
        }
    }
}

#[cfg(unix)]
fn check_permissions(path: &Path, meta: &std::fs::Metadata) -> ConfigResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode() & 0o777;
    if mode != 0o600 {
        return Err(ConfigError::BadConfigSecurityPerms {
            path: path.to_path_buf(),
            mode,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path, _meta: &std::fs::Metadata) -> ConfigResult<()> {
    Ok(())
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> ConfigResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> ConfigResult<()> {
    Ok(())
}

fn key_segments(key: &str) -> ConfigResult<Vec<&str>> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.trim().is_empty()) {
        return Err(ConfigError::InvalidKey(key.to_string()));
    }
    Ok(segments)
}

fn lookup<'a>(root: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| node.get(*segment))
}

/// Writes `value` at `segments`, replacing non-object parents with objects.
fn insert_at(root: &mut Value, segments: &[&str], value: Value) {
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut node = root;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        node = map
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        map.insert((*last).to_string(), value);
    }
}

fn remove_at(root: &mut Value, segments: &[&str]) -> bool {
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };
    let mut node = root;
    for segment in parents {
        node = match node.get_mut(*segment) {
            Some(child) => child,
            None => return false,
        };
    }
    match node {
        Value::Object(map) => map.remove(*last).is_some(),
        _ => false,
    }
}

/// Merges `overlay` into `base`. Objects merge key by key; anything else replaces.
fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(root: &Path) -> RecipeContext {
        let ctx = RecipeContext {
            exec_path: root.join("project"),
            module_path: root.join("module"),
            user_path: root.join("user"),
            target: ConfigTarget::Project,
        };
        for dir in [&ctx.exec_path, &ctx.module_path, &ctx.user_path] {
            std::fs::create_dir_all(dir).unwrap();
        }
        ctx
    }

    #[test]
    fn test_target_from_flags() {
        assert_eq!(ConfigTarget::from_flags(false, false, false).unwrap(), ConfigTarget::Project);
        assert_eq!(ConfigTarget::from_flags(true, false, false).unwrap(), ConfigTarget::Global);
        assert_eq!(ConfigTarget::from_flags(false, true, false).unwrap(), ConfigTarget::User);
        assert!(matches!(
            ConfigTarget::from_flags(true, true, false),
            Err(ConfigError::TooManyContexts)
        ));
    }

    #[test]
    fn test_target_from_str() {
        assert_eq!("User".parse::<ConfigTarget>().unwrap(), ConfigTarget::User);
        assert!(matches!(
            "team".parse::<ConfigTarget>(),
            Err(ConfigError::BadConfigTarget(_))
        ));
    }

    #[test]
    fn test_defaults_are_visible() {
        let dir = TempDir::new().unwrap();
        let config = ConfigController::new(context(dir.path()));
        assert_eq!(
            config.get_string("package_manager.program").unwrap().as_deref(),
            Some("npm")
        );
        assert!(
            config
                .get_string("registry.url")
                .unwrap()
                .unwrap()
                .starts_with("file://")
        );
    }

    #[test]
    fn test_most_specific_scope_wins() {
        let dir = TempDir::new().unwrap();
        let config = ConfigController::new(context(dir.path()));

        config.set("server.url", json!("https://global"), ConfigTarget::Global).unwrap();
        config.set("server.url", json!("https://user"), ConfigTarget::User).unwrap();
        assert_eq!(config.get_string("server.url").unwrap().as_deref(), Some("https://user"));

        config.set("server.url", json!("https://project"), ConfigTarget::Project).unwrap();
        assert_eq!(config.get_string("server.url").unwrap().as_deref(), Some("https://project"));

        assert!(config.delete("server.url", ConfigTarget::Project).unwrap());
        assert!(!config.delete("server.url", ConfigTarget::Project).unwrap());
        assert_eq!(config.get_string("server.url").unwrap().as_deref(), Some("https://user"));
    }

    #[test]
    fn test_set_keeps_sibling_keys() {
        let dir = TempDir::new().unwrap();
        let config = ConfigController::new(context(dir.path()));
        config.set("auth.userId", json!("u1"), ConfigTarget::User).unwrap();
        config.set("auth.email", json!("me@example.com"), ConfigTarget::User).unwrap();

        let scope = config.load_scope(ConfigTarget::User).unwrap();
        assert_eq!(scope["auth"]["userId"], json!("u1"));
        assert_eq!(scope["auth"]["email"], json!("me@example.com"));
    }

    #[test]
    fn test_directory_in_place_of_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        std::fs::create_dir_all(ctx.config_file(ConfigTarget::User)).unwrap();
        let config = ConfigController::new(ctx);
        assert!(matches!(
            config.load_scope(ConfigTarget::User),
            Err(ConfigError::ConfigNotAFile(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_written_files_are_owner_only_and_loose_ones_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let config = ConfigController::new(ctx.clone());
        config.set("a", json!(1), ConfigTarget::User).unwrap();

        let path = ctx.config_file(ConfigTarget::User);
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(matches!(
            config.get("a"),
            Err(ConfigError::BadConfigSecurityPerms { mode: 0o644, .. })
        ));
    }

    #[test]
    fn test_invalid_keys() {
        let dir = TempDir::new().unwrap();
        let config = ConfigController::new(context(dir.path()));
        assert!(matches!(config.get("a..b"), Err(ConfigError::InvalidKey(_))));
        assert!(matches!(
            config.set("", json!(1), ConfigTarget::User),
            Err(ConfigError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_deep_merge_replaces_scalars_and_merges_objects() {
        let mut base = json!({ "a": { "b": 1, "c": 2 }, "d": 3 });
        deep_merge(&mut base, json!({ "a": { "b": 10 }, "d": { "e": 4 } }));
        assert_eq!(base, json!({ "a": { "b": 10, "c": 2 }, "d": { "e": 4 } }));
    }
}
