// src/system/package_manager.rs

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::system::executor::{self, ProcessSpec};

/// Errors raised by the package manager.
///
/// The type is `Clone` so a single in-flight load can hand its result to every
/// caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageManagerError {
    /// The package manager could not be started.
    #[error("Package manager '{program}' could not be loaded: {reason}")]
    LoadFailed {
        /// The program that failed.
        program: String,
        /// Why it failed.
        reason: String,
    },
    /// A dependency install failed.
    #[error("Failed to install dependencies [{}]: {reason}", .specs.join(", "))]
    InstallFailed {
        /// The dependency specifiers that were requested.
        specs: Vec<String>,
        /// Why it failed.
        reason: String,
    },
}

/// The subsystem that installs third-party recipe dependencies.
#[async_trait]
pub trait PackageManager: Send + Sync + std::fmt::Debug {
    /// Prepares the package manager. Called at most once per process by the gate.
    async fn load(&self) -> Result<(), PackageManagerError>;

    /// `true` if the dependency called `name` can already be resolved.
    async fn is_resolvable(&self, name: &str) -> bool;

    /// Installs every specifier in one batch.
    async fn install(&self, specs: &[String]) -> Result<(), PackageManagerError>;
}

/// A package manager driven through its command line (`npm`, `pnpm`, ...).
#[derive(Debug, Clone)]
pub struct CommandPackageManager {
    program: String,
    install_args: Vec<String>,
    work_dir: PathBuf,
    modules_dir: PathBuf,
}

impl CommandPackageManager {
    /// Creates a package manager that installs into `work_dir` and resolves
    /// dependencies from `modules_dir`.
    pub fn new(
        program: impl Into<String>,
        install_args: Vec<String>,
        work_dir: &Path,
        modules_dir: &Path,
    ) -> Self {
        Self {
            program: program.into(),
            install_args,
            work_dir: work_dir.to_path_buf(),
            modules_dir: modules_dir.to_path_buf(),
        }
    }

    /// Where resolvable dependencies live.
    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }
}

#[async_trait]
impl PackageManager for CommandPackageManager {
    async fn load(&self) -> Result<(), PackageManagerError> {
        // The recipes dir is only created by the first registry install.
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| PackageManagerError::LoadFailed {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;

        let spec = ProcessSpec {
            program: self.program.clone(),
            args: vec!["--version".to_string()],
            ..Default::default()
        };
        let version = executor::execute_and_capture_output(&spec, &self.work_dir)
            .await
            .map_err(|e| PackageManagerError::LoadFailed {
                program: self.program.clone(),
                reason: e.to_string(),
            })?;
        log::debug!("Loaded package manager '{}' {}", self.program, version.trim());
        Ok(())
    }

    async fn is_resolvable(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.modules_dir.join(name))
            .await
            .unwrap_or(false)
    }

    async fn install(&self, specs: &[String]) -> Result<(), PackageManagerError> {
        let fail = |reason: String| PackageManagerError::InstallFailed {
            specs: specs.to_vec(),
            reason,
        };
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| fail(e.to_string()))?;

        let spec = ProcessSpec {
            program: self.program.clone(),
            args: self
                .install_args
                .iter()
                .chain(specs.iter())
                .cloned()
                .collect(),
            ..Default::default()
        };
        log::info!("Installing recipe dependencies: {}", specs.join(" "));
        executor::execute(&spec, &self.work_dir)
            .await
            .map_err(|e| fail(e.to_string()))
    }
}
