// src/core/dependency_gate.rs

//! Process-wide dependency installation gate.
//!
//! The package manager is loaded at most once per process. Concurrent first callers
//! await the same in-flight load and all see its outcome. A failed load is cleared so
//! a later call can retry; a successful one is never repeated.
//!
//! Dependencies that have been seen resolvable are remembered, so each one is probed
//! at most once. Unresolved dependencies are installed in one batch.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::error::RecipeResult;
use crate::core::recipe_file::dependency_spec;
use crate::system::package_manager::{PackageManager, PackageManagerError};

type LoadFuture = Shared<BoxFuture<'static, Result<(), PackageManagerError>>>;

enum LoadState {
    Idle,
    Loading { attempt: u64, fut: LoadFuture },
    Loaded,
}

/// Loads the package manager once and installs missing recipe dependencies.
#[derive(Debug)]
pub struct DependencyGate {
    manager: Arc<dyn PackageManager>,
    load: Mutex<LoadState>,
    attempts: AtomicU64,
    verified: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "Idle",
            Self::Loading { .. } => "Loading",
            Self::Loaded => "Loaded",
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl DependencyGate {
    pub fn new(manager: Arc<dyn PackageManager>) -> Self {
        Self {
            manager,
            load: Mutex::new(LoadState::Idle),
            attempts: AtomicU64::new(0),
            verified: Mutex::new(HashSet::new()),
        }
    }

    /// Loads the package manager, or joins the load already underway.
    pub async fn ensure_loaded(&self) -> Result<(), PackageManagerError> {
        let (attempt, in_flight) = {
            let mut state = lock(&self.load);
            match &*state {
                LoadState::Loaded => return Ok(()),
                LoadState::Loading { attempt, fut } => (*attempt, fut.clone()),
                LoadState::Idle => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
                    let manager = self.manager.clone();
                    let fut = async move { manager.load().await }.boxed().shared();
                    *state = LoadState::Loading {
                        attempt,
                        fut: fut.clone(),
                    };
                    log::debug!("Loading package manager (attempt {})", attempt + 1);
                    (attempt, fut)
                }
            }
        };

        let result = in_flight.await;

        let mut state = lock(&self.load);
        // Only waiters of the current attempt may move the state on.
        if let LoadState::Loading { attempt: current, .. } = &*state
            && *current == attempt
        {
            *state = match &result {
                Ok(()) => LoadState::Loaded,
                Err(e) => {
                    log::debug!("Package manager load failed, clearing gate: {}", e);
                    LoadState::Idle
                }
            };
        }
        result
    }

    /// `true` once the package manager has loaded successfully.
    pub fn is_loaded(&self) -> bool {
        matches!(*lock(&self.load), LoadState::Loaded)
    }

    /// `true` if `name` was already seen resolvable.
    pub fn is_verified(&self, name: &str) -> bool {
        lock(&self.verified).contains(name)
    }

    /// Records `name` as resolvable.
    pub fn mark_verified(&self, name: &str) {
        lock(&self.verified).insert(name.to_string());
    }

    /// Makes every dependency in `dependencies` (name → version range) resolvable.
    pub async fn ensure_dependencies(
        &self,
        dependencies: &BTreeMap<String, String>,
    ) -> RecipeResult<()> {
        self.ensure_loaded().await?;

        let mut missing = Vec::new();
        for (name, req) in dependencies {
            if self.is_verified(name) {
                continue;
            }
            if self.manager.is_resolvable(name).await {
                self.mark_verified(name);
            } else {
                missing.push(dependency_spec(name, req));
            }
        }

        if missing.is_empty() {
            return Ok(());
        }
        self.manager.install(&missing).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RecipeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    #[derive(Debug, Default)]
    struct FakeManager {
        loads: AtomicUsize,
        fail_next_load: AtomicBool,
        resolvable: Mutex<HashSet<String>>,
        probes: Mutex<Vec<String>>,
        installs: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl PackageManager for FakeManager {
        async fn load(&self) -> Result<(), PackageManagerError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            for _ in 0..3 {
                tokio::task::yield_now().await;
            }
            if self.fail_next_load.swap(false, Ordering::SeqCst) {
                return Err(PackageManagerError::LoadFailed {
                    program: "fake".into(),
                    reason: "boom".into(),
                });
            }
            Ok(())
        }

        async fn is_resolvable(&self, name: &str) -> bool {
            self.probes.lock().unwrap().push(name.to_string());
            self.resolvable.lock().unwrap().contains(name)
        }

        async fn install(&self, specs: &[String]) -> Result<(), PackageManagerError> {
            self.installs.lock().unwrap().push(specs.to_vec());
            Ok(())
        }
    }

    fn deps(names: &[&str]) -> BTreeMap<String, String> {
        names
            .iter()
            .map(|n| (n.to_string(), String::new()))
            .collect()
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_invocation() {
        let manager = Arc::new(FakeManager::default());
        let gate = DependencyGate::new(manager.clone());

        let (a, b) = tokio::join!(gate.ensure_loaded(), gate.ensure_loaded());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(manager.loads.load(Ordering::SeqCst), 1);
        assert!(gate.is_loaded());

        gate.ensure_loaded().await.unwrap();
        assert_eq!(manager.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_is_shared_then_retried() {
        let manager = Arc::new(FakeManager::default());
        manager.fail_next_load.store(true, Ordering::SeqCst);
        let gate = DependencyGate::new(manager.clone());

        let (a, b) = tokio::join!(gate.ensure_loaded(), gate.ensure_loaded());
        assert_eq!(manager.loads.load(Ordering::SeqCst), 1);
        assert!(a.is_err());
        assert_eq!(a, b);
        assert!(!gate.is_loaded());

        gate.ensure_loaded().await.unwrap();
        assert_eq!(manager.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_only_unverified_unresolvable_deps_are_installed() {
        let manager = Arc::new(FakeManager::default());
        let gate = DependencyGate::new(manager.clone());
        gate.mark_verified("a");

        gate.ensure_dependencies(&deps(&["a", "b"])).await.unwrap();

        assert_eq!(*manager.installs.lock().unwrap(), vec![vec!["b".to_string()]]);
        assert_eq!(*manager.probes.lock().unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_all_verified_makes_no_install_call() {
        let manager = Arc::new(FakeManager::default());
        let gate = DependencyGate::new(manager.clone());
        gate.mark_verified("a");
        gate.mark_verified("b");

        gate.ensure_dependencies(&deps(&["a", "b"])).await.unwrap();
        assert!(manager.installs.lock().unwrap().is_empty());
        assert!(manager.probes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolvable_deps_are_probed_once() {
        let manager = Arc::new(FakeManager::default());
        manager.resolvable.lock().unwrap().insert("a".into());
        let gate = DependencyGate::new(manager.clone());

        gate.ensure_dependencies(&deps(&["a"])).await.unwrap();
        gate.ensure_dependencies(&deps(&["a"])).await.unwrap();
        assert_eq!(manager.probes.lock().unwrap().len(), 1);
        assert!(manager.installs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_specs_carry_version_ranges() {
        let manager = Arc::new(FakeManager::default());
        let gate = DependencyGate::new(manager.clone());
        let deps = BTreeMap::from([("left-pad".to_string(), "^1.3.0".to_string())]);

        gate.ensure_dependencies(&deps).await.unwrap();
        assert_eq!(
            *manager.installs.lock().unwrap(),
            vec![vec!["left-pad@^1.3.0".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_load_failure_aborts_before_install() {
        let manager = Arc::new(FakeManager::default());
        manager.fail_next_load.store(true, Ordering::SeqCst);
        let gate = DependencyGate::new(manager.clone());

        let err = gate.ensure_dependencies(&deps(&["b"])).await.unwrap_err();
        assert!(matches!(err, RecipeError::PackageManager(PackageManagerError::LoadFailed { .. })));
        assert!(manager.installs.lock().unwrap().is_empty());
    }
}
