//! Generation lifecycle: install, activate, supersede.
//!
//! A [`GenerationManager`] owns one named generation of the store. Install
//! populates it; activate purges every other generation. Once a newer
//! instance takes over, this one is superseded and stops serving.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;

use shellcache_core::{Error, Network, Store, StoreHandle, WorkerConfig};

use crate::population::{InstallReport, populate};

/// Where this instance is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Installing,
    Active,
    Superseded,
}

/// A stale generation whose deletion failed; retried on the next activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDeletion {
    pub name: String,
    pub reason: String,
}

/// Outcome of an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub generation: String,
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDeletion>,
}

pub struct GenerationManager<S, N: ?Sized> {
    store: Arc<S>,
    network: Arc<N>,
    config: Arc<WorkerConfig>,
    state: RwLock<GenerationState>,
}

impl<S, N> GenerationManager<S, N>
where
    S: Store,
    N: Network + ?Sized,
{
    pub fn new(store: Arc<S>, network: Arc<N>, config: Arc<WorkerConfig>) -> Self {
        Self { store, network, config, state: RwLock::new(GenerationState::Installing) }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub async fn state(&self) -> GenerationState {
        *self.state.read().await
    }

    /// Open (creating if absent) the store for the active generation.
    pub async fn handle(&self) -> Result<S::Handle, Error> {
        self.store.open(&self.config.generation).await
    }

    /// Populate the active generation and mark it installed. On success the
    /// instance is active.
    ///
    /// # Errors
    ///
    /// Returns `Error::Superseded` for a replaced instance, the store error if
    /// the generation cannot be opened or marked, or the population failure
    /// under the strict policy. The state and the install marker are unchanged
    /// on error.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        if self.state().await == GenerationState::Superseded {
            return Err(Error::Superseded(self.config.generation.clone()));
        }

        tracing::info!(generation = %self.config.generation, policy = ?self.config.install_policy, "installing");

        let handle = self.handle().await?;
        let report = populate(&handle, self.network.as_ref(), &self.config).await?;
        handle.mark_installed().await?;

        *self.state.write().await = GenerationState::Active;
        Ok(report)
    }

    /// Delete every generation other than the active one.
    ///
    /// Deletions run concurrently and independently. A failed deletion is
    /// reported and left for the next activation; a failed enumeration means
    /// nothing is deleted this cycle.
    ///
    /// # Errors
    ///
    /// Returns `Error::Superseded` for a replaced instance and
    /// `Error::NotInstalled` before a successful install (or [`resume`]).
    /// Nothing is deleted in either case.
    ///
    /// [`resume`]: GenerationManager::resume
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let generation = self.config.generation.clone();

        match self.state().await {
            GenerationState::Superseded => return Err(Error::Superseded(generation)),
            GenerationState::Installing => {
                tracing::warn!(generation = %generation, "refusing to activate before install completed");
                return Err(Error::NotInstalled(generation));
            }
            GenerationState::Active => {}
        }

        let mut report = ActivateReport { generation: generation.clone(), deleted: Vec::new(), failed: Vec::new() };

        let names = match self.store.keys().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(generation = %generation, error = %e, "failed to enumerate generations, skipping purge");
                return Ok(report);
            }
        };

        let stale: Vec<String> = names.into_iter().filter(|name| *name != generation).collect();
        let outcomes = join_all(stale.iter().map(|name| self.store.delete(name))).await;

        for (name, outcome) in stale.into_iter().zip(outcomes) {
            match outcome {
                Ok(_) => {
                    tracing::info!(generation = %name, "deleted stale generation");
                    report.deleted.push(name);
                }
                Err(e) => {
                    tracing::warn!(generation = %name, error = %e, "failed to delete stale generation");
                    report.failed.push(FailedDeletion { name, reason: e.to_string() });
                }
            }
        }

        Ok(report)
    }

    /// Resume an instance whose generation was installed by an earlier run.
    ///
    /// Returns false (and changes nothing) when the generation was never fully
    /// populated or the instance is superseded.
    pub async fn resume(&self) -> Result<bool, Error> {
        match self.state().await {
            GenerationState::Active => return Ok(true),
            GenerationState::Superseded => return Ok(false),
            GenerationState::Installing => {}
        }

        let installed = self.store.is_installed(&self.config.generation).await?;
        if installed {
            tracing::debug!(generation = %self.config.generation, "resuming installed generation");
            *self.state.write().await = GenerationState::Active;
        }
        Ok(installed)
    }

    /// Mark this instance as replaced by a newer one.
    pub async fn supersede(&self) {
        let mut state = self.state.write().await;
        if *state != GenerationState::Superseded {
            tracing::info!(generation = %self.config.generation, "superseded");
            *state = GenerationState::Superseded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FlakyStore, ScriptedNetwork, page};
    use shellcache_core::{AppConfig, InstallPolicy, StoreDb};

    fn config(generation: &str) -> Arc<WorkerConfig> {
        let app = AppConfig {
            generation: generation.into(),
            assets: vec!["/".into(), "/index.html".into()],
            ..Default::default()
        };
        Arc::new(app.worker_config().unwrap())
    }

    fn network() -> Arc<ScriptedNetwork> {
        Arc::new(ScriptedNetwork::new().respond("/", page("shell")).respond("/index.html", page("shell")))
    }

    #[tokio::test]
    async fn test_install_activates() {
        let db = Arc::new(StoreDb::open_in_memory().await.unwrap());
        let manager = GenerationManager::new(db, network(), config("v1"));
        assert_eq!(manager.state().await, GenerationState::Installing);

        let report = manager.install().await.unwrap();

        assert_eq!(report.generation, "v1");
        assert_eq!(report.cached.len(), 2);
        assert_eq!(manager.state().await, GenerationState::Active);
    }

    #[tokio::test]
    async fn test_failed_install_stays_installing() {
        let db = Arc::new(StoreDb::open_in_memory().await.unwrap());
        let manager = GenerationManager::new(db, Arc::new(ScriptedNetwork::new()), config("v1"));

        assert!(matches!(manager.install().await, Err(Error::AssetUnavailable { .. })));
        assert_eq!(manager.state().await, GenerationState::Installing);
    }

    #[tokio::test]
    async fn test_install_twice_same_entries() {
        let db = Arc::new(StoreDb::open_in_memory().await.unwrap());
        let manager = GenerationManager::new(db, network(), config("v1"));

        manager.install().await.unwrap();
        let first = manager.handle().await.unwrap().entry_urls().await.unwrap();
        manager.install().await.unwrap();
        let second = manager.handle().await.unwrap().entry_urls().await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_activate_purges_stale_generations() {
        let db = Arc::new(StoreDb::open_in_memory().await.unwrap());
        let v1 = GenerationManager::new(db.clone(), network(), config("v1"));
        v1.install().await.unwrap();
        v1.activate().await.unwrap();

        let v2 = GenerationManager::new(db.clone(), network(), config("v2"));
        v2.install().await.unwrap();
        v1.supersede().await;
        let report = v2.activate().await.unwrap();

        assert_eq!(report.deleted, vec!["v1".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(db.keys().await.unwrap(), vec!["v2".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_deletion_does_not_block_others() {
        let flaky = Arc::new(FlakyStore::new().await);
        for name in ["v1", "v2", "v3"] {
            flaky.open(name).await.unwrap();
        }
        flaky.fail_delete_of("v2");

        let manager = GenerationManager::new(flaky.clone(), network(), config("v4"));
        manager.install().await.unwrap();
        let mut report = manager.activate().await.unwrap();
        report.deleted.sort();

        assert_eq!(report.deleted, vec!["v1".to_string(), "v3".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].name, "v2");

        let mut remaining = flaky.keys().await.unwrap();
        remaining.sort();
        assert_eq!(remaining, vec!["v2".to_string(), "v4".to_string()]);
    }

    #[tokio::test]
    async fn test_enumeration_failure_is_tolerated() {
        let flaky = Arc::new(FlakyStore::new().await);
        flaky.open("old").await.unwrap();
        let manager = GenerationManager::new(flaky.clone(), network(), config("v1"));
        manager.install().await.unwrap();

        flaky.fail_keys(true);
        let report = manager.activate().await.unwrap();

        assert!(report.deleted.is_empty());
        assert!(report.failed.is_empty());
        assert_eq!(manager.state().await, GenerationState::Active);
    }

    #[tokio::test]
    async fn test_activate_before_install_rejected() {
        let db = Arc::new(StoreDb::open_in_memory().await.unwrap());
        db.open("old").await.unwrap();
        let manager = GenerationManager::new(db.clone(), network(), config("v1"));

        assert!(matches!(manager.activate().await, Err(Error::NotInstalled(ref name)) if name == "v1"));
        assert_eq!(manager.state().await, GenerationState::Installing);
        assert_eq!(db.keys().await.unwrap(), vec!["old".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_generation() {
        let db = Arc::new(StoreDb::open_in_memory().await.unwrap());
        let v1 = GenerationManager::new(db.clone(), network(), config("v1"));
        v1.install().await.unwrap();
        v1.activate().await.unwrap();

        let offline = Arc::new(ScriptedNetwork::new());
        let v2 = GenerationManager::new(db.clone(), offline.clone(), config("v2"));
        assert!(v2.install().await.is_err());
        assert!(!db.is_installed("v2").await.unwrap());

        // a later run of the same host finds the half-made generation
        let restarted = GenerationManager::new(db.clone(), offline, config("v2"));
        assert!(!restarted.resume().await.unwrap());
        assert!(matches!(restarted.activate().await, Err(Error::NotInstalled(_))));

        assert!(db.keys().await.unwrap().contains(&"v1".to_string()));
        let shell = db.open("v1").await.unwrap();
        assert_eq!(shell.entry_urls().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_install_marks_generation_installed() {
        let db = Arc::new(StoreDb::open_in_memory().await.unwrap());
        let manager = GenerationManager::new(db.clone(), network(), config("v1"));

        manager.install().await.unwrap();

        assert!(db.is_installed("v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_resume_requires_installed_generation() {
        let db = Arc::new(StoreDb::open_in_memory().await.unwrap());
        let first = GenerationManager::new(db.clone(), network(), config("v1"));
        assert!(!first.resume().await.unwrap());
        assert_eq!(first.state().await, GenerationState::Installing);

        first.install().await.unwrap();

        let restarted = GenerationManager::new(db, network(), config("v1"));
        assert!(restarted.resume().await.unwrap());
        assert_eq!(restarted.state().await, GenerationState::Active);
    }

    #[tokio::test]
    async fn test_superseded_rejects_lifecycle() {
        let db = Arc::new(StoreDb::open_in_memory().await.unwrap());
        let manager = GenerationManager::new(db, network(), config("v1"));
        manager.supersede().await;

        assert!(matches!(manager.install().await, Err(Error::Superseded(_))));
        assert!(matches!(manager.activate().await, Err(Error::Superseded(_))));
    }

    #[tokio::test]
    async fn test_lenient_install_activates_with_skips() {
        let db = Arc::new(StoreDb::open_in_memory().await.unwrap());
        let app = AppConfig {
            assets: vec!["/".into(), "/icon.svg".into()],
            install_policy: InstallPolicy::Lenient,
            ..Default::default()
        };
        let network = Arc::new(ScriptedNetwork::new().respond("/", page("shell")));
        let manager = GenerationManager::new(db, network, Arc::new(app.worker_config().unwrap()));

        let report = manager.install().await.unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(manager.state().await, GenerationState::Active);
    }
}
