//! Offline cache worker.
//!
//! Three handlers over a shared [`CacheStorage`]:
//!
//! - **install**: open the manifest's bucket and bulk-add every asset. All or
//!   nothing; a single failed asset fails the install.
//! - **activate**: drop every bucket that is not the current one.
//! - **fetch**: answer from any bucket on an exact URL match, otherwise go to
//!   the network once and pass its response through unchanged.
//!
//! ```text
//! Parsed ──install──▶ Installing ──ok──▶ Installed ──activate──▶ Activating ──▶ Activated
//!                         │
//!                         └──err──▶ Redundant
//! ```

use anyhow::{bail, Context, Result};
use std::sync::{Arc, Mutex};

use crate::cache::CacheStorage;
use crate::fetcher::{FetchError, Fetcher};
use crate::models::StoredResponse;

/// Declarative description of what to pre-cache and under which version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheManifest {
    pub prefix: String,
    pub version: String,
    pub assets: Vec<String>,
}

impl CacheManifest {
    /// Bucket name, e.g. `medassist-v1`.
    pub fn bucket_name(&self) -> String {
        format!("{}-{}", self.prefix, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// Where a fetch was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Cache,
    Network,
}

pub struct CacheWorker {
    manifest: CacheManifest,
    storage: CacheStorage,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<WorkerState>,
}

impl CacheWorker {
    pub fn new(manifest: CacheManifest, storage: CacheStorage, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            manifest,
            storage,
            fetcher,
            state: Mutex::new(WorkerState::Parsed),
        }
    }

    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn state(&self) -> WorkerState {
        *self.lock_state()
    }

    /// Populates the manifest bucket. Returns the number of assets cached.
    pub async fn install(&self) -> Result<usize> {
        self.transition(&[WorkerState::Parsed, WorkerState::Redundant], WorkerState::Installing)?;

        let name = self.manifest.bucket_name();
        tracing::info!(bucket = %name, assets = self.manifest.assets.len(), "installing");

        let result = async {
            let bucket = self.storage.open(&name).await?;
            bucket
                .add_all(self.fetcher.as_ref(), &self.manifest.assets)
                .await
                .with_context(|| format!("Failed to populate cache bucket '{}'", name))
        }
        .await;

        match result {
            Ok(count) => {
                self.set_state(WorkerState::Installed);
                tracing::info!(bucket = %name, count, "install complete");
                Ok(count)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                tracing::error!(bucket = %name, error = %format!("{:#}", e), "install failed");
                Err(e)
            }
        }
    }

    /// Deletes every bucket other than the manifest's. Returns the deleted names.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating)?;

        let current = self.manifest.bucket_name();
        let mut deleted = Vec::new();
        let result: Result<()> = async {
            for name in self.storage.keys().await? {
                if name != current && self.storage.delete(&name).await? {
                    tracing::info!(bucket = %name, "deleted stale cache bucket");
                    deleted.push(name);
                }
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.set_state(WorkerState::Activated);
                Ok(deleted)
            }
            Err(e) => {
                // Activation can be retried; the install is still valid.
                self.set_state(WorkerState::Installed);
                Err(e)
            }
        }
    }

    /// Cache-first fetch. Network responses are returned as-is and not stored.
    pub async fn fetch(&self, url: &str) -> Result<(StoredResponse, FetchSource), FetchError> {
        match self.storage.match_url(url).await {
            Ok(Some(hit)) => {
                tracing::debug!(url, "cache hit");
                return Ok((hit, FetchSource::Cache));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(url, error = %format!("{:#}", e), "cache lookup failed, using network");
            }
        }

        tracing::debug!(url, "cache miss");
        let response = self.fetcher.fetch(url).await?;
        Ok((response, FetchSource::Network))
    }

    fn transition(&self, from: &[WorkerState], to: WorkerState) -> Result<()> {
        let mut state = self.lock_state();
        if !from.contains(&*state) {
            bail!("cannot move cache worker from {:?} to {:?}", *state, to);
        }
        *state = to;
        Ok(())
    }

    fn set_state(&self, to: WorkerState) {
        *self.lock_state() = to;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
