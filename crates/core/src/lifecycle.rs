//! Install / activate lifecycle for one cache version.
//!
//! A [`Worker`] moves `Parsed -> Installing -> Installed -> Activating ->
//! Activated`, or to `Redundant` when install fails. A [`Registration`]
//! holds the active worker and at most one waiting worker.

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::CacheStorage;
use crate::model::{CachedResponse, PartitionNames, Request};
use crate::router::Fetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// One versioned instance of the router's cache setup.
#[derive(Debug, Clone)]
pub struct Worker {
    version: String,
    names: PartitionNames,
    critical_resources: Vec<Url>,
    state: WorkerState,
    skip_waiting: bool,
    controlling: bool,
}

impl Worker {
    pub fn new(prefix: &str, version: &str, critical_resources: Vec<Url>) -> Self {
        Self {
            version: version.to_string(),
            names: PartitionNames::new(prefix, version),
            critical_resources,
            state: WorkerState::Parsed,
            skip_waiting: false,
            controlling: false,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn names(&self) -> &PartitionNames {
        &self.names
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting
    }

    /// Whether open pages are routed through this worker.
    pub fn is_controlling(&self) -> bool {
        self.controlling
    }

    /// Ask to be activated without waiting for old pages to go away.
    pub fn skip_waiting(&mut self) {
        self.skip_waiting = true;
    }

    /// Populate the static partition with every critical resource.
    ///
    /// All-or-nothing: every resource is fetched first, and only when all
    /// of them answered 200 are they committed in one batch.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` if any resource fails or the batch
    /// cannot be stored; the worker becomes `Redundant`.
    pub async fn install(
        &mut self, storage: &dyn CacheStorage, fetcher: &dyn Fetcher, auto_skip_waiting: bool,
    ) -> Result<(), Error> {
        if self.state != WorkerState::Parsed {
            return Err(Error::InvalidState(format!("cannot install a worker in state {:?}", self.state)));
        }

        tracing::info!(version = %self.version, "installing");
        self.state = WorkerState::Installing;

        match self.populate(storage, fetcher).await {
            Ok(count) => {
                tracing::info!(version = %self.version, count, "critical resources cached");
                self.state = WorkerState::Installed;
                if auto_skip_waiting {
                    self.skip_waiting();
                }
                Ok(())
            }
            Err(err) => {
                tracing::error!(version = %self.version, error = %err, "failed to cache critical resources");
                self.state = WorkerState::Redundant;
                Err(err)
            }
        }
    }

    async fn populate(&self, storage: &dyn CacheStorage, fetcher: &dyn Fetcher) -> Result<usize, Error> {
        let partition = &self.names.static_assets;

        // put_all creates the partition, so a failed install leaves no trace
        let fetches = self.critical_resources.iter().map(|url| fetch_critical(fetcher, url));
        let entries = try_join_all(fetches).await?;

        storage
            .put_all(partition, &entries)
            .await
            .map_err(|e| Error::InstallFailed(format!("storing critical resources: {e}")))?;

        Ok(entries.len())
    }

    /// Delete every partition of older versions and take control.
    ///
    /// Returns the names of the deleted partitions.
    pub async fn activate(&mut self, storage: &dyn CacheStorage) -> Result<Vec<String>, Error> {
        if self.state != WorkerState::Installed {
            return Err(Error::InvalidState(format!("cannot activate a worker in state {:?}", self.state)));
        }

        tracing::info!(version = %self.version, "activating");
        self.state = WorkerState::Activating;

        match self.purge_stale(storage).await {
            Ok(deleted) => {
                self.state = WorkerState::Activated;
                self.controlling = true;
                tracing::info!(version = %self.version, deleted = deleted.len(), "activated");
                Ok(deleted)
            }
            Err(err) => {
                self.state = WorkerState::Installed;
                Err(err)
            }
        }
    }

    async fn purge_stale(&self, storage: &dyn CacheStorage) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in storage.keys().await? {
            if self.names.is_stale(&name) {
                tracing::info!(partition = %name, "deleting old cache");
                storage.delete(&name).await?;
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    fn retire(&mut self) {
        self.state = WorkerState::Redundant;
        self.controlling = false;
    }
}

async fn fetch_critical(fetcher: &dyn Fetcher, url: &Url) -> Result<(Request, CachedResponse), Error> {
    let request = Request::get(url.clone());
    let response = fetcher
        .fetch(&request)
        .await
        .map_err(|e| Error::InstallFailed(format!("{url}: {e}")))?;
    if !response.is_cacheable() {
        return Err(Error::InstallFailed(format!("{url}: status {}", response.status)));
    }
    Ok((request, response))
}

/// Outcome of registering a new worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateStatus {
    /// The worker took over immediately.
    Activated { version: String, deleted: Vec<String> },
    /// An older worker is still active; a skip-waiting signal will promote this one.
    Waiting { version: String },
}

/// The active worker and any installed worker waiting to replace it.
#[derive(Debug, Default)]
pub struct Registration {
    active: Option<Worker>,
    waiting: Option<Worker>,
}

impl Registration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<&Worker> {
        self.active.as_ref()
    }

    pub fn waiting(&self) -> Option<&Worker> {
        self.waiting.as_ref()
    }

    /// Install `worker` and activate it when nothing else is active or it
    /// asked to skip waiting.
    ///
    /// # Errors
    ///
    /// Install and activation failures are returned; the previously
    /// active worker keeps serving either way.
    pub async fn register(
        &mut self, mut worker: Worker, storage: &dyn CacheStorage, fetcher: &dyn Fetcher, auto_skip_waiting: bool,
    ) -> Result<UpdateStatus, Error> {
        worker.install(storage, fetcher, auto_skip_waiting).await?;
        self.adopt(worker, storage).await
    }

    /// Take over a worker that finished installing elsewhere.
    ///
    /// Only storage is touched, so hosts can install without holding
    /// the registration and lock it just for this step.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` unless `worker` is `Installed`, and
    /// activation failures otherwise.
    pub async fn adopt(&mut self, worker: Worker, storage: &dyn CacheStorage) -> Result<UpdateStatus, Error> {
        if worker.state() != WorkerState::Installed {
            return Err(Error::InvalidState(format!("cannot adopt a worker in state {:?}", worker.state())));
        }

        if self.active.is_none() || worker.skip_waiting_requested() {
            let version = worker.version.clone();
            let deleted = self.promote(worker, storage).await?;
            return Ok(UpdateStatus::Activated { version, deleted });
        }

        tracing::info!(version = %worker.version, "new version installed and waiting");
        let version = worker.version.clone();
        if let Some(mut replaced) = self.waiting.replace(worker) {
            replaced.retire();
        }
        Ok(UpdateStatus::Waiting { version })
    }

    /// Promote the waiting worker right away.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` when nothing is waiting.
    pub async fn skip_waiting(&mut self, storage: &dyn CacheStorage) -> Result<UpdateStatus, Error> {
        let mut worker = self
            .waiting
            .take()
            .ok_or_else(|| Error::InvalidState("no waiting worker".into()))?;
        worker.skip_waiting();
        let version = worker.version.clone();
        let deleted = self.promote(worker, storage).await?;
        Ok(UpdateStatus::Activated { version, deleted })
    }

    async fn promote(&mut self, mut worker: Worker, storage: &dyn CacheStorage) -> Result<Vec<String>, Error> {
        match worker.activate(storage).await {
            Ok(deleted) => {
                if let Some(mut old) = self.active.replace(worker) {
                    tracing::debug!(version = %old.version, "retiring previous worker");
                    old.retire();
                }
                Ok(deleted)
            }
            Err(err) => {
                self.waiting = Some(worker);
                Err(err)
            }
        }
    }
}
