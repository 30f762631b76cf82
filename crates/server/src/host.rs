//! Shared state behind every tool call.
//!
//! The host plays the part of the browser: it owns the registration, the
//! cache storage and the network, and builds a router for whichever worker
//! is currently active.

use std::sync::Arc;

use tokio::sync::Mutex;
use url::Url;

use swcache_core::{
    AppConfig, CacheDb, CacheStorage, Error, Fetcher, Outbox, Registration, RouteRules, Router, UpdateStatus,
};

pub struct ServiceHost {
    config: AppConfig,
    origin: Url,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    rules: Arc<RouteRules>,
    offline_page: Option<Url>,
    registration: Mutex<Registration>,
    outbox: Outbox,
}

fn invalid_config(err: swcache_core::ConfigError) -> Error {
    Error::InvalidInput(err.to_string())
}

impl ServiceHost {
    pub fn new(config: AppConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(invalid_config)?;
        let rules = Arc::new(config.route_rules().map_err(invalid_config)?);
        let offline_page = config.offline_url().map_err(invalid_config)?;
        let outbox = Outbox::new(db.clone(), fetcher.clone(), config.contact_url().map_err(invalid_config)?);

        Ok(Self {
            config,
            origin,
            storage: Arc::new(db),
            fetcher,
            rules,
            offline_page,
            registration: Mutex::new(Registration::new()),
            outbox,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn storage(&self) -> &dyn CacheStorage {
        self.storage.as_ref()
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn registration(&self) -> &Mutex<Registration> {
        &self.registration
    }

    /// Install a worker for `version` (the configured one if `None`).
    ///
    /// Critical resources are fetched without holding the registration, so
    /// the active version keeps serving until the new one takes over.
    pub async fn install(&self, version: Option<&str>) -> Result<UpdateStatus, Error> {
        let mut worker = self.config.worker(version).map_err(invalid_config)?;
        tracing::info!(version = %worker.version(), "registering worker");

        worker
            .install(self.storage(), self.fetcher(), self.config.auto_skip_waiting)
            .await?;

        let mut registration = self.registration.lock().await;
        registration.adopt(worker, self.storage()).await
    }

    /// Router for the active worker, or `None` while no page is controlled.
    pub async fn router(&self) -> Option<Router> {
        let registration = self.registration.lock().await;
        let worker = registration.active()?;

        let names = worker.names().clone();
        let router = Router::new(self.storage.clone(), self.fetcher.clone(), self.rules.clone(), names);
        Some(match &self.offline_page {
            Some(url) => router.with_offline_page(url.clone()),
            None => router,
        })
    }
}
