//! Test doubles shared by the tool tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rmcp::model::CallToolResult;
use tokio::sync::watch;

use swcache_core::{AppConfig, CacheDb, CachedResponse, Error, Fetcher, Request};

use crate::host::ServiceHost;

/// Fetcher answering from a URL table; anything else is unreachable.
///
/// While held, every fetch is recorded and then parked until release.
pub struct StubFetcher {
    routes: Mutex<HashMap<String, (u16, String)>>,
    hits: Mutex<Vec<String>>,
    open: watch::Sender<bool>,
}

impl Default for StubFetcher {
    fn default() -> Self {
        Self { routes: Mutex::default(), hits: Mutex::default(), open: watch::channel(true).0 }
    }
}

impl StubFetcher {
    pub fn hold(&self) {
        self.open.send_replace(false);
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    /// A network that serves every critical resource of `config`.
    pub fn serving_critical(config: &AppConfig) -> Self {
        let net = Self::default();
        for path in &config.critical_resources {
            let url = config.resolve(path).unwrap();
            net.serve(url.as_str(), 200, path);
        }
        net
    }

    pub fn serve(&self, url: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, body.to_string()));
    }

    pub fn go_offline(&self) {
        self.routes.lock().unwrap().clear();
    }

    pub fn hits(&self) -> usize {
        self.hits.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<CachedResponse, Error> {
        let url = request.url.to_string();
        self.hits.lock().unwrap().push(url.clone());
        let mut open = self.open.subscribe();
        open.wait_for(|open| *open).await.unwrap();
        let route = self.routes.lock().unwrap().get(&url).cloned();
        route
            .map(|(status, body)| CachedResponse::new(url.as_str(), status, body))
            .ok_or_else(|| Error::Network(format!("unreachable: {url}")))
    }
}

pub async fn host_with(net: StubFetcher) -> (Arc<ServiceHost>, Arc<StubFetcher>) {
    host_with_config(AppConfig::default(), net).await
}

pub async fn host_with_config(config: AppConfig, net: StubFetcher) -> (Arc<ServiceHost>, Arc<StubFetcher>) {
    let net = Arc::new(net);
    let db = CacheDb::open_in_memory().await.unwrap();
    let host = ServiceHost::new(config, db, net.clone()).unwrap();
    (Arc::new(host), net)
}

/// Text of the first content item of a tool result.
pub fn output_text(result: &CallToolResult) -> String {
    result.content[0].as_text().unwrap().text.clone()
}
