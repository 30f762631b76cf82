//! In-process network double for router and lifecycle tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::Error;
use crate::model::{CachedResponse, Request};
use crate::router::Fetcher;

/// Fetcher that answers from a script and records every call.
///
/// URLs with no script entry fail like an unreachable host.
#[derive(Default)]
pub struct ScriptedFetcher {
    script: Mutex<HashMap<String, Option<CachedResponse>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `status` and `body`.
    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.script
            .lock()
            .unwrap()
            .insert(url.to_string(), Some(CachedResponse::new(url, status, body.to_string())));
    }

    /// Make `url` fail at the network level.
    pub fn fail(&self, url: &str) {
        self.script.lock().unwrap().insert(url.to_string(), None);
    }

    /// Total number of fetches issued.
    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of fetches issued for one URL.
    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<CachedResponse, Error> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());
        let scripted = self.script.lock().unwrap().get(&url).cloned();
        match scripted {
            Some(Some(response)) => Ok(response),
            Some(None) => Err(Error::Network(format!("connection refused: {url}"))),
            None => Err(Error::Network(format!("no route to {url}"))),
        }
    }
}
