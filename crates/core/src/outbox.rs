//! Contact-form submissions that survive going offline.
//!
//! A submission is POSTed straight to the contact endpoint. If the network
//! is unreachable it is queued, and a later sync with the
//! [`CONTACT_FORM_SYNC`] tag replays the queue in order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::CacheDb;
use crate::model::Request;
use crate::router::Fetcher;

/// Sync tag that replays queued contact-form submissions.
pub const CONTACT_FORM_SYNC: &str = "contact-form-sync";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Submission {
    Delivered { status: u16 },
    Queued { id: i64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub delivered: usize,
    pub remaining: usize,
}

pub struct Outbox {
    db: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    endpoint: Url,
}

impl Outbox {
    pub fn new(db: CacheDb, fetcher: Arc<dyn Fetcher>, endpoint: Url) -> Self {
        Self { db, fetcher, endpoint }
    }

    fn request(&self, payload_json: &str) -> Request {
        Request::post(self.endpoint.clone(), payload_json.to_string())
            .with_header("Content-Type", "application/json")
    }

    /// Send a form payload now, or queue it if the network is down.
    pub async fn submit(&self, payload: &serde_json::Value) -> Result<Submission, Error> {
        let payload_json =
            serde_json::to_string(payload).map_err(|e| Error::InvalidInput(format!("unserializable payload: {e}")))?;

        match self.fetcher.fetch(&self.request(&payload_json)).await {
            Ok(response) => Ok(Submission::Delivered { status: response.status }),
            Err(err) if err.is_network() => {
                let id = self.db.enqueue_form(CONTACT_FORM_SYNC, &payload_json).await?;
                tracing::info!(id, error = %err, "offline, form submission queued");
                Ok(Submission::Queued { id })
            }
            Err(err) => Err(err),
        }
    }

    /// Replay queued submissions for `tag`, oldest first.
    ///
    /// Stops at the first submission that does not go through; it and
    /// everything after it stay queued for the next sync.
    pub async fn sync(&self, tag: &str) -> Result<SyncReport, Error> {
        if tag != CONTACT_FORM_SYNC {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return Ok(SyncReport::default());
        }

        let queued = self.db.queued_forms(tag).await?;
        let mut delivered = Vec::new();

        for form in &queued {
            match self.fetcher.fetch(&self.request(&form.payload_json)).await {
                Ok(response) if (200..300).contains(&response.status) => delivered.push(form.id),
                Ok(response) => {
                    tracing::warn!(id = form.id, status = response.status, "form sync rejected");
                    break;
                }
                Err(err) => {
                    tracing::error!(id = form.id, error = %err, "form sync failed");
                    break;
                }
            }
        }

        self.db.remove_forms(&delivered).await?;
        if !delivered.is_empty() {
            tracing::info!(count = delivered.len(), "offline form submissions synced");
        }

        Ok(SyncReport { delivered: delivered.len(), remaining: queued.len() - delivered.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFetcher;

    const ENDPOINT: &str = "https://bigcatroofs.com/contact";

    async fn outbox() -> (CacheDb, Arc<ScriptedFetcher>, Outbox) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let net = Arc::new(ScriptedFetcher::new());
        let outbox = Outbox::new(db.clone(), net.clone(), Url::parse(ENDPOINT).unwrap());
        (db, net, outbox)
    }

    #[tokio::test]
    async fn test_submit_online() {
        let (db, net, outbox) = outbox().await;
        net.respond(ENDPOINT, 200, "ok");

        let result = outbox.submit(&serde_json::json!({"name": "Pat"})).await.unwrap();
        assert_eq!(result, Submission::Delivered { status: 200 });
        assert!(db.queued_forms(CONTACT_FORM_SYNC).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_offline_queues_then_syncs() {
        let (db, net, outbox) = outbox().await;
        net.fail(ENDPOINT);

        let first = outbox.submit(&serde_json::json!({"name": "Pat"})).await.unwrap();
        assert!(matches!(first, Submission::Queued { .. }));
        outbox.submit(&serde_json::json!({"name": "Sam"})).await.unwrap();
        assert_eq!(db.queued_forms(CONTACT_FORM_SYNC).await.unwrap().len(), 2);

        let report = outbox.sync(CONTACT_FORM_SYNC).await.unwrap();
        assert_eq!(report, SyncReport { delivered: 0, remaining: 2 });

        net.respond(ENDPOINT, 200, "ok");
        let report = outbox.sync(CONTACT_FORM_SYNC).await.unwrap();
        assert_eq!(report, SyncReport { delivered: 2, remaining: 0 });
        assert!(db.queued_forms(CONTACT_FORM_SYNC).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_keeps_rejected_submissions() {
        let (db, net, outbox) = outbox().await;
        db.enqueue_form(CONTACT_FORM_SYNC, "{}").await.unwrap();
        net.respond(ENDPOINT, 503, "busy");

        let report = outbox.sync(CONTACT_FORM_SYNC).await.unwrap();
        assert_eq!(report, SyncReport { delivered: 0, remaining: 1 });
    }

    #[tokio::test]
    async fn test_sync_unknown_tag() {
        let (db, net, outbox) = outbox().await;
        db.enqueue_form(CONTACT_FORM_SYNC, "{}").await.unwrap();

        let report = outbox.sync("periodic-refresh").await.unwrap();
        assert_eq!(report, SyncReport::default());
        assert_eq!(net.calls(), 0);
    }
}
