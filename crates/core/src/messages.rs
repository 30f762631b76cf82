//! Admin messages a controlling page can send to the router.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::CacheStorage;
use crate::lifecycle::Registration;

/// A message from a controlling page. Serialized as `{"type": "CACHE_STATS"}` etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    CacheStats,
    ClearCache,
    SkipWaiting,
}

/// Entry counts per partition plus totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub caches: BTreeMap<String, u64>,
    pub total_caches: u64,
    pub total_resources: u64,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Ack {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Reply {
    Stats(CacheStats),
    Ack(Ack),
}

/// Count the entries of every existing partition.
pub async fn cache_stats(storage: &dyn CacheStorage) -> Result<CacheStats, Error> {
    let mut stats = CacheStats::default();
    for name in storage.keys().await? {
        let count = storage.entry_count(&name).await?;
        stats.total_resources += count;
        stats.caches.insert(name, count);
    }
    stats.total_caches = stats.caches.len() as u64;
    Ok(stats)
}

/// Delete every partition, whichever version or app it belongs to.
pub async fn clear_caches(storage: &dyn CacheStorage) -> Result<Ack, Error> {
    let names = storage.keys().await?;
    let deletes = names.iter().map(|name| storage.delete(name));
    futures::future::try_join_all(deletes).await?;
    tracing::info!(count = names.len(), "cleared all caches");
    Ok(Ack { success: true })
}

/// Answer one message.
pub async fn dispatch(
    message: Message, storage: &dyn CacheStorage, registration: &mut Registration,
) -> Result<Reply, Error> {
    match message {
        Message::CacheStats => cache_stats(storage).await.map(Reply::Stats),
        Message::ClearCache => clear_caches(storage).await.map(Reply::Ack),
        Message::SkipWaiting => {
            let promoted = registration.waiting().is_some();
            if promoted {
                registration.skip_waiting(storage).await?;
            }
            Ok(Reply::Ack(Ack { success: promoted }))
        }
    }
}
