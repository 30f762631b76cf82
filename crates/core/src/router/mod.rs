//! Request router: classify, then dispatch to a caching strategy.
//!
//! ### Routing
//! - Non-GET and extension-scheme requests pass straight to the network
//! - Everything else is classified by [`RouteRules`] and served by
//!   cache-first, network-first or stale-while-revalidate
//!
//! ### Partitions
//! - Each strategy writes only its own partition
//! - Only status 200 responses are stored
//! - A failed cache write is logged; the network response is still returned

mod strategies;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::CacheStorage;
use crate::model::{CachedResponse, PartitionNames, Request};
use crate::rules::{ResourceKind, RouteRules, intercepts};

/// Network side of the router.
///
/// `Err` means no response was produced at all. Any HTTP status, including
/// 4xx/5xx, is an `Ok`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<CachedResponse, Error>;
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Network,
    Cache,
    OfflineFallback,
    /// Not intercepted; fetched without touching any partition.
    Passthrough,
}

/// A response plus how it was obtained.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: CachedResponse,
    pub source: Source,
    pub kind: Option<ResourceKind>,
}

impl Served {
    fn new(response: CachedResponse, source: Source, kind: ResourceKind) -> Self {
        Self { response, source, kind: Some(kind) }
    }
}

/// Routes requests for one cache version.
///
/// Holds no mutable state of its own; partitions are the only shared state.
#[derive(Clone)]
pub struct Router {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    rules: Arc<RouteRules>,
    names: PartitionNames,
    offline_page: Option<Url>,
}

impl Router {
    pub fn new(
        storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>, rules: Arc<RouteRules>, names: PartitionNames,
    ) -> Self {
        Self { storage, fetcher, rules, names, offline_page: None }
    }

    /// Document served to failed navigations when it is cached.
    pub fn with_offline_page(mut self, url: Url) -> Self {
        self.offline_page = Some(url);
        self
    }

    pub fn names(&self) -> &PartitionNames {
        &self.names
    }

    /// Resource kind for an intercepted request, `None` for pass-through.
    pub fn classify(&self, request: &Request) -> Option<ResourceKind> {
        intercepts(request).then(|| self.rules.classify(&request.url))
    }

    /// Produce a response for a request issued by a controlled page.
    ///
    /// # Errors
    ///
    /// Returns the network error when neither the network nor the
    /// strategy's partition (nor the offline page, for navigations) can
    /// answer. No response is ever fabricated.
    pub async fn handle(&self, request: Request) -> Result<Served, Error> {
        let Some(kind) = self.classify(&request) else {
            tracing::trace!(method = %request.method, url = %request.url, "passing through");
            let response = self.fetcher.fetch(&request).await?;
            return Ok(Served { response, source: Source::Passthrough, kind: None });
        };

        tracing::debug!(url = %request.url, %kind, "routing request");

        match kind {
            ResourceKind::Static => self.cache_first(&request).await,
            ResourceKind::NetworkFirst => self.network_first(&request).await,
            ResourceKind::ThirdParty => self.stale_while_revalidate(request).await,
        }
    }

    /// Read one partition, treating storage errors as a miss.
    async fn lookup(&self, partition: &str, request: &Request) -> Option<CachedResponse> {
        match self.storage.match_in(partition, request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(partition, url = %request.url, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Write one partition; failures never reach the caller.
    async fn store(&self, partition: &str, request: &Request, response: &CachedResponse) {
        if let Err(e) = self.storage.put(partition, request, response).await {
            tracing::warn!(partition, url = %request.url, error = %e, "cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use crate::testing::ScriptedFetcher;

    const ORIGIN: &str = "https://bigcatroofs.com";

    async fn router() -> (Arc<CacheDb>, Arc<ScriptedFetcher>, Router) {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let net = Arc::new(ScriptedFetcher::new());
        let router = Router::new(
            db.clone(),
            net.clone(),
            Arc::new(RouteRules::default()),
            PartitionNames::new("big-cat-roofing-v1", "2025-09-21-001"),
        )
        .with_offline_page(Url::parse(&format!("{ORIGIN}/offline.html")).unwrap());
        (db, net, router)
    }

    fn url(path: &str) -> Url {
        Url::parse(&format!("{ORIGIN}{path}")).unwrap()
    }

    #[tokio::test]
    async fn test_static_request_end_to_end() {
        let (db, net, router) = router().await;
        net.respond(url("/css/styles.css").as_str(), 200, "body{color:red}");

        let first = router.handle(Request::get(url("/css/styles.css"))).await.unwrap();
        assert_eq!(first.kind, Some(ResourceKind::Static));
        assert_eq!(first.source, Source::Network);
        assert_eq!(first.response.status, 200);

        let stored = db
            .match_in(&router.names().static_assets, &Request::get(url("/css/styles.css")))
            .await
            .unwrap();
        assert!(stored.is_some());
        assert!(db.match_in(&router.names().dynamic, &Request::get(url("/css/styles.css"))).await.unwrap().is_none());

        let second = router.handle(Request::get(url("/css/styles.css"))).await.unwrap();
        assert_eq!(second.source, Source::Cache);
        assert_eq!(second.response, first.response);
        assert_eq!(net.calls(), 1);
    }

    #[tokio::test]
    async fn test_contact_page_offline_scenarios() {
        let (db, net, router) = router().await;
        net.fail(url("/contact.html").as_str());

        // nothing cached, no offline page: the failure surfaces
        let result = router.handle(Request::navigate(url("/contact.html"))).await;
        assert!(matches!(result, Err(Error::Network(_))));

        // offline page cached: navigations get it
        db.put(
            &router.names().static_assets,
            &Request::get(url("/offline.html")),
            &CachedResponse::new(url("/offline.html").as_str(), 200, "you are offline"),
        )
        .await
        .unwrap();
        let served = router.handle(Request::navigate(url("/contact.html"))).await.unwrap();
        assert_eq!(served.source, Source::OfflineFallback);

        // a prior copy in the dynamic partition wins over the offline page
        db.put(
            &router.names().dynamic,
            &Request::get(url("/contact.html")),
            &CachedResponse::new(url("/contact.html").as_str(), 200, "contact us"),
        )
        .await
        .unwrap();
        let served = router.handle(Request::navigate(url("/contact.html"))).await.unwrap();
        assert_eq!(served.source, Source::Cache);
        assert_eq!(served.response.body.as_ref(), b"contact us");
    }

    #[tokio::test]
    async fn test_post_passes_through_uncached() {
        let (db, net, router) = router().await;
        net.respond(url("/contact").as_str(), 200, "thanks");

        let served = router.handle(Request::post(url("/contact"), "{}")).await.unwrap();
        assert_eq!(served.source, Source::Passthrough);
        assert_eq!(served.kind, None);
        assert!(db.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extension_scheme_passes_through() {
        let (db, net, router) = router().await;
        let ext = "chrome-extension://abcdef/inject.js";
        net.respond(ext, 200, "x");

        let served = router.handle(Request::get(Url::parse(ext).unwrap())).await.unwrap();
        assert_eq!(served.source, Source::Passthrough);
        assert!(db.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_route_is_network_first() {
        let (db, net, router) = router().await;
        net.respond(url("/services").as_str(), 200, "services");

        let served = router.handle(Request::get(url("/services"))).await.unwrap();
        assert_eq!(served.kind, Some(ResourceKind::NetworkFirst));
        assert_eq!(db.entry_count(&router.names().dynamic).await.unwrap(), 1);
    }
}
