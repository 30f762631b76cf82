//! The three caching strategies.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::{Router, Served, Source};
use crate::Error;
use crate::cache::CacheStorage;
use crate::model::{CachedResponse, Request};
use crate::rules::ResourceKind;

impl Router {
    /// Cache-first over the static partition.
    ///
    /// A hit is returned with no network contact and no freshness check.
    pub(crate) async fn cache_first(&self, request: &Request) -> Result<Served, Error> {
        let partition = &self.names.static_assets;

        if let Some(cached) = self.lookup(partition, request).await {
            return Ok(Served::new(cached, Source::Cache, ResourceKind::Static));
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store(partition, request, &response).await;
                }
                Ok(Served::new(response, Source::Network, ResourceKind::Static))
            }
            Err(err) => {
                tracing::error!(url = %request.url, error = %err, "cache-first fetch failed");
                // another request may have filled the entry while this one was in flight
                match self.lookup(partition, request).await {
                    Some(cached) => Ok(Served::new(cached, Source::Cache, ResourceKind::Static)),
                    None => Err(err),
                }
            }
        }
    }

    /// Network-first over the dynamic partition.
    pub(crate) async fn network_first(&self, request: &Request) -> Result<Served, Error> {
        let partition = &self.names.dynamic;

        let err = match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store(partition, request, &response).await;
                }
                return Ok(Served::new(response, Source::Network, ResourceKind::NetworkFirst));
            }
            Err(err) => err,
        };

        tracing::info!(url = %request.url, error = %err, "network failed, trying cache");

        if let Some(cached) = self.lookup(partition, request).await {
            return Ok(Served::new(cached, Source::Cache, ResourceKind::NetworkFirst));
        }

        if request.is_navigation()
            && let Some(page) = self.offline_document().await
        {
            return Ok(Served::new(page, Source::OfflineFallback, ResourceKind::NetworkFirst));
        }

        Err(err)
    }

    /// Stale-while-revalidate over the third-party partition.
    ///
    /// The network fetch always runs in its own task. A cached copy is
    /// returned without waiting for it; on a miss the caller waits for
    /// that task and gets its outcome.
    pub(crate) async fn stale_while_revalidate(&self, request: Request) -> Result<Served, Error> {
        let partition = self.names.third_party.clone();
        let cached = self.lookup(&partition, &request).await;

        let revalidation = spawn_revalidation(self.storage.clone(), self.fetcher.clone(), partition, request);

        if let Some(cached) = cached {
            return Ok(Served::new(cached, Source::Cache, ResourceKind::ThirdParty));
        }

        let response = revalidation
            .await
            .map_err(|e| Error::TaskFailed(format!("revalidation task: {e}")))??;
        Ok(Served::new(response, Source::Network, ResourceKind::ThirdParty))
    }

    /// The configured offline page, searched across every partition.
    async fn offline_document(&self) -> Option<CachedResponse> {
        let url = self.offline_page.as_ref()?;
        let request = Request::get(url.clone());
        match self.storage.match_any(&request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "offline page lookup failed");
                None
            }
        }
    }
}

/// Fetch in the background and write a 200 back into `partition`.
///
/// Failures are logged and dropped; nothing retries them.
fn spawn_revalidation(
    storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn super::Fetcher>, partition: String, request: Request,
) -> JoinHandle<Result<CachedResponse, Error>> {
    tokio::spawn(async move {
        match fetcher.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable()
                    && let Err(e) = storage.put(&partition, &request, &response).await
                {
                    tracing::warn!(partition = %partition, url = %request.url, error = %e, "cache write failed");
                }
                Ok(response)
            }
            Err(err) => {
                tracing::debug!(url = %request.url, error = %err, "third-party fetch failed");
                Err(err)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use url::Url;

    use super::*;
    use crate::cache::CacheDb;
    use crate::model::PartitionNames;
    use crate::rules::RouteRules;
    use crate::testing::ScriptedFetcher;

    const ORIGIN: &str = "https://bigcatroofs.com";

    struct Harness {
        db: Arc<CacheDb>,
        net: Arc<ScriptedFetcher>,
        router: Router,
    }

    impl Harness {
        async fn cache_offline_page(&self) {
            let page = CachedResponse::new(url("/offline.html"), 200, "offline");
            self.db
                .put(&self.router.names.static_assets, &get("/offline.html"), &page)
                .await
                .unwrap();
        }
    }

    async fn harness() -> Harness {
        let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
        let net = Arc::new(ScriptedFetcher::new());
        let router = Router::new(
            db.clone(),
            net.clone(),
            Arc::new(RouteRules::default()),
            PartitionNames::new("big-cat-roofing-v1", "test"),
        )
        .with_offline_page(Url::parse(&format!("{ORIGIN}/offline.html")).unwrap());
        Harness { db, net, router }
    }

    fn url(path: &str) -> String {
        format!("{ORIGIN}{path}")
    }

    fn get(path: &str) -> Request {
        Request::get(Url::parse(&url(path)).unwrap())
    }

    fn navigate(path: &str) -> Request {
        Request::navigate(Url::parse(&url(path)).unwrap())
    }

    #[tokio::test]
    async fn test_cache_first_stores_then_serves_from_cache() {
        let h = harness().await;
        h.net.respond(&url("/css/styles.css"), 200, "body{}");

        let first = h.router.cache_first(&get("/css/styles.css")).await.unwrap();
        assert_eq!(first.source, Source::Network);
        assert_eq!(h.net.calls(), 1);

        let stored = h
            .db
            .match_in(&h.router.names.static_assets, &get("/css/styles.css"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.body.as_ref(), b"body{}");

        let second = h.router.cache_first(&get("/css/styles.css")).await.unwrap();
        assert_eq!(second.source, Source::Cache);
        assert_eq!(second.response.body.as_ref(), b"body{}");
        assert_eq!(h.net.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_first_does_not_store_non_200() {
        let h = harness().await;
        h.net.respond(&url("/images/missing.png"), 404, "nope");

        let served = h.router.cache_first(&get("/images/missing.png")).await.unwrap();
        assert_eq!(served.response.status, 404);
        assert_eq!(h.db.entry_count(&h.router.names.static_assets).await.unwrap(), 0);

        h.router.cache_first(&get("/images/missing.png")).await.unwrap();
        assert_eq!(h.net.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_first_network_failure_without_cache() {
        let h = harness().await;
        h.net.fail(&url("/js/main.js"));

        let result = h.router.cache_first(&get("/js/main.js")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_network_first_prefers_network() {
        let h = harness().await;
        let req = get("/contact.html");
        let mut cached = CachedResponse::new(url("/contact.html"), 200, "cached copy");
        cached.headers.push(("last-modified".into(), "Fri, 01 Jan 2100 00:00:00 GMT".into()));
        h.db.put(&h.router.names.dynamic, &req, &cached).await.unwrap();
        h.net.respond(&url("/contact.html"), 200, "live copy");

        let served = h.router.network_first(&req).await.unwrap();
        assert_eq!(served.source, Source::Network);
        assert_eq!(served.response.body.as_ref(), b"live copy");

        let stored = h.db.match_in(&h.router.names.dynamic, &req).await.unwrap().unwrap();
        assert_eq!(stored.body.as_ref(), b"live copy");
    }

    #[tokio::test]
    async fn test_network_first_error_status_is_not_a_failure() {
        let h = harness().await;
        let req = get("/api/quote");
        h.db.put(&h.router.names.dynamic, &req, &CachedResponse::new(url("/api/quote"), 200, "old"))
            .await
            .unwrap();
        h.net.respond(&url("/api/quote"), 500, "boom");

        let served = h.router.network_first(&req).await.unwrap();
        assert_eq!(served.source, Source::Network);
        assert_eq!(served.response.status, 500);

        let stored = h.db.match_in(&h.router.names.dynamic, &req).await.unwrap().unwrap();
        assert_eq!(stored.body.as_ref(), b"old");
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache() {
        let h = harness().await;
        let req = navigate("/contact.html");
        h.db.put(&h.router.names.dynamic, &req, &CachedResponse::new(url("/contact.html"), 200, "cached"))
            .await
            .unwrap();
        h.cache_offline_page().await;
        h.net.fail(&url("/contact.html"));

        let served = h.router.network_first(&req).await.unwrap();
        assert_eq!(served.source, Source::Cache);
        assert_eq!(served.response.body.as_ref(), b"cached");
    }

    #[tokio::test]
    async fn test_network_first_offline_page_for_navigation() {
        let h = harness().await;
        h.cache_offline_page().await;
        h.net.fail(&url("/contact.html"));

        let served = h.router.network_first(&navigate("/contact.html")).await.unwrap();
        assert_eq!(served.source, Source::OfflineFallback);
        assert_eq!(served.response.body.as_ref(), b"offline");
    }

    #[tokio::test]
    async fn test_network_first_no_offline_page_for_subresource() {
        let h = harness().await;
        h.cache_offline_page().await;
        h.net.fail(&url("/api/leads"));

        let result = h.router.network_first(&get("/api/leads")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_network_first_navigation_without_offline_page_fails() {
        let h = harness().await;
        h.net.fail(&url("/contact.html"));

        let result = h.router.network_first(&navigate("/contact.html")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_serves_cached_and_refreshes() {
        let h = harness().await;
        let font = "https://fonts.googleapis.com/css2?family=Inter";
        let req = Request::get(Url::parse(font).unwrap());
        h.db.put(&h.router.names.third_party, &req, &CachedResponse::new(font, 200, "stale"))
            .await
            .unwrap();
        h.net.respond(font, 200, "fresh");

        let served = h.router.stale_while_revalidate(req.clone()).await.unwrap();
        assert_eq!(served.source, Source::Cache);
        assert_eq!(served.response.body.as_ref(), b"stale");

        let partition = h.router.names.third_party.clone();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let current = h.db.match_in(&partition, &req).await.unwrap().unwrap();
                if current.body.as_ref() == b"fresh" {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("background revalidation never stored the fresh copy");

        assert_eq!(h.net.calls_for(font), 1);
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_miss_waits_for_network() {
        let h = harness().await;
        let cdn = "https://cdnjs.cloudflare.com/ajax/libs/leaflet";
        h.net.respond(cdn, 200, "lib");
        let req = Request::get(Url::parse(cdn).unwrap());

        let served = h.router.stale_while_revalidate(req.clone()).await.unwrap();
        assert_eq!(served.source, Source::Network);
        assert_eq!(served.response.body.as_ref(), b"lib");

        let stored = h.db.match_in(&h.router.names.third_party, &req).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_miss_propagates_failure() {
        let h = harness().await;
        let cdn = "https://cdn.jsdelivr.net/npm/widget";
        h.net.fail(cdn);

        let result = h.router.stale_while_revalidate(Request::get(Url::parse(cdn).unwrap())).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_stale_while_revalidate_failed_refresh_keeps_entry() {
        let h = harness().await;
        let font = "https://fonts.gstatic.com/s/inter/v1";
        let req = Request::get(Url::parse(font).unwrap());
        h.db.put(&h.router.names.third_party, &req, &CachedResponse::new(font, 200, "kept"))
            .await
            .unwrap();
        h.net.fail(font);

        let served = h.router.stale_while_revalidate(req.clone()).await.unwrap();
        assert_eq!(served.response.body.as_ref(), b"kept");

        tokio::time::sleep(Duration::from_millis(50)).await;
        let current = h.db.match_in(&h.router.names.third_party, &req).await.unwrap().unwrap();
        assert_eq!(current.body.as_ref(), b"kept");
    }
}
