//! sw_fetch tool implementation.
//!
//! Issues a request as a controlled page would and reports where the
//! response came from.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::canonicalize_against;
use swcache_core::{Destination, Error, Request, Served, Source};

use crate::host::ServiceHost;

/// Largest body excerpt echoed back in the tool output.
const PREVIEW_CHARS: usize = 2000;

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path on the configured origin (e.g. "/css/styles.css").
    pub url: String,

    /// HTTP method (default: GET). Anything but GET passes straight through.
    #[serde(default)]
    pub method: Option<String>,

    /// Treat the request as a top-level page navigation.
    #[serde(default)]
    pub navigate: bool,
}

/// Output structure for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    /// The URL requested, after canonicalization.
    pub url: String,
    /// URL of the response (after redirects, or of the offline page).
    pub response_url: String,
    pub status: u16,
    pub status_text: String,
    /// "network", "cache", "offline_fallback" or "passthrough".
    pub source: String,
    /// Resource kind the request was classified as, if intercepted.
    pub kind: Option<String>,
    pub content_type: Option<String>,
    /// Body size in bytes.
    pub bytes: usize,
    /// Leading part of the body as text.
    pub preview: String,
}

impl SwFetchOutput {
    fn new(url: String, served: &Served) -> Self {
        let response = &served.response;
        let text = String::from_utf8_lossy(&response.body);
        Self {
            url,
            response_url: response.url.clone(),
            status: response.status,
            status_text: response.status_text.clone(),
            source: source_name(served.source).to_string(),
            kind: served.kind.map(|k| k.to_string()),
            content_type: response.header("content-type").map(str::to_string),
            bytes: response.body.len(),
            preview: text.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}

fn source_name(source: Source) -> &'static str {
    match source {
        Source::Network => "network",
        Source::Cache => "cache",
        Source::OfflineFallback => "offline_fallback",
        Source::Passthrough => "passthrough",
    }
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(host: &ServiceHost, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let url = canonicalize_against(host.origin(), &params.url).map_err(Error::from)?;
    let method = params.method.as_deref().unwrap_or("GET");

    let mut request = Request::from_parts(method, url.clone(), Vec::new());
    if params.navigate {
        request.destination = Destination::Document;
    }

    let served = match host.router().await {
        Some(router) => router.handle(request).await?,
        None => {
            tracing::debug!(url = %url, "no active worker, fetching uncontrolled");
            let response = host.fetcher().fetch(&request).await?;
            Served { response, source: Source::Passthrough, kind: None }
        }
    };

    let output = SwFetchOutput::new(url.to_string(), &served);
    let json = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize response: {e}")))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubFetcher, host_with, output_text};
    use swcache_core::AppConfig;

    fn params(url: &str) -> SwFetchParams {
        SwFetchParams { url: url.into(), method: None, navigate: false }
    }

    async fn output(host: &ServiceHost, params: SwFetchParams) -> SwFetchOutput {
        let result = fetch_impl(host, params).await.unwrap();
        serde_json::from_str(&output_text(&result)).unwrap()
    }

    #[tokio::test]
    async fn test_uncontrolled_fetch_passes_through() {
        let net = StubFetcher::default();
        net.serve("https://bigcatroofs.com/about", 200, "about us");
        let (host, _net) = host_with(net).await;

        let out = output(&host, params("/about")).await;
        assert_eq!(out.source, "passthrough");
        assert_eq!(out.kind, None);
        assert_eq!(out.preview, "about us");
    }

    #[tokio::test]
    async fn test_static_asset_served_from_cache_after_install() {
        let (host, net) = host_with(StubFetcher::serving_critical(&AppConfig::default())).await;
        host.install(None).await.unwrap();
        let installed = net.hits();

        let out = output(&host, params("https://BigCatRoofs.com/css/styles.css#top")).await;
        assert_eq!(out.url, "https://bigcatroofs.com/css/styles.css");
        assert_eq!(out.source, "cache");
        assert_eq!(out.kind.as_deref(), Some("static"));
        assert_eq!(net.hits(), installed);
    }

    #[tokio::test]
    async fn test_offline_navigation_gets_offline_page() {
        let net = StubFetcher::serving_critical(&AppConfig::default());
        net.serve("https://bigcatroofs.com/offline.html", 200, "you are offline");
        let (host, net) = host_with(net).await;
        host.install(None).await.unwrap();

        // Cache the offline page the way a first visit would.
        output(&host, params("/offline.html")).await;
        net.go_offline();

        let out = output(&host, SwFetchParams { url: "/services".into(), method: None, navigate: true }).await;
        assert_eq!(out.source, "offline_fallback");
        assert_eq!(out.preview, "you are offline");
    }

    #[tokio::test]
    async fn test_offline_uncached_resource_is_an_error() {
        let (host, net) = host_with(StubFetcher::serving_critical(&AppConfig::default())).await;
        host.install(None).await.unwrap();
        net.go_offline();

        let result = fetch_impl(&host, params("/api/quote")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_post_passes_through() {
        let net = StubFetcher::serving_critical(&AppConfig::default());
        net.serve("https://bigcatroofs.com/contact", 200, "thanks");
        let (host, _net) = host_with(net).await;
        host.install(None).await.unwrap();

        let out =
            output(&host, SwFetchParams { url: "/contact".into(), method: Some("post".into()), navigate: false }).await;
        assert_eq!(out.source, "passthrough");
    }

    #[tokio::test]
    async fn test_empty_url_rejected() {
        let (host, _net) = host_with(StubFetcher::default()).await;
        let result = fetch_impl(&host, params("  ")).await;
        assert!(result.is_err());
    }
}
