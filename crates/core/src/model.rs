//! Request, response and partition-name types shared by the router,
//! the storage backend and the network client.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

/// Header that browsers attach to say what a request is for.
const SEC_FETCH_DEST: &str = "sec-fetch-dest";
const SEC_FETCH_MODE: &str = "sec-fetch-mode";

/// What the page intends to do with the response.
///
/// Only top-level document navigations are eligible for the offline page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Document,
    #[default]
    Resource,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub destination: Destination,
    pub body: Option<Bytes>,
}

impl Request {
    /// A sub-resource GET.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".into(), url, headers: Vec::new(), destination: Destination::Resource, body: None }
    }

    /// A top-level document navigation.
    pub fn navigate(url: Url) -> Self {
        Self { destination: Destination::Document, ..Self::get(url) }
    }

    /// A POST carrying `body`.
    pub fn post(url: Url, body: impl Into<Bytes>) -> Self {
        Self { method: "POST".into(), body: Some(body.into()), ..Self::get(url) }
    }

    /// Build a request from raw parts, inferring the destination from the
    /// `Sec-Fetch-Dest` / `Sec-Fetch-Mode` headers.
    pub fn from_parts(method: &str, url: Url, headers: Vec<(String, String)>) -> Self {
        let destination = infer_destination(&headers);
        Self { method: method.to_ascii_uppercase(), url, headers, destination, body: None }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }

    /// URL used as the cache identity: the fragment never takes part.
    pub fn cache_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}

fn infer_destination(headers: &[(String, String)]) -> Destination {
    let navigates = headers.iter().any(|(name, value)| {
        (name.eq_ignore_ascii_case(SEC_FETCH_DEST) && value.eq_ignore_ascii_case("document"))
            || (name.eq_ignore_ascii_case(SEC_FETCH_MODE) && value.eq_ignore_ascii_case("navigate"))
    });
    if navigates { Destination::Document } else { Destination::Resource }
}

/// A response as stored in (and served from) a cache partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// URL the response was produced for (after redirects).
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self { url: url.into(), status, status_text: String::new(), headers: Vec::new(), body: body.into() }
    }

    /// Only plain 200 responses are ever written to a partition.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The three partition names of one cache version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionNames {
    pub prefix: String,
    pub static_assets: String,
    pub dynamic: String,
    pub third_party: String,
}

impl PartitionNames {
    pub fn new(prefix: &str, version: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            static_assets: format!("{prefix}-static-{version}"),
            dynamic: format!("{prefix}-dynamic-{version}"),
            third_party: format!("{prefix}-third-party-{version}"),
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.static_assets, &self.dynamic, &self.third_party]
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.all().contains(&name)
    }

    /// Owned by this app but not by this version.
    pub fn is_stale(&self, name: &str) -> bool {
        name.starts_with(&self.prefix) && !self.is_current(name)
    }
}
