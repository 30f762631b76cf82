//! Request classification.
//!
//! Each intercepted GET is sorted into one of three resource kinds by an
//! ordered rule table. The first matching rule wins:
//!
//! 1. static patterns (matched against the full URL) -> [`ResourceKind::Static`]
//! 2. network-first patterns -> [`ResourceKind::NetworkFirst`]
//! 3. hostname contains an allow-listed third-party domain -> [`ResourceKind::ThirdParty`]
//! 4. anything else -> [`ResourceKind::NetworkFirst`]

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::Request;

pub const DEFAULT_STATIC_PATTERNS: &[&str] = &[
    r"\.(?:css|js|woff|woff2|ttf|eot|otf|png|jpg|jpeg|gif|webp|svg|ico)$",
    r"/assets/",
    r"/css/",
    r"/js/",
    r"/fonts/",
    r"/images/",
];

pub const DEFAULT_NETWORK_FIRST_PATTERNS: &[&str] = &[r"\.html$", r"/api/", r"/contact", r"/blog/"];

pub const DEFAULT_THIRD_PARTY_DOMAINS: &[&str] = &[
    "fonts.googleapis.com",
    "fonts.gstatic.com",
    "maps.googleapis.com",
    "cdn.jsdelivr.net",
    "cdnjs.cloudflare.com",
];

/// Schemes owned by browser extensions; never intercepted.
const EXTENSION_SCHEMES: &[&str] = &["chrome-extension", "moz-extension"];

/// Caching strategy a request is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Cache-first, static partition.
    Static,
    /// Network-first, dynamic partition.
    NetworkFirst,
    /// Stale-while-revalidate, third-party partition.
    ThirdParty,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Static => "static",
            ResourceKind::NetworkFirst => "network-first",
            ResourceKind::ThirdParty => "third-party",
        };
        f.write_str(s)
    }
}

/// Error building a rule table from pattern sources.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid pattern {pattern:?}: {reason}")]
pub struct RuleError {
    pub pattern: String,
    pub reason: String,
}

/// Ordered classification table.
#[derive(Debug, Clone)]
pub struct RouteRules {
    static_patterns: Vec<Regex>,
    network_first_patterns: Vec<Regex>,
    third_party_domains: Vec<String>,
}

impl RouteRules {
    /// Compile a rule table.
    ///
    /// # Errors
    ///
    /// Returns `RuleError` for the first pattern that is not a valid regex.
    pub fn new<S: AsRef<str>>(
        static_patterns: &[S], network_first_patterns: &[S], third_party_domains: &[S],
    ) -> Result<Self, RuleError> {
        Ok(Self {
            static_patterns: compile_all(static_patterns)?,
            network_first_patterns: compile_all(network_first_patterns)?,
            third_party_domains: third_party_domains
                .iter()
                .map(|d| d.as_ref().to_ascii_lowercase())
                .collect(),
        })
    }

    /// Classify a URL. Pure: same URL and table always give the same kind.
    pub fn classify(&self, url: &Url) -> ResourceKind {
        let target = url.as_str();

        if self.static_patterns.iter().any(|p| p.is_match(target)) {
            return ResourceKind::Static;
        }

        if self.network_first_patterns.iter().any(|p| p.is_match(target)) {
            return ResourceKind::NetworkFirst;
        }

        if let Some(host) = url.host_str()
            && self.third_party_domains.iter().any(|d| host.contains(d.as_str()))
        {
            return ResourceKind::ThirdParty;
        }

        ResourceKind::NetworkFirst
    }

    pub fn third_party_domains(&self) -> &[String] {
        &self.third_party_domains
    }
}

impl Default for RouteRules {
    fn default() -> Self {
        Self {
            static_patterns: DEFAULT_STATIC_PATTERNS.iter().filter_map(|p| Regex::new(p).ok()).collect(),
            network_first_patterns: DEFAULT_NETWORK_FIRST_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
            third_party_domains: DEFAULT_THIRD_PARTY_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

fn compile_all<S: AsRef<str>>(sources: &[S]) -> Result<Vec<Regex>, RuleError> {
    sources
        .iter()
        .map(|s| {
            Regex::new(s.as_ref()).map_err(|e| RuleError { pattern: s.as_ref().to_string(), reason: e.to_string() })
        })
        .collect()
}

/// Whether the router handles this request at all.
///
/// Only GETs are routed; extension-scheme URLs are left alone entirely.
pub fn intercepts(request: &Request) -> bool {
    request.is_get() && !EXTENSION_SCHEMES.contains(&request.url.scheme())
}
