//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::lifecycle::Worker;
use crate::model::PartitionNames;
use crate::rules::{DEFAULT_NETWORK_FIRST_PATTERNS, DEFAULT_STATIC_PATTERNS, DEFAULT_THIRD_PARTY_DOMAINS, RouteRules};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
///
/// List values given through the environment use TOML array syntax,
/// e.g. `SWCACHE_CRITICAL_RESOURCES='["/", "/css/styles.css"]'`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site origin that relative resource paths resolve against.
    ///
    /// Set via SWCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// App-wide cache name prefix. Partitions carrying it but not the
    /// current version are deleted on activation.
    ///
    /// Set via SWCACHE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Current cache version embedded in every partition name.
    ///
    /// Set via SWCACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Resources fetched into the static partition at install time.
    #[serde(default = "default_critical_resources")]
    pub critical_resources: Vec<String>,

    /// Document served to failed navigations, if cached.
    ///
    /// Set via SWCACHE_OFFLINE_PAGE environment variable.
    #[serde(default = "default_offline_page")]
    pub offline_page: Option<String>,

    /// Regexes routing a URL to cache-first.
    #[serde(default = "default_static_patterns")]
    pub static_patterns: Vec<String>,

    /// Regexes routing a URL to network-first.
    #[serde(default = "default_network_first_patterns")]
    pub network_first_patterns: Vec<String>,

    /// Hosts routed to stale-while-revalidate.
    #[serde(default = "default_third_party_domains")]
    pub third_party_domains: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SWCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SWCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SWCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Activate a freshly installed version without waiting.
    ///
    /// Set via SWCACHE_AUTO_SKIP_WAITING environment variable.
    #[serde(default = "default_true")]
    pub auto_skip_waiting: bool,

    /// Endpoint contact-form submissions are POSTed to.
    ///
    /// Set via SWCACHE_CONTACT_ENDPOINT environment variable.
    #[serde(default = "default_contact_endpoint")]
    pub contact_endpoint: String,
}

fn default_origin() -> String {
    "https://bigcatroofs.com".into()
}

fn default_cache_prefix() -> String {
    "big-cat-roofing-v1".into()
}

fn default_cache_version() -> String {
    "2025-09-21-001".into()
}

fn default_critical_resources() -> Vec<String> {
    [
        "/",
        "/css/styles.css",
        "/css/bootstrap.min.css",
        "/js/main.js",
        "/assets/images/logo.png",
        "/assets/fonts/font.woff2",
        "/manifest.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_offline_page() -> Option<String> {
    Some("/offline.html".into())
}

fn default_static_patterns() -> Vec<String> {
    DEFAULT_STATIC_PATTERNS.iter().map(|s| s.to_string()).collect()
}

fn default_network_first_patterns() -> Vec<String> {
    DEFAULT_NETWORK_FIRST_PATTERNS.iter().map(|s| s.to_string()).collect()
}

fn default_third_party_domains() -> Vec<String> {
    DEFAULT_THIRD_PARTY_DOMAINS.iter().map(|s| s.to_string()).collect()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

fn default_contact_endpoint() -> String {
    "/contact".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            critical_resources: default_critical_resources(),
            offline_page: default_offline_page(),
            static_patterns: default_static_patterns(),
            network_first_patterns: default_network_first_patterns(),
            third_party_domains: default_third_party_domains(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            auto_skip_waiting: true,
            contact_endpoint: default_contact_endpoint(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parsed site origin.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Resolve a site-relative path (or absolute URL) against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        self.origin_url()?
            .join(path)
            .map_err(|e| ConfigError::Invalid { field: path.into(), reason: e.to_string() })
    }

    pub fn partition_names(&self) -> PartitionNames {
        PartitionNames::new(&self.cache_prefix, &self.cache_version)
    }

    /// Compile the classification table.
    pub fn route_rules(&self) -> Result<RouteRules, ConfigError> {
        RouteRules::new(&self.static_patterns, &self.network_first_patterns, &self.third_party_domains)
            .map_err(|e| ConfigError::Invalid { field: "patterns".into(), reason: e.to_string() })
    }

    pub fn offline_url(&self) -> Result<Option<Url>, ConfigError> {
        self.offline_page.as_deref().map(|p| self.resolve(p)).transpose()
    }

    pub fn contact_url(&self) -> Result<Url, ConfigError> {
        self.resolve(&self.contact_endpoint)
    }

    /// A not-yet-installed worker for `version` (the configured one if `None`).
    pub fn worker(&self, version: Option<&str>) -> Result<Worker, ConfigError> {
        let critical = self
            .critical_resources
            .iter()
            .map(|p| self.resolve(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Worker::new(&self.cache_prefix, version.unwrap_or(&self.cache_version), critical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.origin, "https://bigcatroofs.com");
        assert_eq!(config.cache_prefix, "big-cat-roofing-v1");
        assert_eq!(config.cache_version, "2025-09-21-001");
        assert_eq!(config.critical_resources.len(), 7);
        assert_eq!(config.offline_page.as_deref(), Some("/offline.html"));
        assert_eq!(config.db_path, PathBuf::from("./swcache.sqlite"));
        assert_eq!(config.user_agent, "swcache/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert!(config.auto_skip_waiting);
        assert_eq!(config.third_party_domains.len(), 5);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_resolve_relative_paths() {
        let config = AppConfig::default();
        assert_eq!(config.resolve("/css/styles.css").unwrap().as_str(), "https://bigcatroofs.com/css/styles.css");
        assert_eq!(
            config.resolve("https://fonts.googleapis.com/css2").unwrap().as_str(),
            "https://fonts.googleapis.com/css2"
        );
        assert_eq!(config.contact_url().unwrap().path(), "/contact");
        assert_eq!(config.offline_url().unwrap().unwrap().path(), "/offline.html");
    }

    #[test]
    fn test_no_offline_page() {
        let config = AppConfig { offline_page: None, ..Default::default() };
        assert!(config.offline_url().unwrap().is_none());
    }

    #[test]
    fn test_worker_from_config() {
        let config = AppConfig::default();
        let worker = config.worker(None).unwrap();
        assert_eq!(worker.version(), "2025-09-21-001");
        assert_eq!(worker.names(), &config.partition_names());

        let next = config.worker(Some("2025-10-01-001")).unwrap();
        assert_eq!(next.names().static_assets, "big-cat-roofing-v1-static-2025-10-01-001");
    }

    #[test]
    fn test_route_rules_from_config() {
        let config = AppConfig::default();
        let rules = config.route_rules().unwrap();
        let url = Url::parse("https://bigcatroofs.com/css/styles.css").unwrap();
        assert_eq!(rules.classify(&url), crate::rules::ResourceKind::Static);
    }
}
