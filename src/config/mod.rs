use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use tracing::debug;
use url::Url;

use crate::errors::{AppError, AppResult};

pub mod defaults;
pub mod duration_serde;

use defaults::*;
use duration_serde::duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Outer deadline for one inbound request
    #[serde(default = "default_request_timeout", with = "duration")]
    pub request_timeout: Duration,
}

/// Settings shared by the loaders and the outbound HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Conventional icon paths probed by the direct loader
    #[serde(default = "default_probe_paths")]
    pub probe_paths: Vec<String>,
    #[serde(default = "default_probe_timeout", with = "duration")]
    pub probe_timeout: Duration,
    #[serde(default = "default_scrape_timeout", with = "duration")]
    pub scrape_timeout: Duration,
    /// Upper bound on bytes of root HTML read while scraping
    #[serde(default = "default_max_document_size")]
    pub max_document_size: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_connect_timeout", with = "duration")]
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl", with = "duration")]
    pub ttl: Duration,
    #[serde(default = "default_sweep_interval", with = "duration")]
    pub sweep_interval: Duration,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Payloads above this size are streamed but never cached
    #[serde(default = "default_max_entry_size")]
    pub max_entry_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_download_timeout", with = "duration")]
    pub download_timeout: Duration,
    #[serde(default = "default_cache_control")]
    pub cache_control: String,
}

// Web defaults
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

// Resolver defaults
fn default_probe_paths() -> Vec<String> {
    DEFAULT_PROBE_PATHS.iter().map(|p| p.to_string()).collect()
}

fn default_probe_timeout() -> Duration {
    DEFAULT_PROBE_TIMEOUT
}

fn default_scrape_timeout() -> Duration {
    DEFAULT_SCRAPE_TIMEOUT
}

fn default_max_document_size() -> usize {
    DEFAULT_MAX_DOCUMENT_SIZE
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

// Cache defaults
fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_sweep_interval() -> Duration {
    DEFAULT_CACHE_SWEEP_INTERVAL
}

fn default_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

fn default_max_entry_size() -> usize {
    DEFAULT_CACHE_MAX_ENTRY_SIZE
}

// Proxy defaults
fn default_download_timeout() -> Duration {
    DEFAULT_DOWNLOAD_TIMEOUT
}

fn default_cache_control() -> String {
    DEFAULT_CACHE_CONTROL.to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            probe_paths: default_probe_paths(),
            probe_timeout: default_probe_timeout(),
            scrape_timeout: default_scrape_timeout(),
            max_document_size: default_max_document_size(),
            user_agent: default_user_agent(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            sweep_interval: default_sweep_interval(),
            max_entries: default_max_entries(),
            max_entry_size: default_max_entry_size(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            download_timeout: default_download_timeout(),
            cache_control: default_cache_control(),
        }
    }
}

impl Config {
    /// Layered configuration: defaults, then the TOML file (if present), then
    /// `FAVICON_PROXY_*` environment variables.
    pub fn figment<P: AsRef<Path>>(config_file: P) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SECTION_SEPARATOR))
    }

    pub fn load<P: AsRef<Path>>(config_file: P) -> AppResult<Self> {
        let path = config_file.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults and environment");
        }
        Self::from_figment(Self::figment(path))
    }

    pub fn from_figment(figment: Figment) -> AppResult<Self> {
        let config: Config = figment
            .extract()
            .map_err(|e| AppError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.resolver.probe_paths.is_empty() {
            return Err(AppError::configuration(
                "resolver.probe_paths must contain at least one path",
            ));
        }
        for path in &self.resolver.probe_paths {
            validate_probe_path(path)?;
        }
        if self.cache.max_entries == 0 {
            return Err(AppError::configuration("cache.max_entries must be greater than zero"));
        }

        let durations = [
            ("web.request_timeout", self.web.request_timeout),
            ("resolver.probe_timeout", self.resolver.probe_timeout),
            ("resolver.scrape_timeout", self.resolver.scrape_timeout),
            ("resolver.connect_timeout", self.resolver.connect_timeout),
            ("cache.ttl", self.cache.ttl),
            ("cache.sweep_interval", self.cache.sweep_interval),
            ("proxy.download_timeout", self.proxy.download_timeout),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(AppError::configuration(format!("{name} must be non-zero")));
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        if self.web.host.contains(':') && !self.web.host.starts_with('[') {
            format!("[{}]:{}", self.web.host, self.web.port)
        } else {
            format!("{}:{}", self.web.host, self.web.port)
        }
    }
}

/// A probe path must name a resource on the target itself
fn validate_probe_path(path: &str) -> AppResult<()> {
    let invalid = |reason: &str| {
        AppError::configuration(format!("resolver.probe_paths entry '{path}' {reason}"))
    };

    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(invalid("is blank"));
    }
    if trimmed.starts_with("//") || trimmed.contains("://") {
        return Err(invalid("must be a path, not a URL"));
    }

    let base = Url::parse("https://probe.invalid/")
        .map_err(|e| AppError::configuration(e.to_string()))?;
    let joined = base
        .join(trimmed.trim_start_matches('/'))
        .map_err(|e| invalid(&format!("is not a valid path: {e}")))?;
    if joined.host_str() != base.host_str() || joined.scheme() != base.scheme() {
        return Err(invalid("must stay on the target host"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> AppResult<Config> {
        Config::from_figment(
            Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(toml)),
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.cache.ttl, Duration::from_secs(43_200));
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(7_200));
        assert_eq!(config.proxy.cache_control, "max-age=604800");
        assert_eq!(config.resolver.probe_paths, vec!["favicon.png", "favicon.ico"]);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = from_toml(
            r#"
            [web]
            port = 9000

            [cache]
            ttl = "30m"
            max_entries = 64

            [resolver]
            probe_timeout = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.web.port, 9000);
        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.cache.ttl, Duration::from_secs(1800));
        assert_eq!(config.cache.max_entries, 64);
        assert_eq!(config.resolver.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.proxy.download_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = Config::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("/nonexistent/favicon-proxy.toml")),
        )
        .unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_bind_address_brackets_ipv6() {
        let mut config = Config::default();
        config.web.host = "::".into();
        assert_eq!(config.bind_address(), "[::]:8080");
    }

    #[test]
    fn test_rejects_empty_probe_paths() {
        let err = from_toml("[resolver]\nprobe_paths = []").unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_rejects_probe_paths_leaving_the_target() {
        for toml in [
            "[resolver]\nprobe_paths = [\"favicon.ico\", \"\"]",
            "[resolver]\nprobe_paths = [\"https://elsewhere.example/favicon.ico\"]",
            "[resolver]\nprobe_paths = [\"//cdn.example/favicon.ico\"]",
            "[resolver]\nprobe_paths = [\"mailto:admin@example.com\"]",
        ] {
            let err = from_toml(toml).unwrap_err();
            assert!(err.to_string().contains("resolver.probe_paths"), "{toml}: {err}");
        }
    }

    #[test]
    fn test_accepts_nested_probe_paths() {
        let config = from_toml(
            "[resolver]\nprobe_paths = [\"/favicon.ico\", \"static/icons/favicon-32.png\"]",
        )
        .unwrap();
        assert_eq!(config.resolver.probe_paths.len(), 2);
    }

    #[test]
    fn test_rejects_zero_durations() {
        let err = from_toml("[cache]\nsweep_interval = 0").unwrap_err();
        assert!(err.to_string().contains("cache.sweep_interval"));
    }

    #[test]
    fn test_rejects_invalid_duration_strings() {
        assert!(from_toml("[proxy]\ndownload_timeout = \"whenever\"").is_err());
    }
}
