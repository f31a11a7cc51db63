//! Configuration default values
//!
//! All defaults live here so they can be changed in one place.

use std::time::Duration;

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// Resolver defaults
pub const DEFAULT_PROBE_PATHS: &[&str] = &["favicon.png", "favicon.ico"];
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SCRAPE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 2 * 1024 * 1024; // 2MB
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

// Cache defaults
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(12 * 60 * 60);
pub const DEFAULT_CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 10_000;
pub const DEFAULT_CACHE_MAX_ENTRY_SIZE: usize = 1024 * 1024; // 1MB

// Content proxy defaults
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CACHE_CONTROL: &str = "max-age=604800";

// Environment overrides, e.g. FAVICON_PROXY_WEB__PORT=9000
pub const ENV_PREFIX: &str = "FAVICON_PROXY_";
pub const ENV_SECTION_SEPARATOR: &str = "__";

pub fn default_user_agent() -> String {
    format!("favicon-proxy/{}", env!("CARGO_PKG_VERSION"))
}
