//! Service layer
//!
//! The favicon service ties together the icon cache, the loader chain and
//! the content proxy.

pub mod content_proxy;
pub mod favicon_service;
pub mod icon_cache;
pub mod resolver;

pub use content_proxy::{ContentProxy, IconSource};
pub use favicon_service::FaviconService;
pub use icon_cache::{CacheEntry, CacheStats, IconCache};
pub use resolver::{IconResolver, Resolution};
