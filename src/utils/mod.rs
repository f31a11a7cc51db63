//! Utility modules for the favicon proxy

pub mod http_client;

pub use http_client::{UpstreamScheme, build_http_client, content_type_essence, read_capped};
