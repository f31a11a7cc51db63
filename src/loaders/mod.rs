//! Icon loaders
//!
//! Each loader is one strategy for discovering an icon URL. The resolver
//! runs them in a fixed order and takes the first hit.

pub mod direct;
pub mod markup;
pub mod traits;

pub use direct::DirectProbeLoader;
pub use markup::MarkupScrapeLoader;
pub use traits::IconLoader;

#[cfg(test)]
pub use traits::MockIconLoader;
