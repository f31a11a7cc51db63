//! Centralized error handling for the favicon proxy
//!
//! # Error Categories
//!
//! - **Target Errors**: the `site` parameter is empty or cannot be normalized
//! - **Loader Errors**: a single resolution strategy failed; never user-facing
//! - **Download Errors**: transport failure fetching the resolved icon
//!
//! # Usage
//!
//! ```rust
//! use favicon_proxy::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::Unresolved)
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
