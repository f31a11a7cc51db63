pub mod context;
pub mod target;

pub use context::ResolveContext;
pub use target::Target;
