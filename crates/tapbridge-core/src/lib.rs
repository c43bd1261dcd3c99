pub mod backoff;
pub mod constants;
pub mod error;
pub mod types;

pub use backoff::Backoff;
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
