//! Rate limiting decision engine and configuration plumbing.

mod limiter;
mod reload;
mod request;
mod snapshot;

pub use limiter::{RateLimitError, RateLimiter};
pub use reload::{ConfigReloader, ConfigSource, FileConfigSource, ReloadHandle};
pub use request::{Classification, RateLimitRequest};
pub use snapshot::{ConfigSnapshot, LimitConfig, StoreErrorPolicy};
