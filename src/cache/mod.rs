//! Time-boxed cache for the composed global feed.
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 20
//! capacity = 64
//! ```

mod config;
mod store;

pub use config::CacheConfig;
pub use store::{PageCache, PageCacheKey};
