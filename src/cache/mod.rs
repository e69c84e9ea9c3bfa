//! Request cache with single-flight semantics.
//!
//! Each [`CacheDomain`] is an independent partition with its own capacity and
//! TTL. The site uses two:
//!
//! - **page**: rendered pages and list fragments (`cache.size`, `cache.ttl`)
//! - **lastfm**: the now-playing fragment (`lastfm.size`, `lastfm.ttl`)
//!
//! A zero size or TTL turns a domain into a pass-through.

mod config;
mod keys;
mod lock;
mod middleware;
mod response;
mod store;

pub use config::CachePolicy;
pub use keys::CacheKey;
pub use middleware::{ResponseCache, ResponseDomain, response_cache_layer};
pub use response::{CacheStoreError, CachedResponse, buffer_response};
pub use store::{CacheDomain, CacheEntry, CacheError};

pub const PAGE_DOMAIN: &str = "page";
pub const LASTFM_DOMAIN: &str = "lastfm";
