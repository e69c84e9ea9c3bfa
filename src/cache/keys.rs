//! Cache key derivation.
//!
//! A key covers the request path (case-insensitive), the decoded query
//! parameters in sorted order, and the theme derived from the cookie. Headers,
//! raw cookie values and other request metadata never contribute.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use url::form_urlencoded;

use crate::domain::theme::Theme;

/// Opaque key identifying one cacheable computation inside a cache domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Derive the key for an HTTP request.
    pub fn for_request(path: &str, query: Option<&str>, theme: Theme) -> Self {
        let mut params: Vec<(String, String)> = query
            .map(|raw| {
                form_urlencoded::parse(raw.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();
        params.sort();

        let mut hasher = DefaultHasher::new();
        path.to_ascii_lowercase().hash(&mut hasher);
        params.hash(&mut hasher);
        theme.as_str().hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Key for callers that cache something other than HTTP responses.
    pub fn of<T: Hash + ?Sized>(value: &T) -> Self {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}
