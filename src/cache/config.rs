//! Per-domain cache policy.

use std::num::NonZeroUsize;
use std::time::Duration;

/// Capacity and time-to-live of one cache domain.
///
/// A zero capacity or a zero TTL disables the domain: every call computes
/// directly, with neither memoization nor collapsing of concurrent callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePolicy {
    pub capacity: usize,
    pub ttl: Duration,
}

impl CachePolicy {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self { capacity, ttl }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0 && !self.ttl.is_zero()
    }

    pub(crate) fn capacity_non_zero(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.capacity)
    }
}

impl From<&crate::config::CacheSettings> for CachePolicy {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self::new(settings.size, settings.ttl)
    }
}
