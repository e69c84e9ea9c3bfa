//! Single-flight cache domains.
//!
//! A [`CacheDomain`] memoizes successful computations per [`CacheKey`] for the
//! domain's TTL and guarantees that at most one computation per key runs at a
//! time. Callers arriving while a computation is in flight wait for its result
//! instead of starting their own.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::CachePolicy;
use super::keys::CacheKey;
use super::lock::mutex_lock;

const METRIC_CACHE_HIT: &str = "topi_cache_hit_total";
const METRIC_CACHE_MISS: &str = "topi_cache_miss_total";
const METRIC_CACHE_EVICT: &str = "topi_cache_evict_total";
const METRIC_CACHE_COALESCED: &str = "topi_cache_coalesced_total";

/// A memoized payload together with its lifetime bounds.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub payload: V,
    pub created_at: Instant,
    pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
    /// An entry is live strictly before its expiry instant.
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError<E> {
    /// The computation ran and returned an error. Shared with every waiter.
    #[error("cached computation failed")]
    Compute(E),
    /// The caller gave up waiting. The computation itself keeps running.
    #[error("gave up waiting for cached computation")]
    Cancelled,
    /// The computation ended without producing a result (it panicked).
    #[error("cached computation aborted before completing")]
    Aborted,
}

type Outcome<V, E> = Option<Result<V, E>>;

struct DomainState<V, E> {
    entries: LruCache<CacheKey, CacheEntry<V>>,
    in_flight: HashMap<CacheKey, watch::Receiver<Outcome<V, E>>>,
}

struct DomainInner<V, E> {
    name: &'static str,
    policy: CachePolicy,
    /// `None` when the policy disables caching.
    state: Option<Mutex<DomainState<V, E>>>,
}

/// Named cache partition with its own capacity and TTL.
pub struct CacheDomain<V, E> {
    inner: Arc<DomainInner<V, E>>,
}

impl<V, E> Clone for CacheDomain<V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, E> CacheDomain<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, policy: CachePolicy) -> Self {
        let state = policy
            .capacity_non_zero()
            .filter(|_| policy.is_enabled())
            .map(|capacity| {
                Mutex::new(DomainState {
                    entries: LruCache::new(capacity),
                    in_flight: HashMap::new(),
                })
            });

        Self {
            inner: Arc::new(DomainInner {
                name,
                policy,
                state,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.is_some()
    }

    /// Number of stored entries, including expired ones not yet looked up.
    pub fn len(&self) -> usize {
        self.inner
            .state
            .as_ref()
            .map(|state| mutex_lock(state, self.inner.name, "len").entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a live entry exists for `key`. Does not touch recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        let Some(state) = self.inner.state.as_ref() else {
            return false;
        };
        let guard = mutex_lock(state, self.inner.name, "contains");
        guard
            .entries
            .peek(key)
            .is_some_and(|entry| entry.is_live(Instant::now()))
    }

    /// Number of computations currently running.
    pub fn in_flight(&self) -> usize {
        self.inner
            .state
            .as_ref()
            .map(|state| mutex_lock(state, self.inner.name, "in_flight").in_flight.len())
            .unwrap_or(0)
    }

    /// Return the live entry for `key`, join the computation already running
    /// for it, or start `compute` and share its result.
    ///
    /// The computation runs on its own task: dropping the returned future
    /// stops waiting but never cancels the computation. Only `Ok` results are
    /// stored. When the domain is disabled `compute` runs inline on every call.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let Some(state) = self.inner.state.as_ref() else {
            return compute().await.map_err(CacheError::Compute);
        };

        let receiver = {
            let mut guard = mutex_lock(state, self.inner.name, "get_or_compute");
            let now = Instant::now();

            let mut expired = false;
            let live = match guard.entries.get(&key) {
                Some(entry) if entry.is_live(now) => Some(entry.payload.clone()),
                Some(_) => {
                    expired = true;
                    None
                }
                None => None,
            };

            if let Some(payload) = live {
                drop(guard);
                self.record(METRIC_CACHE_HIT);
                debug!(domain = self.inner.name, key = key.value(), outcome = "hit");
                return Ok(payload);
            }

            if expired {
                guard.entries.pop(&key);
            }

            if let Some(receiver) = guard.in_flight.get(&key) {
                let receiver = receiver.clone();
                drop(guard);
                self.record(METRIC_CACHE_COALESCED);
                debug!(
                    domain = self.inner.name,
                    key = key.value(),
                    outcome = "coalesced"
                );
                receiver
            } else {
                let (sender, receiver) = watch::channel(None);
                guard.in_flight.insert(key, receiver.clone());
                drop(guard);
                self.record(METRIC_CACHE_MISS);
                debug!(
                    domain = self.inner.name,
                    key = key.value(),
                    expired,
                    outcome = "miss"
                );
                self.spawn_flight(key, sender, compute);
                receiver
            }
        };

        wait_for(receiver).await
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but give up waiting after
    /// `timeout` with [`CacheError::Cancelled`].
    pub async fn get_or_compute_within<F, Fut>(
        &self,
        key: CacheKey,
        timeout: Duration,
        compute: F,
    ) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        match tokio::time::timeout(timeout, self.get_or_compute(key, compute)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(
                    domain = self.inner.name,
                    key = key.value(),
                    timeout_ms = timeout.as_millis() as u64,
                    "stopped waiting for cached computation"
                );
                Err(CacheError::Cancelled)
            }
        }
    }

    fn spawn_flight<F, Fut>(&self, key: CacheKey, sender: watch::Sender<Outcome<V, E>>, compute: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let mut flight = Flight {
            domain: self.clone(),
            key,
            sender: Some(sender),
        };
        tokio::spawn(async move {
            let outcome = compute().await;
            flight.complete(outcome);
        });
    }

    fn record(&self, metric: &'static str) {
        counter!(metric, "domain" => self.inner.name).increment(1);
    }
}

/// Owner of one in-flight computation. Dropping it without completing (the
/// computation panicked) releases the key and wakes waiters with
/// [`CacheError::Aborted`].
struct Flight<V, E> {
    domain: CacheDomain<V, E>,
    key: CacheKey,
    sender: Option<watch::Sender<Outcome<V, E>>>,
}

impl<V, E> Flight<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn complete(&mut self, outcome: Result<V, E>) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        let inner = &self.domain.inner;

        let mut evicted = false;
        if let Some(state) = inner.state.as_ref() {
            let mut guard = mutex_lock(state, inner.name, "complete");
            if let Ok(payload) = &outcome {
                let created_at = Instant::now();
                let expires_at = created_at
                    .checked_add(inner.policy.ttl)
                    .unwrap_or(created_at);
                let entry = CacheEntry {
                    payload: payload.clone(),
                    created_at,
                    expires_at,
                };
                evicted = guard
                    .entries
                    .push(self.key, entry)
                    .is_some_and(|(previous, _)| previous != self.key);
            }
            guard.in_flight.remove(&self.key);
        }

        if evicted {
            self.domain.record(METRIC_CACHE_EVICT);
        }
        debug!(
            domain = inner.name,
            key = self.key.value(),
            stored = outcome.is_ok(),
            evicted,
            "cached computation finished"
        );
        sender.send_replace(Some(outcome));
    }
}

impl<V, E> Drop for Flight<V, E> {
    fn drop(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        let inner = &self.domain.inner;
        if let Some(state) = inner.state.as_ref() {
            mutex_lock(state, inner.name, "abort").in_flight.remove(&self.key);
        }
        warn!(
            domain = inner.name,
            key = self.key.value(),
            "cached computation aborted without a result"
        );
    }
}

async fn wait_for<V, E>(mut receiver: watch::Receiver<Outcome<V, E>>) -> Result<V, CacheError<E>>
where
    V: Clone,
    E: Clone,
{
    loop {
        let current = receiver.borrow_and_update().clone();
        if let Some(outcome) = current {
            return outcome.map_err(CacheError::Compute);
        }
        if receiver.changed().await.is_err() {
            let last = receiver.borrow().clone();
            return match last {
                Some(outcome) => outcome.map_err(CacheError::Compute),
                None => Err(CacheError::Aborted),
            };
        }
    }
}
