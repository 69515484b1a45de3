//! Per-organization TTL cache with tag invalidation
//!
//! Entries carry an absolute expiry (no sliding expiration) and a tag set.
//! Expired entries are misses and are dropped on access or by the periodic
//! sweep. Capacity is enforced by evicting the oldest entries by creation.
//!
//! `deduplicate` shares one in-flight computation among concurrent callers
//! with the same key; the shared future leaves the in-flight table once it
//! resolves.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::CoreError;
use crate::models::OrgId;

type InFlight<V> = Shared<BoxFuture<'static, Result<V, CoreError>>>;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub tags: HashSet<String>,
    /// Insertion order, breaks ties between equal creation instants
    seq: u64,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub expirations: u64,
    /// Callers that joined an in-flight computation
    pub shared_waits: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn merge(&mut self, other: &CacheStats) {
        self.entries += other.entries;
        self.hits += other.hits;
        self.misses += other.misses;
        self.evictions += other.evictions;
        self.invalidations += other.invalidations;
        self.expirations += other.expirations;
        self.shared_waits += other.shared_waits;
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
    expirations: AtomicU64,
    shared_waits: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// TTL cache scoped to one organization
pub struct CacheManager<V> {
    org_id: OrgId,
    entries: DashMap<String, CacheEntry<V>>,
    in_flight: DashMap<String, InFlight<V>>,
    max_entries: usize,
    seq: AtomicU64,
    counters: Counters,
}

impl<V> CacheManager<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(org_id: OrgId, max_entries: usize) -> Self {
        Self {
            org_id,
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            max_entries: max_entries.max(1),
            seq: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn org_id(&self) -> &OrgId {
        &self.org_id
    }

    /// Store a value; overwriting a key replaces its expiry and tags
    pub fn set<I, S>(&self, key: impl Into<String>, value: V, ttl: Duration, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Instant::now();
        let key = key.into();
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: now + ttl,
            tags: tags.into_iter().map(Into::into).collect(),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        trace!(org = %self.org_id, key = %key, ttl_secs = ttl.as_secs(), "Cache set");
        self.entries.insert(key, entry);
        self.enforce_max_size();
    }

    /// Value for `key` if present and not expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                Counters::bump(&self.counters.hits, 1);
                debug!(org = %self.org_id, key, "Cache hit");
                return Some(entry.value.clone());
            }
        }

        // Guard released above; drop the expired entry if it is still there
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            Counters::bump(&self.counters.expirations, 1);
        }
        Counters::bump(&self.counters.misses, 1);
        debug!(org = %self.org_id, key, "Cache miss");
        None
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|e| !e.is_expired(Instant::now()))
    }

    /// Remove entries whose tags intersect `tags`; returns the count removed
    pub fn invalidate_tags<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !tags.iter().any(|t| entry.tags.contains(t.as_ref())));
        let removed = before.saturating_sub(self.entries.len());
        Counters::bump(&self.counters.invalidations, removed as u64);
        removed
    }

    /// Remove every entry; returns the count removed
    pub fn clear(&self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        Counters::bump(&self.counters.invalidations, removed as u64);
        removed
    }

    /// Evict strictly oldest-by-creation entries until within capacity
    pub fn enforce_max_size(&self) -> usize {
        let excess = self.entries.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return 0;
        }

        let mut by_age: Vec<(Instant, u64, String)> = self
            .entries
            .iter()
            .map(|e| (e.created_at, e.seq, e.key().clone()))
            .collect();
        by_age.sort();

        let mut evicted = 0;
        for (_, _, key) in by_age.into_iter().take(excess) {
            if self.entries.remove(&key).is_some() {
                evicted += 1;
            }
        }
        Counters::bump(&self.counters.evictions, evicted as u64);
        debug!(org = %self.org_id, evicted, "Cache over capacity, evicted oldest entries");
        evicted
    }

    /// Drop expired entries; returns the count removed
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        Counters::bump(&self.counters.expirations, removed as u64);
        removed
    }

    /// Run `producer` once for all concurrent callers with the same key
    ///
    /// The first caller's producer runs; callers arriving while it is in
    /// flight await the same result. Errors are shared the same way.
    pub async fn deduplicate<F, Fut>(&self, key: &str, producer: F) -> Result<V, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, CoreError>> + Send + 'static,
    {
        let shared = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                Counters::bump(&self.counters.shared_waits, 1);
                debug!(org = %self.org_id, key, "Joining in-flight computation");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let fut = producer().boxed().shared();
                slot.insert(fut.clone());
                fut
            }
        };

        let result = shared.clone().await;
        self.in_flight
            .remove_if(key, |_, current| current.ptr_eq(&shared));
        result
    }

    /// Number of computations currently in flight
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Live entry count (may include not-yet-swept expired entries)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStats {
            entries: self.entries.len(),
            hits: load(&self.counters.hits),
            misses: load(&self.counters.misses),
            evictions: load(&self.counters.evictions),
            invalidations: load(&self.counters.invalidations),
            expirations: load(&self.counters.expirations),
            shared_waits: load(&self.counters.shared_waits),
        }
    }
}
