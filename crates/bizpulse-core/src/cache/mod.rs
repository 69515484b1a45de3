//! Caching layer for bizpulse-core
//!
//! In-process, organization-scoped TTL caches with tag invalidation and
//! single-flight deduplication. Cache operations never fail toward callers.

pub mod manager;
pub mod registry;

pub use manager::{CacheEntry, CacheManager, CacheStats};
pub use registry::{CacheRegistry, InvalidationScope, InvalidationTrigger};
