//! Caching of resolved plans.
//!
//! Plans are pure functions of definitions and schemas, so a cached plan is
//! valid exactly as long as the schema source reports the same version.

use crate::resolver::ResolvedJoinPlan;
use sqlassoc_core::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Plan cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanCacheConfig {
    /// Maximum number of cached plans; 0 disables caching
    pub capacity: usize,
}

impl Default for PlanCacheConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[derive(Debug, Clone)]
struct CachedPlan {
    plan: Arc<ResolvedJoinPlan>,
    /// Value of the access clock at the last hit or insert
    last_used: u64,
}

/// LRU cache of resolved plans keyed by `(source, association)`.
///
/// The cache remembers the schema version its entries were resolved
/// against and drops all of them when asked for a different version.
///
/// # Example
///
/// ```
/// use sqlassoc_assoc::{PlanCache, PlanCacheConfig};
///
/// let mut cache = PlanCache::new(PlanCacheConfig { capacity: 8 });
/// assert!(cache.is_empty());
/// cache.invalidate();
/// assert_eq!(cache.len(), 0);
/// ```
#[derive(Debug)]
pub struct PlanCache {
    entries: HashMap<(String, String), CachedPlan>,
    capacity: usize,
    version: Option<u64>,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl PlanCache {
    pub fn new(config: PlanCacheConfig) -> Self {
        Self {
            entries: HashMap::with_capacity(config.capacity.min(256)),
            capacity: config.capacity,
            version: None,
            clock: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Get the cached plan or resolve and insert it.
    ///
    /// `resolve` runs only on a miss; failures are returned and not cached.
    pub fn get_or_resolve(
        &mut self,
        version: u64,
        source: &str,
        association: &str,
        resolve: impl FnOnce() -> Result<ResolvedJoinPlan>,
    ) -> Result<Arc<ResolvedJoinPlan>> {
        if self.version != Some(version) {
            if !self.entries.is_empty() {
                tracing::debug!(
                    old = ?self.version,
                    new = version,
                    dropped = self.entries.len(),
                    "Schema version changed, invalidating plan cache"
                );
            }
            self.entries.clear();
            self.version = Some(version);
        }

        self.clock += 1;
        let key = (source.to_string(), association.to_string());
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_used = self.clock;
            self.hits += 1;
            return Ok(Arc::clone(&entry.plan));
        }

        self.misses += 1;
        let plan = Arc::new(resolve()?);
        if self.capacity == 0 {
            return Ok(plan);
        }
        if self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        self.entries.insert(
            key,
            CachedPlan {
                plan: Arc::clone(&plan),
                last_used: self.clock,
            },
        );
        Ok(plan)
    }

    /// Check if a plan is cached (regardless of version).
    pub fn contains(&self, source: &str, association: &str) -> bool {
        self.entries
            .contains_key(&(source.to_string(), association.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Drop every cached plan.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.version = None;
    }

    fn evict_lru(&mut self) {
        if let Some(lru) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| key.clone())
        {
            self.entries.remove(&lru);
        }
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new(PlanCacheConfig::default())
    }
}
