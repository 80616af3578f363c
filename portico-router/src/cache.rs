//! Per-tenant URL map cache.
//!
//! Compiling a map walks every rule, so the dispatcher keeps one compiled
//! [`UrlMap`] per tenant id and rebuilds only on a miss. The cache does not
//! watch for route changes; callers that mutate the route set must
//! [`invalidate`](AdapterCache::invalidate) or [`clear`](AdapterCache::clear)
//! explicitly.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::RouterResult;
use crate::map::UrlMap;
use crate::route::Route;
use crate::tenant::Tenant;

/// Hit and miss counters of an [`AdapterCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheMetrics {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that compiled a fresh map.
    pub misses: u64,
    /// Entries dropped by `invalidate` or `clear`.
    pub invalidations: u64,
}

/// Caches compiled URL maps keyed by tenant id.
#[derive(Debug, Default)]
pub struct AdapterCache {
    maps: RwLock<HashMap<i64, Arc<UrlMap>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl AdapterCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the tenant's compiled map, building it on first use.
    pub fn get_or_build(&self, tenant: &Tenant, app_routes: &[Route]) -> RouterResult<Arc<UrlMap>> {
        if let Some(map) = self.maps.read().get(&tenant.id) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(map));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let map = Arc::new(UrlMap::build(tenant, app_routes)?);

        let mut maps = self.maps.write();
        // A racing builder may have won; keep the first one in.
        let entry = maps.entry(tenant.id).or_insert_with(|| Arc::clone(&map));
        Ok(Arc::clone(entry))
    }

    /// Drop one tenant's cached map.
    pub fn invalidate(&self, tenant_id: i64) {
        if self.maps.write().remove(&tenant_id).is_some() {
            self.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!(tenant = tenant_id, "url map invalidated");
        }
    }

    /// Drop every cached map.
    pub fn clear(&self) {
        let mut maps = self.maps.write();
        let dropped = maps.len() as u64;
        maps.clear();
        if dropped > 0 {
            self.invalidations.fetch_add(dropped, Ordering::Relaxed);
            debug!(dropped, "url map cache cleared");
        }
    }

    /// Number of cached maps.
    pub fn len(&self) -> usize {
        self.maps.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.maps.read().is_empty()
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}
