//! Concurrent cache store with TTL and capacity eviction.

use crate::key::CacheKey;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use selheal_core_types::LocatorInfo;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Cache sizing and expiry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            capacity: 500,
        }
    }
}

/// One cached healing decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub locator: LocatorInfo,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(locator: LocatorInfo, confidence: f64) -> Self {
        Self {
            locator,
            confidence,
            created_at: Utc::now(),
        }
    }
}

/// Serializable cache contents for the persistence boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheBundle {
    pub exported_at: DateTime<Utc>,
    pub entries: Vec<(CacheKey, CacheEntry)>,
}

/// Process-wide decision cache, safe under many concurrent callers.
///
/// A hit is tried immediately by the caller; when the cached selector
/// fails at use time the caller evicts it via `invalidate` and the
/// pipeline proceeds as a miss. Stale entries are never trusted
/// indefinitely.
#[derive(Debug)]
pub struct CacheStore {
    config: CacheConfig,
    entries: DashMap<CacheKey, CacheEntry>,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    /// Look up a prior decision; expired entries are evicted on read.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.get(key)?.clone();
        if self.is_expired(&entry) {
            drop(self.entries.remove(key));
            debug!(%key, "cache entry expired");
            return None;
        }
        Some(entry)
    }

    /// Store a decision; same key always converges to one entry.
    pub fn put(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
        if self.entries.len() > self.config.capacity {
            self.evict_to_capacity();
        }
    }

    /// Remove an entry whose selector failed at use time.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry resolving to the given selector. Used when
    /// feedback marks a healed selector as wrong, where the exact key
    /// is no longer known.
    pub fn invalidate_locator(&self, locator: &LocatorInfo) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.locator != *locator);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export live (non-expired) entries.
    pub fn export(&self) -> CacheBundle {
        let entries = self
            .entries
            .iter()
            .filter(|e| !self.is_expired(e.value()))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        CacheBundle {
            exported_at: Utc::now(),
            entries,
        }
    }

    /// Merge a previously exported bundle; expired entries are skipped.
    pub fn import(&self, bundle: CacheBundle) -> usize {
        let mut imported = 0;
        for (key, entry) in bundle.entries {
            if self.is_expired(&entry) {
                continue;
            }
            self.entries.insert(key, entry);
            imported += 1;
        }
        if self.entries.len() > self.config.capacity {
            self.evict_to_capacity();
        }
        imported
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        let ttl = ChronoDuration::from_std(self.config.ttl).unwrap_or(ChronoDuration::MAX);
        Utc::now().signed_duration_since(entry.created_at) >= ttl
    }

    /// Drop lowest-confidence entries first, oldest first within a
    /// confidence tie, until back under capacity.
    fn evict_to_capacity(&self) {
        let overflow = self.entries.len().saturating_sub(self.config.capacity);
        if overflow == 0 {
            return;
        }
        let mut ranked: Vec<(CacheKey, f64, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().confidence, e.value().created_at))
            .collect();
        ranked.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.2.cmp(&b.2))
        });
        for (key, _, _) in ranked.into_iter().take(overflow) {
            debug!(%key, "cache entry evicted for capacity");
            self.entries.remove(&key);
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
