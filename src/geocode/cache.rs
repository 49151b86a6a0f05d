//! Session-scoped geocoding memo.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::Geocoder;
use crate::models::Coordinates;

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub unresolved: usize,
}

/// Address → result memo.
///
/// Both hits and misses are remembered, so an address reaches the provider
/// at most once per cache lifetime. Keys are the exact address strings.
#[derive(Debug, Default)]
pub struct GeocodeCache {
    entries: HashMap<String, Option<Coordinates>>,
    stats: CacheStats,
}

impl GeocodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an address through the cache.
    ///
    /// Provider errors are logged with the address and cached as `None`.
    pub async fn resolve<G: Geocoder>(&mut self, geocoder: &G, address: &str) -> Option<Coordinates> {
        if let Some(cached) = self.entries.get(address) {
            self.stats.hits += 1;
            return *cached;
        }

        self.stats.misses += 1;

        let result = if address.trim().is_empty() {
            None
        } else {
            match geocoder.geocode(address).await {
                Ok(Some(coords)) => Some(coords),
                Ok(None) => {
                    debug!("No geocoding match for '{}'", address);
                    None
                }
                Err(e) => {
                    warn!("Error geocoding '{}': {}", address, e);
                    None
                }
            }
        };

        if result.is_none() {
            self.stats.unresolved += 1;
        }

        self.entries.insert(address.to_string(), result);
        result
    }

    /// Cached result without calling the provider
    pub fn get(&self, address: &str) -> Option<Option<Coordinates>> {
        self.entries.get(address).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = CacheStats::default();
    }
}
