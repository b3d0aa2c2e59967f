//! In-memory TTL memoisation of published series.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::{Coordinate, SeriesKind};

/// Cache identity of a query. Coordinates are rounded to 0.01°, which is what
/// makes jittery repeats of the same query hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey {
    lat_centi: i64,
    lon_centi: i64,
    days: u32,
    kind: SeriesKind,
}

impl QueryKey {
    pub fn new(coordinate: Coordinate, days: u32, kind: SeriesKind) -> Self {
        let (lat_centi, lon_centi) = coordinate.centi_degrees();
        Self {
            lat_centi,
            lon_centi,
            days,
            kind,
        }
    }
}

impl Display for QueryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{:.2}-{:.2}-{}",
            self.kind,
            self.lat_centi as f64 / 100.0,
            self.lon_centi as f64 / 100.0,
            self.days
        )
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    inserted_at: Instant,
    payload: T,
}

/// Thread-safe TTL cache.
///
/// Stale entries are treated as misses and are replaced by the next `put`;
/// nothing evicts them in the background.
#[derive(Debug, Clone)]
pub struct ResultCache<T> {
    inner: Arc<tokio::sync::RwLock<HashMap<QueryKey, CacheEntry<T>>>>,
    ttl: Duration,
}

impl<T: Clone> ResultCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(tokio::sync::RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Returns the payload only while `now - inserted_at < ttl`.
    pub async fn get(&self, key: &QueryKey) -> Option<T> {
        let store = self.inner.read().await;
        store.get(key).and_then(|entry| {
            if entry.inserted_at.elapsed() < self.ttl {
                Some(entry.payload.clone())
            } else {
                None
            }
        })
    }

    pub async fn put(&self, key: QueryKey, payload: T) {
        let mut store = self.inner.write().await;
        store.insert(
            key,
            CacheEntry {
                inserted_at: Instant::now(),
                payload,
            },
        );
    }

    /// Number of entries, stale ones included.
    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}
