// src/services/cache.rs
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::yahoo::MarketDataSource;
use crate::models::TickerData;
use crate::BoxError;

#[derive(Debug, Clone)]
struct CachedTicker {
    data: Arc<TickerData>,
    fetched_at: DateTime<Utc>,
}

/// Read-through cache of fetched ticker data, keyed by normalized symbol.
/// Entries older than `ttl` are refetched on the next lookup.
pub struct TickerCache {
    source: Arc<dyn MarketDataSource>,
    // None when the configured TTL is too large to represent: entries never expire.
    ttl: Option<Duration>,
    entries: RwLock<HashMap<String, CachedTicker>>,
    fetch_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn is_fresh(entry: &CachedTicker, cutoff: Option<DateTime<Utc>>) -> bool {
    cutoff.map_or(true, |cutoff| entry.fetched_at > cutoff)
}

impl TickerCache {
    pub fn new(source: Arc<dyn MarketDataSource>, ttl: std::time::Duration) -> Self {
        let ttl = match Duration::from_std(ttl) {
            Ok(ttl) => Some(ttl),
            Err(_) => {
                warn!("Cache TTL of {}s is out of range, entries will never expire", ttl.as_secs());
                None
            }
        };
        Self {
            source,
            ttl,
            entries: RwLock::new(HashMap::new()),
            fetch_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Entries fetched at or before this instant are stale. `None` means
    /// nothing can be stale yet.
    fn cutoff(&self) -> Option<DateTime<Utc>> {
        self.ttl.and_then(|ttl| Utc::now().checked_sub_signed(ttl))
    }

    async fn lookup(&self, key: &str) -> Option<Arc<TickerData>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if is_fresh(entry, self.cutoff()) {
            return Some(entry.data.clone());
        }
        if let Some(expiry) = self.ttl.and_then(|ttl| entry.fetched_at.checked_add_signed(ttl)) {
            debug!("Cache entry for {} expired at {}", key, expiry);
        }
        None
    }

    async fn fetch_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.fetch_locks
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    async fn fetch(&self, key: &str) -> Result<TickerData, BoxError> {
        info!("Fetching market data for {}", key);
        let snapshot = self.source.fetch_snapshot(key).await?;
        let history = self.source.fetch_history(key).await?;
        let news = self.source.fetch_news(key).await?;
        Ok(TickerData {
            snapshot,
            history,
            news,
        })
    }

    /// Cached data for `symbol`, fetching snapshot, history and news in turn
    /// when the entry is missing, stale or `force_refresh` is set.
    ///
    /// Concurrent misses for the same symbol share one fetch.
    pub async fn get(&self, symbol: &str, force_refresh: bool) -> Result<Arc<TickerData>, BoxError> {
        let key = normalize_symbol(symbol);
        if key.is_empty() {
            return Err("Ticker symbol must not be empty".into());
        }

        if !force_refresh {
            if let Some(data) = self.lookup(&key).await {
                debug!("Cache hit for {}", key);
                return Ok(data);
            }
        }

        let lock = self.fetch_lock(&key).await;
        let _guard = lock.lock().await;
        if !force_refresh {
            if let Some(data) = self.lookup(&key).await {
                debug!("{} was fetched by a concurrent lookup", key);
                return Ok(data);
            }
        }

        let fetched = self.fetch(&key).await;
        self.fetch_locks.lock().await.remove(&key);
        let data = Arc::new(fetched?);

        let cutoff = self.cutoff();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| is_fresh(entry, cutoff));
        if entries.len() < before {
            debug!("Dropped {} expired cache entries", before - entries.len());
        }
        entries.insert(
            key,
            CachedTicker {
                data: data.clone(),
                fetched_at: Utc::now(),
            },
        );

        Ok(data)
    }

    pub async fn invalidate(&self, symbol: &str) -> bool {
        let key = normalize_symbol(symbol);
        let removed = self.entries.write().await.remove(&key).is_some();
        if removed {
            info!("Evicted {} from cache", key);
        }
        removed
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let cutoff = self.cutoff();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| is_fresh(entry, cutoff));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
