//! Content-addressed TTL cache for external lookup results.
//!
//! Keys are `source + ":" + sha256(canonical JSON of params)`, so identical
//! parameters always hit the same entry regardless of field ordering. TTLs
//! resolve from a per-source configuration table, defaulting to one hour for
//! unconfigured sources. State is in-memory and process scoped.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::errors::{ScoreError, ScoreResult};
use crate::domain::models::config::CacheConfig;

/// One cached value.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    pub ttl: Duration,
    pub hits: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now - self.timestamp;
        age.to_std().map_or(false, |age| age > self.ttl)
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Percentage, `hits / (hits + misses) * 100`; 0 when no lookups yet.
    pub hit_ratio: f64,
}

/// TTL cache shared by every engine in the process.
pub struct TtlCache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    refresh_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TtlCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refresh_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// TTL for a source, from the per-source table or the default.
    fn ttl_for(&self, source: &str) -> Duration {
        let secs = self
            .config
            .ttl_by_source
            .get(source)
            .copied()
            .unwrap_or(self.config.default_ttl_secs);
        Duration::from_secs(secs)
    }

    /// Look up a cached value. Expired entries are deleted on read and count
    /// as misses, as do entries whose stored value no longer deserializes.
    pub async fn get<T, P>(&self, source: &str, params: &P) -> Option<T>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let key = cache_key(source, params)?;
        let now = Utc::now();

        let mut entries = self.entries.write().await;
        let data = match entries.get(&key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.data.clone()),
            Some(_) => {
                entries.remove(&key);
                debug!(source, key, "expired cache entry removed on read");
                None
            }
            None => None,
        };

        if let Some(data) = data {
            match serde_json::from_value(data) {
                Ok(value) => {
                    if let Some(entry) = entries.get_mut(&key) {
                        entry.hits += 1;
                    }
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(value);
                }
                Err(err) => {
                    warn!(source, key, error = %err, "cached value failed to deserialize, entry dropped");
                    entries.remove(&key);
                }
            }
        }
        drop(entries);

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value with the source's configured TTL.
    pub async fn set<T, P>(&self, source: &str, params: &P, data: &T)
    where
        T: Serialize + ?Sized,
        P: Serialize + ?Sized,
    {
        let Some(key) = cache_key(source, params) else {
            return;
        };
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(err) => {
                warn!(source, error = %err, "value not cacheable, skipping set");
                return;
            }
        };

        let entry = CacheEntry {
            key: key.clone(),
            data: value,
            timestamp: Utc::now(),
            ttl: self.ttl_for(source),
            hits: 0,
        };

        let mut entries = self.entries.write().await;
        entries.insert(key, entry);
    }

    /// Remove one entry.
    pub async fn invalidate<P>(&self, source: &str, params: &P)
    where
        P: Serialize + ?Sized,
    {
        if let Some(key) = cache_key(source, params) {
            let mut entries = self.entries.write().await;
            entries.remove(&key);
        }
    }

    /// Remove every entry belonging to a source.
    pub async fn invalidate_source(&self, source: &str) {
        let prefix = format!("{source}:");
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| !key.starts_with(&prefix));
    }

    /// Sweep expired entries; returns how many were removed.
    pub async fn clean_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Drop every entry. Hit/miss counters are preserved.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_ratio = if total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                hits as f64 / total as f64 * 100.0
            }
        };
        CacheStats {
            entries: entries.len(),
            hits,
            misses,
            hit_ratio,
        }
    }

    /// Periodically re-invoke `refresh_fn` and re-set the cached value.
    ///
    /// Refresh failures are logged, never propagated; the previous entry
    /// stays in place until it expires. The spawned task runs until
    /// [`TtlCache::shutdown`] aborts it.
    pub async fn schedule_refresh<P, F, Fut>(
        self: &Arc<Self>,
        source: &str,
        params: &P,
        refresh_fn: F,
        interval: Duration,
    ) where
        P: Serialize + ?Sized,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ScoreResult<Value>> + Send,
    {
        let cache = Arc::clone(self);
        let source = source.to_string();
        let params = match serde_json::to_value(params) {
            Ok(value) => value,
            Err(err) => {
                warn!(source, error = %err, "refresh params not serializable, not scheduling");
                return;
            }
        };

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; skip it so the initial refresh
            // happens one interval from now.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match refresh_fn().await {
                    Ok(data) => {
                        cache.set(&source, &params, &data).await;
                        debug!(source, "background refresh updated cache");
                    }
                    Err(err) => {
                        warn!(source, error = %err, "background refresh failed");
                    }
                }
            }
        });

        self.refresh_tasks.lock().await.push(handle);
    }

    /// Abort every background refresh task. Call on service shutdown.
    pub async fn shutdown(&self) {
        let mut tasks = self.refresh_tasks.lock().await;
        for handle in tasks.drain(..) {
            handle.abort();
        }
    }
}

/// Content-addressed key: `source:hex(sha256(canonical_json(params)))`.
///
/// Returns `None` only when params cannot be serialized at all.
fn cache_key<P>(source: &str, params: &P) -> Option<String>
where
    P: Serialize + ?Sized,
{
    let value = serde_json::to_value(params)
        .map_err(|err| {
            warn!(source, error = %err, "cache params not serializable");
            ScoreError::from(err)
        })
        .ok()?;
    let canonical = canonical_json(&value);
    let digest = Sha256::digest(canonical.as_bytes());
    Some(format!("{source}:{}", hex::encode(digest)))
}

/// JSON rendering with object keys sorted recursively, so logically equal
/// params always hash identically.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> = map
                .iter()
                .map(|(k, v)| (k, canonical_json(v)))
                .collect();
            let body: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{v}", serde_json::to_string(k).unwrap_or_default()))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}
