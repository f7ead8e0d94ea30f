//! Per-tenant configuration cache (spec §4.4). Mirrors the gateway's
//! `RouterState::config_lock: Arc<RwLock<Arc<Config>>>` pattern of holding a
//! lock only long enough to clone, generalised to per-tenant keys and two
//! parallel maps (connectors, LLM providers).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::connector::config::ConnectorConfig;
use crate::llm::LLMProviderConfig;

const MIN_TTL: Duration = Duration::from_secs(30);

/// Where a resolved configuration list came from. The cache remembers the
/// source that produced each entry, so a hit reports the entry's true
/// origin rather than a fixed tag (spec §9 Open Question — this deviates
/// from the literal "cache hits are always tagged database" reading, which
/// the specification itself flags as likely unintentional).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Database,
    Store,
    File,
    Env,
}

impl ConfigSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Store => "store",
            Self::File => "file",
            Self::Env => "env",
        }
    }
}

/// TTL-bounded cached value (spec §3 `CacheEntry<T>`).
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: Instant,
    pub last_update: Instant,
    pub source: ConfigSource,
}

impl<T> CacheEntry<T> {
    fn new(value: T, ttl: Duration, source: ConfigSource) -> Self {
        let now = Instant::now();
        Self {
            value,
            expires_at: now + ttl,
            last_update: now,
            source,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Hit/miss/eviction counters, guarded separately from the map locks so
/// counter updates never block readers (spec §4.4, §5).
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_eviction(&self, n: u64) {
        self.evictions.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// `Hits / (Hits + Misses) * 100`, or 0 when no requests have occurred.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

type ConnectorMap = HashMap<String, CacheEntry<Vec<ConnectorConfig>>>;
type ProviderMap = HashMap<String, CacheEntry<Vec<LLMProviderConfig>>>;

/// Per-tenant cache for resolved connector and LLM provider configs. One TTL
/// governs both maps; non-positive TTL is clamped to 30 s (spec §4.4).
pub struct TenantConfigCache {
    ttl: Duration,
    connectors: RwLock<ConnectorMap>,
    llm_providers: RwLock<ProviderMap>,
    stats: CacheStats,
}

impl TenantConfigCache {
    pub fn new(ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() { MIN_TTL } else { ttl };
        Self {
            ttl,
            connectors: RwLock::new(HashMap::new()),
            llm_providers: RwLock::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    pub async fn get_connectors(&self, tenant: &str) -> (Vec<ConnectorConfig>, Option<ConfigSource>) {
        let map = self.connectors.read().await;
        match map.get(tenant) {
            Some(entry) if !entry.is_expired() => {
                self.stats.record_hit();
                (entry.value.clone(), Some(entry.source))
            }
            _ => {
                self.stats.record_miss();
                (Vec::new(), None)
            }
        }
    }

    pub async fn get_llm_providers(&self, tenant: &str) -> (Vec<LLMProviderConfig>, Option<ConfigSource>) {
        let map = self.llm_providers.read().await;
        match map.get(tenant) {
            Some(entry) if !entry.is_expired() => {
                self.stats.record_hit();
                (entry.value.clone(), Some(entry.source))
            }
            _ => {
                self.stats.record_miss();
                (Vec::new(), None)
            }
        }
    }

    pub async fn set_connectors(&self, tenant: &str, configs: Vec<ConnectorConfig>, source: ConfigSource) {
        let mut map = self.connectors.write().await;
        map.insert(tenant.to_string(), CacheEntry::new(configs, self.ttl, source));
    }

    pub async fn set_llm_providers(&self, tenant: &str, providers: Vec<LLMProviderConfig>, source: ConfigSource) {
        let mut map = self.llm_providers.write().await;
        map.insert(tenant.to_string(), CacheEntry::new(providers, self.ttl, source));
    }

    /// `name` empty removes the whole tenant entry; otherwise filters that
    /// name out of the cached sequence, but only if the entry is still live
    /// — expired entries are left for `cleanup` (spec §4.4).
    pub async fn invalidate_connector(&self, tenant: &str, name: &str) {
        let mut map = self.connectors.write().await;
        if name.is_empty() {
            if map.remove(tenant).is_some() {
                self.stats.record_eviction(1);
            }
            return;
        }
        if let Some(entry) = map.get_mut(tenant) {
            if !entry.is_expired() {
                entry.value.retain(|c| c.name != name);
                self.stats.record_eviction(1);
            }
        }
    }

    pub async fn invalidate_llm_provider(&self, tenant: &str, provider: &str) {
        let mut map = self.llm_providers.write().await;
        if provider.is_empty() {
            if map.remove(tenant).is_some() {
                self.stats.record_eviction(1);
            }
            return;
        }
        if let Some(entry) = map.get_mut(tenant) {
            if !entry.is_expired() {
                entry.value.retain(|p| p.provider_name.as_str() != provider);
                self.stats.record_eviction(1);
            }
        }
    }

    pub async fn invalidate_all(&self) {
        let mut connectors = self.connectors.write().await;
        let mut providers = self.llm_providers.write().await;
        let n = connectors.len() + providers.len();
        connectors.clear();
        providers.clear();
        self.stats.record_eviction(n as u64);
    }

    /// Remove all expired entries from both maps; returns the count
    /// evicted. Intended for a periodic sweep (spec §4.4, §4.7
    /// `start_periodic_cleanup`).
    pub async fn cleanup(&self) -> u64 {
        let mut evicted = 0u64;
        {
            let mut map = self.connectors.write().await;
            let before = map.len();
            map.retain(|_, entry| !entry.is_expired());
            evicted += (before - map.len()) as u64;
        }
        {
            let mut map = self.llm_providers.write().await;
            let before = map.len();
            map.retain(|_, entry| !entry.is_expired());
            evicted += (before - map.len()) as u64;
        }
        if evicted > 0 {
            self.stats.record_eviction(evicted);
        }
        evicted
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn hit_rate(&self) -> f64 {
        self.stats.hit_rate()
    }

    /// Spawn a background task that calls `cleanup()` on `interval` until
    /// `shutdown` is cancelled (spec §4.7, §9 "Background cleanup"; mirrors
    /// the gateway's own `tokio::select!`-shaped background task in
    /// `main.rs`).
    pub fn start_periodic_cleanup(
        self: Arc<Self>,
        interval: Duration,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = self.cleanup().await;
                        if evicted > 0 {
                            tracing::debug!(evicted, "cache cleanup sweep");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        tracing::info!("cache cleanup task shutting down");
                        break;
                    }
                }
            }
        })
    }
}
