//! Keyed connection pool with idle reaping
//!
//! One live client per [`ConnectionKey`]. Every lookup, insert and eviction
//! happens under a single pool-wide lock; queries run outside it on an
//! `Arc` clone of the client.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::CollectError;
use crate::client::{ConnectParams, ConnectionKey, Connector, QueryClient};

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum time a connection can sit around unused
    pub max_idle: Duration,
    /// How frequently idle connections are checked
    pub reap_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: Duration::from_secs(30 * 60),
            reap_interval: Duration::from_secs(15 * 60),
        }
    }
}

impl PoolConfig {
    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }
}

impl From<&idc_config::PoolSettings> for PoolConfig {
    fn from(settings: &idc_config::PoolSettings) -> Self {
        Self {
            max_idle: Duration::from_secs(settings.max_idle_secs),
            reap_interval: Duration::from_secs(settings.reap_interval_secs),
        }
    }
}

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub connections_created: u64,
    pub connections_reused: u64,
    pub connections_evicted: u64,
    pub close_failures: u64,
}

#[derive(Debug, Default)]
struct AtomicPoolStats {
    connections_created: AtomicU64,
    connections_reused: AtomicU64,
    connections_evicted: AtomicU64,
    close_failures: AtomicU64,
}

impl AtomicPoolStats {
    fn record_created(&self) {
        self.connections_created.fetch_add(1, Ordering::Relaxed);
    }

    fn record_reused(&self) {
        self.connections_reused.fetch_add(1, Ordering::Relaxed);
    }

    fn record_evicted(&self) {
        self.connections_evicted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_close_failure(&self) {
        self.close_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            connections_created: self.connections_created.load(Ordering::Relaxed),
            connections_reused: self.connections_reused.load(Ordering::Relaxed),
            connections_evicted: self.connections_evicted.load(Ordering::Relaxed),
            close_failures: self.close_failures.load(Ordering::Relaxed),
        }
    }
}

struct PoolEntry {
    client: Arc<dyn QueryClient>,
    last_used: Instant,
}

impl PoolEntry {
    /// Idle past the threshold and not held by any caller
    fn is_reapable(&self, now: Instant, max_idle: Duration) -> bool {
        now.saturating_duration_since(self.last_used) > max_idle
            && Arc::strong_count(&self.client) == 1
    }
}

/// A client borrowed from the pool for the duration of a query
#[derive(Clone)]
pub struct PooledClient {
    key: ConnectionKey,
    client: Arc<dyn QueryClient>,
}

impl PooledClient {
    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Whether both borrow the same pooled client
    pub fn same_client(&self, other: &PooledClient) -> bool {
        Arc::ptr_eq(&self.client, &other.client)
    }
}

impl Deref for PooledClient {
    type Target = dyn QueryClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

/// Connection pool keyed by endpoint and credentials
pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    config: PoolConfig,
    entries: Mutex<HashMap<ConnectionKey, PoolEntry>>,
    stats: AtomicPoolStats,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn Connector>, config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            connector,
            config,
            entries: Mutex::new(HashMap::new()),
            stats: AtomicPoolStats::default(),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Return the pooled client for these params, connecting on first use.
    ///
    /// The lock is held across lookup, connect and insert so concurrent
    /// callers with the same new key construct exactly one client.
    pub async fn acquire(&self, params: &ConnectParams) -> Result<PooledClient, CollectError> {
        let key = params.key();
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(&key) {
            entry.last_used = Instant::now();
            self.stats.record_reused();
            debug!(connection = %key, "Reusing pooled connection");
            return Ok(PooledClient {
                key,
                client: Arc::clone(&entry.client),
            });
        }

        let client = self
            .connector
            .connect(params)
            .await
            .map_err(|source| CollectError::Connection {
                address: params.address.clone(),
                source,
            })?;

        self.stats.record_created();
        debug!(connection = %key, "Opened new connection");

        entries.insert(
            key.clone(),
            PoolEntry {
                client: Arc::clone(&client),
                last_used: Instant::now(),
            },
        );

        Ok(PooledClient { key, client })
    }

    /// Evict connections idle longer than `max_idle`, as of now
    pub async fn reap_idle(&self) -> usize {
        self.reap_idle_at(Instant::now()).await
    }

    /// Evict connections idle longer than `max_idle` as of `now`.
    ///
    /// Entries are evicted one at a time, each under the pool lock. A close
    /// failure is logged and the entry is still dropped.
    pub async fn reap_idle_at(&self, now: Instant) -> usize {
        let max_idle = self.config.max_idle;
        let candidates: Vec<ConnectionKey> = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .filter(|(_, entry)| entry.is_reapable(now, max_idle))
                .map(|(key, _)| key.clone())
                .collect()
        };

        let mut evicted = 0;
        for key in candidates {
            let mut entries = self.entries.lock().await;

            // Re-check: an acquire may have refreshed it since the scan
            let reapable = entries
                .get(&key)
                .is_some_and(|entry| entry.is_reapable(now, max_idle));
            if !reapable {
                continue;
            }

            if let Some(entry) = entries.remove(&key) {
                if let Err(e) = entry.client.close().await {
                    self.stats.record_close_failure();
                    warn!(connection = %key, error = %e, "Failed to close idle connection");
                }
                self.stats.record_evicted();
                evicted += 1;
                debug!(connection = %key, "Evicted idle connection");
            }
        }

        evicted
    }

    /// Spawn the periodic reaper.
    ///
    /// The task holds only a weak reference and exits once the pool is dropped
    /// or the handle is stopped.
    pub fn start(self: &Arc<Self>) -> ReaperHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let pool: Weak<Self> = Arc::downgrade(self);
        let period = self.config.reap_interval;

        info!(
            reap_interval_secs = period.as_secs(),
            max_idle_secs = self.config.max_idle.as_secs(),
            "Starting connection reaper"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(pool) = pool.upgrade() else { break };
                        let evicted = pool.reap_idle().await;
                        if evicted > 0 {
                            let remaining = pool.len().await;
                            debug!(evicted, remaining, "Reaper pass finished");
                        }
                    }
                }
            }

            debug!("Connection reaper stopped");
        });

        ReaperHandle { token, task }
    }

    /// Number of live connections
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn contains(&self, key: &ConnectionKey) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    /// When the connection for `key` was last handed out
    pub async fn last_used(&self, key: &ConnectionKey) -> Option<Instant> {
        self.entries.lock().await.get(key).map(|e| e.last_used)
    }

    pub fn stats(&self) -> PoolStats {
        self.stats.snapshot()
    }
}

/// Handle to the background reaper task
pub struct ReaperHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Ask the reaper to stop after its current pass
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the reaper and wait for it to exit
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Connection reaper task failed");
        }
    }
}
