//! Walk pool
//!
//! Parks in-flight tree walks between listing pages so the next page can
//! resume the same producer instead of re-walking from the marker. Walks are
//! keyed by [`ListParams`], whose marker is the last name the previous page
//! returned.
//!
//! Each parked walk expires after [`PoolConfig::timeout`]; a janitor thread
//! sweeps expired walks and ends them so their producers release disk
//! handles.

use super::tree::TreeWalk;
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Default lifetime of a parked walk
pub const DEFAULT_POOL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default janitor sweep interval
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Default cap on parked walks
pub const DEFAULT_MAX_PARKED: usize = 50;

/// Identity of a listing continuation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListParams {
    pub bucket: String,
    pub recursive: bool,
    pub marker: String,
    pub prefix: String,
    pub heal: bool,
}

impl ListParams {
    pub fn new(bucket: &str, recursive: bool, marker: &str, prefix: &str, heal: bool) -> Self {
        Self {
            bucket: bucket.to_string(),
            recursive,
            marker: marker.to_string(),
            prefix: prefix.to_string(),
            heal,
        }
    }
}

/// Pool tuning
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// How long a walk may stay parked
    pub timeout: Duration,

    /// How often the janitor looks for expired walks
    pub sweep_interval: Duration,

    /// Upper bound on parked walks; the oldest is evicted past this
    pub max_entries: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POOL_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            max_entries: DEFAULT_MAX_PARKED,
        }
    }
}

/// Pool counters
#[derive(Debug, Default)]
pub struct PoolStats {
    pub parked: AtomicU64,
    pub resumed: AtomicU64,
    pub expired: AtomicU64,
    pub replaced: AtomicU64,
    pub evicted: AtomicU64,
}

impl PoolStats {
    pub fn parked(&self) -> u64 {
        self.parked.load(Ordering::Relaxed)
    }

    pub fn resumed(&self) -> u64 {
        self.resumed.load(Ordering::Relaxed)
    }

    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }
}

struct ParkedWalk {
    walk: TreeWalk,
    parked_at: Instant,
}

struct PoolState {
    walks: Mutex<HashMap<ListParams, ParkedWalk>>,
    config: PoolConfig,
    stats: PoolStats,
}

impl PoolState {
    /// End every expired walk, returning how many were removed
    fn sweep(&self) -> usize {
        let timeout = self.config.timeout;
        let expired: Vec<ParkedWalk> = {
            let mut walks = self.walks.lock();
            let keys: Vec<ListParams> = walks
                .iter()
                .filter(|(_, p)| p.parked_at.elapsed() >= timeout)
                .map(|(k, _)| k.clone())
                .collect();
            keys.iter().filter_map(|k| walks.remove(k)).collect()
        };

        let count = expired.len();
        for parked in expired {
            parked.walk.end();
        }
        if count > 0 {
            self.stats.expired.fetch_add(count as u64, Ordering::Relaxed);
            debug!(count, "Expired parked walks");
        }
        count
    }
}

/// Pool of parked walks, safe to share between listing calls
pub struct WalkPool {
    state: Arc<PoolState>,
    janitor: Option<JoinHandle<()>>,
    stop: Option<Sender<()>>,
}

impl WalkPool {
    /// Create a pool and start its janitor thread
    pub fn new(config: PoolConfig) -> io::Result<Self> {
        let state = Arc::new(PoolState {
            walks: Mutex::new(HashMap::new()),
            config,
            stats: PoolStats::default(),
        });

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let janitor_state = Arc::clone(&state);
        let interval = state.config.sweep_interval;
        let janitor = thread::Builder::new()
            .name("walk-pool-janitor".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        janitor_state.sweep();
                    }
                    _ => break,
                }
            })?;

        Ok(Self {
            state,
            janitor: Some(janitor),
            stop: Some(stop_tx),
        })
    }

    /// Take the walk parked under `params`, if any
    ///
    /// The entry is removed whether or not it has expired; an expired walk is
    /// ended and `None` returned.
    pub fn release(&self, params: &ListParams) -> Option<TreeWalk> {
        let parked = self.state.walks.lock().remove(params)?;
        if parked.parked_at.elapsed() >= self.state.config.timeout {
            parked.walk.end();
            self.state.stats.expired.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        self.state.stats.resumed.fetch_add(1, Ordering::Relaxed);
        trace!(bucket = %params.bucket, marker = %params.marker, "Resumed parked walk");
        Some(parked.walk)
    }

    /// Park `walk` under `params`
    ///
    /// A walk already parked under the same key is ended and replaced.
    pub fn store(&self, params: ListParams, walk: TreeWalk) {
        let mut ended = Vec::new();
        {
            let mut walks = self.state.walks.lock();
            let parked = ParkedWalk {
                walk,
                parked_at: Instant::now(),
            };
            if let Some(old) = walks.insert(params, parked) {
                self.state.stats.replaced.fetch_add(1, Ordering::Relaxed);
                ended.push(old);
            }

            while walks.len() > self.state.config.max_entries {
                let oldest = walks
                    .iter()
                    .min_by_key(|(_, p)| p.parked_at)
                    .map(|(k, _)| k.clone());
                let Some(key) = oldest else { break };
                if let Some(old) = walks.remove(&key) {
                    debug!(bucket = %key.bucket, marker = %key.marker, "Evicted oldest parked walk");
                    self.state.stats.evicted.fetch_add(1, Ordering::Relaxed);
                    ended.push(old);
                }
            }
        }
        self.state.stats.parked.fetch_add(1, Ordering::Relaxed);

        for old in ended {
            old.walk.end();
        }
    }

    /// End every expired walk now
    pub fn sweep(&self) -> usize {
        self.state.sweep()
    }

    /// Number of parked walks
    pub fn len(&self) -> usize {
        self.state.walks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> &PoolStats {
        &self.state.stats
    }

    /// Stop the janitor and end every parked walk
    pub fn shutdown(&mut self) {
        self.stop.take();
        if let Some(handle) = self.janitor.take() {
            let _ = handle.join();
        }
        let drained: Vec<ParkedWalk> = self.state.walks.lock().drain().map(|(_, p)| p).collect();
        for parked in drained {
            parked.walk.end();
        }
    }
}

impl Drop for WalkPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for WalkPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalkPool")
            .field("parked", &self.len())
            .field("config", &self.state.config)
            .finish()
    }
}
