//! Tree walker
//!
//! A lazy, depth-first walk over the namespace under a prefix, driven by a
//! [`ListDir`]. The walk runs on its own thread and hands results to the
//! consumer through a bounded channel, blocking while the channel is full.
//!
//! Dropping (or [`TreeWalk::end`]ing) the consumer side closes the end-walk
//! signal; the producer observes it at every send and before every directory
//! listing, then exits and releases its disk handles.

use super::merge::ListDir;
use super::{path_join, SLASH_SEPARATOR};
use crate::error::WalkError;
use crossbeam_channel::{bounded, select, Receiver, Sender, TryRecvError};
use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, trace};

/// One entry produced by a walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Full entry path relative to the bucket (directories end with `/`)
    pub path: String,

    /// Last entry of the whole walk
    pub end: bool,
}

/// Item sent over the walk channel
pub type WalkResult = Result<WalkEntry, WalkError>;

/// Counters for walk producers
#[derive(Debug, Default)]
pub struct WalkStats {
    /// Walks started
    pub started: AtomicU64,

    /// Producers currently running
    pub active: AtomicUsize,

    /// Walks that listed everything
    pub completed: AtomicU64,

    /// Walks stopped by the end-walk signal or a dropped consumer
    pub aborted: AtomicU64,

    /// Walks stopped by a walk error
    pub failed: AtomicU64,
}

impl WalkStats {
    /// Number of producer threads still running
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Total walks started
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Walks aborted before exhaustion
    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Walks that ran to exhaustion
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

/// RAII guard marking a producer as running
///
/// Counted before the producer thread is spawned, released when the thread
/// (or a closure that never got to run) drops it.
struct ActiveWalkGuard {
    stats: Arc<WalkStats>,
}

impl ActiveWalkGuard {
    fn new(stats: Arc<WalkStats>) -> Self {
        stats.started.fetch_add(1, Ordering::Relaxed);
        stats.active.fetch_add(1, Ordering::SeqCst);
        Self { stats }
    }
}

impl Drop for ActiveWalkGuard {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Consumer side of a running walk
///
/// Holds the result stream and the end-walk signal. Dropping it ends the
/// walk.
#[derive(Debug)]
pub struct TreeWalk {
    results: Receiver<WalkResult>,
    end_walk: Option<Sender<()>>,
}

impl TreeWalk {
    /// Receive the next result, blocking until one is available
    ///
    /// Returns `None` once the producer has finished.
    pub fn recv(&self) -> Option<WalkResult> {
        self.results.recv().ok()
    }

    /// Signal the producer to stop
    pub fn end(mut self) {
        self.end_walk.take();
    }

    /// Whether the end-walk signal is still open
    pub fn is_live(&self) -> bool {
        self.end_walk.is_some()
    }
}

impl Iterator for TreeWalk {
    type Item = WalkResult;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Why a producer stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkStop {
    Aborted,
    Failed,
}

/// Producer state
struct Walker {
    bucket: String,
    recursive: bool,
    lister: Arc<dyn ListDir>,
    results: Sender<WalkResult>,
    end_walk: Receiver<()>,
}

impl Walker {
    fn is_ended(&self) -> bool {
        matches!(self.end_walk.try_recv(), Err(TryRecvError::Disconnected))
    }

    fn send(&self, result: WalkResult) -> Result<(), WalkStop> {
        if self.is_ended() {
            return Err(WalkStop::Aborted);
        }
        select! {
            recv(self.end_walk) -> _ => Err(WalkStop::Aborted),
            send(self.results, result) -> sent => sent.map_err(|_| WalkStop::Aborted),
        }
    }

    /// Walk `prefix_dir`, emitting entries at or after `marker`
    ///
    /// `is_end` is true when nothing follows this directory in the walk, so
    /// its last leaf closes the whole walk.
    fn walk(
        &self,
        prefix_dir: &str,
        entry_prefix: &str,
        marker: &str,
        is_end: bool,
        is_root: bool,
    ) -> Result<(), WalkStop> {
        if self.is_ended() {
            return Err(WalkStop::Aborted);
        }

        let (marker_dir, marker_base) = split_marker(marker);
        let listing = self.lister.list_dir(&self.bucket, prefix_dir, entry_prefix);

        if let Some(err) = listing.failure(&self.bucket, prefix_dir) {
            let escalate = is_root || matches!(err, WalkError::AllDisksUnavailable { .. });
            if !escalate {
                debug!(bucket = %self.bucket, dir = prefix_dir, error = %err, "Directory vanished during walk");
                return Ok(());
            }
            self.send(Err(err))?;
            return Err(WalkStop::Failed);
        }

        let start = listing
            .entries
            .partition_point(|e| e.as_str() < marker_dir.as_str());
        let entries = &listing.entries[start..];
        let Some(last) = entries.len().checked_sub(1) else {
            return Ok(());
        };

        for (i, entry) in entries.iter().enumerate() {
            let is_dir = entry.ends_with(SLASH_SEPARATOR);

            if i == 0 && *entry == marker_dir {
                // Already returned by the previous page
                if !self.recursive || !is_dir {
                    continue;
                }
            }

            let at_end = i == last && is_end;

            if self.recursive && is_dir {
                let marker_arg = if *entry == marker_dir { marker_base } else { "" };
                self.walk(&path_join(prefix_dir, entry), "", marker_arg, at_end, false)?;
                continue;
            }

            trace!(bucket = %self.bucket, entry = %entry, end = at_end, "Walk entry");
            self.send(Ok(WalkEntry {
                path: path_join(prefix_dir, entry),
                end: at_end,
            }))?;
        }

        Ok(())
    }
}

/// Split a relative marker into its first directory and the remainder
///
/// `"four/five.txt"` becomes `("four/", "five.txt")`, `"four"` becomes
/// `("four", "")`.
fn split_marker(marker: &str) -> (String, &str) {
    match marker.split_once('/') {
        Some((dir, base)) => (format!("{}/", dir), base),
        None => (marker.to_string(), ""),
    }
}

/// Split a prefix into the directory to list and the entry filter
///
/// `"one/two/th"` becomes `("one/two/", "th")`.
fn split_prefix(prefix: &str) -> (&str, &str) {
    match prefix.rfind('/') {
        Some(i) => (&prefix[..=i], &prefix[i + 1..]),
        None => ("", prefix),
    }
}

/// Start walking `bucket` under `prefix`, resuming after `marker`
///
/// With `recursive` false, sub-directories are emitted as entries ending in
/// `/` instead of being descended.
pub fn start_tree_walk(
    bucket: &str,
    prefix: &str,
    marker: &str,
    recursive: bool,
    lister: Arc<dyn ListDir>,
    buffer: usize,
    stats: Arc<WalkStats>,
) -> io::Result<TreeWalk> {
    let (results_tx, results_rx) = bounded(buffer.max(1));
    let (end_tx, end_rx) = bounded::<()>(0);

    let (prefix_dir, entry_prefix) = split_prefix(prefix);
    let marker = marker.strip_prefix(prefix_dir).unwrap_or(marker).to_string();
    let prefix_dir = prefix_dir.to_string();
    let entry_prefix = entry_prefix.to_string();

    let walker = Walker {
        bucket: bucket.to_string(),
        recursive,
        lister,
        results: results_tx,
        end_walk: end_rx,
    };

    let active = ActiveWalkGuard::new(stats);

    thread::Builder::new()
        .name("tree-walk".to_string())
        .spawn(move || {
            let stats = Arc::clone(&active.stats);
            let _active = active;
            match walker.walk(&prefix_dir, &entry_prefix, &marker, true, true) {
                Ok(()) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(WalkStop::Aborted) => {
                    stats.aborted.fetch_add(1, Ordering::Relaxed);
                    debug!(bucket = %walker.bucket, prefix = %prefix_dir, "Tree walk aborted");
                }
                Err(WalkStop::Failed) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                }
            }
            // Dropping the walker closes the result channel
        })?;

    Ok(TreeWalk {
        results: results_rx,
        end_walk: Some(end_tx),
    })
}
