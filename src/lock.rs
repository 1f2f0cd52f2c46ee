//! Namespace locks
//!
//! Process-local reader/writer locks keyed by `(bucket, object)`. Each path
//! gets its own `RwLock`, created on first use and dropped from the map when
//! the last holder or waiter leaves, so the map only ever holds paths that
//! are currently locked.

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

type LockKey = (String, String);
type LockTable = HashMap<LockKey, Arc<RwLock<()>>>;

/// Map of per-object reader/writer locks
#[derive(Debug, Clone, Default)]
pub struct NsLockMap {
    locks: Arc<Mutex<LockTable>>,
}

enum HeldLock {
    Read(ArcRwLockReadGuard<RawRwLock, ()>),
    Write(ArcRwLockWriteGuard<RawRwLock, ()>),
}

/// Held lock on one object path; released on drop
pub struct NsLockGuard {
    locks: Arc<Mutex<LockTable>>,
    key: LockKey,
    held: Option<HeldLock>,
}

impl NsLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a shared lock on `bucket/object`, blocking while a writer holds it
    pub fn read(&self, bucket: &str, object: &str) -> NsLockGuard {
        let (key, lock) = self.entry(bucket, object);
        let held = HeldLock::Read(lock.read_arc());
        trace!(bucket, object, "Namespace read lock acquired");
        self.guard(key, held)
    }

    /// Take an exclusive lock on `bucket/object`
    pub fn write(&self, bucket: &str, object: &str) -> NsLockGuard {
        let (key, lock) = self.entry(bucket, object);
        let held = HeldLock::Write(lock.write_arc());
        trace!(bucket, object, "Namespace write lock acquired");
        self.guard(key, held)
    }

    /// Number of paths currently locked or waited on
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The path's lock, cloned out so the map is not held while blocking
    fn entry(&self, bucket: &str, object: &str) -> (LockKey, Arc<RwLock<()>>) {
        let key = (bucket.to_string(), object.to_string());
        let lock = Arc::clone(self.locks.lock().entry(key.clone()).or_default());
        (key, lock)
    }

    fn guard(&self, key: LockKey, held: HeldLock) -> NsLockGuard {
        NsLockGuard {
            locks: Arc::clone(&self.locks),
            key,
            held: Some(held),
        }
    }
}

impl fmt::Debug for NsLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.held {
            Some(HeldLock::Read(_)) => "read",
            Some(HeldLock::Write(_)) => "write",
            None => "released",
        };
        f.debug_struct("NsLockGuard")
            .field("bucket", &self.key.0)
            .field("object", &self.key.1)
            .field("mode", &mode)
            .finish()
    }
}

impl Drop for NsLockGuard {
    fn drop(&mut self) {
        // Release first so our own reference no longer counts
        self.held.take();

        let mut locks = self.locks.lock();
        let unused = locks
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if unused {
            locks.remove(&self.key);
        }
    }
}
