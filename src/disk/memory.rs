//! In-memory disk
//!
//! Models the same namespace as [`LocalDisk`](super::LocalDisk): every object
//! is a directory entry with a trailing `/` in its parent's listing. Supports
//! fault injection (offline disk, corrupt metadata, failing directories) and
//! counts calls so callers can assert that no disk I/O happened.

use super::types::ObjectMetadata;
use super::Disk;
use crate::error::{DiskError, DiskResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

type Bucket = BTreeMap<String, ObjectMetadata>;

/// Disk backed by in-process maps
#[derive(Debug)]
pub struct MemoryDisk {
    endpoint: String,
    buckets: RwLock<BTreeMap<String, Bucket>>,
    corrupt: RwLock<HashSet<(String, String)>>,
    failing_dirs: RwLock<HashSet<(String, String)>>,
    offline: AtomicBool,
    list_calls: AtomicU64,
    read_calls: AtomicU64,
}

impl MemoryDisk {
    /// Create an empty online disk
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            buckets: RwLock::new(BTreeMap::new()),
            corrupt: RwLock::new(HashSet::new()),
            failing_dirs: RwLock::new(HashSet::new()),
            offline: AtomicBool::new(false),
            list_calls: AtomicU64::new(0),
            read_calls: AtomicU64::new(0),
        }
    }

    /// Create a bucket (no-op if it exists)
    pub fn make_bucket(&self, bucket: &str) {
        self.buckets.write().entry(bucket.to_string()).or_default();
    }

    /// Store metadata for an object, creating the bucket if needed
    pub fn put_object(&self, bucket: &str, object: &str, meta: ObjectMetadata) {
        self.buckets
            .write()
            .entry(bucket.to_string())
            .or_default()
            .insert(object.to_string(), meta);
    }

    /// Remove an object's metadata from this disk
    pub fn remove_object(&self, bucket: &str, object: &str) -> bool {
        self.buckets
            .write()
            .get_mut(bucket)
            .map(|b| b.remove(object).is_some())
            .unwrap_or(false)
    }

    /// Take the disk offline or bring it back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make reads of an object's metadata fail as corrupt
    pub fn corrupt_object(&self, bucket: &str, object: &str) {
        self.corrupt
            .write()
            .insert((bucket.to_string(), object.to_string()));
    }

    /// Make listings of a directory fail with an I/O error
    pub fn fail_dir(&self, bucket: &str, dir: &str) {
        self.failing_dirs
            .write()
            .insert((bucket.to_string(), dir.to_string()));
    }

    /// Number of `list_dir` calls served
    pub fn list_calls(&self) -> u64 {
        self.list_calls.load(Ordering::Relaxed)
    }

    /// Number of metadata reads served (including `has_object`)
    pub fn read_calls(&self) -> u64 {
        self.read_calls.load(Ordering::Relaxed)
    }

    /// Total calls of any kind
    pub fn total_calls(&self) -> u64 {
        self.list_calls() + self.read_calls()
    }

    fn check_online(&self) -> DiskResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(DiskError::DiskNotFound {
                endpoint: self.endpoint.clone(),
            });
        }
        Ok(())
    }

    fn lookup(&self, bucket: &str, object: &str) -> DiskResult<ObjectMetadata> {
        self.check_online()?;
        let object = object.trim_end_matches('/');
        let buckets = self.buckets.read();
        let objects = buckets.get(bucket).ok_or_else(|| DiskError::VolumeNotFound {
            bucket: bucket.to_string(),
        })?;
        let meta = objects.get(object).ok_or_else(|| DiskError::FileNotFound {
            path: format!("{}/{}", bucket, object),
        })?;
        if self
            .corrupt
            .read()
            .contains(&(bucket.to_string(), object.to_string()))
        {
            return Err(DiskError::Corrupt {
                path: format!("{}/{}", bucket, object),
                reason: "injected corruption".to_string(),
            });
        }
        Ok(meta.clone())
    }
}

impl Disk for MemoryDisk {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn list_dir(&self, bucket: &str, dir: &str) -> DiskResult<Vec<String>> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.check_online()?;

        if self
            .failing_dirs
            .read()
            .contains(&(bucket.to_string(), dir.to_string()))
        {
            return Err(DiskError::Io {
                path: format!("{}/{}", bucket, dir),
                reason: "injected listing failure".to_string(),
            });
        }

        let buckets = self.buckets.read();
        let objects = buckets.get(bucket).ok_or_else(|| DiskError::VolumeNotFound {
            bucket: bucket.to_string(),
        })?;

        // Unordered, like a real readdir
        let mut entries = HashSet::new();
        for name in objects
            .range(dir.to_string()..)
            .map(|(name, _)| name)
            .take_while(|name| name.starts_with(dir))
        {
            let rest = &name[dir.len()..];
            match rest.find('/') {
                Some(i) => entries.insert(rest[..=i].to_string()),
                None => entries.insert(format!("{}/", rest)),
            };
        }

        if entries.is_empty() && !dir.is_empty() {
            return Err(DiskError::FileNotFound {
                path: format!("{}/{}", bucket, dir),
            });
        }
        Ok(entries.into_iter().collect())
    }

    fn read_metadata(&self, bucket: &str, object: &str) -> DiskResult<ObjectMetadata> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        self.lookup(bucket, object)
    }

    fn has_object(&self, bucket: &str, object: &str) -> DiskResult<bool> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        match self.lookup(bucket, object) {
            Ok(_) | Err(DiskError::Corrupt { .. }) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
