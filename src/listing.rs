//! Listing orchestrator
//!
//! [`ErasureSet`] composes the merge lister, tree walker, walk pool and heal
//! evaluator into the paginated listing operations.
//!
//! # Page flow
//!
//! ```text
//!  list_objects_heal(bucket, prefix, marker, delimiter, max_keys)
//!        │
//!        ▼
//!  validate ──► short-circuit (max_keys == 0, prefix == delimiter == "/")
//!        │
//!        ▼
//!  WalkPool::release(params) ──miss──► start_tree_walk(DiskSetLister)
//!        │ hit                                   │
//!        └──────────────┬────────────────────────┘
//!                       ▼
//!        pull up to max_keys entries, resolve leaves
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!     exhausted: end walk      truncated: WalkPool::store(params')
//!                       │
//!                       ▼
//!   per object: read lock ► read_all_metadata ► HealEvaluator
//! ```

use crate::config::{ErasureLayout, SetConfig};
use crate::disk::{DiskSet, ObjectMetadata};
use crate::error::{DiskError, ListError, Result};
use crate::heal::{HealEvaluator, HealStatus};
use crate::lock::NsLockMap;
use crate::validate::check_list_objs_args;
use crate::walker::{
    start_tree_walk, DiskSetLister, ListParams, MergeMode, TreeWalk, WalkPool, WalkStats,
    SLASH_SEPARATOR,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

/// One listed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub bucket: String,

    /// Full name relative to the bucket; directories end with `/`
    pub name: String,

    pub is_dir: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod_time: Option<DateTime<Utc>>,

    pub size: u64,

    /// Heal summary, set only by heal listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heal: Option<HealStatus>,
}

impl ObjectInfo {
    /// Entry for a directory (common prefix)
    pub fn directory(bucket: &str, name: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            name: name.to_string(),
            is_dir: true,
            mod_time: None,
            size: 0,
            heal: None,
        }
    }

    /// Entry for an object, from one disk's metadata
    pub fn from_metadata(bucket: &str, name: &str, meta: &ObjectMetadata) -> Self {
        Self {
            bucket: bucket.to_string(),
            name: name.to_string(),
            is_dir: false,
            mod_time: Some(meta.mod_time),
            size: meta.size,
            heal: None,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListObjectsInfo {
    /// More entries remain; pass `next_marker` to continue
    pub is_truncated: bool,

    /// Name of the last entry this page consumed
    pub next_marker: String,

    pub objects: Vec<ObjectInfo>,

    /// Directory entries of a delimited listing
    pub prefixes: Vec<String>,
}

/// An erasure set: ordered disks plus the listing machinery shared across calls
#[derive(Debug)]
pub struct ErasureSet {
    disks: DiskSet,
    layout: ErasureLayout,
    config: SetConfig,
    pool: WalkPool,
    locks: NsLockMap,
    heal: HealEvaluator,
    walk_stats: Arc<WalkStats>,
}

impl ErasureSet {
    /// Create an erasure set over `disks`
    pub fn new(disks: DiskSet, config: SetConfig) -> Result<Self> {
        let layout = config.validate(disks.len())?;
        let pool = WalkPool::new(config.pool_config())?;
        debug!(
            disks = disks.len(),
            online = disks.online_count(),
            data = layout.data_blocks,
            parity = layout.parity_blocks,
            "Erasure set ready"
        );
        Ok(Self {
            heal: HealEvaluator::new(layout.read_quorum()),
            disks,
            layout,
            config,
            pool,
            locks: NsLockMap::new(),
            walk_stats: Arc::new(WalkStats::default()),
        })
    }

    /// List objects under `prefix` that need healing
    ///
    /// Directory entries of a delimited listing are always returned in
    /// `prefixes`; objects are returned only when heal-eligible, each with
    /// its [`HealStatus`].
    pub fn list_objects_heal(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: i32,
    ) -> Result<ListObjectsInfo> {
        self.list(bucket, prefix, marker, delimiter, max_keys, true)
    }

    /// List every object under `prefix`
    pub fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: i32,
    ) -> Result<ListObjectsInfo> {
        self.list(bucket, prefix, marker, delimiter, max_keys, false)
    }

    /// Resolve one object from the first disk with readable metadata
    pub fn get_object_info(&self, bucket: &str, object: &str) -> Result<ObjectInfo> {
        let mut last_err: Option<DiskError> = None;
        for disk in self.disks.slots().flatten() {
            match disk.read_metadata(bucket, object) {
                Ok(meta) => return Ok(ObjectInfo::from_metadata(bucket, object, &meta)),
                Err(e) => {
                    trace!(disk = disk.endpoint(), object, error = %e, "Metadata read failed");
                    // Keep the most telling error: a real fault beats not-found beats offline
                    let keep = match &last_err {
                        None => true,
                        Some(prev) if !prev.is_ignorable() => false,
                        Some(prev) if prev.is_disk_offline() => true,
                        Some(_) => !e.is_ignorable(),
                    };
                    if keep {
                        last_err = Some(e);
                    }
                }
            }
        }

        let err = last_err.unwrap_or_else(|| DiskError::DiskNotFound {
            endpoint: "all".to_string(),
        });
        Err(ListError::object_layer(bucket, object, err))
    }

    /// Check whether `object` exists on any disk
    pub fn is_object(&self, bucket: &str, object: &str) -> bool {
        self.disks.is_object(bucket, object)
    }

    /// Evaluate the heal status of one object under its read lock
    pub fn heal_status(&self, bucket: &str, object: &str) -> HealStatus {
        let _guard = self.locks.read(bucket, object);
        let metas = self.disks.read_all_metadata(bucket, object);
        self.heal.evaluate(&metas)
    }

    pub fn disks(&self) -> &DiskSet {
        &self.disks
    }

    pub fn layout(&self) -> ErasureLayout {
        self.layout
    }

    pub fn pool(&self) -> &WalkPool {
        &self.pool
    }

    pub fn locks(&self) -> &NsLockMap {
        &self.locks
    }

    pub fn walk_stats(&self) -> &WalkStats {
        &self.walk_stats
    }

    /// End every parked walk and stop the pool janitor
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }

    fn list(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: i32,
        heal: bool,
    ) -> Result<ListObjectsInfo> {
        check_list_objs_args(bucket, prefix, marker, delimiter)?;

        if max_keys == 0 {
            return Ok(ListObjectsInfo::default());
        }

        // Every key under "/" would start with "//"
        if delimiter == SLASH_SEPARATOR && prefix == SLASH_SEPARATOR {
            return Ok(ListObjectsInfo::default());
        }

        let ceiling = self.config.max_list_keys;
        let max_keys = match usize::try_from(max_keys) {
            Ok(n) if n <= ceiling => n,
            _ => ceiling,
        };

        match self.list_page(bucket, prefix, marker, delimiter, max_keys, heal) {
            Err(ListError::NamespaceNotFound { .. }) => Ok(ListObjectsInfo::default()),
            other => other,
        }
    }

    fn start_walk(&self, bucket: &str, prefix: &str, marker: &str, recursive: bool, heal: bool) -> Result<TreeWalk> {
        let mode = if heal {
            MergeMode::Union
        } else {
            MergeMode::FirstResponder
        };
        let lister = Arc::new(DiskSetLister::new(self.disks.clone(), mode));
        let walk = start_tree_walk(
            bucket,
            prefix,
            marker,
            recursive,
            lister,
            self.config.walk_buffer,
            Arc::clone(&self.walk_stats),
        )?;
        Ok(walk)
    }

    fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: usize,
        heal: bool,
    ) -> Result<ListObjectsInfo> {
        let recursive = delimiter != SLASH_SEPARATOR;
        let params = ListParams::new(bucket, recursive, marker, prefix, heal);

        let walk = match self.pool.release(&params) {
            Some(walk) => walk,
            None => self.start_walk(bucket, prefix, marker, recursive, heal)?,
        };

        let mut entries: Vec<ObjectInfo> = Vec::new();
        let mut eof = false;
        while entries.len() < max_keys {
            let Some(result) = walk.recv() else {
                eof = true;
                break;
            };
            let entry = result.map_err(|e| ListError::from_walk(e, bucket, prefix))?;

            let info = if entry.path.ends_with(SLASH_SEPARATOR) {
                ObjectInfo::directory(bucket, &entry.path)
            } else {
                match self.get_object_info(bucket, &entry.path) {
                    Ok(info) => info,
                    Err(ListError::ObjectLayer { source, .. }) if source.is_not_found() => {
                        debug!(bucket, object = %entry.path, "Listed object vanished");
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            };

            entries.push(info);
            if entry.end {
                eof = true;
                break;
            }
        }

        match entries.last() {
            Some(last) if !eof => {
                let next = ListParams::new(bucket, recursive, &last.name, prefix, heal);
                self.pool.store(next, walk);
            }
            _ => walk.end(),
        }

        let mut result = ListObjectsInfo {
            is_truncated: !eof,
            ..ListObjectsInfo::default()
        };
        for info in entries {
            result.next_marker.clone_from(&info.name);
            if info.is_dir {
                result.prefixes.push(info.name);
                continue;
            }
            if !heal {
                result.objects.push(info);
                continue;
            }

            let status = self.heal_status(bucket, &info.name);
            if status.needs_heal() {
                result.objects.push(ObjectInfo {
                    heal: Some(status),
                    ..info
                });
            }
        }

        debug!(
            bucket,
            prefix,
            heal,
            objects = result.objects.len(),
            prefixes = result.prefixes.len(),
            truncated = result.is_truncated,
            "Listing page done"
        );
        Ok(result)
    }
}
