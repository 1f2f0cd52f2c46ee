//! Disk capability
//!
//! Every backing disk of an erasure set exposes two read primitives: list a
//! directory and read an object's metadata. Any call may fail independently
//! per disk. The merge lister and heal evaluator only see the [`Disk`]
//! trait, never a concrete backend.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                       DiskSet                         │
//! │  slot 0        slot 1        slot 2        slot 3     │
//! │ ┌────────┐   ┌────────┐   ┌────────┐   ┌────────┐    │
//! │ │  Disk  │   │  Disk  │   │ (none) │   │  Disk  │    │
//! │ └────────┘   └────────┘   └────────┘   └────────┘    │
//! │  positions are stable and only used for quorum       │
//! └──────────────────────────────────────────────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!      LocalDisk (xl.json on a             MemoryDisk (tests,
//!      local directory tree)               fault injection)
//! ```

pub mod local;
pub mod memory;
pub mod types;

pub use local::LocalDisk;
pub use memory::MemoryDisk;
pub use types::{ChecksumInfo, ErasureInfo, ObjectMetadata, ObjectPart, XL_META_FILE};

use crate::error::{DiskError, DiskResult};
use std::fmt;
use std::sync::Arc;
use std::thread;

/// Read primitives of one backing disk
pub trait Disk: Send + Sync + fmt::Debug {
    /// Human readable endpoint (path or address) for logging
    fn endpoint(&self) -> &str;

    /// List the raw entries of `dir` inside `bucket`
    ///
    /// Directories (including object directories) carry a trailing `/`.
    /// No ordering is guaranteed.
    fn list_dir(&self, bucket: &str, dir: &str) -> DiskResult<Vec<String>>;

    /// Read the metadata of `object` inside `bucket`
    fn read_metadata(&self, bucket: &str, object: &str) -> DiskResult<ObjectMetadata>;

    /// Check whether `object` has a metadata file on this disk
    ///
    /// Corrupt metadata still marks the path as an object.
    fn has_object(&self, bucket: &str, object: &str) -> DiskResult<bool> {
        match self.read_metadata(bucket, object) {
            Ok(_) | Err(DiskError::Corrupt { .. }) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Ordered set of disk slots, some possibly empty
#[derive(Clone, Default)]
pub struct DiskSet {
    slots: Vec<Option<Arc<dyn Disk>>>,
}

impl DiskSet {
    /// Create a set from explicit slots
    pub fn new(slots: Vec<Option<Arc<dyn Disk>>>) -> Self {
        Self { slots }
    }

    /// Create a set where every slot is populated
    pub fn from_disks<I>(disks: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Disk>>,
    {
        Self {
            slots: disks.into_iter().map(Some).collect(),
        }
    }

    /// Number of slots (present or not)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the set has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of populated slots
    pub fn online_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Iterate over slots in order
    pub fn slots(&self) -> impl Iterator<Item = Option<&Arc<dyn Disk>>> + '_ {
        self.slots.iter().map(Option::as_ref)
    }

    /// Check whether `path` is an object on any disk
    ///
    /// Stops at the first disk that reports the object.
    pub fn is_object(&self, bucket: &str, path: &str) -> bool {
        self.slots.iter().flatten().any(|disk| {
            matches!(disk.has_object(bucket, path), Ok(true))
        })
    }

    /// Read an object's metadata from every slot concurrently
    ///
    /// Results are returned in slot order regardless of completion order.
    /// Empty slots yield `DiskNotFound`.
    pub fn read_all_metadata(&self, bucket: &str, object: &str) -> Vec<DiskResult<ObjectMetadata>> {
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .slots
                .iter()
                .enumerate()
                .map(|(position, slot)| {
                    slot.as_ref().map(|disk| {
                        let disk = Arc::clone(disk);
                        (position, scope.spawn(move || disk.read_metadata(bucket, object)))
                    })
                    .ok_or(position)
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle {
                    Ok((position, h)) => h.join().unwrap_or_else(|_| {
                        Err(DiskError::Io {
                            path: format!("{}/{}", bucket, object),
                            reason: format!("metadata reader for disk {} panicked", position),
                        })
                    }),
                    Err(position) => Err(DiskError::DiskNotFound {
                        endpoint: format!("slot-{}", position),
                    }),
                })
                .collect()
        })
    }
}

impl fmt::Debug for DiskSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.slots
                    .iter()
                    .map(|slot| slot.as_ref().map(|d| d.endpoint().to_string())),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta() -> ObjectMetadata {
        ObjectMetadata::new(10, Utc::now(), ErasureInfo::new(1, 1, 1024))
    }

    #[test]
    fn test_read_all_metadata_keeps_slot_order() {
        let a = Arc::new(MemoryDisk::new("a"));
        let b = Arc::new(MemoryDisk::new("b"));
        a.make_bucket("bucket");
        b.make_bucket("bucket");
        a.put_object("bucket", "obj", meta());

        let set = DiskSet::new(vec![Some(a as Arc<dyn Disk>), None, Some(b as Arc<dyn Disk>)]);
        let results = set.read_all_metadata("bucket", "obj");

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(DiskError::DiskNotFound { .. })));
        assert!(matches!(results[2], Err(DiskError::FileNotFound { .. })));
    }

    #[test]
    fn test_is_object_any_disk() {
        let a = Arc::new(MemoryDisk::new("a"));
        let b = Arc::new(MemoryDisk::new("b"));
        a.make_bucket("bucket");
        b.make_bucket("bucket");
        b.put_object("bucket", "dir/obj", meta());

        let set = DiskSet::from_disks(vec![a as Arc<dyn Disk>, b as Arc<dyn Disk>]);
        assert!(set.is_object("bucket", "dir/obj/"));
        assert!(!set.is_object("bucket", "dir/"));
        assert_eq!(set.online_count(), 2);
    }
}
