//! Merge lister
//!
//! Produces one sorted, deduplicated entry list per directory level from a
//! set of disks, tolerating any subset of them failing. Objects are stored
//! with a synthetic trailing `/` so raw listings cannot tell them apart from
//! sub-directories; the leaf check strips that separator exactly once and
//! the entries are re-sorted because stripping can change relative order
//! (`"abc-d/" < "abc/"` but `"abc" < "abc-d/"`).

use super::{path_join, SLASH_SEPARATOR};
use crate::disk::DiskSet;
use crate::error::{DiskError, WalkError};
use tracing::debug;

/// How listings from several disks are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Union of every disk that answers (heal listing)
    Union,
    /// Entries from the first disk that answers (plain listing)
    FirstResponder,
}

/// Merged entries of one directory plus per-disk accounting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirListing {
    /// Sorted, unique entry names (directories keep their trailing `/`)
    pub entries: Vec<String>,

    /// Disks that listed the directory successfully
    pub disks_ok: usize,

    /// Disks that reported the directory missing
    pub disks_not_found: usize,

    /// Disks that reported the bucket missing
    pub disks_no_bucket: usize,

    /// Empty slots, offline disks and disks with read errors
    pub disks_failed: usize,
}

impl DirListing {
    /// Listing produced by at least one disk
    pub fn from_entries(entries: Vec<String>) -> Self {
        Self {
            entries,
            disks_ok: 1,
            ..Self::default()
        }
    }

    /// Classify a listing that no disk answered
    ///
    /// Returns `None` when at least one disk listed the directory. When some
    /// disks answered "not found" that answer wins over unreachable disks.
    pub fn failure(&self, bucket: &str, dir: &str) -> Option<WalkError> {
        if self.disks_ok > 0 {
            return None;
        }
        if self.disks_not_found + self.disks_no_bucket == 0 {
            return Some(WalkError::AllDisksUnavailable {
                bucket: bucket.to_string(),
                path: dir.to_string(),
            });
        }
        if self.disks_not_found == 0 {
            return Some(WalkError::BucketNotFound {
                bucket: bucket.to_string(),
            });
        }
        Some(WalkError::NamespaceNotFound {
            path: dir.to_string(),
        })
    }

    fn record_error(&mut self, err: &DiskError) {
        match err {
            DiskError::FileNotFound { .. } => self.disks_not_found += 1,
            DiskError::VolumeNotFound { .. } => self.disks_no_bucket += 1,
            _ => self.disks_failed += 1,
        }
    }
}

/// Keep only the entries that start with `prefix`
///
/// `entries` must be sorted; matching entries are contiguous.
pub fn filter_matching_prefix(mut entries: Vec<String>, prefix: &str) -> Vec<String> {
    if prefix.is_empty() {
        return entries;
    }
    let start = entries.partition_point(|e| e.as_str() < prefix);
    let len = entries[start..].partition_point(|e| e.starts_with(prefix));
    entries.truncate(start + len);
    entries.drain(..start);
    entries
}

/// Merge the listings of `prefix_dir` across every disk in `disks`
///
/// Per-disk failures are skipped. Every disk failing yields an empty
/// listing with no error; see [`DirListing::failure`] for classification.
pub fn merge_list<F>(
    disks: &DiskSet,
    bucket: &str,
    prefix_dir: &str,
    prefix_entry: &str,
    mode: MergeMode,
    is_leaf: F,
) -> DirListing
where
    F: Fn(&str, &str) -> bool,
{
    let mut listing = DirListing::default();
    let mut merged: Vec<String> = Vec::new();

    for slot in disks.slots() {
        let Some(disk) = slot else {
            listing.disks_failed += 1;
            continue;
        };

        let entries = match disk.list_dir(bucket, prefix_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(disk = %disk.endpoint(), bucket, dir = prefix_dir, error = %e, "Skipping disk in merge");
                listing.record_error(&e);
                continue;
            }
        };
        listing.disks_ok += 1;

        let entries = resolve_entries(entries, bucket, prefix_dir, prefix_entry, &is_leaf);

        if merged.is_empty() {
            merged = entries;
        } else {
            let new_entries: Vec<String> = entries
                .into_iter()
                .filter(|e| merged.binary_search(e).is_err())
                .collect();
            if !new_entries.is_empty() {
                merged.extend(new_entries);
                merged.sort_unstable();
            }
        }

        if mode == MergeMode::FirstResponder {
            break;
        }
    }

    listing.entries = merged;
    listing
}

/// Sort, filter and leaf-strip the raw entries of one disk
fn resolve_entries<F>(
    mut entries: Vec<String>,
    bucket: &str,
    prefix_dir: &str,
    prefix_entry: &str,
    is_leaf: &F,
) -> Vec<String>
where
    F: Fn(&str, &str) -> bool,
{
    entries.sort_unstable();
    let mut entries = filter_matching_prefix(entries, prefix_entry);

    for entry in entries.iter_mut() {
        if entry.ends_with(SLASH_SEPARATOR) && is_leaf(bucket, &path_join(prefix_dir, entry)) {
            entry.pop();
        }
    }

    entries.sort_unstable();
    entries.dedup();
    entries
}

/// Directory lister used by the tree walker
pub trait ListDir: Send + Sync {
    /// List `prefix_dir`, keeping entries that start with `prefix_entry`
    fn list_dir(&self, bucket: &str, prefix_dir: &str, prefix_entry: &str) -> DirListing;
}

impl<F> ListDir for F
where
    F: Fn(&str, &str, &str) -> DirListing + Send + Sync,
{
    fn list_dir(&self, bucket: &str, prefix_dir: &str, prefix_entry: &str) -> DirListing {
        self(bucket, prefix_dir, prefix_entry)
    }
}

/// [`ListDir`] over a disk set, with leaf detection against the same disks
#[derive(Debug, Clone)]
pub struct DiskSetLister {
    disks: DiskSet,
    mode: MergeMode,
}

impl DiskSetLister {
    /// Create a lister over `disks`
    pub fn new(disks: DiskSet, mode: MergeMode) -> Self {
        Self { disks, mode }
    }
}

impl ListDir for DiskSetLister {
    fn list_dir(&self, bucket: &str, prefix_dir: &str, prefix_entry: &str) -> DirListing {
        merge_list(&self.disks, bucket, prefix_dir, prefix_entry, self.mode, |b, p| {
            self.disks.is_object(b, p)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::{Disk, ErasureInfo, MemoryDisk, ObjectMetadata};
    use chrono::Utc;
    use std::sync::Arc;

    fn meta() -> ObjectMetadata {
        ObjectMetadata::new(1, Utc::now(), ErasureInfo::new(1, 1, 1024))
    }

    fn disk_with(name: &str, objects: &[&str]) -> Arc<MemoryDisk> {
        let disk = Arc::new(MemoryDisk::new(name));
        disk.make_bucket("bucket");
        for object in objects {
            disk.put_object("bucket", object, meta());
        }
        disk
    }

    fn set(disks: &[&Arc<MemoryDisk>]) -> DiskSet {
        DiskSet::from_disks(disks.iter().map(|d| Arc::clone(*d) as Arc<dyn Disk>))
    }

    fn union(disks: &DiskSet, dir: &str, prefix: &str) -> DirListing {
        merge_list(disks, "bucket", dir, prefix, MergeMode::Union, |b, p| {
            disks.is_object(b, p)
        })
    }

    #[test]
    fn test_filter_matching_prefix() {
        let entries: Vec<String> = ["a", "ab", "abc/", "b", "bc"].iter().map(|s| s.to_string()).collect();
        assert_eq!(filter_matching_prefix(entries.clone(), "ab"), vec!["ab", "abc/"]);
        assert_eq!(filter_matching_prefix(entries.clone(), "b"), vec!["b", "bc"]);
        assert!(filter_matching_prefix(entries.clone(), "z").is_empty());
        assert_eq!(filter_matching_prefix(entries, "").len(), 5);
    }

    #[test]
    fn test_union_dedups_exact_names() {
        let a = disk_with("a", &["a", "b"]);
        let b = disk_with("b", &["b", "c"]);
        let listing = union(&set(&[&a, &b]), "", "");

        assert_eq!(listing.entries, vec!["a", "b", "c"]);
        assert_eq!(listing.disks_ok, 2);
    }

    #[test]
    fn test_failed_disk_is_skipped() {
        let a = disk_with("a", &["c", "a", "b"]);
        let b = disk_with("b", &["x"]);
        b.set_offline(true);
        let listing = union(&set(&[&a, &b]), "", "");

        assert_eq!(listing.entries, vec!["a", "b", "c"]);
        assert_eq!(listing.disks_ok, 1);
        assert_eq!(listing.disks_failed, 1);
        assert!(listing.failure("bucket", "").is_none());
    }

    #[test]
    fn test_leaf_strip_resorts() {
        // "abc-d/" sorts before "abc/" raw, but "abc" sorts before "abc-d/"
        let a = disk_with("a", &["abc", "abc-d/inner"]);
        let listing = union(&set(&[&a]), "", "");
        assert_eq!(listing.entries, vec!["abc", "abc-d/"]);
    }

    #[test]
    fn test_leaf_and_directory_with_same_stem() {
        let a = disk_with("a", &["logs", "logs.d/one"]);
        let b = disk_with("b", &["logs.d/two"]);
        let listing = union(&set(&[&a, &b]), "", "");
        assert_eq!(listing.entries, vec!["logs", "logs.d/"]);
    }

    #[test]
    fn test_prefix_entry_filter_and_subdir() {
        let a = disk_with("a", &["photos/2024/x.jpg", "photos/y.jpg", "photos/zz.jpg"]);
        let listing = union(&set(&[&a]), "photos/", "y");
        assert_eq!(listing.entries, vec!["y.jpg"]);

        let listing = union(&set(&[&a]), "photos/", "");
        assert_eq!(listing.entries, vec!["2024/", "y.jpg", "zz.jpg"]);
    }

    #[test]
    fn test_empty_disk_does_not_block_merge() {
        let a = disk_with("a", &[]);
        let b = disk_with("b", &["q", "p"]);
        let listing = union(&set(&[&a, &b]), "", "");
        assert_eq!(listing.entries, vec!["p", "q"]);
        assert_eq!(listing.disks_ok, 2);
    }

    #[test]
    fn test_all_disks_failing_is_empty_not_error() {
        let a = disk_with("a", &["x"]);
        let b = disk_with("b", &["y"]);
        a.set_offline(true);
        b.fail_dir("bucket", "");
        let listing = union(&set(&[&a, &b]), "", "");

        assert!(listing.entries.is_empty());
        assert!(matches!(
            listing.failure("bucket", ""),
            Some(WalkError::AllDisksUnavailable { .. })
        ));
    }

    #[test]
    fn test_failure_classification() {
        let a = disk_with("a", &["x"]);
        let b = disk_with("b", &["x"]);
        b.set_offline(true);
        let disks = DiskSet::new(vec![Some(a.clone() as Arc<dyn Disk>), None, Some(b as Arc<dyn Disk>)]);

        let listing = union(&disks, "missing/", "");
        assert!(matches!(
            listing.failure("bucket", "missing/"),
            Some(WalkError::NamespaceNotFound { .. })
        ));

        let listing = merge_list(&disks, "nobucket", "", "", MergeMode::Union, |_, _| false);
        assert!(matches!(
            listing.failure("nobucket", ""),
            Some(WalkError::BucketNotFound { .. })
        ));
    }

    #[test]
    fn test_first_responder_stops_after_one_disk() {
        let a = disk_with("a", &["a"]);
        let b = disk_with("b", &["b"]);
        a.set_offline(true);
        let c = disk_with("c", &["c"]);
        let listing = merge_list(&set(&[&a, &b, &c]), "bucket", "", "", MergeMode::FirstResponder, |_, _| true);

        assert_eq!(listing.entries, vec!["b"]);
        assert_eq!(c.list_calls(), 0);
    }

    #[test]
    fn test_merged_output_sorted_unique_superset() {
        let a = disk_with("a", &["m", "d/1", "k", "zz"]);
        let b = disk_with("b", &["k", "a", "d/2", "n"]);
        let c = disk_with("c", &["b", "m"]);
        let listing = union(&set(&[&a, &b, &c]), "", "");

        let mut expected = listing.entries.clone();
        expected.sort();
        expected.dedup();
        assert_eq!(listing.entries, expected);
        for name in ["a", "b", "d/", "k", "m", "n", "zz"] {
            assert!(listing.entries.iter().any(|e| e == name), "missing {}", name);
        }
    }
}
