//! Multi-disk namespace walking
//!
//! This module turns N independently failing, independently ordered disks
//! into one sorted, deduplicated, resumable stream of namespace entries.
//!
//! # Architecture
//!
//! ```text
//!   ListObjects call 1           ListObjects call 2 (marker = nextMarker)
//!          │                                │
//!          ▼                                ▼
//!   ┌─────────────┐  store(params')  ┌─────────────┐
//!   │  WalkPool   │◄─────────────────│  WalkPool   │ release(params')
//!   └──────┬──────┘                  └──────┬──────┘
//!          │ miss: start_tree_walk          │ hit: resume same TreeWalk
//!          ▼                                ▼
//!   ┌──────────────────────────────────────────────┐
//!   │  TreeWalk producer thread                    │
//!   │  - depth-first, marker aware                 │
//!   │  - bounded channel (blocks on consumer)      │
//!   │  - end-walk signal checked at every send     │
//!   └──────────────────────┬───────────────────────┘
//!                          │ per directory
//!                          ▼
//!   ┌──────────────────────────────────────────────┐
//!   │  merge_list: list each disk, sort, filter,   │
//!   │  strip leaf '/', re-sort, union, dedup       │
//!   └──────────────────────────────────────────────┘
//! ```

pub mod merge;
pub mod pool;
pub mod tree;

pub use merge::{filter_matching_prefix, merge_list, DirListing, DiskSetLister, ListDir, MergeMode};
pub use pool::{ListParams, PoolConfig, PoolStats, WalkPool};
pub use tree::{start_tree_walk, TreeWalk, WalkEntry, WalkResult, WalkStats};

/// Namespace path separator
pub const SLASH_SEPARATOR: &str = "/";

/// Join a directory (empty or ending in `/`) and an entry name
pub fn path_join(dir: &str, entry: &str) -> String {
    if dir.is_empty() {
        return entry.to_string();
    }
    let mut joined = String::with_capacity(dir.len() + entry.len() + 1);
    joined.push_str(dir);
    if !dir.ends_with('/') {
        joined.push('/');
    }
    joined.push_str(entry);
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_join() {
        assert_eq!(path_join("", "a.txt"), "a.txt");
        assert_eq!(path_join("photos/", "x.jpg"), "photos/x.jpg");
        assert_eq!(path_join("photos", "2024/"), "photos/2024/");
    }
}
