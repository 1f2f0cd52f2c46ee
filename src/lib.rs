//! ec-walker - Merged Listing and Heal Detection for Erasure-Coded Storage
//!
//! An object is striped with redundancy across the N disks of an erasure
//! set; any disk may be offline, corrupted or behind. This crate answers two
//! questions while a client pages through a bucket:
//!
//! - What is the merged, deduplicated, sorted view of the namespace across
//!   every disk, resumable across paginated calls?
//! - For each object, does its per-disk metadata disagree enough that the
//!   object needs healing?
//!
//! # Features
//!
//! - **Fault-Tolerant Merge**: Directory listings from every disk are merged
//!   into one sorted view; failing disks are skipped.
//!
//! - **Resumable Walks**: A tree walk runs on its own thread behind a bounded
//!   channel and is parked in a pool between pages, so the next page resumes
//!   it instead of re-walking from the marker.
//!
//! - **Quorum Heal Detection**: Per-disk metadata votes on the object's
//!   defining attributes; missing, unreadable or disagreeing copies mark the
//!   object for healing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      list_objects_heal()                        │
//! └──────────────┬──────────────────────────────────┬───────────────┘
//!                │ release / store                  │ per object
//!                ▼                                  ▼
//! ┌──────────────────────────┐        ┌──────────────────────────┐
//! │        WalkPool          │        │  NsLockMap (read lock)   │
//! │  parked walks by params  │        │  read_all_metadata       │
//! │  janitor expires idle    │        │  HealEvaluator           │
//! └────────────┬─────────────┘        └──────────────────────────┘
//!              │
//!              ▼
//! ┌──────────────────────────┐
//! │   Tree walk thread       │──── bounded channel ────► consumer
//! │   (crossbeam, end-walk)  │
//! └────────────┬─────────────┘
//!              │ list_dir per directory
//!              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         merge_list                              │
//! │   ┌────────┐   ┌────────┐   ┌────────┐         ┌────────┐       │
//! │   │ Disk 0 │   │ Disk 1 │   │ Disk 2 │   ...   │ Disk N │       │
//! │   └────────┘   └────────┘   └────────┘         └────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Objects needing heal in a 4-disk set
//! ec-walker /mnt/disk1 /mnt/disk2 /mnt/disk3 /mnt/disk4 --bucket photos
//!
//! # One level at a time, every page, as JSON
//! ec-walker /mnt/disk{1..4} --bucket photos --delimiter / --all-pages --json
//! ```

pub mod config;
pub mod disk;
pub mod error;
pub mod heal;
pub mod listing;
pub mod lock;
pub mod progress;
pub mod validate;
pub mod walker;

pub use config::{CliArgs, ErasureLayout, RunConfig, SetConfig};
pub use disk::{Disk, DiskSet, LocalDisk, MemoryDisk, ObjectMetadata};
pub use error::{DiskError, ListError, Result};
pub use heal::{HealEvaluator, HealState, HealStatus};
pub use listing::{ErasureSet, ListObjectsInfo, ObjectInfo};
