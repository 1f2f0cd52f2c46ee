//! Object metadata types
//!
//! One `ObjectMetadata` is stored per disk per object (`xl.json`). The heal
//! evaluator compares the copies read from every disk of a set; the fields
//! here are the ones it inspects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the per-disk metadata file inside an object directory
pub const XL_META_FILE: &str = "xl.json";

/// Metadata format version written by this crate
pub const XL_META_VERSION: &str = "1.0.0";

/// Metadata format tag
pub const XL_META_FORMAT: &str = "xl";

/// Erasure coding algorithm tag
pub const ERASURE_ALGORITHM: &str = "klauspost/reedsolomon/vandermonde";

/// Checksum of one part shard on one disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumInfo {
    /// Part file name (e.g. "part.1")
    pub name: String,

    /// Hash algorithm name
    pub algorithm: String,

    /// Hex encoded hash
    pub hash: String,
}

/// Erasure coding layout of an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErasureInfo {
    /// Coding algorithm
    pub algorithm: String,

    /// Number of data shards
    pub data_blocks: usize,

    /// Number of parity shards
    pub parity_blocks: usize,

    /// Erasure block size in bytes
    pub block_size: u64,

    /// 1-based shard index held by this disk
    pub index: usize,

    /// Shard index per disk position (1-based, a permutation of 1..=n)
    pub distribution: Vec<usize>,

    /// Per-part checksums for this disk's shard
    #[serde(default)]
    pub checksums: Vec<ChecksumInfo>,
}

impl ErasureInfo {
    /// Create a layout with the identity distribution
    pub fn new(data_blocks: usize, parity_blocks: usize, block_size: u64) -> Self {
        Self {
            algorithm: ERASURE_ALGORITHM.to_string(),
            data_blocks,
            parity_blocks,
            block_size,
            index: 1,
            distribution: (1..=data_blocks + parity_blocks).collect(),
            checksums: Vec::new(),
        }
    }

    /// Same layout as stored on the disk at `position`
    pub fn for_disk(mut self, position: usize) -> Self {
        self.index = self.distribution.get(position).copied().unwrap_or(0);
        self
    }

    /// Total number of shards
    pub fn disk_count(&self) -> usize {
        self.data_blocks + self.parity_blocks
    }

    /// Whether the shard stored at disk `position` is a data shard
    pub fn is_data_shard(&self, position: usize) -> Option<bool> {
        self.distribution
            .get(position)
            .map(|&shard| shard >= 1 && shard - 1 < self.data_blocks)
    }

    /// Check structural validity of the layout
    pub fn is_valid(&self) -> bool {
        if self.data_blocks == 0 || self.distribution.len() != self.disk_count() {
            return false;
        }
        let mut seen = vec![false; self.distribution.len()];
        for &shard in &self.distribution {
            match shard.checked_sub(1).and_then(|i| seen.get_mut(i)) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }
}

/// One uploaded part of an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPart {
    /// Part number (1-based)
    pub number: u32,

    /// Part file name
    pub name: String,

    /// Part size in bytes
    pub size: u64,

    /// Part ETag
    #[serde(default)]
    pub etag: String,
}

/// Per-disk object metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Format version
    pub version: String,

    /// Format tag
    pub format: String,

    /// Last modification time of the object
    pub mod_time: DateTime<Utc>,

    /// Object size in bytes
    pub size: u64,

    /// Erasure layout
    pub erasure: ErasureInfo,

    /// Uploaded parts
    #[serde(default)]
    pub parts: Vec<ObjectPart>,
}

impl ObjectMetadata {
    /// Create single-part metadata for an object
    pub fn new(size: u64, mod_time: DateTime<Utc>, erasure: ErasureInfo) -> Self {
        Self {
            version: XL_META_VERSION.to_string(),
            format: XL_META_FORMAT.to_string(),
            mod_time,
            size,
            erasure,
            parts: vec![ObjectPart {
                number: 1,
                name: "part.1".to_string(),
                size,
                etag: String::new(),
            }],
        }
    }

    /// Check that the metadata is a usable xl.json
    pub fn is_valid(&self) -> bool {
        self.version == XL_META_VERSION && self.format == XL_META_FORMAT && self.erasure.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erasure_layout_validity() {
        let layout = ErasureInfo::new(2, 2, 1024 * 1024);
        assert!(layout.is_valid());
        assert_eq!(layout.disk_count(), 4);

        let mut bad = layout.clone();
        bad.distribution = vec![1, 1, 2, 3];
        assert!(!bad.is_valid());

        let mut short = layout.clone();
        short.distribution.pop();
        assert!(!short.is_valid());

        let mut zero = layout;
        zero.distribution = vec![0, 1, 2, 3];
        assert!(!zero.is_valid());
    }

    #[test]
    fn test_shard_roles() {
        let mut layout = ErasureInfo::new(2, 2, 1024);
        layout.distribution = vec![3, 1, 4, 2];
        assert_eq!(layout.is_data_shard(0), Some(false));
        assert_eq!(layout.is_data_shard(1), Some(true));
        assert_eq!(layout.is_data_shard(3), Some(true));
        assert_eq!(layout.is_data_shard(4), None);
        assert_eq!(layout.for_disk(2).index, 4);
    }

    #[test]
    fn test_metadata_json_shape() {
        let meta = ObjectMetadata::new(42, Utc::now(), ErasureInfo::new(1, 1, 1024));
        let json = serde_json::to_string(&meta).unwrap();
        let back: ObjectMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
        assert!(back.is_valid());
    }
}
