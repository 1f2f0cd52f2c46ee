//! Error types for ec-walker
//!
//! This module defines the error hierarchy used across the listing path:
//! - Per-disk errors, absorbed by the merge lister and heal evaluator
//! - Walk errors, sent over the tree walk channel
//! - Request validation errors
//! - Configuration errors
//! - The top-level listing error surfaced to callers
//!
//! Per-disk and per-entry failures degrade coverage (fewer disks, fewer
//! entries). Only structural failures leave the listing orchestrator.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for listing operations
#[derive(Error, Debug)]
pub enum ListError {
    /// Argument validation failed
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// Bucket does not exist on any disk that answered
    #[error("Bucket not found: '{bucket}'")]
    BucketNotFound { bucket: String },

    /// Namespace under the prefix is absent on every disk that answered
    #[error("Namespace not found: '{bucket}/{prefix}'")]
    NamespaceNotFound { bucket: String, prefix: String },

    /// No disk could be read at all
    #[error("All disks unavailable while listing '{bucket}/{path}'")]
    AllDisksUnavailable { bucket: String, path: String },

    /// Any other read or metadata fault
    #[error("Object layer error on '{bucket}/{object}': {source}")]
    ObjectLayer {
        bucket: String,
        object: String,
        #[source]
        source: DiskError,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O errors outside of the disk capability
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ListError {
    /// Wrap a disk error with the object it was raised for
    pub fn object_layer(bucket: &str, object: &str, source: DiskError) -> Self {
        ListError::ObjectLayer {
            bucket: bucket.to_string(),
            object: object.to_string(),
            source,
        }
    }

    /// Convert a walk error into a listing error for the given request
    pub fn from_walk(err: WalkError, bucket: &str, prefix: &str) -> Self {
        match err {
            WalkError::NamespaceNotFound { .. } => ListError::NamespaceNotFound {
                bucket: bucket.to_string(),
                prefix: prefix.to_string(),
            },
            WalkError::BucketNotFound { bucket } => ListError::BucketNotFound { bucket },
            WalkError::AllDisksUnavailable { bucket, path } => {
                ListError::AllDisksUnavailable { bucket, path }
            }
        }
    }
}

/// Per-disk errors returned by the disk capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiskError {
    /// Disk is offline or its slot is empty
    #[error("Disk not found: '{endpoint}'")]
    DiskNotFound { endpoint: String },

    /// Bucket (volume) does not exist on this disk
    #[error("Volume not found: '{bucket}'")]
    VolumeNotFound { bucket: String },

    /// Directory or metadata file does not exist on this disk
    #[error("File not found: '{path}'")]
    FileNotFound { path: String },

    /// Metadata exists but cannot be decoded
    #[error("Corrupt metadata at '{path}': {reason}")]
    Corrupt { path: String, reason: String },

    /// Generic I/O failure
    #[error("I/O error at '{path}': {reason}")]
    Io { path: String, reason: String },
}

impl DiskError {
    /// Check if this error means the entry is absent (rather than unreadable)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DiskError::FileNotFound { .. } | DiskError::VolumeNotFound { .. }
        )
    }

    /// Check if this error means the whole disk is unreachable
    pub fn is_disk_offline(&self) -> bool {
        matches!(self, DiskError::DiskNotFound { .. })
    }

    /// Errors that let a metadata lookup move on to the next disk
    pub fn is_ignorable(&self) -> bool {
        self.is_disk_offline() || self.is_not_found()
    }

    /// Map an I/O error raised for `path` into a disk error
    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => DiskError::FileNotFound {
                path: path.to_string(),
            },
            _ => DiskError::Io {
                path: path.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

/// Errors sent over the tree walk channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalkError {
    /// Walk root is missing on every disk that answered
    #[error("Walk root '{path}' not found")]
    NamespaceNotFound { path: String },

    /// Bucket is missing on every disk that answered
    #[error("Bucket '{bucket}' not found")]
    BucketNotFound { bucket: String },

    /// No disk answered for a directory
    #[error("No disk could list '{bucket}/{path}'")]
    AllDisksUnavailable { bucket: String, path: String },
}

/// Argument validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Bucket name violates naming rules
    #[error("Invalid bucket name '{bucket}'")]
    InvalidBucketName { bucket: String },

    /// Prefix is not a valid object prefix
    #[error("Invalid object prefix '{prefix}': {reason}")]
    InvalidObjectPrefix { prefix: String, reason: String },

    /// Marker is not a valid object name
    #[error("Invalid marker '{marker}': {reason}")]
    InvalidMarker { marker: String, reason: String },

    /// Only empty and '/' delimiters are supported
    #[error("Unsupported delimiter '{delimiter}'")]
    UnsupportedDelimiter { delimiter: String },

    /// Marker must start with the prefix
    #[error("Invalid combination of marker '{marker}' and prefix '{prefix}'")]
    InvalidMarkerPrefixCombination { marker: String, prefix: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Disk count out of range
    #[error("Invalid disk count {count}: must be between {min} and {max}")]
    InvalidDiskCount { count: usize, min: usize, max: usize },

    /// Data and parity blocks must cover every disk
    #[error("Invalid erasure layout {data}+{parity} for {disks} disks")]
    InvalidErasureLayout {
        data: usize,
        parity: usize,
        disks: usize,
    },

    /// Pool settings out of range
    #[error("Invalid walk pool setting '{name}': {reason}")]
    InvalidPoolSetting { name: &'static str, reason: String },

    /// Walk channel capacity must be positive
    #[error("Invalid walk buffer size {size}: must be at least 1")]
    InvalidWalkBuffer { size: usize },

    /// Listing page ceiling must be positive
    #[error("Invalid max list keys {value}: must be at least 1")]
    InvalidMaxKeys { value: usize },

    /// Disk path missing or not a directory
    #[error("Invalid disk path '{path}': {reason}")]
    InvalidDiskPath { path: PathBuf, reason: String },
}

/// Result type alias for ListError
pub type Result<T> = std::result::Result<T, ListError>;

/// Result type alias for DiskError
pub type DiskResult<T> = std::result::Result<T, DiskError>;
