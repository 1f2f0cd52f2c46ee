//! Configuration types for ec-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Erasure set configuration with validation
//! - The erasure layout (data/parity split) derived from the disk count

use crate::error::ConfigError;
use crate::walker::PoolConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Fewest disks an erasure set may have
pub const MIN_DISKS: usize = 1;

/// Most disks an erasure set may have
pub const MAX_DISKS: usize = 32;

/// Ceiling on entries returned by one listing call
pub const MAX_OBJECT_LIST: usize = 1000;

/// Default tree walk channel capacity
pub const DEFAULT_WALK_BUFFER: usize = 1000;

/// Merged listing and heal detection over erasure-coded disks
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ec-walker",
    version,
    about = "List objects that need healing across erasure-coded disks",
    long_about = "Walks a bucket across every disk of an erasure set, merges the per-disk\n\
                  listings and reports objects whose metadata disagrees between disks.\n\n\
                  Each disk is a directory holding one sub-directory per bucket.",
    after_help = "EXAMPLES:\n    \
        ec-walker /mnt/disk1 /mnt/disk2 /mnt/disk3 /mnt/disk4 --bucket photos\n    \
        ec-walker /mnt/disk{1..4} --bucket photos --prefix 2017/ --delimiter /\n    \
        ec-walker /mnt/disk{1..4} --bucket photos --plain --all-pages --json"
)]
pub struct CliArgs {
    /// Disk root directories, in erasure set order
    #[arg(value_name = "DISK", required = true)]
    pub disks: Vec<PathBuf>,

    /// Bucket to list
    #[arg(short = 'b', long, value_name = "BUCKET")]
    pub bucket: String,

    /// Only list names starting with this prefix
    #[arg(short = 'p', long, default_value = "", value_name = "PREFIX")]
    pub prefix: String,

    /// Resume after this name
    #[arg(short = 'm', long, default_value = "", value_name = "NAME")]
    pub marker: String,

    /// Group names by this delimiter (only "/" is supported)
    #[arg(short = 'd', long, default_value = "", value_name = "DELIM")]
    pub delimiter: String,

    /// Entries per page
    #[arg(short = 'n', long, default_value = "1000", value_name = "NUM")]
    pub max_keys: i32,

    /// Number of data shards (defaults to half the disks, rounded up)
    #[arg(long, value_name = "NUM")]
    pub data_blocks: Option<usize>,

    /// Number of parity shards (defaults to the remaining disks)
    #[arg(long, value_name = "NUM")]
    pub parity_blocks: Option<usize>,

    /// Seconds an unfinished walk stays resumable
    #[arg(long, default_value = "1800", value_name = "SECS")]
    pub pool_timeout: u64,

    /// Keep following the next marker until the listing is exhausted
    #[arg(short = 'a', long)]
    pub all_pages: bool,

    /// List every object instead of only those needing heal
    #[arg(long)]
    pub plain: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (show errors and warnings)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Data/parity split of an erasure set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErasureLayout {
    pub data_blocks: usize,
    pub parity_blocks: usize,
}

impl ErasureLayout {
    /// Default split for `disks` drives: half parity, rounded down
    pub fn for_disks(disks: usize) -> Self {
        let parity_blocks = disks / 2;
        Self {
            data_blocks: disks - parity_blocks,
            parity_blocks,
        }
    }

    /// Consistent copies needed to read an object
    pub fn read_quorum(&self) -> usize {
        self.data_blocks
    }

    pub fn disk_count(&self) -> usize {
        self.data_blocks + self.parity_blocks
    }
}

/// Erasure set settings
#[derive(Debug, Clone)]
pub struct SetConfig {
    /// Data shards; derived from the disk count when unset
    pub data_blocks: Option<usize>,

    /// Parity shards; derived from the disk count when unset
    pub parity_blocks: Option<usize>,

    /// Lifetime of a parked walk
    pub pool_timeout: Duration,

    /// Pool janitor interval
    pub pool_sweep_interval: Duration,

    /// Most walks parked at once
    pub pool_max_entries: usize,

    /// Tree walk channel capacity
    pub walk_buffer: usize,

    /// Ceiling on entries per listing call
    pub max_list_keys: usize,
}

impl Default for SetConfig {
    fn default() -> Self {
        let pool = PoolConfig::default();
        Self {
            data_blocks: None,
            parity_blocks: None,
            pool_timeout: pool.timeout,
            pool_sweep_interval: pool.sweep_interval,
            pool_max_entries: pool.max_entries,
            walk_buffer: DEFAULT_WALK_BUFFER,
            max_list_keys: MAX_OBJECT_LIST,
        }
    }
}

impl SetConfig {
    /// Validate against a disk count and resolve the erasure layout
    pub fn validate(&self, disk_count: usize) -> Result<ErasureLayout, ConfigError> {
        if !(MIN_DISKS..=MAX_DISKS).contains(&disk_count) {
            return Err(ConfigError::InvalidDiskCount {
                count: disk_count,
                min: MIN_DISKS,
                max: MAX_DISKS,
            });
        }

        let layout = match (self.data_blocks, self.parity_blocks) {
            (None, None) => ErasureLayout::for_disks(disk_count),
            (Some(data), None) => ErasureLayout {
                data_blocks: data,
                parity_blocks: disk_count.saturating_sub(data),
            },
            (None, Some(parity)) => ErasureLayout {
                data_blocks: disk_count.saturating_sub(parity),
                parity_blocks: parity,
            },
            (Some(data), Some(parity)) => ErasureLayout {
                data_blocks: data,
                parity_blocks: parity,
            },
        };

        if layout.data_blocks == 0 || layout.disk_count() != disk_count {
            return Err(ConfigError::InvalidErasureLayout {
                data: layout.data_blocks,
                parity: layout.parity_blocks,
                disks: disk_count,
            });
        }

        if self.pool_timeout.is_zero() {
            return Err(ConfigError::InvalidPoolSetting {
                name: "pool_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.pool_sweep_interval.is_zero() {
            return Err(ConfigError::InvalidPoolSetting {
                name: "pool_sweep_interval",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.pool_max_entries == 0 {
            return Err(ConfigError::InvalidPoolSetting {
                name: "pool_max_entries",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.walk_buffer == 0 {
            return Err(ConfigError::InvalidWalkBuffer {
                size: self.walk_buffer,
            });
        }

        if self.max_list_keys == 0 {
            return Err(ConfigError::InvalidMaxKeys {
                value: self.max_list_keys,
            });
        }

        Ok(layout)
    }

    /// Erasure set settings from CLI arguments, validated against the disk count
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let config = Self {
            data_blocks: args.data_blocks,
            parity_blocks: args.parity_blocks,
            pool_timeout: Duration::from_secs(args.pool_timeout),
            ..Self::default()
        };
        config.validate(args.disks.len())?;
        Ok(config)
    }

    /// Walk pool settings
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            timeout: self.pool_timeout,
            sweep_interval: self.pool_sweep_interval,
            max_entries: self.pool_max_entries,
        }
    }
}

/// Validated runtime configuration for the CLI
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Disk root directories
    pub disks: Vec<PathBuf>,

    /// Bucket to list
    pub bucket: String,

    pub prefix: String,
    pub marker: String,
    pub delimiter: String,
    pub max_keys: i32,

    /// Erasure set settings
    pub set: SetConfig,

    /// Follow next markers to the end
    pub all_pages: bool,

    /// Plain listing instead of heal listing
    pub plain: bool,

    /// JSON output
    pub json: bool,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl RunConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let set = SetConfig::from_args(&args)?;

        // Missing disks are tolerated later, but a path that exists must be a directory
        if let Some(bad) = args.disks.iter().find(|p| p.exists() && !p.is_dir()) {
            return Err(ConfigError::InvalidDiskPath {
                path: bad.clone(),
                reason: "not a directory".to_string(),
            });
        }

        Ok(Self {
            disks: args.disks,
            bucket: args.bucket,
            prefix: args.prefix,
            marker: args.marker,
            delimiter: args.delimiter,
            max_keys: args.max_keys,
            set,
            all_pages: args.all_pages,
            plain: args.plain,
            json: args.json,
            show_progress: !args.quiet && !args.json,
            verbose: args.verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> CliArgs {
        let mut argv = vec!["ec-walker", "d1", "d2", "d3", "d4", "--bucket", "photos"];
        argv.extend_from_slice(extra);
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_default_layout() {
        assert_eq!(ErasureLayout::for_disks(4), ErasureLayout { data_blocks: 2, parity_blocks: 2 });
        assert_eq!(ErasureLayout::for_disks(5), ErasureLayout { data_blocks: 3, parity_blocks: 2 });
        assert_eq!(ErasureLayout::for_disks(1), ErasureLayout { data_blocks: 1, parity_blocks: 0 });
        assert_eq!(ErasureLayout::for_disks(4).read_quorum(), 2);
    }

    #[test]
    fn test_layout_from_partial_settings() {
        let config = SetConfig {
            data_blocks: Some(3),
            ..SetConfig::default()
        };
        assert_eq!(config.validate(4).unwrap(), ErasureLayout { data_blocks: 3, parity_blocks: 1 });

        let config = SetConfig {
            parity_blocks: Some(1),
            ..SetConfig::default()
        };
        assert_eq!(config.validate(6).unwrap().data_blocks, 5);
    }

    #[test]
    fn test_invalid_layouts() {
        let config = SetConfig {
            data_blocks: Some(2),
            parity_blocks: Some(3),
            ..SetConfig::default()
        };
        assert!(matches!(config.validate(4), Err(ConfigError::InvalidErasureLayout { .. })));

        let config = SetConfig {
            parity_blocks: Some(4),
            ..SetConfig::default()
        };
        assert!(matches!(config.validate(4), Err(ConfigError::InvalidErasureLayout { .. })));
    }

    #[test]
    fn test_disk_count_bounds() {
        let config = SetConfig::default();
        assert!(matches!(config.validate(0), Err(ConfigError::InvalidDiskCount { .. })));
        assert!(matches!(config.validate(MAX_DISKS + 1), Err(ConfigError::InvalidDiskCount { .. })));
        assert!(config.validate(MAX_DISKS).is_ok());
    }

    #[test]
    fn test_pool_settings() {
        let config = SetConfig {
            pool_timeout: Duration::ZERO,
            ..SetConfig::default()
        };
        assert!(matches!(
            config.validate(4),
            Err(ConfigError::InvalidPoolSetting { name: "pool_timeout", .. })
        ));

        let config = SetConfig {
            walk_buffer: 0,
            ..SetConfig::default()
        };
        assert!(matches!(config.validate(4), Err(ConfigError::InvalidWalkBuffer { .. })));

        let config = SetConfig {
            max_list_keys: 0,
            ..SetConfig::default()
        };
        assert!(matches!(config.validate(4), Err(ConfigError::InvalidMaxKeys { value: 0 })));
    }

    #[test]
    fn test_from_args() {
        let config = RunConfig::from_args(args(&["--prefix", "2017/", "-d", "/", "--json"])).unwrap();
        assert_eq!(config.disks.len(), 4);
        assert_eq!(config.bucket, "photos");
        assert_eq!(config.prefix, "2017/");
        assert_eq!(config.delimiter, "/");
        assert_eq!(config.max_keys, 1000);
        assert!(!config.show_progress);
        assert_eq!(config.set.pool_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn test_from_args_rejects_bad_layout() {
        let result = RunConfig::from_args(args(&["--data-blocks", "5"]));
        assert!(matches!(result, Err(ConfigError::InvalidErasureLayout { .. })));
    }
}
