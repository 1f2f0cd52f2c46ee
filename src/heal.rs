//! Heal evaluator
//!
//! Decides from one metadata read per disk whether an object needs healing.
//! Readable copies vote on a fingerprint of the attributes that define the
//! object (modification time, size, erasure layout, part list). The most
//! common fingerprint is the quorum reference; every copy that is missing,
//! unreadable or disagrees with it counts against the object.
//!
//! Disagreement is reported as data in [`HealStatus`], never as an error.

use crate::disk::{ErasureInfo, ObjectMetadata};
use crate::error::DiskResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Coarse repair outlook for an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealState {
    /// Nothing to repair
    Healthy,

    /// Enough consistent copies exist to rebuild every bad shard
    CanHeal,

    /// Rebuildable, but some disks are offline and cannot be written yet
    CanPartiallyHeal,

    /// The agreed layout does not fit this disk set
    Corrupted,

    /// Too few consistent copies to rebuild from
    QuorumUnavailable,
}

impl std::fmt::Display for HealState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealState::Healthy => "healthy",
            HealState::CanHeal => "can-heal",
            HealState::CanPartiallyHeal => "can-partially-heal",
            HealState::Corrupted => "corrupted",
            HealState::QuorumUnavailable => "quorum-unavailable",
        };
        f.write_str(s)
    }
}

/// Heal summary for one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealStatus {
    /// Quorum met and every disk holds a consistent copy
    pub object_healthy: bool,

    /// Disks that are offline or have no copy
    pub disks_missing: usize,

    /// Disks whose copy is unreadable, invalid or disagrees with the quorum
    pub disks_corrupt: usize,

    /// Consistent copies meet the read quorum
    pub quorum_available: bool,

    pub state: HealState,

    /// Bad shards that held data
    pub missing_data: usize,

    /// Bad shards that held parity
    pub missing_parity: usize,
}

impl HealStatus {
    pub fn needs_heal(&self) -> bool {
        !self.object_healthy
    }
}

/// Attributes copies must agree on
#[derive(Debug, PartialEq, Eq)]
struct Fingerprint<'a> {
    mod_time: DateTime<Utc>,
    size: u64,
    data_blocks: usize,
    parity_blocks: usize,
    block_size: u64,
    distribution: &'a [usize],
    parts: Vec<(u32, u64)>,
}

impl<'a> Fingerprint<'a> {
    fn of(meta: &'a ObjectMetadata) -> Self {
        Self {
            mod_time: meta.mod_time,
            size: meta.size,
            data_blocks: meta.erasure.data_blocks,
            parity_blocks: meta.erasure.parity_blocks,
            block_size: meta.erasure.block_size,
            distribution: &meta.erasure.distribution,
            parts: meta.parts.iter().map(|p| (p.number, p.size)).collect(),
        }
    }
}

/// Per-disk verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyState {
    Consistent,
    Missing { offline: bool },
    Corrupt,
}

/// Evaluates per-disk metadata against a read quorum
#[derive(Debug, Clone, Copy)]
pub struct HealEvaluator {
    read_quorum: usize,
}

impl HealEvaluator {
    pub fn new(read_quorum: usize) -> Self {
        Self {
            read_quorum: read_quorum.max(1),
        }
    }

    pub fn read_quorum(&self) -> usize {
        self.read_quorum
    }

    /// Evaluate one metadata read result per disk, in disk order
    pub fn evaluate(&self, metas: &[DiskResult<ObjectMetadata>]) -> HealStatus {
        let reference = quorum_reference(metas);
        let reference_fp = reference.map(Fingerprint::of);

        let states: Vec<CopyState> = metas
            .iter()
            .map(|result| match result {
                Ok(meta) if meta.is_valid() && reference_fp.as_ref() == Some(&Fingerprint::of(meta)) => {
                    CopyState::Consistent
                }
                Ok(_) => CopyState::Corrupt,
                Err(e) if e.is_disk_offline() => CopyState::Missing { offline: true },
                Err(e) if e.is_not_found() => CopyState::Missing { offline: false },
                Err(_) => CopyState::Corrupt,
            })
            .collect();

        let consistent = states.iter().filter(|s| **s == CopyState::Consistent).count();
        let disks_missing = states
            .iter()
            .filter(|s| matches!(s, CopyState::Missing { .. }))
            .count();
        let disks_corrupt = states.iter().filter(|s| **s == CopyState::Corrupt).count();
        let any_offline = states.contains(&CopyState::Missing { offline: true });

        let quorum_available = reference.is_some() && consistent >= self.read_quorum;
        let object_healthy = quorum_available && disks_missing == 0 && disks_corrupt == 0;

        let (missing_data, missing_parity) = match reference {
            Some(meta) => count_missing_shards(&meta.erasure, &states),
            None => (0, 0),
        };

        let state = if object_healthy {
            HealState::Healthy
        } else if !quorum_available {
            HealState::QuorumUnavailable
        } else if reference.is_some_and(|m| m.erasure.disk_count() != metas.len()) {
            HealState::Corrupted
        } else if any_offline {
            HealState::CanPartiallyHeal
        } else {
            HealState::CanHeal
        };

        HealStatus {
            object_healthy,
            disks_missing,
            disks_corrupt,
            quorum_available,
            state,
            missing_data,
            missing_parity,
        }
    }
}

/// Pick the copy whose fingerprint most copies share
///
/// Ties go to the later modification time, then to the lower disk position.
fn quorum_reference(metas: &[DiskResult<ObjectMetadata>]) -> Option<&ObjectMetadata> {
    let valid: Vec<&ObjectMetadata> = metas
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .filter(|m| m.is_valid())
        .collect();

    let mut groups: Vec<(Fingerprint<'_>, usize, &ObjectMetadata)> = Vec::new();
    for meta in valid {
        let fp = Fingerprint::of(meta);
        match groups.iter_mut().find(|(g, _, _)| *g == fp) {
            Some((_, count, _)) => *count += 1,
            None => groups.push((fp, 1, meta)),
        }
    }

    let mut best: Option<(usize, &ObjectMetadata)> = None;
    for (_, count, meta) in groups {
        best = match best {
            Some((best_count, best_meta))
                if best_count > count || (best_count == count && best_meta.mod_time >= meta.mod_time) =>
            {
                Some((best_count, best_meta))
            }
            _ => Some((count, meta)),
        };
    }
    best.map(|(_, meta)| meta)
}

/// Split bad disk positions into data and parity shards
fn count_missing_shards(erasure: &ErasureInfo, states: &[CopyState]) -> (usize, usize) {
    let mut data = 0;
    let mut parity = 0;
    for (position, state) in states.iter().enumerate() {
        if *state == CopyState::Consistent {
            continue;
        }
        match erasure.is_data_shard(position) {
            Some(true) => data += 1,
            Some(false) => parity += 1,
            None => {}
        }
    }
    (data, parity)
}
