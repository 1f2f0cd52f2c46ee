//! Benchmarks for ec-walker
//!
//! Run with: cargo bench

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ec_walker::config::SetConfig;
use ec_walker::disk::{Disk, DiskSet, ErasureInfo, MemoryDisk, ObjectMetadata};
use ec_walker::listing::ErasureSet;
use ec_walker::walker::{merge_list, MergeMode};
use std::sync::Arc;

/// Four disks holding `objects` objects each, every fourth missing from one disk
fn build_disks(objects: usize) -> DiskSet {
    let layout = ErasureInfo::new(2, 2, 1024 * 1024);
    let now = Utc::now();
    let disks: Vec<Arc<dyn Disk>> = (0..4)
        .map(|d| {
            let disk = MemoryDisk::new(format!("mem{}", d));
            disk.make_bucket("bench");
            for i in 0..objects {
                if i % 4 == d {
                    continue;
                }
                let name = format!("dir{:02}/obj{:05}", i % 16, i);
                disk.put_object("bench", &name, ObjectMetadata::new(4096, now, layout.clone().for_disk(d)));
            }
            Arc::new(disk) as Arc<dyn Disk>
        })
        .collect();
    DiskSet::from_disks(disks)
}

fn benchmark_merge_list(c: &mut Criterion) {
    let disks = build_disks(4000);

    c.bench_function("merge_list_union_dir", |b| {
        b.iter(|| {
            let listing = merge_list(&disks, "bench", "dir03/", "", MergeMode::Union, |bucket, path| {
                disks.is_object(bucket, path)
            });
            black_box(listing);
        })
    });
}

fn benchmark_heal_listing(c: &mut Criterion) {
    let set = ErasureSet::new(build_disks(1000), SetConfig::default()).unwrap();

    c.bench_function("list_objects_heal_full", |b| {
        b.iter(|| {
            let page = set.list_objects_heal("bench", "", "", "", 1000).unwrap();
            black_box(page);
        })
    });
}

criterion_group!(benches, benchmark_merge_list, benchmark_heal_listing);
criterion_main!(benches);
