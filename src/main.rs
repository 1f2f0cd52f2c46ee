//! ec-walker - Merged Listing and Heal Detection for Erasure-Coded Storage
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use ec_walker::config::{CliArgs, RunConfig};
use ec_walker::disk::{Disk, DiskSet, LocalDisk};
use ec_walker::listing::{ErasureSet, ListObjectsInfo, ObjectInfo};
use ec_walker::progress::{format_row, print_header, print_summary, ListingTotals, ProgressReporter};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    // Validate and create config
    let config = RunConfig::from_args(args).context("Invalid configuration")?;

    let disks = open_disks(&config);
    let mut set = ErasureSet::new(disks, config.set.clone()).context("Failed to initialize erasure set")?;

    if config.show_progress {
        let layout = set.layout();
        print_header(
            &config.bucket,
            &config.prefix,
            set.disks().len(),
            set.disks().online_count(),
            layout.data_blocks,
            layout.parity_blocks,
        );
    }

    let result = list_pages(&set, &config);
    set.shutdown();
    result
}

/// Open every disk root; a missing root leaves its slot empty
fn open_disks(config: &RunConfig) -> DiskSet {
    let slots = config
        .disks
        .iter()
        .map(|path| match LocalDisk::open(path) {
            Ok(disk) => Some(Arc::new(disk) as Arc<dyn Disk>),
            Err(e) => {
                warn!(disk = %path.display(), error = %e, "Disk unavailable");
                None
            }
        })
        .collect();
    DiskSet::new(slots)
}

fn list_pages(set: &ErasureSet, config: &RunConfig) -> Result<()> {
    let progress = if config.show_progress {
        Some(ProgressReporter::new())
    } else {
        None
    };

    if let Some(ref p) = progress {
        p.set_status("Listing...");
    }

    let start = Instant::now();
    let mut totals = ListingTotals::default();
    let mut pages: Vec<ListObjectsInfo> = Vec::new();
    let mut marker = config.marker.clone();

    let truncated = loop {
        let listed = if config.plain {
            set.list_objects(&config.bucket, &config.prefix, &marker, &config.delimiter, config.max_keys)
        } else {
            set.list_objects_heal(&config.bucket, &config.prefix, &marker, &config.delimiter, config.max_keys)
        };
        let page = listed.with_context(|| format!("Listing bucket '{}' failed", config.bucket))?;

        totals.add_page(&page);
        if let Some(ref p) = progress {
            p.update(&totals);
        }

        if !config.json {
            for prefix in &page.prefixes {
                emit(progress.as_ref(), &format_row(&ObjectInfo::directory(&config.bucket, prefix)));
            }
            for object in &page.objects {
                emit(progress.as_ref(), &format_row(object));
            }
        }

        let more = page.is_truncated;
        marker.clone_from(&page.next_marker);
        if config.json {
            pages.push(page);
        }

        if !more {
            break false;
        }
        if !config.all_pages {
            break true;
        }
    };

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    if config.json {
        let json = serde_json::to_string_pretty(&pages).context("Failed to encode listing")?;
        println!("{}", json);
    } else {
        print_summary(&totals, start.elapsed(), !config.plain, truncated);
        if truncated {
            info!(next_marker = %marker, "More entries remain; pass --marker or --all-pages");
        }
    }

    Ok(())
}

fn emit(progress: Option<&ProgressReporter>, line: &str) {
    match progress {
        Some(p) => p.println(line),
        None => println!("{}", line),
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("ec_walker=debug,warn")
    } else {
        EnvFilter::new("ec_walker=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
