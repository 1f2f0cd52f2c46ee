//! Progress reporting for the listing CLI
//!
//! Spinner while pages are fetched, then a per-page table and a final
//! summary.

use crate::heal::HealState;
use crate::listing::{ListObjectsInfo, ObjectInfo};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Running totals across listing pages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingTotals {
    pub pages: u64,
    pub objects: u64,
    pub prefixes: u64,
    pub bytes: u64,

    /// Objects reported with a heal status
    pub heal_candidates: u64,

    /// Heal candidates without read quorum
    pub quorum_lost: u64,
}

impl ListingTotals {
    /// Fold one page into the totals
    pub fn add_page(&mut self, page: &ListObjectsInfo) {
        self.pages += 1;
        self.objects += page.objects.len() as u64;
        self.prefixes += page.prefixes.len() as u64;
        for object in &page.objects {
            self.bytes += object.size;
            if let Some(status) = &object.heal {
                self.heal_candidates += 1;
                if !status.quorum_available {
                    self.quorum_lost += 1;
                }
            }
        }
    }
}

/// Spinner showing listing progress
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, totals: &ListingTotals) {
        let msg = format!(
            "Pages: {} | Objects: {} | Prefixes: {} | Size: {} | Heal: {}",
            format_number(totals.pages),
            format_number(totals.objects),
            format_number(totals.prefixes),
            format_size(totals.bytes, BINARY),
            format_number(totals.heal_candidates),
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Print a line above the spinner
    pub fn println(&self, line: &str) {
        self.bar.println(line);
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// One table row for a listed entry
pub fn format_row(info: &ObjectInfo) -> String {
    if info.is_dir {
        return format!("{:>10}  {:<19}  {}", "DIR", "", style(&info.name).blue());
    }

    let modified = info
        .mod_time
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    let size = format_size(info.size, BINARY);

    match &info.heal {
        Some(status) => {
            let state = match status.state {
                HealState::Healthy => style(status.state.to_string()).green(),
                HealState::CanHeal | HealState::CanPartiallyHeal => style(status.state.to_string()).yellow(),
                HealState::Corrupted | HealState::QuorumUnavailable => style(status.state.to_string()).red(),
            };
            format!(
                "{:>10}  {:<19}  {}  [{} missing={} corrupt={}]",
                size, modified, info.name, state, status.disks_missing, status.disks_corrupt
            )
        }
        None => format!("{:>10}  {:<19}  {}", size, modified, info.name),
    }
}

/// Print a summary of the listing
pub fn print_summary(totals: &ListingTotals, duration: Duration, heal: bool, truncated: bool) {
    let duration_secs = duration.as_secs_f64();

    println!();
    if truncated {
        println!("{}", style("Listing Truncated").yellow().bold());
    } else {
        println!("{}", style("Listing Complete").green().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Pages:").bold(), format_number(totals.pages));
    println!("  {} {}", style("Objects:").bold(), format_number(totals.objects));
    println!("  {} {}", style("Prefixes:").bold(), format_number(totals.prefixes));
    println!("  {} {}", style("Total Size:").bold(), format_size(totals.bytes, BINARY));
    if heal {
        println!(
            "  {} {}",
            style("Need Heal:").yellow().bold(),
            format_number(totals.heal_candidates)
        );
        if totals.quorum_lost > 0 {
            println!(
                "  {} {}",
                style("No Quorum:").red().bold(),
                format_number(totals.quorum_lost)
            );
        }
    }
    println!("  {} {:.1}s", style("Duration:").bold(), duration_secs);
    println!();
}

/// Print a header at the start of the listing
pub fn print_header(bucket: &str, prefix: &str, disks: usize, online: usize, data: usize, parity: usize) {
    println!();
    println!(
        "{} {}",
        style("ec-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Bucket:").bold(), bucket);
    if !prefix.is_empty() {
        println!("  {} {}", style("Prefix:").bold(), prefix);
    }
    println!("  {} {}/{} online", style("Disks:").bold(), online, disks);
    println!("  {} {}+{}", style("Layout:").bold(), data, parity);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heal::HealStatus;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_totals() {
        let status = HealStatus {
            object_healthy: false,
            disks_missing: 3,
            disks_corrupt: 0,
            quorum_available: false,
            state: HealState::QuorumUnavailable,
            missing_data: 2,
            missing_parity: 1,
        };
        let page = ListObjectsInfo {
            is_truncated: false,
            next_marker: "b".into(),
            objects: vec![ObjectInfo {
                bucket: "bucket".into(),
                name: "b".into(),
                is_dir: false,
                mod_time: None,
                size: 2048,
                heal: Some(status),
            }],
            prefixes: vec!["a/".into()],
        };

        let mut totals = ListingTotals::default();
        totals.add_page(&page);
        totals.add_page(&ListObjectsInfo::default());
        assert_eq!(totals.pages, 2);
        assert_eq!(totals.objects, 1);
        assert_eq!(totals.prefixes, 1);
        assert_eq!(totals.bytes, 2048);
        assert_eq!(totals.heal_candidates, 1);
        assert_eq!(totals.quorum_lost, 1);
    }

    #[test]
    fn test_format_row_directory() {
        let row = format_row(&ObjectInfo::directory("bucket", "photos/"));
        assert!(row.contains("DIR"));
        assert!(row.contains("photos/"));
    }
}
