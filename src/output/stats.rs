//! Statistics reports for the terminal
//!
//! This module renders history ledger statistics, proxy pool health, run
//! reports and sweep plans as plain text.

use crate::crawler::RunReport;
use crate::history::{HistoryEntry, TorrentVariant};
use crate::proxy::PoolStatistics;
use crate::sweep::{format_size, SweepPlan};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

/// History ledger statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStatistics {
    /// Total number of entries after dedup
    pub total_entries: usize,

    /// Count of entries by phase
    pub entries_by_phase: BTreeMap<u8, usize>,

    /// Count of entries holding each variant, in ledger column order
    pub variant_counts: Vec<(TorrentVariant, usize)>,

    /// Entries holding both preferred variants
    pub complete_entries: usize,
}

/// Computes statistics over a loaded history map
///
/// # Arguments
///
/// * `entries` - The deduped history, as returned by `HistoryStore::load`
pub fn history_statistics(entries: &HashMap<String, HistoryEntry>) -> HistoryStatistics {
    let mut entries_by_phase = BTreeMap::new();
    let mut complete_entries = 0;
    for entry in entries.values() {
        *entries_by_phase.entry(entry.phase).or_insert(0) += 1;
        let present = entry.links.present();
        if TorrentVariant::PREFERRED.iter().all(|v| present.contains(v)) {
            complete_entries += 1;
        }
    }

    let variant_counts = TorrentVariant::all()
        .into_iter()
        .map(|variant| {
            let count = entries
                .values()
                .filter(|e| !e.links.get(variant).is_empty())
                .count();
            (variant, count)
        })
        .collect();

    HistoryStatistics {
        total_entries: entries.len(),
        entries_by_phase,
        variant_counts,
        complete_entries,
    }
}

pub fn render_history_statistics(stats: &HistoryStatistics, location: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== History Statistics ===\n");
    let _ = writeln!(out, "Ledger: {}", location);
    let _ = writeln!(out, "  Total entries: {}", stats.total_entries);
    for (phase, count) in &stats.entries_by_phase {
        let _ = writeln!(out, "  Phase {}: {}", phase, count);
    }
    let _ = writeln!(out, "\nVariants:");
    for (variant, count) in &stats.variant_counts {
        let _ = writeln!(out, "  {}: {}", variant, count);
    }

    let percentage = if stats.total_entries > 0 {
        (stats.complete_entries as f64 / stats.total_entries as f64) * 100.0
    } else {
        0.0
    };
    let _ = writeln!(
        out,
        "\nComplete: {:.1}% ({} / {} entries hold every preferred variant)",
        percentage, stats.complete_entries, stats.total_entries
    );
    out
}

pub fn render_pool_statistics(stats: &PoolStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Proxy Pool ===\n");
    let _ = writeln!(
        out,
        "  Proxies: {} total, {} available, {} in cooldown",
        stats.total_proxies, stats.available_proxies, stats.in_cooldown
    );
    if stats.no_proxy_mode {
        let _ = writeln!(out, "  No-proxy mode is active");
    }
    for proxy in &stats.proxies {
        let marker = if proxy.is_current { "*" } else { " " };
        let state = if proxy.in_cooldown {
            "cooldown"
        } else if proxy.is_available {
            "available"
        } else {
            "unavailable"
        };
        let _ = writeln!(
            out,
            " {} {}: {} ({}/{} ok, {:.1}%, {} consecutive failures)",
            marker,
            proxy.name,
            state,
            proxy.successful_requests,
            proxy.total_requests,
            proxy.success_rate,
            proxy.consecutive_failures
        );
    }
    out
}

pub fn render_run_report(report: &RunReport) -> String {
    let mut out = String::new();
    let title = if report.dry_run { "Dry Run Report" } else { "Run Report" };
    let _ = writeln!(out, "=== {} ===\n", title);
    for phase in &report.phases {
        let _ = writeln!(out, "Phase {}:", phase.phase);
        let _ = writeln!(
            out,
            "  Listing pages: {} fetched, {} failed",
            phase.pages_fetched, phase.pages_failed
        );
        let _ = writeln!(
            out,
            "  Entries: {} seen, {} selected",
            phase.entries_seen, phase.entries_selected
        );
        let new = phase.captured.iter().filter(|c| c.is_new).count();
        let _ = writeln!(
            out,
            "  Captured: {} ({} new, {} updated)",
            phase.captured.len(),
            new,
            phase.captured.len() - new
        );
        let _ = writeln!(
            out,
            "  Skipped: {}, failed details: {}",
            phase.skipped, phase.failed_details
        );
        for captured in &phase.captured {
            let variants: Vec<String> = captured.variants.iter().map(|v| v.to_string()).collect();
            let _ = writeln!(out, "    - {} [{}]", captured.label, variants.join(", "));
        }
    }
    let _ = writeln!(
        out,
        "\nTotal: {} pages, {} captured in {:.0}s",
        report.pages_fetched(),
        report.captured(),
        report.elapsed.as_secs_f64()
    );
    out
}

pub fn render_sweep_plan(plan: &SweepPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Sweep Plan ===\n");
    let _ = writeln!(out, "  Codes: {}", plan.codes());
    let _ = writeln!(out, "  Keep: {} folders", plan.keep.len());
    let _ = writeln!(
        out,
        "  Delete: {} folders ({})",
        plan.delete.len(),
        format_size(plan.reclaimable_bytes())
    );
    for deletion in &plan.delete {
        let _ = writeln!(
            out,
            "    - {} ({}): {}",
            deletion.folder.path.display(),
            format_size(deletion.folder.size),
            deletion.reason
        );
    }
    out
}
