//! End-of-run statistics.

use std::collections::BTreeMap;

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::{ErrorType, InfoType, ProcessingStats, SkipReason};
use crate::index::DiscoveryBreakdown;
use crate::live::LiveReport;

/// Entries sorted by count (highest first), then by name.
fn ranked(counts: &BTreeMap<String, usize>) -> Vec<(&str, usize)> {
    let mut entries: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}

/// Logs admitted domains per TLD, the shop count, and URL platform hints.
pub fn print_discovery_breakdown(breakdown: &DiscoveryBreakdown) {
    let total = breakdown.admitted();
    info!("Domains found: {} ({} e-commerce)", total, breakdown.ecommerce);
    if total == 0 {
        return;
    }

    info!("Domains by TLD:");
    for (tld, count) in ranked(&breakdown.per_tld) {
        info!("   .{:<12} {:>8}", tld, count);
    }

    if !breakdown.cms_hints.is_empty() {
        info!("Platforms hinted by URL patterns:");
        for (cms, count) in ranked(&breakdown.cms_hints) {
            info!("   {:<15} {:>8} ({:.1}%)", cms, count, percent(count, total));
        }
    }
}

/// Logs the live verdict counts, detection rate, and platform distribution.
pub fn print_live_breakdown(report: &LiveReport) {
    if report.probed == 0 {
        return;
    }
    info!(
        "Live check: {} checked, {} detected ({:.1}%), {} unknown, {} unreachable",
        report.probed,
        report.detected,
        report.detection_rate(),
        report.unknown,
        report.unreachable
    );
    if report.platforms.is_empty() {
        return;
    }
    info!("Live platforms:");
    for (platform, count) in ranked(&report.platforms) {
        info!(
            "   {:<18} {:>6} ({:.1}%)",
            platform,
            count,
            percent(count, report.detected)
        );
    }
}

/// Prints error, skip, and info counts to the log.
///
/// Categories with a zero count are omitted.
pub fn print_error_statistics(error_stats: &ProcessingStats) {
    let total_errors = error_stats.total_errors();
    let total_skips = error_stats.total_skips();
    let total_info = error_stats.total_info();

    if total_errors > 0 {
        info!("Error Counts ({} total):", total_errors);
        for error_type in ErrorType::iter() {
            let count = error_stats.get_error_count(error_type);
            if count > 0 {
                info!("   {}: {}", error_type.as_str(), count);
            }
        }
    }

    if total_skips > 0 {
        info!("Skip Counts ({} total):", total_skips);
        for reason in SkipReason::iter() {
            let count = error_stats.get_skip_count(reason);
            if count > 0 {
                info!("   {}: {}", reason.as_str(), count);
            }
        }
    }

    if total_info > 0 {
        info!("Info Counts ({} total):", total_info);
        for info_type in InfoType::iter() {
            let count = error_stats.get_info_count(info_type);
            if count > 0 {
                info!("   {}: {}", info_type.as_str(), count);
            }
        }
    }
}
