//! Report formatting.

use std::fmt::Write as _;
use std::time::Duration;

use crate::workload::WorkloadReport;

/// Workload run time: microseconds below 1 ms, milliseconds below 1 s,
/// seconds above.
#[must_use]
pub fn format_duration(d: Duration) -> String {
    match d.as_micros() {
        us @ 0..=999 => format!("{us}µs"),
        1_000..=999_999 => format!("{:.2}ms", d.as_secs_f64() * 1e3),
        _ => format!("{:.3}s", d.as_secs_f64()),
    }
}

/// Group digits in threes with commas.
#[must_use]
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    out.push_str(&digits[..head]);
    for group in digits.as_bytes()[head..].chunks(3) {
        if !out.is_empty() {
            out.push(',');
        }
        out.extend(group.iter().map(|&b| char::from(b)));
    }
    out
}

/// Format a byte count with a binary unit.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if n < 1024 {
        return format!("{n} B");
    }
    let mut value = n as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// Human-readable report. `verbose` adds the byte and resize breakdown.
#[must_use]
pub fn render_text(reports: &[WorkloadReport], verbose: bool) -> String {
    let mut out = String::new();
    for (i, report) in reports.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let stats = &report.stats;
        let elapsed = Duration::from_micros(report.elapsed_us);
        let _ = writeln!(out, "Workload: {}", report.workload);
        let _ = writeln!(out, "Iterations: {}", format_number(report.iterations));
        let _ = writeln!(out, "Duration: {}", format_duration(elapsed));
        let _ = writeln!(
            out,
            "Pools: {} created, {} deleted, peak {}",
            format_number(stats.pools_created),
            format_number(stats.pools_deleted),
            format_number(report.peak_pools)
        );
        let _ = writeln!(
            out,
            "Chunks: {} allocated, {} released",
            format_number(stats.chunks_allocated),
            format_number(stats.chunks_released)
        );
        let _ = writeln!(out, "Allocations: {}", format_number(stats.allocations));
        let _ = writeln!(out, "Cleanups run: {}", format_number(stats.cleanups_run));
        if verbose {
            let _ = writeln!(out, "Bytes reserved: {}", format_bytes(stats.bytes_reserved));
            let _ = writeln!(out, "Bytes released: {}", format_bytes(stats.bytes_released));
            let _ = writeln!(
                out,
                "Resizes: {} in place, {} by copy",
                format_number(stats.in_place_resizes),
                format_number(stats.copying_resizes)
            );
        }
        let _ = writeln!(out, "Status: OK");
    }

    if reports.len() > 1 {
        let _ = writeln!(out, "\nSummary:");
        let _ = writeln!(out, "{:-<60}", "");
        for report in reports {
            let _ = writeln!(
                out,
                "  {:<20} {:>12} {:>14} [OK]",
                report.workload,
                format_duration(Duration::from_micros(report.elapsed_us)),
                format_bytes(report.stats.bytes_reserved),
            );
        }
    }
    out
}

/// Machine-readable report.
pub fn render_json(reports: &[WorkloadReport]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(reports)
}
