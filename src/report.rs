use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::Path;

use crate::types::{AggregateReport, ProbeOutcome};

/// Print the end-of-run summary: counts, then the `top_n` fastest proxies as a table.
pub fn print_summary(report: &AggregateReport, top_n: usize) {
    println!("\n=== PROXY TEST RESULTS ===");
    println!("Total proxies  : {}", report.total_count);
    println!("Working proxies: {}", report.success_count);
    println!("Failed proxies : {}", report.failure_count);

    let top = report.top_n(top_n);
    if top.is_empty() {
        return;
    }

    let rank_w = 4usize;
    let proxy_w = proxy_column_width(top);
    let lat_w = "latency_ms".len();

    println!("\nTop {} fastest proxies:", top.len());
    println!(
        "{:>rank_w$}  {:<proxy_w$}  {:>lat_w$}",
        "#",
        "proxy",
        "latency_ms",
        rank_w = rank_w,
        proxy_w = proxy_w,
        lat_w = lat_w
    );
    println!(
        "{:-<rank_w$}  {:-<proxy_w$}  {:-<lat_w$}",
        "",
        "",
        "",
        rank_w = rank_w,
        proxy_w = proxy_w,
        lat_w = lat_w
    );
    for (i, o) in top.iter().enumerate() {
        let proxy = proxy_cell(&o.descriptor.raw);
        println!(
            "{:>rank_w$}  {:<proxy_w$}  {:>lat_w$}",
            i + 1,
            proxy,
            o.latency_ms.unwrap_or_default(),
            rank_w = rank_w,
            proxy_w = proxy_w,
            lat_w = lat_w
        );
    }
}

const PROXY_CELL_MAX: usize = 60;

// Widths are counted in chars so non-ASCII hosts line up with the padding `{:<w$}` applies.
fn proxy_cell(raw: &str) -> String {
    raw.chars().take(PROXY_CELL_MAX).collect()
}

fn proxy_column_width(rows: &[ProbeOutcome]) -> usize {
    rows.iter()
        .map(|o| proxy_cell(&o.descriptor.raw).chars().count())
        .fold("proxy".len(), usize::max)
}

/// Render the working-proxies file body: `<raw line> # <latency>ms` per success, ranked.
pub fn render_working_proxies(report: &AggregateReport) -> String {
    report
        .ordered_successes
        .iter()
        .map(|o| format!("{} # {}ms", o.descriptor.raw, o.latency_ms.unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Overwrite `path` with the working proxies. Writes nothing and returns `false` when none succeeded.
pub fn write_working_proxies(path: &Path, report: &AggregateReport) -> Result<bool> {
    if !report.has_successes() {
        return Ok(false);
    }
    fs::write(path, render_working_proxies(report))
        .with_context(|| format!("failed to write working proxies: {}", path.display()))?;
    Ok(true)
}

/// Dump the full report as pretty JSON.
pub fn write_report_json(path: &Path, report: &AggregateReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create JSON report: {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("failed to write JSON report: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProxyDescriptor;

    fn ok(raw: &str, index: usize) -> ProbeOutcome {
        ProbeOutcome::success(
            ProxyDescriptor {
                raw: raw.to_string(),
                host: raw.to_string(),
                port: 8080,
                index,
            },
            10,
        )
    }

    #[test]
    fn column_width_counts_chars_not_bytes() {
        let rows = vec![ok("прокси.рф:3128", 0), ok("a:1", 1)];
        assert_eq!(proxy_column_width(&rows), "прокси.рф:3128".chars().count());
    }

    #[test]
    fn long_cells_are_cut_to_the_column_max() {
        let long = "é".repeat(80);
        assert_eq!(proxy_cell(&long).chars().count(), PROXY_CELL_MAX);
        assert_eq!(proxy_column_width(&[ok(&long, 0)]), PROXY_CELL_MAX);
    }

    #[test]
    fn json_report_errors_name_the_path() {
        let path = std::env::temp_dir()
            .join(format!("proxy-ping-rs-{}-missing-dir", std::process::id()))
            .join("report.json");
        let err = write_report_json(&path, &AggregateReport::default()).unwrap_err();
        assert!(format!("{err:#}").contains("report.json"));
    }
}
