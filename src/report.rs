use crate::collector::{Collection, ScanStats};
use crate::parser::LogEntry;
use crate::ranker::{self, RankedIp};
use crate::window::TimeWindow;
use colored::Colorize;
use serde::Serialize;
use std::io;
use std::path::Path;

const SEPARATOR: &str =
    "════════════════════════════════════════════════════════════════════";
const THIN_SEP: &str =
    "────────────────────────────────────────────────────────────────────";

/// Everything a run produced, ready for the terminal or JSON export
#[derive(Debug, Serialize)]
pub struct Report {
    pub source: String,
    pub window: Option<TimeWindow>,
    pub stats: ScanStats,
    pub distinct_ips: usize,
    pub top_n: usize,
    pub top_ips: Vec<RankedIp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<LogEntry>>,
}

impl Report {
    pub fn new(source: &Path, collection: Collection, top_n: usize, with_entries: bool) -> Self {
        let top_ips = ranker::top_ips(&collection.entries, top_n);
        let distinct_ips = ranker::count_requests(&collection.entries).len();
        Self {
            source: source.display().to_string(),
            window: collection.window,
            stats: collection.stats,
            distinct_ips,
            top_n,
            top_ips,
            entries: with_entries.then_some(collection.entries),
        }
    }
}

/// Print a fully formatted report to stdout
pub fn print_report(report: &Report) {
    println!("\n{}", SEPARATOR.cyan().bold());
    println!("{}", "  📋  TOP TALKERS REPORT".white().bold());
    println!("{}", SEPARATOR.cyan().bold());
    println!("  Source : {}", report.source.yellow());
    match &report.window {
        Some(window) => println!(
            "  Window : {} → {} {}",
            window.start.to_rfc3339().yellow(),
            window.end.to_rfc3339().yellow(),
            "(exclusive)".dimmed()
        ),
        None => println!("  Window : {}", "whole file".yellow()),
    }
    println!();

    // ── Overview ──────────────────────────────────────────────────────────────
    section_header("OVERVIEW");
    let stats = &report.stats;
    println!("  {:<28} {:>8}", "Lines scanned:", stats.lines_scanned);
    println!(
        "  {:<28} {:>8}",
        "Entries within time range:",
        stats.retained.to_string().green().bold()
    );
    println!(
        "  {:<28} {:>8}",
        "Malformed / skipped lines:",
        if stats.skipped > 0 {
            stats.skipped.to_string().yellow().bold()
        } else {
            "0".normal()
        }
    );
    println!("  {:<28} {:>8}", "Distinct client IPs:", report.distinct_ips);
    if stats.blank_lines > 0 {
        println!("  {:<28} {:>8}", "Blank lines:", stats.blank_lines.to_string().dimmed());
    }
    println!();

    // ── Top N IPs ─────────────────────────────────────────────────────────────
    section_header(&format!("TOP {} IP ADDRESSES BY REQUEST COUNT", report.top_n));
    if report.top_ips.is_empty() {
        println!("  (no data)");
    } else {
        println!("  {:<3}  {:<39}  {:>8}  {:>8}", "#", "IP Address", "Requests", "Share");
        println!("  {}", THIN_SEP);
        for (i, item) in report.top_ips.iter().enumerate() {
            println!(
                "  {:<3}  {:<39}  {:>8}  {:>7.2}%",
                (i + 1).to_string().dimmed(),
                item.ip.cyan(),
                item.count,
                item.percentage
            );
        }
    }

    println!("\n{}\n", SEPARATOR.cyan());
}

/// Export the report as JSON to the given path
pub fn export_json(report: &Report, path: &Path) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(report).map_err(|e| {
        io::Error::new(io::ErrorKind::InvalidData, format!("serialization failed: {}", e))
    })?;
    std::fs::write(path, json)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn section_header(title: &str) {
    println!("  {} {}", "▶".cyan(), title.white().bold());
    println!("  {}", THIN_SEP);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collector;
    use crate::parser::EntryParser;
    use crate::window::WindowConfig;
    use std::io::Cursor;

    fn collection() -> Collection {
        let log = [
            r#"10.0.0.1 - - [10/Oct/2023:13:55:36 -0700] "GET /index.html HTTP/1.1" 200 1234"#,
            r#"10.0.0.2 - - [10/Oct/2023:13:55:37 -0700] "GET /about HTTP/1.1" 200 99"#,
            r#"10.0.0.1 - - [10/Oct/2023:13:55:38 -0700] "POST /form HTTP/1.1" 302 0"#,
        ]
        .join("\n");
        Collector::new(EntryParser::default(), WindowConfig::WholeFile)
            .collect_reader(Cursor::new(log))
            .unwrap()
    }

    #[test]
    fn report_ranks_collected_entries() {
        let report = Report::new(Path::new("access.log"), collection(), 5, false);
        assert_eq!(report.source, "access.log");
        assert_eq!(report.stats.retained, 3);
        assert_eq!(report.top_ips[0].ip, "10.0.0.1");
        assert_eq!(report.top_ips[0].count, 2);
        assert_eq!(report.distinct_ips, 2);
        assert!(report.entries.is_none());
    }

    #[test]
    fn exports_json() {
        let report = Report::new(Path::new("access.log"), collection(), 1, true);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        export_json(&report, &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["top_n"], 1);
        assert_eq!(json["top_ips"].as_array().unwrap().len(), 1);
        assert_eq!(json["top_ips"][0]["ip"], "10.0.0.1");
        assert_eq!(json["stats"]["lines_scanned"], 3);
        assert!(json["window"].is_null());
        assert_eq!(json["entries"][2]["method"], "POST");
        assert_eq!(json["entries"][0]["timestamp"], "2023-10-10T13:55:36-07:00");
    }
}
