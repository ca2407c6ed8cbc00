mod collector;
mod parser;
mod ranker;
mod report;
mod window;

use clap::Parser;
use collector::Collector;
use parser::{EntryParser, TimestampPolicy};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use window::WindowConfig;

/// Ranks the busiest client IPs of a web server access log
#[derive(Parser, Debug)]
#[command(
    name = "toptalkers",
    author,
    version,
    about = "Reports the client IPs with the most requests in an access log, optionally within a time window"
)]
struct Args {
    /// Path to the access log to analyze
    #[arg(value_name = "LOG_FILE")]
    file: PathBuf,

    /// End of the time window as a time of day, on the date of the first entry
    #[arg(short = 'e', long = "endtime", value_name = "HH:MM")]
    end_time: Option<String>,

    /// Length of the time window in minutes; 0 analyzes the whole file
    #[arg(short = 't', long = "timerange", default_value_t = 0, value_name = "MINUTES")]
    time_range: u32,

    /// Number of top IPs to display
    #[arg(short = 'n', long = "top", default_value_t = ranker::DEFAULT_TOP_N, value_name = "N")]
    top_n: usize,

    /// strftime layout of the bracketed timestamp
    #[arg(short = 'l', long = "layout", default_value = parser::DEFAULT_DATE_LAYOUT, value_name = "PATTERN")]
    layout: String,

    /// Keep lines with unparseable timestamps (dated at the Unix epoch) instead of skipping them
    #[arg(long = "keep-unparsed-timestamps")]
    keep_unparsed_timestamps: bool,

    /// Export results as JSON to the specified file path
    #[arg(short = 'j', long = "json-output", value_name = "OUTPUT_FILE")]
    json_output: Option<PathBuf>,

    /// Include the retained entries in the JSON export
    #[arg(long = "with-entries", requires = "json_output")]
    with_entries: bool,

    /// Only log errors
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long = "log-level", default_value = "info", value_name = "LEVEL")]
    log_level: String,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing(if args.quiet { "error" } else { &args.log_level });

    // Bad window settings must stop the run before the file is touched
    let window = match WindowConfig::from_options(args.end_time.as_deref(), args.time_range) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let policy = if args.keep_unparsed_timestamps {
        TimestampPolicy::Epoch
    } else {
        TimestampPolicy::Reject
    };
    let collector = Collector::new(EntryParser::new(args.layout.as_str(), policy), window);

    let collection = match collector.collect_file(&args.file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(err) = &collection.read_error {
        eprintln!("warning: error reading from '{}': {}", args.file.display(), err);
    }

    let report = report::Report::new(&args.file, collection, args.top_n, args.with_entries);
    report::print_report(&report);

    if let Some(json_path) = &args.json_output {
        match report::export_json(&report, json_path) {
            Ok(_) => println!("✓ JSON report saved to '{}'", json_path.display()),
            Err(e) => {
                eprintln!("error: failed to write JSON output: {}", e);
                std::process::exit(1);
            }
        }
    }
}
