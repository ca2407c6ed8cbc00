use crate::parser::{EntryParser, LogEntry};
use crate::window::{TimeWindow, WindowConfig, WindowError, WindowState};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("could not open file '{}': {source}", .path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("time window: {0}")]
    Window(#[from] WindowError),
}

/// Line counters of one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub lines_scanned: usize,
    pub blank_lines: usize,
    pub skipped: usize,
    pub retained: usize,
}

/// The outcome of a completed scan
#[derive(Debug)]
pub struct Collection {
    /// Retained entries, in file order
    pub entries: Vec<LogEntry>,
    pub window: Option<TimeWindow>,
    pub stats: ScanStats,
    /// Set when reading stopped early; `entries` holds what was read before.
    pub read_error: Option<io::Error>,
}

/// Scans a log once, keeping the entries that fall inside the time window.
#[derive(Debug)]
pub struct Collector {
    parser: EntryParser,
    window: WindowState,
}

impl Collector {
    pub fn new(parser: EntryParser, window: WindowConfig) -> Self {
        Self {
            parser,
            window: window.into(),
        }
    }

    /// Opens `path` and scans it. Failing to open the file is fatal.
    pub fn collect_file(self, path: &Path) -> Result<Collection, CollectError> {
        let file = File::open(path).map_err(|source| CollectError::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        self.collect_reader(BufReader::new(file))
    }

    pub fn collect_reader<R: BufRead>(mut self, mut reader: R) -> Result<Collection, CollectError> {
        let mut entries = Vec::new();
        let mut stats = ScanStats::default();

        let outcome = self.scan(&mut reader, &mut entries, &mut stats);
        stats.retained = entries.len();

        info!(
            blank = stats.blank_lines,
            skipped = stats.skipped,
            "checked {} lines",
            stats.lines_scanned
        );
        info!("found {} entries within time range", stats.retained);

        let read_error = outcome?;
        if let Some(err) = &read_error {
            warn!(error = %err, "error reading from file, keeping entries read so far");
        }

        Ok(Collection {
            entries,
            window: self.window.active().copied(),
            stats,
            read_error,
        })
    }

    /// Returns the I/O error that ended the scan early, if any.
    fn scan<R: BufRead>(
        &mut self,
        reader: &mut R,
        entries: &mut Vec<LogEntry>,
        stats: &mut ScanStats,
    ) -> Result<Option<io::Error>, CollectError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Ok(Some(e)),
            }
            stats.lines_scanned += 1;

            let line = String::from_utf8_lossy(trim_line_ending(&buf));
            if line.trim().is_empty() {
                stats.blank_lines += 1;
                continue;
            }

            let entry = match self.parser.parse(&line) {
                Ok(entry) => entry,
                Err(e) => {
                    stats.skipped += 1;
                    warn!(
                        line = stats.lines_scanned,
                        "skipping line: {e}: {:?}",
                        truncate(&line, 80)
                    );
                    continue;
                }
            };

            if self.window.admit(&entry.timestamp)? {
                entries.push(entry);
            }
        }
    }
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

fn truncate(line: &str, max_chars: usize) -> &str {
    match line.char_indices().nth(max_chars) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
