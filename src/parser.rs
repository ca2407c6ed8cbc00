use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

/// Default timestamp layout of common/combined access logs,
/// e.g. `10/Oct/2023:13:55:36 -0700`.
pub const DEFAULT_DATE_LAYOUT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// IP, two ignored tokens, date, time, method, request, protocol, code.
const MIN_FIELDS: usize = 9;

/// Represents a single parsed access log line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub ip: String,
    pub timestamp: DateTime<FixedOffset>,
    pub method: String,
    pub request: String,
    pub code: String,
}

/// What to do with a line whose timestamp does not match the layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampPolicy {
    /// Fail the line with `ParseError::Timestamp`
    #[default]
    Reject,
    /// Keep the line with the zero time (Unix epoch)
    Epoch,
}

/// Errors that can occur while parsing a single line.
/// All of them are local to the line; the scan goes on.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed line: expected at least {expected} fields, found {found}")]
    MalformedLine { expected: usize, found: usize },

    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Turns raw access log lines into `LogEntry` values.
///
/// Expected layout after all `"` characters are removed, split on single spaces:
///
///   IP - - [DATE TIME] METHOD REQUEST PROTOCOL CODE ...
///
/// Example:
///   10.0.0.1 - - [10/Oct/2023:13:55:36 -0700] "GET /index.html HTTP/1.1" 200 1234
#[derive(Debug, Clone)]
pub struct EntryParser {
    layout: String,
    policy: TimestampPolicy,
}

impl Default for EntryParser {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_LAYOUT, TimestampPolicy::default())
    }
}

impl EntryParser {
    pub fn new(layout: impl Into<String>, policy: TimestampPolicy) -> Self {
        Self {
            layout: layout.into(),
            policy,
        }
    }

    /// Parse a single line into a structured `LogEntry`.
    ///
    /// The field count is checked before any positional access, so short
    /// lines come back as `ParseError::MalformedLine` instead of panicking.
    pub fn parse(&self, line: &str) -> Result<LogEntry, ParseError> {
        let cleaned = line.replace('"', "");
        let fields: Vec<&str> = cleaned.split(' ').collect();

        if fields.len() < MIN_FIELDS {
            return Err(ParseError::MalformedLine {
                expected: MIN_FIELDS,
                found: fields.len(),
            });
        }

        let date = fields[3].strip_prefix('[').unwrap_or(fields[3]);
        let time = fields[4].strip_suffix(']').unwrap_or(fields[4]);
        let raw_timestamp = format!("{date} {time}");

        let timestamp = match parse_timestamp(&raw_timestamp, &self.layout) {
            Ok(ts) => ts,
            Err(source) => match self.policy {
                TimestampPolicy::Reject => {
                    return Err(ParseError::Timestamp {
                        value: raw_timestamp,
                        source,
                    })
                }
                TimestampPolicy::Epoch => DateTime::<FixedOffset>::default(),
            },
        };

        Ok(LogEntry {
            ip: fields[0].to_string(),
            timestamp,
            method: fields[5].to_string(),
            request: fields[6].to_string(),
            code: fields[8].to_string(),
        })
    }
}

/// Layouts without an offset directive are read as UTC.
fn parse_timestamp(raw: &str, layout: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_str(raw, layout).or_else(|err| {
        NaiveDateTime::parse_from_str(raw, layout)
            .map(|naive| naive.and_utc().fixed_offset())
            .map_err(|_| err)
    })
}

// ─── Unit Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn valid_line() -> &'static str {
        r#"10.0.0.1 - - [10/Oct/2023:13:55:36 -0700] "GET /index.html HTTP/1.1" 200 1234"#
    }

    #[test]
    fn parses_valid_line() {
        let entry = EntryParser::default()
            .parse(valid_line())
            .expect("should parse valid line");
        assert_eq!(entry.ip, "10.0.0.1");
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.request, "/index.html");
        assert_eq!(entry.code, "200");

        let expected = FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2023, 10, 10, 13, 55, 36)
            .unwrap();
        assert_eq!(entry.timestamp, expected);
    }

    #[test]
    fn extracted_fields_match_positional_tokens() {
        let lines = [
            valid_line(),
            r#"192.168.1.20 - frank [01/Jun/1995:00:00:59 -0600] "POST /api/login HTTP/1.0" 401 12"#,
            r#"::1 - - [31/Dec/2024:23:59:59 +0000] "DELETE /items/7 HTTP/2" 204 0 "-" "curl/8.0""#,
        ];
        let parser = EntryParser::default();
        for line in lines {
            let tokens: Vec<String> = line.replace('"', "").split(' ').map(String::from).collect();
            let entry = parser.parse(line).unwrap();
            assert_eq!(entry.ip, tokens[0], "ip for {line}");
            assert_eq!(entry.method, tokens[5], "method for {line}");
            assert_eq!(entry.request, tokens[6], "request for {line}");
            assert_eq!(entry.code, tokens[8], "code for {line}");
        }
    }

    #[test]
    fn rejects_short_line() {
        let err = EntryParser::default().parse("10.0.0.1 - -").unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedLine {
                expected: 9,
                found: 3
            }
        ));
    }

    #[test]
    fn rejects_empty_line() {
        assert!(matches!(
            EntryParser::default().parse(""),
            Err(ParseError::MalformedLine { found: 1, .. })
        ));
    }

    #[test]
    fn rejects_bad_timestamp_by_default() {
        let line = r#"10.0.0.1 - - [yesterday noon] "GET / HTTP/1.1" 200 1"#;
        match EntryParser::default().parse(line) {
            Err(ParseError::Timestamp { value, .. }) => assert_eq!(value, "yesterday noon"),
            other => panic!("expected timestamp error, got {other:?}"),
        }
    }

    #[test]
    fn epoch_policy_keeps_line_with_zero_time() {
        let line = r#"10.0.0.1 - - [yesterday noon] "GET / HTTP/1.1" 200 1"#;
        let parser = EntryParser::new(DEFAULT_DATE_LAYOUT, TimestampPolicy::Epoch);
        let entry = parser.parse(line).unwrap();
        assert_eq!(entry.ip, "10.0.0.1");
        assert_eq!(entry.timestamp.timestamp(), 0);
    }

    #[test]
    fn layout_without_offset_reads_as_utc() {
        let line = r#"10.0.0.9 - - [2024-03-01 08:15:00] "GET /health HTTP/1.1" 200 2"#;
        let parser = EntryParser::new("%Y-%m-%d %H:%M:%S", TimestampPolicy::Reject);
        let entry = parser.parse(line).unwrap();
        assert_eq!(entry.timestamp.offset().local_minus_utc(), 0);
        assert_eq!(entry.timestamp.to_rfc3339(), "2024-03-01T08:15:00+00:00");
    }

    #[test]
    fn does_not_validate_ip() {
        let line = r#"not_an_ip - - [10/Oct/2023:13:55:36 -0700] "GET / HTTP/1.1" 200 1"#;
        let entry = EntryParser::default().parse(line).unwrap();
        assert_eq!(entry.ip, "not_an_ip");
    }
}
