use chrono::{DateTime, Duration, FixedOffset, Local, NaiveTime, Offset, TimeZone};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("a time range of {minutes} minutes needs an end time (HH:MM)")]
    MissingEndTime { minutes: u32 },

    #[error("invalid end time {0:?}, expected HH:MM")]
    InvalidEndTime(String),

    #[error("window ending {end_of_day} on {date} cannot be represented")]
    OutOfRange { end_of_day: NaiveTime, date: String },
}

/// An interval that admits timestamps strictly between `start` and `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeWindow {
    /// Builds the window that ends at `end_of_day` on the calendar date of
    /// `anchor`, in `offset`, and reaches back `minutes`.
    pub fn ending_at(
        end_of_day: NaiveTime,
        minutes: u32,
        anchor: &DateTime<FixedOffset>,
        offset: FixedOffset,
    ) -> Result<Self, WindowError> {
        let out_of_range = || WindowError::OutOfRange {
            end_of_day,
            date: anchor.date_naive().to_string(),
        };

        let naive_end = anchor.date_naive().and_time(end_of_day);
        let end = offset
            .from_local_datetime(&naive_end)
            .single()
            .ok_or_else(out_of_range)?;
        let start = end
            .checked_sub_signed(Duration::minutes(i64::from(minutes)))
            .ok_or_else(out_of_range)?;

        Ok(Self { start, end })
    }

    /// Both bounds are exclusive.
    pub fn contains(&self, ts: &DateTime<FixedOffset>) -> bool {
        self.start < *ts && *ts < self.end
    }
}

/// Validated window settings as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowConfig {
    /// A time range of 0 minutes: every entry is retained
    WholeFile,
    Ending {
        end_of_day: NaiveTime,
        minutes: u32,
        offset: FixedOffset,
    },
}

impl WindowConfig {
    /// Validates the caller's options. The local offset is captured here,
    /// at invocation time, and reused for the whole run.
    pub fn from_options(end_time: Option<&str>, minutes: u32) -> Result<Self, WindowError> {
        if minutes == 0 {
            return Ok(Self::WholeFile);
        }
        let raw = end_time.ok_or(WindowError::MissingEndTime { minutes })?;
        Ok(Self::Ending {
            end_of_day: parse_end_of_day(raw)?,
            minutes,
            offset: Local::now().offset().fix(),
        })
    }
}

/// The lazily established window of one scan.
///
/// `Pending` turns into `Active` on the first parsed entry and stays there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowState {
    Disabled,
    Pending {
        end_of_day: NaiveTime,
        minutes: u32,
        offset: FixedOffset,
    },
    Active(TimeWindow),
}

impl From<WindowConfig> for WindowState {
    fn from(config: WindowConfig) -> Self {
        match config {
            WindowConfig::WholeFile => Self::Disabled,
            WindowConfig::Ending {
                end_of_day,
                minutes,
                offset,
            } => Self::Pending {
                end_of_day,
                minutes,
                offset,
            },
        }
    }
}

impl WindowState {
    /// Decides whether an entry with timestamp `ts` is retained, anchoring
    /// the window on `ts` first if it is still pending.
    pub fn admit(&mut self, ts: &DateTime<FixedOffset>) -> Result<bool, WindowError> {
        match self {
            Self::Disabled => Ok(true),
            Self::Pending {
                end_of_day,
                minutes,
                offset,
            } => {
                let window = TimeWindow::ending_at(*end_of_day, *minutes, ts, *offset)?;
                tracing::debug!(start = %window.start, end = %window.end, "time window established");
                let keep = window.contains(ts);
                *self = Self::Active(window);
                Ok(keep)
            }
            Self::Active(window) => Ok(window.contains(ts)),
        }
    }

    pub fn active(&self) -> Option<&TimeWindow> {
        match self {
            Self::Active(window) => Some(window),
            _ => None,
        }
    }
}

static END_TIME_REGEX: OnceLock<Regex> = OnceLock::new();

fn end_time_regex() -> &'static Regex {
    END_TIME_REGEX.get_or_init(|| {
        Regex::new(r"^(?P<hour>\d{1,2}):(?P<minute>\d{2})$")
            .expect("hard-coded regex should always compile")
    })
}

/// Parses an `HH:MM` time of day.
pub fn parse_end_of_day(raw: &str) -> Result<NaiveTime, WindowError> {
    let invalid = || WindowError::InvalidEndTime(raw.to_string());
    let caps = end_time_regex().captures(raw.trim()).ok_or_else(invalid)?;
    let hour: u32 = caps["hour"].parse().map_err(|_| invalid())?;
    let minute: u32 = caps["minute"].parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}
