//! Scheduled maintenance windows and their mapping onto report intervals.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to read schedule file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse schedule file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid schedule timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("scheduled minutes for check '{check}' at {declared} must be a finite number, got {minutes}")]
    NonFiniteMinutes {
        declared: String,
        check: String,
        minutes: f64,
    },
    #[error("negative scheduled minutes {minutes} for check '{check}' at {declared}")]
    NegativeMinutes {
        declared: String,
        check: String,
        minutes: f64,
    },
}

/// Pre-declared maintenance: minutes of expected downtime per check
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledWindow {
    pub declared: DateTime<Utc>,
    pub minutes: HashMap<String, f64>,
}

impl ScheduledWindow {
    pub fn new<I, S>(declared: DateTime<Utc>, minutes: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            declared,
            minutes: minutes.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Scheduled minutes per check, keyed by the end boundary of the interval they fall in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjustmentTable {
    entries: BTreeMap<DateTime<Utc>, HashMap<String, f64>>,
}

impl AdjustmentTable {
    /// Scheduled minutes for `check` in the interval ending at `to`.
    pub fn scheduled_minutes(&self, to: &DateTime<Utc>, check: &str) -> Option<f64> {
        self.entries.get(to).and_then(|checks| checks.get(check)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Maps scheduled windows onto report intervals
///
/// A window belongs to every interval `(from, to)` with
/// `from <= declared <= to`. Both bounds are inclusive, so a window declared
/// exactly on a shared boundary is recorded against both neighbouring
/// intervals. Windows are applied in input order and a later window
/// overwrites an earlier one for the same interval and check.
pub fn build_adjustments(boundaries: &[DateTime<Utc>], windows: &[ScheduledWindow]) -> AdjustmentTable {
    let mut entries: BTreeMap<DateTime<Utc>, HashMap<String, f64>> = BTreeMap::new();

    for window in windows {
        for pair in boundaries.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if from <= window.declared && to >= window.declared {
                let slot = entries.entry(to).or_default();
                for (check, minutes) in &window.minutes {
                    slot.insert(check.clone(), *minutes);
                }
            }
        }
    }

    AdjustmentTable { entries }
}

/// Parses a schedule date key
///
/// Supports RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, `MM/DD/YYYY` and
/// `MM-DD-YYYY`. Dates without a time resolve to midnight UTC.
pub fn parse_schedule_timestamp(input: &str) -> Result<DateTime<Utc>, ScheduleError> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(input, format) {
            if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&midnight));
            }
        }
    }
    Err(ScheduleError::InvalidTimestamp(input.to_string()))
}

type RawSchedule = BTreeMap<String, BTreeMap<String, f64>>;

/// Loads scheduled windows from a YAML (`.yml`, `.yaml`), JSON (`.json`) or TOML file
///
/// The file maps date keys to tables of check name to minutes. Files with any
/// other extension are read as TOML. The returned windows are ordered by
/// declared timestamp.
pub fn load_schedule(path: impl AsRef<Path>) -> Result<Vec<ScheduledWindow>, ScheduleError> {
    let path = path.as_ref();
    let path_str = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| ScheduleError::Read {
        path: path_str.clone(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let parsed: std::result::Result<RawSchedule, String> = match extension.as_deref() {
        Some("yml" | "yaml") => serde_yaml::from_str(&raw).map_err(|e| e.to_string()),
        Some("json") => serde_json::from_str(&raw).map_err(|e| e.to_string()),
        _ => toml::from_str(&raw).map_err(|e| e.to_string()),
    };
    let parsed = parsed.map_err(|message| ScheduleError::Parse {
        path: path_str,
        message,
    })?;

    windows_from_raw(parsed)
}

fn windows_from_raw(raw: RawSchedule) -> Result<Vec<ScheduledWindow>, ScheduleError> {
    let mut windows = Vec::with_capacity(raw.len());
    for (key, checks) in raw {
        let declared = parse_schedule_timestamp(&key)?;
        for (check, minutes) in &checks {
            if !minutes.is_finite() {
                return Err(ScheduleError::NonFiniteMinutes {
                    declared: key.clone(),
                    check: check.clone(),
                    minutes: *minutes,
                });
            }
            if *minutes < 0.0 {
                return Err(ScheduleError::NegativeMinutes {
                    declared: key.clone(),
                    check: check.clone(),
                    minutes: *minutes,
                });
            }
        }
        windows.push(ScheduledWindow::new(declared, checks));
    }
    windows.sort_by_key(|window| window.declared);
    Ok(windows)
}
