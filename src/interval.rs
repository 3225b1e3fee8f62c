//! Report interval units and boundary generation.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{ReportError, Result};

/// Width of one reporting bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    /// Parses an interval unit name, accepting singular or plural forms.
    pub fn parse(input: &str) -> Result<Self> {
        let normalized = input.trim().to_lowercase();
        match normalized.strip_suffix('s').unwrap_or(normalized.as_str()) {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(ReportError::UnsupportedInterval(input.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Capitalised name used in chart titles.
    pub fn title(self) -> &'static str {
        match self {
            Self::Week => "Week",
            Self::Month => "Month",
            Self::Year => "Year",
        }
    }

    /// `strftime` format used for chart labels at this granularity.
    pub fn label_format(self) -> &'static str {
        match self {
            Self::Week | Self::Month => "%m-%d",
            Self::Year => "%Y",
        }
    }

    pub fn label(self, boundary: &DateTime<Utc>) -> String {
        boundary.format(self.label_format()).to_string()
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generates the ordered boundary timestamps for a report
///
/// Evaluates `"<i> <unit>s ago"` for `i = range, range - 1, ..., 0` through
/// `parse`, so the result is oldest first and ends at "now". `range + 1`
/// boundaries delimit `range` intervals.
///
/// # Arguments
///
/// * `unit` - Width of each bucket
/// * `range` - Number of buckets, at least 1
/// * `parse` - Relative date parser, e.g. [`parse_relative_date`](crate::relative_date::parse_relative_date)
///   bound to a fixed `now`
///
/// # Returns
///
/// * `Ok(Vec<DateTime<Utc>>)` with exactly `range + 1` strictly increasing timestamps
/// * `Err(ReportError::InvalidRange)` if `range < 1`
/// * `Err(ReportError::NonMonotonicBoundaries)` if the parser yields out-of-order timestamps
/// * Any error returned by `parse`
pub fn generate_boundaries<F>(unit: IntervalUnit, range: i64, parse: F) -> Result<Vec<DateTime<Utc>>>
where
    F: Fn(&str) -> Result<DateTime<Utc>>,
{
    if range < 1 {
        return Err(ReportError::InvalidRange(range));
    }

    let boundaries = (0..=range)
        .rev()
        .map(|i| parse(&format!("{i} {}s ago", unit.name())))
        .collect::<Result<Vec<_>>>()?;

    if let Some(index) = boundaries.windows(2).position(|pair| pair[0] >= pair[1]) {
        return Err(ReportError::NonMonotonicBoundaries { index: index + 1 });
    }

    Ok(boundaries)
}

/// Display labels for a boundary sequence: one per interval, taken from each interval's end.
pub fn interval_labels(unit: IntervalUnit, boundaries: &[DateTime<Utc>]) -> Vec<String> {
    boundaries.iter().skip(1).map(|dt| unit.label(dt)).collect()
}
