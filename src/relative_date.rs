//! Relative date expressions such as `3 weeks ago`.

use chrono::{DateTime, Duration, Months, Utc};

use crate::error::{ReportError, Result};

/// Resolves a relative date expression against `now`.
///
/// Accepted forms (case-insensitive):
/// * `now` or `today`
/// * `<n> <unit> ago` where unit is one of `day`, `week`, `month`, `year`,
///   singular or plural
///
/// Month and year arithmetic follows the calendar and clamps to the last
/// day of the target month (e.g. March 31st minus one month is February 28th
/// or 29th).
///
/// # Returns
///
/// * `Ok(DateTime<Utc>)` with the resolved timestamp
/// * `Err(ReportError::UnparseableExpression)` for anything else
pub fn parse_relative_date(expression: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let unparseable = || ReportError::UnparseableExpression(expression.to_string());

    let normalized = expression.trim().to_lowercase();
    if normalized == "now" || normalized == "today" {
        return Ok(now);
    }

    let parts: Vec<&str> = normalized.split_whitespace().collect();
    let &[count, unit, "ago"] = parts.as_slice() else {
        return Err(unparseable());
    };

    let count: u32 = count.parse().map_err(|_| unparseable())?;
    let unit = unit.strip_suffix('s').unwrap_or(unit);

    match unit {
        "day" => now.checked_sub_signed(Duration::days(i64::from(count))),
        "week" => now.checked_sub_signed(Duration::weeks(i64::from(count))),
        "month" => now.checked_sub_months(Months::new(count)),
        "year" => count
            .checked_mul(12)
            .and_then(|months| now.checked_sub_months(Months::new(months))),
        _ => None,
    }
    .ok_or_else(unparseable)
}
