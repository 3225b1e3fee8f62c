//! Per-interval uptime percentage with scheduled downtime correction.

use crate::error::ComputeError;

/// Raw up/down seconds reported for one check over one interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawAvailability {
    pub total_up_seconds: f64,
    pub total_down_seconds: f64,
}

impl RawAvailability {
    pub fn new(total_up_seconds: f64, total_down_seconds: f64) -> Self {
        Self {
            total_up_seconds,
            total_down_seconds,
        }
    }
}

/// How downtime is treated when scheduled minutes exceed observed downtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorrectionPolicy {
    /// Subtract scheduled downtime as-is; adjusted downtime may go negative.
    #[default]
    Preserve,
    /// Clamp adjusted downtime at zero.
    Clamp,
}

/// Outcome of subtracting scheduled downtime from observed downtime
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DowntimeCorrection {
    pub up_seconds: f64,
    pub down_seconds: f64,
    /// Adjusted downtime before any clamping.
    pub unclamped_down_seconds: f64,
}

impl DowntimeCorrection {
    /// Scheduled minutes exceeded the downtime actually observed.
    pub fn is_over_adjusted(&self) -> bool {
        self.unclamped_down_seconds < 0.0
    }
}

/// Subtracts `scheduled_minutes * 60` from the observed downtime.
pub fn correct_downtime(
    raw: RawAvailability,
    scheduled_minutes: Option<f64>,
    policy: CorrectionPolicy,
) -> DowntimeCorrection {
    let scheduled_seconds = scheduled_minutes.map_or(0.0, |minutes| minutes * 60.0);
    let unclamped = raw.total_down_seconds - scheduled_seconds;
    let down_seconds = match policy {
        CorrectionPolicy::Preserve => unclamped,
        CorrectionPolicy::Clamp => unclamped.max(0.0),
    };

    DowntimeCorrection {
        up_seconds: raw.total_up_seconds,
        down_seconds,
        unclamped_down_seconds: unclamped,
    }
}

/// Computes the uptime percentage for one interval
///
/// `up / (up + down) * 100` after subtracting scheduled downtime. With
/// [`CorrectionPolicy::Preserve`] an over-adjusted interval can report more
/// than 100%; this is intentional and visible through
/// [`DowntimeCorrection::is_over_adjusted`].
///
/// # Returns
///
/// * `Ok(f64)` with the percentage
/// * `Err(ComputeError::ZeroDurationInterval)` when the corrected total is zero
/// * `Err(ComputeError::NonFiniteResult)` when the inputs produce NaN or infinity
pub fn compute_uptime(
    raw: RawAvailability,
    scheduled_minutes: Option<f64>,
    policy: CorrectionPolicy,
) -> Result<f64, ComputeError> {
    uptime_percentage(&correct_downtime(raw, scheduled_minutes, policy))
}

pub fn uptime_percentage(correction: &DowntimeCorrection) -> Result<f64, ComputeError> {
    let total = correction.up_seconds + correction.down_seconds;
    if total == 0.0 {
        return Err(ComputeError::ZeroDurationInterval);
    }
    let pct = correction.up_seconds / total * 100.0;
    if !pct.is_finite() {
        return Err(ComputeError::NonFiniteResult);
    }
    Ok(pct)
}
