//! Error types for report generation.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failures reported by an [`UptimeSource`](crate::source::UptimeSource)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    /// The remote API could not be reached or returned an unusable response.
    #[error("uptime source unavailable: {0}")]
    Unavailable(String),

    /// The check name is not known to the remote API.
    #[error("unknown check: {0}")]
    UnknownCheck(String),
}

/// Failures while computing a single uptime percentage.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ComputeError {
    /// Neither up nor down seconds were recorded, so the ratio is undefined.
    #[error("interval has no recorded up or down seconds")]
    ZeroDurationInterval,

    /// The corrected ratio came out as NaN or infinity.
    #[error("uptime ratio is not a finite number")]
    NonFiniteResult,
}

/// Errors raised by the uptime aggregation engine.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid range {0}: must be at least 1")]
    InvalidRange(i64),

    #[error("unsupported interval '{0}': expected week, month or year")]
    UnsupportedInterval(String),

    #[error("cannot parse relative date expression '{0}'")]
    UnparseableExpression(String),

    #[error("boundary sequence is not strictly increasing at index {index}")]
    NonMonotonicBoundaries { index: usize },

    #[error("fetch failed for check '{check}' over {from} .. {to}: {source}")]
    Fetch {
        check: String,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        #[source]
        source: SourceError,
    },

    #[error("uptime computation failed for check '{check}' over {from} .. {to}: {source}")]
    Compute {
        check: String,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        #[source]
        source: ComputeError,
    },

    #[error("report deadline of {0}s exceeded")]
    DeadlineExceeded(u64),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl ReportError {
    /// Name of the check this error is attributed to, if any.
    pub fn check(&self) -> Option<&str> {
        match self {
            Self::Fetch { check, .. } | Self::Compute { check, .. } => Some(check),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;
