//! The seam between the aggregation engine and a monitoring backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SourceError;
use crate::uptime::RawAvailability;

/// Supplies raw availability for a check over a `[from, to)` window
#[async_trait]
pub trait UptimeSource: Send + Sync {
    /// Names of every check the source knows about, in the backend's order.
    async fn checks(&self) -> Result<Vec<String>, SourceError>;

    async fn fetch(
        &self,
        check: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<RawAvailability, SourceError>;
}

/// Selects the checks to report on
///
/// Keeps the source's order and, when a whitelist is given, drops any check
/// not named in it. Whitelisted names unknown to the source are ignored.
pub fn select_checks(all: Vec<String>, whitelist: Option<&[String]>) -> Vec<String> {
    match whitelist {
        Some(allowed) => all
            .into_iter()
            .filter(|check| allowed.iter().any(|name| name == check))
            .collect(),
        None => all,
    }
}
