//! Report options and credential loading.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::interval::IntervalUnit;
use crate::pingdom::DEFAULT_API_URL;
use crate::report::FailurePolicy;
use crate::schedule::ScheduledWindow;
use crate::uptime::CorrectionPolicy;

pub const DEFAULT_RANGE: i64 = 8;
pub const DEFAULT_OUTPUT_PATH: &str = "uptime.png";
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Every knob of a report run, with its default
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub interval: IntervalUnit,
    pub range: i64,
    pub output_path: PathBuf,
    /// Restricts the report to these checks when set.
    pub whitelist: Option<Vec<String>>,
    pub schedule: Vec<ScheduledWindow>,
    /// Upper bound on in-flight fetches.
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    pub correction: CorrectionPolicy,
    /// Overall deadline for data collection.
    pub deadline: Option<Duration>,
    pub title_prefix: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval: IntervalUnit::Week,
            range: DEFAULT_RANGE,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            whitelist: None,
            schedule: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            failure_policy: FailurePolicy::FailFast,
            correction: CorrectionPolicy::Preserve,
            deadline: None,
            title_prefix: None,
        }
    }
}

impl ReportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Validation(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        if self.deadline.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::Validation(
                "deadline must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Chart title, e.g. `Acme % Uptime by Week`.
    pub fn title(&self) -> String {
        match self.title_prefix.as_deref().map(str::trim) {
            Some(prefix) if !prefix.is_empty() => {
                format!("{prefix} % Uptime by {}", self.interval.title())
            }
            _ => format!("% Uptime by {}", self.interval.title()),
        }
    }
}

/// Pingdom account credentials
#[derive(Debug, Clone)]
pub struct PingdomCredentials {
    pub email: String,
    pub password: String,
    pub app_key: String,
}

impl PingdomCredentials {
    /// Reads `PINGDOM_USER_EMAIL`, `PINGDOM_USER_PASSWD` and `PINGDOM_APP_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            email: required_env("PINGDOM_USER_EMAIL")?,
            password: required_env("PINGDOM_USER_PASSWD")?,
            app_key: required_env("PINGDOM_APP_KEY")?,
        })
    }
}

fn required_env(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::MissingEnv(name))
}

/// Base URL from `PINGDOM_API_URL`, falling back to the public API.
pub fn api_url_from_env() -> String {
    env::var("PINGDOM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string())
}

/// Splits a comma separated check list, dropping blanks.
pub fn parse_check_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
