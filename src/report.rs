//! Report assembly: fetch, correct and collect uptime per check per interval.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::ReportConfig;
use crate::error::{ReportError, Result, SourceError};
use crate::interval::{generate_boundaries, interval_labels, IntervalUnit};
use crate::relative_date::parse_relative_date;
use crate::schedule::{build_adjustments, AdjustmentTable};
use crate::source::{select_checks, UptimeSource};
use crate::uptime::{correct_downtime, uptime_percentage, CorrectionPolicy};

/// What to do when one check cannot be assembled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole report on the first failure.
    #[default]
    FailFast,
    /// Drop the failed check, record the failure and keep going.
    BestEffort,
}

/// One check's uptime percentages, oldest interval first
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesLine {
    pub check: String,
    pub values: Vec<f64>,
}

/// Chart-ready data: labels and one line per check, index aligned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub labels: Vec<String>,
    pub lines: Vec<SeriesLine>,
}

impl Series {
    pub fn get(&self, check: &str) -> Option<&[f64]> {
        self.lines
            .iter()
            .find(|line| line.check == check)
            .map(|line| line.values.as_slice())
    }

    pub fn checks(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|line| line.check.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A check dropped under [`FailurePolicy::BestEffort`]
#[derive(Debug)]
pub struct CheckFailure {
    pub check: String,
    pub error: ReportError,
}

#[derive(Debug)]
pub struct Report {
    pub series: Series,
    pub failures: Vec<CheckFailure>,
}

#[derive(Debug, Clone, Copy)]
pub struct AssemblyOptions {
    /// Upper bound on in-flight fetches across all checks.
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    pub correction: CorrectionPolicy,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            failure_policy: FailurePolicy::FailFast,
            correction: CorrectionPolicy::Preserve,
        }
    }
}

impl From<&ReportConfig> for AssemblyOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            failure_policy: config.failure_policy,
            correction: config.correction,
        }
    }
}

/// Builds the series for `checks` over the intervals in `boundaries`
///
/// Checks keep the order given. Each interval's raw availability is fetched
/// from `source`, corrected by the scheduled minutes recorded for the
/// interval's end boundary, and converted to a percentage. Fetches run
/// concurrently up to `options.concurrency`.
///
/// # Returns
///
/// * `Ok(Report)` whose series holds `boundaries.len() - 1` values per check
///   and as many labels
/// * `Err(ReportError::Fetch | ReportError::Compute)` naming the failing
///   check and interval, under [`FailurePolicy::FailFast`]
pub async fn assemble<S>(
    checks: &[String],
    boundaries: &[DateTime<Utc>],
    unit: IntervalUnit,
    adjustments: &AdjustmentTable,
    source: &S,
    options: &AssemblyOptions,
) -> Result<Report>
where
    S: UptimeSource + ?Sized,
{
    let limit = options.concurrency.max(1);
    let semaphore = Semaphore::new(limit);
    let semaphore = &semaphore;

    let mut results = stream::iter(checks.iter())
        .map(|check| async move {
            let values =
                assemble_check(check, boundaries, adjustments, source, semaphore, options.correction, limit)
                    .await;
            (check, values)
        })
        .buffered(limit);

    let mut series = Series {
        labels: interval_labels(unit, boundaries),
        lines: Vec::with_capacity(checks.len()),
    };
    let mut failures = Vec::new();

    while let Some((check, values)) = results.next().await {
        match values {
            Ok(values) => series.lines.push(SeriesLine {
                check: check.clone(),
                values,
            }),
            Err(error) => match options.failure_policy {
                FailurePolicy::FailFast => return Err(error),
                FailurePolicy::BestEffort => {
                    warn!(check = %check, error = %error, "Skipping check");
                    failures.push(CheckFailure {
                        check: check.clone(),
                        error,
                    });
                }
            },
        }
    }

    Ok(Report { series, failures })
}

async fn assemble_check<S>(
    check: &str,
    boundaries: &[DateTime<Utc>],
    adjustments: &AdjustmentTable,
    source: &S,
    semaphore: &Semaphore,
    correction: CorrectionPolicy,
    limit: usize,
) -> Result<Vec<f64>>
where
    S: UptimeSource + ?Sized,
{
    stream::iter(boundaries.windows(2))
        .map(|pair| {
            let (from, to) = (pair[0], pair[1]);
            async move {
                let raw = {
                    let _permit = semaphore.acquire().await.map_err(|e| ReportError::Fetch {
                        check: check.to_string(),
                        from,
                        to,
                        source: SourceError::Unavailable(format!("semaphore: {e}")),
                    })?;
                    source.fetch(check, from, to).await
                }
                .map_err(|source| ReportError::Fetch {
                    check: check.to_string(),
                    from,
                    to,
                    source,
                })?;

                let scheduled = adjustments.scheduled_minutes(&to, check);
                let corrected = correct_downtime(raw, scheduled, correction);
                if corrected.is_over_adjusted() {
                    warn!(
                        check = check,
                        from = %from,
                        to = %to,
                        adjusted_down_seconds = corrected.unclamped_down_seconds,
                        "Scheduled downtime exceeds observed downtime"
                    );
                }

                uptime_percentage(&corrected).map_err(|source| ReportError::Compute {
                    check: check.to_string(),
                    from,
                    to,
                    source,
                })
            }
        })
        .buffered(limit)
        .try_collect()
        .await
}

/// Runs a full report: boundaries, adjustments, check selection and assembly
///
/// # Arguments
///
/// * `config` - Report options
/// * `source` - Where raw availability comes from
/// * `now` - Anchor for the relative boundary expressions
///
/// # Returns
///
/// * `Ok(Report)` on success
/// * `Err(ReportError::DeadlineExceeded)` if `config.deadline` elapses first;
///   outstanding fetches are dropped
/// * Any configuration, source or assembly error
pub async fn collect_report<S>(config: &ReportConfig, source: &S, now: DateTime<Utc>) -> Result<Report>
where
    S: UptimeSource + ?Sized,
{
    let boundaries = generate_boundaries(config.interval, config.range, |expression| {
        parse_relative_date(expression, now)
    })?;
    let adjustments = build_adjustments(&boundaries, &config.schedule);
    let checks = select_checks(source.checks().await?, config.whitelist.as_deref());

    info!(
        checks = checks.len(),
        intervals = boundaries.len() - 1,
        interval = %config.interval,
        adjusted_intervals = adjustments.len(),
        "Collecting data"
    );

    let options = AssemblyOptions::from(config);
    let assembly = assemble(&checks, &boundaries, config.interval, &adjustments, source, &options);

    match config.deadline {
        Some(deadline) => tokio::time::timeout(deadline, assembly)
            .await
            .map_err(|_| ReportError::DeadlineExceeded(deadline.as_secs()))?,
        None => assembly.await,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::error::ComputeError;
    use crate::schedule::ScheduledWindow;
    use crate::uptime::RawAvailability;

    type Window = (DateTime<Utc>, DateTime<Utc>);

    #[derive(Default)]
    struct StubSource {
        checks: Vec<String>,
        data: HashMap<(String, Window), std::result::Result<RawAvailability, SourceError>>,
        fallback: Option<RawAvailability>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl StubSource {
        fn with_checks(checks: &[&str]) -> Self {
            Self {
                checks: checks.iter().map(|c| c.to_string()).collect(),
                ..Self::default()
            }
        }

        fn insert(&mut self, check: &str, from: DateTime<Utc>, to: DateTime<Utc>, up: f64, down: f64) {
            self.data
                .insert((check.to_string(), (from, to)), Ok(RawAvailability::new(up, down)));
        }

        fn fail(&mut self, check: &str, from: DateTime<Utc>, to: DateTime<Utc>, error: SourceError) {
            self.data.insert((check.to_string(), (from, to)), Err(error));
        }
    }

    #[async_trait]
    impl UptimeSource for StubSource {
        async fn checks(&self) -> std::result::Result<Vec<String>, SourceError> {
            Ok(self.checks.clone())
        }

        async fn fetch(
            &self,
            check: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> std::result::Result<RawAvailability, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match self.data.get(&(check.to_string(), (from, to))) {
                Some(result) => result.clone(),
                None => self
                    .fallback
                    .ok_or_else(|| SourceError::UnknownCheck(check.to_string())),
            }
        }
    }

    fn t(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::weeks(i)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn end_to_end_two_intervals() {
        let mut source = StubSource::with_checks(&["api"]);
        source.insert("api", t(0), t(1), 604_800.0, 0.0);
        source.insert("api", t(1), t(2), 603_800.0, 1_000.0);

        let report = assemble(
            &names(&["api"]),
            &[t(0), t(1), t(2)],
            IntervalUnit::Week,
            &AdjustmentTable::default(),
            &source,
            &AssemblyOptions::default(),
        )
        .await
        .unwrap();

        let values = report.series.get("api").unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], 100.0);
        assert!((values[1] - 99.834_656_084_656).abs() < 1e-9, "got {}", values[1]);
        assert_eq!(report.series.labels, vec![t(1).format("%m-%d").to_string(), t(2).format("%m-%d").to_string()]);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn every_line_matches_label_count_and_check_order() {
        let source = StubSource {
            fallback: Some(RawAvailability::new(99.0, 1.0)),
            ..StubSource::with_checks(&[])
        };
        let boundaries: Vec<_> = (0..6).map(t).collect();
        let checks = names(&["web", "api", "db"]);

        let options = AssemblyOptions {
            concurrency: 3,
            ..AssemblyOptions::default()
        };
        let report = assemble(&checks, &boundaries, IntervalUnit::Week, &AdjustmentTable::default(), &source, &options)
            .await
            .unwrap();

        assert_eq!(report.series.checks().collect::<Vec<_>>(), vec!["web", "api", "db"]);
        assert_eq!(report.series.labels.len(), boundaries.len() - 1);
        for line in &report.series.lines {
            assert_eq!(line.values.len(), boundaries.len() - 1);
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 15);
    }

    #[tokio::test]
    async fn repeated_runs_are_identical() {
        let mut source = StubSource::with_checks(&["api"]);
        source.insert("api", t(0), t(1), 500.0, 100.0);
        source.insert("api", t(1), t(2), 900.0, 100.0);
        let windows = vec![ScheduledWindow::new(t(1) + chrono::Duration::days(2), [("api", 1.0)])];
        let boundaries = [t(0), t(1), t(2)];
        let adjustments = build_adjustments(&boundaries, &windows);
        let checks = names(&["api"]);

        let first = assemble(&checks, &boundaries, IntervalUnit::Week, &adjustments, &source, &AssemblyOptions::default())
            .await
            .unwrap();
        let second = assemble(&checks, &boundaries, IntervalUnit::Week, &adjustments, &source, &AssemblyOptions::default())
            .await
            .unwrap();
        assert_eq!(first.series, second.series);
    }

    #[tokio::test]
    async fn scheduled_minutes_only_touch_their_interval_and_check() {
        let mut source = StubSource::with_checks(&["api", "web"]);
        for check in ["api", "web"] {
            source.insert(check, t(0), t(1), 900.0, 160.0);
            source.insert(check, t(1), t(2), 900.0, 160.0);
        }
        let boundaries = [t(0), t(1), t(2)];
        let windows = vec![ScheduledWindow::new(t(1) + chrono::Duration::days(3), [("api", 1.0)])];
        let adjustments = build_adjustments(&boundaries, &windows);

        let report = assemble(
            &names(&["api", "web"]),
            &boundaries,
            IntervalUnit::Week,
            &adjustments,
            &source,
            &AssemblyOptions::default(),
        )
        .await
        .unwrap();

        let raw_pct = 900.0 / 1060.0 * 100.0;
        assert_eq!(report.series.get("api").unwrap(), [raw_pct, 90.0]);
        assert_eq!(report.series.get("web").unwrap(), [raw_pct, raw_pct]);
    }

    #[tokio::test]
    async fn fail_fast_names_check_and_interval() {
        let mut source = StubSource::with_checks(&["api"]);
        source.insert("api", t(0), t(1), 100.0, 0.0);
        source.fail("api", t(1), t(2), SourceError::Unavailable("timeout".to_string()));

        let err = assemble(
            &names(&["api"]),
            &[t(0), t(1), t(2)],
            IntervalUnit::Week,
            &AdjustmentTable::default(),
            &source,
            &AssemblyOptions::default(),
        )
        .await
        .unwrap_err();

        match err {
            ReportError::Fetch { check, from, to, source } => {
                assert_eq!(check, "api");
                assert_eq!((from, to), (t(1), t(2)));
                assert_eq!(source, SourceError::Unavailable("timeout".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn best_effort_keeps_healthy_checks() {
        let mut source = StubSource::with_checks(&["api", "web"]);
        source.insert("web", t(0), t(1), 100.0, 0.0);
        source.fail("api", t(0), t(1), SourceError::UnknownCheck("api".to_string()));

        let options = AssemblyOptions {
            failure_policy: FailurePolicy::BestEffort,
            ..AssemblyOptions::default()
        };
        let report = assemble(
            &names(&["api", "web"]),
            &[t(0), t(1)],
            IntervalUnit::Week,
            &AdjustmentTable::default(),
            &source,
            &options,
        )
        .await
        .unwrap();

        assert_eq!(report.series.checks().collect::<Vec<_>>(), vec!["web"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].check, "api");
        assert_eq!(report.failures[0].error.check(), Some("api"));
    }

    #[tokio::test]
    async fn zero_duration_interval_is_reported_not_nan() {
        let mut source = StubSource::with_checks(&["api"]);
        source.insert("api", t(0), t(1), 0.0, 0.0);

        let err = assemble(
            &names(&["api"]),
            &[t(0), t(1)],
            IntervalUnit::Week,
            &AdjustmentTable::default(),
            &source,
            &AssemblyOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            ReportError::Compute { source: ComputeError::ZeroDurationInterval, .. }
        ));
    }

    #[tokio::test]
    async fn clamp_policy_is_opt_in() {
        let mut source = StubSource::with_checks(&["api"]);
        source.insert("api", t(0), t(1), 100.0, 10.0);
        let boundaries = [t(0), t(1)];
        let adjustments = build_adjustments(&boundaries, &[ScheduledWindow::new(t(0), [("api", 1.0)])]);
        let checks = names(&["api"]);

        let preserved = assemble(&checks, &boundaries, IntervalUnit::Week, &adjustments, &source, &AssemblyOptions::default())
            .await
            .unwrap();
        assert_eq!(preserved.series.get("api").unwrap(), [200.0]);

        let options = AssemblyOptions {
            correction: CorrectionPolicy::Clamp,
            ..AssemblyOptions::default()
        };
        let clamped = assemble(&checks, &boundaries, IntervalUnit::Week, &adjustments, &source, &options)
            .await
            .unwrap();
        assert_eq!(clamped.series.get("api").unwrap(), [100.0]);
    }

    #[tokio::test]
    async fn in_flight_fetches_respect_concurrency_limit() {
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let source = StubSource {
            fallback: Some(RawAvailability::new(1.0, 0.0)),
            delay: Some(Duration::from_millis(10)),
            max_in_flight: Arc::clone(&max_in_flight),
            ..StubSource::with_checks(&[])
        };
        let boundaries: Vec<_> = (0..5).map(t).collect();
        let options = AssemblyOptions {
            concurrency: 2,
            ..AssemblyOptions::default()
        };

        assemble(
            &names(&["a", "b", "c", "d"]),
            &boundaries,
            IntervalUnit::Week,
            &AdjustmentTable::default(),
            &source,
            &options,
        )
        .await
        .unwrap();

        assert!(max_in_flight.load(Ordering::SeqCst) <= 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 16);
    }

    #[tokio::test]
    async fn collect_report_applies_whitelist_and_range() {
        let source = StubSource {
            fallback: Some(RawAvailability::new(3.0, 1.0)),
            ..StubSource::with_checks(&["web", "api", "db"])
        };
        let config = ReportConfig {
            range: 3,
            whitelist: Some(names(&["db", "web", "ghost"])),
            ..ReportConfig::default()
        };

        let report = collect_report(&config, &source, t(10)).await.unwrap();
        assert_eq!(report.series.checks().collect::<Vec<_>>(), vec!["web", "db"]);
        assert_eq!(report.series.labels.len(), 3);
        assert_eq!(report.series.get("db").unwrap(), [75.0, 75.0, 75.0]);
    }

    #[tokio::test]
    async fn collect_report_rejects_invalid_range_before_fetching() {
        let source = StubSource::with_checks(&["api"]);
        let config = ReportConfig {
            range: 0,
            ..ReportConfig::default()
        };

        let result = collect_report(&config, &source, t(10)).await;
        assert!(matches!(result, Err(ReportError::InvalidRange(0))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deadline_aborts_outstanding_fetches() {
        let source = StubSource {
            fallback: Some(RawAvailability::new(1.0, 0.0)),
            delay: Some(Duration::from_millis(500)),
            ..StubSource::with_checks(&["api"])
        };
        let config = ReportConfig {
            range: 2,
            deadline: Some(Duration::from_millis(20)),
            ..ReportConfig::default()
        };

        let result = collect_report(&config, &source, t(10)).await;
        assert!(matches!(result, Err(ReportError::DeadlineExceeded(_))));
    }
}
