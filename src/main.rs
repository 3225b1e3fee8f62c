//! Pingdom Uptime Grapher
//!
//! Charts historical uptime for Pingdom checks, one data point per week,
//! month or year, with scheduled maintenance discounted from downtime.

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use dotenv::dotenv;
use tracing::{info, warn};

use uptime_grapher::config::{
    api_url_from_env, parse_check_list, DEFAULT_CONCURRENCY, DEFAULT_OUTPUT_PATH, DEFAULT_RANGE,
};
use uptime_grapher::{
    collect_report, load_schedule, render_chart, CorrectionPolicy, FailurePolicy, IntervalUnit,
    PingdomApi, PingdomCredentials, ReportConfig,
};

/// Create historical uptime report
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Report uptimes for every week, month or year
    #[arg(short, long, value_parser = IntervalUnit::parse, default_value = "week")]
    interval: IntervalUnit,

    /// Number of data points to report
    #[arg(short, long, default_value_t = DEFAULT_RANGE)]
    range: i64,

    /// Output filename
    #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH)]
    file: PathBuf,

    /// Checks to include, comma separated (e.g., api,web)
    #[arg(short, long, value_delimiter = ',', env = "PINGDOM_CHECKS")]
    whitelist: Option<Vec<String>>,

    /// YAML, JSON or TOML file with minutes of expected downtime per check, keyed by date
    #[arg(short, long)]
    scheduled: Option<PathBuf>,

    /// Maximum number of concurrent API requests
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Skip checks that fail instead of aborting the whole report
    #[arg(long)]
    best_effort: bool,

    /// Never let scheduled downtime push a check above 100%
    #[arg(long)]
    clamp_downtime: bool,

    /// Give up on data collection after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Text placed before "% Uptime by ..." in the chart title
    #[arg(long)]
    title_prefix: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<ReportConfig, Box<dyn Error>> {
        let schedule = match &self.scheduled {
            Some(path) => load_schedule(path)?,
            None => Vec::new(),
        };

        let whitelist = self
            .whitelist
            .map(|names| names.iter().flat_map(|n| parse_check_list(n)).collect::<Vec<_>>())
            .filter(|names| !names.is_empty());

        Ok(ReportConfig {
            interval: self.interval,
            range: self.range,
            output_path: self.file,
            whitelist,
            schedule,
            concurrency: self.concurrency,
            failure_policy: if self.best_effort {
                FailurePolicy::BestEffort
            } else {
                FailurePolicy::FailFast
            },
            correction: if self.clamp_downtime {
                CorrectionPolicy::Clamp
            } else {
                CorrectionPolicy::Preserve
            },
            deadline: self.timeout_secs.map(Duration::from_secs),
            title_prefix: self.title_prefix,
        })
    }
}

/// Main entry point for the uptime grapher
///
/// This function:
/// 1. Parses command line arguments and the optional schedule file
/// 2. Loads Pingdom credentials from environment variables
/// 3. Collects per-interval uptime for every selected check
/// 4. Prints each check's data and writes the chart
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok(); // Load .env file if it exists
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Args::parse().into_config()?;
    config.validate()?;

    info!(
        interval = %config.interval,
        range = config.range,
        scheduled_windows = config.schedule.len(),
        "Creating uptime report"
    );

    let credentials = PingdomCredentials::from_env()?;
    let pingdom_api = PingdomApi::connect(&credentials, &api_url_from_env()).await?;

    let report = collect_report(&config, &pingdom_api, Utc::now()).await?;

    for failure in &report.failures {
        warn!(check = %failure.check, error = %failure.error, "Check left out of report");
    }

    for line in &report.series.lines {
        println!("Check: {}", line.check);
        println!("{}", "-".repeat(80));
        for (label, value) in report.series.labels.iter().zip(&line.values) {
            println!("{label:<8} {value:.4}%");
        }
        println!();
    }

    render_chart(&report.series, &config.title(), &config.output_path)?;
    println!("==> Graph written to: {}", config.output_path.display());

    Ok(())
}
