//! Historical uptime reports for Pingdom checks.
//!
//! Splits a reporting period into week, month or year buckets, pulls up/down
//! seconds for every check and bucket, discounts pre-declared maintenance and
//! turns the result into a labelled series ready for charting.

pub mod config;
pub mod error;
pub mod interval;
pub mod pingdom;
pub mod relative_date;
pub mod render;
pub mod report;
pub mod schedule;
pub mod source;
pub mod uptime;

pub use config::{PingdomCredentials, ReportConfig};
pub use error::{ComputeError, ReportError, SourceError};
pub use interval::{generate_boundaries, interval_labels, IntervalUnit};
pub use pingdom::PingdomApi;
pub use relative_date::parse_relative_date;
pub use render::{render_chart, RenderError};
pub use report::{assemble, collect_report, AssemblyOptions, FailurePolicy, Report, Series, SeriesLine};
pub use schedule::{build_adjustments, load_schedule, AdjustmentTable, ScheduledWindow};
pub use source::UptimeSource;
pub use uptime::{compute_uptime, CorrectionPolicy, RawAvailability};
