//! Day-level visit and goal metrics archiving on top of DuckDB.
//!
//! The crate aggregates one day of `log_visit` / `log_conversion` rows for a
//! single site — optionally restricted by a compiled segment predicate — into
//! named numeric records and serialized hierarchical tables. It is meant to be
//! driven by a report-processing orchestrator: construct a [`DayArchiver`],
//! check [`DayArchiver::has_visits`], then archive whichever dimension reports
//! the caller has registered.

pub mod archive;
pub mod config;
pub mod error;
pub mod logging;
pub mod query;
pub mod segment;
pub mod storage;

pub use archive::day::DayArchiver;
pub use archive::reports::{DimensionReport, ReportRegistry};
pub use archive::rows::{AggregateRow, GoalMetrics, Label, LabeledRows, VisitMetrics};
pub use archive::table::DataTable;
pub use config::Config;
pub use error::{Error, Result};
pub use query::cache::SummaryCache;
pub use query::visits::Dimension;
pub use segment::Segment;
