use tracing::info;

use crate::archive::day::{DayArchiver, VISITS_SUMMARY_REPORT};
use crate::error::Result;
use crate::query::visits::Dimension;

/// One dimension report to archive: the blob record name it is stored under,
/// the dimension it groups by, and whether goal conversions are layered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionReport {
    pub record_name: &'static str,
    pub dimension: Dimension,
    pub include_conversions: bool,
}

/// Result of archiving one report. `archived` is `false` when the day had no
/// visits and nothing was written for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutcome {
    pub record_name: &'static str,
    pub archived: bool,
}

/// The set of dimension reports archived for a day, run in registration
/// order against one archiver.
#[derive(Debug, Default)]
pub struct ReportRegistry {
    reports: Vec<DimensionReport>,
}

impl ReportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard report set.
    pub fn defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DimensionReport {
            record_name: "browsers",
            dimension: Dimension::Browser,
            include_conversions: false,
        });
        registry.register(DimensionReport {
            record_name: "operating_systems",
            dimension: Dimension::Os,
            include_conversions: false,
        });
        registry.register(DimensionReport {
            record_name: "referrers",
            dimension: Dimension::Referrer,
            include_conversions: true,
        });
        registry.register(DimensionReport {
            record_name: "referrer_keywords",
            dimension: Dimension::ReferrerKeyword,
            include_conversions: true,
        });
        registry.register(DimensionReport {
            record_name: "countries",
            dimension: Dimension::Country,
            include_conversions: true,
        });
        registry.register(DimensionReport {
            record_name: "continents",
            dimension: Dimension::Continent,
            include_conversions: false,
        });
        registry.register(DimensionReport {
            record_name: "returning_visitors",
            dimension: Dimension::ReturningVisitor,
            include_conversions: true,
        });
        registry
    }

    pub fn register(&mut self, report: DimensionReport) {
        info!(record = report.record_name, "registered report");
        self.reports.push(report);
    }

    pub fn reports(&self) -> &[DimensionReport] {
        &self.reports
    }

    /// Archive every registered report. The visit check runs once up front;
    /// a day without visits yields all-skipped outcomes without touching the
    /// report queries.
    pub fn run(&self, archiver: &mut DayArchiver<'_>) -> Result<Vec<ReportOutcome>> {
        if !archiver.has_visits(VISITS_SUMMARY_REPORT)? {
            return Ok(self
                .reports
                .iter()
                .map(|report| ReportOutcome {
                    record_name: report.record_name,
                    archived: false,
                })
                .collect());
        }

        let mut outcomes = Vec::with_capacity(self.reports.len());
        for report in &self.reports {
            let archived = archiver.archive_report(report)?;
            outcomes.push(ReportOutcome {
                record_name: report.record_name,
                archived,
            });
        }
        Ok(outcomes)
    }
}
