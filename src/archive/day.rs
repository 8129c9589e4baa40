use chrono::NaiveDate;
use duckdb::Connection;
use tracing::{debug, info};

use crate::archive::reports::DimensionReport;
use crate::archive::rows::{enrich_with_totals, LabeledRows, VisitMetrics};
use crate::error::Result;
use crate::query::cache::SummaryCache;
use crate::query::conversions::{query_conversions_by_dimension, ConversionQuery};
use crate::query::filter::SqlFilter;
use crate::query::visits::{query_visit_summary, query_visits_by_dimension, Dimension};
use crate::query::DayWindow;
use crate::segment::Segment;
use crate::storage::records::ArchiveStore;

/// Report name whose archiving is allowed to compute the visit summary
/// directly even under a segment, instead of going through the cache.
pub const VISITS_SUMMARY_REPORT: &str = "VisitsSummary";

/// Archives one (site, day, segment) context: computes the canonical visit
/// summary once, then aggregates and persists per-dimension reports against
/// it.
///
/// The summary check is the gate for everything else. When the day has no
/// matching visits, no numeric records and no report blobs are written at
/// all; readers distinguish "not archived" from "archived as zero" by the
/// records' absence.
pub struct DayArchiver<'a> {
    conn: &'a Connection,
    site_id: &'a str,
    window: DayWindow,
    segment: Segment,
    cache: &'a SummaryCache,
    has_visits: Option<bool>,
    visit_count: u64,
    visits_converted_count: u64,
}

impl<'a> DayArchiver<'a> {
    pub fn new(
        conn: &'a Connection,
        site_id: &'a str,
        date: NaiveDate,
        segment: Segment,
        cache: &'a SummaryCache,
    ) -> Self {
        Self {
            conn,
            site_id,
            window: DayWindow::new(date),
            segment,
            cache,
            has_visits: None,
            visit_count: 0,
            visits_converted_count: 0,
        }
    }

    pub fn site_id(&self) -> &str {
        self.site_id
    }

    pub fn date(&self) -> NaiveDate {
        self.window.date()
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Number of visits found by the summary check. Zero until
    /// [`Self::has_visits`] has run.
    pub fn visit_count(&self) -> u64 {
        self.visit_count
    }

    /// Number of converted visits found by the summary check.
    pub fn visits_converted_count(&self) -> u64 {
        self.visits_converted_count
    }

    /// Persistence handle for this (site, day, segment) context.
    pub fn store(&self) -> ArchiveStore<'a> {
        ArchiveStore::new(
            self.conn,
            self.site_id,
            self.window.date(),
            self.segment.cache_token(),
        )
    }

    fn summary_cache_key(&self) -> String {
        format!(
            "{}|{}|{}|visits_summary",
            self.site_id,
            self.window.date().format("%Y-%m-%d"),
            self.segment.cache_token(),
        )
    }

    /// Whether this context has any visits to archive. The answer is
    /// computed once and memoized; the summary metrics are persisted as a
    /// side effect of the first call.
    ///
    /// With no segment, or when the visit summary itself is the requested
    /// report, the summary aggregate runs directly. A segmented request for
    /// any other report first consults the shared summary cache, so that a
    /// batch of segmented reports triggers exactly one summary scan.
    pub fn has_visits(&mut self, requested_report: &str) -> Result<bool> {
        if let Some(answer) = self.has_visits {
            return Ok(answer);
        }

        let summary = if self.segment.is_empty() || requested_report == VISITS_SUMMARY_REPORT {
            self.archive_visit_summary()?
        } else if let Some(cached) = self.cache.get(&self.summary_cache_key()) {
            debug!(
                site_id = self.site_id,
                date = %self.window.date(),
                "visit summary served from cache"
            );
            Some(cached)
        } else {
            self.archive_visit_summary()?
        };

        let answer = match summary {
            Some(metrics) => {
                self.visit_count = metrics.visits;
                self.visits_converted_count = metrics.visits_converted;
                metrics.visits > 0
            }
            None => false,
        };
        self.has_visits = Some(answer);
        Ok(answer)
    }

    /// Run the visit-summary aggregate, persist its seven metrics as numeric
    /// records, and publish it to the cache. Returns `None` without writing
    /// anything when no visit matched.
    fn archive_visit_summary(&self) -> Result<Option<VisitMetrics>> {
        let summary = query_visit_summary(self.conn, self.site_id, self.window, &self.segment)?;
        let Some(metrics) = summary else {
            debug!(
                site_id = self.site_id,
                date = %self.window.date(),
                "no visits to archive"
            );
            return Ok(None);
        };

        let store = self.store();
        for (name, value) in metrics.named_records() {
            store.insert_numeric(name, value)?;
        }
        self.cache.insert(self.summary_cache_key(), metrics);
        info!(
            site_id = self.site_id,
            date = %self.window.date(),
            visits = metrics.visits,
            "archived visit summary"
        );
        Ok(Some(metrics))
    }

    /// Aggregate visits grouped by a dimension into labeled rows. Rows from
    /// the query fold into the map, so duplicate labels accumulate rather
    /// than overwrite.
    pub fn visits_by_dimension(
        &self,
        dimension: Dimension,
        extra: Option<&SqlFilter>,
    ) -> Result<LabeledRows> {
        let query_rows = query_visits_by_dimension(
            self.conn,
            self.site_id,
            self.window,
            &self.segment,
            dimension,
            extra,
        )?;
        let mut rows = LabeledRows::new();
        for query_row in query_rows {
            rows.entry(query_row.label)
                .or_default()
                .metrics
                .accumulate(&query_row.metrics);
        }
        Ok(rows)
    }

    /// Merge per-goal conversion metrics into an existing dimension
    /// breakdown. Returns `false` when the segment cannot filter the
    /// conversion log; the rows are then left untouched and the caller must
    /// skip the enrichment step.
    pub fn conversions_by_dimension(
        &self,
        dimension: Dimension,
        extra: Option<&SqlFilter>,
        rows: &mut LabeledRows,
    ) -> Result<bool> {
        let result = query_conversions_by_dimension(
            self.conn,
            self.site_id,
            self.window,
            &self.segment,
            dimension,
            extra,
        )?;
        let conversion_rows = match result {
            ConversionQuery::Unsupported => {
                debug!(
                    site_id = self.site_id,
                    date = %self.window.date(),
                    "segment not applicable to conversions, skipping goal metrics"
                );
                return Ok(false);
            }
            ConversionQuery::Rows(conversion_rows) => conversion_rows,
        };
        for conversion_row in conversion_rows {
            rows.entry(conversion_row.label)
                .or_default()
                .add_goal(conversion_row.goal_id, &conversion_row.metrics);
        }
        Ok(true)
    }

    /// Archive one dimension report: aggregate visits, optionally layer in
    /// goal conversions with derived totals, and persist the table as a
    /// blob record. Returns `false` when the day had no visits and nothing
    /// was written.
    pub fn archive_report(&mut self, report: &DimensionReport) -> Result<bool> {
        if !self.has_visits(report.record_name)? {
            return Ok(false);
        }

        let mut rows = self.visits_by_dimension(report.dimension, None)?;
        if report.include_conversions {
            let supported = self.conversions_by_dimension(report.dimension, None, &mut rows)?;
            if supported {
                enrich_with_totals(&mut rows);
            }
        }

        let table = crate::archive::table::DataTable::from_rows(rows);
        self.store().insert_blob(report.record_name, &table.to_json()?)?;
        info!(
            site_id = self.site_id,
            date = %self.window.date(),
            record = report.record_name,
            rows = table.len(),
            "archived report"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::rows::Label;
    use crate::archive::table::DataTable;
    use crate::query::visits::Dimension;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::storage::schema::init_schema(&conn).unwrap();
        conn
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn insert_visit(conn: &Connection, visitor_id: &str, actions: i64, browser: &str) {
        conn.execute(
            "INSERT INTO log_visit (site_id, visitor_id, visit_last_action_time,
             visit_total_actions, visit_total_time, config_browser)
             VALUES ('site1', ?, CAST('2024-01-01 12:00:00' AS TIMESTAMP), ?, 60, ?)",
            duckdb::params![visitor_id, actions, browser],
        )
        .unwrap();
    }

    fn firefox_segment() -> Segment {
        Segment::new(
            "config_browser = ?",
            vec!["Firefox".to_string()],
            vec!["config_browser".to_string()],
        )
    }

    #[test]
    fn test_no_visits_writes_nothing() {
        let conn = setup_test_db();
        let cache = SummaryCache::new(60);
        let mut archiver = DayArchiver::new(&conn, "site1", day(), Segment::empty(), &cache);

        assert!(!archiver.has_visits(VISITS_SUMMARY_REPORT).unwrap());
        assert_eq!(archiver.store().numeric_record_count().unwrap(), 0);
        assert_eq!(archiver.visit_count(), 0);
    }

    #[test]
    fn test_summary_persists_seven_records() {
        let conn = setup_test_db();
        insert_visit(&conn, "v1", 1, "Firefox");
        insert_visit(&conn, "v2", 5, "Chrome");

        let cache = SummaryCache::new(60);
        let mut archiver = DayArchiver::new(&conn, "site1", day(), Segment::empty(), &cache);

        assert!(archiver.has_visits(VISITS_SUMMARY_REPORT).unwrap());
        let store = archiver.store();
        assert_eq!(store.numeric_record_count().unwrap(), 7);
        assert_eq!(store.get_numeric("nb_visits").unwrap(), Some(2.0));
        assert_eq!(store.get_numeric("nb_actions").unwrap(), Some(6.0));
        assert_eq!(store.get_numeric("max_actions").unwrap(), Some(5.0));
        assert_eq!(store.get_numeric("bounce_count").unwrap(), Some(1.0));
        assert_eq!(archiver.visit_count(), 2);
    }

    #[test]
    fn test_has_visits_is_memoized() {
        let conn = setup_test_db();
        insert_visit(&conn, "v1", 1, "Firefox");

        let cache = SummaryCache::new(60);
        let mut archiver = DayArchiver::new(&conn, "site1", day(), Segment::empty(), &cache);

        assert!(archiver.has_visits("browsers").unwrap());
        assert!(archiver.has_visits("countries").unwrap());
        // The summary ran exactly once
        assert_eq!(archiver.store().numeric_record_count().unwrap(), 7);
    }

    #[test]
    fn test_segmented_report_uses_cached_summary() {
        let conn = setup_test_db();
        insert_visit(&conn, "v1", 2, "Firefox");

        let cache = SummaryCache::new(60);
        {
            let mut first =
                DayArchiver::new(&conn, "site1", day(), firefox_segment(), &cache);
            assert!(first.has_visits(VISITS_SUMMARY_REPORT).unwrap());
            assert_eq!(first.store().numeric_record_count().unwrap(), 7);
        }

        // A second archiver for another report finds the summary cached and
        // does not persist the numeric records again.
        let mut second = DayArchiver::new(&conn, "site1", day(), firefox_segment(), &cache);
        assert!(second.has_visits("browsers").unwrap());
        assert_eq!(second.store().numeric_record_count().unwrap(), 7);
        assert_eq!(second.visit_count(), 1);
    }

    #[test]
    fn test_segmented_cache_miss_falls_back_to_query() {
        let conn = setup_test_db();
        insert_visit(&conn, "v1", 2, "Firefox");

        let cache = SummaryCache::new(60);
        let mut archiver = DayArchiver::new(&conn, "site1", day(), firefox_segment(), &cache);

        assert!(archiver.has_visits("browsers").unwrap());
        assert_eq!(archiver.store().numeric_record_count().unwrap(), 7);
        assert!(cache.get(&archiver.summary_cache_key()).is_some());
    }

    #[test]
    fn test_segment_with_no_matching_visits() {
        let conn = setup_test_db();
        insert_visit(&conn, "v1", 2, "Chrome");

        let cache = SummaryCache::new(60);
        let mut archiver = DayArchiver::new(&conn, "site1", day(), firefox_segment(), &cache);

        assert!(!archiver.has_visits(VISITS_SUMMARY_REPORT).unwrap());
        assert_eq!(archiver.store().numeric_record_count().unwrap(), 0);
    }

    #[test]
    fn test_archive_report_writes_blob() {
        let conn = setup_test_db();
        insert_visit(&conn, "v1", 2, "Firefox");
        insert_visit(&conn, "v2", 3, "Firefox");
        insert_visit(&conn, "v3", 1, "Chrome");

        let cache = SummaryCache::new(60);
        let mut archiver = DayArchiver::new(&conn, "site1", day(), Segment::empty(), &cache);

        let report = DimensionReport {
            record_name: "browsers",
            dimension: Dimension::Browser,
            include_conversions: false,
        };
        assert!(archiver.archive_report(&report).unwrap());

        let blob = archiver.store().get_blob("browsers").unwrap().unwrap();
        let table = DataTable::from_bytes(blob.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        let firefox = table.get(&Label::from("Firefox")).unwrap();
        assert_eq!(firefox.row.metrics.visits, 2);
        assert_eq!(firefox.row.metrics.actions, 5);
    }

    #[test]
    fn test_archive_report_skipped_without_visits() {
        let conn = setup_test_db();
        let cache = SummaryCache::new(60);
        let mut archiver = DayArchiver::new(&conn, "site1", day(), Segment::empty(), &cache);

        let report = DimensionReport {
            record_name: "browsers",
            dimension: Dimension::Browser,
            include_conversions: false,
        };
        assert!(!archiver.archive_report(&report).unwrap());
        assert_eq!(archiver.store().get_blob("browsers").unwrap(), None);
    }

    #[test]
    fn test_report_with_conversions_enriched() {
        let conn = setup_test_db();
        insert_visit(&conn, "v1", 2, "Firefox");
        conn.execute(
            "INSERT INTO log_conversion (site_id, visit_id, visitor_id, goal_id,
             server_time, revenue, config_browser)
             VALUES ('site1', 'visit-1', 'v1', 1,
                     CAST('2024-01-01 12:05:00' AS TIMESTAMP), 9.99, 'Firefox')",
            [],
        )
        .unwrap();

        let cache = SummaryCache::new(60);
        let mut archiver = DayArchiver::new(&conn, "site1", day(), Segment::empty(), &cache);

        let report = DimensionReport {
            record_name: "browsers",
            dimension: Dimension::Browser,
            include_conversions: true,
        };
        assert!(archiver.archive_report(&report).unwrap());

        let blob = archiver.store().get_blob("browsers").unwrap().unwrap();
        let table = DataTable::from_bytes(blob.as_bytes()).unwrap();
        let firefox = table.get(&Label::from("Firefox")).unwrap();
        assert_eq!(firefox.row.goals[&1].conversions, 1);
        assert_eq!(firefox.row.conversions, Some(1));
        assert!((firefox.row.revenue.unwrap() - 9.99).abs() < 1e-9);
    }

    #[test]
    fn test_unsupported_segment_skips_goal_metrics_not_report() {
        let conn = setup_test_db();
        conn.execute(
            "INSERT INTO log_visit (site_id, visitor_id, visit_last_action_time,
             visit_total_actions, visit_total_time, config_browser)
             VALUES ('site1', 'v1', CAST('2024-01-01 12:00:00' AS TIMESTAMP), 2, 60, 'Firefox')",
            [],
        )
        .unwrap();

        // config_browser is not on the conversion allow-list
        let cache = SummaryCache::new(60);
        let mut archiver = DayArchiver::new(&conn, "site1", day(), firefox_segment(), &cache);

        let report = DimensionReport {
            record_name: "browsers",
            dimension: Dimension::Browser,
            include_conversions: true,
        };
        assert!(archiver.archive_report(&report).unwrap());

        let blob = archiver.store().get_blob("browsers").unwrap().unwrap();
        let table = DataTable::from_bytes(blob.as_bytes()).unwrap();
        let firefox = table.get(&Label::from("Firefox")).unwrap();
        // Visit metrics are present, goal metrics and derived totals are not
        assert_eq!(firefox.row.metrics.visits, 1);
        assert!(firefox.row.goals.is_empty());
        assert_eq!(firefox.row.conversions, None);
        assert_eq!(firefox.row.revenue, None);
    }

    #[test]
    fn test_visits_by_dimension_accumulates_rows() {
        let conn = setup_test_db();
        insert_visit(&conn, "v1", 2, "Firefox");
        insert_visit(&conn, "v2", 4, "Firefox");

        let cache = SummaryCache::new(60);
        let archiver = DayArchiver::new(&conn, "site1", day(), Segment::empty(), &cache);

        let rows = archiver.visits_by_dimension(Dimension::Browser, None).unwrap();
        assert_eq!(rows.len(), 1);
        let firefox = &rows[&Label::from("Firefox")];
        assert_eq!(firefox.metrics.visits, 2);
        assert!((firefox.metrics.max_actions - 4.0).abs() < f64::EPSILON);
    }
}
