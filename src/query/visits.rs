use duckdb::Connection;

use crate::archive::rows::{Label, VisitMetrics};
use crate::error::Result;
use crate::query::filter::{SqlFilter, WhereBuilder};
use crate::query::DayWindow;
use crate::segment::Segment;

/// The seven per-group visit aggregates. Sums and maxes are coalesced so a
/// group is never NULL-valued, and integer sums are cast down from DuckDB's
/// HUGEINT before being read.
const METRIC_SELECT: &str = "\
COUNT(DISTINCT visitor_id) AS nb_uniq_visitors,
COUNT(*) AS nb_visits,
CAST(COALESCE(SUM(visit_total_actions), 0) AS BIGINT) AS nb_actions,
CAST(COALESCE(MAX(visit_total_actions), 0) AS DOUBLE) AS max_actions,
CAST(COALESCE(SUM(visit_total_time), 0) AS BIGINT) AS sum_visit_length,
COUNT(*) FILTER (WHERE visit_total_actions = 1) AS bounce_count,
COUNT(*) FILTER (WHERE visit_goal_converted) AS nb_visits_converted";

/// Groupable visit attributes.
///
/// A dimension maps to one or more log columns; multi-column dimensions
/// produce tuple labels keyed on the full tuple. Keeping this a fixed enum is
/// what makes interpolating the column names into GROUP BY safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Browser,
    Os,
    ReferrerType,
    ReferrerName,
    ReferrerKeyword,
    /// Referrer type and name as a composite grouping key.
    Referrer,
    Country,
    Continent,
    ReturningVisitor,
}

impl Dimension {
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Browser => &["config_browser"],
            Self::Os => &["config_os"],
            Self::ReferrerType => &["referer_type"],
            Self::ReferrerName => &["referer_name"],
            Self::ReferrerKeyword => &["referer_keyword"],
            Self::Referrer => &["referer_type", "referer_name"],
            Self::Country => &["location_country"],
            Self::Continent => &["location_continent"],
            Self::ReturningVisitor => &["visitor_returning"],
        }
    }

    /// Select list for the label columns. NULLs group under the empty
    /// string; booleans are rendered as text so every label is a string.
    fn label_select(self) -> String {
        self.columns()
            .iter()
            .map(|col| format!("COALESCE(CAST({col} AS VARCHAR), '')"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn group_by(self) -> String {
        (1..=self.columns().len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One row of a by-dimension aggregation: the dimension value(s) plus the
/// seven visit metrics for that group.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionRow {
    pub label: Label,
    pub metrics: VisitMetrics,
}

fn visit_where(
    site_id: &str,
    window: DayWindow,
    segment: &Segment,
    extra: Option<&SqlFilter>,
) -> WhereBuilder {
    let mut builder = WhereBuilder::new();
    builder.push(
        "visit_last_action_time >= CAST(? AS TIMESTAMP)",
        [window.start_datetime()],
    );
    builder.push(
        "visit_last_action_time <= CAST(? AS TIMESTAMP)",
        [window.end_datetime()],
    );
    builder.push("site_id = ?", [site_id.to_string()]);
    builder.push_filter(extra);
    builder.push_segment(segment);
    builder
}

fn metrics_from_row(row: &duckdb::Row<'_>, offset: usize) -> duckdb::Result<VisitMetrics> {
    Ok(VisitMetrics {
        uniq_visitors: row.get(offset)?,
        visits: row.get(offset + 1)?,
        actions: row.get(offset + 2)?,
        max_actions: row.get(offset + 3)?,
        sum_visit_length: row.get(offset + 4)?,
        bounce_count: row.get(offset + 5)?,
        visits_converted: row.get(offset + 6)?,
    })
}

/// Run the canonical day visit-summary aggregate for a site, window and
/// segment. Returns `None` when no visit matched — the caller must treat
/// that as "nothing to archive", not as an all-zero row.
pub fn query_visit_summary(
    conn: &Connection,
    site_id: &str,
    window: DayWindow,
    segment: &Segment,
) -> Result<Option<VisitMetrics>> {
    let builder = visit_where(site_id, window, segment, None);
    let sql = format!(
        "SELECT {METRIC_SELECT} FROM log_visit {}",
        builder.clause()
    );

    let mut stmt = conn.prepare(&sql)?;
    let metrics = stmt.query_row(duckdb::params_from_iter(builder.binds()), |row| {
        metrics_from_row(row, 0)
    })?;

    if metrics.visits == 0 {
        return Ok(None);
    }
    Ok(Some(metrics))
}

/// Aggregate visits grouped by a dimension: one row per distinct value (or
/// tuple), carrying the seven metrics. No ordering is imposed on the result.
pub fn query_visits_by_dimension(
    conn: &Connection,
    site_id: &str,
    window: DayWindow,
    segment: &Segment,
    dimension: Dimension,
    extra: Option<&SqlFilter>,
) -> Result<Vec<DimensionRow>> {
    let builder = visit_where(site_id, window, segment, extra);
    let sql = format!(
        "SELECT {}, {METRIC_SELECT} FROM log_visit {} GROUP BY {}",
        dimension.label_select(),
        builder.clause(),
        dimension.group_by(),
    );

    let label_width = dimension.columns().len();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(duckdb::params_from_iter(builder.binds()), |row| {
            let mut parts = Vec::with_capacity(label_width);
            for i in 0..label_width {
                parts.push(row.get::<_, String>(i)?);
            }
            Ok(DimensionRow {
                label: Label::from_parts(parts),
                metrics: metrics_from_row(row, label_width)?,
            })
        })?
        .collect::<duckdb::Result<Vec<_>>>()?;

    Ok(rows)
}
