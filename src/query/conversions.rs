use duckdb::Connection;

use crate::archive::rows::{GoalMetrics, Label};
use crate::error::Result;
use crate::query::filter::{SqlFilter, WhereBuilder};
use crate::query::visits::Dimension;
use crate::query::DayWindow;
use crate::segment::Segment;

/// Revenue is truncated — not rounded — to 2 decimal places, matching what
/// the archive readers expect. DuckDB has no two-argument trunc, hence the
/// floor construction.
const GOAL_METRIC_SELECT: &str = "\
COUNT(*) AS nb_conversions,
CAST(floor(COALESCE(SUM(revenue), 0) * 100) / 100 AS DOUBLE) AS revenue,
COUNT(DISTINCT visit_id) AS nb_visits_converted";

/// One row of a by-dimension conversion aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRow {
    pub goal_id: u32,
    pub label: Label,
    pub metrics: GoalMetrics,
}

/// Outcome of a conversion-level aggregation.
///
/// `Unsupported` is a defined "not computed" result, distinct from an empty
/// row set: the segment references fields the conversion log does not carry,
/// so running the query would silently drop the segment filter and produce
/// wrong numbers. Callers must not persist a zero breakdown in its place.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionQuery {
    Unsupported,
    Rows(Vec<ConversionRow>),
}

/// Aggregate goal conversions grouped by goal id plus a dimension.
///
/// The segment is validated against the conversion allow-list first; an
/// out-of-list field short-circuits to [`ConversionQuery::Unsupported`]
/// without touching the database.
pub fn query_conversions_by_dimension(
    conn: &Connection,
    site_id: &str,
    window: DayWindow,
    segment: &Segment,
    dimension: Dimension,
    extra: Option<&SqlFilter>,
) -> Result<ConversionQuery> {
    if !segment.is_available_for_conversions() {
        return Ok(ConversionQuery::Unsupported);
    }

    let mut builder = WhereBuilder::new();
    builder.push(
        "server_time >= CAST(? AS TIMESTAMP)",
        [window.start_datetime()],
    );
    builder.push(
        "server_time <= CAST(? AS TIMESTAMP)",
        [window.end_datetime()],
    );
    builder.push("site_id = ?", [site_id.to_string()]);
    builder.push_filter(extra);
    builder.push_segment(segment);

    let label_select: String = dimension
        .columns()
        .iter()
        .map(|col| format!("COALESCE(CAST({col} AS VARCHAR), '')"))
        .collect::<Vec<_>>()
        .join(", ");
    let label_width = dimension.columns().len();
    // goal_id is position 1, the label columns follow
    let group_by = (1..=label_width + 1)
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "SELECT goal_id, {label_select}, {GOAL_METRIC_SELECT} FROM log_conversion {} GROUP BY {group_by}",
        builder.clause(),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(duckdb::params_from_iter(builder.binds()), |row| {
            let goal_id: u32 = row.get(0)?;
            let mut parts = Vec::with_capacity(label_width);
            for i in 0..label_width {
                parts.push(row.get::<_, String>(1 + i)?);
            }
            Ok(ConversionRow {
                goal_id,
                label: Label::from_parts(parts),
                metrics: GoalMetrics {
                    conversions: row.get(1 + label_width)?,
                    revenue: row.get(2 + label_width)?,
                    visits_converted: row.get(3 + label_width)?,
                },
            })
        })?
        .collect::<duckdb::Result<Vec<_>>>()?;

    Ok(ConversionQuery::Rows(rows))
}
