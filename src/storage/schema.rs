use duckdb::Connection;

/// SQL statement to create the visit log table. One row per visit; the
/// per-visit totals are maintained by the tracker, dimension columns are
/// denormalized at collection time.
pub const CREATE_LOG_VISIT_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS log_visit (
    site_id                  VARCHAR NOT NULL,
    visitor_id               VARCHAR NOT NULL,
    visit_last_action_time   TIMESTAMP NOT NULL,
    visit_total_actions      INTEGER NOT NULL DEFAULT 0,
    visit_total_time         INTEGER NOT NULL DEFAULT 0,
    visit_goal_converted     BOOLEAN NOT NULL DEFAULT FALSE,
    visitor_returning        BOOLEAN,
    visitor_days_since_first INTEGER,
    visitor_count_visits     INTEGER,
    config_browser           VARCHAR,
    config_os                VARCHAR,
    referer_type             VARCHAR,
    referer_name             VARCHAR,
    referer_keyword          VARCHAR,
    location_country         VARCHAR(3),
    location_continent       VARCHAR(3),
    custom_var_k1            VARCHAR,
    custom_var_v1            VARCHAR,
    custom_var_k2            VARCHAR,
    custom_var_v2            VARCHAR,
    custom_var_k3            VARCHAR,
    custom_var_v3            VARCHAR,
    custom_var_k4            VARCHAR,
    custom_var_v4            VARCHAR,
    custom_var_k5            VARCHAR,
    custom_var_v5            VARCHAR
)
";

/// SQL statement to create the conversion log table. One row per goal
/// conversion, with the visit's dimension columns denormalized so segmented
/// breakdowns can run without joining back to log_visit.
pub const CREATE_LOG_CONVERSION_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS log_conversion (
    site_id                  VARCHAR NOT NULL,
    visit_id                 VARCHAR NOT NULL,
    visitor_id               VARCHAR NOT NULL,
    goal_id                  INTEGER NOT NULL,
    server_time              TIMESTAMP NOT NULL,
    revenue                  DECIMAL(12,2) NOT NULL DEFAULT 0,
    visitor_returning        BOOLEAN,
    visitor_days_since_first INTEGER,
    visitor_count_visits     INTEGER,
    config_browser           VARCHAR,
    config_os                VARCHAR,
    referer_type             VARCHAR,
    referer_name             VARCHAR,
    referer_keyword          VARCHAR,
    location_country         VARCHAR(3),
    location_continent       VARCHAR(3),
    custom_var_k1            VARCHAR,
    custom_var_v1            VARCHAR,
    custom_var_k2            VARCHAR,
    custom_var_v2            VARCHAR,
    custom_var_k3            VARCHAR,
    custom_var_v3            VARCHAR,
    custom_var_k4            VARCHAR,
    custom_var_v4            VARCHAR,
    custom_var_k5            VARCHAR,
    custom_var_v5            VARCHAR
)
";

/// Named scalar metrics, one row per (site, day, segment, name).
pub const CREATE_ARCHIVE_NUMERIC_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS archive_numeric (
    site_id      VARCHAR NOT NULL,
    date         DATE NOT NULL,
    segment_hash VARCHAR NOT NULL,
    name         VARCHAR NOT NULL,
    value        DOUBLE NOT NULL,
    archived_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
";

/// Serialized hierarchical tables, one row per (site, day, segment, name).
pub const CREATE_ARCHIVE_BLOB_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS archive_blob (
    site_id      VARCHAR NOT NULL,
    date         DATE NOT NULL,
    segment_hash VARCHAR NOT NULL,
    name         VARCHAR NOT NULL,
    value        VARCHAR NOT NULL,
    archived_at  TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
";

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.execute_batch(CREATE_LOG_VISIT_TABLE)?;
    conn.execute_batch(CREATE_LOG_CONVERSION_TABLE)?;
    conn.execute_batch(CREATE_ARCHIVE_NUMERIC_TABLE)?;
    conn.execute_batch(CREATE_ARCHIVE_BLOB_TABLE)?;
    Ok(())
}
