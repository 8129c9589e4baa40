use chrono::NaiveDate;
use duckdb::Connection;

use crate::error::Result;

/// Handle for persisting archived records under one (site, day, segment)
/// context. Numeric records hold named scalar metrics; blob records hold
/// serialized tables.
pub struct ArchiveStore<'a> {
    conn: &'a Connection,
    site_id: &'a str,
    date: NaiveDate,
    segment_hash: String,
}

impl<'a> ArchiveStore<'a> {
    pub fn new(
        conn: &'a Connection,
        site_id: &'a str,
        date: NaiveDate,
        segment_hash: String,
    ) -> Self {
        Self {
            conn,
            site_id,
            date,
            segment_hash,
        }
    }

    fn date_str(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Persist one scalar metric under a name for this (site, day, segment).
    pub fn insert_numeric(&self, name: &str, value: f64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO archive_numeric (site_id, date, segment_hash, name, value)
             VALUES (?, CAST(? AS DATE), ?, ?, ?)",
            duckdb::params![self.site_id, self.date_str(), self.segment_hash, name, value],
        )?;
        Ok(())
    }

    /// Fetch a previously archived scalar, or `None` if it was never written.
    pub fn get_numeric(&self, name: &str) -> Result<Option<f64>> {
        let mut stmt = self.conn.prepare(
            "SELECT value FROM archive_numeric
             WHERE site_id = ? AND date = CAST(? AS DATE) AND segment_hash = ? AND name = ?
             ORDER BY archived_at DESC LIMIT 1",
        )?;
        let result = stmt.query_row(
            duckdb::params![self.site_id, self.date_str(), self.segment_hash, name],
            |row| row.get(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Count of numeric records stored for this (site, day, segment).
    pub fn numeric_record_count(&self) -> Result<u64> {
        let mut stmt = self.conn.prepare(
            "SELECT COUNT(*) FROM archive_numeric
             WHERE site_id = ? AND date = CAST(? AS DATE) AND segment_hash = ?",
        )?;
        let count = stmt.query_row(
            duckdb::params![self.site_id, self.date_str(), self.segment_hash],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Persist one serialized table under a name.
    pub fn insert_blob(&self, name: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO archive_blob (site_id, date, segment_hash, name, value)
             VALUES (?, CAST(? AS DATE), ?, ?, ?)",
            duckdb::params![self.site_id, self.date_str(), self.segment_hash, name, value],
        )?;
        Ok(())
    }

    /// Fetch a previously archived serialized table.
    pub fn get_blob(&self, name: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT value FROM archive_blob
             WHERE site_id = ? AND date = CAST(? AS DATE) AND segment_hash = ? AND name = ?
             ORDER BY archived_at DESC LIMIT 1",
        )?;
        let result = stmt.query_row(
            duckdb::params![self.site_id, self.date_str(), self.segment_hash, name],
            |row| row.get(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
