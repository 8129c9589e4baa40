/// Crate-wide error type.
///
/// Database failures propagate as-is: archived metrics must be exact per
/// day, so a failed query never degrades into a zero or partial row.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    /// A legacy string-keyed metrics row was missing a required column.
    /// Treating the missing value as zero would corrupt running totals
    /// undetectably, so normalization rejects the row instead.
    #[error("missing metric column `{0}` in named row")]
    MissingMetric(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
