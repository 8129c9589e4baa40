use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Archiver configuration loaded from environment variables or TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the DuckDB database file. If not set, an in-memory database
    /// is used (useful for tests and one-off archive runs).
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Visit-summary cache TTL in seconds (default: 60). 0 = no caching.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

const fn default_cache_ttl_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Environment variables override file values:
    /// - `TEAL_DB_PATH` → db_path
    /// - `TEAL_CACHE_TTL` → cache_ttl_secs
    pub fn load(config_path: Option<&Path>) -> Self {
        let mut config =
            config_path.map_or_else(Self::default, |path| match std::fs::read_to_string(path) {
                Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse config file: {e}, using defaults");
                    Self::default()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read config file: {e}, using defaults");
                    Self::default()
                }
            });

        // Environment variable overrides
        if let Ok(db_path) = std::env::var("TEAL_DB_PATH") {
            config.db_path = Some(PathBuf::from(db_path));
        }
        if let Ok(ttl) = std::env::var("TEAL_CACHE_TTL") {
            if let Ok(t) = ttl.parse() {
                config.cache_ttl_secs = t;
            }
        }

        config
    }

    /// Open the configured database: file-backed if `db_path` is set,
    /// in-memory otherwise.
    pub fn open_database(&self) -> Result<duckdb::Connection, duckdb::Error> {
        match &self.db_path {
            Some(path) => duckdb::Connection::open(path),
            None => duckdb::Connection::open_in_memory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Mutex to serialize tests that call `Config::load`, which reads
    /// environment variables. Without this, `test_env_var_overrides` can
    /// pollute other tests running in parallel.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.db_path.is_none());
        assert_eq!(config.cache_ttl_secs, 60);
    }

    #[test]
    fn test_load_from_toml() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"
db_path = "/var/teal/archive.duckdb"
cache_ttl_secs = 300
"#
        )
        .unwrap();

        let config = Config::load(Some(&config_path));
        assert_eq!(
            config.db_path,
            Some(PathBuf::from("/var/teal/archive.duckdb"))
        );
        assert_eq!(config.cache_ttl_secs, 300);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let config = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert_eq!(config.cache_ttl_secs, 60);
    }

    #[test]
    fn test_invalid_toml_uses_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "this is not valid toml {{{").unwrap();

        let config = Config::load(Some(&config_path));
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_env_var_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();

        let orig = std::env::var("TEAL_CACHE_TTL").ok();

        std::env::set_var("TEAL_CACHE_TTL", "15");
        let config = Config::load(None);
        assert_eq!(config.cache_ttl_secs, 15);

        match orig {
            Some(v) => std::env::set_var("TEAL_CACHE_TTL", v),
            None => std::env::remove_var("TEAL_CACHE_TTL"),
        }
    }

    #[test]
    fn test_open_in_memory_database() {
        let config = Config::default();
        let conn = config.open_database().unwrap();
        let count: i64 = conn
            .prepare("SELECT 1")
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
