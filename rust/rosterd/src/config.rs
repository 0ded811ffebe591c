//! Process configuration, read from the environment (optionally seeded by a
//! `.env` file). The database location is the only required setting.

use std::path::PathBuf;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use crate::error::ConfigError;

pub const DATABASE_URL: &str = "DATABASE_URL";

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    File(PathBuf),
    Memory,
}

impl DatabaseTarget {
    /// Accepts a bare path, `sqlite://<path>`, `sqlite::memory:` or `:memory:`.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingField {
                field: DATABASE_URL,
            });
        }
        if url == ":memory:" || url == "sqlite::memory:" || url == "sqlite://:memory:" {
            return Ok(DatabaseTarget::Memory);
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        if path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: DATABASE_URL,
                reason: "database path is empty".into(),
            });
        }
        if url.contains("://") && !url.starts_with("sqlite://") {
            return Err(ConfigError::InvalidValue {
                field: DATABASE_URL,
                reason: format!("unsupported scheme in {url:?}; only sqlite is available"),
            });
        }
        Ok(DatabaseTarget::File(PathBuf::from(path)))
    }
}

/// Connection pool tuning. None of this changes program behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: u32,
    pub min_idle: Option<u32>,
    pub connection_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
    pub test_on_check_out: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 5,
            min_idle: None,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            test_on_check_out: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Install the global subscriber. Logs go to stderr; stdout is the IPC channel.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
        let res = match self.format.as_str() {
            "json" => builder.json().try_init(),
            _ => builder.try_init(),
        };
        // A subscriber may already be installed (tests); keep that one.
        let _ = res;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: DatabaseTarget,
    pub pool: PoolSettings,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn new(database: DatabaseTarget) -> Self {
        Self {
            database,
            pool: PoolSettings::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(DATABASE_URL).ok_or(ConfigError::MissingField {
            field: DATABASE_URL,
        })?;
        let database = DatabaseTarget::parse(&url)?;

        let defaults = PoolSettings::default();
        let pool = PoolSettings {
            max_size: parse_num(&lookup, "ROSTERD_POOL_MAX_SIZE")?.unwrap_or(defaults.max_size),
            min_idle: parse_num(&lookup, "ROSTERD_POOL_MIN_IDLE")?,
            connection_timeout: parse_num(&lookup, "ROSTERD_POOL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.connection_timeout),
            idle_timeout: parse_num(&lookup, "ROSTERD_POOL_IDLE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .or(defaults.idle_timeout),
            max_lifetime: parse_num(&lookup, "ROSTERD_POOL_MAX_LIFETIME_SECS")?
                .map(Duration::from_secs)
                .or(defaults.max_lifetime),
            test_on_check_out: parse_bool(&lookup, "ROSTERD_POOL_TEST_ON_CHECKOUT")?
                .unwrap_or(defaults.test_on_check_out),
        };
        if pool.max_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ROSTERD_POOL_MAX_SIZE",
                reason: "must be at least 1".into(),
            });
        }
        if pool.min_idle.is_some_and(|n| n > pool.max_size) {
            return Err(ConfigError::InvalidValue {
                field: "ROSTERD_POOL_MIN_IDLE",
                reason: format!("must not exceed the pool size ({})", pool.max_size),
            });
        }

        let log_defaults = LoggingConfig::default();
        let logging = LoggingConfig {
            level: non_blank(lookup("ROSTERD_LOG")).unwrap_or(log_defaults.level),
            format: non_blank(lookup("ROSTERD_LOG_FORMAT")).unwrap_or(log_defaults.format),
        };

        Ok(Self {
            database,
            pool,
            logging,
        })
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_num<F, T>(lookup: &F, field: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = non_blank(lookup(field)) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            field,
            reason: e.to_string(),
        })
}

fn parse_bool<F>(lookup: &F, field: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = non_blank(lookup(field)) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(Some(true)),
        "0" | "false" | "no" | "n" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            field,
            reason: format!("expected a boolean, got {raw:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn missing_database_url_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field: DATABASE_URL }));
    }

    #[test]
    fn blank_database_url_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[(DATABASE_URL, "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn database_url_forms() {
        assert_eq!(
            DatabaseTarget::parse("sqlite:///tmp/roster.db").unwrap(),
            DatabaseTarget::File(PathBuf::from("/tmp/roster.db"))
        );
        assert_eq!(
            DatabaseTarget::parse("data/roster.db").unwrap(),
            DatabaseTarget::File(PathBuf::from("data/roster.db"))
        );
        assert_eq!(
            DatabaseTarget::parse(":memory:").unwrap(),
            DatabaseTarget::Memory
        );
        assert_eq!(
            DatabaseTarget::parse("sqlite::memory:").unwrap(),
            DatabaseTarget::Memory
        );
        assert!(DatabaseTarget::parse("postgres://localhost/roster").is_err());
    }

    #[test]
    fn pool_defaults_and_overrides() {
        let cfg = Config::from_lookup(lookup_from(&[(DATABASE_URL, ":memory:")])).unwrap();
        assert_eq!(cfg.pool, PoolSettings::default());
        assert_eq!(cfg.logging, LoggingConfig::default());

        let cfg = Config::from_lookup(lookup_from(&[
            (DATABASE_URL, ":memory:"),
            ("ROSTERD_POOL_MAX_SIZE", "2"),
            ("ROSTERD_POOL_MAX_LIFETIME_SECS", "60"),
            ("ROSTERD_POOL_TEST_ON_CHECKOUT", "no"),
            ("ROSTERD_LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(cfg.pool.max_size, 2);
        assert_eq!(cfg.pool.max_lifetime, Some(Duration::from_secs(60)));
        assert!(!cfg.pool.test_on_check_out);
        assert_eq!(cfg.logging.format, "json");
    }

    #[test]
    fn bad_pool_values_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            (DATABASE_URL, ":memory:"),
            ("ROSTERD_POOL_MAX_SIZE", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "ROSTERD_POOL_MAX_SIZE",
                ..
            }
        ));

        let err = Config::from_lookup(lookup_from(&[
            (DATABASE_URL, ":memory:"),
            ("ROSTERD_POOL_MAX_SIZE", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = Config::from_lookup(lookup_from(&[
            (DATABASE_URL, ":memory:"),
            ("ROSTERD_POOL_MAX_SIZE", "2"),
            ("ROSTERD_POOL_MIN_IDLE", "3"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "ROSTERD_POOL_MIN_IDLE",
                ..
            }
        ));
    }
}
