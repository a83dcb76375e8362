//! Server configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `8080` |
//! | `STORAGE_BACKEND` | `postgres` (or `memory`) |
//! | `DATABASE_URL` | `postgres://localhost/notekeep` |
//! | `DB_MAX_CONNECTIONS` | `10` |
//! | `FILE_STORAGE_PATH` | `./uploads` |
//! | `API_BASE_PATH` | `/api/notes` |
//! | `ALLOWED_ORIGINS` | `*` |
//! | `RATE_LIMIT_ENABLED` | `false` |
//! | `RATE_LIMIT_REQUESTS` | `100` |
//! | `RATE_LIMIT_PERIOD_SECS` | `60` |
//! | `REQUEST_TIMEOUT_SECS` | `60` |
//! | `LOG_FORMAT` | `text` (or `json`) |
//! | `LOG_FILE` | unset (stdout only) |
//! | `LOG_ANSI` | auto |

use std::str::FromStr;

use notekeep_core::defaults;
use notekeep_core::{Error, Result};
use notekeep_db::pool::DEFAULT_MAX_CONNECTIONS;

/// Where notes and attachments are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    /// PostgreSQL metadata with filesystem blobs.
    Postgres,
    /// Process memory; everything is lost on restart.
    Memory,
}

impl StorageBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackendKind::Postgres => "postgres",
            StorageBackendKind::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackendKind::Postgres),
            "memory" | "in-memory" => Ok(StorageBackendKind::Memory),
            other => Err(Error::Config(format!(
                "STORAGE_BACKEND must be 'postgres' or 'memory', got '{}'",
                other
            ))),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Daily-rotated log file. Replaces stdout output when set.
    pub file: Option<String>,
    /// Force ANSI colors on or off.
    pub ansi: Option<bool>,
}

/// Everything the server reads at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub storage_backend: StorageBackendKind,
    pub database_url: String,
    pub db_max_connections: u32,
    pub file_storage_path: String,
    /// Public prefix used in `attachmentUrl`.
    pub api_base_path: String,
    /// Allowed CORS origins; `*` allows any.
    pub allowed_origins: Vec<String>,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_period_secs: u64,
    pub request_timeout_secs: u64,
    pub log: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::SERVER_HOST.to_string(),
            port: defaults::SERVER_PORT,
            storage_backend: StorageBackendKind::Postgres,
            database_url: defaults::DATABASE_URL.to_string(),
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            file_storage_path: defaults::FILE_STORAGE_PATH.to_string(),
            api_base_path: defaults::API_BASE_PATH.to_string(),
            allowed_origins: vec!["*".to_string()],
            rate_limit_enabled: false,
            rate_limit_requests: defaults::RATE_LIMIT_REQUESTS as u32,
            rate_limit_period_secs: defaults::RATE_LIMIT_PERIOD_SECS,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            log: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns the raw value of a
    /// variable if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            host: get("HOST").unwrap_or(base.host),
            port: parse_or(&get, "PORT", base.port)?,
            storage_backend: match get("STORAGE_BACKEND") {
                Some(v) => v.parse()?,
                None => base.storage_backend,
            },
            database_url: get("DATABASE_URL").unwrap_or(base.database_url),
            db_max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", base.db_max_connections)?,
            file_storage_path: get("FILE_STORAGE_PATH").unwrap_or(base.file_storage_path),
            api_base_path: get("API_BASE_PATH")
                .map(|p| normalize_base_path(&p))
                .unwrap_or(base.api_base_path),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or(base.allowed_origins),
            rate_limit_enabled: match get("RATE_LIMIT_ENABLED") {
                Some(v) => parse_bool("RATE_LIMIT_ENABLED", &v)?,
                None => base.rate_limit_enabled,
            },
            rate_limit_requests: parse_or(&get, "RATE_LIMIT_REQUESTS", base.rate_limit_requests)?,
            rate_limit_period_secs: parse_or(
                &get,
                "RATE_LIMIT_PERIOD_SECS",
                base.rate_limit_period_secs,
            )?,
            request_timeout_secs: parse_or(&get, "REQUEST_TIMEOUT_SECS", base.request_timeout_secs)?,
            log: LogConfig {
                json: get("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
                file: get("LOG_FILE"),
                ansi: get("LOG_ANSI").map(|v| v == "true" || v == "1"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.db_max_connections == 0 {
            return Err(Error::Config("DB_MAX_CONNECTIONS must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("REQUEST_TIMEOUT_SECS must be at least 1".into()));
        }
        if self.rate_limit_enabled && (self.rate_limit_requests == 0 || self.rate_limit_period_secs == 0)
        {
            return Err(Error::Config(
                "RATE_LIMIT_REQUESTS and RATE_LIMIT_PERIOD_SECS must be non-zero".into(),
            ));
        }
        if self.allowed_origins.is_empty() {
            return Err(Error::Config("ALLOWED_ORIGINS lists no origins".into()));
        }
        Ok(())
    }

    /// True when any origin may call the API.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{}='{}' is invalid: {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{}='{}' is not a boolean", key, raw))),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `api/notes/` -> `/api/notes`
fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
