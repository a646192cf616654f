//! Server configuration parsed from environment variables.
//!
//! Every key is optional. `.env` files are loaded by `main` through
//! `dotenvy` before this runs.
//!
//! | key                  | default          |
//! |----------------------|------------------|
//! | `PORT`               | `3000`           |
//! | `DATABASE_URL`       | unset: memory    |
//! | `DB_MAX_CONNECTIONS` | `5`              |
//! | `SESSION_TTL_HOURS`  | `168`            |
//! | `COOKIE_SECURE`      | `false`          |
//! | `MAX_IMAGE_BYTES`    | `5242880`        |
//! | `BLOB_BACKEND`       | `local`          |
//! | `UPLOAD_DIR`         | `./uploads`      |
//! | `PUBLIC_BASE_URL`    | empty (relative) |
//! | `BLOB_BASE_URL`      | required if http |
//! | `BLOB_API_KEY`       | required if http |
//! | `BLOB_BUCKET`        | `report_images`  |

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";
pub const DEFAULT_BLOB_BUCKET: &str = "report_images";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("missing required variable {0}")]
    Missing(&'static str),
}

/// Where uploaded report images go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobConfig {
    /// Files under `upload_dir`, served by this process at `/uploads`.
    Local { upload_dir: PathBuf, public_base_url: String },
    /// Object-storage REST API.
    Http { base_url: String, api_key: String, bucket: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub session_ttl: time::Duration,
    pub cookie_secure: bool,
    pub max_image_bytes: usize,
    pub blob: BlobConfig,
}

impl AppConfig {
    /// Build config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a value does not parse or the http blob
    /// backend is selected without its credentials.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (tests pass a map).
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let port = parse_or(get("PORT"), "PORT", DEFAULT_PORT)?;
        let db_max_connections = parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;
        let ttl_hours = parse_or(get("SESSION_TTL_HOURS"), "SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid { key: "SESSION_TTL_HOURS", value: ttl_hours.to_string() });
        }
        let cookie_secure = match get("COOKIE_SECURE") {
            None => false,
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { key: "COOKIE_SECURE", value: raw })?,
        };
        let max_image_bytes = parse_or(get("MAX_IMAGE_BYTES"), "MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES)?;

        let blob = match get("BLOB_BACKEND").as_deref().unwrap_or("local") {
            "local" => BlobConfig::Local {
                upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_owned())),
                public_base_url: get("PUBLIC_BASE_URL")
                    .unwrap_or_default()
                    .trim_end_matches('/')
                    .to_owned(),
            },
            "http" => BlobConfig::Http {
                base_url: get("BLOB_BASE_URL")
                    .ok_or(ConfigError::Missing("BLOB_BASE_URL"))?
                    .trim_end_matches('/')
                    .to_owned(),
                api_key: get("BLOB_API_KEY").ok_or(ConfigError::Missing("BLOB_API_KEY"))?,
                bucket: get("BLOB_BUCKET").unwrap_or_else(|| DEFAULT_BLOB_BUCKET.to_owned()),
            },
            other => return Err(ConfigError::Invalid { key: "BLOB_BACKEND", value: other.to_owned() }),
        };

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            session_ttl: time::Duration::hours(ttl_hours),
            cookie_secure,
            max_image_bytes,
            blob,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|_| ConfigError::Invalid { key, value }),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
