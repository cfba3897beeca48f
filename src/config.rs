//! Process configuration from the environment.
//!
//! The service is configured entirely through environment variables
//! (optionally loaded from a `.env` file by the binary):
//! - `DB_URL` — Postgres connection URL, required
//! - `DB_SCHEMA` — schema holding the four tables, default `npg_porch`
//! - `PORCH_LISTEN_ADDR` — gateway bind address, default `127.0.0.1:8081`
//! - `PORCH_LOGS_DIR` — when set, `serve` also writes rotated JSON logs

use std::net::SocketAddr;
use std::path::PathBuf;

/// Default schema name when `DB_SCHEMA` is unset.
const DEFAULT_DB_SCHEMA: &str = "npg_porch";

/// Default gateway bind address when `PORCH_LISTEN_ADDR` is unset.
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8081";

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection URL.
    pub db_url: String,
    /// Schema the tables live in; doubles as the connection search path.
    pub db_schema: String,
    /// Address the HTTP gateway binds to.
    pub listen_addr: SocketAddr,
    /// Directory for rotated JSON log files, if file logging is wanted.
    pub logs_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `DB_URL` is missing or empty, or if
    /// `PORCH_LISTEN_ADDR` is not a valid socket address.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(
            std::env::var("DB_URL").ok(),
            std::env::var("DB_SCHEMA").ok(),
            std::env::var("PORCH_LISTEN_ADDR").ok(),
            std::env::var("PORCH_LOGS_DIR").ok(),
        )
    }

    /// Build configuration from already-read variable values.
    ///
    /// # Errors
    ///
    /// Same contract as [`Config::from_env`].
    pub fn from_vars(
        db_url: Option<String>,
        db_schema: Option<String>,
        listen_addr: Option<String>,
        logs_dir: Option<String>,
    ) -> anyhow::Result<Self> {
        let db_url = match db_url {
            Some(url) if !url.is_empty() => url,
            _ => anyhow::bail!("DB_URL must be set to a database URL"),
        };

        let db_schema = match db_schema {
            Some(schema) if !schema.is_empty() => schema,
            _ => DEFAULT_DB_SCHEMA.to_owned(),
        };

        let listen_addr = listen_addr
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PORCH_LISTEN_ADDR: {e}"))?;

        Ok(Self {
            db_url,
            db_schema,
            listen_addr,
            logs_dir: logs_dir.filter(|d| !d.is_empty()).map(PathBuf::from),
        })
    }
}
