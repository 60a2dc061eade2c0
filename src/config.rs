//! Layered runtime configuration.
//!
//! Sources, later ones win:
//! - built-in defaults (`Config::default`)
//! - `config.toml` in the working directory (optional)
//! - `BUDGET_*` environment variables, e.g. `BUDGET_ADMIN_KEY`
//! - the bare `PORT`, `DATABASE_URL` and `SECRET_KEY` variables

use crate::error::BudgetError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub loglevel: String,
    /// Key material for the encrypted cookies; needs at least 64 bytes.
    pub secret_key: Option<String>,
    /// Shared key for maintenance routes. Those routes reject every request when unset.
    pub admin_key: Option<String>,
    pub insecure_cookie: bool,
    pub session_hours: i64,
    pub request_timeout_secs: u64,
    /// How long a statement waits on a locked database before failing.
    pub db_busy_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            database_url: "sqlite://budget.db".to_string(),
            loglevel: "info".to_string(),
            secret_key: None,
            admin_key: None,
            insecure_cookie: false,
            session_hours: 24 * 7,
            request_timeout_secs: 30,
            db_busy_timeout_ms: 5000,
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("BUDGET_"))
            .merge(Env::raw().only(&["port", "database_url", "secret_key"]))
    }

    pub fn load() -> Result<Self, BudgetError> {
        Self::figment()
            .extract()
            .map_err(|e| BudgetError::Config(Box::new(e)))
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, BudgetError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| {
                BudgetError::validation(
                    "host",
                    format!("invalid listen address {}:{}", self.host, self.port),
                )
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn db_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.db_busy_timeout_ms)
    }
}
