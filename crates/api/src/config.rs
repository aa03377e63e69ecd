//! Server configuration, loaded once at startup.

use std::fmt::Display;
use std::str::FromStr;

use syncsphere_core::collaboration::{
    validate_lock_max_age, DEFAULT_LOCK_MAX_AGE_SECS, DEFAULT_LOCK_SWEEP_INTERVAL_SECS,
};

use crate::auth::jwt::JwtConfig;

/// Everything the server reads from the environment.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
///
/// | Env Var                    | Default                 |
/// |----------------------------|-------------------------|
/// | `HOST`                     | `0.0.0.0`               |
/// | `PORT`                     | `3000`                  |
/// | `CORS_ORIGINS`             | `http://localhost:5173` |
/// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
/// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                    |
/// | `LOCK_MAX_AGE_SECS`        | `120`                   |
/// | `LOCK_SWEEP_INTERVAL_SECS` | `60`                    |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins, comma-separated in `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,
    /// Locks older than this are reclaimed by the sweep.
    pub lock_max_age_secs: i64,
    /// How often the stale-lock sweep runs.
    pub lock_sweep_interval_secs: u64,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    ///
    /// Panics on an unparseable value or an out-of-range lock age.
    /// Misconfiguration must fail at startup, not at the first sweep.
    pub fn from_env() -> Self {
        let lock_max_age_secs = env_parse("LOCK_MAX_AGE_SECS", DEFAULT_LOCK_MAX_AGE_SECS);
        validate_lock_max_age(lock_max_age_secs)
            .unwrap_or_else(|e| panic!("Invalid LOCK_MAX_AGE_SECS: {e}"));

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECS", 30),
            lock_max_age_secs,
            lock_sweep_interval_secs: env_parse(
                "LOCK_SWEEP_INTERVAL_SECS",
                DEFAULT_LOCK_SWEEP_INTERVAL_SECS,
            ),
            jwt: JwtConfig::from_env(),
        }
    }
}

/// Read an env var and parse it, falling back to `default` when unset.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} is not a valid value: {e}")),
        Err(_) => default,
    }
}
