//! Application configuration parsed from environment variables, following
//! `modules/gl/src/config.rs`'s `Config::from_env()` shape and extended with
//! the worker/bus/budget tunables this crate needs.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bus_url: String,
    pub host: String,
    pub port: u16,
    pub max_retries: u32,
    pub idem_ttl_seconds: i64,
    pub block_ms: usize,
    pub count: usize,
    pub backoff_base_seconds: f64,
    pub backoff_jitter_max: f64,
    pub max_dollars: f64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let bus_url = env::var("BUS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8090".to_string())
            .parse()
            .map_err(|_| "PORT must be a valid u16".to_string())?;

        let max_retries = env_parse_or("MAX_RETRIES", event_bus::MAX_RETRIES)?;
        let idem_ttl_seconds = env_parse_or("IDEM_TTL_SECONDS", event_bus::IDEM_TTL_SECONDS)?;
        let block_ms = env_parse_or("BLOCK_MS", event_bus::BLOCK_MS)?;
        let count = env_parse_or("COUNT", event_bus::COUNT)?;
        let backoff_base_seconds = env_parse_or("BASE_SECONDS", event_bus::BACKOFF_BASE_SECONDS)?;
        let backoff_jitter_max = env_parse_or("JITTER_MAX", event_bus::BACKOFF_JITTER_MAX)?;
        let max_dollars = env_parse_or("MAX_DOLLARS", 5.0)?;

        let db_max_connections = env_parse_or("DB_MAX_CONNECTIONS", 10)?;
        let db_min_connections = env_parse_or("DB_MIN_CONNECTIONS", 0)?;
        let db_acquire_timeout_secs = env_parse_or("DB_ACQUIRE_TIMEOUT_SECS", 3)?;

        Ok(Config {
            database_url,
            bus_url,
            host,
            port,
            max_retries,
            idem_ttl_seconds,
            block_ms,
            count,
            backoff_base_seconds,
            backoff_jitter_max,
            max_dollars,
            db_max_connections,
            db_min_connections,
            db_acquire_timeout_secs,
        })
    }
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| format!("{key} is not a valid value")),
        Err(_) => Ok(default),
    }
}
