use std::{net::SocketAddr, str::FromStr, time::Duration};

use tradelog_core::constants::DEFAULT_COMMIT_BATCH_SIZE;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub import_batch_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let listen_addr = env_or("TL_LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)));
        let db_path = std::env::var("TL_DB_PATH").unwrap_or_else(|_| "./db/tradelog.db".into());
        let cors_allow = std::env::var("TL_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = env_or("TL_REQUEST_TIMEOUT_MS", 30000);
        let import_batch_size = env_or("TL_IMPORT_BATCH_SIZE", DEFAULT_COMMIT_BATCH_SIZE).max(1);
        Self {
            listen_addr,
            db_path,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            import_batch_size,
        }
    }
}

/// Reads and parses `key`, keeping `default` when unset or invalid.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {}='{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
