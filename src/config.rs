use std::env;

use chrono::Duration;

const DEFAULT_PREVIEW_TTL_SECS: i64 = 15 * 60;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub preview_ttl_secs: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let preview_ttl_secs = env::var("PREVIEW_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_PREVIEW_TTL_SECS);
        Ok(Self {
            port,
            database_url,
            host,
            preview_ttl_secs,
        })
    }

    pub fn preview_ttl(&self) -> Duration {
        Duration::seconds(self.preview_ttl_secs)
    }
}
