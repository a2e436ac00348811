use std::time::Duration;

/// Process configuration, read from the environment (`.env` friendly).
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub cache_refresh: Duration,
    pub integrity_check: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("BBM_DATABASE_URL").unwrap_or_else(|_| "sqlite:bbm_database.sqlite".to_string());

        let cache_refresh = match std::env::var("BBM_CACHE_REFRESH_SECS") {
            Ok(v) => Duration::from_secs(v.parse()?),
            Err(_) => Duration::from_secs(60),
        };

        let integrity_check = match std::env::var("BBM_INTEGRITY_CHECK_SECS") {
            Ok(v) => Duration::from_secs(v.parse()?),
            Err(_) => Duration::from_secs(60 * 60),
        };

        Ok(Config {
            database_url,
            cache_refresh,
            integrity_check,
        })
    }
}
