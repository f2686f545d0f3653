use dotenvy::dotenv;
use std::env;

/// Hard cap on a single thread-history page, matching the store query limit.
pub const THREAD_PAGE_LIMIT: i64 = 200;

#[derive(Debug, Clone)]
pub struct Config {
    /// When unset the service runs on the in-memory record store, which is
    /// only suitable for development and tests.
    pub database_url: Option<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| crate::error::AppError::Config(format!("invalid PORT: {raw}")))?,
            Err(_) => 8080,
        };

        Ok(Self { database_url, port })
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Self {
            database_url: None,
            port: 8080,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_run_on_memory_store() {
        let cfg = Config::test_defaults();
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.port, 8080);
    }
}
