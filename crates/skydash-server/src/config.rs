// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;

/// Skydash server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Redis connection URL for the rank index and caches
    pub redis_url: String,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// HMAC secret for verifying identity-provider session tokens
    pub jwt_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `SKYDASH_DATABASE_URL`: PostgreSQL connection string
    /// - `SKYDASH_JWT_SECRET`: HS256 secret shared with the identity provider
    ///
    /// Optional (with defaults):
    /// - `SKYDASH_REDIS_URL`: Redis connection string (default: `redis://127.0.0.1:6379`)
    /// - `SKYDASH_HTTP_PORT`: HTTP listen port (default: 8080)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("SKYDASH_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("SKYDASH_DATABASE_URL"))?;

        let jwt_secret = std::env::var("SKYDASH_JWT_SECRET")
            .map_err(|_| ConfigError::Missing("SKYDASH_JWT_SECRET"))?;

        let redis_url = std::env::var("SKYDASH_REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let http_port: u16 = std::env::var("SKYDASH_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("SKYDASH_HTTP_PORT", "must be a valid port number")
            })?;

        Ok(Self {
            database_url,
            redis_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            jwt_secret,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("SKYDASH_DATABASE_URL", "postgres://localhost/skydash");
        guard.set("SKYDASH_JWT_SECRET", "test-secret");
        guard.remove("SKYDASH_REDIS_URL");
        guard.remove("SKYDASH_HTTP_PORT");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "postgres://localhost/skydash");
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.jwt_secret, "test-secret");
    }

    #[test]
    fn test_config_from_env_all_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("SKYDASH_DATABASE_URL", "postgres://user:pass@db:5432/prod");
        guard.set("SKYDASH_JWT_SECRET", "prod-secret");
        guard.set("SKYDASH_REDIS_URL", "redis://cache:6380");
        guard.set("SKYDASH_HTTP_PORT", "9000");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "postgres://user:pass@db:5432/prod");
        assert_eq!(config.redis_url, "redis://cache:6380");
        assert_eq!(config.http_addr.port(), 9000);
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.remove("SKYDASH_DATABASE_URL");
        guard.set("SKYDASH_JWT_SECRET", "test-secret");

        let result = Config::from_env();
        assert!(result.is_err());

        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SKYDASH_DATABASE_URL")));
        assert!(err.to_string().contains("SKYDASH_DATABASE_URL"));
    }

    #[test]
    fn test_config_missing_jwt_secret() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("SKYDASH_DATABASE_URL", "postgres://localhost/skydash");
        guard.remove("SKYDASH_JWT_SECRET");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Missing("SKYDASH_JWT_SECRET")
        ));
    }

    #[test]
    fn test_config_invalid_http_port() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("SKYDASH_DATABASE_URL", "postgres://localhost/skydash");
        guard.set("SKYDASH_JWT_SECRET", "test-secret");
        guard.set("SKYDASH_HTTP_PORT", "not_a_number");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Invalid("SKYDASH_HTTP_PORT", _)
        ));
    }

    #[test]
    fn test_config_http_port_out_of_range() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("SKYDASH_DATABASE_URL", "postgres://localhost/skydash");
        guard.set("SKYDASH_JWT_SECRET", "test-secret");
        guard.set("SKYDASH_HTTP_PORT", "99999"); // > 65535

        let result = Config::from_env();
        assert!(result.is_err());
    }
}
