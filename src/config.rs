//! Dispatch configuration.
//!
//! Everything the engine needs is carried by an explicit [`DispatchConfig`] value. The
//! environment is only consulted by [`DispatchConfig::from_env`], which is meant to be called
//! once at the program edge.

use crate::{Error, ErrorContext, Result};
use std::env;
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;
pub const DEFAULT_CHUNK_SIZE: usize = 100;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8080";

/// Timeout profile applied to every remote batch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Bound on getting the request out: connection setup plus writing the body.
    pub total: Duration,
    /// Bound on establishing the connection.
    pub connect: Duration,
    /// Bound on waiting for the response once the request is written, applied to the
    /// response head and again to the body. Covers the worker's processing time.
    pub read: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            total: Duration::from_secs(60),
            connect: Duration::from_secs(20),
            read: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub max_concurrency: usize,
    pub chunk_size: usize,
    /// Total attempts per batch, first one included.
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub service_url: String,
    pub timeouts: TimeoutConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            service_url: DEFAULT_SERVICE_URL.to_string(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by environment variables.
    ///
    /// - `MAX_CONCURRENCY`, `CHUNK_SIZE`
    /// - `RETRY_ATTEMPTS`, `RETRY_DELAY_MS`
    /// - `SERVICE_URL`
    /// - `HTTP_TIMEOUT_SECS`, `HTTP_CONNECT_TIMEOUT_SECS`, `HTTP_READ_TIMEOUT_SECS`
    ///
    /// Values that fail to parse are ignored. The result is validated.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let timeouts = TimeoutConfig {
            total: env_parse::<u64>("HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeouts.total),
            connect: env_parse::<u64>("HTTP_CONNECT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeouts.connect),
            read: env_parse::<u64>("HTTP_READ_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeouts.read),
        };
        let config = Self {
            max_concurrency: env_parse("MAX_CONCURRENCY").unwrap_or(defaults.max_concurrency),
            chunk_size: env_parse("CHUNK_SIZE").unwrap_or(defaults.chunk_size),
            retry_attempts: env_parse("RETRY_ATTEMPTS").unwrap_or(defaults.retry_attempts),
            retry_delay: env_parse::<u64>("RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            service_url: env::var("SERVICE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.service_url),
            timeouts,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n;
        self
    }

    pub fn with_retry_attempts(mut self, n: u32) -> Self {
        self.retry_attempts = n;
        self
    }

    pub fn with_retry_delay(mut self, d: Duration) -> Self {
        self.retry_delay = d;
        self
    }

    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(invalid("config.max_concurrency", "must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(invalid("config.chunk_size", "must be at least 1"));
        }
        if self.retry_attempts == 0 {
            return Err(invalid("config.retry_attempts", "must be at least 1"));
        }
        let url = url::Url::parse(&self.service_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid service URL: {}", e),
                ErrorContext::new()
                    .with_field_path("config.service_url")
                    .with_details(self.service_url.clone())
                    .with_source("config"),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(
                "config.service_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, msg: impl Into<String>) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new().with_field_path(field).with_source("config"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.chunk_size, 100);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.service_url, "http://localhost:8080");
        assert_eq!(config.timeouts.total, Duration::from_secs(60));
        assert_eq!(config.timeouts.connect, Duration::from_secs(20));
        assert_eq!(config.timeouts.read, Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = DispatchConfig::new()
            .with_max_concurrency(2)
            .with_chunk_size(5)
            .with_retry_attempts(1)
            .with_retry_delay(Duration::ZERO)
            .with_service_url("https://worker.internal:9000");
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.chunk_size, 5);
        assert_eq!(config.retry_attempts, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        let err = DispatchConfig::new().with_chunk_size(0).validate().unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("config.chunk_size")
        );
        assert!(DispatchConfig::new()
            .with_max_concurrency(0)
            .validate()
            .is_err());
        assert!(DispatchConfig::new()
            .with_retry_attempts(0)
            .validate()
            .is_err());
    }

    // The only test in this crate that touches these variables.
    #[test]
    fn test_from_env_overrides_and_ignores_garbage() {
        env::set_var("CHUNK_SIZE", "7");
        env::set_var("MAX_CONCURRENCY", "lots");
        env::set_var("RETRY_DELAY_MS", "250");
        let config = DispatchConfig::from_env();
        env::remove_var("CHUNK_SIZE");
        env::remove_var("MAX_CONCURRENCY");
        env::remove_var("RETRY_DELAY_MS");

        let config = config.unwrap();
        assert_eq!(config.chunk_size, 7);
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert!(DispatchConfig::new()
            .with_service_url("not a url")
            .validate()
            .is_err());
        assert!(DispatchConfig::new()
            .with_service_url("ftp://host/")
            .validate()
            .is_err());
    }
}
