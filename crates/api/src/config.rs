//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::{RetryPolicy, SagaSettings};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `json` for JSON lines, anything else for human-readable
/// - `SAGA_STEP_TIMEOUT_MS`: per-attempt step timeout (default: `5000`)
/// - `SAGA_STEP_MAX_ATTEMPTS`: attempts per step, first included (default: `3`)
/// - `SAGA_RETRY_BACKOFF_MS`: initial retry backoff (default: `50`)
/// - `SAGA_COMPENSATION_MAX_ATTEMPTS`: attempts per compensation (default: `3`)
/// - `SAGA_PUBLISH_TIMEOUT_MS`: time an event sink gets per event (default: `1000`)
/// - `SAGA_RETAINED_RUNS`: finished runs kept for lookup (default: `1000`)
///
/// Unparseable numbers fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub step_timeout_ms: u64,
    pub step_max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub compensation_max_attempts: u32,
    pub publish_timeout_ms: u64,
    pub retained_runs: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            step_timeout_ms: number("SAGA_STEP_TIMEOUT_MS").unwrap_or(defaults.step_timeout_ms),
            step_max_attempts: number("SAGA_STEP_MAX_ATTEMPTS")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.step_max_attempts),
            retry_backoff_ms: number("SAGA_RETRY_BACKOFF_MS").unwrap_or(defaults.retry_backoff_ms),
            compensation_max_attempts: number("SAGA_COMPENSATION_MAX_ATTEMPTS")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.compensation_max_attempts),
            publish_timeout_ms: number("SAGA_PUBLISH_TIMEOUT_MS")
                .unwrap_or(defaults.publish_timeout_ms),
            retained_runs: number("SAGA_RETAINED_RUNS")
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.retained_runs),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the engine settings derived from the `SAGA_*` variables.
    pub fn saga_settings(&self) -> SagaSettings {
        let backoff = Duration::from_millis(self.retry_backoff_ms);
        SagaSettings::default()
            .with_step_timeout(Duration::from_millis(self.step_timeout_ms))
            .with_step_retry(RetryPolicy::new(self.step_max_attempts, backoff))
            .with_compensation_retry(RetryPolicy::new(self.compensation_max_attempts, backoff))
            .with_publish_timeout(Duration::from_millis(self.publish_timeout_ms))
            .with_retained_runs(self.retained_runs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            step_timeout_ms: 5000,
            step_max_attempts: 3,
            retry_backoff_ms: 50,
            compensation_max_attempts: 3,
            publish_timeout_ms: 1000,
            retained_runs: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.saga_settings(), SagaSettings::default());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_saga_variables_override_defaults() {
        let config = config_from(&[
            ("SAGA_STEP_TIMEOUT_MS", "1500"),
            ("SAGA_STEP_MAX_ATTEMPTS", "5"),
            ("SAGA_RETRY_BACKOFF_MS", "10"),
            ("SAGA_COMPENSATION_MAX_ATTEMPTS", "2"),
            ("SAGA_PUBLISH_TIMEOUT_MS", "250"),
            ("SAGA_RETAINED_RUNS", "20"),
            ("LOG_FORMAT", "JSON"),
        ]);

        let settings = config.saga_settings();
        assert_eq!(settings.step_timeout, Duration::from_millis(1500));
        assert_eq!(settings.step_retry.max_attempts, 5);
        assert_eq!(settings.step_retry.initial_backoff, Duration::from_millis(10));
        assert_eq!(settings.compensation_retry.max_attempts, 2);
        assert_eq!(settings.publish_timeout, Duration::from_millis(250));
        assert_eq!(settings.retained_runs, 20);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[("PORT", "http"), ("SAGA_STEP_MAX_ATTEMPTS", "-1")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.step_max_attempts, 3);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let config = config_from(&[("SAGA_STEP_MAX_ATTEMPTS", "0")]);
        assert_eq!(config.saga_settings().step_retry.max_attempts, 1);
    }
}
