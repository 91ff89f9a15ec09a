//! # Configuration
//!
//! Runtime configuration loaded from environment variables.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `METRICS_PORT` | `8080` | HTTP server port (metrics, probes, webhooks) |
//! | `GITHUB_TOKEN` | unset | fallback credential for archive fetches |
//! | `NOTIFY_CONCURRENCY` | `10` | bound on in-flight pod notifications |
//! | `NOTIFY_DEADLINE_SECS` | `120` | deadline for an entire notification fan-out |

use std::time::Duration;

use tracing::warn;

use crate::constants::{
    DEFAULT_NOTIFY_CONCURRENCY, DEFAULT_NOTIFY_DEADLINE_SECS, DEFAULT_SERVER_PORT,
    GITHUB_TOKEN_ENV,
};

/// Operator runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the HTTP server (metrics, probes, admission endpoints)
    pub server_port: u16,
    /// Fallback credential for archive fetches when the Decofile names no secret
    pub github_token: Option<String>,
    /// Bound on in-flight pod notifications during a fan-out
    pub notify_concurrency: usize,
    /// Deadline covering an entire notification fan-out
    pub notify_deadline: Duration,
}

impl Config {
    /// Load configuration from the environment, falling back to defaults
    /// with a warning on unparseable values.
    pub fn from_env() -> Self {
        Self {
            server_port: parse_env("METRICS_PORT", DEFAULT_SERVER_PORT),
            github_token: std::env::var(GITHUB_TOKEN_ENV)
                .ok()
                .filter(|token| !token.is_empty()),
            notify_concurrency: parse_env("NOTIFY_CONCURRENCY", DEFAULT_NOTIFY_CONCURRENCY),
            notify_deadline: Duration::from_secs(parse_env(
                "NOTIFY_DEADLINE_SECS",
                DEFAULT_NOTIFY_DEADLINE_SECS,
            )),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_SERVER_PORT,
            github_token: None,
            notify_concurrency: DEFAULT_NOTIFY_CONCURRENCY,
            notify_deadline: Duration::from_secs(DEFAULT_NOTIFY_DEADLINE_SECS),
        }
    }
}

fn parse_env<T: std::str::FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Invalid value '{}' for {}, using default {}", raw, name, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.notify_concurrency, 10);
        assert_eq!(config.notify_deadline, Duration::from_secs(120));
        assert!(config.github_token.is_none());
    }

    #[test]
    fn test_parse_env_falls_back_on_garbage() {
        std::env::set_var("DECOFILE_TEST_PORT", "not-a-number");
        let value: u16 = parse_env("DECOFILE_TEST_PORT", 8080);
        assert_eq!(value, 8080);
        std::env::remove_var("DECOFILE_TEST_PORT");
    }

    #[test]
    fn test_parse_env_reads_value() {
        std::env::set_var("DECOFILE_TEST_CONCURRENCY", "30");
        let value: usize = parse_env("DECOFILE_TEST_CONCURRENCY", 10);
        assert_eq!(value, 30);
        std::env::remove_var("DECOFILE_TEST_CONCURRENCY");
    }
}
