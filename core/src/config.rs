//! # Election Configuration
//!
//! Every tunable in Ballot lives here and is sourced from the environment
//! exactly once, at process start. The resulting [`ElectionConfig`] is
//! immutable for the lifetime of the process — changing fraud thresholds
//! under a live election is how you end up explaining yourself to a very
//! unhappy residents' committee.
//!
//! Unparseable values fall back to their documented defaults with a warning
//! rather than aborting startup; a typo in an env var should not take the
//! election offline.

use std::fmt::Display;
use std::str::FromStr;

/// Immutable process-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionConfig {
    /// Length of the attempt window in milliseconds. Shared by the
    /// transport-layer rate limiter and the fraud tracker so the two views
    /// of "recent activity" never drift apart.
    pub rate_limit_window_ms: i64,

    /// Maximum requests per origin per window at the transport layer.
    /// Requests beyond this are refused before any validation runs.
    pub rate_limit_max: u32,

    /// Failed vote attempts within one window before an origin is blocked.
    pub fraud_threshold: u32,

    /// How long a blocked origin stays blocked, in minutes.
    pub fraud_block_minutes: i64,

    /// Port for the public REST API.
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    pub metrics_port: u16,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            rate_limit_window_ms: 60_000,
            rate_limit_max: 10,
            fraud_threshold: 5,
            fraud_block_minutes: 15,
            port: 4000,
            metrics_port: 4001,
        }
    }
}

impl ElectionConfig {
    /// Reads configuration from `BALLOT_*` environment variables, falling
    /// back to defaults for anything absent or malformed.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rate_limit_window_ms: env_or(
                "BALLOT_RATE_LIMIT_WINDOW_MS",
                defaults.rate_limit_window_ms,
            ),
            rate_limit_max: env_or("BALLOT_RATE_LIMIT_MAX", defaults.rate_limit_max),
            fraud_threshold: env_or("BALLOT_FRAUD_THRESHOLD", defaults.fraud_threshold),
            fraud_block_minutes: env_or("BALLOT_FRAUD_BLOCK_MINUTES", defaults.fraud_block_minutes),
            port: env_or("BALLOT_PORT", defaults.port),
            metrics_port: env_or("BALLOT_METRICS_PORT", defaults.metrics_port),
        }
    }

    /// Block duration converted to milliseconds, matching the unit the
    /// fraud tracker does its arithmetic in.
    pub fn fraud_block_ms(&self) -> i64 {
        self.fraud_block_minutes * 60_000
    }
}

/// Reads and parses a single environment variable, logging and falling back
/// to `default` when the variable is unset or fails to parse.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match std::env::var(name) {
        Ok(raw) => parse_or(name, &raw, default),
        Err(_) => default,
    }
}

/// Parse helper split out from [`env_or`] so the fallback behaviour is
/// testable without touching process-global environment state.
fn parse_or<T>(name: &str, raw: &str, default: T) -> T
where
    T: FromStr + Display,
{
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(
                var = name,
                raw,
                default = %default,
                "unparseable configuration value, using default"
            );
            default
        }
    }
}
