//! Configuration for the queue engine.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Live health-check timeout in seconds, bounding the mode probe.
    pub health_check_timeout_secs: u64,
    /// Creation rate limiting.
    pub rate_limit: RateLimitConfig,
    /// Display-name handling.
    pub names: NameConfig,
    /// Live-to-fallback failover policy.
    pub failover: FailoverPolicy,
}

/// Creation rate limit: bounded count per rolling time window, per client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum creations per window.
    pub max_requests: u32,
    /// Window duration in seconds.
    pub window_secs: u64,
}

/// Display-name handling at the creation boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameConfig {
    /// Maximum stored name length in characters.
    pub max_chars: usize,
    /// Generate a placeholder name when the visitor gives none.
    ///
    /// When `false`, nameless tickets keep an empty display name.
    pub generate_default: bool,
}

/// Bounded retry policy for the demotion path.
///
/// The triggering operation is retried against the fallback store at most
/// this many times (default 1) before the failure surfaces; there is no
/// recursive or unbounded retry anywhere in the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FailoverPolicy {
    /// Maximum retries against the fallback store after a demotion.
    pub max_fallback_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            health_check_timeout_secs: 3,
            rate_limit: RateLimitConfig {
                max_requests: 5,
                window_secs: 60,
            },
            names: NameConfig {
                max_chars: 64,
                generate_default: true,
            },
            failover: FailoverPolicy {
                max_fallback_retries: 1,
            },
        }
    }
}

impl QueueConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            health_check_timeout_secs: env::var("WAITLINE_HEALTH_CHECK_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.health_check_timeout_secs),
            rate_limit: RateLimitConfig {
                max_requests: env::var("WAITLINE_RATE_LIMIT_REQUESTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.rate_limit.max_requests),
                window_secs: env::var("WAITLINE_RATE_LIMIT_WINDOW")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.rate_limit.window_secs),
            },
            names: NameConfig {
                max_chars: env::var("WAITLINE_NAME_MAX_CHARS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.names.max_chars),
                generate_default: env::var("WAITLINE_GENERATE_DEFAULT_NAMES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.names.generate_default),
            },
            failover: FailoverPolicy {
                max_fallback_retries: env::var("WAITLINE_MAX_FALLBACK_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.failover.max_fallback_retries),
            },
        }
    }

    /// The health-check timeout as a [`Duration`].
    #[must_use]
    pub const fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }
}
