//! Rolling-window rate limiter for ticket creation.
//!
//! Bounds the number of creations per client within a rolling time window
//! (e.g. 5 per 60 seconds). Clock-driven so tests can advance time
//! manually instead of sleeping.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration as TimeDelta, Utc};
use tokio::sync::Mutex;

use waitline_core::clock::Clock;
use waitline_core::error::QueueError;

/// Per-client rolling-window limiter.
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    max_requests: u32,
    window: TimeDelta,
    recent: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window_secs` seconds
    /// for each client.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, max_requests: u32, window_secs: u64) -> Self {
        Self {
            clock,
            max_requests,
            window: TimeDelta::seconds(i64::try_from(window_secs).unwrap_or(i64::MAX)),
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Records one request for `client`, rejecting it when the window is
    /// already full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Validation`] when the client exceeded the
    /// limit; the request is not recorded in that case.
    pub async fn check(&self, client: &str) -> Result<(), QueueError> {
        let now = self.clock.now();
        let window = self.window;
        let mut recent = self.recent.lock().await;

        // Sweep the whole map, not just the calling client, so clients
        // that stopped requesting do not accumulate entries forever.
        recent.retain(|_, timestamps| {
            while timestamps
                .front()
                .is_some_and(|first| now - *first >= window)
            {
                timestamps.pop_front();
            }
            !timestamps.is_empty()
        });

        let timestamps = recent.entry(client.to_string()).or_default();
        if timestamps.len() >= self.max_requests as usize {
            tracing::debug!(client, "creation rate limit exceeded");
            return Err(QueueError::validation(format!(
                "rate limit exceeded: at most {} tickets per {} seconds",
                self.max_requests,
                self.window.num_seconds()
            )));
        }

        timestamps.push_back(now);
        Ok(())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}
