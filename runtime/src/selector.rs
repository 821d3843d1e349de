//! Mode selector: decides whether the live or the fallback store backs the
//! uniform surface, per process.
//!
//! Exactly one of live/fallback backs a given owner at any instant from the
//! perspective of a single client process. The selector probes the live
//! backend once with a bounded-time health check before the first routed
//! operation; any later live failure demotes to fallback for the rest of
//! the process. Demotion is one-directional: promotion back to live is
//! never attempted automatically, and the decision never affects other
//! processes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::backend::LiveBackend;

/// Which implementation backs the uniform store surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Operations route to the remote authoritative store.
    Live,
    /// Operations route to the local simulated store.
    Fallback,
}

/// Process-local, injectable mode state.
///
/// Constructed per service instance (never a module-level singleton) so
/// tests can run multiple independent instances in isolation.
pub struct ModeSelector {
    backend: Arc<dyn LiveBackend>,
    health_check_timeout: Duration,
    state: RwLock<Option<Mode>>,
}

impl ModeSelector {
    /// Creates a selector that has not probed yet.
    #[must_use]
    pub fn new(backend: Arc<dyn LiveBackend>, health_check_timeout: Duration) -> Self {
        Self {
            backend,
            health_check_timeout,
            state: RwLock::new(None),
        }
    }

    /// The current mode, probing the live backend on first use.
    ///
    /// The probe runs at most once per process lifetime; its outcome (or a
    /// later demotion) is sticky.
    pub async fn current(&self) -> Mode {
        if let Some(mode) = *self.state.read().await {
            return mode;
        }

        let mut state = self.state.write().await;
        // Another caller may have probed while we waited for the lock.
        if let Some(mode) = *state {
            return mode;
        }

        let mode = match tokio::time::timeout(self.health_check_timeout, self.backend.health_check())
            .await
        {
            Ok(Ok(())) => {
                tracing::info!("live backend healthy, starting in live mode");
                Mode::Live
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "live health check failed, starting in fallback mode");
                Mode::Fallback
            }
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.health_check_timeout,
                    "live health check timed out, starting in fallback mode"
                );
                Mode::Fallback
            }
        };
        *state = Some(mode);
        mode
    }

    /// Demotes to fallback for the rest of the process lifetime.
    pub async fn demote(&self) {
        let mut state = self.state.write().await;
        if *state != Some(Mode::Fallback) {
            tracing::warn!("demoting to fallback mode for the rest of this process");
            *state = Some(Mode::Fallback);
        }
    }

    /// The decided mode, `None` if the first probe has not happened yet.
    ///
    /// Never triggers a probe; intended for observability and tests.
    pub async fn decided(&self) -> Option<Mode> {
        *self.state.read().await
    }
}

impl std::fmt::Debug for ModeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeSelector")
            .field("health_check_timeout", &self.health_check_timeout)
            .finish_non_exhaustive()
    }
}
