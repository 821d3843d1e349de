//! Error taxonomy for queue operations.
//!
//! Every fallible operation in the engine reports one of four classes, and
//! the class decides the propagation policy:
//!
//! - [`QueueError::Validation`] — malformed input or an illegal transition.
//!   Surfaced immediately, never retried.
//! - [`QueueError::Contention`] — a lost race (unique-constraint violation
//!   on first sequence creation). Surfaced as retryable; the engine never
//!   loops internally because silent duplicate-suppression can mask a
//!   structural bug.
//! - [`QueueError::BackendUnavailable`] — the live backend failed or timed
//!   out. The only class the adapter layer is permitted to retry against
//!   the fallback store after demotion, under a bounded policy.
//! - [`QueueError::NotFound`] — ticket or owner missing. Surfaced, not
//!   retried.

use thiserror::Error;

use crate::ticket::TicketStatus;

/// Errors that can occur during queue operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Malformed input: missing owner id, oversized fields, rate limit hit,
    /// or an illegal status transition.
    #[error("validation failed: {reason}")]
    Validation {
        /// Human-readable rejection reason.
        reason: String,
    },

    /// A race was lost against a concurrent writer (typically the
    /// unique-constraint violation when two clients create the first
    /// sequence record for the same owner).
    ///
    /// Retryable by the caller; never retried internally.
    #[error("resource contention: {reason}")]
    Contention {
        /// What was being contended.
        reason: String,
    },

    /// The live backend failed a health check or an operation at call time.
    ///
    /// Triggers mode demotion in the store adapter layer.
    #[error("backend unavailable: {reason}")]
    BackendUnavailable {
        /// The underlying failure.
        reason: String,
    },

    /// A ticket or queue owner does not exist.
    #[error("not found: {entity}")]
    NotFound {
        /// Description of the missing entity.
        entity: String,
    },
}

impl QueueError {
    /// Build a validation error from any displayable reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Build a contention error from any displayable reason.
    pub fn contention(reason: impl Into<String>) -> Self {
        Self::Contention {
            reason: reason.into(),
        }
    }

    /// Build a backend-unavailable error from any displayable reason.
    pub fn backend_unavailable(reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            reason: reason.into(),
        }
    }

    /// Build a not-found error for a missing entity.
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    /// Whether the caller may reasonably retry the operation.
    ///
    /// Validation and not-found failures are deterministic; contention and
    /// backend unavailability are transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Contention { .. } | Self::BackendUnavailable { .. }
        )
    }
}

/// A status transition rejected by the state machine.
///
/// Carries the exact edge that was refused so callers can render an
/// actionable message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot transition from {from} to {requested}")]
pub struct TransitionError {
    /// The ticket's current status.
    pub from: TicketStatus,
    /// The status that was requested.
    pub requested: TicketStatus,
}

impl From<TransitionError> for QueueError {
    fn from(err: TransitionError) -> Self {
        Self::Validation {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classes() {
        assert!(QueueError::contention("seq race").is_retryable());
        assert!(QueueError::backend_unavailable("timeout").is_retryable());
        assert!(!QueueError::validation("empty owner").is_retryable());
        assert!(!QueueError::not_found("ticket x").is_retryable());
    }

    #[test]
    fn transition_error_display_names_both_states() {
        let err = TransitionError {
            from: TicketStatus::Called,
            requested: TicketStatus::Done,
        };
        let msg = err.to_string();
        assert!(msg.contains("called"));
        assert!(msg.contains("done"));
    }
}
