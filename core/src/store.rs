//! Uniform store surface backed by either the live or the fallback adapter.
//!
//! The [`TicketStore`] trait is the single operation surface the rest of
//! the system sees; the mode selector in the runtime crate decides which
//! implementation backs it for a given process, and can demote from live to
//! fallback on failure without corrupting observed queue state.
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it can be used as a trait object (`Arc<dyn TicketStore>`)
//! behind the mode selector.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::QueueError;
use crate::state_machine::{self, Transition};
use crate::ticket::{OwnerId, Priority, Ticket, TicketId, TicketNumber, TicketStatus};

/// Boxed future type for dyn-compatible store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, QueueError>> + Send + 'a>>;

// ============================================================================
// Inputs
// ============================================================================

/// Creation input for a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    /// The queue to join.
    pub owner_id: OwnerId,
    /// Optional display name; sanitized (and possibly default-generated)
    /// at the service boundary before it reaches a store.
    pub patient_name: Option<String>,
    /// Optional priority, defaulting to normal.
    pub priority: Option<Priority>,
}

impl NewTicket {
    /// Creates a minimal creation request for the given owner.
    #[must_use]
    pub const fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            patient_name: None,
            priority: None,
        }
    }

    /// Attaches a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.patient_name = Some(name.into());
        self
    }

    /// Attaches a priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// A partial ticket update, closed at the type level.
///
/// Every mutation a caller can request is one of these variants; arbitrary
/// field rewrites are not expressible, which is what lets the stores
/// enforce the state machine at the point of mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketUpdate {
    /// Request a status transition, validated by the state machine.
    RequestStatus(TicketStatus),
    /// Enter the paused side-state, capturing the prior status.
    Pause,
    /// Leave the paused side-state, restoring the captured status.
    Resume,
    /// Replace the priority; always legal.
    SetPriority(Priority),
}

impl TicketUpdate {
    /// Applies the update to a ticket inside the store's critical section.
    ///
    /// Returns `true` when the ticket changed, `false` for a successful
    /// no-op (same-status request). The status change and its timestamp are
    /// written together, never as two separate writes.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Validation`] when the state machine rejects
    /// the transition; the ticket is untouched in that case.
    pub fn apply_to(&self, ticket: &mut Ticket, now: DateTime<Utc>) -> Result<bool, QueueError> {
        let transition = match self {
            Self::RequestStatus(status) => state_machine::plan(ticket, *status, now)?,
            Self::Pause => state_machine::plan_pause(ticket, now)?,
            Self::Resume => state_machine::plan_resume(ticket, now)?,
            Self::SetPriority(priority) => {
                ticket.priority = *priority;
                return Ok(true);
            }
        };
        match transition {
            Transition::Applied(change) => {
                change.apply(ticket);
                Ok(true)
            }
            Transition::NoOp => Ok(false),
        }
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

/// A projected queue snapshot delivered to subscribers.
///
/// The `revision` is monotonically increasing within one subscription, so
/// consumers can assert they never observe a stale snapshot after a newer
/// one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueueSnapshot {
    /// Snapshot freshness counter, monotone per subscription stream.
    pub revision: u64,
    /// The visible queue, ordered per the projection.
    pub tickets: Vec<Ticket>,
}

/// Handle to a live queue subscription.
///
/// Exposes the latest projected snapshot and an awaitable change signal.
/// Disposal is explicit via [`QueueSubscription::unsubscribe`] (idempotent;
/// repeated calls are harmless) and also happens on drop, releasing any
/// background refetch task the adapter spawned.
pub struct QueueSubscription {
    receiver: watch::Receiver<QueueSnapshot>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl QueueSubscription {
    /// Wraps a watch receiver and a cancellation action.
    #[must_use]
    pub fn new(
        receiver: watch::Receiver<QueueSnapshot>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    /// The most recent snapshot, without waiting.
    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        self.receiver.borrow().clone()
    }

    /// Waits for the next snapshot newer than the last one observed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::BackendUnavailable`] when the feeding side has
    /// shut down (store dropped or subscription cancelled).
    pub async fn changed(&mut self) -> Result<QueueSnapshot, QueueError> {
        self.receiver
            .changed()
            .await
            .map_err(|_| QueueError::backend_unavailable("subscription feed closed"))?;
        Ok(self.receiver.borrow_and_update().clone())
    }

    /// Releases the subscription's resources.
    ///
    /// Safe to call more than once; only the first call has an effect.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.on_cancel.take() {
            cancel();
        }
    }
}

impl Drop for QueueSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for QueueSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueSubscription")
            .field("revision", &self.receiver.borrow().revision)
            .field("cancelled", &self.on_cancel.is_none())
            .finish()
    }
}

// ============================================================================
// Store trait
// ============================================================================

/// Uniform ticket operation surface, implemented by the live adapter
/// (remote authoritative store) and the fallback adapter (local simulated
/// store).
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; they are shared behind `Arc`
/// across the service facade and background subscription tasks.
pub trait TicketStore: Send + Sync {
    /// Creates a ticket with a freshly allocated number, `status=waiting`
    /// and `created_at=now`.
    ///
    /// A failed creation must not advance the owner's counter observably
    /// and must not leave a partially created ticket.
    fn create(&self, new: NewTicket) -> StoreFuture<'_, Ticket>;

    /// Applies a validated partial update and returns the updated ticket.
    ///
    /// A same-status request is a successful no-op that returns the ticket
    /// unchanged.
    fn update(&self, id: TicketId, update: TicketUpdate) -> StoreFuture<'_, Ticket>;

    /// Removes a ticket regardless of status ("leave queue" by its holder
    /// or operator removal), ending its lifecycle immediately.
    fn remove(&self, id: TicketId) -> StoreFuture<'_, ()>;

    /// Lists tickets for an owner, optionally filtered by status, in the
    /// deterministic queue order.
    fn list(
        &self,
        owner: OwnerId,
        filter: Option<TicketStatus>,
    ) -> StoreFuture<'_, Vec<Ticket>>;

    /// Number of currently waiting tickets ahead of the given number.
    fn position(&self, owner: OwnerId, number: TicketNumber) -> StoreFuture<'_, usize>;

    /// Opens a change-driven subscription to the owner's projected queue.
    fn subscribe(&self, owner: OwnerId) -> StoreFuture<'_, QueueSubscription>;
}
