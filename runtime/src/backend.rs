//! The capability trait the live adapter calls into.
//!
//! The remote authoritative store is treated as a capability the engine
//! calls, not something it reimplements: persistence and transport live
//! behind [`LiveBackend`]. The in-memory implementation in
//! `waitline-testing` stands in for it in tests; a production deployment
//! implements this trait over its wire protocol.
//!
//! # Atomicity contract
//!
//! - `increment_sequence` is an atomic increment-and-read on the owner's
//!   counter record; `Ok(None)` means the record does not exist yet (first
//!   use, not an error).
//! - `create_sequence` creates the counter with an initial value of 1 under
//!   a uniqueness constraint on the owner; a lost race must surface
//!   [`QueueError::Contention`], never silently hand out a colliding
//!   number.
//! - `release_sequence` is a compare-and-decrement: it rewinds the counter
//!   only while it still equals the released number, so a number handed
//!   back after a failed insert is reissued and the sequence stays dense.
//! - `apply_update` is an atomic read-modify-write keyed on ticket
//!   identity: the state machine runs inside the backend's critical
//!   section, so the status and its timestamp land in a single write.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;

use waitline_core::error::QueueError;
use waitline_core::store::TicketUpdate;
use waitline_core::ticket::{OwnerId, Ticket, TicketId, TicketNumber, TicketStatus};

/// Boxed future type for dyn-compatible backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, QueueError>> + Send + 'a>>;

/// A change notification from the backend's change feed.
///
/// The payload is deliberately thin: on any change for an owner the adapter
/// refetches the authoritative list rather than patching incrementally,
/// trading bandwidth for the invariant that subscribers always see a full,
/// consistent snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The queue the change belongs to.
    pub owner_id: OwnerId,
    /// The ticket that changed.
    pub ticket_id: TicketId,
}

/// Stream of change notifications, already filtered to one owner.
pub type ChangeFeed = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

/// Operations the remote authoritative store must provide.
///
/// # Dyn Compatibility
///
/// Uses explicit `Pin<Box<dyn Future>>` returns so the selector and the
/// live adapter can hold it as `Arc<dyn LiveBackend>`.
pub trait LiveBackend: Send + Sync {
    /// Bounded-cost reachability probe used by the mode selector.
    fn health_check(&self) -> BackendFuture<'_, ()>;

    /// Whether the owner corresponds to a known queue.
    ///
    /// Checked on the live creation path; creation is rejected for unknown
    /// owners.
    fn owner_exists(&self, owner: OwnerId) -> BackendFuture<'_, bool>;

    /// Atomic increment-and-read of the owner's counter.
    ///
    /// Returns `Ok(None)` when no counter record exists yet.
    fn increment_sequence(&self, owner: OwnerId) -> BackendFuture<'_, Option<TicketNumber>>;

    /// Creates the owner's counter record with an initial value of 1.
    ///
    /// The record id is globally unique (not derived from the owner) and a
    /// uniqueness constraint on the owner rejects duplicate counters with
    /// [`QueueError::Contention`].
    fn create_sequence(&self, owner: OwnerId) -> BackendFuture<'_, TicketNumber>;

    /// Returns an allocated number whose ticket was never persisted.
    ///
    /// Compare-and-decrement: a no-op when the counter has already moved
    /// past `number`.
    fn release_sequence(&self, owner: OwnerId, number: TicketNumber) -> BackendFuture<'_, ()>;

    /// Persists a freshly opened ticket.
    fn insert_ticket(&self, ticket: Ticket) -> BackendFuture<'_, Ticket>;

    /// Atomic read-modify-write: runs the state machine against the stored
    /// ticket inside the backend's critical section.
    fn apply_update(&self, id: TicketId, update: TicketUpdate) -> BackendFuture<'_, Ticket>;

    /// Deletes a ticket regardless of status.
    fn remove_ticket(&self, id: TicketId) -> BackendFuture<'_, ()>;

    /// Fetches the authoritative, queue-ordered ticket list for an owner,
    /// optionally filtered by status.
    fn fetch_tickets(
        &self,
        owner: OwnerId,
        filter: Option<TicketStatus>,
    ) -> BackendFuture<'_, Vec<Ticket>>;

    /// Opens the change feed filtered to the given owner.
    fn changes(&self, owner: OwnerId) -> BackendFuture<'_, ChangeFeed>;
}
