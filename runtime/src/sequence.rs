//! Race-free allocation of the next sequential ticket number per owner.
//!
//! The counter is the only server-side mutable resource requiring atomic
//! update discipline. Allocation never invents a number locally: every
//! number comes from the backend's atomic increment, or from creating the
//! counter on first use.

use std::sync::Arc;

use waitline_core::error::QueueError;
use waitline_core::ticket::{OwnerId, TicketNumber};

use crate::backend::LiveBackend;

/// Hands out the next ticket number for an owner, race-safe under
/// concurrent callers.
///
/// Algorithm: attempt the atomic increment-and-read first; a missing
/// counter record signals first use and triggers the create path. Losing
/// the create race (uniqueness violation) surfaces
/// [`QueueError::Contention`] to the caller — a visible retryable failure
/// is preferred over silent duplicate-suppression, which could mask a
/// structural bug.
#[derive(Clone)]
pub struct SequenceAllocator {
    backend: Arc<dyn LiveBackend>,
}

impl SequenceAllocator {
    /// Creates an allocator over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn LiveBackend>) -> Self {
        Self { backend }
    }

    /// Allocates the next number for `owner`.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Contention`] when a concurrent first-creation won
    ///   the uniqueness race; the caller may retry.
    /// - [`QueueError::BackendUnavailable`] for any other persistence
    ///   failure during increment or create.
    pub async fn allocate(&self, owner: &OwnerId) -> Result<TicketNumber, QueueError> {
        if let Some(number) = self.backend.increment_sequence(owner.clone()).await? {
            return Ok(number);
        }

        tracing::debug!(owner = %owner, "no counter record yet, creating one");
        let number = self.backend.create_sequence(owner.clone()).await?;
        debug_assert_eq!(number, TicketNumber::FIRST);
        Ok(number)
    }

    /// Returns `number` to the pool after the ticket it was allocated for
    /// failed to persist.
    ///
    /// The backend rewinds the counter only while it still equals `number`;
    /// once a concurrent allocation has moved past it the release is a
    /// no-op, leaving a gap rather than risking a duplicate.
    ///
    /// # Errors
    ///
    /// [`QueueError::BackendUnavailable`] when the backend could not be
    /// reached; the caller logs and moves on, the gap is tolerated.
    pub async fn release(&self, owner: &OwnerId, number: TicketNumber) -> Result<(), QueueError> {
        self.backend
            .release_sequence(owner.clone(), number)
            .await
    }
}

impl std::fmt::Debug for SequenceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceAllocator").finish_non_exhaustive()
    }
}
