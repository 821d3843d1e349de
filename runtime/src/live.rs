//! Live store adapter: the uniform surface over the remote authoritative
//! store.
//!
//! Subscriptions open the backend's owner-filtered change feed and, on
//! every event, refetch the authoritative list and re-project it, so
//! subscribers always observe a full, consistent snapshot and never a
//! partial patch.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;

use waitline_core::clock::Clock;
use waitline_core::error::QueueError;
use waitline_core::projection;
use waitline_core::store::{
    NewTicket, QueueSnapshot, QueueSubscription, StoreFuture, TicketStore, TicketUpdate,
};
use waitline_core::ticket::{OwnerId, Ticket, TicketId, TicketNumber, TicketStatus};

use crate::backend::LiveBackend;
use crate::selector::ModeSelector;
use crate::sequence::SequenceAllocator;

/// [`TicketStore`] implementation backed by the remote authoritative store.
pub struct LiveStore {
    backend: Arc<dyn LiveBackend>,
    clock: Arc<dyn Clock>,
    allocator: SequenceAllocator,
    selector: Arc<ModeSelector>,
}

impl LiveStore {
    /// Creates a live adapter over the given backend and clock.
    ///
    /// The selector is shared so background subscription tasks can demote
    /// the process when the backend fails mid-refetch, not only when a
    /// routed operation fails.
    #[must_use]
    pub fn new(
        backend: Arc<dyn LiveBackend>,
        clock: Arc<dyn Clock>,
        selector: Arc<ModeSelector>,
    ) -> Self {
        let allocator = SequenceAllocator::new(Arc::clone(&backend));
        Self {
            backend,
            clock,
            allocator,
            selector,
        }
    }
}

impl TicketStore for LiveStore {
    fn create(&self, new: NewTicket) -> StoreFuture<'_, Ticket> {
        Box::pin(async move {
            let owner = new.owner_id.clone();
            if !self.backend.owner_exists(owner.clone()).await? {
                return Err(QueueError::not_found(format!("queue owner {owner}")));
            }

            let number = self.allocator.allocate(&owner).await?;
            let ticket = Ticket::open(
                TicketId::new(),
                owner.clone(),
                number,
                new.patient_name.unwrap_or_default(),
                new.priority.unwrap_or_default(),
                self.clock.now(),
            );
            let created = match self.backend.insert_ticket(ticket).await {
                Ok(created) => created,
                Err(error) => {
                    // Hand the number back so a failed creation leaves no
                    // gap in the sequence.
                    if let Err(release_error) = self.allocator.release(&owner, number).await {
                        tracing::warn!(
                            %release_error,
                            owner = %owner,
                            number = %number,
                            "could not return unused ticket number"
                        );
                    }
                    return Err(error);
                }
            };
            tracing::debug!(
                ticket = %created.id,
                owner = %created.owner_id,
                number = %created.number,
                "created ticket via live store"
            );
            Ok(created)
        })
    }

    fn update(&self, id: TicketId, update: TicketUpdate) -> StoreFuture<'_, Ticket> {
        Box::pin(async move { self.backend.apply_update(id, update).await })
    }

    fn remove(&self, id: TicketId) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.backend.remove_ticket(id).await })
    }

    fn list(
        &self,
        owner: OwnerId,
        filter: Option<TicketStatus>,
    ) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move { self.backend.fetch_tickets(owner, filter).await })
    }

    fn position(&self, owner: OwnerId, number: TicketNumber) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let tickets = self.backend.fetch_tickets(owner, None).await?;
            Ok(projection::position(&tickets, number))
        })
    }

    fn subscribe(&self, owner: OwnerId) -> StoreFuture<'_, QueueSubscription> {
        Box::pin(async move {
            // Open the feed before the initial fetch: a mutation landing
            // between the two is then either buffered in the feed or already
            // part of the snapshot, never lost.
            let mut feed = self.backend.changes(owner.clone()).await?;
            let initial = self.backend.fetch_tickets(owner.clone(), None).await?;
            let (tx, rx) = watch::channel(QueueSnapshot {
                revision: 1,
                tickets: projection::project(&initial),
            });

            let backend = Arc::clone(&self.backend);
            let selector = Arc::clone(&self.selector);
            let handle = tokio::spawn(async move {
                while let Some(event) = feed.next().await {
                    match backend.fetch_tickets(event.owner_id.clone(), None).await {
                        Ok(tickets) => {
                            let visible = projection::project(&tickets);
                            tx.send_modify(|snapshot| {
                                snapshot.revision += 1;
                                snapshot.tickets = visible;
                            });
                            if tx.is_closed() {
                                break;
                            }
                        }
                        Err(error) => {
                            tracing::warn!(
                                %error,
                                owner = %event.owner_id,
                                "refetch after change notification failed"
                            );
                            if matches!(error, QueueError::BackendUnavailable { .. }) {
                                // Demote and close the feed; waiting
                                // subscribers observe the failure and
                                // resubscribe, now routed to fallback.
                                selector.demote().await;
                                break;
                            }
                        }
                    }
                }
                tracing::debug!("live subscription feed ended");
            });

            Ok(QueueSubscription::new(rx, move || handle.abort()))
        })
    }
}

impl std::fmt::Debug for LiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStore").finish_non_exhaustive()
    }
}
