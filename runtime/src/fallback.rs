//! Fallback store: the local simulated store used when the live backend is
//! unavailable.
//!
//! Durable within the local process only. Numbers for a given owner are
//! assigned as `count of existing tickets for that owner + 1` at creation
//! time, acceptable because the fallback is single-writer by construction.
//! The full projected list is recomputed and pushed to subscribers on every
//! mutation.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use waitline_core::clock::Clock;
use waitline_core::error::QueueError;
use waitline_core::projection;
use waitline_core::store::{
    NewTicket, QueueSnapshot, QueueSubscription, StoreFuture, TicketStore, TicketUpdate,
};
use waitline_core::ticket::{OwnerId, Ticket, TicketId, TicketNumber, TicketStatus};

struct FallbackState {
    tickets: HashMap<TicketId, Ticket>,
    feeds: HashMap<OwnerId, watch::Sender<QueueSnapshot>>,
}

impl FallbackState {
    fn owner_tickets(&self, owner: &OwnerId) -> Vec<Ticket> {
        self.tickets
            .values()
            .filter(|t| &t.owner_id == owner)
            .cloned()
            .collect()
    }

    /// Recomputes and pushes the owner's projected queue to subscribers.
    fn publish(&mut self, owner: &OwnerId) {
        let visible = projection::project(&self.owner_tickets(owner));
        if let Some(tx) = self.feeds.get(owner) {
            tx.send_modify(|snapshot| {
                snapshot.revision += 1;
                snapshot.tickets = visible;
            });
        }
    }
}

/// [`TicketStore`] implementation over process-local state.
pub struct FallbackStore {
    clock: Arc<dyn Clock>,
    state: Mutex<FallbackState>,
}

impl FallbackStore {
    /// Creates an empty fallback store.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(FallbackState {
                tickets: HashMap::new(),
                feeds: HashMap::new(),
            }),
        }
    }
}

impl TicketStore for FallbackStore {
    fn create(&self, new: NewTicket) -> StoreFuture<'_, Ticket> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let owner = new.owner_id.clone();

            // Single-writer by construction, so count+1 cannot race.
            let count = state
                .tickets
                .values()
                .filter(|t| t.owner_id == owner)
                .count();
            let number = u32::try_from(count)
                .ok()
                .and_then(|n| n.checked_add(1))
                .map(TicketNumber::new)
                .ok_or_else(|| QueueError::validation("queue is full"))?;

            let ticket = Ticket::open(
                TicketId::new(),
                owner.clone(),
                number,
                new.patient_name.unwrap_or_default(),
                new.priority.unwrap_or_default(),
                self.clock.now(),
            );
            state.tickets.insert(ticket.id, ticket.clone());
            state.publish(&owner);
            tracing::debug!(
                ticket = %ticket.id,
                owner = %owner,
                number = %number,
                "created ticket via fallback store"
            );
            Ok(ticket)
        })
    }

    fn update(&self, id: TicketId, update: TicketUpdate) -> StoreFuture<'_, Ticket> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let ticket = state
                .tickets
                .get_mut(&id)
                .ok_or_else(|| QueueError::not_found(format!("ticket {id}")))?;

            // State machine runs under the same lock as the write: the
            // status and its timestamp land as one atomic mutation.
            let changed = update.apply_to(ticket, now)?;
            let updated = ticket.clone();
            if changed {
                let owner = updated.owner_id.clone();
                state.publish(&owner);
            }
            Ok(updated)
        })
    }

    fn remove(&self, id: TicketId) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let removed = state
                .tickets
                .remove(&id)
                .ok_or_else(|| QueueError::not_found(format!("ticket {id}")))?;
            state.publish(&removed.owner_id);
            Ok(())
        })
    }

    fn list(
        &self,
        owner: OwnerId,
        filter: Option<TicketStatus>,
    ) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let matching: Vec<Ticket> = state
                .tickets
                .values()
                .filter(|t| t.owner_id == owner)
                .filter(|t| filter.is_none_or(|status| t.status == status))
                .cloned()
                .collect();
            Ok(projection::ordered(matching))
        })
    }

    fn position(&self, owner: OwnerId, number: TicketNumber) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(projection::position(&state.owner_tickets(&owner), number))
        })
    }

    fn subscribe(&self, owner: OwnerId) -> StoreFuture<'_, QueueSubscription> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let initial = QueueSnapshot {
                revision: 1,
                tickets: projection::project(&state.owner_tickets(&owner)),
            };
            let tx = state
                .feeds
                .entry(owner)
                .or_insert_with(|| watch::channel(initial).0);
            let rx = tx.subscribe();
            // Nothing to tear down: the watch sender lives with the store.
            Ok(QueueSubscription::new(rx, || {}))
        })
    }
}

impl std::fmt::Debug for FallbackStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackStore").finish_non_exhaustive()
    }
}
