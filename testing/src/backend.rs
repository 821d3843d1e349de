//! In-memory [`LiveBackend`] with failure injection.
//!
//! Stands in for the remote authoritative store in tests: one mutex guards
//! owners, counters and tickets, so counter increments and ticket writes
//! have the same atomicity the real backend promises. Failure injection
//! covers the scenarios the engine must survive: a failing or hanging
//! health check, and a bounded number of failed operations mid-session.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use futures::stream;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use waitline_core::clock::Clock;
use waitline_core::error::QueueError;
use waitline_core::projection;
use waitline_core::store::TicketUpdate;
use waitline_core::ticket::{OwnerId, Ticket, TicketId, TicketNumber, TicketStatus};
use waitline_runtime::{BackendFuture, ChangeEvent, ChangeFeed, LiveBackend};

/// One owner's counter record.
///
/// Carries a globally unique id alongside the count, mirroring the real
/// store's layout where the record id is not derived from the owner.
struct SequenceRecord {
    #[allow(dead_code, reason = "mirrors the authoritative record layout")]
    id: Uuid,
    last: TicketNumber,
}

struct BackendState {
    owners: HashSet<OwnerId>,
    sequences: HashMap<OwnerId, SequenceRecord>,
    tickets: HashMap<TicketId, Ticket>,
}

/// In-memory live backend with failure injection.
pub struct InMemoryBackend {
    clock: Arc<dyn Clock>,
    state: Mutex<BackendState>,
    changes: broadcast::Sender<ChangeEvent>,
    fail_health: AtomicBool,
    hang_health: AtomicBool,
    fail_next: AtomicU32,
    fail_inserts: AtomicU32,
    fail_fetches: AtomicU32,
}

impl InMemoryBackend {
    /// Creates an empty backend with no registered owners.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            clock,
            state: Mutex::new(BackendState {
                owners: HashSet::new(),
                sequences: HashMap::new(),
                tickets: HashMap::new(),
            }),
            changes,
            fail_health: AtomicBool::new(false),
            hang_health: AtomicBool::new(false),
            fail_next: AtomicU32::new(0),
            fail_inserts: AtomicU32::new(0),
            fail_fetches: AtomicU32::new(0),
        }
    }

    /// Registers a queue owner so creations for it are accepted.
    pub async fn register_owner(&self, owner: OwnerId) {
        self.state.lock().await.owners.insert(owner);
    }

    /// Makes the health check fail immediately while `failing` is set.
    pub fn set_health_check_failing(&self, failing: bool) {
        self.fail_health.store(failing, Ordering::SeqCst);
    }

    /// Makes the health check hang forever while `hanging` is set, to
    /// exercise the probe timeout.
    pub fn set_health_check_hanging(&self, hanging: bool) {
        self.hang_health.store(hanging, Ordering::SeqCst);
    }

    /// Makes the next `count` operations fail with
    /// [`QueueError::BackendUnavailable`] before touching any state.
    pub fn fail_next_operations(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Makes only the next `count` ticket inserts fail, leaving sequence
    /// allocation and everything else untouched.
    pub fn fail_next_inserts(&self, count: u32) {
        self.fail_inserts.store(count, Ordering::SeqCst);
    }

    /// Makes only the next `count` ticket fetches fail.
    pub fn fail_next_fetches(&self, count: u32) {
        self.fail_fetches.store(count, Ordering::SeqCst);
    }

    fn consume(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn maybe_fail(&self) -> Result<(), QueueError> {
        if Self::consume(&self.fail_next) {
            return Err(QueueError::backend_unavailable("injected backend failure"));
        }
        Ok(())
    }

    fn notify(&self, owner_id: OwnerId, ticket_id: TicketId) {
        // No receivers is fine; subscriptions come and go.
        let _ = self.changes.send(ChangeEvent {
            owner_id,
            ticket_id,
        });
    }
}

impl LiveBackend for InMemoryBackend {
    fn health_check(&self) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            if self.hang_health.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.fail_health.load(Ordering::SeqCst) {
                return Err(QueueError::backend_unavailable("health check failing"));
            }
            self.maybe_fail()
        })
    }

    fn owner_exists(&self, owner: OwnerId) -> BackendFuture<'_, bool> {
        Box::pin(async move {
            self.maybe_fail()?;
            Ok(self.state.lock().await.owners.contains(&owner))
        })
    }

    fn increment_sequence(&self, owner: OwnerId) -> BackendFuture<'_, Option<TicketNumber>> {
        Box::pin(async move {
            self.maybe_fail()?;
            let mut state = self.state.lock().await;
            Ok(state.sequences.get_mut(&owner).map(|record| {
                record.last = record.last.next();
                record.last
            }))
        })
    }

    fn create_sequence(&self, owner: OwnerId) -> BackendFuture<'_, TicketNumber> {
        Box::pin(async move {
            self.maybe_fail()?;
            let mut state = self.state.lock().await;
            if state.sequences.contains_key(&owner) {
                return Err(QueueError::contention(format!(
                    "counter for {owner} already exists"
                )));
            }
            state.sequences.insert(
                owner,
                SequenceRecord {
                    id: Uuid::new_v4(),
                    last: TicketNumber::FIRST,
                },
            );
            Ok(TicketNumber::FIRST)
        })
    }

    fn release_sequence(&self, owner: OwnerId, number: TicketNumber) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            self.maybe_fail()?;
            let mut state = self.state.lock().await;
            if let Some(record) = state.sequences.get_mut(&owner) {
                // Compare-and-decrement: only rewind while the counter
                // still points at the released number.
                if record.last == number {
                    record.last = TicketNumber::new(number.value().saturating_sub(1));
                }
            }
            Ok(())
        })
    }

    fn insert_ticket(&self, ticket: Ticket) -> BackendFuture<'_, Ticket> {
        Box::pin(async move {
            if Self::consume(&self.fail_inserts) {
                return Err(QueueError::backend_unavailable("injected insert failure"));
            }
            self.maybe_fail()?;
            let mut state = self.state.lock().await;
            state.tickets.insert(ticket.id, ticket.clone());
            drop(state);
            self.notify(ticket.owner_id.clone(), ticket.id);
            Ok(ticket)
        })
    }

    fn apply_update(&self, id: TicketId, update: TicketUpdate) -> BackendFuture<'_, Ticket> {
        Box::pin(async move {
            self.maybe_fail()?;
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let ticket = state
                .tickets
                .get_mut(&id)
                .ok_or_else(|| QueueError::not_found(format!("ticket {id}")))?;
            let changed = update.apply_to(ticket, now)?;
            let updated = ticket.clone();
            drop(state);
            if changed {
                self.notify(updated.owner_id.clone(), updated.id);
            }
            Ok(updated)
        })
    }

    fn remove_ticket(&self, id: TicketId) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            self.maybe_fail()?;
            let mut state = self.state.lock().await;
            let removed = state
                .tickets
                .remove(&id)
                .ok_or_else(|| QueueError::not_found(format!("ticket {id}")))?;
            drop(state);
            self.notify(removed.owner_id, removed.id);
            Ok(())
        })
    }

    fn fetch_tickets(
        &self,
        owner: OwnerId,
        filter: Option<TicketStatus>,
    ) -> BackendFuture<'_, Vec<Ticket>> {
        Box::pin(async move {
            if Self::consume(&self.fail_fetches) {
                return Err(QueueError::backend_unavailable("injected fetch failure"));
            }
            self.maybe_fail()?;
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

    fn changes(&self, owner: OwnerId) -> BackendFuture<'_, ChangeFeed> {
        let rx = self.changes.subscribe();
        Box::pin(async move {
            self.maybe_fail()?;
            let feed = stream::unfold((rx, owner), |(mut rx, owner)| async move {
                loop {
                    match rx.recv().await {
                        Ok(event) if event.owner_id == owner => return Some((event, (rx, owner))),
                        // Other owners' events and lagged gaps are skipped;
                        // the adapter refetches the full list anyway.
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            });
            Ok(Box::pin(feed) as ChangeFeed)
        })
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("fail_health", &self.fail_health)
            .field("hang_health", &self.hang_health)
            .field("fail_next", &self.fail_next)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;
    use waitline_core::clock::SystemClock;

    fn backend() -> InMemoryBackend {
        InMemoryBackend::new(Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn first_allocation_requires_counter_creation() {
        let b = backend();
        let owner = OwnerId::new("demo");
        assert_eq!(b.increment_sequence(owner.clone()).await.expect("incr"), None);
        assert_eq!(
            b.create_sequence(owner.clone()).await.expect("create"),
            TicketNumber::FIRST
        );
        assert_eq!(
            b.increment_sequence(owner).await.expect("incr"),
            Some(TicketNumber::new(2))
        );
    }

    #[tokio::test]
    async fn duplicate_counter_creation_is_contention() {
        let b = backend();
        let owner = OwnerId::new("demo");
        b.create_sequence(owner.clone()).await.expect("create");
        let err = b.create_sequence(owner).await;
        assert!(matches!(err, Err(QueueError::Contention { .. })));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let b = backend();
        b.fail_next_operations(2);
        assert!(b.health_check().await.is_err());
        assert!(b.owner_exists(OwnerId::new("demo")).await.is_err());
        assert_ok!(b.health_check().await);
    }

    #[tokio::test]
    async fn releasing_the_latest_number_rewinds_the_counter() {
        let b = backend();
        let owner = OwnerId::new("demo");
        b.create_sequence(owner.clone()).await.expect("create");
        let second = b
            .increment_sequence(owner.clone())
            .await
            .expect("incr")
            .expect("counter exists");

        b.release_sequence(owner.clone(), second)
            .await
            .expect("release");
        assert_eq!(
            b.increment_sequence(owner).await.expect("incr"),
            Some(second)
        );
    }

    #[tokio::test]
    async fn release_is_a_no_op_once_the_counter_moved_on() {
        let b = backend();
        let owner = OwnerId::new("demo");
        b.create_sequence(owner.clone()).await.expect("create");
        let second = b
            .increment_sequence(owner.clone())
            .await
            .expect("incr")
            .expect("counter exists");
        b.increment_sequence(owner.clone())
            .await
            .expect("incr")
            .expect("counter exists");

        // Too late: number 3 is already out, the release leaves a gap
        // instead of risking a duplicate.
        b.release_sequence(owner.clone(), second)
            .await
            .expect("release");
        assert_eq!(
            b.increment_sequence(owner).await.expect("incr"),
            Some(TicketNumber::new(4))
        );
    }
}
