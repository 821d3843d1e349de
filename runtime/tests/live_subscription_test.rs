//! Live subscription behavior: feed/fetch ordering and mid-stream backend
//! failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use waitline_core::{
    Clock, NewTicket, OwnerId, Priority, QueueError, Ticket, TicketId, TicketNumber, TicketStatus,
    TicketStore, TicketUpdate,
};
use waitline_runtime::{
    BackendFuture, ChangeFeed, LiveBackend, LiveStore, Mode, ModeSelector, QueueConfig,
    QueueService,
};
use waitline_testing::{InMemoryBackend, ManualClock};

const OWNER: &str = "demo";

fn owner() -> OwnerId {
    OwnerId::new(OWNER)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sample_ticket(number: u32, clock: &ManualClock) -> Ticket {
    Ticket::open(
        TicketId::new(),
        owner(),
        TicketNumber::new(number),
        "Ann".to_string(),
        Priority::Normal,
        clock.now(),
    )
}

/// Delegating backend that sneaks a write in while the change feed is being
/// opened, reproducing a mutation racing subscription setup.
struct RacingWriteBackend {
    inner: Arc<InMemoryBackend>,
    clock: Arc<ManualClock>,
    armed: AtomicBool,
}

impl LiveBackend for RacingWriteBackend {
    fn health_check(&self) -> BackendFuture<'_, ()> {
        self.inner.health_check()
    }

    fn owner_exists(&self, owner: OwnerId) -> BackendFuture<'_, bool> {
        self.inner.owner_exists(owner)
    }

    fn increment_sequence(&self, owner: OwnerId) -> BackendFuture<'_, Option<TicketNumber>> {
        self.inner.increment_sequence(owner)
    }

    fn create_sequence(&self, owner: OwnerId) -> BackendFuture<'_, TicketNumber> {
        self.inner.create_sequence(owner)
    }

    fn release_sequence(&self, owner: OwnerId, number: TicketNumber) -> BackendFuture<'_, ()> {
        self.inner.release_sequence(owner, number)
    }

    fn insert_ticket(&self, ticket: Ticket) -> BackendFuture<'_, Ticket> {
        self.inner.insert_ticket(ticket)
    }

    fn apply_update(&self, id: TicketId, update: TicketUpdate) -> BackendFuture<'_, Ticket> {
        self.inner.apply_update(id, update)
    }

    fn remove_ticket(&self, id: TicketId) -> BackendFuture<'_, ()> {
        self.inner.remove_ticket(id)
    }

    fn fetch_tickets(
        &self,
        owner: OwnerId,
        filter: Option<TicketStatus>,
    ) -> BackendFuture<'_, Vec<Ticket>> {
        self.inner.fetch_tickets(owner, filter)
    }

    fn changes(&self, owner: OwnerId) -> BackendFuture<'_, ChangeFeed> {
        Box::pin(async move {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.inner
                    .insert_ticket(sample_ticket(1, &self.clock))
                    .await?;
            }
            self.inner.changes(owner).await
        })
    }
}

fn live_store_over(backend: Arc<dyn LiveBackend>, clock: Arc<ManualClock>) -> LiveStore {
    let selector = Arc::new(ModeSelector::new(
        Arc::clone(&backend),
        Duration::from_secs(3),
    ));
    LiveStore::new(backend, clock as Arc<dyn Clock>, selector)
}

#[tokio::test]
async fn mutation_racing_subscription_setup_is_captured() {
    init_tracing();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let inner = Arc::new(InMemoryBackend::new(Arc::clone(&clock) as Arc<dyn Clock>));
    inner.register_owner(owner()).await;
    let backend = Arc::new(RacingWriteBackend {
        inner,
        clock: Arc::clone(&clock),
        armed: AtomicBool::new(true),
    });
    let store = live_store_over(backend as Arc<dyn LiveBackend>, clock);

    // The write lands while the subscription is being set up; it must show
    // up in the initial snapshot rather than vanish.
    let sub = store.subscribe(owner()).await.expect("subscribe");
    assert_eq!(sub.snapshot().tickets.len(), 1);
}

#[tokio::test]
async fn refetch_failure_demotes_and_closes_the_subscription() {
    init_tracing();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let backend = Arc::new(InMemoryBackend::new(Arc::clone(&clock) as Arc<dyn Clock>));
    backend.register_owner(owner()).await;
    let service = QueueService::new(
        Arc::clone(&backend) as Arc<dyn LiveBackend>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        QueueConfig::default(),
    );

    service
        .create_ticket("kiosk", NewTicket::new(owner()))
        .await
        .expect("live create");
    assert_eq!(service.mode().await, Mode::Live);
    let mut sub = service.subscribe(&owner()).await.expect("subscribe");

    // The change notification arrives, but the refetch behind it hits an
    // unavailable backend.
    backend.fail_next_fetches(1);
    backend
        .insert_ticket(sample_ticket(2, &clock))
        .await
        .expect("direct insert");

    let err = sub.changed().await;
    assert!(matches!(err, Err(QueueError::BackendUnavailable { .. })));

    // The background task demoted the process, so a fresh subscription is
    // served by the fallback store.
    assert_eq!(service.mode().await, Mode::Fallback);
    let replacement = service.subscribe(&owner()).await.expect("resubscribe");
    assert!(replacement.snapshot().tickets.is_empty());
}
