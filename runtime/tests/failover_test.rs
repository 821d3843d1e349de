//! Failover behavior: probe outcomes, mid-session demotion, stickiness.

use std::sync::Arc;

use chrono::Utc;
use futures::future;
use tokio_test::assert_ok;

use waitline_core::{Clock, NewTicket, OwnerId, QueueError, TicketNumber, TicketStatus};
use waitline_runtime::{Mode, QueueConfig, QueueService};
use waitline_testing::{InMemoryBackend, ManualClock};

const OWNER: &str = "demo";

fn owner() -> OwnerId {
    OwnerId::new(OWNER)
}

async fn service_with(backend: Arc<InMemoryBackend>, clock: Arc<ManualClock>) -> QueueService {
    backend.register_owner(owner()).await;
    QueueService::new(backend, clock, QueueConfig::default())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn fixture() -> (QueueService, Arc<InMemoryBackend>) {
    init_tracing();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let backend = Arc::new(InMemoryBackend::new(Arc::clone(&clock) as Arc<dyn Clock>));
    let service = service_with(Arc::clone(&backend), clock).await;
    (service, backend)
}

#[tokio::test]
async fn failing_health_check_starts_the_process_in_fallback() {
    let (service, backend) = fixture().await;
    backend.set_health_check_failing(true);

    let ticket = service
        .create_ticket("kiosk", NewTicket::new(owner()))
        .await
        .expect("fallback create");

    assert_eq!(service.mode().await, Mode::Fallback);
    assert_eq!(ticket.number, TicketNumber::FIRST);

    // The fallback queue is fully usable: the ticket is listed and movable.
    let listed = service.list_queue(&owner(), None).await.expect("list");
    assert_eq!(listed.len(), 1);
    service
        .update_status(ticket.id, TicketStatus::Called)
        .await
        .expect("call in fallback");
}

#[tokio::test(start_paused = true)]
async fn hanging_health_check_times_out_into_fallback() {
    let (service, backend) = fixture().await;
    backend.set_health_check_hanging(true);

    // The probe gives up after the configured timeout; the creation that
    // triggered it completes against the fallback store.
    let ticket = service
        .create_ticket("kiosk", NewTicket::new(owner()))
        .await
        .expect("create despite hung probe");
    assert_eq!(service.mode().await, Mode::Fallback);
    assert_eq!(ticket.number, TicketNumber::FIRST);

    let listed = service.list_queue(&owner(), None).await.expect("list");
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn fallback_accepts_owners_the_live_store_never_saw() {
    let (service, backend) = fixture().await;
    backend.set_health_check_failing(true);

    let ticket = service
        .create_ticket("kiosk", NewTicket::new(OwnerId::new("pop-up-clinic")))
        .await
        .expect("fallback create");
    assert_eq!(ticket.number, TicketNumber::FIRST);
}

#[tokio::test]
async fn live_failure_mid_session_demotes_and_retries_on_fallback() {
    let (service, backend) = fixture().await;

    let live_ticket = service
        .create_ticket("kiosk", NewTicket::new(owner()))
        .await
        .expect("live create");
    assert_eq!(service.mode().await, Mode::Live);
    assert_eq!(live_ticket.number, TicketNumber::FIRST);

    // The next backend call fails; the triggering operation must succeed
    // against the fallback store instead of surfacing the outage.
    backend.fail_next_operations(1);
    let fallback_ticket = service
        .create_ticket("desk", NewTicket::new(owner()))
        .await
        .expect("retried on fallback");

    assert_eq!(service.mode().await, Mode::Fallback);
    // The fallback store numbers independently; it holds no live tickets.
    assert_eq!(fallback_ticket.number, TicketNumber::FIRST);
}

#[tokio::test]
async fn demotion_is_sticky_even_after_the_backend_recovers() {
    let (service, backend) = fixture().await;
    service
        .create_ticket("kiosk", NewTicket::new(owner()))
        .await
        .expect("live create");

    backend.fail_next_operations(1);
    service
        .create_ticket("desk", NewTicket::new(owner()))
        .await
        .expect("demoting create");
    assert_eq!(service.mode().await, Mode::Fallback);

    // Backend is healthy again, but promotion is never automatic.
    let ticket = assert_ok!(service.create_ticket("late", NewTicket::new(owner())).await);
    assert_eq!(service.mode().await, Mode::Fallback);
    assert_eq!(ticket.number, TicketNumber::new(2));
}

#[tokio::test]
async fn non_availability_errors_do_not_demote() {
    let (service, _) = fixture().await;
    service
        .create_ticket("kiosk", NewTicket::new(owner()))
        .await
        .expect("live create");

    let err = service
        .create_ticket("kiosk", NewTicket::new(OwnerId::new("nowhere")))
        .await;
    assert!(matches!(err, Err(QueueError::NotFound { .. })));
    assert_eq!(service.mode().await, Mode::Live);
}

#[tokio::test]
async fn fallback_subscriptions_observe_local_mutations() {
    let (service, backend) = fixture().await;
    backend.set_health_check_failing(true);

    let mut sub = service.subscribe(&owner()).await.expect("subscribe");
    assert!(sub.snapshot().tickets.is_empty());

    let ticket = service
        .create_ticket("kiosk", NewTicket::new(owner()))
        .await
        .expect("fallback create");
    let snapshot = sub.changed().await.expect("change");
    assert_eq!(snapshot.tickets.len(), 1);
    assert_eq!(snapshot.tickets[0].id, ticket.id);
}

#[tokio::test]
async fn fallback_numbering_stays_dense_under_concurrency() {
    let (service, backend) = fixture().await;
    backend.set_health_check_failing(true);
    let service = Arc::new(service);

    let tasks: Vec<_> = (0..6)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .create_ticket(&format!("client-{i}"), NewTicket::new(owner()))
                    .await
            })
        })
        .collect();

    let mut numbers: Vec<u32> = future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.expect("join").expect("create").number.value())
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=6).collect::<Vec<u32>>());
}
