//! The queue service facade: external interface over the dual-mode store.
//!
//! All operations route through the mode selector. A live operation that
//! fails with [`QueueError::BackendUnavailable`] demotes the process to
//! fallback and is retried against the fallback store under the bounded
//! failover policy (exactly once by default); every other error class
//! surfaces to the caller untouched, so duplicate ticket numbers are never
//! traded for a smoother failure.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use uuid::Uuid;

use waitline_core::clock::Clock;
use waitline_core::error::QueueError;
use waitline_core::store::{NewTicket, QueueSubscription, TicketStore, TicketUpdate};
use waitline_core::ticket::{
    sanitize_patient_name, OwnerId, Priority, Ticket, TicketId, TicketNumber, TicketStatus,
};

use crate::backend::LiveBackend;
use crate::config::QueueConfig;
use crate::fallback::FallbackStore;
use crate::live::LiveStore;
use crate::rate_limit::RateLimiter;
use crate::selector::{Mode, ModeSelector};

type DynStore = Arc<dyn TicketStore>;
type OpFuture<T> = Pin<Box<dyn Future<Output = Result<T, QueueError>> + Send>>;

/// Ticket lifecycle operations for a single client process.
///
/// Owns the process-local mutable state (mode flag, fallback store,
/// rate-limit windows) as an explicitly constructed context object; tests
/// can run any number of independent instances side by side.
pub struct QueueService {
    config: QueueConfig,
    selector: Arc<ModeSelector>,
    live: Arc<LiveStore>,
    fallback: Arc<FallbackStore>,
    limiter: RateLimiter,
}

impl QueueService {
    /// Wires a service over the given live backend and clock.
    #[must_use]
    pub fn new(backend: Arc<dyn LiveBackend>, clock: Arc<dyn Clock>, config: QueueConfig) -> Self {
        let selector = Arc::new(ModeSelector::new(
            Arc::clone(&backend),
            config.health_check_timeout(),
        ));
        let live = Arc::new(LiveStore::new(
            backend,
            Arc::clone(&clock),
            Arc::clone(&selector),
        ));
        let fallback = Arc::new(FallbackStore::new(Arc::clone(&clock)));
        let limiter = RateLimiter::new(
            clock,
            config.rate_limit.max_requests,
            config.rate_limit.window_secs,
        );
        Self {
            config,
            selector,
            live,
            fallback,
            limiter,
        }
    }

    /// The mode currently backing operations, probing on first use.
    pub async fn mode(&self) -> Mode {
        self.selector.current().await
    }

    /// Creates a ticket for a walk-in visitor.
    ///
    /// # Errors
    ///
    /// - [`QueueError::Validation`] for an empty owner id or when `client`
    ///   exceeded the creation rate limit.
    /// - [`QueueError::NotFound`] when the owner is unknown (live mode).
    /// - [`QueueError::Contention`] when the first-sequence creation race
    ///   was lost; retryable by the caller.
    /// - [`QueueError::BackendUnavailable`] when both stores failed.
    pub async fn create_ticket(
        &self,
        client: &str,
        mut request: NewTicket,
    ) -> Result<Ticket, QueueError> {
        if request.owner_id.is_blank() {
            return Err(QueueError::validation("owner id must not be empty"));
        }
        self.limiter.check(client).await?;

        request.patient_name = Some(self.display_name(request.patient_name.as_deref()));

        self.with_store(move |store| {
            let request = request.clone();
            Box::pin(async move { store.create(request).await })
        })
        .await
    }

    /// Requests a status transition, validated by the state machine at the
    /// point of mutation.
    ///
    /// # Errors
    ///
    /// [`QueueError::Validation`] on an illegal transition (the ticket is
    /// untouched), [`QueueError::NotFound`] for an unknown ticket.
    pub async fn update_status(
        &self,
        id: TicketId,
        status: TicketStatus,
    ) -> Result<Ticket, QueueError> {
        self.apply(id, TicketUpdate::RequestStatus(status)).await
    }

    /// Pauses a ticket, capturing its prior status.
    ///
    /// # Errors
    ///
    /// [`QueueError::Validation`] when the ticket is terminal.
    pub async fn pause(&self, id: TicketId) -> Result<Ticket, QueueError> {
        self.apply(id, TicketUpdate::Pause).await
    }

    /// Resumes a paused ticket, restoring the captured status.
    ///
    /// # Errors
    ///
    /// [`QueueError::Validation`] when the ticket is not paused.
    pub async fn resume(&self, id: TicketId) -> Result<Ticket, QueueError> {
        self.apply(id, TicketUpdate::Resume).await
    }

    /// Replaces a ticket's priority; always legal.
    ///
    /// # Errors
    ///
    /// [`QueueError::NotFound`] for an unknown ticket.
    pub async fn update_priority(
        &self,
        id: TicketId,
        priority: Priority,
    ) -> Result<Ticket, QueueError> {
        self.apply(id, TicketUpdate::SetPriority(priority)).await
    }

    /// Removes a ticket regardless of status ("leave queue" or operator
    /// removal).
    ///
    /// # Errors
    ///
    /// [`QueueError::NotFound`] for an unknown ticket.
    pub async fn remove_ticket(&self, id: TicketId) -> Result<(), QueueError> {
        self.with_store(move |store| Box::pin(async move { store.remove(id).await }))
            .await
    }

    /// Lists an owner's tickets in the deterministic queue order.
    ///
    /// # Errors
    ///
    /// [`QueueError::BackendUnavailable`] when both stores failed.
    pub async fn list_queue(
        &self,
        owner: &OwnerId,
        filter: Option<TicketStatus>,
    ) -> Result<Vec<Ticket>, QueueError> {
        let owner = owner.clone();
        self.with_store(move |store| {
            let owner = owner.clone();
            Box::pin(async move { store.list(owner, filter).await })
        })
        .await
    }

    /// Counts the waiting tickets ahead of the given number.
    ///
    /// # Errors
    ///
    /// [`QueueError::BackendUnavailable`] when both stores failed.
    pub async fn position(
        &self,
        owner: &OwnerId,
        number: TicketNumber,
    ) -> Result<usize, QueueError> {
        let owner = owner.clone();
        self.with_store(move |store| {
            let owner = owner.clone();
            Box::pin(async move { store.position(owner, number).await })
        })
        .await
    }

    /// Subscribes to the owner's projected queue.
    ///
    /// The returned handle must be disposed exactly once when no longer of
    /// interest; repeated disposal is harmless.
    ///
    /// # Errors
    ///
    /// [`QueueError::BackendUnavailable`] when both stores failed.
    pub async fn subscribe(&self, owner: &OwnerId) -> Result<QueueSubscription, QueueError> {
        let owner = owner.clone();
        self.with_store(move |store| {
            let owner = owner.clone();
            Box::pin(async move { store.subscribe(owner).await })
        })
        .await
    }

    fn display_name(&self, raw: Option<&str>) -> String {
        let sanitized = raw
            .map(|name| sanitize_patient_name(name, self.config.names.max_chars))
            .unwrap_or_default();
        if sanitized.is_empty() && self.config.names.generate_default {
            let suffix: String = Uuid::new_v4().simple().to_string().chars().take(6).collect();
            return format!("Guest-{suffix}");
        }
        sanitized
    }

    async fn apply(&self, id: TicketId, update: TicketUpdate) -> Result<Ticket, QueueError> {
        self.with_store(move |store| {
            let update = update.clone();
            Box::pin(async move { store.update(id, update).await })
        })
        .await
    }

    /// Routes an operation per the current mode, demoting and retrying
    /// against fallback (bounded by the failover policy) when live fails
    /// at call time.
    async fn with_store<T, F>(&self, op: F) -> Result<T, QueueError>
    where
        F: Fn(DynStore) -> OpFuture<T>,
    {
        match self.selector.current().await {
            Mode::Fallback => op(Arc::clone(&self.fallback) as DynStore).await,
            Mode::Live => match op(Arc::clone(&self.live) as DynStore).await {
                Err(error @ QueueError::BackendUnavailable { .. }) => {
                    tracing::warn!(%error, "live operation failed at call time, demoting");
                    self.selector.demote().await;
                    let mut last = error;
                    for _ in 0..self.config.failover.max_fallback_retries {
                        match op(Arc::clone(&self.fallback) as DynStore).await {
                            Ok(value) => return Ok(value),
                            Err(error) => last = error,
                        }
                    }
                    Err(last)
                }
                other => other,
            },
        }
    }
}

impl std::fmt::Debug for QueueService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
