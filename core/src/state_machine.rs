//! Ticket state machine: validated status transitions with timestamps.
//!
//! Transitions are **planned** here as pure values and **applied** inside a
//! store's critical section, so the status change and its timestamp land in
//! a single atomic write and validation is enforced at the point of
//! mutation, not merely advised in a UI layer.
//!
//! # Edges
//!
//! ```text
//! waiting    -> called, cancelled
//! called     -> in_service, cancelled, waiting, no_show
//! in_service -> done, cancelled
//! done / cancelled / no_show : terminal
//! ```
//!
//! `paused` is an orthogonal side-state: any of `waiting`/`called`/
//! `in_service` may pause (capturing the prior status), and resume restores
//! the captured status (defaulting to `waiting` if none was captured).
//! Pause and resume are not subject to the edge table above.

use chrono::{DateTime, Utc};

use crate::error::TransitionError;
use crate::ticket::{Ticket, TicketStatus};

/// Outcome of planning a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The transition is legal; apply the contained change atomically.
    Applied(StatusChange),
    /// The requested status equals the current one: a successful no-op,
    /// explicitly not an error but also not applied.
    NoOp,
}

/// A validated status change, ready to be applied in one atomic write.
///
/// Carries everything the store must persist together: the new status, the
/// transition instant (stamped only if the matching timestamp field is
/// still unset), and the `previous_status` capture/clear for pause/resume.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusChange {
    /// The status being entered.
    pub next: TicketStatus,
    /// The instant of the transition.
    pub at: DateTime<Utc>,
    /// Capture the current status into `previous_status` (entering pause).
    pub capture_previous: bool,
    /// Clear `previous_status` (leaving pause).
    pub clear_previous: bool,
    /// Stamp `resumed_at` instead of the entered status's own timestamp.
    pub is_resume: bool,
}

impl StatusChange {
    /// Applies the change to a ticket.
    ///
    /// Must be called inside the store's critical section so the status and
    /// timestamp write is a single atomic operation. Every first-time
    /// timestamp is set-once: an already-set field is never overwritten.
    pub fn apply(&self, ticket: &mut Ticket) {
        if self.capture_previous {
            ticket.previous_status = Some(ticket.status);
        }
        if self.clear_previous {
            ticket.previous_status = None;
        }
        ticket.status = self.next;

        if self.is_resume {
            stamp_once(&mut ticket.resumed_at, self.at);
            return;
        }
        match self.next {
            TicketStatus::Called => stamp_once(&mut ticket.called_at, self.at),
            TicketStatus::InService => stamp_once(&mut ticket.started_at, self.at),
            TicketStatus::Done => stamp_once(&mut ticket.finished_at, self.at),
            TicketStatus::Paused => stamp_once(&mut ticket.paused_at, self.at),
            TicketStatus::NoShow => stamp_once(&mut ticket.no_show_at, self.at),
            TicketStatus::Waiting | TicketStatus::Cancelled => {}
        }
    }
}

fn stamp_once(field: &mut Option<DateTime<Utc>>, at: DateTime<Utc>) {
    if field.is_none() {
        *field = Some(at);
    }
}

/// The allowed targets for a status under the edge table.
///
/// `paused` has no entries here because pause/resume bypass the table.
#[must_use]
pub const fn allowed_targets(from: TicketStatus) -> &'static [TicketStatus] {
    match from {
        TicketStatus::Waiting => &[TicketStatus::Called, TicketStatus::Cancelled],
        TicketStatus::Called => &[
            TicketStatus::InService,
            TicketStatus::Cancelled,
            TicketStatus::Waiting,
            TicketStatus::NoShow,
        ],
        TicketStatus::InService => &[TicketStatus::Done, TicketStatus::Cancelled],
        TicketStatus::Done
        | TicketStatus::Cancelled
        | TicketStatus::NoShow
        | TicketStatus::Paused => &[],
    }
}

/// Plans a transition to `requested`.
///
/// Returns [`Transition::NoOp`] when `requested` equals the current status,
/// and rejects (with no side effect) when `requested` is not in the allowed
/// set. A request for `paused` is routed through [`plan_pause`] so the
/// prior status is captured.
///
/// # Errors
///
/// Returns [`TransitionError`] when the edge is not allowed, including any
/// ordinary request made while the ticket is paused (resume first).
pub fn plan(
    ticket: &Ticket,
    requested: TicketStatus,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    if requested == ticket.status {
        return Ok(Transition::NoOp);
    }
    if requested == TicketStatus::Paused {
        return plan_pause(ticket, now);
    }

    let allowed = allowed_targets(ticket.status);
    if !allowed.contains(&requested) {
        return Err(TransitionError {
            from: ticket.status,
            requested,
        });
    }

    Ok(Transition::Applied(StatusChange {
        next: requested,
        at: now,
        capture_previous: false,
        clear_previous: false,
        is_resume: false,
    }))
}

/// Plans entering the `paused` side-state, capturing the prior status.
///
/// # Errors
///
/// Returns [`TransitionError`] when the ticket is in a terminal status.
pub fn plan_pause(ticket: &Ticket, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
    match ticket.status {
        TicketStatus::Paused => Ok(Transition::NoOp),
        TicketStatus::Waiting | TicketStatus::Called | TicketStatus::InService => {
            Ok(Transition::Applied(StatusChange {
                next: TicketStatus::Paused,
                at: now,
                capture_previous: true,
                clear_previous: false,
                is_resume: false,
            }))
        }
        status => Err(TransitionError {
            from: status,
            requested: TicketStatus::Paused,
        }),
    }
}

/// Plans leaving `paused`, restoring the captured status.
///
/// Defaults to `waiting` when no prior status was captured.
///
/// # Errors
///
/// Returns [`TransitionError`] when the ticket is not paused.
pub fn plan_resume(ticket: &Ticket, now: DateTime<Utc>) -> Result<Transition, TransitionError> {
    if ticket.status != TicketStatus::Paused {
        return Err(TransitionError {
            from: ticket.status,
            requested: ticket.previous_status.unwrap_or(TicketStatus::Waiting),
        });
    }
    Ok(Transition::Applied(StatusChange {
        next: ticket.previous_status.unwrap_or(TicketStatus::Waiting),
        at: now,
        capture_previous: false,
        clear_previous: true,
        is_resume: true,
    }))
}
