//! Queue view projection: the ordered, filtered view of active tickets.
//!
//! Consumers never sort or filter tickets themselves; the projector derives
//! the visible queue from the full ticket set and is re-run on every change
//! notification so subscribers always see a full, consistent snapshot.

use std::cmp::Ordering;

use crate::ticket::{Ticket, TicketNumber, TicketStatus};

/// Total order for queue views.
///
/// Primary key: priority weight descending (`emergency` first). Secondary:
/// `created_at` ascending (earlier arrivals first within the same
/// priority). Ties beyond both keys break by ticket identifier so the order
/// is reproducible across re-renders.
#[must_use]
pub fn compare(a: &Ticket, b: &Ticket) -> Ordering {
    b.priority
        .weight()
        .cmp(&a.priority.weight())
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sorts tickets into the deterministic queue order without filtering.
///
/// Used for listings that include terminal tickets (reporting views).
#[must_use]
pub fn ordered(mut tickets: Vec<Ticket>) -> Vec<Ticket> {
    tickets.sort_by(compare);
    tickets
}

/// Projects the raw ticket set into the visible live queue.
///
/// Only `waiting`, `called` and `in_service` tickets are active;
/// `done`, `cancelled` and `no_show` stay in the underlying store for
/// reporting but are excluded here. `paused` tickets are likewise hidden
/// from the live view until resumed.
#[must_use]
pub fn project(tickets: &[Ticket]) -> Vec<Ticket> {
    let mut visible: Vec<Ticket> = tickets
        .iter()
        .filter(|t| t.status.is_active())
        .cloned()
        .collect();
    visible.sort_by(compare);
    visible
}

/// Counts the currently `waiting` tickets with a smaller number.
///
/// This is the visitor-facing "people ahead of me" query.
#[must_use]
pub fn position(tickets: &[Ticket], number: TicketNumber) -> usize {
    tickets
        .iter()
        .filter(|t| t.status == TicketStatus::Waiting && t.number < number)
        .count()
}
