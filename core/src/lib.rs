//! # Waitline Core
//!
//! Domain types and pure logic for the Waitline queue engine.
//!
//! Waitline manages numbered service tickets for walk-in queues: a visitor
//! obtains a sequential number, the number advances through a fixed set of
//! service states, and multiple viewers observe the queue in near-real time.
//!
//! This crate holds everything with real correctness hazards, kept free of
//! I/O so it stays deterministic and testable:
//!
//! - **Domain types** ([`ticket`]): tickets, owners, statuses, priorities
//! - **State machine** ([`state_machine`]): validated status transitions
//!   with first-time timestamp stamping
//! - **Projection** ([`projection`]): the ordered, filtered queue view
//! - **Store surface** ([`store`]): the uniform [`store::TicketStore`]
//!   trait implemented by both the live and the fallback adapters
//! - **Errors** ([`error`]): the [`error::QueueError`] taxonomy
//!
//! ## Architecture Principles
//!
//! - Functional core, imperative shell: transitions are *planned* as values
//!   here and *applied* inside a store's critical section
//! - Closed enumerations at the boundary: no stringly-typed statuses
//! - Dependency injection via traits ([`clock::Clock`]) for testability

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod clock;
pub mod error;
pub mod projection;
pub mod state_machine;
pub mod store;
pub mod ticket;

pub use clock::{Clock, SystemClock};
pub use error::QueueError;
pub use store::{NewTicket, QueueSnapshot, QueueSubscription, TicketStore, TicketUpdate};
pub use ticket::{OwnerId, Priority, Ticket, TicketId, TicketNumber, TicketStatus};
