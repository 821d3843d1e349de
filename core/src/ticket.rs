//! Domain types for the Waitline queue engine.
//!
//! A **ticket** is a single visitor's place in a queue, identified by a
//! sequential number unique within its owner and tracked through statuses.
//! An **owner** (e.g. a clinic) has exactly one queue and one number
//! sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifies the queue: one counter and one visible queue per owner.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Creates an `OwnerId` from any string-like value.
    ///
    /// Emptiness is rejected at the service boundary, not here, so that
    /// stores and projections can stay infallible on the type level.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the owner id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty after trimming.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a ticket, assigned once at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Creates a new random `TicketId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `TicketId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A ticket's sequential number, unique within its owner.
///
/// Numbers for a given owner form a contiguous run starting at 1 with no
/// duplicates and no reuse.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TicketNumber(u32);

impl TicketNumber {
    /// The first number handed out for a fresh queue.
    pub const FIRST: Self = Self(1);

    /// Creates a `TicketNumber`.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// The next number in the sequence.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status and priority
// ============================================================================

/// Ticket lifecycle status.
///
/// The reachable edges are defined by [`crate::state_machine`]; no caller
/// may set an arbitrary status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Initial status: holding a place in the queue.
    Waiting,
    /// The number was announced; the visitor is expected at the counter.
    Called,
    /// Service is in progress.
    InService,
    /// Service completed (terminal).
    Done,
    /// Cancelled by the visitor or an operator (terminal).
    Cancelled,
    /// The visitor did not appear after being called (terminal).
    NoShow,
    /// Orthogonal side-state; the prior status is captured for resume.
    Paused,
}

impl TicketStatus {
    /// Whether the ticket shows in the live queue view.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Waiting | Self::Called | Self::InService)
    }

    /// Whether the status has no outgoing edges.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::NoShow)
    }

    /// The wire name of the status (`snake_case`, matching serde).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Called => "called",
            Self::InService => "in_service",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ticket priority, used only for view ordering.
///
/// The state machine never rewrites priority; it is a pure field replacement
/// via the priority-update operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Regular walk-in.
    #[default]
    Normal,
    /// Elevated (e.g. elderly, appointment holders).
    Priority,
    /// Jumps the queue ahead of everything else.
    Emergency,
}

impl Priority {
    /// Ordering weight: higher sorts earlier in the projected queue.
    ///
    /// An unknown priority deserializes as [`Priority::Normal`] because the
    /// enum is closed at the boundary.
    #[must_use]
    pub const fn weight(&self) -> u8 {
        match self {
            Self::Normal => 1,
            Self::Priority => 2,
            Self::Emergency => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Priority => "priority",
            Self::Emergency => "emergency",
        };
        write!(f, "{name}")
    }
}

// ============================================================================
// Ticket entity
// ============================================================================

/// A single visitor's place in a queue.
///
/// Mutated only via the state machine or the pause/resume pair; `id`,
/// `owner_id`, `number` and `created_at` are immutable after creation.
/// Each transition timestamp is set exactly once, the first time the
/// corresponding transition occurs, and never overwritten.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Opaque unique identifier, assigned at creation.
    pub id: TicketId,
    /// The queue this ticket belongs to.
    pub owner_id: OwnerId,
    /// Sequential number, unique within the owner.
    pub number: TicketNumber,
    /// Current lifecycle status.
    pub status: TicketStatus,
    /// View-ordering priority.
    pub priority: Priority,
    /// Optional display name, sanitized before storage.
    pub patient_name: String,
    /// Set once at creation.
    pub created_at: DateTime<Utc>,
    /// First time the ticket entered `called`.
    pub called_at: Option<DateTime<Utc>>,
    /// First time the ticket entered `in_service`.
    pub started_at: Option<DateTime<Utc>>,
    /// First time the ticket entered `done`.
    pub finished_at: Option<DateTime<Utc>>,
    /// First time the ticket entered `paused`.
    pub paused_at: Option<DateTime<Utc>>,
    /// First time the ticket left `paused`.
    pub resumed_at: Option<DateTime<Utc>>,
    /// First time the ticket entered `no_show`.
    pub no_show_at: Option<DateTime<Utc>>,
    /// Status captured when entering `paused`, cleared on resume.
    pub previous_status: Option<TicketStatus>,
}

impl Ticket {
    /// Opens a fresh ticket in `waiting` with no transition timestamps.
    #[must_use]
    pub const fn open(
        id: TicketId,
        owner_id: OwnerId,
        number: TicketNumber,
        patient_name: String,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            number,
            status: TicketStatus::Waiting,
            priority,
            patient_name,
            created_at,
            called_at: None,
            started_at: None,
            finished_at: None,
            paused_at: None,
            resumed_at: None,
            no_show_at: None,
            previous_status: None,
        }
    }
}

// ============================================================================
// Input sanitization
// ============================================================================

/// Sanitizes a display name before storage.
///
/// Drops whole markup tag spans (`<` through the closing `>`, or to the
/// end of input when unmatched) and control characters, bounds the length
/// in characters, and trims surrounding whitespace.
#[must_use]
pub fn sanitize_patient_name(raw: &str, max_chars: usize) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if in_tag || c.is_control() => {}
            _ => cleaned.push(c),
        }
    }
    cleaned
        .chars()
        .take(max_chars)
        .collect::<String>()
        .trim()
        .to_string()
}
