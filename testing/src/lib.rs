//! Test doubles for the waitline queue engine.
//!
//! Provides deterministic clocks and an in-memory [`LiveBackend`]
//! implementation with failure injection, so engine behavior (numbering
//! races, failover, subscriptions) can be exercised without a remote store.
//!
//! [`LiveBackend`]: waitline_runtime::LiveBackend

pub mod backend;
pub mod clock;

pub use backend::InMemoryBackend;
pub use clock::{FixedClock, ManualClock};
