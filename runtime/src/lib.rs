//! # Waitline Runtime
//!
//! The imperative shell of the Waitline queue engine: store adapters, mode
//! selection and the [`service::QueueService`] facade.
//!
//! ## Components
//!
//! - [`backend`]: the [`backend::LiveBackend`] capability trait the live
//!   adapter calls into (the transport behind it is out of scope)
//! - [`sequence`]: race-safe allocation of the next ticket number per owner
//! - [`live`]: the live adapter, routing the uniform store surface to the
//!   remote authoritative store and refetching full snapshots on change
//! - [`fallback`]: the local simulated store used when the live backend is
//!   unavailable
//! - [`selector`]: the mode selector with its one-directional live-to-
//!   fallback demotion
//! - [`rate_limit`]: the rolling-window creation rate limiter
//! - [`config`]: environment-driven configuration
//! - [`service`]: the facade wiring it all together
//!
//! ## Failure routing
//!
//! Only the adapter layer retries, bounded by the failover policy (once by
//! default), against the fallback store after a demotion; validation,
//! contention and not-found failures surface to the caller untouched.

pub mod backend;
pub mod config;
pub mod fallback;
pub mod live;
pub mod rate_limit;
pub mod selector;
pub mod sequence;
pub mod service;

pub use backend::{BackendFuture, ChangeEvent, ChangeFeed, LiveBackend};
pub use config::QueueConfig;
pub use fallback::FallbackStore;
pub use live::LiveStore;
pub use selector::{Mode, ModeSelector};
pub use sequence::SequenceAllocator;
pub use service::QueueService;
