//! Priority locking for shared board hardware.
//!
//! Several client processes may want to drive the same LED ring at once: a
//! CPU monitor animation, a notification flash, a settings screen preview.
//! This crate arbitrates between them with priority slots and reclaims the
//! locks of clients that crash while holding them.
//!
//! # Components
//!
//! - [`PriorityLock`]: fixed table of priority slots and the dominant lock.
//! - [`LockSupervisor`]: periodic liveness check of lock holders.
//! - [`LockableResource`]: the lock/unlock/admission surface a hardware
//!   service embeds.
//! - [`CallerIdentity`]: resolves bus caller tokens into [`LockOwner`]s.
//!
//! # Concurrency
//!
//! Nothing in this crate is shared between threads. The owning service runs
//! every lock operation and every supervisor tick from a single event loop,
//! so `lock`, `unlock` and ticks are strictly serialised and no internal
//! mutex is needed.

pub mod error;
pub mod identity;
pub mod liveness;
pub mod owner;
pub mod priority;
pub mod resource;
pub mod supervisor;

pub use error::{IdentityError, Result};
pub use identity::{BusIdentity, CallerIdentity, CommandLineSource, StaticIdentity};
pub use liveness::{Liveness, LivenessChecker, ProcessTable};
pub use owner::LockOwner;
pub use priority::PriorityLock;
pub use resource::LockableResource;
pub use supervisor::{LockSupervisor, SupervisorState, TickOutcome};
