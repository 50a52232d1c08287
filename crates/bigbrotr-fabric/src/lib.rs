//! Fan-out execution fabric: a process pool → thread pool → cooperative task hierarchy that
//! consumes a shared queue of relays with per-relay rate limiting, timeouts, and graceful
//! shutdown (§4.5 of the specification).
//!
//! Rust collapses the process level into OS threads (see [`scheduler::FabricConfig`]'s doc
//! comment); the [`Store`](bigbrotr_store::Store) ownership, the shared MPMC queue, and the
//! per-relay rate limiting and timeout behavior all carry over unchanged.

pub mod error;
pub mod failure_tracker;
pub mod queue;
pub mod scheduler;
pub mod shutdown;
pub mod worker;

pub use error::FabricError;
pub use failure_tracker::FailureTracker;
pub use queue::RelayQueue;
pub use scheduler::{boxed_job, FabricConfig, FabricSummary, FanoutScheduler, JobFactory, StoreFactory};
pub use shutdown::ShutdownFlag;
pub use worker::{RelayJob, WorkerTunables};
