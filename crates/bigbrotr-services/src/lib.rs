//! Service loops that wire the Store, Relay Probe, Event Synchronization Engine, and Fan-out
//! Execution Fabric into the four long-running jobs a Bigbrotr deployment runs: Initializer,
//! Monitor, Synchronizer, Priority Synchronizer.
//!
//! Each service is a plain struct exposing `run_once`/`run_forever`; the binary crate owns
//! process-level concerns (config loading, signal handling, subscriber init) and hands each
//! service its `Store`, `Logger`, and `Clock`.

pub mod clock;
pub mod crawl_job;
pub mod error;
pub mod initializer;
pub mod logger;
pub mod loop_util;
pub mod monitor;
pub mod priority_synchronizer;
pub mod synchronizer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::ServiceError;
pub use initializer::run_initializer;
pub use logger::{Logger, RecordingLogger, TracingLogger};
pub use loop_util::interruptible_sleep;
pub use monitor::{MonitorConfig, MonitorService};
pub use priority_synchronizer::{PrioritySynchronizerConfig, PrioritySynchronizerService};
pub use synchronizer::{SynchronizerConfig, SynchronizerService};
