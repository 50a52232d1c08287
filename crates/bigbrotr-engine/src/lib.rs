//! Adaptive time-range bisection crawler: drains a relay of every event matching a filter,
//! working around undocumented per-request result caps by narrowing the requested window
//! whenever a request comes back full.

pub mod error;
pub mod sync;
pub mod transport;

pub use error::EngineError;
pub use sync::{crawl_relay, resume_since, CrawlStats, EngineConfig};
pub use transport::{RelayConnection, WebSocketRelayConnection};
