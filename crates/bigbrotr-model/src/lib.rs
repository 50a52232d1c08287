//! Value types for the Bigbrotr archiver: relays, events, filters, and relay metadata.
//!
//! Everything here is immutable once constructed and free of I/O; persistence, transport, and
//! scheduling concerns live in the other workspace crates.

pub mod error;
pub mod event;
pub mod filter;
pub mod keys;
pub mod relay;
pub mod relay_metadata;

pub use error::ModelError;
pub use event::{build_and_sign, canonical_serialization, Event};
pub use filter::Filter;
pub use keys::{verify_schnorr, Keys};
pub use relay::{Network, Relay};
pub use relay_metadata::{Nip11Info, Nip11Limitation, Nip66Info, RelayMetadata};
