//! Idempotent persistence contract for the Bigbrotr archiver.
//!
//! `Store` is the one interface the Event Synchronization Engine, Relay Probe, and Fan-out
//! Execution Fabric depend on for durability; they never see a connection pool or a SQL
//! statement directly. [`postgres::PostgresStore`] is the production implementation;
//! [`memory::InMemoryStore`] satisfies the same trait for tests.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod retry;
pub mod schema;

use async_trait::async_trait;
use bigbrotr_model::{Event, Relay, RelayMetadata};

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use postgres::{PoolBounds, PostgresStore};
pub use retry::{with_db_retry, RetryPolicy};

/// The result of an idempotent insert: whether this call actually inserted a new row, or found
/// an existing one and left it untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

impl InsertOutcome {
    pub fn was_inserted(self) -> bool {
        matches!(self, InsertOutcome::Inserted)
    }
}

/// Idempotent persistence surface for relays, events, and relay metadata.
///
/// Every insert operation is safe to call twice with the same logical row: a duplicate relay
/// URL, event id, or metadata content hash is recognized and left alone rather than erroring or
/// creating a second copy.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_relay(&self, relay: &Relay) -> Result<InsertOutcome, StoreError>;

    async fn insert_relay_batch(&self, relays: &[Relay]) -> Result<usize, StoreError>;

    /// Record that `event` was seen on `relay_url` at `seen_at`. Idempotent on `event.id`;
    /// a previously unseen `(event_id, relay_url)` pair is always recorded even if the event
    /// itself already existed from a different relay.
    async fn insert_event(
        &self,
        event: &Event,
        relay_url: &str,
        seen_at: i64,
    ) -> Result<InsertOutcome, StoreError>;

    async fn insert_event_batch(
        &self,
        events: &[(Event, String, i64)],
    ) -> Result<usize, StoreError>;

    /// Insert a metadata snapshot, deduplicating the `nip11`/`nip66` blocks independently by
    /// content hash: a block byte-identical to one already stored is referenced, not
    /// re-inserted.
    async fn insert_relay_metadata(
        &self,
        relay_url: &str,
        metadata: &RelayMetadata,
    ) -> Result<(), StoreError>;

    async fn insert_relay_metadata_batch(
        &self,
        items: &[(String, RelayMetadata)],
    ) -> Result<usize, StoreError>;

    /// Delete events with no remaining `events_relays` rows, returning the count removed.
    async fn delete_orphan_events(&self) -> Result<u64, StoreError>;

    /// Latest `created_at` among events ever seen via `relay_url`, used as the engine's resume
    /// watermark. Note this is the event's own timestamp, not `events_relays.seen_at` (the time
    /// the archiver observed it) — a relay can surface an old event at any point in time.
    async fn max_seen_at(&self, relay_url: &str) -> Result<Option<i64>, StoreError>;

    /// Relays whose most recent metadata snapshot reports `nip66.readable == true`.
    async fn list_readable_relays(&self) -> Result<Vec<Relay>, StoreError>;

    /// Relays with no metadata snapshot, or whose latest snapshot is older than `older_than`
    /// (a unix timestamp).
    async fn list_relays_needing_metadata(&self, older_than: i64) -> Result<Vec<Relay>, StoreError>;

    async fn load_service_state(
        &self,
        service_name: &str,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    async fn save_service_state(
        &self,
        service_name: &str,
        state: serde_json::Value,
        updated_at: i64,
    ) -> Result<(), StoreError>;
}
