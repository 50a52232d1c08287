use async_trait::async_trait;
use bigbrotr_model::{Event, Relay, RelayMetadata};
use deadpool::managed::Pool;
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::Object as PooledConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use crate::error::{classify, StoreError};
use crate::model::{EventRelayRow, EventRow, Nip11Row, Nip66Row, RelayMetadataRow, RelayRow, ServiceStateRow};
use crate::schema::{events, events_relays, nip11_blocks, nip66_blocks, relay_metadata, relays, service_state};
use crate::{InsertOutcome, Store};

type PgPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Postgres-backed `Store`, pooled with `deadpool` the same way `nostr-postgresdb::NostrPostgres`
/// pools its connections.
pub struct PostgresStore {
    pool: PgPool,
}

/// Connection pool bounds, pinned from `DB_POOL_MIN_SIZE_PER_WORKER` /
/// `DB_POOL_MAX_SIZE_PER_WORKER` / `DB_POOL_ACQUIRE_TIMEOUT` in the original constants module.
/// Each fan-out worker thread owns one pool sized to these bounds.
#[derive(Debug, Clone, Copy)]
pub struct PoolBounds {
    pub min_size: usize,
    pub max_size: usize,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolBounds {
    fn default() -> Self {
        Self {
            min_size: 2,
            max_size: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl PostgresStore {
    pub fn connect(database_url: &str, bounds: PoolBounds) -> Result<Self, StoreError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = Pool::builder(manager)
            .max_size(bounds.max_size)
            .build()
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<PooledConnection<AsyncPgConnection>, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_relay(&self, relay: &Relay) -> Result<InsertOutcome, StoreError> {
        let mut conn = self.conn().await?;
        let row = RelayRow {
            url: relay.url.clone(),
            network: relay.network.to_string(),
            inserted_at: now(),
        };
        let affected = diesel::insert_into(relays::table)
            .values(&row)
            .on_conflict(relays::url)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(classify)?;
        Ok(outcome(affected))
    }

    async fn insert_relay_batch(&self, relays_in: &[Relay]) -> Result<usize, StoreError> {
        let mut conn = self.conn().await?;
        let now = now();
        let rows: Vec<RelayRow> = relays_in
            .iter()
            .map(|r| RelayRow {
                url: r.url.clone(),
                network: r.network.to_string(),
                inserted_at: now,
            })
            .collect();
        let affected = diesel::insert_into(relays::table)
            .values(&rows)
            .on_conflict(relays::url)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(classify)?;
        Ok(affected)
    }

    async fn insert_event(
        &self,
        event: &Event,
        relay_url: &str,
        seen_at: i64,
    ) -> Result<InsertOutcome, StoreError> {
        let mut conn = self.conn().await?;
        let event = event.clone();
        let relay_url = relay_url.to_string();
        let outcome = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                let event = event.clone();
                let relay_url = relay_url.clone();
                Box::pin(async move {
                    let event_row = EventRow {
                        id: event.id.clone(),
                        pubkey: event.pubkey.clone(),
                        created_at: event.created_at,
                        kind: event.kind as i64,
                        tags: serde_json::to_value(&event.tags).unwrap_or_default(),
                        content: event.content.clone(),
                        sig: event.sig.clone(),
                        inserted_at: seen_at,
                    };
                    diesel::insert_into(events::table)
                        .values(&event_row)
                        .on_conflict(events::id)
                        .do_nothing()
                        .execute(conn)
                        .await?;

                    let link_row = EventRelayRow {
                        event_id: event.id.clone(),
                        relay_url,
                        seen_at,
                    };
                    let linked = diesel::insert_into(events_relays::table)
                        .values(&link_row)
                        .on_conflict((events_relays::event_id, events_relays::relay_url))
                        .do_nothing()
                        .execute(conn)
                        .await?;
                    Ok(linked)
                })
            })
            .await
            .map_err(classify)?;
        Ok(outcome_from(outcome))
    }

    async fn insert_event_batch(
        &self,
        events_in: &[(Event, String, i64)],
    ) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for (event, relay_url, seen_at) in events_in {
            if self.insert_event(event, relay_url, *seen_at).await?.was_inserted() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_relay_metadata(
        &self,
        relay_url: &str,
        metadata: &RelayMetadata,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let relay_url = relay_url.to_string();
        let metadata = metadata.clone();
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let relay_url = relay_url.clone();
            let metadata = metadata.clone();
            Box::pin(async move {
                let nip11_hash = if let Some(nip11) = &metadata.nip11 {
                    let hash = nip11.content_hash();
                    diesel::insert_into(nip11_blocks::table)
                        .values(&Nip11Row {
                            hash: hash.clone(),
                            data: serde_json::to_value(nip11).unwrap_or_default(),
                        })
                        .on_conflict(nip11_blocks::hash)
                        .do_nothing()
                        .execute(conn)
                        .await?;
                    Some(hash)
                } else {
                    None
                };

                let nip66_hash = if let Some(nip66) = &metadata.nip66 {
                    let hash = nip66.content_hash();
                    diesel::insert_into(nip66_blocks::table)
                        .values(&Nip66Row {
                            hash: hash.clone(),
                            data: serde_json::to_value(nip66).unwrap_or_default(),
                        })
                        .on_conflict(nip66_blocks::hash)
                        .do_nothing()
                        .execute(conn)
                        .await?;
                    Some(hash)
                } else {
                    None
                };

                diesel::insert_into(relay_metadata::table)
                    .values(&RelayMetadataRow {
                        relay_url,
                        generated_at: metadata.generated_at,
                        nip11_hash,
                        nip66_hash,
                    })
                    .on_conflict((relay_metadata::relay_url, relay_metadata::generated_at))
                    .do_nothing()
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .await
        .map_err(classify)
    }

    async fn insert_relay_metadata_batch(
        &self,
        items: &[(String, RelayMetadata)],
    ) -> Result<usize, StoreError> {
        for (relay_url, metadata) in items {
            self.insert_relay_metadata(relay_url, metadata).await?;
        }
        Ok(items.len())
    }

    async fn delete_orphan_events(&self) -> Result<u64, StoreError> {
        let mut conn = self.conn().await?;
        let affected = diesel::sql_query(
            "DELETE FROM events WHERE id NOT IN (SELECT event_id FROM events_relays)",
        )
        .execute(&mut conn)
        .await
        .map_err(classify)?;
        Ok(affected as u64)
    }

    async fn max_seen_at(&self, relay_url: &str) -> Result<Option<i64>, StoreError> {
        use diesel::dsl::max;
        let mut conn = self.conn().await?;
        events_relays::table
            .inner_join(events::table.on(events_relays::event_id.eq(events::id)))
            .filter(events_relays::relay_url.eq(relay_url))
            .select(max(events::created_at))
            .first::<Option<i64>>(&mut conn)
            .await
            .map_err(classify)
    }

    async fn list_readable_relays(&self) -> Result<Vec<Relay>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<(String, Option<serde_json::Value>)> = relay_metadata::table
            .inner_join(relays::table.on(relay_metadata::relay_url.eq(relays::url)))
            .left_join(nip66_blocks::table.on(relay_metadata::nip66_hash.eq(nip66_blocks::hash.nullable())))
            .select((relays::url, nip66_blocks::data.nullable()))
            .load(&mut conn)
            .await
            .map_err(classify)?;

        let mut out = Vec::new();
        for (url, data) in rows {
            let readable = data
                .and_then(|v| v.get("readable").and_then(|r| r.as_bool()))
                .unwrap_or(false);
            if readable {
                if let Ok(relay) = Relay::new(url) {
                    out.push(relay);
                }
            }
        }
        Ok(out)
    }

    async fn list_relays_needing_metadata(&self, older_than: i64) -> Result<Vec<Relay>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<(String, Option<i64>)> = relays::table
            .left_join(
                relay_metadata::table.on(relay_metadata::relay_url
                    .eq(relays::url)
                    .and(relay_metadata::generated_at.eq_any(
                        relay_metadata::table
                            .select(diesel::dsl::max(relay_metadata::generated_at))
                            .group_by(relay_metadata::relay_url),
                    ))),
            )
            .select((relays::url, relay_metadata::generated_at.nullable()))
            .load(&mut conn)
            .await
            .map_err(classify)?;

        let mut out = Vec::new();
        for (url, generated_at) in rows {
            let needs = generated_at.map(|t| t < older_than).unwrap_or(true);
            if needs {
                if let Ok(relay) = Relay::new(url) {
                    out.push(relay);
                }
            }
        }
        Ok(out)
    }

    async fn load_service_state(
        &self,
        service_name: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let mut conn = self.conn().await?;
        let row: Option<ServiceStateRow> = service_state::table
            .find(service_name)
            .first(&mut conn)
            .await
            .optional()
            .map_err(classify)?;
        Ok(row.map(|r| r.state))
    }

    async fn save_service_state(
        &self,
        service_name: &str,
        state: serde_json::Value,
        updated_at: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let row = ServiceStateRow {
            service_name: service_name.to_string(),
            state,
            updated_at,
        };
        diesel::insert_into(service_state::table)
            .values(&row)
            .on_conflict(service_state::service_name)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

fn outcome(affected: usize) -> InsertOutcome {
    outcome_from(affected)
}

fn outcome_from(affected: usize) -> InsertOutcome {
    if affected > 0 {
        InsertOutcome::Inserted
    } else {
        InsertOutcome::AlreadyPresent
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
