use diesel::prelude::*;

use crate::schema::{events, events_relays, nip11_blocks, nip66_blocks, relay_metadata, relays, service_state};

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = relays)]
pub struct RelayRow {
    pub url: String,
    pub network: String,
    pub inserted_at: i64,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = events)]
pub struct EventRow {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: i64,
    pub tags: serde_json::Value,
    pub content: String,
    pub sig: String,
    pub inserted_at: i64,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = events_relays)]
pub struct EventRelayRow {
    pub event_id: String,
    pub relay_url: String,
    pub seen_at: i64,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = nip11_blocks)]
pub struct Nip11Row {
    pub hash: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = nip66_blocks)]
pub struct Nip66Row {
    pub hash: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = relay_metadata)]
pub struct RelayMetadataRow {
    pub relay_url: String,
    pub generated_at: i64,
    pub nip11_hash: Option<String>,
    pub nip66_hash: Option<String>,
}

#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = service_state)]
pub struct ServiceStateRow {
    pub service_name: String,
    pub state: serde_json::Value,
    pub updated_at: i64,
}
