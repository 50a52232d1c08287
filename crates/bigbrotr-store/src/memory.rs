use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use bigbrotr_model::{Event, Relay, RelayMetadata};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::{InsertOutcome, Store};

#[derive(Default)]
struct State {
    relays: HashMap<String, Relay>,
    events: HashMap<String, Event>,
    events_relays: HashSet<(String, String)>,
    max_created_at: HashMap<String, i64>,
    metadata: HashMap<String, Vec<RelayMetadata>>,
    nip11_hashes: HashSet<String>,
    nip66_hashes: HashSet<String>,
    service_state: HashMap<String, serde_json::Value>,
}

/// In-process `Store` backed by a single mutex-guarded map, for engine/probe/fabric unit tests.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_relay(&self, relay: &Relay) -> Result<InsertOutcome, StoreError> {
        let mut state = self.state.lock().await;
        if state.relays.contains_key(&relay.url) {
            Ok(InsertOutcome::AlreadyPresent)
        } else {
            state.relays.insert(relay.url.clone(), relay.clone());
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn insert_relay_batch(&self, relays: &[Relay]) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for relay in relays {
            if self.insert_relay(relay).await?.was_inserted() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn insert_event(
        &self,
        event: &Event,
        relay_url: &str,
        seen_at: i64,
    ) -> Result<InsertOutcome, StoreError> {
        let mut state = self.state.lock().await;
        state.events.entry(event.id.clone()).or_insert_with(|| event.clone());
        let key = (event.id.clone(), relay_url.to_string());
        let newly_linked = state.events_relays.insert(key);
        if newly_linked {
            let entry = state
                .max_created_at
                .entry(relay_url.to_string())
                .or_insert(event.created_at);
            if event.created_at > *entry {
                *entry = event.created_at;
            }
        }
        Ok(if newly_linked {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::AlreadyPresent
        })
    }

    async fn insert_event_batch(
        &self,
        events: &[(Event, String, i64)],
    ) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for (event, relay_url, seen_at) in events {
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
        let mut state = self.state.lock().await;
        if let Some(nip11) = &metadata.nip11 {
            state.nip11_hashes.insert(nip11.content_hash());
        }
        if let Some(nip66) = &metadata.nip66 {
            state.nip66_hashes.insert(nip66.content_hash());
        }
        state
            .metadata
            .entry(relay_url.to_string())
            .or_default()
            .push(metadata.clone());
        Ok(())
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
        let mut state = self.state.lock().await;
        let linked: HashSet<String> = state.events_relays.iter().map(|(id, _)| id.clone()).collect();
        let orphans: Vec<String> = state
            .events
            .keys()
            .filter(|id| !linked.contains(*id))
            .cloned()
            .collect();
        for id in &orphans {
            state.events.remove(id);
        }
        Ok(orphans.len() as u64)
    }

    async fn max_seen_at(&self, relay_url: &str) -> Result<Option<i64>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.max_created_at.get(relay_url).copied())
    }

    async fn list_readable_relays(&self) -> Result<Vec<Relay>, StoreError> {
        let state = self.state.lock().await;
        let mut out = Vec::new();
        for (url, snapshots) in &state.metadata {
            if snapshots.last().is_some_and(|m| m.is_readable()) {
                if let Some(relay) = state.relays.get(url) {
                    out.push(relay.clone());
                }
            }
        }
        Ok(out)
    }

    async fn list_relays_needing_metadata(&self, older_than: i64) -> Result<Vec<Relay>, StoreError> {
        let state = self.state.lock().await;
        let mut out = Vec::new();
        for (url, relay) in &state.relays {
            let needs = match state.metadata.get(url).and_then(|v| v.last()) {
                Some(snapshot) => snapshot.generated_at < older_than,
                None => true,
            };
            if needs {
                out.push(relay.clone());
            }
        }
        Ok(out)
    }

    async fn load_service_state(
        &self,
        service_name: &str,
    ) -> Result<Option<serde_json::Value>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.service_state.get(service_name).cloned())
    }

    async fn save_service_state(
        &self,
        service_name: &str,
        state_value: serde_json::Value,
        _updated_at: i64,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.service_state.insert(service_name.to_string(), state_value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigbrotr_model::{build_and_sign, Keys};

    fn sample_event(keys: &Keys, created_at: i64) -> Event {
        build_and_sign(keys, created_at, 1, vec![], "hi", 0, 1).unwrap()
    }

    #[tokio::test]
    async fn inserting_same_relay_twice_is_idempotent() {
        let store = InMemoryStore::new();
        let relay = Relay::new("wss://relay.example.com").unwrap();
        assert_eq!(store.insert_relay(&relay).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert_relay(&relay).await.unwrap(), InsertOutcome::AlreadyPresent);
    }

    #[tokio::test]
    async fn orphan_events_are_deleted_after_their_last_link_is_gone() {
        let store = InMemoryStore::new();
        let keys = Keys::generate();
        let event = sample_event(&keys, 1_700_000_000);
        store.insert_event(&event, "wss://a", 1_700_000_000).await.unwrap();
        {
            let mut state = store.state.lock().await;
            state.events_relays.clear();
        }
        let deleted = store.delete_orphan_events().await.unwrap();
        assert_eq!(deleted, 1);
    }

    #[tokio::test]
    async fn max_seen_at_tracks_the_latest_event_created_at_per_relay() {
        let store = InMemoryStore::new();
        let keys = Keys::generate();
        // `seen_at` (the observation time) is unrelated to the watermark: an event created
        // earlier but observed later must not raise the watermark past a later-created event.
        store
            .insert_event(&sample_event(&keys, 200), "wss://a", 100)
            .await
            .unwrap();
        store
            .insert_event(&sample_event(&keys, 150), "wss://a", 9_999)
            .await
            .unwrap();
        assert_eq!(store.max_seen_at("wss://a").await.unwrap(), Some(200));
    }

    #[tokio::test]
    async fn service_state_round_trips() {
        let store = InMemoryStore::new();
        assert!(store.load_service_state("monitor").await.unwrap().is_none());
        store
            .save_service_state("monitor", serde_json::json!({"cycle": 3}), 1)
            .await
            .unwrap();
        let loaded = store.load_service_state("monitor").await.unwrap().unwrap();
        assert_eq!(loaded["cycle"], 3);
    }
}
