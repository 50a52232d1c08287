use bigbrotr_model::Relay;
use bigbrotr_store::Store;

use crate::error::ServiceError;
use crate::logger::Logger;

/// One-shot seed: insert every relay in `seed_relays` into the store and return how many were
/// newly inserted. Mirrors `src/initializer.py::initializer` — parsing the seed file itself
/// (`RELAYS_SEED_PATH`) is the binary crate's job per §1's external-collaborator boundary; this
/// function only receives already-parsed `Relay`s.
///
/// Never errors on an individual bad relay (the caller is expected to have already dropped
/// unparseable lines while building `seed_relays`); a `Store` failure propagates, since there is
/// nothing sensible to do about a database that will not accept the seed batch.
pub async fn run_initializer(
    store: &dyn Store,
    logger: &dyn Logger,
    seed_relays: Vec<Relay>,
) -> Result<usize, ServiceError> {
    if seed_relays.is_empty() {
        logger.warn("no_valid_relays_to_insert", &[]);
        return Ok(0);
    }
    let inserted = store.insert_relay_batch(&seed_relays).await?;
    logger.info(
        "relays_inserted",
        &[
            ("inserted", &inserted.to_string()),
            ("submitted", &seed_relays.len().to_string()),
        ],
    );
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::RecordingLogger;
    use bigbrotr_store::InMemoryStore;

    #[tokio::test]
    async fn inserts_every_seed_relay() {
        let store = InMemoryStore::new();
        let logger = RecordingLogger::new();
        let relays = vec![
            Relay::new("wss://a.example").unwrap(),
            Relay::new("wss://b.example").unwrap(),
        ];
        let inserted = run_initializer(&store, &logger, relays).await.unwrap();
        assert_eq!(inserted, 2);
    }

    #[tokio::test]
    async fn re_running_with_the_same_seed_inserts_nothing_new() {
        let store = InMemoryStore::new();
        let logger = RecordingLogger::new();
        let relays = vec![Relay::new("wss://a.example").unwrap()];
        run_initializer(&store, &logger, relays.clone()).await.unwrap();
        let second = run_initializer(&store, &logger, relays).await.unwrap();
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn empty_seed_list_logs_a_warning_and_inserts_nothing() {
        let store = InMemoryStore::new();
        let logger = RecordingLogger::new();
        let inserted = run_initializer(&store, &logger, vec![]).await.unwrap();
        assert_eq!(inserted, 0);
        assert!(logger.messages().iter().any(|m| m.contains("no_valid_relays")));
    }
}
