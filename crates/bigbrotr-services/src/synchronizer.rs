use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use bigbrotr_fabric::{FabricConfig, FabricSummary, FanoutScheduler, ShutdownFlag, StoreFactory};
use bigbrotr_engine::EngineConfig;
use bigbrotr_model::Filter;
use bigbrotr_store::Store;

use crate::clock::Clock;
use crate::crawl_job::build_crawl_job_factory;
use crate::error::ServiceError;
use crate::logger::Logger;
use crate::loop_util::interruptible_sleep;

/// Tunables for the Synchronizer service: the crawl filter and engine knobs applied to every
/// readable relay, and how often the selection-then-crawl cycle repeats.
#[derive(Debug, Clone)]
pub struct SynchronizerConfig {
    pub interval: Duration,
    pub filter: Filter,
    pub engine: EngineConfig,
    pub fabric: FabricConfig,
    pub tor_proxy_addr: SocketAddr,
}

/// Crawls every relay `Store::list_readable_relays` reports, excluding whatever the Priority
/// Synchronizer already owns. Mirrors `src/synchronizer.py::Synchronizer`.
pub struct SynchronizerService {
    config: SynchronizerConfig,
}

impl SynchronizerService {
    pub fn new(config: SynchronizerConfig) -> Self {
        Self { config }
    }

    /// Select readable relays not in `exclude_urls`, crawl each through the fan-out fabric, and
    /// return the pass summary.
    pub async fn run_once(
        &self,
        store: &dyn Store,
        store_factory: StoreFactory,
        exclude_urls: &HashSet<String>,
        clock: &dyn Clock,
        logger: &dyn Logger,
        shutdown: ShutdownFlag,
    ) -> Result<FabricSummary, ServiceError> {
        let now = clock.now_unix();
        let relays: Vec<_> = store
            .list_readable_relays()
            .await?
            .into_iter()
            .filter(|relay| !exclude_urls.contains(&relay.url))
            .collect();

        logger.info("readable_relays_selected", &[("count", &relays.len().to_string())]);

        if relays.is_empty() {
            return Ok(FabricSummary {
                relays_total: 0,
                workers_spawned: 0,
                workers_joined: 0,
            });
        }

        let job_factory = build_crawl_job_factory(
            self.config.filter.clone(),
            self.config.engine,
            self.config.tor_proxy_addr,
            now,
        );
        let scheduler = FanoutScheduler::new(self.config.fabric);
        let summary = tokio::task::spawn_blocking(move || {
            scheduler.run(relays, store_factory, job_factory, shutdown)
        })
        .await
        .map_err(|err| ServiceError::WorkerJoin(err.to_string()))?;

        logger.info(
            "synchronizer_pass_complete",
            &[
                ("relays_total", &summary.relays_total.to_string()),
                ("workers_joined", &summary.workers_joined.to_string()),
            ],
        );
        Ok(summary)
    }

    /// Run [`Self::run_once`] every `interval` until `shutdown` is requested.
    pub async fn run_forever(
        &self,
        store: &dyn Store,
        store_factory: StoreFactory,
        exclude_urls: &HashSet<String>,
        clock: &dyn Clock,
        logger: &dyn Logger,
        shutdown: ShutdownFlag,
    ) -> Result<(), ServiceError> {
        while !shutdown.is_requested() {
            self.run_once(store, store_factory.clone(), exclude_urls, clock, logger, shutdown.clone())
                .await?;
            if interruptible_sleep(self.config.interval, &shutdown).await {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::logger::RecordingLogger;
    use bigbrotr_model::{Network, Relay, RelayMetadata};
    use bigbrotr_store::InMemoryStore;
    use std::sync::Arc;

    async fn mark_readable(store: &InMemoryStore, url: &str) {
        let relay = Relay {
            url: url.to_string(),
            network: Network::Clearnet,
        };
        store.insert_relay(&relay).await.unwrap();
        let metadata = RelayMetadata {
            generated_at: 0,
            nip11: None,
            nip66: Some(bigbrotr_model::Nip66Info {
                openable: true,
                readable: true,
                writable: false,
                rtt_open_ms: None,
                rtt_read_ms: None,
                rtt_write_ms: None,
            }),
        };
        store.insert_relay_metadata(url, &metadata).await.unwrap();
    }

    #[tokio::test]
    async fn excludes_relays_reserved_for_the_priority_synchronizer() {
        let store = InMemoryStore::new();
        mark_readable(&store, "wss://general.example").await;
        mark_readable(&store, "wss://priority.example").await;

        let mut exclude = HashSet::new();
        exclude.insert("wss://priority.example".to_string());

        let config = SynchronizerConfig {
            interval: Duration::from_secs(60),
            filter: Filter::default(),
            engine: EngineConfig::default(),
            fabric: FabricConfig {
                processes: 1,
                threads_per_process: 1,
                tasks_per_thread: 1,
                ..FabricConfig::default()
            },
            tor_proxy_addr: "127.0.0.1:9050".parse().unwrap(),
        };
        let synchronizer = SynchronizerService::new(config);
        let clock = FixedClock::new(1_000);
        let logger = RecordingLogger::new();
        let store_factory: StoreFactory = Arc::new(|| Arc::new(InMemoryStore::new()));

        let summary = synchronizer
            .run_once(&store, store_factory, &exclude, &clock, &logger, ShutdownFlag::new())
            .await
            .unwrap();
        assert_eq!(summary.relays_total, 1);
    }
}
