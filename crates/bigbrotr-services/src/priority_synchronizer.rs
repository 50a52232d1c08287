use std::net::SocketAddr;
use std::time::Duration;

use bigbrotr_engine::EngineConfig;
use bigbrotr_fabric::{FabricConfig, FabricSummary, FanoutScheduler, ShutdownFlag, StoreFactory};
use bigbrotr_model::{Filter, Relay};

use crate::clock::Clock;
use crate::crawl_job::build_crawl_job_factory;
use crate::error::ServiceError;
use crate::logger::Logger;
use crate::loop_util::interruptible_sleep;

/// Tunables for the Priority Synchronizer: same crawl filter/engine/fabric knobs as the
/// Synchronizer, applied to a fixed, caller-supplied relay list instead of a `Store` query.
#[derive(Debug, Clone)]
pub struct PrioritySynchronizerConfig {
    pub interval: Duration,
    pub filter: Filter,
    pub engine: EngineConfig,
    pub fabric: FabricConfig,
    pub tor_proxy_addr: SocketAddr,
}

/// Crawls a fixed, file-pinned set of relays every cycle, bypassing the readable-relay
/// selection the ordinary Synchronizer applies. Mirrors
/// `src/priority_synchronizer.py::PrioritySynchronizer`; parsing `PRIORITY_RELAYS_PATH` itself
/// is the binary crate's job per the external-collaborator boundary — this service only
/// receives the already-parsed `Relay` list.
pub struct PrioritySynchronizerService {
    config: PrioritySynchronizerConfig,
}

impl PrioritySynchronizerService {
    pub fn new(config: PrioritySynchronizerConfig) -> Self {
        Self { config }
    }

    /// Crawl every relay in `priority_relays` once through the fan-out fabric.
    pub async fn run_once(
        &self,
        store_factory: StoreFactory,
        priority_relays: Vec<Relay>,
        clock: &dyn Clock,
        logger: &dyn Logger,
        shutdown: ShutdownFlag,
    ) -> Result<FabricSummary, ServiceError> {
        let now = clock.now_unix();
        logger.info(
            "priority_relays_selected",
            &[("count", &priority_relays.len().to_string())],
        );

        if priority_relays.is_empty() {
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
            scheduler.run(priority_relays, store_factory, job_factory, shutdown)
        })
        .await
        .map_err(|err| ServiceError::WorkerJoin(err.to_string()))?;

        logger.info(
            "priority_synchronizer_pass_complete",
            &[
                ("relays_total", &summary.relays_total.to_string()),
                ("workers_joined", &summary.workers_joined.to_string()),
            ],
        );
        Ok(summary)
    }

    /// Run [`Self::run_once`] every `interval` until `shutdown` is requested, re-crawling the
    /// same fixed `priority_relays` list every cycle.
    pub async fn run_forever(
        &self,
        store_factory: StoreFactory,
        priority_relays: Vec<Relay>,
        clock: &dyn Clock,
        logger: &dyn Logger,
        shutdown: ShutdownFlag,
    ) -> Result<(), ServiceError> {
        while !shutdown.is_requested() {
            self.run_once(
                store_factory.clone(),
                priority_relays.clone(),
                clock,
                logger,
                shutdown.clone(),
            )
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
    use bigbrotr_store::InMemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn crawls_every_relay_in_the_fixed_list_regardless_of_readability() {
        let config = PrioritySynchronizerConfig {
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
        let service = PrioritySynchronizerService::new(config);
        let clock = FixedClock::new(1_000);
        let logger = RecordingLogger::new();
        let store_factory: StoreFactory = Arc::new(|| Arc::new(InMemoryStore::new()));
        let relays = vec![Relay::new("ws://127.0.0.1:1").unwrap()];

        let summary = service
            .run_once(store_factory, relays, &clock, &logger, ShutdownFlag::new())
            .await
            .unwrap();
        assert_eq!(summary.relays_total, 1);
    }

    #[tokio::test]
    async fn empty_priority_list_skips_the_fan_out() {
        let config = PrioritySynchronizerConfig {
            interval: Duration::from_secs(60),
            filter: Filter::default(),
            engine: EngineConfig::default(),
            fabric: FabricConfig::default(),
            tor_proxy_addr: "127.0.0.1:9050".parse().unwrap(),
        };
        let service = PrioritySynchronizerService::new(config);
        let clock = FixedClock::new(1_000);
        let logger = RecordingLogger::new();
        let store_factory: StoreFactory = Arc::new(|| Arc::new(InMemoryStore::new()));

        let summary = service
            .run_once(store_factory, vec![], &clock, &logger, ShutdownFlag::new())
            .await
            .unwrap();
        assert_eq!(summary.relays_total, 0);
        assert_eq!(summary.workers_spawned, 0);
    }
}
