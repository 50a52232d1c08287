use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bigbrotr_fabric::{boxed_job, FabricConfig, FabricSummary, FanoutScheduler, JobFactory, ShutdownFlag, StoreFactory};
use bigbrotr_model::{Keys, Relay};
use bigbrotr_probe::{NetworkAwareDialer, ProbeConfig, Prober};
use bigbrotr_store::Store;

use crate::clock::Clock;
use crate::error::ServiceError;
use crate::logger::Logger;
use crate::loop_util::interruptible_sleep;

/// Tunables for the Monitor service: how stale a relay's metadata has to be before it is
/// re-probed, how often the loop wakes, and the probe/fan-out knobs it hands down.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub staleness: Duration,
    pub probe: ProbeConfig,
    pub fabric: FabricConfig,
    pub tor_proxy_addr: SocketAddr,
}

/// Selects relays whose metadata is missing or stale and re-probes them through the fan-out
/// fabric. Mirrors `src/monitor.py::Monitor` — the one service that writes NIP-11/NIP-66
/// snapshots rather than events.
pub struct MonitorService {
    config: MonitorConfig,
    keys: Keys,
}

impl MonitorService {
    pub fn new(config: MonitorConfig, keys: Keys) -> Self {
        Self { config, keys }
    }

    /// Probe every relay needing fresh metadata once, returning the fan-out summary. Selection
    /// reads through `store`; the fan-out itself gets a fresh `Store` per worker thread from
    /// `store_factory`, per the one-pool-per-thread rule the fabric enforces.
    pub async fn run_once(
        &self,
        store: &dyn Store,
        store_factory: StoreFactory,
        clock: &dyn Clock,
        logger: &dyn Logger,
        shutdown: ShutdownFlag,
    ) -> Result<FabricSummary, ServiceError> {
        let now = clock.now_unix();
        let older_than = now - self.config.staleness.as_secs() as i64;
        let relays = store.list_relays_needing_metadata(older_than).await?;
        logger.info(
            "relays_needing_metadata",
            &[("count", &relays.len().to_string())],
        );

        if relays.is_empty() {
            return Ok(FabricSummary {
                relays_total: 0,
                workers_spawned: 0,
                workers_joined: 0,
            });
        }

        let job_factory = self.build_job_factory(now);
        let scheduler = FanoutScheduler::new(self.config.fabric);
        let summary = tokio::task::spawn_blocking(move || {
            scheduler.run(relays, store_factory, job_factory, shutdown)
        })
        .await
        .map_err(|err| ServiceError::WorkerJoin(err.to_string()))?;

        logger.info(
            "monitor_pass_complete",
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
        clock: &dyn Clock,
        logger: &dyn Logger,
        shutdown: ShutdownFlag,
    ) -> Result<(), ServiceError> {
        while !shutdown.is_requested() {
            self.run_once(store, store_factory.clone(), clock, logger, shutdown.clone())
                .await?;
            if interruptible_sleep(self.config.interval, &shutdown).await {
                break;
            }
        }
        Ok(())
    }

    fn build_job_factory(&self, now: i64) -> JobFactory {
        let prober = Arc::new(Prober::new(self.config.probe, self.keys.clone()));
        let dialer = Arc::new(NetworkAwareDialer::new(self.config.tor_proxy_addr));
        Arc::new(move |store: Arc<dyn Store>| {
            let prober = prober.clone();
            let dialer = dialer.clone();
            boxed_job(move |relay: Relay| {
                let prober = prober.clone();
                let dialer = dialer.clone();
                let store = store.clone();
                async move {
                    let metadata = prober
                        .probe(&relay, dialer.dialer_for(relay.network), now)
                        .await;
                    store
                        .insert_relay_metadata(&relay.url, &metadata)
                        .await
                        .map_err(|err| err.to_string())
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::logger::RecordingLogger;
    use bigbrotr_store::InMemoryStore;

    #[tokio::test]
    async fn skips_the_fan_out_entirely_when_nothing_needs_probing() {
        let store = InMemoryStore::new();
        let config = MonitorConfig {
            interval: Duration::from_secs(60),
            staleness: Duration::from_secs(3600),
            probe: ProbeConfig::default(),
            fabric: FabricConfig::default(),
            tor_proxy_addr: "127.0.0.1:9050".parse().unwrap(),
        };
        let monitor = MonitorService::new(config, Keys::generate());
        let clock = FixedClock::new(1_000);
        let logger = RecordingLogger::new();
        let store_factory: StoreFactory = Arc::new(|| Arc::new(InMemoryStore::new()));

        let summary = monitor
            .run_once(&store, store_factory, &clock, &logger, ShutdownFlag::new())
            .await
            .unwrap();
        assert_eq!(summary.relays_total, 0);
    }

    #[tokio::test]
    async fn probes_every_relay_missing_metadata() {
        let store = InMemoryStore::new();
        let relay = Relay::new("ws://127.0.0.1:1").unwrap();
        store.insert_relay(&relay).await.unwrap();

        let config = MonitorConfig {
            interval: Duration::from_secs(60),
            staleness: Duration::from_secs(3600),
            probe: ProbeConfig::default(),
            fabric: FabricConfig {
                processes: 1,
                threads_per_process: 1,
                tasks_per_thread: 1,
                ..FabricConfig::default()
            },
            tor_proxy_addr: "127.0.0.1:9050".parse().unwrap(),
        };
        let monitor = MonitorService::new(config, Keys::generate());
        let clock = FixedClock::new(1_000);
        let logger = RecordingLogger::new();
        let store_factory: StoreFactory = Arc::new(|| Arc::new(InMemoryStore::new()));

        let summary = monitor
            .run_once(&store, store_factory, &clock, &logger, ShutdownFlag::new())
            .await
            .unwrap();
        assert_eq!(summary.relays_total, 1);
    }
}
