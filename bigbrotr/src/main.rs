//! Binary entry point wiring the Bigbrotr archiver's service loops to a Postgres-backed store.
//!
//! This crate is deliberately thin per the external-collaborator boundary: it is the only place
//! in the workspace that reads an environment variable, opens a database pool, or installs a
//! signal handler. Everything else lives in the core crates behind the `Store`, `Logger`,
//! `Clock`, and `ProxyDialer` seams.

mod config;
mod relay_file;

use std::sync::Arc;

use bigbrotr_fabric::{ShutdownFlag, StoreFactory};
use bigbrotr_services::{
    run_initializer, MonitorConfig, MonitorService, PrioritySynchronizerConfig,
    PrioritySynchronizerService, SynchronizerConfig, SynchronizerService, SystemClock, TracingLogger,
};
use bigbrotr_store::{PostgresStore, Store};

use crate::config::Config;

fn main() {
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let mode = std::env::args().nth(1).unwrap_or_else(|| "all".to_string());

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(%err, "failed to start tokio runtime");
            std::process::exit(1);
        }
    };

    let exit_code = runtime.block_on(run(config, mode));
    std::process::exit(exit_code);
}

async fn run(config: Config, mode: String) -> i32 {
    let store: Arc<dyn Store> =
        match PostgresStore::connect(&config.database_url, config.pool_bounds) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                tracing::error!(%err, "failed to connect to the store");
                return 1;
            }
        };

    let shutdown = ShutdownFlag::new();
    let shutdown_on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
            shutdown_on_signal.request();
        }
    });

    let logger = TracingLogger;
    let clock = SystemClock;

    let database_url = config.database_url.clone();
    let pool_bounds = config.pool_bounds;
    let store_factory: StoreFactory = Arc::new(move || {
        PostgresStore::connect(&database_url, pool_bounds)
            .map(|store| Arc::new(store) as Arc<dyn Store>)
            .expect("opening a per-worker store pool")
    });

    let result = match mode.as_str() {
        "initializer" => run_initializer_once(&config, store.as_ref(), &logger).await,
        "monitor" => {
            run_monitor(&config, store.as_ref(), store_factory, &clock, &logger, shutdown).await
        }
        "synchronizer" => {
            run_synchronizer(&config, store.as_ref(), store_factory, &clock, &logger, shutdown)
                .await
        }
        "priority-synchronizer" => {
            run_priority_synchronizer(&config, store_factory, &clock, &logger, shutdown).await
        }
        "all" => run_all(&config, store, store_factory, clock, logger, shutdown).await,
        other => {
            tracing::error!(mode = other, "unknown service mode");
            Err(())
        }
    };

    match result {
        Ok(()) => 0,
        Err(()) => 1,
    }
}

async fn run_initializer_once(
    config: &Config,
    store: &dyn Store,
    logger: &TracingLogger,
) -> Result<(), ()> {
    let Some(path) = &config.relays_seed_path else {
        tracing::error!("RELAYS_SEED_PATH is required to run the initializer");
        return Err(());
    };
    let seed_relays = relay_file::load_relay_file(path).map_err(|err| {
        tracing::error!(%err, path = %path, "failed to read the relay seed file");
    })?;
    run_initializer(store, logger, seed_relays)
        .await
        .map(|_| ())
        .map_err(|err| tracing::error!(%err, "initializer failed"))
}

async fn run_monitor(
    config: &Config,
    store: &dyn Store,
    store_factory: StoreFactory,
    clock: &SystemClock,
    logger: &TracingLogger,
    shutdown: ShutdownFlag,
) -> Result<(), ()> {
    let monitor = MonitorService::new(
        MonitorConfig {
            interval: config.monitor_interval,
            staleness: config.monitor_staleness,
            probe: config.probe,
            fabric: config.fabric,
            tor_proxy_addr: config.tor_proxy_addr,
        },
        config.signing_keys.clone(),
    );
    monitor
        .run_forever(store, store_factory, clock, logger, shutdown)
        .await
        .map_err(|err| tracing::error!(%err, "monitor service failed"))
}

async fn run_synchronizer(
    config: &Config,
    store: &dyn Store,
    store_factory: StoreFactory,
    clock: &SystemClock,
    logger: &TracingLogger,
    shutdown: ShutdownFlag,
) -> Result<(), ()> {
    let synchronizer = SynchronizerService::new(SynchronizerConfig {
        interval: config.synchronizer_interval,
        filter: config.filter.clone(),
        engine: config.engine,
        fabric: config.fabric,
        tor_proxy_addr: config.tor_proxy_addr,
    });
    let exclude = match &config.priority_relays_path {
        Some(path) => relay_file::load_relay_file(path)
            .map_err(|err| tracing::error!(%err, path = %path, "failed to read the priority relay file"))?
            .into_iter()
            .map(|relay| relay.url)
            .collect(),
        None => Default::default(),
    };
    synchronizer
        .run_forever(store, store_factory, &exclude, clock, logger, shutdown)
        .await
        .map_err(|err| tracing::error!(%err, "synchronizer service failed"))
}

async fn run_priority_synchronizer(
    config: &Config,
    store_factory: StoreFactory,
    clock: &SystemClock,
    logger: &TracingLogger,
    shutdown: ShutdownFlag,
) -> Result<(), ()> {
    let Some(path) = &config.priority_relays_path else {
        tracing::error!("PRIORITY_RELAYS_PATH is required to run the priority synchronizer");
        return Err(());
    };
    let priority_relays = relay_file::load_relay_file(path)
        .map_err(|err| tracing::error!(%err, path = %path, "failed to read the priority relay file"))?;
    let service = PrioritySynchronizerService::new(PrioritySynchronizerConfig {
        interval: config.priority_synchronizer_interval,
        filter: config.filter.clone(),
        engine: config.engine,
        fabric: config.fabric,
        tor_proxy_addr: config.tor_proxy_addr,
    });
    service
        .run_forever(store_factory, priority_relays, clock, logger, shutdown)
        .await
        .map_err(|err| tracing::error!(%err, "priority synchronizer service failed"))
}

/// Run every service loop concurrently under one shared `shutdown` flag: the Initializer seeds
/// once up front (if a seed path is configured), then Monitor, Synchronizer, and Priority
/// Synchronizer run side by side until shutdown.
async fn run_all(
    config: &Config,
    store: Arc<dyn Store>,
    store_factory: StoreFactory,
    clock: SystemClock,
    logger: TracingLogger,
    shutdown: ShutdownFlag,
) -> Result<(), ()> {
    if let Some(path) = &config.relays_seed_path {
        let seed_relays = relay_file::load_relay_file(path)
            .map_err(|err| tracing::error!(%err, path = %path, "failed to read the relay seed file"))?;
        run_initializer(store.as_ref(), &logger, seed_relays)
            .await
            .map_err(|err| tracing::error!(%err, "initializer failed"))?;
    }

    let priority_relays = match &config.priority_relays_path {
        Some(path) => relay_file::load_relay_file(path)
            .map_err(|err| tracing::error!(%err, path = %path, "failed to read the priority relay file"))?,
        None => Vec::new(),
    };
    let exclude = priority_relays.iter().map(|relay| relay.url.clone()).collect();

    let monitor = MonitorService::new(
        MonitorConfig {
            interval: config.monitor_interval,
            staleness: config.monitor_staleness,
            probe: config.probe,
            fabric: config.fabric,
            tor_proxy_addr: config.tor_proxy_addr,
        },
        config.signing_keys.clone(),
    );
    let synchronizer = SynchronizerService::new(SynchronizerConfig {
        interval: config.synchronizer_interval,
        filter: config.filter.clone(),
        engine: config.engine,
        fabric: config.fabric,
        tor_proxy_addr: config.tor_proxy_addr,
    });
    let priority_synchronizer = PrioritySynchronizerService::new(PrioritySynchronizerConfig {
        interval: config.priority_synchronizer_interval,
        filter: config.filter.clone(),
        engine: config.engine,
        fabric: config.fabric,
        tor_proxy_addr: config.tor_proxy_addr,
    });

    let monitor_result = monitor.run_forever(
        store.as_ref(),
        store_factory.clone(),
        &clock,
        &logger,
        shutdown.clone(),
    );
    let synchronizer_result = synchronizer.run_forever(
        store.as_ref(),
        store_factory.clone(),
        &exclude,
        &clock,
        &logger,
        shutdown.clone(),
    );
    let priority_result = priority_synchronizer.run_forever(
        store_factory,
        priority_relays,
        &clock,
        &logger,
        shutdown.clone(),
    );

    let (monitor_result, synchronizer_result, priority_result) =
        tokio::join!(monitor_result, synchronizer_result, priority_result);

    let mut ok = true;
    for result in [monitor_result, synchronizer_result, priority_result] {
        if let Err(err) = result {
            tracing::error!(%err, "a service loop exited with an error");
            ok = false;
        }
    }
    if ok {
        Ok(())
    } else {
        Err(())
    }
}
