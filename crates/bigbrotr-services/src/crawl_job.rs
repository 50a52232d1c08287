use std::net::SocketAddr;
use std::sync::Arc;

use bigbrotr_engine::{crawl_relay, EngineConfig, WebSocketRelayConnection};
use bigbrotr_fabric::{boxed_job, JobFactory};
use bigbrotr_model::{Filter, Relay};
use bigbrotr_probe::NetworkAwareDialer;
use bigbrotr_store::Store;

/// Build the per-relay [`JobFactory`] the Synchronizer and Priority Synchronizer both run: open
/// a `WebSocketRelayConnection` (direct or through the Tor SOCKS5 proxy per the relay's
/// `network`) and hand it to [`crawl_relay`] against the thread's own `Store`.
///
/// Shared between both services because they differ only in how they select which relays to
/// queue (§2: readable-relay selection vs. a file-pinned subset), not in how a single relay is
/// crawled once queued.
pub fn build_crawl_job_factory(
    filter: Filter,
    engine_config: EngineConfig,
    tor_proxy_addr: SocketAddr,
    now: i64,
) -> JobFactory {
    let dialer = Arc::new(NetworkAwareDialer::new(tor_proxy_addr));
    Arc::new(move |store: Arc<dyn Store>| {
        let filter = filter.clone();
        let dialer = dialer.clone();
        boxed_job(move |relay: Relay| {
            let filter = filter.clone();
            let dialer = dialer.clone();
            let store = store.clone();
            async move {
                let mode = dialer.dialer_for(relay.network).websocket_mode();
                let mut connection = WebSocketRelayConnection::new(relay.url.clone(), mode);
                crawl_relay(
                    &mut connection,
                    store.as_ref(),
                    &relay.url,
                    &filter,
                    now,
                    &engine_config,
                )
                .await
                .map(|_stats| ())
                .map_err(|err| err.to_string())
            }
        })
    })
}
