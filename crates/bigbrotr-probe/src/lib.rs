//! NIP-11 and NIP-66 relay probing.
//!
//! [`Prober::probe`] is the Relay Probe component: it fetches a relay's NIP-11 information
//! document and runs the NIP-66 connectivity/readability/writability checks, combining both
//! into a single [`RelayMetadata`] snapshot.

pub mod error;
pub mod nip11;
pub mod nip66;
pub mod proxy;

use std::time::Duration;

use bigbrotr_model::{Keys, Relay, RelayMetadata};

pub use error::ProbeError;
pub use proxy::{DirectDialer, NetworkAwareDialer, ProxyDialer, Socks5Dialer};

#[derive(Debug, Clone, Copy)]
pub struct ProbeConfig {
    pub nip11_timeout: Duration,
    pub nip66_step_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            nip11_timeout: Duration::from_secs(10),
            nip66_step_timeout: Duration::from_secs(10),
        }
    }
}

pub struct Prober {
    config: ProbeConfig,
    keys: Keys,
}

impl Prober {
    pub fn new(config: ProbeConfig, keys: Keys) -> Self {
        Self { config, keys }
    }

    /// Probe `relay`, dialing through `dialer`. The `generated_at` timestamp is supplied by the
    /// caller (a `Clock` implementation) rather than read from the system clock here, keeping
    /// this crate free of ambient time.
    pub async fn probe(
        &self,
        relay: &Relay,
        dialer: &dyn ProxyDialer,
        generated_at: i64,
    ) -> RelayMetadata {
        let nip11 = nip11::fetch_nip11(&relay.url, dialer, self.config.nip11_timeout).await;
        let min_pow_difficulty = nip11
            .as_ref()
            .and_then(|info| info.limitation.as_ref())
            .and_then(|limitation| limitation.min_pow_difficulty)
            .unwrap_or(0);

        let nip66 = nip66::probe_nip66(
            &relay.url,
            dialer,
            &self.keys,
            min_pow_difficulty,
            self.config.nip66_step_timeout,
        )
        .await;

        RelayMetadata {
            generated_at,
            nip11,
            nip66: Some(nip66),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigbrotr_model::Network;

    #[tokio::test]
    async fn probing_an_unreachable_relay_yields_all_false_nip66() {
        let prober = Prober::new(ProbeConfig::default(), Keys::generate());
        let relay = Relay {
            url: "ws://127.0.0.1:1".to_string(),
            network: Network::Clearnet,
        };
        let metadata = prober.probe(&relay, &DirectDialer, 0).await;
        assert!(metadata.nip11.is_none());
        let nip66 = metadata.nip66.unwrap();
        assert!(!nip66.openable);
        assert!(!nip66.readable);
        assert!(!nip66.writable);
    }
}
