use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Onion v2/v3 hostname: base32 alphabet, 16-56 chars, `.onion` suffix, optional port.
static ONION_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z2-7]{16,56}\.onion(?::\d{1,5})?$").expect("valid regex"));

/// Transport network a relay is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Clearnet,
    Tor,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clearnet => write!(f, "clearnet"),
            Self::Tor => write!(f, "tor"),
        }
    }
}

/// A Nostr relay, identified by its (normalized) URL.
///
/// Construction is the only place network classification happens; once built, a `Relay`
/// is immutable and its URL is its stable identity (§3 of the spec).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relay {
    pub url: String,
    pub network: Network,
}

impl Relay {
    /// Build a `Relay` from a URL, classifying its network.
    ///
    /// The URL must start with `wss://` or `ws://`; its host is lower-cased before the
    /// onion-host check so `WSS://Foo.ONION` and `wss://foo.onion` classify identically.
    pub fn new(url: impl Into<String>) -> Result<Self, ModelError> {
        let url = url.into();
        if !url.starts_with("wss://") && !url.starts_with("ws://") {
            return Err(ModelError::InvalidRelayUrl(url));
        }
        let network = if ONION_HOST.is_match(&host_and_port(&url)) {
            Network::Tor
        } else {
            Network::Clearnet
        };
        Ok(Self { url, network })
    }

    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({ "url": self.url, "network": self.network.to_string() })
    }

    pub fn from_dict(value: &serde_json::Value) -> Result<Self, ModelError> {
        let url = value
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ModelError::InvalidRelayUrl("<missing url>".to_string()))?;
        Self::new(url)
    }
}

/// Strip the `ws(s)://` scheme and any trailing path, lower-casing what remains.
fn host_and_port(url: &str) -> String {
    let without_scheme = url
        .strip_prefix("wss://")
        .or_else(|| url.strip_prefix("ws://"))
        .unwrap_or(url);
    let host = without_scheme.split('/').next().unwrap_or(without_scheme);
    host.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_onion_relay_as_tor() {
        let relay = Relay::new("wss://abcdefghijklmnop234567.onion").unwrap();
        assert_eq!(relay.network, Network::Tor);
    }

    #[test]
    fn classifies_clearnet_relay() {
        let relay = Relay::new("wss://relay.example.com").unwrap();
        assert_eq!(relay.network, Network::Clearnet);
    }

    #[test]
    fn rejects_non_websocket_scheme() {
        assert!(Relay::new("http://x").is_err());
    }

    #[test]
    fn onion_with_port_is_tor() {
        let relay = Relay::new("wss://abcdefghijklmnop234567.onion:8080").unwrap();
        assert_eq!(relay.network, Network::Tor);
    }

    #[test]
    fn round_trips_through_dict() {
        let relay = Relay::new("wss://relay.example.com").unwrap();
        let back = Relay::from_dict(&relay.to_dict()).unwrap();
        assert_eq!(relay, back);
    }
}
