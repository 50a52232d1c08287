use std::net::SocketAddr;

/// Dialing mode for a probe step: direct clearnet connection, or a SOCKS5 proxy for `.onion`
/// relays. This is the production seam named in the archiver's external-interface boundary —
/// the probe never opens a socket without going through it.
pub trait ProxyDialer: Send + Sync {
    /// The `async-wsocket` connection mode to use for WebSocket probe steps.
    fn websocket_mode(&self) -> async_wsocket::ConnectionMode;

    /// A `reqwest::Proxy`, if HTTP requests should be routed through one.
    fn http_proxy(&self) -> Option<reqwest::Proxy>;
}

/// Dial every relay directly; used for clearnet-only deployments or tests.
pub struct DirectDialer;

impl ProxyDialer for DirectDialer {
    fn websocket_mode(&self) -> async_wsocket::ConnectionMode {
        async_wsocket::ConnectionMode::Direct
    }

    fn http_proxy(&self) -> Option<reqwest::Proxy> {
        None
    }
}

/// Route every connection through a local SOCKS5 proxy (typically a Tor daemon), the same
/// pattern `nostr-relay-pool`'s WebSocket transport and `nostr`'s NIP-11 fetcher use.
pub struct Socks5Dialer {
    proxy_addr: SocketAddr,
}

impl Socks5Dialer {
    pub fn new(proxy_addr: SocketAddr) -> Self {
        Self { proxy_addr }
    }
}

impl ProxyDialer for Socks5Dialer {
    fn websocket_mode(&self) -> async_wsocket::ConnectionMode {
        async_wsocket::ConnectionMode::Proxy(self.proxy_addr)
    }

    fn http_proxy(&self) -> Option<reqwest::Proxy> {
        reqwest::Proxy::all(format!("socks5h://{}", self.proxy_addr)).ok()
    }
}

/// Picks direct dialing for clearnet relays and the wrapped SOCKS5 dialer for `.onion` ones,
/// mirroring how the original implementation only ever routes onion URLs through its Tor proxy
/// client.
pub struct NetworkAwareDialer {
    tor: Socks5Dialer,
}

impl NetworkAwareDialer {
    pub fn new(tor_proxy_addr: SocketAddr) -> Self {
        Self {
            tor: Socks5Dialer::new(tor_proxy_addr),
        }
    }

    pub fn dialer_for(&self, network: bigbrotr_model::Network) -> &dyn ProxyDialer {
        match network {
            bigbrotr_model::Network::Tor => &self.tor,
            bigbrotr_model::Network::Clearnet => &DIRECT,
        }
    }
}

static DIRECT: DirectDialer = DirectDialer;
