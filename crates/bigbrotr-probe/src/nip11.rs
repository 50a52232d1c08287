use std::time::Duration;

use bigbrotr_model::Nip11Info;

use crate::proxy::ProxyDialer;

/// Fetch a relay's NIP-11 information document, trying `https://` first and falling back to
/// `http://` only if the https attempt does not yield a usable response, matching
/// `fetch_nip11_metadata`'s scheme order in the original implementation.
pub async fn fetch_nip11(
    relay_url: &str,
    dialer: &dyn ProxyDialer,
    timeout: Duration,
) -> Option<Nip11Info> {
    let host_and_path = relay_url
        .strip_prefix("wss://")
        .or_else(|| relay_url.strip_prefix("ws://"))
        .unwrap_or(relay_url);

    for scheme in ["https://", "http://"] {
        let url = format!("{scheme}{host_and_path}");
        if let Some(info) = try_fetch(&url, dialer, timeout).await {
            return Some(info);
        }
    }
    None
}

async fn try_fetch(url: &str, dialer: &dyn ProxyDialer, timeout: Duration) -> Option<Nip11Info> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(proxy) = dialer.http_proxy() {
        builder = builder.proxy(proxy);
    }
    let client = builder.build().ok()?;

    let response = client
        .get(url)
        .header("Accept", "application/nostr+json")
        .send()
        .await
        .ok()?;

    if !response.status().is_success() {
        return None;
    }
    let value: serde_json::Value = response.json().await.ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}
