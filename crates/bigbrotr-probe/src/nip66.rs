use std::time::{Duration, Instant};

use async_wsocket::{ConnectionMode, Message};
use bigbrotr_model::{build_and_sign, Event, Keys, Nip66Info};
use futures_util::{SinkExt, StreamExt};

use crate::proxy::ProxyDialer;

const MAX_POW_ATTEMPTS: u64 = 200_000;

/// Run the NIP-66 connectivity/readability/writability checks for one relay URL, trying one
/// transport scheme (`wss://` then `ws://`) until one yields any positive signal, matching
/// `fetch_connection_metadata`'s scheme fallback in the original implementation. Each sub-check
/// opens its own connection so its round-trip time is measured independently.
pub async fn probe_nip66(
    relay_url: &str,
    dialer: &dyn ProxyDialer,
    keys: &Keys,
    min_pow_difficulty: u8,
    timeout: Duration,
) -> Nip66Info {
    let host_and_path = relay_url
        .strip_prefix("wss://")
        .or_else(|| relay_url.strip_prefix("ws://"))
        .unwrap_or(relay_url);

    for scheme in ["wss://", "ws://"] {
        let url = format!("{scheme}{host_and_path}");
        let info = probe_one_scheme(&url, dialer, keys, min_pow_difficulty, timeout).await;
        if info.openable || info.readable || info.writable {
            return info;
        }
    }
    Nip66Info::default()
}

async fn probe_one_scheme(
    url: &str,
    dialer: &dyn ProxyDialer,
    keys: &Keys,
    min_pow_difficulty: u8,
    timeout: Duration,
) -> Nip66Info {
    let mode = dialer.websocket_mode();

    let open_start = Instant::now();
    let openable = tokio::time::timeout(timeout, async_wsocket::connect(url, mode.clone(), timeout))
        .await
        .is_ok_and(|r| r.is_ok());
    let rtt_open_ms = openable.then(|| open_start.elapsed().as_millis() as u64);

    if !openable {
        return Nip66Info {
            openable: false,
            readable: false,
            writable: false,
            rtt_open_ms: None,
            rtt_read_ms: None,
            rtt_write_ms: None,
        };
    }

    let (readable, rtt_read_ms) = check_readable(url, mode.clone(), timeout).await;
    let (writable, rtt_write_ms) =
        check_writable(url, mode, keys, min_pow_difficulty, timeout).await;

    Nip66Info {
        openable,
        readable,
        writable,
        rtt_open_ms,
        rtt_read_ms,
        rtt_write_ms,
    }
}

async fn check_readable(url: &str, mode: ConnectionMode, timeout: Duration) -> (bool, Option<u64>) {
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, async move {
        let mut socket = async_wsocket::connect(url, mode, timeout).await.ok()?;
        let sub_id = "bigbrotr-probe";
        let req = serde_json::json!(["REQ", sub_id, {"limit": 1}]).to_string();
        socket.send(Message::Text(req)).await.ok()?;

        while let Some(Ok(message)) = socket.next().await {
            if let Message::Text(text) = message {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                    match value.get(0).and_then(|v| v.as_str()) {
                        Some("NOTICE") => continue,
                        Some("EVENT") if value.get(1).and_then(|v| v.as_str()) != Some(sub_id) => {
                            continue
                        }
                        Some("EOSE") | Some("EVENT") => return Some(()),
                        Some("CLOSED") => return None,
                        _ => continue,
                    }
                }
            }
        }
        None
    })
    .await;

    match result {
        Ok(Some(())) => (true, Some(start.elapsed().as_millis() as u64)),
        _ => (false, None),
    }
}

async fn check_writable(
    url: &str,
    mode: ConnectionMode,
    keys: &Keys,
    min_pow_difficulty: u8,
    timeout: Duration,
) -> (bool, Option<u64>) {
    let Some(event) = mine_probe_event(keys, url, min_pow_difficulty) else {
        return (false, None);
    };

    let start = Instant::now();
    let result = tokio::time::timeout(timeout, async move {
        let mut socket = async_wsocket::connect(url, mode, timeout).await.ok()?;
        let payload = serde_json::json!(["EVENT", event.to_dict()]).to_string();
        socket.send(Message::Text(payload)).await.ok()?;

        while let Some(Ok(message)) = socket.next().await {
            if let Message::Text(text) = message {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
                    if value.get(0).and_then(|v| v.as_str()) == Some("OK")
                        && value.get(1).and_then(|v| v.as_str()) == Some(event.id.as_str())
                    {
                        return value.get(2).and_then(|v| v.as_bool());
                    }
                }
            }
        }
        None
    })
    .await;

    match result {
        Ok(Some(true)) => (true, Some(start.elapsed().as_millis() as u64)),
        _ => (false, None),
    }
}

/// Build a throwaway NIP-66 monitor-announcement event (kind 30166, a parameterized-replaceable
/// event addressed by its `d` tag) for the writability check, mining a proof of work to the
/// relay's advertised `min_pow_difficulty` if one was reported (0 otherwise, per the probe's
/// difficulty-defaulting rule).
fn mine_probe_event(keys: &Keys, relay_url: &str, min_pow_difficulty: u8) -> Option<Event> {
    let created_at = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    build_and_sign(
        keys,
        created_at,
        30166,
        vec![vec!["d".to_string(), relay_url.to_string()]],
        "{}",
        min_pow_difficulty,
        MAX_POW_ATTEMPTS,
    )
}
