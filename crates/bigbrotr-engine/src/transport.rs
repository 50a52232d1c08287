use std::time::Duration;

use async_trait::async_trait;
use async_wsocket::{ConnectionMode, Message};
use bigbrotr_model::{Event, Filter};
use futures_util::{SinkExt, StreamExt};

use crate::error::EngineError;

/// The wire-protocol seam the engine crawls through: issue a `REQ` for `filter`, collect every
/// `EVENT` until `EOSE`/`CLOSED`, then `CLOSE` the subscription.
///
/// The engine never opens a socket itself — this trait is the interface it depends on, with a
/// single production implementation ([`WebSocketRelayConnection`]) and, in tests, an in-process
/// mock relay.
#[async_trait]
pub trait RelayConnection: Send + Sync {
    async fn fetch(&mut self, filter: &Filter, timeout: Duration) -> Result<Vec<Event>, EngineError>;
}

/// Production `RelayConnection`, speaking the `REQ`/`EVENT`/`EOSE`/`CLOSED`/`CLOSE` subset over
/// a WebSocket opened through `async-wsocket`, the same transport `nostr-relay-pool` uses.
pub struct WebSocketRelayConnection {
    url: String,
    mode: ConnectionMode,
}

impl WebSocketRelayConnection {
    pub fn new(url: impl Into<String>, mode: ConnectionMode) -> Self {
        Self {
            url: url.into(),
            mode,
        }
    }
}

#[async_trait]
impl RelayConnection for WebSocketRelayConnection {
    async fn fetch(&mut self, filter: &Filter, timeout: Duration) -> Result<Vec<Event>, EngineError> {
        tokio::time::timeout(timeout, self.fetch_inner(filter, timeout))
            .await
            .map_err(|_| EngineError::Timeout)?
    }
}

impl WebSocketRelayConnection {
    async fn fetch_inner(
        &mut self,
        filter: &Filter,
        timeout: Duration,
    ) -> Result<Vec<Event>, EngineError> {
        let mut socket = async_wsocket::connect(&self.url, self.mode.clone(), timeout)
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        let sub_id = "bigbrotr-engine";
        let req = serde_json::json!(["REQ", sub_id, filter.to_dict()]).to_string();
        socket
            .send(Message::Text(req))
            .await
            .map_err(|e| EngineError::Connection(e.to_string()))?;

        let mut events = Vec::new();
        while let Some(message) = socket.next().await {
            let message = message.map_err(|e| EngineError::Connection(e.to_string()))?;
            let Message::Text(text) = message else {
                continue;
            };
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                continue;
            };
            match value.get(0).and_then(|v| v.as_str()) {
                Some("EVENT") if value.get(1).and_then(|v| v.as_str()) == Some(sub_id) => {
                    if let Some(event_value) = value.get(2) {
                        let raw = event_value.to_string();
                        match bigbrotr_model::Event::from_wire_json(&raw) {
                            Ok(event) => events.push(event),
                            Err(err) => {
                                tracing::warn!(error = %err, "dropping malformed event");
                            }
                        }
                    }
                }
                Some("EOSE") => break,
                Some("CLOSED") => {
                    let reason = value
                        .get(2)
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    return Err(EngineError::RelayClosed(reason));
                }
                _ => {}
            }
        }

        let close = serde_json::json!(["CLOSE", sub_id]).to_string();
        let _ = socket.send(Message::Text(close)).await;

        Ok(events)
    }
}
