use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket connect failed: {0}")]
    WebSocket(String),

    #[error("probe step timed out")]
    Timeout,

    #[error("relay url invalid: {0}")]
    InvalidUrl(#[from] bigbrotr_model::ModelError),
}
