use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("relay connection failed: {0}")]
    Connection(String),

    #[error("relay request timed out")]
    Timeout,

    #[error("relay closed the subscription: {0}")]
    RelayClosed(String),

    #[error(transparent)]
    Store(#[from] bigbrotr_store::StoreError),
}
