use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] bigbrotr_store::StoreError),

    #[error(transparent)]
    Model(#[from] bigbrotr_model::ModelError),

    /// The blocking task hosting a `FanoutScheduler::run` call panicked or was cancelled.
    #[error("fan-out worker task failed: {0}")]
    WorkerJoin(String),
}
