use thiserror::Error;

/// Errors raised by the fan-out execution fabric itself, as opposed to errors raised by the
/// per-relay job it runs (those are recorded by the [`crate::failure_tracker::FailureTracker`]
/// and logged, never propagated here).
#[derive(Debug, Error)]
pub enum FabricError {
    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),
}
