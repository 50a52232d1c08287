use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

/// Errors raised by a `Store` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transient database error, retry may succeed: {0}")]
    Transient(String),

    #[error("permanent database error: {0}")]
    Permanent(String),

    #[error("connection pool exhausted or unavailable: {0}")]
    Pool(String),

    #[error("malformed stored json: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("value type error: {0}")]
    Model(#[from] bigbrotr_model::ModelError),
}

impl StoreError {
    /// True if retrying the same operation has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_) | StoreError::Pool(_))
    }
}

/// Classify a Diesel error as transient or permanent, mirroring
/// `is_transient_db_error`/`is_permanent_db_error` in the original implementation's
/// `db_error_handler` module: connection drops, pool exhaustion, and statement timeouts are
/// transient; constraint violations, syntax errors, and auth failures are permanent.
pub fn classify(err: DieselError) -> StoreError {
    match err {
        DieselError::DatabaseError(kind, info) => match kind {
            DatabaseErrorKind::UniqueViolation
            | DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::CheckViolation
            | DatabaseErrorKind::NotNullViolation => {
                StoreError::Permanent(info.message().to_string())
            }
            DatabaseErrorKind::SerializationFailure | DatabaseErrorKind::ReadOnlyTransaction => {
                StoreError::Transient(info.message().to_string())
            }
            _ => StoreError::Transient(info.message().to_string()),
        },
        DieselError::NotFound => StoreError::Permanent("not found".to_string()),
        DieselError::QueryBuilderError(e) => StoreError::Permanent(e.to_string()),
        DieselError::DeserializationError(e) | DieselError::SerializationError(e) => {
            StoreError::Permanent(e.to_string())
        }
        other => StoreError::Transient(other.to_string()),
    }
}
