use thiserror::Error;

/// Errors raised while constructing or validating a value type.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("relay url must start with 'wss://' or 'ws://', got: {0}")]
    InvalidRelayUrl(String),

    #[error("event id mismatch: computed {computed}, expected {expected}")]
    EventIdMismatch { computed: String, expected: String },

    #[error("invalid event signature for pubkey {0}")]
    InvalidSignature(String),

    #[error("malformed hex field `{field}`: {source}")]
    InvalidHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },

    #[error("malformed event json: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("secp256k1 error: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}
