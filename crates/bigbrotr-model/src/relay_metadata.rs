use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// NIP-11 relay information document. Known fields are typed; anything else the relay returns
/// is preserved in `extra_fields` rather than discarded, mirroring
/// `parse_nip11_response`'s catch-all in the original implementation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nip11Info {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_nips: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limitation: Option<Nip11Limitation>,
    #[serde(flatten)]
    pub extra_fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nip11Limitation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_subscriptions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_pow_difficulty: Option<u8>,
}

impl Nip11Info {
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::to_string(self).expect("Nip11Info always serializes");
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

/// NIP-66 connectivity/readability/writability measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nip66Info {
    pub openable: bool,
    pub readable: bool,
    pub writable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_open_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_read_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_write_ms: Option<u64>,
}

impl Nip66Info {
    pub fn content_hash(&self) -> String {
        let canonical = serde_json::to_string(self).expect("Nip66Info always serializes");
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}

/// A single probe's outcome for one relay: NIP-11 and NIP-66 blocks, each independently
/// optional. An absent block means the corresponding probe step failed outright (no response,
/// connection refused, timeout) — not a block whose fields are all empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayMetadata {
    pub generated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nip11: Option<Nip11Info>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nip66: Option<Nip66Info>,
}

impl RelayMetadata {
    pub fn new(generated_at: i64) -> Self {
        Self {
            generated_at,
            nip11: None,
            nip66: None,
        }
    }

    /// A relay is readable iff its NIP-66 block is present and reports `readable: true`.
    pub fn is_readable(&self) -> bool {
        self.nip66.as_ref().is_some_and(|n| n.readable)
    }

    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("RelayMetadata always serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_nip66_block_is_not_readable() {
        let metadata = RelayMetadata::new(0);
        assert!(!metadata.is_readable());
    }

    #[test]
    fn readable_flag_reflects_nip66_block() {
        let mut metadata = RelayMetadata::new(0);
        metadata.nip66 = Some(Nip66Info {
            openable: true,
            readable: true,
            writable: false,
            ..Default::default()
        });
        assert!(metadata.is_readable());
    }

    #[test]
    fn content_hash_is_stable_for_equal_blocks() {
        let a = Nip11Info {
            name: Some("relay".to_string()),
            ..Default::default()
        };
        let b = a.clone();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn content_hash_differs_for_different_blocks() {
        let a = Nip11Info {
            name: Some("relay-a".to_string()),
            ..Default::default()
        };
        let b = Nip11Info {
            name: Some("relay-b".to_string()),
            ..Default::default()
        };
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
