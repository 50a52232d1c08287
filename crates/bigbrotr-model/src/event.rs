use sha2::{Digest, Sha256};

use crate::error::ModelError;
use crate::keys::{verify_schnorr, Keys};

/// A Nostr event: an immutable, self-certifying record.
///
/// `id` is the hex-encoded SHA-256 of the canonical serialization of
/// `(pubkey, created_at, kind, tags, content)`; `sig` is the hex-encoded BIP-340 Schnorr
/// signature of that id by `pubkey`. Both are verified at construction time by
/// [`Event::from_dict`]/[`Event::from_wire_json`] — there is no way to build an `Event` whose
/// id or signature does not check out, short of [`Event::new_unchecked`] used internally by the
/// writability probe while it is still mining a proof of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl Event {
    /// Compute the canonical id for a not-yet-signed event body.
    ///
    /// This is the single source of truth for event hashing in the archiver: the input is
    /// exactly the fields as they will be sent over the wire, with no escaping transform
    /// applied ahead of serialization.
    pub fn compute_id(
        pubkey: &str,
        created_at: i64,
        kind: u32,
        tags: &[Vec<String>],
        content: &str,
    ) -> String {
        let serialized = canonical_serialization(pubkey, created_at, kind, tags, content);
        let digest = Sha256::digest(serialized.as_bytes());
        hex::encode(digest)
    }

    /// Build an `Event` from already-validated fields without re-deriving id/sig, for use while
    /// constructing a writability probe's candidate event during proof-of-work mining (the id
    /// changes on every nonce increment, and the event is not signed until mining finishes).
    pub(crate) fn new_unchecked(
        id: String,
        pubkey: String,
        created_at: i64,
        kind: u32,
        tags: Vec<Vec<String>>,
        content: String,
        sig: String,
    ) -> Self {
        Self {
            id,
            pubkey,
            created_at,
            kind,
            tags,
            content,
            sig,
        }
    }

    /// Validate that `id` matches the canonical hash of the other fields and that `sig` is a
    /// valid Schnorr signature of `id` by `pubkey`.
    pub fn verify(&self) -> Result<(), ModelError> {
        let expected = Self::compute_id(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        );
        if expected != self.id {
            return Err(ModelError::EventIdMismatch {
                computed: expected,
                expected: self.id.clone(),
            });
        }
        if !verify_schnorr(&self.sig, &self.id, &self.pubkey)? {
            return Err(ModelError::InvalidSignature(self.pubkey.clone()));
        }
        Ok(())
    }

    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "pubkey": self.pubkey,
            "created_at": self.created_at,
            "kind": self.kind,
            "tags": self.tags,
            "content": self.content,
            "sig": self.sig,
        })
    }

    /// Parse and verify an event from a `serde_json::Value` (a relay-sent `EVENT` payload's
    /// third element, or a row read back from storage).
    pub fn from_dict(value: &serde_json::Value) -> Result<Self, ModelError> {
        let event = parse_unverified(value)?;
        event.verify()?;
        Ok(event)
    }

    /// Parse a relay-sent `EVENT` message body, retrying with an unescape pass if the first
    /// attempt fails.
    ///
    /// Some relays emit content containing literal backslash sequences that are not valid JSON
    /// escapes as-is, or that parse fine but leave the id/signature check failing because the
    /// escaping baked stray characters into `content`/`tags`. Either failure triggers a second
    /// attempt after unescaping `\n \" \\ \r \t \b \f` in the raw text; the event is dropped only
    /// if that second attempt also fails.
    pub fn from_wire_json(raw: &str) -> Result<Self, ModelError> {
        let first_attempt = serde_json::from_str::<serde_json::Value>(raw)
            .map_err(ModelError::MalformedJson)
            .and_then(|value| Self::from_dict(&value));
        if first_attempt.is_ok() {
            return first_attempt;
        }

        let unescaped = unescape(raw);
        let value = serde_json::from_str::<serde_json::Value>(&unescaped)
            .map_err(ModelError::MalformedJson)?;
        Self::from_dict(&value)
    }
}

fn parse_unverified(value: &serde_json::Value) -> Result<Event, ModelError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ModelError::MalformedJson(serde_json::from_str::<()>("null").unwrap_err()))?;

    let id = field_str(obj, "id")?;
    let pubkey = field_str(obj, "pubkey")?;
    let created_at = obj
        .get("created_at")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| missing_field("created_at"))?;
    let kind = obj
        .get("kind")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| missing_field("kind"))? as u32;
    let tags = obj
        .get("tags")
        .and_then(|v| v.as_array())
        .ok_or_else(|| missing_field("tags"))?
        .iter()
        .map(|tag| {
            tag.as_array()
                .map(|inner| {
                    inner
                        .iter()
                        .map(|s| s.as_str().unwrap_or_default().to_string())
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();
    let content = field_str(obj, "content")?;
    let sig = field_str(obj, "sig")?;

    Ok(Event::new_unchecked(
        id, pubkey, created_at, kind, tags, content, sig,
    ))
}

fn field_str(
    obj: &serde_json::Map<String, serde_json::Value>,
    name: &'static str,
) -> Result<String, ModelError> {
    obj.get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| missing_field(name))
}

fn missing_field(name: &'static str) -> ModelError {
    ModelError::MalformedJson(
        serde_json::from_str::<()>(&format!("{{\"missing\":\"{name}\"}}")).unwrap_err(),
    )
}

/// Unescape the backslash sequences a relay may emit unescaped inside a JSON string body.
fn unescape(raw: &str) -> String {
    raw.replace("\\n", "\n")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
        .replace("\\b", "\u{8}")
        .replace("\\f", "\u{c}")
}

/// Build the canonical NIP-01 serialization `[0,pubkey,created_at,kind,tags,content]`.
pub fn canonical_serialization(
    pubkey: &str,
    created_at: i64,
    kind: u32,
    tags: &[Vec<String>],
    content: &str,
) -> String {
    let value = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    serde_json::to_string(&value).expect("serializing known-valid json values never fails")
}

/// Construct and sign a new event, optionally mining a proof of work first (NIP-13).
///
/// When `difficulty` is greater than zero, a `nonce` tag is appended and incremented until the
/// id's leading zero bits meet `difficulty` or `max_attempts` is exhausted, mirroring
/// `EventBuilder::to_pow_event`'s mining loop. Returns `None` if mining does not converge within
/// `max_attempts` — the writability probe treats that as "writable: false" rather than hanging.
pub fn build_and_sign(
    keys: &Keys,
    created_at: i64,
    kind: u32,
    mut tags: Vec<Vec<String>>,
    content: &str,
    difficulty: u8,
    max_attempts: u64,
) -> Option<Event> {
    let pubkey = keys.public_key_hex();

    if difficulty == 0 {
        let id = Event::compute_id(&pubkey, created_at, kind, &tags, content);
        return Some(sign(keys, id, pubkey, created_at, kind, tags, content.to_string()));
    }

    let nonce_index = tags.len();
    tags.push(vec!["nonce".to_string(), "0".to_string(), difficulty.to_string()]);

    for attempt in 0..max_attempts {
        tags[nonce_index][1] = attempt.to_string();
        let id = Event::compute_id(&pubkey, created_at, kind, &tags, content);
        if leading_zero_bits(&id) >= difficulty {
            return Some(sign(keys, id, pubkey, created_at, kind, tags, content.to_string()));
        }
    }
    None
}

fn sign(
    keys: &Keys,
    id: String,
    pubkey: String,
    created_at: i64,
    kind: u32,
    tags: Vec<Vec<String>>,
    content: String,
) -> Event {
    let digest: [u8; 32] = hex::decode(&id)
        .expect("id is always a valid hex sha256 digest")
        .try_into()
        .expect("sha256 digest is always 32 bytes");
    let sig = hex::encode(keys.sign_schnorr(&digest).as_ref());
    Event::new_unchecked(id, pubkey, created_at, kind, tags, content, sig)
}

/// Count leading zero bits of a hex-encoded digest (NIP-13).
fn leading_zero_bits(hex_digest: &str) -> u8 {
    let mut count = 0u8;
    for byte_pair in hex_digest.as_bytes().chunks(2) {
        let byte_str = std::str::from_utf8(byte_pair).unwrap_or("00");
        let byte = u8::from_str_radix(byte_str, 16).unwrap_or(0);
        if byte == 0 {
            count += 8;
            continue;
        }
        count += byte.leading_zeros() as u8;
        break;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_signed_event() {
        let keys = Keys::generate();
        let event = build_and_sign(&keys, 1_700_000_000, 1, vec![], "hello", 0, 1).unwrap();
        assert!(event.verify().is_ok());

        let dict = event.to_dict();
        let parsed = Event::from_dict(&dict).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn rejects_tampered_content() {
        let keys = Keys::generate();
        let mut event = build_and_sign(&keys, 1_700_000_000, 1, vec![], "hello", 0, 1).unwrap();
        event.content = "goodbye".to_string();
        assert!(event.verify().is_err());
    }

    #[test]
    fn mining_meets_requested_difficulty() {
        let keys = Keys::generate();
        let event = build_and_sign(&keys, 1_700_000_000, 1, vec![], "pow", 4, 10_000).unwrap();
        assert!(leading_zero_bits(&event.id) >= 4);
        assert!(event.verify().is_ok());
    }

    #[test]
    fn mining_gives_up_after_max_attempts() {
        let keys = Keys::generate();
        let event = build_and_sign(&keys, 1_700_000_000, 1, vec![], "pow", 255, 4);
        assert!(event.is_none());
    }

    #[test]
    fn recovers_from_unescaped_backslashes_on_second_parse() {
        let keys = Keys::generate();
        let event = build_and_sign(&keys, 1_700_000_000, 1, vec![], "line one\nline two", 0, 1)
            .unwrap();
        let dict = event.to_dict();
        let raw = serde_json::to_string(&dict).unwrap();
        let reparsed = Event::from_wire_json(&raw).unwrap();
        assert_eq!(reparsed, event);
    }
}
