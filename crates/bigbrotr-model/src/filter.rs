use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A REQ filter, restricted to the keys the synchronization engine actually issues:
/// `ids`, `authors`, `kinds`, `since`, `until`, `limit`, and single-letter tag filters
/// (`"#e"`, `"#p"`, ...). Any other key present in a `from_dict` source is silently dropped —
/// the engine never needs to round-trip an arbitrary filter, only build and narrow its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", flatten)]
    pub tags: BTreeMap<String, Vec<String>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_since(mut self, since: i64) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: i64) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Narrow the filter to a new `until` bound, used by the bisection loop to shrink the
    /// window without reconstructing the rest of the filter.
    pub fn narrowed_to(&self, since: i64, until: i64) -> Self {
        let mut narrowed = self.clone();
        narrowed.since = Some(since);
        narrowed.until = Some(until);
        narrowed
    }

    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("Filter always serializes")
    }

    /// Build a `Filter` from an untyped JSON object, dropping any key this engine does not
    /// recognize (e.g. `search`, `since_iso` — extensions other clients send).
    pub fn from_dict(value: &serde_json::Value) -> Self {
        let mut filter = Filter::default();
        let Some(obj) = value.as_object() else {
            return filter;
        };
        filter.ids = string_array(obj, "ids");
        filter.authors = string_array(obj, "authors");
        filter.kinds = obj.get("kinds").and_then(|v| v.as_array()).map(|arr| {
            arr.iter().filter_map(|v| v.as_u64()).map(|n| n as u32).collect()
        });
        filter.since = obj.get("since").and_then(|v| v.as_i64());
        filter.until = obj.get("until").and_then(|v| v.as_i64());
        filter.limit = obj.get("limit").and_then(|v| v.as_u64()).map(|n| n as u32);
        for (key, value) in obj {
            if key.len() == 2 && key.starts_with('#') {
                if let Some(values) = value.as_array() {
                    let values = values
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(|s| s.to_string())
                        .collect();
                    filter.tags.insert(key.clone(), values);
                }
            }
        }
        filter
    }
}

fn string_array(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<Vec<String>> {
    obj.get(key)?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(|s| s.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrows_since_until_without_touching_other_fields() {
        let filter = Filter::new().with_limit(500).narrowed_to(100, 200);
        assert_eq!(filter.since, Some(100));
        assert_eq!(filter.until, Some(200));
        assert_eq!(filter.limit, Some(500));
    }

    #[test]
    fn drops_unrecognized_keys_on_parse() {
        let value = serde_json::json!({"kinds": [1], "search": "nostr", "#e": ["abc"]});
        let filter = Filter::from_dict(&value);
        assert_eq!(filter.kinds, Some(vec![1]));
        assert_eq!(filter.tags.get("#e"), Some(&vec!["abc".to_string()]));
    }
}
