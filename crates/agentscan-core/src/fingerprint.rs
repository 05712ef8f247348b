//! Filter fingerprints used as pagination cache keys.
//!
//! The fingerprint is a SHA-256 over a canonical JSON rendering of the filter
//! set: object keys sorted, set-valued fields sorted and deduplicated, unset
//! options omitted. Pagination knobs never reach this module, so every page of
//! one listing shares a key.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::AgentFilters;

const KEY_PREFIX: &str = "agents:list";

/// Cache key and content hash for one logical filter set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterFingerprint {
    pub key: String,
    pub hash: String,
}

impl FilterFingerprint {
    pub fn from_filters(filters: &AgentFilters) -> Self {
        let canonical = canonical_json(&canonical_filter_value(filters));
        let hash = hex::encode(Sha256::digest(canonical.as_bytes()));
        Self {
            key: format!("{KEY_PREFIX}:{hash}"),
            hash,
        }
    }
}

fn canonical_filter_value(filters: &AgentFilters) -> Value {
    let filters = filters.normalized();
    let mut object = Map::new();

    let mut chain_ids = filters
        .chain_ids
        .iter()
        .map(|chain| chain.value())
        .collect::<Vec<_>>();
    chain_ids.sort_unstable();
    chain_ids.dedup();
    object.insert("chainIds".into(), Value::from(chain_ids));

    for (name, flag) in [
        ("mcp", filters.mcp),
        ("a2a", filters.a2a),
        ("x402", filters.x402),
        ("active", filters.active),
    ] {
        if let Some(flag) = flag {
            object.insert(name.into(), Value::Bool(flag));
        }
    }

    if let Some(owner) = filters.owner {
        object.insert("owner".into(), Value::String(owner));
    }
    if let Some(name) = filters.name_contains {
        object.insert("nameContains".into(), Value::String(name));
    }
    if !filters.skills.is_empty() {
        object.insert("skills".into(), Value::from(filters.skills));
    }
    if !filters.domains.is_empty() {
        object.insert("domains".into(), Value::from(filters.domains));
    }

    object.insert("sort".into(), Value::from(filters.sort.as_str()));
    object.insert("order".into(), Value::from(filters.order.as_str()));

    Value::Object(object)
}

/// Renders JSON with object keys in sorted order, independent of map implementation.
fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys = map.keys().collect::<Vec<_>>();
            keys.sort_unstable();
            out.push('{');
            for (index, key) in keys.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChainId, SortField, SortOrder};

    #[test]
    fn equivalent_filters_share_a_fingerprint() {
        let left = AgentFilters {
            chain_ids: vec![ChainId::BASE_SEPOLIA, ChainId::SEPOLIA],
            skills: vec!["nlp/summarization".into(), "code/review".into()],
            owner: Some("0xABCDEF".into()),
            mcp: Some(true),
            ..AgentFilters::default()
        };
        let right = AgentFilters {
            mcp: Some(true),
            owner: Some(" 0xabcdef ".into()),
            skills: vec!["code/review".into(), "nlp/summarization".into(), "code/review".into()],
            chain_ids: vec![ChainId::SEPOLIA, ChainId::BASE_SEPOLIA, ChainId::SEPOLIA],
            ..AgentFilters::default()
        };

        assert_eq!(
            FilterFingerprint::from_filters(&left),
            FilterFingerprint::from_filters(&right)
        );
    }

    #[test]
    fn differing_values_change_the_hash() {
        let base = AgentFilters::for_chains([ChainId::SEPOLIA]);
        let with_mcp = base.clone().with_mcp(true);
        let without_mcp = base.clone().with_mcp(false);
        let sorted = base.clone().with_sort(SortField::Name, SortOrder::Asc);

        let hashes = [&base, &with_mcp, &without_mcp, &sorted]
            .map(|filters| FilterFingerprint::from_filters(filters).hash);
        for (i, left) in hashes.iter().enumerate() {
            for right in hashes.iter().skip(i + 1) {
                assert_ne!(left, right);
            }
        }
    }

    #[test]
    fn key_embeds_hash() {
        let fingerprint = FilterFingerprint::from_filters(&AgentFilters::default());
        assert_eq!(fingerprint.hash.len(), 64);
        assert_eq!(fingerprint.key, format!("agents:list:{}", fingerprint.hash));
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let value = serde_json::json!({"b": 1, "a": {"d": [true, null], "c": "x"}});
        assert_eq!(canonical_json(&value), r#"{"a":{"c":"x","d":[true,null]},"b":1}"#);
    }
}
