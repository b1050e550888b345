use crate::domain::model::StructuredValue;
use regex::Regex;
use std::sync::OnceLock;

static INVALID_KEY_CHARS: OnceLock<Regex> = OnceLock::new();

fn invalid_key_chars() -> &'static Regex {
    INVALID_KEY_CHARS.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]").unwrap())
}

/// Replaces every character outside `[A-Za-z0-9_]` with `_` so the key can be
/// used as a markup element name.
pub fn sanitize_key(key: &str) -> String {
    invalid_key_chars().replace_all(key, "_").into_owned()
}

/// Sanitizes the keys of a top-level mapping. Only the first level is
/// rewritten; nested mappings keep their keys as submitted. When two keys
/// collapse to the same name the later value wins and keeps the earlier slot.
pub fn sanitize_keys(value: StructuredValue) -> StructuredValue {
    match value {
        StructuredValue::Mapping(map) => StructuredValue::Mapping(
            map.into_iter()
                .map(|(key, child)| (sanitize_key(&key), child))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn value(json: serde_json::Value) -> StructuredValue {
        StructuredValue::from(json)
    }

    #[test]
    fn test_sanitize_replaces_invalid_characters() {
        assert_eq!(
            sanitize_keys(value(json!({"a b": 1}))),
            value(json!({"a_b": 1}))
        );
    }

    #[test]
    fn test_sanitize_is_shallow() {
        assert_eq!(
            sanitize_keys(value(json!({"a-b.c": {"x y": 1}}))),
            value(json!({"a_b_c": {"x y": 1}}))
        );
    }

    #[test]
    fn test_sanitize_keeps_valid_keys_and_order() {
        let sanitized = sanitize_keys(value(json!({"z_1": 1, "ok": 2, "né": 3})));
        let keys: Vec<&String> = sanitized.as_mapping().unwrap().keys().collect();
        assert_eq!(keys, ["z_1", "ok", "n_"]);
    }

    #[test]
    fn test_sanitize_passes_sequences_and_scalars_through() {
        let seq = value(json!([{"a b": 1}]));
        assert_eq!(sanitize_keys(seq.clone()), seq);
        assert_eq!(
            sanitize_keys(StructuredValue::Bool(true)),
            StructuredValue::Bool(true)
        );
    }

    #[test]
    fn test_sanitize_collision_later_value_wins() {
        let sanitized = sanitize_keys(value(json!({"a b": 1, "a-b": 2})));
        assert_eq!(sanitized, value(json!({"a_b": 2})));
    }
}
