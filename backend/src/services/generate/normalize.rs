use serde_json::Value;

/// Replaces empty strings and nulls with a single space, recursively.
///
/// Arrays keep their order and length and objects keep every key, so the
/// renderer still sees exactly which names are present in the payload.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Null => Value::String(" ".to_string()),
        Value::String(text) if text.is_empty() => Value::String(" ".to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, normalize(value)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_and_null_leaves_become_a_space() {
        let data = json!({
            "note": "",
            "missing": null,
            "nested": { "inner": "", "keep": "x" },
            "list": ["", null, "y"],
        });
        assert_eq!(
            normalize(data),
            json!({
                "note": " ",
                "missing": " ",
                "nested": { "inner": " ", "keep": "x" },
                "list": [" ", " ", "y"],
            })
        );
    }

    #[test]
    fn identity_on_non_empty_strings() {
        let data = json!({ "a": "1", "b": ["x", "y"], "c": { "d": "z" } });
        assert_eq!(normalize(data.clone()), data);
    }

    #[test]
    fn other_scalars_pass_through() {
        let data = json!({ "n": 0, "f": -1.25, "t": true, "no": false, "s": " " });
        assert_eq!(normalize(data.clone()), data);
    }

    #[test]
    fn idempotent() {
        let data = json!({
            "a": "",
            "b": [null, "", [], {}, [""]],
            "c": { "d": null, "e": 3 },
        });
        let once = normalize(data);
        assert_eq!(normalize(once.clone()), once);
    }

    #[test]
    fn arrays_keep_length_and_order() {
        let data = json!(["c", "", "a", null, 2, "b"]);
        assert_eq!(normalize(data), json!(["c", " ", "a", " ", 2, "b"]));
    }

    #[test]
    fn keeps_every_key() {
        let data = json!({ "x": null, "y": {} , "z": [] });
        let normalized = normalize(data);
        let keys: Vec<_> = normalized.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|key| ["x", "y", "z"].contains(&key.as_str())));
    }

    #[test]
    fn top_level_scalars() {
        assert_eq!(normalize(json!(null)), json!(" "));
        assert_eq!(normalize(json!("")), json!(" "));
        assert_eq!(normalize(json!("x")), json!("x"));
    }
}
