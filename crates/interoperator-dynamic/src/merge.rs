use serde_json::Value;

/// merge desired tree into current tree.
///
/// Mappings are merged key by key: keys of `desired` override or add, keys only
/// present in `current` survive. Sequences and scalars are replaced by the
/// desired value. Returns the merged tree and whether it differs from `current`.
pub fn deep_merge(current: &Value, desired: &Value) -> (Value, bool) {
    let merged = merge(current, desired);
    let changed = merged != *current;
    (merged, changed)
}

fn merge(current: &Value, desired: &Value) -> Value {
    match (current, desired) {
        (Value::Object(current_map), Value::Object(desired_map)) => {
            let mut merged = current_map.clone();
            for (key, desired_value) in desired_map {
                let value = match current_map.get(key) {
                    Some(current_value) => merge(current_value, desired_value),
                    None => desired_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Value::Object(merged)
        }
        (_, desired) => desired.clone(),
    }
}

#[cfg(test)]
mod test {

    use serde_json::json;

    use super::deep_merge;

    #[test]
    fn test_preserves_unmentioned_fields() {
        let (merged, changed) = deep_merge(&json!({"a": 1, "b": 2}), &json!({"a": 9}));
        assert_eq!(merged, json!({"a": 9, "b": 2}));
        assert!(changed);
    }

    #[test]
    fn test_identical_inputs() {
        let value = json!({"spec": {"replicas": 2, "tags": ["x"]}});
        let (merged, changed) = deep_merge(&value, &value);
        assert_eq!(merged, value);
        assert!(!changed);
    }

    #[test]
    fn test_subset_is_unchanged() {
        let current = json!({
            "metadata": {"name": "pg", "uid": "1234", "labels": {"a": "b"}},
            "spec": {"replicas": 3, "storage": "1Gi"}
        });
        let desired = json!({"metadata": {"labels": {"a": "b"}}, "spec": {"replicas": 3}});
        let (merged, changed) = deep_merge(&current, &desired);
        assert_eq!(merged, current);
        assert!(!changed);
    }

    #[test]
    fn test_nested_maps_merge_and_sequences_replace() {
        let current = json!({
            "array": [{"foo": "bar", "abc": "def"}],
            "tags": ["foo", "bar"],
            "nested": {"keep": true, "change": 1}
        });
        let desired = json!({
            "array": [{"foo": "bar2", "foo2": "bar2"}],
            "tags": ["foo", "baz"],
            "nested": {"change": 2, "add": "x"}
        });

        let (merged, changed) = deep_merge(&current, &desired);
        assert!(changed);
        assert_eq!(
            merged,
            json!({
                "array": [{"foo": "bar2", "foo2": "bar2"}],
                "tags": ["foo", "baz"],
                "nested": {"keep": true, "change": 2, "add": "x"}
            })
        );
    }

    #[test]
    fn test_type_mismatch_takes_desired() {
        let (merged, changed) = deep_merge(&json!({"a": {"b": 1}}), &json!({"a": "flat"}));
        assert_eq!(merged, json!({"a": "flat"}));
        assert!(changed);

        let (merged, _) = deep_merge(&json!({"a": "flat"}), &json!({"a": {"b": 1}}));
        assert_eq!(merged, json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let current = json!({"a": 1, "m": {"x": [1, 2], "y": {"z": null}}, "s": "v"});
        let desired = json!({"m": {"x": [3], "y": {"w": false}}, "n": 4});

        let (first, changed) = deep_merge(&current, &desired);
        assert!(changed);
        let (second, changed_again) = deep_merge(&first, &desired);
        assert_eq!(first, second);
        assert!(!changed_again);
    }
}
