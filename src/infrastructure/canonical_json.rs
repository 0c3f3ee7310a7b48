// Canonical JSON writer - stable key order and pruned nulls for stored dashboards
use crate::domain::lenient;
use anyhow::Context;
use serde_json::{Map, Value};

/// Object keys whose `null` value carries meaning and survives pruning.
const NULL_SENTINEL_KEYS: [&str; 1] = ["datasource"];

/// Sorts object keys, drops null object entries and renders integral floats as integers.
/// Array elements are kept as they are, nulls included.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map
                .iter()
                .filter(|(key, value)| !value.is_null() || NULL_SENTINEL_KEYS.contains(&key.as_str()))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let normalized: Map<String, Value> =
                entries.into_iter().map(|(key, value)| (key.clone(), normalize(value))).collect();
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::Number(number) if number.is_f64() => number.as_f64().map(lenient::number).unwrap_or(Value::Null),
        other => other.clone(),
    }
}

pub fn to_string(value: &Value, pretty: bool) -> anyhow::Result<String> {
    let normalized = normalize(value);
    let text = if pretty {
        serde_json::to_string_pretty(&normalized)
    } else {
        serde_json::to_string(&normalized)
    };
    text.context("failed to encode dashboard")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_and_nulls_pruned() {
        let value = json!({"b": 1, "a": {"z": null, "y": [null, 2.0]}, "datasource": null, "c": null});
        assert_eq!(
            to_string(&value, false).unwrap(),
            r#"{"a":{"y":[null,2]},"b":1,"datasource":null}"#
        );
    }

    #[test]
    fn test_pretty_output_is_indented() {
        let text = to_string(&json!({"b": 2.5, "a": []}), true).unwrap();
        assert_eq!(text, "{\n  \"a\": [],\n  \"b\": 2.5\n}");
    }
}
