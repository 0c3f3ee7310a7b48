// Value mapping rule - legacy flat mappings become typed value, range and special mappings (v30)
use super::PanelPass;
use super::panel_options::migrate_tooltip_options;
use crate::domain::lenient;
use crate::domain::panel::PanelModel;
use serde_json::{Map, Value, json};

const FALLBACK_THRESHOLD_COLOR: &str = "green";
const VALUE_TO_TEXT: i64 = 1;
const RANGE_TO_TEXT: i64 = 2;

/// Color of the highest step whose value does not exceed `value`. A null step value is the base step.
fn active_threshold_color(value: f64, steps: Option<&Value>) -> Option<Value> {
    let steps = match steps {
        Some(Value::Array(steps)) if !steps.is_empty() => steps,
        _ => return Some(json!(FALLBACK_THRESHOLD_COLOR)),
    };
    let mut active = &steps[0];
    for step in steps {
        let threshold = step
            .get("value")
            .and_then(Value::as_f64)
            .unwrap_or(f64::NEG_INFINITY);
        if value >= threshold {
            active = step;
        } else {
            break;
        }
    }
    active.get("color").filter(|color| lenient::truthy(Some(color))).cloned()
}

fn mapping_result(old: &Map<String, Value>, color: Option<Value>) -> Value {
    let mut result = Map::new();
    if let Some(text) = old.get("text") {
        result.insert("text".to_string(), text.clone());
    }
    if let Some(color) = color {
        result.insert("color".to_string(), color);
    }
    Value::Object(result)
}

fn legacy_kind(old: &Map<String, Value>) -> Option<i64> {
    match old.get("type") {
        Some(Value::Number(kind)) => kind.as_i64(),
        _ => None,
    }
}

/// Rewrites a legacy mapping list. `None` means the mappings are dropped.
pub fn upgrade_value_mappings(old_mappings: Option<&Value>, thresholds: Option<&Value>) -> Option<Value> {
    if !lenient::truthy(old_mappings) {
        return None;
    }
    let Some(Value::Array(old_mappings)) = old_mappings else {
        return old_mappings.cloned();
    };

    let mut value_map = Map::new();
    let mut mappings = Vec::new();
    for old in old_mappings.iter().filter_map(Value::as_object) {
        // Already typed, usually left behind by a panel type change.
        if lenient::truthy(old.get("type")) && lenient::truthy(old.get("options")) {
            if old.get("type").and_then(Value::as_str) == Some("value") {
                if let Some(Value::Object(options)) = old.get("options") {
                    value_map.extend(options.clone());
                }
            } else {
                mappings.push(Value::Object(old.clone()));
            }
            continue;
        }

        let color = match (thresholds, old.get("text").and_then(lenient::parse_float)) {
            (Some(thresholds), Some(numeric)) if lenient::truthy(Some(thresholds)) && !numeric.is_nan() => {
                active_threshold_color(numeric, thresholds.get("steps"))
            }
            _ => None,
        };

        match legacy_kind(old) {
            Some(VALUE_TO_TEXT) => match old.get("value") {
                None | Some(Value::Null) => {}
                Some(Value::String(value)) if value == "null" => mappings.push(json!({
                    "type": "special",
                    "options": {"match": "null", "result": mapping_result(old, color)},
                })),
                Some(value) => {
                    value_map.insert(lenient::to_js_string(value), mapping_result(old, color));
                }
            },
            Some(RANGE_TO_TEXT) => {
                let bound = |key: &str| lenient::number(old.get(key).and_then(lenient::to_number).unwrap_or(f64::NAN));
                mappings.push(json!({
                    "type": "range",
                    "options": {"from": bound("from"), "to": bound("to"), "result": mapping_result(old, color)},
                }));
            }
            _ => {}
        }
    }

    if !value_map.is_empty() {
        mappings.insert(0, json!({"type": "value", "options": value_map}));
    }
    Some(Value::Array(mappings))
}

fn upgrade_field_config(field_config: &mut Map<String, Value>) {
    if let Some(Value::Object(defaults)) = field_config.get_mut("defaults") {
        match upgrade_value_mappings(defaults.get("mappings"), defaults.get("thresholds")) {
            Some(mappings) => {
                defaults.insert("mappings".to_string(), mappings);
            }
            None => {
                defaults.remove("mappings");
            }
        }
    }

    for rule in lenient::objects_mut(field_config, "overrides") {
        for property in lenient::objects_mut(rule, "properties") {
            if property.get("id").and_then(Value::as_str) != Some("mappings") {
                continue;
            }
            match upgrade_value_mappings(property.get("value"), None) {
                Some(mappings) => {
                    property.insert("value".to_string(), mappings);
                }
                None => {
                    property.remove("value");
                }
            }
        }
    }
}

pub fn upgrade_panel(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if let Some(field_config) = panel.field_config_object_mut() {
        upgrade_field_config(field_config);
    }
    migrate_tooltip_options(panel);
}
