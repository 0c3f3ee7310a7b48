// Template variable domain model
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

pub const ALL_VARIABLE_TEXT: &str = "All";
pub const ALL_VARIABLE_VALUE: &str = "$__all";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableOption {
    #[serde(default, deserialize_with = "lenient::explicit", skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,
    #[serde(default, deserialize_with = "lenient::explicit", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, deserialize_with = "lenient::opt_bool", skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VariableOption {
    pub fn is_selected(&self) -> bool {
        self.selected.unwrap_or(false)
    }

    pub fn is_all(&self) -> bool {
        self.value.as_ref().and_then(Value::as_str) == Some(ALL_VARIABLE_VALUE)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableModel {
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64", skip_serializing_if = "Option::is_none")]
    pub hide: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_value", skip_serializing_if = "Option::is_none")]
    pub current: Option<Value>,
    #[serde(default, deserialize_with = "lenient::opt_vec", skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<VariableOption>>,
    #[serde(default, deserialize_with = "lenient::explicit", skip_serializing_if = "Option::is_none")]
    pub datasource: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VariableModel {
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("")
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind() == kind
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.extra.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.extra.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.extra.remove(key)
    }

    /// The `current` text is "All", either directly or as the first of several values.
    pub fn is_all_selected(&self) -> bool {
        match self.current.as_ref().and_then(|current| current.get("text")) {
            Some(Value::String(text)) => text == ALL_VARIABLE_TEXT,
            Some(Value::Array(texts)) => texts.first().and_then(Value::as_str) == Some(ALL_VARIABLE_TEXT),
            _ => false,
        }
    }

    /// Options a repeat expands over: every concrete option when "All" is chosen,
    /// otherwise the options flagged as selected.
    pub fn selected_options(&self) -> Vec<VariableOption> {
        let options = self.options.as_deref().unwrap_or_default();
        if self.is_all_selected() {
            options.iter().filter(|option| !option.is_all()).cloned().collect()
        } else {
            options.iter().filter(|option| option.is_selected()).cloned().collect()
        }
    }

    pub fn save_model(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apps(current_text: Value) -> VariableModel {
        VariableModel::from_value(json!({
            "type": "custom",
            "name": "apps",
            "current": {"text": current_text},
            "options": [
                {"text": "All", "value": "$__all"},
                {"text": "se1", "value": "se1", "selected": true},
                {"text": "se2", "value": "se2"},
                {"text": "se3", "value": "se3", "selected": true}
            ]
        }))
    }

    #[test]
    fn test_selected_options_follow_flags() {
        let values: Vec<_> = apps(json!("se1 + se3"))
            .selected_options()
            .into_iter()
            .map(|option| option.value)
            .collect();
        assert_eq!(values, vec![Some(json!("se1")), Some(json!("se3"))]);
    }

    #[test]
    fn test_all_selects_every_concrete_option() {
        assert_eq!(apps(json!("All")).selected_options().len(), 3);
        assert_eq!(apps(json!(["All"])).selected_options().len(), 3);
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let variable = VariableModel::from_value(json!({"type": "query", "regex": "/a/", "datasource": null}));
        assert_eq!(variable.get("regex"), Some(&json!("/a/")));
        assert_eq!(variable.datasource, Some(Value::Null));
        assert_eq!(variable.save_model(), json!({"type": "query", "regex": "/a/", "datasource": null}));
    }
}
