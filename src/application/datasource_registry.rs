// Datasource registry - lookup contract consumed by the datasource reference rules
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::domain::lenient;

/// Name and uid of the meta-datasource that lets every query pick its own datasource.
pub const MIXED_DATASOURCE_NAME: &str = "-- Mixed --";
pub const EXPRESSION_DATASOURCE_UID: &str = "__expr__";
pub const DEFAULT_DATASOURCE_NAME: &str = "default";

/// Stable reference to a configured datasource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataSourceRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub uid: String,
}

impl DataSourceRef {
    pub fn new(kind: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            uid: uid.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({"type": self.kind, "uid": self.uid})
    }
}

/// Synchronous lookup against an already populated set of datasources.
pub trait DatasourceRegistry: Send + Sync {
    /// Resolve a datasource by name, by uid, or by an existing `{uid}` reference.
    fn resolve_by_name_or_ref(&self, name_or_ref: &Value) -> Option<DataSourceRef>;

    /// The datasource used when a panel or query does not name one.
    fn resolve_default(&self) -> Option<DataSourceRef>;
}

/// A value that already is a datasource reference.
pub fn is_datasource_ref(value: &Value) -> bool {
    value.get("uid").is_some_and(Value::is_string)
}

/// Converts a legacy datasource name into a `{type, uid}` reference.
///
/// With `return_default_as_null` an absent name or `"default"` becomes the null sentinel;
/// otherwise they resolve to the current default. Names the registry does not know
/// degrade to `{uid: name}`.
pub fn migrate_datasource_name_to_ref(
    registry: &dyn DatasourceRegistry,
    name_or_ref: Option<&Value>,
    return_default_as_null: bool,
) -> Value {
    let nullish = matches!(name_or_ref, None | Some(Value::Null));
    let is_default_name = name_or_ref.and_then(Value::as_str) == Some(DEFAULT_DATASOURCE_NAME);
    if return_default_as_null && (nullish || is_default_name) {
        return Value::Null;
    }

    if let Some(reference) = name_or_ref.filter(|value| is_datasource_ref(value)) {
        return reference.clone();
    }

    let resolved = match name_or_ref {
        Some(name) if !nullish => registry.resolve_by_name_or_ref(name),
        _ => registry.resolve_default(),
    };
    match resolved {
        Some(reference) => reference.to_value(),
        None => match name_or_ref {
            Some(name) if lenient::truthy(Some(name)) => {
                warn!(datasource = %lenient::to_js_string(name), "datasource not found, keeping name as uid");
                json!({"uid": name})
            }
            _ => json!({}),
        },
    }
}
