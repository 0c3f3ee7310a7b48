// In-memory datasource registry - a snapshot of configured datasources taken at startup
use crate::application::datasource_registry::{DEFAULT_DATASOURCE_NAME, DataSourceRef, DatasourceRegistry};
use crate::infrastructure::config::DatasourceConfig;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("datasource `{0}` is configured more than once")]
    DuplicateName(String),
    #[error("datasource uid `{0}` is used by more than one datasource")]
    DuplicateUid(String),
    #[error("both `{first}` and `{second}` are marked as the default datasource")]
    MultipleDefaults { first: String, second: String },
    #[error("datasource `{0}` has an empty uid")]
    EmptyUid(String),
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryDatasourceRegistry {
    by_name: HashMap<String, DataSourceRef>,
    by_uid: HashMap<String, DataSourceRef>,
    default: Option<DataSourceRef>,
}

impl InMemoryDatasourceRegistry {
    pub fn from_config(entries: &[DatasourceConfig]) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        let mut default_name: Option<&str> = None;

        for entry in entries {
            if entry.uid.is_empty() {
                return Err(RegistryError::EmptyUid(entry.name.clone()));
            }
            let reference = DataSourceRef::new(entry.kind.clone(), entry.uid.clone());
            if registry.by_name.insert(entry.name.clone(), reference.clone()).is_some() {
                return Err(RegistryError::DuplicateName(entry.name.clone()));
            }
            if registry.by_uid.insert(entry.uid.clone(), reference.clone()).is_some() {
                return Err(RegistryError::DuplicateUid(entry.uid.clone()));
            }
            if entry.is_default {
                if let Some(first) = default_name {
                    return Err(RegistryError::MultipleDefaults {
                        first: first.to_string(),
                        second: entry.name.clone(),
                    });
                }
                default_name = Some(&entry.name);
                registry.default = Some(reference);
            }
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn lookup(&self, key: &str) -> Option<DataSourceRef> {
        if key == DEFAULT_DATASOURCE_NAME {
            return self.default.clone();
        }
        self.by_name.get(key).or_else(|| self.by_uid.get(key)).cloned()
    }
}

impl DatasourceRegistry for InMemoryDatasourceRegistry {
    fn resolve_by_name_or_ref(&self, name_or_ref: &Value) -> Option<DataSourceRef> {
        match name_or_ref {
            Value::String(name) => self.lookup(name),
            Value::Object(reference) => reference
                .get("uid")
                .and_then(Value::as_str)
                .and_then(|uid| self.by_uid.get(uid).cloned()),
            _ => None,
        }
    }

    fn resolve_default(&self) -> Option<DataSourceRef> {
        self.default.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entry(name: &str, uid: &str, is_default: bool) -> DatasourceConfig {
        DatasourceConfig {
            name: name.to_string(),
            kind: "prometheus".to_string(),
            uid: uid.to_string(),
            is_default,
        }
    }

    #[test]
    fn test_resolves_by_name_uid_and_reference() {
        let registry =
            InMemoryDatasourceRegistry::from_config(&[entry("prom", "p1", true), entry("other", "o1", false)]).unwrap();
        let other = Some(DataSourceRef::new("prometheus", "o1"));
        assert_eq!(registry.resolve_by_name_or_ref(&json!("other")), other);
        assert_eq!(registry.resolve_by_name_or_ref(&json!("o1")), other);
        assert_eq!(registry.resolve_by_name_or_ref(&json!({"uid": "o1"})), other);
        assert_eq!(registry.resolve_by_name_or_ref(&json!("default")), registry.resolve_default());
        assert_eq!(registry.resolve_by_name_or_ref(&json!("missing")), None);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_rejects_ambiguous_snapshots() {
        assert_eq!(
            InMemoryDatasourceRegistry::from_config(&[entry("a", "1", false), entry("a", "2", false)]).unwrap_err(),
            RegistryError::DuplicateName("a".to_string())
        );
        assert_eq!(
            InMemoryDatasourceRegistry::from_config(&[entry("a", "1", true), entry("b", "2", true)]).unwrap_err(),
            RegistryError::MultipleDefaults {
                first: "a".to_string(),
                second: "b".to_string()
            }
        );
        assert_eq!(
            InMemoryDatasourceRegistry::from_config(&[entry("a", "", false)]).unwrap_err(),
            RegistryError::EmptyUid("a".to_string())
        );
    }

    #[test]
    fn test_empty_snapshot_has_no_default() {
        let registry = InMemoryDatasourceRegistry::from_config(&[]).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.resolve_default(), None);
    }
}
