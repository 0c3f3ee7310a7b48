// Datasource reference rules - names become {type, uid} refs (v33), nulls become the default (v36)
use super::{MigrationPass, PanelPass};
use crate::application::datasource_registry::{
    EXPRESSION_DATASOURCE_UID, MIXED_DATASOURCE_NAME, migrate_datasource_name_to_ref,
};
use crate::domain::dashboard::GRAFANA_DATASOURCE_UID;
use crate::domain::lenient;
use crate::domain::panel::PanelModel;
use serde_json::{Map, Value, json};

fn is_nullish(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn uid_of(value: Option<&Value>) -> Option<&Value> {
    value.and_then(|reference| reference.get("uid")).filter(|uid| !uid.is_null())
}

// v33

pub fn variable_refs(pass: &mut MigrationPass<'_>) {
    let registry = pass.context.datasources.as_ref();
    for variable in pass.dashboard.templating.list.iter_mut().filter(|variable| variable.is_kind("query")) {
        if lenient::truthy(variable.datasource.as_ref()) {
            variable.datasource = Some(migrate_datasource_name_to_ref(registry, variable.datasource.as_ref(), true));
        }
    }
}

pub fn panel_refs(panel: &mut PanelModel, pass: &mut PanelPass<'_>) {
    let registry = pass.context.datasources.as_ref();
    if panel.datasource.is_some() {
        panel.datasource = Some(migrate_datasource_name_to_ref(registry, panel.datasource.as_ref(), true));
    }
    for target in panel.targets_mut() {
        let reference = migrate_datasource_name_to_ref(registry, target.datasource.as_ref(), true);
        if !reference.is_null() {
            target.datasource = Some(reference);
        }
    }
}

// v36

pub fn default_datasource(pass: &mut MigrationPass<'_>) {
    let registry = pass.context.datasources.as_ref();
    for annotation in pass.dashboard.annotations.list.iter_mut().filter_map(Value::as_object_mut) {
        let reference = if lenient::truthy(annotation.get("builtIn")) {
            json!({"type": "grafana", "uid": GRAFANA_DATASOURCE_UID})
        } else {
            migrate_datasource_name_to_ref(registry, annotation.get("datasource"), false)
        };
        annotation.insert("datasource".to_string(), reference);
    }

    let Some(default) = registry.resolve_default() else {
        return;
    };
    for variable in pass.dashboard.templating.list.iter_mut().filter(|variable| variable.is_kind("query")) {
        if variable.datasource == Some(Value::Null) {
            variable.datasource = Some(default.to_value());
        }
    }
}

pub fn panel_default_datasource(panel: &mut PanelModel, pass: &mut PanelPass<'_>) {
    let default = pass.context.datasources.resolve_default().map(|reference| reference.to_value());
    let was_default = is_nullish(panel.datasource.as_ref());
    let has_targets = panel.targets.as_ref().is_some_and(|targets| !targets.is_empty());
    if was_default && has_targets {
        if let Some(default) = &default {
            panel.datasource = Some(default.clone());
        }
    }

    let Some(targets) = panel.targets.as_mut() else {
        return;
    };
    for target in targets.iter_mut() {
        if uid_of(target.datasource.as_ref()).is_none() {
            let panel_is_mixed = uid_of(panel.datasource.as_ref()).and_then(Value::as_str) == Some(MIXED_DATASOURCE_NAME);
            let inherited = if panel_is_mixed {
                default.clone()
            } else {
                panel.datasource.clone()
            };
            target.datasource = Some(match inherited {
                Some(Value::Object(reference)) => Value::Object(reference),
                _ => Value::Object(Map::new()),
            });
        }
        let is_expression = uid_of(target.datasource.as_ref()).and_then(Value::as_str) == Some(EXPRESSION_DATASOURCE_UID);
        if was_default && !is_expression {
            panel.datasource = target.datasource.clone();
        }
    }
}
