// Panel option and variable rules - versions 18 through 31
use super::{MigrationPass, PanelPass};
use crate::domain::lenient;
use crate::domain::panel::PanelModel;
use crate::domain::variable::{VariableModel, VariableOption};
use regex::{Captures, Regex};
use serde_json::{Map, Value, json};
use std::sync::LazyLock;

const KEEP_TIME_VARIABLE: &str = "$__url_time_range";
const INCLUDE_VARS_VARIABLE: &str = "$__all_variables";

static SLUG_STRIP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_ ]+").expect("valid slug pattern"));
static SLUG_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("valid slug pattern"));
static LEGACY_VARIABLE_NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(__series_name)|(\$__series_name)|(__value_time)|(__field_name)|(\$__field_name)")
        .expect("valid legacy variable pattern")
});
static SERIES_LABELS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__series.labels").expect("valid series labels pattern"));

// v18

pub fn gauge_options(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    let Some(Value::Object(mut options)) = panel.get("options-gauge").cloned() else {
        return;
    };
    let value_options: Map<String, Value> = ["unit", "stat", "decimals", "prefix", "suffix"]
        .iter()
        .filter_map(|key| options.get(*key).map(|value| (key.to_string(), value.clone())))
        .collect();
    options.insert("valueOptions".to_string(), Value::Object(value_options));
    if let Some(Value::Array(thresholds)) = options.get_mut("thresholds") {
        thresholds.reverse();
    }
    for key in ["options", "unit", "stat", "decimals", "prefix", "suffix"] {
        options.remove(key);
    }
    panel.options = Some(Value::Object(options));
    panel.remove("options-gauge");
}

// v19

fn slugify_for_url(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = SLUG_STRIP.replace_all(&lowered, "");
    SLUG_SPACES.replace_all(&stripped, "-").into_owned()
}

/// Appends a query fragment, adding `?` or `&` as needed.
pub fn append_query_to_url(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let mut url = url.to_string();
    match url.find('?') {
        Some(pos) if url.len() - pos > 1 => url.push('&'),
        Some(_) => {}
        None => url.push('?'),
    }
    url.push_str(query);
    url
}

fn upgrade_panel_link(link: &Value) -> Value {
    let text = |key: &str| {
        link.get(key)
            .filter(|value| lenient::truthy(Some(value)))
            .map(lenient::to_js_string)
    };
    let url = text("url")
        .or_else(|| text("dashboard").map(|dashboard| format!("dashboard/db/{}", slugify_for_url(&dashboard))))
        .or_else(|| text("dashUri").map(|uri| format!("dashboard/{uri}")))
        .unwrap_or_else(|| "/".to_string());

    let mut url = url;
    if lenient::truthy(link.get("keepTime")) {
        url = append_query_to_url(&url, KEEP_TIME_VARIABLE);
    }
    if lenient::truthy(link.get("includeVars")) {
        url = append_query_to_url(&url, INCLUDE_VARS_VARIABLE);
    }
    if let Some(params) = text("params") {
        url = append_query_to_url(&url, &params);
    }

    let mut upgraded = Map::new();
    upgraded.insert("url".to_string(), Value::String(url));
    for key in ["title", "targetBlank"] {
        if let Some(value) = link.get(key) {
            upgraded.insert(key.to_string(), value.clone());
        }
    }
    Value::Object(upgraded)
}

pub fn panel_links(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if let Some(Value::Array(links)) = panel.get_mut("links") {
        for link in links.iter_mut() {
            *link = upgrade_panel_link(link);
        }
    }
}

// v20, v21

pub fn update_variables_syntax(text: &str) -> String {
    LEGACY_VARIABLE_NAMES
        .replace_all(text, |caps: &Captures| {
            let replacement = if caps.get(1).is_some() {
                "__series.name"
            } else if caps.get(2).is_some() {
                "${__series.name}"
            } else if caps.get(3).is_some() {
                "__value.time"
            } else if caps.get(4).is_some() {
                "__field.name"
            } else {
                "${__field.name}"
            };
            replacement.to_string()
        })
        .into_owned()
}

fn rewrite_link_urls(links: Option<&mut Value>, rewrite: &dyn Fn(&str) -> String) {
    let Some(Value::Array(links)) = links else {
        return;
    };
    for link in links.iter_mut().filter_map(Value::as_object_mut) {
        if let Some(Value::String(url)) = link.get_mut("url") {
            *url = rewrite(url);
        }
    }
}

/// Rewrites graph data links and field-option links, and optionally the field title.
fn rewrite_data_links(panel: &mut PanelModel, rewrite: &dyn Fn(&str) -> String, with_title: bool) {
    let Some(options) = panel.options_object_mut() else {
        return;
    };
    rewrite_link_urls(options.get_mut("dataLinks"), rewrite);

    let Some(defaults) = options
        .get_mut("fieldOptions")
        .and_then(|field_options| field_options.get_mut("defaults"))
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    rewrite_link_urls(defaults.get_mut("links"), rewrite);
    if with_title {
        if let Some(Value::String(title)) = defaults.get_mut("title") {
            if !title.is_empty() {
                *title = rewrite(title);
            }
        }
    }
}

pub fn data_link_variable_syntax(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    rewrite_data_links(panel, &update_variables_syntax, true);
}

pub fn data_link_series_labels(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    let rewrite = |url: &str| SERIES_LABELS.replace_all(url, "__field.labels").into_owned();
    rewrite_data_links(panel, &rewrite, false);
}

// v22

pub fn table_style_align(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if panel.panel_type != "table" {
        return;
    }
    for style in lenient::objects_mut(&mut panel.extra, "styles") {
        style.insert("align".to_string(), json!("auto"));
    }
}

// v23

fn to_multi(value: Option<Value>) -> Value {
    match value {
        Some(Value::Array(items)) => Value::Array(items),
        Some(other) => Value::Array(vec![other]),
        None => Value::Array(vec![Value::Null]),
    }
}

fn to_single(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::Array(items)) => Some(items.into_iter().next().unwrap_or_else(|| json!(""))),
        other => other,
    }
}

fn align_current(variable: &mut VariableModel) {
    let multi = lenient::truthy(variable.get("multi"));
    let Some(Value::Object(current)) = variable.current.as_mut() else {
        return;
    };
    let value_is_list = current.get("value").is_some_and(Value::is_array);
    if multi && !value_is_list {
        let value = to_multi(current.remove("value"));
        let text = to_multi(current.remove("text"));
        current.insert("value".to_string(), value);
        current.insert("text".to_string(), text);
    } else if !multi && value_is_list {
        for key in ["value", "text"] {
            if let Some(single) = to_single(current.remove(key)) {
                current.insert(key.to_string(), single);
            }
        }
    }
}

pub fn align_current_with_multi(pass: &mut MigrationPass<'_>) {
    for variable in pass.dashboard.templating.list.iter_mut().filter(|variable| variable.has("multi")) {
        align_current(variable);
    }
}

// v24

pub fn angular_table(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if panel.panel_type != "table" || !lenient::truthy(panel.get("styles")) {
        return;
    }
    if panel.get("table").and_then(Value::as_str) == Some("table2") {
        return;
    }
    panel.panel_type = "table-old".to_string();
}

// v26

pub fn react_text_panel(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if panel.panel_type != "text2" {
        return;
    }
    panel.panel_type = "text".to_string();
    if let Some(options) = panel.options_object_mut() {
        options.remove("angular");
    }
}

// v27

pub fn constant_variables(pass: &mut MigrationPass<'_>) {
    for variable in pass.dashboard.templating.list.iter_mut().filter(|variable| variable.is_kind("constant")) {
        if matches!(variable.hide, Some(0) | Some(1)) {
            variable.kind = Some("textbox".to_string());
        }
        let query = match variable.get("query") {
            None | Some(Value::Null) => json!(""),
            Some(query) => query.clone(),
        };
        let option = VariableOption {
            text: Some(query.clone()),
            value: Some(query),
            selected: Some(true),
            extra: Map::new(),
        };
        variable.current = Some(option.to_value());
        variable.options = Some(vec![option]);
    }
}

// v28

pub fn remove_variable_tags(pass: &mut MigrationPass<'_>) {
    for variable in &mut pass.dashboard.templating.list {
        for key in ["tags", "tagsQuery", "tagValuesQuery", "useTags"] {
            if lenient::truthy(variable.get(key)) {
                variable.remove(key);
            }
        }
    }
}

// v29

pub fn query_variable_refresh(pass: &mut MigrationPass<'_>) {
    for variable in pass.dashboard.templating.list.iter_mut().filter(|variable| variable.is_kind("query")) {
        let refresh = variable.get("refresh").and_then(Value::as_f64);
        if refresh != Some(1.0) && refresh != Some(2.0) {
            variable.set("refresh", json!(1));
        }
        if variable.options.as_ref().is_some_and(|options| !options.is_empty()) {
            variable.options = Some(Vec::new());
        }
    }
}

// v30

pub fn migrate_tooltip_options(panel: &mut PanelModel) {
    if panel.panel_type != "timeseries" && panel.panel_type != "xychart" {
        return;
    }
    let Some(options) = panel.options_object_mut() else {
        return;
    };
    if lenient::truthy(options.get("tooltipOptions")) {
        if let Some(tooltip) = options.remove("tooltipOptions") {
            options.insert("tooltip".to_string(), tooltip);
        }
    }
}

// v31

pub fn labels_to_fields_merge(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    let Some(Value::Array(transformations)) = panel.get_mut("transformations") else {
        return;
    };
    let is_labels_to_fields = |t: &Value| t.get("id").and_then(Value::as_str) == Some("labelsToFields");
    if !transformations.iter().any(is_labels_to_fields) {
        return;
    }
    let mut merged = Vec::with_capacity(transformations.len() + 1);
    for transformation in transformations.drain(..) {
        let append_merge = is_labels_to_fields(&transformation);
        merged.push(transformation);
        if append_merge {
            merged.push(json!({"id": "merge", "options": {}}));
        }
    }
    *transformations = merged;
}
