// Legacy schema rules - versions 2 through 14
use super::{MigrationPass, PanelPass};
use crate::domain::dashboard::Annotations;
use crate::domain::lenient;
use crate::domain::panel::{PanelModel, Query};
use crate::domain::variable::VariableModel;
use serde_json::{Map, Value, json};

const REF_ID_LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn is_graph(panel: &PanelModel) -> bool {
    panel.panel_type == "graph"
}

fn grid_mut(panel: &mut PanelModel) -> Option<&mut Map<String, Value>> {
    lenient::object_mut(panel.get_mut("grid"))
}

/// Sequential query ref id: A..Z, then AA, AB and so on.
pub fn ref_id(index: usize) -> String {
    let letters = REF_ID_LETTERS.len();
    if index < letters {
        return (REF_ID_LETTERS[index] as char).to_string();
    }
    let mut prefix = ref_id(index / letters - 1);
    prefix.push(REF_ID_LETTERS[index % letters] as char);
    prefix
}

/// First ref id not used by any of `queries`.
pub fn next_ref_id<'a>(queries: impl Iterator<Item = &'a str> + Clone) -> String {
    (0..)
        .map(ref_id)
        .find(|candidate| queries.clone().all(|used| used != candidate.as_str()))
        .unwrap_or_default()
}

// v2

pub fn services_filter(pass: &mut MigrationPass<'_>) {
    let Some(filter) = pass
        .legacy
        .get("services")
        .and_then(|services| services.get("filter"))
        .filter(|filter| lenient::truthy(Some(filter)))
    else {
        return;
    };
    pass.dashboard.time = filter.get("time").cloned().unwrap_or(Value::Null);
    pass.dashboard.templating.list = match filter.get("list") {
        Some(Value::Array(items)) => items.iter().cloned().map(VariableModel::from_value).collect(),
        _ => Vec::new(),
    };
}

pub fn graph_basics(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if panel.panel_type == "graphite" {
        panel.panel_type = "graph".to_string();
    }
    if !is_graph(panel) {
        return;
    }

    if let Some(Value::Bool(show)) = panel.get("legend") {
        let show = *show;
        panel.set("legend", json!({ "show": show }));
    }

    if let Some(grid) = grid_mut(panel) {
        for (old, new) in [("min", "leftMin"), ("max", "leftMax")] {
            if lenient::truthy(grid.get(old)) {
                if let Some(value) = grid.remove(old) {
                    grid.insert(new.to_string(), value);
                }
            }
        }
    }

    for (index, key) in [(0, "y_format"), (1, "y2_format")] {
        if !lenient::truthy(panel.get(key)) {
            continue;
        }
        let Some(format) = panel.remove(key) else {
            continue;
        };
        let formats = lenient::ensure_array(&mut panel.extra, "y_formats");
        if formats.len() <= index {
            formats.resize(index + 1, Value::Null);
        }
        formats[index] = format;
    }
}

// v3

pub fn seed_panel_ids(pass: &mut MigrationPass<'_>) {
    pass.state.next_panel_id = pass.dashboard.next_panel_id();
}

pub fn assign_panel_id(panel: &mut PanelModel, pass: &mut PanelPass<'_>) {
    if panel.id == 0 {
        panel.id = pass.state.next_panel_id;
        pass.state.next_panel_id = pass.state.next_panel_id.saturating_add(1);
    }
}

// v4

pub fn alias_y_axis(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if !is_graph(panel) {
        return;
    }
    // Each entry overwrites the previous one; only the last alias survives.
    let last = match panel.get("aliasYAxis") {
        Some(Value::Object(aliases)) => aliases.iter().last().map(|(alias, axis)| (json!(alias), axis.clone())),
        Some(Value::Array(axes)) => axes.iter().enumerate().last().map(|(index, axis)| (json!(index), axis.clone())),
        _ => None,
    };
    if let Some((alias, yaxis)) = last {
        panel.set("seriesOverrides", json!([{ "alias": alias, "yaxis": yaxis }]));
    }
    panel.remove("aliasYAxis");
}

// v6

pub fn pulldowns_and_variables(pass: &mut MigrationPass<'_>) {
    let annotation_pulldown = pass
        .legacy
        .get("pulldowns")
        .and_then(Value::as_array)
        .and_then(|pulldowns| {
            pulldowns
                .iter()
                .find(|pulldown| pulldown.get("type").and_then(Value::as_str) == Some("annotations"))
        });
    if let Some(pulldown) = annotation_pulldown {
        let list = match pulldown.get("annotations") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        pass.dashboard.annotations = Annotations {
            list,
            extra: Map::new(),
        };
    }

    for variable in &mut pass.dashboard.templating.list {
        if variable.datasource.is_none() {
            variable.datasource = Some(Value::Null);
        }
        if matches!(variable.kind.as_deref(), None | Some("filter")) {
            variable.kind = Some("query".to_string());
        }
        if !variable.has("allFormat") {
            variable.set("allFormat", json!("glob"));
        }
    }
}

// v7

pub fn nav_timepicker(pass: &mut MigrationPass<'_>) {
    if let Some(first) = pass.legacy.get("nav").and_then(Value::as_array).and_then(|nav| nav.first()) {
        pass.dashboard.timepicker = first.clone();
    }
}

pub fn query_ref_ids(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    let Some(targets) = panel.targets.as_mut() else {
        return;
    };
    for index in 0..targets.len() {
        if targets[index].ref_id.is_empty() {
            let next = next_ref_id(targets.iter().map(|target| target.ref_id.as_str()));
            targets[index].ref_id = next;
        }
    }
}

// v8

pub fn influx_select_parts(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    for target in panel.targets.iter_mut().flatten() {
        let legacy_shape = ["fields", "tags", "groupBy"]
            .iter()
            .all(|key| lenient::truthy(target.get(key)));
        if !legacy_shape {
            continue;
        }
        if lenient::truthy(target.get("rawQuery")) {
            target.remove("fields");
            target.remove("fill");
            continue;
        }
        upgrade_influx_target(target);
    }
}

fn upgrade_influx_target(target: &mut Query) {
    let fields = match target.remove("fields") {
        Some(Value::Array(fields)) => fields,
        Some(Value::Object(fields)) => fields.into_iter().map(|(_, field)| field).collect(),
        _ => Vec::new(),
    };
    let select: Vec<Value> = fields
        .iter()
        .map(|field| {
            let mut parts = vec![
                json!({"type": "field", "params": [field.get("name").cloned().unwrap_or(Value::Null)]}),
                json!({"type": field.get("func").cloned().unwrap_or(Value::Null), "params": []}),
            ];
            if let Some(math) = field.get("mathExpr").filter(|math| lenient::truthy(Some(math))) {
                parts.push(json!({"type": "math", "params": [math]}));
            }
            if let Some(alias) = field.get("asExpr").filter(|alias| lenient::truthy(Some(alias))) {
                parts.push(json!({"type": "alias", "params": [alias]}));
            }
            Value::Array(parts)
        })
        .collect();
    target.set("select", Value::Array(select));

    if let Some(Value::Array(group_by)) = target.extra.get_mut("groupBy") {
        for part in group_by.iter_mut().filter_map(Value::as_object_mut) {
            let kind = part.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
            let moved = match kind.as_str() {
                "time" => "interval",
                "tag" => "key",
                _ => continue,
            };
            if lenient::truthy(part.get(moved)) {
                if let Some(value) = part.remove(moved) {
                    part.insert("params".to_string(), json!([value]));
                }
            }
        }
    }

    if lenient::truthy(target.get("fill")) {
        if let Some(fill) = target.remove("fill") {
            if let Some(Value::Array(group_by)) = target.extra.get_mut("groupBy") {
                group_by.push(json!({"type": "fill", "params": [fill]}));
            }
        }
    }
}

// v9

pub fn singlestat_thresholds(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if panel.panel_type != "singlestat" {
        return;
    }
    let Some(Value::String(thresholds)) = panel.get("thresholds") else {
        return;
    };
    let parts: Vec<&str> = thresholds.split(',').collect();
    if parts.len() >= 3 {
        let joined = parts[1..].join(",");
        panel.set("thresholds", Value::String(joined));
    }
}

// v10

pub fn table_style_thresholds(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if panel.panel_type != "table" {
        return;
    }
    for style in lenient::objects_mut(&mut panel.extra, "styles") {
        if let Some(Value::Array(thresholds)) = style.get_mut("thresholds") {
            if thresholds.len() >= 3 {
                thresholds.remove(0);
            }
        }
    }
}

// v12

pub fn variable_refresh_and_hide(pass: &mut MigrationPass<'_>) {
    for variable in &mut pass.dashboard.templating.list {
        let refresh = if lenient::truthy(variable.get("refresh")) { 1 } else { 0 };
        variable.set("refresh", json!(refresh));
        if lenient::truthy(variable.get("hideVariable")) {
            variable.hide = Some(2);
        } else if lenient::truthy(variable.get("hideLabel")) {
            variable.hide = Some(1);
        }
    }
}

pub fn graph_axes(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if !is_graph(panel) || !lenient::truthy(panel.get("grid")) || lenient::truthy(panel.get("yaxes")) {
        return;
    }
    let grid = panel.get("grid").cloned().unwrap_or(Value::Null);
    let formats = panel.get("y_formats").cloned().unwrap_or(Value::Null);
    let y_axis = panel.get("y-axis").cloned();

    let axis = |side: &str, index: usize, label_key: &str| {
        let mut axis = Map::new();
        let mut put = |key: &str, value: Option<&Value>| {
            if let Some(value) = value {
                axis.insert(key.to_string(), value.clone());
            }
        };
        put("show", y_axis.as_ref());
        put("min", grid.get(format!("{side}Min")));
        put("max", grid.get(format!("{side}Max")));
        put("logBase", grid.get(format!("{side}LogBase")));
        put("format", formats.get(index));
        put("label", panel.get(label_key));
        Value::Object(axis)
    };
    let yaxes = json!([axis("left", 0, "leftYAxisLabel"), axis("right", 1, "rightYAxisLabel")]);
    let mut xaxis = Map::new();
    if let Some(show) = panel.get("x-axis") {
        xaxis.insert("show".to_string(), show.clone());
    }

    panel.set("yaxes", yaxes);
    panel.set("xaxis", Value::Object(xaxis));
    if let Some(grid) = grid_mut(panel) {
        for key in ["leftMin", "leftMax", "leftLogBase", "rightMin", "rightMax", "rightLogBase"] {
            grid.remove(key);
        }
    }
    for key in ["y_formats", "leftYAxisLabel", "rightYAxisLabel", "y-axis", "x-axis"] {
        panel.remove(key);
    }
}

// v13

fn threshold(grid: &Map<String, Value>, value_key: &str, color_key: &str) -> Map<String, Value> {
    let mut threshold = Map::new();
    if let Some(value) = grid.get(value_key) {
        threshold.insert("value".to_string(), value.clone());
    }
    let (style, color_name) = if lenient::truthy(grid.get("thresholdLine")) {
        ("line", "lineColor")
    } else {
        ("fill", "fillColor")
    };
    threshold.insert(style.to_string(), Value::Bool(true));
    if let Some(color) = grid.get(color_key) {
        threshold.insert(color_name.to_string(), color.clone());
    }
    threshold.insert("colorMode".to_string(), json!("custom"));
    threshold
}

pub fn graph_thresholds(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if !is_graph(panel) || !lenient::truthy(panel.get("grid")) {
        return;
    }
    let Some(grid) = grid_mut(panel) else {
        return;
    };
    let mut t1 = threshold(grid, "threshold1", "threshold1Color");
    let mut t2 = threshold(grid, "threshold2", "threshold2Color");
    for key in ["threshold1", "threshold1Color", "threshold2", "threshold2Color", "thresholdLine"] {
        grid.remove(key);
    }

    let numeric = |threshold: &Map<String, Value>| threshold.get("value").and_then(Value::as_f64);
    let mut added = Vec::new();
    if let Some(first) = numeric(&t1) {
        match numeric(&t2) {
            Some(second) => {
                let op = if first > second { "lt" } else { "gt" };
                t1.insert("op".to_string(), json!(op));
                t2.insert("op".to_string(), json!(op));
                added.push(Value::Object(t1));
                added.push(Value::Object(t2));
            }
            None => {
                t1.insert("op".to_string(), json!("gt"));
                added.push(Value::Object(t1));
            }
        }
    }

    lenient::ensure_array(&mut panel.extra, "thresholds").extend(added);
}

// v14

pub fn shared_crosshair(pass: &mut MigrationPass<'_>) {
    let shared = lenient::truthy(pass.legacy.get("sharedCrosshair"));
    pass.dashboard.graph_tooltip = json!(if shared { 1 } else { 0 });
}
