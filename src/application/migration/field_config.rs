// Field config rules - axis, legend, table cell and transformation option reshaping (v35 - v39)
use super::PanelPass;
use crate::domain::lenient;
use crate::domain::panel::PanelModel;
use serde_json::{Map, Value, json};

fn is_time_type_override(rule: &Value) -> bool {
    let matcher = rule.get("matcher");
    matcher.and_then(|m| m.get("id")).and_then(Value::as_str) == Some("byType")
        && matcher.and_then(|m| m.get("options")).and_then(Value::as_str) == Some("time")
}

// v35

pub fn ensure_x_axis_visibility(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if panel.panel_type != "timeseries" {
        return;
    }
    let Some(field_config) = panel.field_config_object_mut() else {
        return;
    };
    let overrides = field_config.get("overrides").and_then(Value::as_array);
    if overrides.is_some_and(|rules| rules.iter().any(is_time_type_override)) {
        return;
    }
    let placement = field_config
        .get("defaults")
        .and_then(|defaults| defaults.get("custom"))
        .and_then(|custom| custom.get("axisPlacement"))
        .and_then(Value::as_str);
    if placement != Some("hidden") {
        return;
    }
    lenient::ensure_array(field_config, "overrides").push(json!({
        "matcher": {"id": "byType", "options": "time"},
        "properties": [{"id": "custom.axisPlacement", "value": "auto"}],
    }));
}

// v37

pub fn legend_show_legend(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    let Some(legend) = panel
        .options_object_mut()
        .and_then(|options| options.get_mut("legend"))
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    let hidden = legend.get("displayMode").and_then(Value::as_str) == Some("hidden")
        || legend.get("showLegend") == Some(&Value::Bool(false));
    if hidden {
        legend.insert("displayMode".to_string(), json!("list"));
        legend.insert("showLegend".to_string(), json!(false));
    } else {
        legend.insert("showLegend".to_string(), json!(true));
    }
}

// v38

/// Cell options replacing a legacy table display mode.
pub fn cell_options_for_display_mode(display_mode: &Value) -> Value {
    match display_mode.as_str() {
        Some("basic") => json!({"type": "gauge", "mode": "basic"}),
        Some("gradient-gauge") => json!({"type": "gauge", "mode": "gradient"}),
        Some("lcd-gauge") => json!({"type": "gauge", "mode": "lcd"}),
        Some("color-background") => json!({"type": "color-background", "mode": "gradient"}),
        Some("color-background-solid") => json!({"type": "color-background", "mode": "basic"}),
        _ => json!({"type": display_mode}),
    }
}

pub fn table_cell_options(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if panel.panel_type != "table" {
        return;
    }
    let Some(field_config) = panel.field_config_object_mut() else {
        return;
    };

    let custom = field_config
        .get_mut("defaults")
        .and_then(|defaults| defaults.get_mut("custom"))
        .and_then(Value::as_object_mut);
    if let Some(custom) = custom {
        if let Some(display_mode) = custom.remove("displayMode") {
            custom.insert("cellOptions".to_string(), cell_options_for_display_mode(&display_mode));
        }
    }

    for rule in lenient::objects_mut(field_config, "overrides") {
        for property in lenient::objects_mut(rule, "properties") {
            if property.get("id").and_then(Value::as_str) != Some("custom.displayMode") {
                continue;
            }
            let display_mode = property.get("value").cloned().unwrap_or(Value::Null);
            property.insert("id".to_string(), json!("custom.cellOptions"));
            property.insert("value".to_string(), cell_options_for_display_mode(&display_mode));
        }
    }
}

// v39

pub fn time_series_table_stats(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    for transformation in lenient::objects_mut(&mut panel.extra, "transformations") {
        if transformation.get("id").and_then(Value::as_str) != Some("timeSeriesTable") {
            continue;
        }
        let Some(ref_id_to_stat) = transformation
            .get("options")
            .and_then(|options| options.get("refIdToStat"))
        else {
            continue;
        };
        let options: Map<String, Value> = ref_id_to_stat
            .as_object()
            .into_iter()
            .flatten()
            .map(|(ref_id, stat)| (ref_id.clone(), json!({"stat": stat})))
            .collect();
        transformation.insert("options".to_string(), Value::Object(options));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::migration::fixtures::apply_panel_rule;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hidden_axis_keeps_time_axis_visible() {
        let panel = apply_panel_rule(
            ensure_x_axis_visibility,
            json!({"type": "timeseries", "fieldConfig": {"defaults": {"custom": {"axisPlacement": "hidden"}}, "overrides": []}}),
        );
        assert_eq!(
            panel["fieldConfig"]["overrides"],
            json!([{"matcher": {"id": "byType", "options": "time"}, "properties": [{"id": "custom.axisPlacement", "value": "auto"}]}])
        );

        let again = apply_panel_rule(ensure_x_axis_visibility, panel);
        assert_eq!(again["fieldConfig"]["overrides"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_visible_axis_is_untouched() {
        let field_config = json!({"defaults": {"custom": {"axisPlacement": "auto"}}, "overrides": []});
        let panel = apply_panel_rule(
            ensure_x_axis_visibility,
            json!({"type": "timeseries", "fieldConfig": field_config.clone()}),
        );
        assert_eq!(panel["fieldConfig"], field_config);
    }

    #[test]
    fn test_legend_visibility() {
        let hidden = apply_panel_rule(legend_show_legend, json!({"options": {"legend": {"displayMode": "hidden"}}}));
        assert_eq!(hidden["options"]["legend"], json!({"displayMode": "list", "showLegend": false}));

        let shown = apply_panel_rule(legend_show_legend, json!({"options": {"legend": {"displayMode": "table"}}}));
        assert_eq!(shown["options"]["legend"], json!({"displayMode": "table", "showLegend": true}));

        let none = apply_panel_rule(legend_show_legend, json!({"options": {}}));
        assert_eq!(none["options"], json!({}));
    }

    #[test]
    fn test_table_display_mode_becomes_cell_options() {
        let panel = apply_panel_rule(
            table_cell_options,
            json!({"type": "table", "fieldConfig": {
                "defaults": {"custom": {"align": "auto", "displayMode": "color-background-solid"}},
                "overrides": [{"matcher": {"id": "byName", "options": "x"}, "properties": [
                    {"id": "custom.displayMode", "value": "lcd-gauge"},
                    {"id": "custom.width", "value": 100}
                ]}]
            }}),
        );
        assert_eq!(
            panel["fieldConfig"]["defaults"]["custom"],
            json!({"align": "auto", "cellOptions": {"type": "color-background", "mode": "basic"}})
        );
        assert_eq!(
            panel["fieldConfig"]["overrides"][0]["properties"],
            json!([
                {"id": "custom.cellOptions", "value": {"type": "gauge", "mode": "lcd"}},
                {"id": "custom.width", "value": 100}
            ])
        );
        assert_eq!(cell_options_for_display_mode(&json!("json-view")), json!({"type": "json-view"}));
    }

    #[test]
    fn test_ref_id_stats_nest_under_stat() {
        let panel = apply_panel_rule(
            time_series_table_stats,
            json!({"transformations": [
                {"id": "timeSeriesTable", "options": {"refIdToStat": {"A": "mean", "B": "max"}}},
                {"id": "timeSeriesTable", "options": {}}
            ]}),
        );
        assert_eq!(
            panel["transformations"],
            json!([
                {"id": "timeSeriesTable", "options": {"A": {"stat": "mean"}, "B": {"stat": "max"}}},
                {"id": "timeSeriesTable", "options": {}}
            ])
        );
    }
}
