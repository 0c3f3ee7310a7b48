// Static panel plugin catalog - built-in panel plugins plus the ones named in configuration
use crate::application::migration::angular::{SINGLESTAT_PANEL_TYPE, SINGLESTAT_PLUGIN_ID};
use crate::application::migration::value_mappings::upgrade_value_mappings;
use crate::application::plugin_registry::{PanelPlugin, PanelPluginRegistry};
use crate::domain::lenient;
use crate::domain::panel::PanelModel;
use crate::infrastructure::config::PanelPluginConfig;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Arc;

pub const BUILTIN_PLUGIN_VERSION: &str = "10.0.0";

const BASIC_PANEL_TYPES: [&str; 6] = ["table", "piechart", "geomap", "text", "barchart", "news"];

fn empty_field_config() -> Value {
    json!({"defaults": {}, "overrides": []})
}

/// Legacy stat names and the reducer that replaced each.
fn reducer_for(value_name: Option<&Value>) -> &'static str {
    match value_name.and_then(Value::as_str) {
        Some("min") => "min",
        Some("max") => "max",
        Some("current") => "lastNotNull",
        Some("total") => "sum",
        Some("first") => "firstNotNull",
        Some("delta") => "delta",
        Some("diff") => "diff",
        Some("range") => "range",
        Some("count") => "count",
        Some("last_time") => "lastNotNull",
        _ => "mean",
    }
}

/// Threshold steps from a comma separated level list and one more color than levels.
fn threshold_steps(levels: &Value, colors: &Value) -> Option<Value> {
    let levels: Vec<Value> = levels
        .as_str()?
        .split(',')
        .map(|level| lenient::parse_int(level).map_or(Value::Null, Value::from))
        .collect();
    let colors = colors.as_array()?;
    let steps: Vec<Value> = colors
        .iter()
        .enumerate()
        .map(|(index, color)| {
            let value = match index {
                0 => Value::Null,
                _ => levels.get(index - 1).cloned().unwrap_or(Value::Null),
            };
            json!({"value": value, "color": color})
        })
        .collect();
    Some(json!({"mode": "absolute", "steps": steps}))
}

fn legacy_value_mappings(previous: &Map<String, Value>, thresholds: Option<&Value>) -> Option<Value> {
    let has_entries = |key: &str| previous.get(key).and_then(Value::as_array).is_some_and(|maps| !maps.is_empty());
    let mapping_type = match previous.get("mappingType").and_then(lenient::as_i64) {
        Some(kind) => kind,
        None if has_entries("valueMaps") => 1,
        None if has_entries("rangeMaps") => 2,
        None => return None,
    };
    let source = match mapping_type {
        1 => "valueMaps",
        2 => "rangeMaps",
        _ => return None,
    };
    let mappings: Vec<Value> = previous
        .get(source)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .map(|map| {
            let mut map = map.clone();
            map.insert("type".to_string(), json!(mapping_type));
            Value::Object(map)
        })
        .collect();
    upgrade_value_mappings(Some(&Value::Array(mappings)), thresholds)
}

/// Successor of the angular singlestat panel, either `stat` or `gauge`.
struct SinglestatSuccessor {
    id: &'static str,
    version: String,
}

impl SinglestatSuccessor {
    fn convert(&self, previous: &Map<String, Value>) -> (Value, Value) {
        let mut defaults = Map::new();
        if let Some(unit) = previous.get("format").filter(|format| lenient::truthy(Some(format))) {
            defaults.insert("unit".to_string(), unit.clone());
        }
        if let Some(decimals) = previous.get("decimals").filter(|decimals| decimals.is_number()) {
            defaults.insert("decimals".to_string(), decimals.clone());
        }
        if let Some(null_text) = previous.get("nullText").filter(|text| lenient::truthy(Some(text))) {
            defaults.insert("noValue".to_string(), null_text.clone());
        }
        if let (Some(levels), Some(colors)) = (previous.get("thresholds"), previous.get("colors")) {
            if let Some(thresholds) = threshold_steps(levels, colors) {
                defaults.insert("thresholds".to_string(), thresholds);
            }
        }
        if let Some(mappings) = legacy_value_mappings(previous, defaults.get("thresholds")) {
            defaults.insert("mappings".to_string(), mappings);
        }

        let mut options = Map::new();
        options.insert(
            "reduceOptions".to_string(),
            json!({"calcs": [reducer_for(previous.get("valueName"))], "fields": "", "values": false}),
        );
        options.insert("orientation".to_string(), json!("horizontal"));

        let gauge = previous.get("gauge");
        if self.id == "gauge" {
            for (from, to) in [("minValue", "min"), ("maxValue", "max")] {
                if let Some(bound) = gauge.and_then(|gauge| gauge.get(from)).filter(|bound| !bound.is_null()) {
                    defaults.insert(to.to_string(), bound.clone());
                }
            }
            let flag = |key: &str| json!(lenient::truthy(gauge.and_then(|gauge| gauge.get(key))));
            options.insert("showThresholdMarkers".to_string(), flag("thresholdMarkers"));
            options.insert("showThresholdLabels".to_string(), flag("thresholdLabels"));
        } else {
            let color_mode = if lenient::truthy(previous.get("colorBackground")) {
                "background"
            } else if lenient::truthy(previous.get("colorValue")) {
                "value"
            } else {
                "none"
            };
            options.insert("colorMode".to_string(), json!(color_mode));
            let sparkline = previous.get("sparkline").and_then(|sparkline| sparkline.get("show"));
            let graph_mode = if lenient::truthy(sparkline) { "area" } else { "none" };
            options.insert("graphMode".to_string(), json!(graph_mode));
            options.insert("justifyMode".to_string(), json!("auto"));
            options.insert("textMode".to_string(), json!("auto"));
        }

        (Value::Object(options), json!({"defaults": defaults, "overrides": []}))
    }
}

impl PanelPlugin for SinglestatSuccessor {
    fn id(&self) -> &str {
        self.id
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn on_panel_type_changed(&self, panel: &mut PanelModel, previous_type: &str, previous_options: Map<String, Value>) {
        if previous_type != SINGLESTAT_PANEL_TYPE && previous_type != SINGLESTAT_PLUGIN_ID {
            panel.options = Some(json!({}));
            panel.field_config = Some(empty_field_config());
            return;
        }
        let (options, field_config) = self.convert(&previous_options);
        panel.options = Some(options);
        panel.field_config = Some(field_config);
    }
}

/// Time series successor of the graph panel. Carries over legend, tooltip and left axis settings.
struct TimeSeriesPlugin {
    version: String,
}

impl PanelPlugin for TimeSeriesPlugin {
    fn id(&self) -> &str {
        "timeseries"
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn on_panel_type_changed(&self, panel: &mut PanelModel, previous_type: &str, previous_options: Map<String, Value>) {
        panel.field_config = Some(empty_field_config());
        panel.options = Some(json!({}));
        if previous_type != "graph" {
            return;
        }

        let legend = previous_options.get("legend");
        let legend_flag = |key: &str| lenient::truthy(legend.and_then(|legend| legend.get(key)));
        let shown = legend.and_then(|legend| legend.get("show")) != Some(&Value::Bool(false));
        let tooltip_shared = lenient::truthy(previous_options.get("tooltip").and_then(|tooltip| tooltip.get("shared")));
        let display_mode = if legend_flag("alignAsTable") { "table" } else { "list" };
        let placement = if legend_flag("rightSide") { "right" } else { "bottom" };
        let tooltip_mode = if tooltip_shared { "multi" } else { "single" };
        panel.options = Some(json!({
            "legend": {"showLegend": shown, "displayMode": display_mode, "placement": placement, "calcs": []},
            "tooltip": {"mode": tooltip_mode},
        }));

        let mut defaults = Map::new();
        if let Some(Value::Object(axis)) = previous_options.get("yaxes").and_then(|axes| axes.get(0)) {
            if let Some(unit) = axis.get("format").filter(|unit| lenient::truthy(Some(unit))) {
                defaults.insert("unit".to_string(), unit.clone());
            }
            for key in ["min", "max", "decimals"] {
                if let Some(bound) = axis.get(key).and_then(lenient::parse_float) {
                    defaults.insert(key.to_string(), lenient::number(bound));
                }
            }
        }
        panel.field_config = Some(json!({"defaults": defaults, "overrides": []}));
    }
}

/// A panel plugin without any conversion for the type it replaces.
struct BasicPanelPlugin {
    id: String,
    version: String,
}

impl PanelPlugin for BasicPanelPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn on_panel_type_changed(&self, panel: &mut PanelModel, _previous_type: &str, previous_options: Map<String, Value>) {
        panel.options = Some(json!({}));
        panel.field_config = match previous_options.get("fieldConfig") {
            Some(Value::Object(field_config)) => Some(Value::Object(field_config.clone())),
            _ => Some(empty_field_config()),
        };
    }
}

#[derive(Clone, Default)]
pub struct StaticPanelPluginRegistry {
    plugins: HashMap<String, Arc<dyn PanelPlugin>>,
}

impl StaticPanelPluginRegistry {
    /// Every plugin that ships with the engine.
    pub fn builtin() -> Self {
        let version = BUILTIN_PLUGIN_VERSION.to_string();
        let mut registry = Self::default();
        for id in ["stat", "gauge"] {
            registry.register(Arc::new(SinglestatSuccessor {
                id,
                version: version.clone(),
            }));
        }
        registry.register(Arc::new(TimeSeriesPlugin { version: version.clone() }));
        for id in BASIC_PANEL_TYPES {
            registry.register(Arc::new(BasicPanelPlugin {
                id: id.to_string(),
                version: version.clone(),
            }));
        }
        registry
    }

    /// Built-in plugins plus configured ones. A configured id replaces a built-in plugin.
    pub fn from_config(entries: &[PanelPluginConfig]) -> Self {
        let mut registry = Self::builtin();
        for entry in entries {
            registry.register(Arc::new(BasicPanelPlugin {
                id: entry.id.clone(),
                version: entry.version.clone(),
            }));
        }
        registry
    }

    pub fn register(&mut self, plugin: Arc<dyn PanelPlugin>) {
        self.plugins.insert(plugin.id().to_string(), plugin);
    }
}

#[async_trait]
impl PanelPluginRegistry for StaticPanelPluginRegistry {
    fn is_installed(&self, plugin_id: &str) -> bool {
        self.plugins.contains_key(plugin_id)
    }

    async fn load(&self, plugin_id: &str) -> anyhow::Result<Option<Arc<dyn PanelPlugin>>> {
        Ok(self.plugins.get(plugin_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn change_type(plugin_id: &str, previous_type: &str, previous: Value) -> PanelModel {
        let registry = StaticPanelPluginRegistry::builtin();
        let plugin = registry.load(plugin_id).await.unwrap().unwrap();
        let mut panel = PanelModel::default();
        let previous = previous.as_object().cloned().unwrap_or_default();
        plugin.on_panel_type_changed(&mut panel, previous_type, previous);
        panel
    }

    #[tokio::test]
    async fn test_singlestat_options_become_stat_options() {
        let panel = change_type(
            "stat",
            "singlestat",
            json!({
                "valueName": "current",
                "format": "percent",
                "decimals": 1,
                "thresholds": "50,80",
                "colors": ["green", "orange", "red"],
                "colorBackground": true,
                "sparkline": {"show": true},
                "valueMaps": [{"value": "null", "op": "=", "text": "N/A"}]
            }),
        )
        .await;
        assert_eq!(
            panel.options,
            Some(json!({
                "reduceOptions": {"calcs": ["lastNotNull"], "fields": "", "values": false},
                "orientation": "horizontal",
                "colorMode": "background",
                "graphMode": "area",
                "justifyMode": "auto",
                "textMode": "auto"
            }))
        );
        assert_eq!(
            panel.field_config,
            Some(json!({
                "defaults": {
                    "unit": "percent",
                    "decimals": 1,
                    "thresholds": {"mode": "absolute", "steps": [
                        {"value": null, "color": "green"},
                        {"value": 50, "color": "orange"},
                        {"value": 80, "color": "red"}
                    ]},
                    "mappings": [{"type": "special", "options": {"match": "null", "result": {"text": "N/A"}}}]
                },
                "overrides": []
            }))
        );
    }

    #[tokio::test]
    async fn test_gauge_takes_bounds_and_markers() {
        let panel = change_type(
            "gauge",
            "singlestat",
            json!({"gauge": {"show": true, "minValue": 0, "maxValue": 200, "thresholdMarkers": true}}),
        )
        .await;
        let options = panel.options.unwrap_or_default();
        assert_eq!(options["showThresholdMarkers"], json!(true));
        assert_eq!(options["showThresholdLabels"], json!(false));
        assert_eq!(options["reduceOptions"]["calcs"], json!(["mean"]));
        let field_config = panel.field_config.unwrap_or_default();
        assert_eq!(field_config["defaults"], json!({"min": 0, "max": 200}));
    }

    #[tokio::test]
    async fn test_graph_legend_and_axis_carry_over() {
        let panel = change_type(
            "timeseries",
            "graph",
            json!({
                "legend": {"show": true, "alignAsTable": true, "rightSide": false},
                "tooltip": {"shared": true},
                "yaxes": [{"format": "bytes", "min": "0", "max": null}, {"format": "short"}]
            }),
        )
        .await;
        assert_eq!(
            panel.options,
            Some(json!({
                "legend": {"showLegend": true, "displayMode": "table", "placement": "bottom", "calcs": []},
                "tooltip": {"mode": "multi"}
            }))
        );
        assert_eq!(panel.field_config, Some(json!({"defaults": {"unit": "bytes", "min": 0}, "overrides": []})));
    }

    #[tokio::test]
    async fn test_configured_plugins_are_installed() {
        let registry = StaticPanelPluginRegistry::from_config(&[PanelPluginConfig {
            id: "grafana-singlestat-panel".to_string(),
            version: "2.0.1".to_string(),
        }]);
        assert!(registry.is_installed("grafana-singlestat-panel"));
        assert!(registry.is_installed("stat"));
        assert!(!registry.is_installed("graph"));
        let plugin = registry.load("grafana-singlestat-panel").await.unwrap().unwrap();
        assert_eq!(plugin.version(), "2.0.1");
        assert!(registry.load("graph").await.unwrap().is_none());
    }
}
