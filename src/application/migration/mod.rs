// Schema migration - ordered per-version rule table and the state a pass threads through it
pub mod angular;
pub mod cloudwatch;
pub mod datasource_refs;
pub mod driver;
pub mod field_config;
pub mod grid_layout;
pub mod legacy_rules;
pub mod panel_options;
pub mod value_mappings;

use crate::application::datasource_registry::DatasourceRegistry;
use crate::application::plugin_registry::PanelPluginRegistry;
use crate::domain::dashboard::DashboardModel;
use crate::domain::panel::PanelModel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

pub use driver::DashboardMigrator;

/// Highest schema version this engine produces.
pub const LATEST_SCHEMA_VERSION: i64 = 39;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Switch deprecated angular panel types to their replacements on load.
    #[serde(default)]
    pub auto_migrate_angular: bool,
}

/// Collaborators injected once at wiring time and shared by every pass.
#[derive(Clone)]
pub struct MigrationContext {
    pub datasources: Arc<dyn DatasourceRegistry>,
    pub panel_plugins: Arc<dyn PanelPluginRegistry>,
    pub options: MigrationOptions,
}

/// Values a dashboard-level rule hands to the panel rules of the same pass.
#[derive(Debug, Default)]
pub struct PassState {
    pub next_panel_id: i64,
}

/// Dashboard-level view of a running migration.
pub struct MigrationPass<'a> {
    pub dashboard: &'a mut DashboardModel,
    /// The stored document as read, for legacy top-level keys the model does not keep.
    pub legacy: &'a Map<String, Value>,
    pub context: &'a MigrationContext,
    pub state: &'a mut PassState,
}

pub struct PanelPass<'a> {
    pub context: &'a MigrationContext,
    pub state: &'a mut PassState,
}

pub type DashboardRule = fn(&mut MigrationPass<'_>);
pub type PanelRule = fn(&mut PanelModel, &mut PanelPass<'_>);

/// One historical schema change. The dashboard part runs when the step is reached,
/// the panel part is queued and applied once every step has run.
pub struct SchemaStep {
    pub version: i64,
    pub name: &'static str,
    pub dashboard: Option<DashboardRule>,
    pub panel: Option<PanelRule>,
}

impl SchemaStep {
    const fn dashboard(version: i64, name: &'static str, rule: DashboardRule) -> Self {
        Self {
            version,
            name,
            dashboard: Some(rule),
            panel: None,
        }
    }

    const fn panel(version: i64, name: &'static str, rule: PanelRule) -> Self {
        Self {
            version,
            name,
            dashboard: None,
            panel: Some(rule),
        }
    }

    const fn both(version: i64, name: &'static str, dashboard: DashboardRule, panel: PanelRule) -> Self {
        Self {
            version,
            name,
            dashboard: Some(dashboard),
            panel: Some(panel),
        }
    }
}

/// Every schema step in ascending version order. Steps sharing a version run in list order.
pub fn schema_steps() -> Vec<SchemaStep> {
    vec![
        SchemaStep::both(2, "services filter and graph basics", legacy_rules::services_filter, legacy_rules::graph_basics),
        SchemaStep::both(3, "panel ids", legacy_rules::seed_panel_ids, legacy_rules::assign_panel_id),
        SchemaStep::panel(4, "alias y axis overrides", legacy_rules::alias_y_axis),
        SchemaStep::dashboard(6, "annotation pulldowns and variable defaults", legacy_rules::pulldowns_and_variables),
        SchemaStep::both(7, "timepicker and query ref ids", legacy_rules::nav_timepicker, legacy_rules::query_ref_ids),
        SchemaStep::panel(8, "influxdb select parts", legacy_rules::influx_select_parts),
        SchemaStep::panel(9, "singlestat thresholds", legacy_rules::singlestat_thresholds),
        SchemaStep::panel(10, "table style thresholds", legacy_rules::table_style_thresholds),
        SchemaStep::both(12, "variable refresh and graph axes", legacy_rules::variable_refresh_and_hide, legacy_rules::graph_axes),
        SchemaStep::panel(13, "graph thresholds", legacy_rules::graph_thresholds),
        SchemaStep::dashboard(14, "shared crosshair", legacy_rules::shared_crosshair),
        SchemaStep::dashboard(16, "grid layout", grid_layout::upgrade_to_grid_layout),
        SchemaStep::panel(17, "min span to max per row", grid_layout::min_span_to_max_per_row),
        SchemaStep::panel(18, "gauge options", panel_options::gauge_options),
        SchemaStep::panel(19, "panel links", panel_options::panel_links),
        SchemaStep::panel(20, "data link variable syntax", panel_options::data_link_variable_syntax),
        SchemaStep::panel(21, "series labels in data links", panel_options::data_link_series_labels),
        SchemaStep::panel(22, "table style alignment", panel_options::table_style_align),
        SchemaStep::dashboard(23, "multi value current", panel_options::align_current_with_multi),
        SchemaStep::panel(24, "angular table", panel_options::angular_table),
        SchemaStep::panel(26, "react text panel", panel_options::react_text_panel),
        SchemaStep::dashboard(27, "constant variables", panel_options::constant_variables),
        SchemaStep::both(28, "singlestat and variable tags", panel_options::remove_variable_tags, angular::migrate_singlestat),
        SchemaStep::dashboard(29, "query variable refresh", panel_options::query_variable_refresh),
        SchemaStep::panel(30, "value mappings and tooltip", value_mappings::upgrade_panel),
        SchemaStep::panel(31, "labels to fields merge", panel_options::labels_to_fields_merge),
        SchemaStep::both(32, "cloudwatch statistics", cloudwatch::migrate_annotations, cloudwatch::migrate_queries),
        SchemaStep::both(33, "datasource references", datasource_refs::variable_refs, datasource_refs::panel_refs),
        SchemaStep::both(34, "cloudwatch statistics revisited", cloudwatch::migrate_annotations, cloudwatch::migrate_queries),
        SchemaStep::panel(35, "time axis visibility", field_config::ensure_x_axis_visibility),
        SchemaStep::both(36, "default datasource", datasource_refs::default_datasource, datasource_refs::panel_default_datasource),
        SchemaStep::panel(37, "legend visibility", field_config::legend_show_legend),
        SchemaStep::panel(38, "table cell options", field_config::table_cell_options),
        SchemaStep::panel(39, "time series table stats", field_config::time_series_table_stats),
    ]
}

/// Outcome of one migration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub from_version: i64,
    pub to_version: i64,
    pub applied: Vec<&'static str>,
}

impl MigrationReport {
    pub fn unchanged(version: i64) -> Self {
        Self {
            from_version: version,
            to_version: version,
            applied: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.applied.is_empty() && self.from_version == self.to_version
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_ascend_and_end_at_latest() {
        let steps = schema_steps();
        assert!(steps.windows(2).all(|pair| pair[0].version < pair[1].version));
        assert_eq!(steps.last().map(|step| step.version), Some(LATEST_SCHEMA_VERSION));
        assert!(steps.iter().all(|step| step.dashboard.is_some() || step.panel.is_some()));
    }
}
