// Angular panel replacement - retired panel types move to their successors
use super::PanelPass;
use crate::domain::dashboard::DashboardModel;
use crate::domain::lenient;
use crate::domain::panel::PanelModel;
use tracing::debug;

pub const SINGLESTAT_PANEL_TYPE: &str = "singlestat";
pub const SINGLESTAT_PLUGIN_ID: &str = "grafana-singlestat-panel";

/// Retired panel type and the type that replaces it.
const AUTO_MIGRATIONS: [(&str, &str); 6] = [
    ("graph", "timeseries"),
    ("table-old", "table"),
    (SINGLESTAT_PANEL_TYPE, "stat"),
    (SINGLESTAT_PLUGIN_ID, "stat"),
    ("grafana-piechart-panel", "piechart"),
    ("grafana-worldmap-panel", "geomap"),
];

/// Switches the type and records the previous one. Option conversion waits until the
/// new plugin is loaded.
fn defer_type_change(panel: &mut PanelModel, new_type: &str) {
    debug!(panel = panel.id, from = %panel.panel_type, to = new_type, "deferring panel type change");
    let previous = std::mem::replace(&mut panel.panel_type, new_type.to_string());
    panel.auto_migrate_from = Some(previous);
}

// v28

pub fn migrate_singlestat(panel: &mut PanelModel, pass: &mut PanelPass<'_>) {
    if panel.panel_type != SINGLESTAT_PANEL_TYPE {
        return;
    }
    if pass.context.panel_plugins.is_installed(SINGLESTAT_PLUGIN_ID) {
        panel.panel_type = SINGLESTAT_PLUGIN_ID.to_string();
        return;
    }
    let shows_gauge = lenient::truthy(panel.get("gauge").and_then(|gauge| gauge.get("show")));
    defer_type_change(panel, if shows_gauge { "gauge" } else { "stat" });
}

fn replacement_for(panel_type: &str) -> Option<&'static str> {
    AUTO_MIGRATIONS
        .iter()
        .find(|(retired, _)| *retired == panel_type)
        .map(|(_, replacement)| *replacement)
}

/// Moves every retired panel type, nested panels included, to its replacement.
/// Returns how many panels changed.
pub fn auto_migrate_panels(dashboard: &mut DashboardModel) -> usize {
    let mut changed = 0;
    for key in dashboard.all_panel_keys() {
        let panel = &mut dashboard.arena[key];
        if let Some(replacement) = replacement_for(&panel.panel_type) {
            defer_type_change(panel, replacement);
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::migration::fixtures::{NoPlugins, apply_panel_rule, context};
    use crate::application::migration::PassState;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_singlestat_becomes_stat_or_gauge() {
        let stat = apply_panel_rule(migrate_singlestat, json!({"type": "singlestat", "valueName": "avg"}));
        assert_eq!(stat["type"], json!("stat"));
        assert_eq!(stat["autoMigrateFrom"], json!("singlestat"));
        assert_eq!(stat["valueName"], json!("avg"));

        let gauge = apply_panel_rule(migrate_singlestat, json!({"type": "singlestat", "gauge": {"show": true}}));
        assert_eq!(gauge["type"], json!("gauge"));
    }

    #[test]
    fn test_installed_singlestat_plugin_is_preferred() {
        let mut context = context();
        context.panel_plugins = Arc::new(NoPlugins {
            installed: vec![SINGLESTAT_PLUGIN_ID],
        });
        let mut state = PassState::default();
        let (mut panel, _) = PanelModel::from_value(json!({"type": "singlestat"}));
        migrate_singlestat(&mut panel, &mut PanelPass { context: &context, state: &mut state });
        assert_eq!(panel.panel_type, SINGLESTAT_PLUGIN_ID);
        assert_eq!(panel.auto_migrate_from, None);
    }

    #[test]
    fn test_auto_migration_reaches_nested_panels() {
        let mut dashboard = DashboardModel::from_value(&json!({"panels": [
            {"id": 1, "type": "graph"},
            {"id": 2, "type": "row", "collapsed": true, "panels": [{"id": 3, "type": "grafana-piechart-panel"}]},
            {"id": 4, "type": "timeseries"}
        ]}));
        assert_eq!(auto_migrate_panels(&mut dashboard), 2);
        let types: Vec<_> = dashboard
            .all_panel_keys()
            .into_iter()
            .map(|key| {
                let panel = &dashboard.arena[key];
                (panel.panel_type.clone(), panel.auto_migrate_from.clone())
            })
            .collect();
        assert_eq!(
            types,
            vec![
                ("timeseries".to_string(), Some("graph".to_string())),
                ("row".to_string(), None),
                ("piechart".to_string(), Some("grafana-piechart-panel".to_string())),
                ("timeseries".to_string(), None),
            ]
        );
    }
}
