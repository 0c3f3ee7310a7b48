// Plugin migration service - Use case for finishing deferred panel type changes
use crate::application::plugin_registry::{PanelPlugin, PanelPluginRegistry};
use crate::domain::dashboard::DashboardModel;
use crate::domain::panel::PanelKey;
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct PluginMigrationService {
    plugins: Arc<dyn PanelPluginRegistry>,
}

impl PluginMigrationService {
    pub fn new(plugins: Arc<dyn PanelPluginRegistry>) -> Self {
        Self { plugins }
    }

    /// Loads the plugins that pending panels switched to and lets each one convert the
    /// options the previous type left behind. Returns how many panels were completed.
    pub async fn complete_pending(&self, dashboard: &mut DashboardModel) -> usize {
        let pending: Vec<PanelKey> = dashboard
            .all_panel_keys()
            .into_iter()
            .filter(|key| dashboard.arena[*key].auto_migrate_from.is_some())
            .collect();
        if pending.is_empty() {
            return 0;
        }

        let plugin_ids: BTreeSet<String> = pending
            .iter()
            .map(|key| dashboard.arena[*key].panel_type.clone())
            .collect();
        let plugins = self.load_plugins(plugin_ids).await;

        let mut completed = 0;
        for key in pending {
            let panel = &mut dashboard.arena[key];
            let Some(plugin) = plugins.get(&panel.panel_type) else {
                continue;
            };
            debug!(panel = panel.id, plugin = plugin.id(), "completing panel type change");
            panel.plugin_loaded(plugin.version(), |panel, previous_type, previous_options| {
                plugin.on_panel_type_changed(panel, previous_type, previous_options);
            });
            completed += 1;
        }
        if completed > 0 {
            dashboard.emit_panels_changed();
        }
        completed
    }

    async fn load_plugins(&self, plugin_ids: BTreeSet<String>) -> HashMap<String, Arc<dyn PanelPlugin>> {
        let results = join_all(plugin_ids.iter().map(|id| self.plugins.load(id))).await;

        let mut plugins = HashMap::new();
        for (id, result) in plugin_ids.into_iter().zip(results) {
            match result {
                Ok(Some(plugin)) => {
                    plugins.insert(id, plugin);
                }
                Ok(None) => {
                    warn!(plugin = %id, "panel plugin not installed, leaving panels pending");
                }
                Err(e) => {
                    warn!(plugin = %id, error = %e, "failed to load panel plugin");
                }
            }
        }
        plugins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::{Map, Value, json};
    use crate::domain::events::DashboardEvent;
    use crate::domain::panel::PanelModel;

    struct EchoPlugin;

    impl PanelPlugin for EchoPlugin {
        fn id(&self) -> &str {
            "stat"
        }

        fn version(&self) -> &str {
            "10.0.0"
        }

        fn on_panel_type_changed(&self, panel: &mut PanelModel, previous_type: &str, previous_options: Map<String, Value>) {
            let keys: Vec<&String> = previous_options.keys().collect();
            panel.options = Some(json!({"from": previous_type, "keys": keys}));
        }
    }

    struct Registry;

    #[async_trait]
    impl PanelPluginRegistry for Registry {
        fn is_installed(&self, plugin_id: &str) -> bool {
            plugin_id == "stat"
        }

        async fn load(&self, plugin_id: &str) -> anyhow::Result<Option<Arc<dyn PanelPlugin>>> {
            match plugin_id {
                "stat" => Ok(Some(Arc::new(EchoPlugin))),
                "gauge" => anyhow::bail!("plugin bundle missing"),
                _ => Ok(None),
            }
        }
    }

    fn dashboard() -> DashboardModel {
        DashboardModel::from_value(&json!({"panels": [
            {"id": 1, "type": "stat", "autoMigrateFrom": "singlestat", "valueName": "avg", "title": "cpu"},
            {"id": 2, "type": "row", "collapsed": true, "panels": [
                {"id": 3, "type": "stat", "autoMigrateFrom": "singlestat"}
            ]},
            {"id": 4, "type": "gauge", "autoMigrateFrom": "singlestat"},
            {"id": 5, "type": "stat"}
        ]}))
    }

    #[tokio::test]
    async fn test_pending_panels_complete_with_loaded_plugin() {
        let mut dashboard = dashboard();
        let mut events = dashboard.subscribe();
        let service = PluginMigrationService::new(Arc::new(Registry));

        assert_eq!(service.complete_pending(&mut dashboard).await, 2);

        let first = dashboard.arena.save_model(dashboard.panels[0]);
        assert_eq!(first["options"], json!({"from": "singlestat", "keys": ["valueName"]}));
        assert_eq!(first["pluginVersion"], json!("10.0.0"));
        assert_eq!(first["title"], json!("cpu"));
        assert!(first.get("autoMigrateFrom").is_none());

        let nested = dashboard.arena.children(dashboard.panels[1])[0];
        assert_eq!(dashboard.arena[nested].auto_migrate_from, None);
        assert_eq!(events.try_recv().ok(), Some(DashboardEvent::PanelsChanged));
    }

    #[tokio::test]
    async fn test_failed_plugin_leaves_panel_pending() {
        let mut dashboard = dashboard();
        let service = PluginMigrationService::new(Arc::new(Registry));
        service.complete_pending(&mut dashboard).await;

        let gauge = &dashboard.arena[dashboard.panels[2]];
        assert_eq!(gauge.auto_migrate_from.as_deref(), Some("singlestat"));
        assert!(gauge.get("pluginVersion").is_none());
    }

    #[tokio::test]
    async fn test_nothing_pending_loads_nothing() {
        let mut dashboard = DashboardModel::from_value(&json!({"panels": [{"id": 1, "type": "stat"}]}));
        let service = PluginMigrationService::new(Arc::new(Registry));
        assert_eq!(service.complete_pending(&mut dashboard).await, 0);
    }
}
