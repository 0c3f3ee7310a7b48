// Migration driver - folds the schema step table over a dashboard exactly once per version
use super::{
    LATEST_SCHEMA_VERSION, MigrationContext, MigrationOptions, MigrationPass, MigrationReport, PanelPass, PanelRule,
    PassState, SchemaStep, angular, schema_steps,
};
use crate::application::datasource_registry::DatasourceRegistry;
use crate::application::plugin_registry::PanelPluginRegistry;
use crate::domain::dashboard::DashboardModel;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub struct DashboardMigrator {
    context: MigrationContext,
    steps: Vec<SchemaStep>,
}

impl DashboardMigrator {
    pub fn new(
        datasources: Arc<dyn DatasourceRegistry>,
        panel_plugins: Arc<dyn PanelPluginRegistry>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            context: MigrationContext {
                datasources,
                panel_plugins,
                options,
            },
            steps: schema_steps(),
        }
    }

    pub fn context(&self) -> &MigrationContext {
        &self.context
    }

    /// Builds a dashboard from a stored document and migrates it to the latest schema.
    pub fn load(&self, raw: &Value) -> (DashboardModel, MigrationReport) {
        self.load_to(raw, LATEST_SCHEMA_VERSION)
    }

    /// Like [`load`](Self::load) but stops at `target`, for single-version verification.
    pub fn load_to(&self, raw: &Value, target: i64) -> (DashboardModel, MigrationReport) {
        let empty = Map::new();
        let legacy = raw.as_object().unwrap_or(&empty);

        let mut dashboard = DashboardModel::from_value(raw);
        let report = self.migrate(&mut dashboard, legacy, target);
        if self.context.options.auto_migrate_angular {
            angular::auto_migrate_panels(&mut dashboard);
        }
        dashboard.finish_load();
        (dashboard, report)
    }

    /// Runs every step with `schema_version < step.version <= target`. Dashboard parts run
    /// in step order; panel parts are applied afterwards, each to every top-level panel and
    /// to the panels nested inside it. A dashboard at or past `target` is left untouched.
    pub fn migrate(&self, dashboard: &mut DashboardModel, legacy: &Map<String, Value>, target: i64) -> MigrationReport {
        let from = dashboard.schema_version;
        if from >= target {
            return MigrationReport::unchanged(from);
        }

        let mut report = MigrationReport {
            from_version: from,
            to_version: target,
            applied: Vec::new(),
        };
        let mut state = PassState::default();
        let mut panel_rules: Vec<PanelRule> = Vec::new();

        for step in self.steps.iter().filter(|step| step.version > from && step.version <= target) {
            debug!(version = step.version, step = step.name, "applying schema step");
            if let Some(rule) = step.dashboard {
                rule(&mut MigrationPass {
                    dashboard: &mut *dashboard,
                    legacy,
                    context: &self.context,
                    state: &mut state,
                });
            }
            if let Some(rule) = step.panel {
                panel_rules.push(rule);
            }
            report.applied.push(step.name);
        }

        if !panel_rules.is_empty() {
            let mut pass = PanelPass {
                context: &self.context,
                state: &mut state,
            };
            for key in dashboard.panels.clone() {
                for rule in &panel_rules {
                    rule(&mut dashboard.arena[key], &mut pass);
                    for child in dashboard.arena.children(key) {
                        rule(&mut dashboard.arena[child], &mut pass);
                    }
                }
            }
        }

        dashboard.schema_version = target;
        info!(from = from, to = target, steps = report.applied.len(), "dashboard migrated");
        report
    }
}
