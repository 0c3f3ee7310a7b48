// Application state shared by the command handlers
use crate::application::migration::DashboardMigrator;
use crate::application::plugin_migration_service::PluginMigrationService;
use crate::infrastructure::config::OutputSettings;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub migrator: Arc<DashboardMigrator>,
    pub plugin_migrations: PluginMigrationService,
    pub output: OutputSettings,
    pub target_version: i64,
}
