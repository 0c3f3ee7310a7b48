// Main entry point - Dependency injection and command dispatch
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use dashboard_migrator::application::migration::DashboardMigrator;
use dashboard_migrator::application::plugin_migration_service::PluginMigrationService;
use dashboard_migrator::infrastructure::config::load_migrator_config;
use dashboard_migrator::infrastructure::datasource_snapshot::InMemoryDatasourceRegistry;
use dashboard_migrator::infrastructure::plugin_catalog::StaticPanelPluginRegistry;
use dashboard_migrator::presentation::app_state::AppState;
use dashboard_migrator::presentation::cli::{Cli, Command};
use dashboard_migrator::presentation::handlers::migrate_files;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; documents go to stdout, diagnostics to stderr
    let default_level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = load_migrator_config(cli.config.as_deref())?;

    // Create collaborators (infrastructure layer)
    let datasources = Arc::new(
        InMemoryDatasourceRegistry::from_config(&config.datasources).context("invalid datasource configuration")?,
    );
    let plugins = Arc::new(StaticPanelPluginRegistry::from_config(&config.panel_plugins));

    // Create services (application layer)
    let migrator = DashboardMigrator::new(datasources, plugins.clone(), config.migration.options());
    let state = AppState {
        migrator: Arc::new(migrator),
        plugin_migrations: PluginMigrationService::new(plugins),
        output: config.output.clone(),
        target_version: config.migration.target_version(),
    };

    match cli.command {
        Command::Migrate(args) => {
            let outcomes = migrate_files(&state, &args).await?;
            tracing::info!(files = outcomes.len(), "done");
        }
    }

    Ok(())
}
