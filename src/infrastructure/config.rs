use crate::application::migration::{LATEST_SCHEMA_VERSION, MigrationOptions};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "config/migrator";
const ENV_PREFIX: &str = "DASHBOARD_MIGRATOR";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MigratorConfig {
    #[serde(default)]
    pub migration: MigrationSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub datasources: Vec<DatasourceConfig>,
    #[serde(default)]
    pub panel_plugins: Vec<PanelPluginConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MigrationSettings {
    pub target_version: Option<i64>,
    #[serde(default)]
    pub auto_migrate_angular: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputSettings {
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uid: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PanelPluginConfig {
    pub id: String,
    pub version: String,
}

fn default_pretty() -> bool {
    true
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { pretty: default_pretty() }
    }
}

impl MigrationSettings {
    pub fn target_version(&self) -> i64 {
        self.target_version.unwrap_or(LATEST_SCHEMA_VERSION)
    }

    pub fn options(&self) -> MigrationOptions {
        MigrationOptions {
            auto_migrate_angular: self.auto_migrate_angular,
        }
    }
}

fn build(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<MigratorConfig> {
    let settings = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Loads `config/migrator.toml` when present, or the given file which must exist,
/// then applies `DASHBOARD_MIGRATOR__SECTION__KEY` environment overrides.
pub fn load_migrator_config(path: Option<&Path>) -> anyhow::Result<MigratorConfig> {
    let source = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };
    build(config::Config::builder().add_source(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> MigratorConfig {
        build(config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml))).unwrap()
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("");
        assert_eq!(config.migration.target_version(), LATEST_SCHEMA_VERSION);
        assert!(!config.migration.auto_migrate_angular);
        assert!(config.output.pretty);
        assert!(config.datasources.is_empty());
    }

    #[test]
    fn test_sections_deserialize() {
        let config = parse(
            r#"
            [migration]
            target_version = 33
            auto_migrate_angular = true

            [output]
            pretty = false

            [[datasources]]
            name = "prom"
            type = "prometheus"
            uid = "prom-uid"
            is_default = true

            [[panel_plugins]]
            id = "grafana-singlestat-panel"
            version = "2.0.0"
            "#,
        );
        assert_eq!(config.migration.target_version(), 33);
        assert!(config.migration.options().auto_migrate_angular);
        assert!(!config.output.pretty);
        assert_eq!(config.datasources[0].kind, "prometheus");
        assert!(config.datasources[0].is_default);
        assert_eq!(config.panel_plugins[0].version, "2.0.0");
    }
}
