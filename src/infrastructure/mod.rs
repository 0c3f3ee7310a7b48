// Infrastructure layer - Configuration, collaborator snapshots and output encoding
pub mod canonical_json;
pub mod config;
pub mod datasource_snapshot;
pub mod plugin_catalog;
