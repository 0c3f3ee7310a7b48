// Application layer - Migration use cases and the collaborator contracts they consume
pub mod datasource_registry;
pub mod migration;
pub mod plugin_migration_service;
pub mod plugin_registry;
