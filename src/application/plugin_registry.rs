// Panel plugin registry - metadata and type-change handlers supplied by the plugin subsystem
use crate::domain::panel::PanelModel;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A loaded panel plugin.
pub trait PanelPlugin: Send + Sync {
    fn id(&self) -> &str;

    fn version(&self) -> &str;

    /// Rebuild `options` and `fieldConfig` for a panel that switched to this plugin.
    /// `previous_options` holds everything the previous type stored on the panel.
    fn on_panel_type_changed(&self, panel: &mut PanelModel, previous_type: &str, previous_options: Map<String, Value>);
}

#[async_trait]
pub trait PanelPluginRegistry: Send + Sync {
    /// Whether a plugin with this id is installed. Answered from metadata, without loading it.
    fn is_installed(&self, plugin_id: &str) -> bool;

    /// Load a plugin. `Ok(None)` means the plugin is not installed.
    async fn load(&self, plugin_id: &str) -> anyhow::Result<Option<Arc<dyn PanelPlugin>>>;
}
