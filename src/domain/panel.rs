// Panel domain model - typed envelope over free-form plugin JSON, stored in an arena
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::{Index, IndexMut};

use super::grid::GridPos;
use super::lenient;

pub const ROW_PANEL_TYPE: &str = "row";
pub const ADD_PANEL_TYPE: &str = "add-panel";

/// Properties that survive a panel type change. Everything else is handed to the
/// new plugin as the previous plugin's options.
const MUST_KEEP_PROPS: &[&str] = &[
    "id",
    "gridPos",
    "type",
    "title",
    "scopedVars",
    "repeat",
    "repeatPanelId",
    "repeatDirection",
    "repeatedByRow",
    "minSpan",
    "collapsed",
    "panels",
    "targets",
    "datasource",
    "timeFrom",
    "timeShift",
    "hideTimeOverride",
    "description",
    "links",
    "cacheTimeout",
    "queryCachingTTL",
    "transparent",
    "pluginVersion",
    "libraryPanel",
    "maxDataPoints",
    "interval",
    "transformations",
];

/// Handle to a panel slot inside a [`PanelArena`]. The generation tells a live panel
/// apart from an earlier one released from the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelKey {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub ref_id: String,
    #[serde(default, deserialize_with = "lenient::explicit", skip_serializing_if = "Option::is_none")]
    pub datasource: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Query {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.extra.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.extra.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.extra.remove(key)
    }

    /// Datasource reference when one is set and not the null sentinel.
    pub fn datasource_ref(&self) -> Option<&Value> {
        self.datasource.as_ref().filter(|ds| !ds.is_null())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelModel {
    /// `0` marks a panel that has not been given an id yet.
    #[serde(default, deserialize_with = "lenient::id", skip_serializing_if = "is_zero")]
    pub id: i64,
    #[serde(rename = "type", default, deserialize_with = "lenient::string", skip_serializing_if = "String::is_empty")]
    pub panel_type: String,
    #[serde(default, deserialize_with = "grid_pos")]
    pub grid_pos: GridPos,
    #[serde(default, deserialize_with = "lenient::explicit", skip_serializing_if = "Option::is_none")]
    pub datasource: Option<Value>,
    #[serde(default, deserialize_with = "lenient::opt_vec", skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<Query>>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub repeat: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub repeat_direction: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64", skip_serializing_if = "Option::is_none")]
    pub max_per_row: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64", skip_serializing_if = "Option::is_none")]
    pub repeat_panel_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64", skip_serializing_if = "Option::is_none")]
    pub repeat_iteration: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_bool", skip_serializing_if = "Option::is_none")]
    pub repeated_by_row: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_object", skip_serializing_if = "Option::is_none")]
    pub scoped_vars: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient::opt_bool", skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub auto_migrate_from: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_value", skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(default, deserialize_with = "lenient::opt_value", skip_serializing_if = "Option::is_none")]
    pub field_config: Option<Value>,
    /// Children of a row panel, held here while the row is collapsed.
    #[serde(skip)]
    pub children: Option<Vec<PanelKey>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_zero(id: &i64) -> bool {
    *id == 0
}

fn grid_pos<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<GridPos, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(GridPos::from_value(&value))
}

impl PanelModel {
    /// Decodes a stored panel. Nested `panels` are returned separately for the arena to own.
    pub fn from_value(value: Value) -> (Self, Option<Vec<Value>>) {
        let Value::Object(mut map) = value else {
            return (Self::default(), None);
        };
        let nested = match map.remove("panels") {
            Some(Value::Array(items)) => Some(items),
            Some(_) => Some(Vec::new()),
            None => None,
        };
        let panel = serde_json::from_value(Value::Object(map)).unwrap_or_default();
        (panel, nested)
    }

    pub fn is_row(&self) -> bool {
        self.panel_type == ROW_PANEL_TYPE
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed.unwrap_or(false)
    }

    /// The variable this panel repeats over, ignoring an empty name.
    pub fn repeat_variable(&self) -> Option<&str> {
        self.repeat.as_deref().filter(|name| !name.is_empty())
    }

    pub fn is_repeat_clone(&self) -> bool {
        self.repeat_panel_id.is_some_and(|id| id != 0)
    }

    pub fn is_repeated_by_row(&self) -> bool {
        self.repeated_by_row.unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.extra.get_mut(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.extra.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.extra.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.extra.remove(key)
    }

    pub fn targets_mut(&mut self) -> &mut Vec<Query> {
        self.targets.get_or_insert_with(Vec::new)
    }

    pub fn options_object_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.options.as_mut().and_then(Value::as_object_mut)
    }

    pub fn field_config_object_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.field_config.as_mut().and_then(Value::as_object_mut)
    }

    pub fn set_scoped_var(&mut self, name: &str, option: Value) {
        self.scoped_vars
            .get_or_insert_with(Map::new)
            .insert(name.to_string(), option);
    }

    /// Stored form of this panel without its children.
    pub fn save_model(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Finishes a deferred type change once the plugin for the new type is available.
    ///
    /// Everything outside the kept properties is stripped and handed to `on_type_changed`
    /// together with the previous type; the handler rebuilds `options` and `fieldConfig`.
    pub fn plugin_loaded<F>(&mut self, plugin_version: &str, on_type_changed: F)
    where
        F: FnOnce(&mut PanelModel, &str, Map<String, Value>),
    {
        if let Some(previous_type) = self.auto_migrate_from.take() {
            let previous_options = self.take_options_to_remember();
            on_type_changed(self, &previous_type, previous_options);
        }
        self.set("pluginVersion", Value::String(plugin_version.to_string()));
    }

    fn take_options_to_remember(&mut self) -> Map<String, Value> {
        let mut remembered = Map::new();
        if let Some(options) = self.options.take() {
            remembered.insert("options".to_string(), options);
        }
        if let Some(field_config) = self.field_config.take() {
            remembered.insert("fieldConfig".to_string(), field_config);
        }
        let dropped: Vec<String> = self
            .extra
            .keys()
            .filter(|key| !MUST_KEEP_PROPS.contains(&key.as_str()))
            .cloned()
            .collect();
        for key in dropped {
            if let Some(value) = self.extra.remove(&key) {
                remembered.insert(key, value);
            }
        }
        remembered
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    panel: Option<PanelModel>,
}

/// Owns every panel of a dashboard. Nesting is expressed through `PanelModel::children`.
/// Released slots are reused, so repeat cycles do not grow the arena.
#[derive(Debug, Clone, Default)]
pub struct PanelArena {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl PanelArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, panel: PanelModel) -> PanelKey {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.generation = slot.generation.wrapping_add(1);
            slot.panel = Some(panel);
            return PanelKey { index, generation: slot.generation };
        }
        self.slots.push(Slot { generation: 0, panel: Some(panel) });
        PanelKey { index: self.slots.len() - 1, generation: 0 }
    }

    /// Decodes a stored panel and all of its nested panels.
    pub fn insert_value(&mut self, value: Value) -> PanelKey {
        let (mut panel, nested) = PanelModel::from_value(value);
        panel.children = nested.map(|items| items.into_iter().map(|item| self.insert_value(item)).collect());
        self.insert(panel)
    }

    pub fn get(&self, key: PanelKey) -> Option<&PanelModel> {
        self.slots
            .get(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.panel.as_ref())
    }

    pub fn get_mut(&mut self, key: PanelKey) -> Option<&mut PanelModel> {
        self.slots
            .get_mut(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.panel.as_mut())
    }

    /// Releases a panel and everything nested under it.
    pub fn remove(&mut self, key: PanelKey) -> Option<PanelModel> {
        let panel = self
            .slots
            .get_mut(key.index)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.panel.take())?;
        self.free.push(key.index);
        for child in panel.children.iter().flatten() {
            self.remove(*child);
        }
        Some(panel)
    }

    /// Copies a panel together with its nested panels into fresh slots.
    pub fn deep_clone(&mut self, key: PanelKey) -> Option<PanelKey> {
        let mut copy = self.get(key)?.clone();
        if let Some(children) = copy.children.take() {
            copy.children = Some(children.into_iter().filter_map(|child| self.deep_clone(child)).collect());
        }
        Some(self.insert(copy))
    }

    pub fn children(&self, key: PanelKey) -> Vec<PanelKey> {
        self.get(key).and_then(|panel| panel.children.clone()).unwrap_or_default()
    }

    /// Stored form of a panel including its nested panels.
    pub fn save_model(&self, key: PanelKey) -> Value {
        let Some(panel) = self.get(key) else {
            return Value::Null;
        };
        let mut model = panel.save_model();
        if let (Some(children), Value::Object(map)) = (&panel.children, &mut model) {
            let nested = children.iter().map(|child| self.save_model(*child)).collect();
            map.insert("panels".to_string(), Value::Array(nested));
        }
        model
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Slots allocated so far, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Index<PanelKey> for PanelArena {
    type Output = PanelModel;

    /// Panics on a released key, like slice indexing out of bounds.
    fn index(&self, key: PanelKey) -> &PanelModel {
        match self.get(key) {
            Some(panel) => panel,
            None => panic!("panel {key:?} was released"),
        }
    }
}

impl IndexMut<PanelKey> for PanelArena {
    fn index_mut(&mut self, key: PanelKey) -> &mut PanelModel {
        match self.get_mut(key) {
            Some(panel) => panel,
            None => panic!("panel {key:?} was released"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let raw = json!({
            "id": 7,
            "type": "graph",
            "gridPos": {"x": 0, "y": 1, "w": 12, "h": 8},
            "legend": {"show": true},
            "pluginSpecific": [1, 2, 3]
        });
        let mut arena = PanelArena::new();
        let key = arena.insert_value(raw.clone());
        assert_eq!(arena.save_model(key), raw);
    }

    #[test]
    fn test_explicit_null_datasource_is_kept() {
        let (panel, _) = PanelModel::from_value(json!({"id": 1, "datasource": null}));
        assert_eq!(panel.datasource, Some(Value::Null));
        let (panel, _) = PanelModel::from_value(json!({"id": 1}));
        assert_eq!(panel.datasource, None);
    }

    #[test]
    fn test_malformed_fields_are_coerced() {
        let (panel, nested) = PanelModel::from_value(json!({
            "id": "12",
            "targets": [{"refId": "A"}, 5, "junk"],
            "panels": "nope",
            "gridPos": "bad"
        }));
        assert_eq!(panel.id, 12);
        assert_eq!(panel.targets.map(|t| t.len()), Some(1));
        assert_eq!(nested, Some(vec![]));
        assert_eq!(panel.grid_pos, GridPos::default());
    }

    #[test]
    fn test_remove_releases_nested_panels() {
        let mut arena = PanelArena::new();
        let row = arena.insert_value(json!({"id": 1, "type": "row", "panels": [{"id": 2}, {"id": 3}]}));
        assert_eq!(arena.len(), 3);
        arena.remove(row);
        assert!(arena.is_empty());
    }

    #[test]
    fn test_released_slots_are_reused_without_aliasing() {
        let mut arena = PanelArena::new();
        let first = arena.insert_value(json!({"id": 1}));
        arena.remove(first);
        let second = arena.insert_value(json!({"id": 2}));
        assert_eq!(arena.capacity(), 1);
        assert!(arena.get(first).is_none());
        assert!(arena.remove(first).is_none());
        assert_eq!(arena[second].id, 2);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_deep_clone_copies_children() {
        let mut arena = PanelArena::new();
        let row = arena.insert_value(json!({"id": 1, "type": "row", "panels": [{"id": 2}]}));
        let copy = arena.deep_clone(row).unwrap();
        let copied_child = arena.children(copy)[0];
        arena[copied_child].id = 9;
        let original_child = arena.children(row)[0];
        assert_eq!(arena[original_child].id, 2);
    }

    #[test]
    fn test_plugin_loaded_hands_over_previous_options() {
        let (mut panel, _) = PanelModel::from_value(json!({
            "id": 1,
            "type": "stat",
            "title": "CPU",
            "autoMigrateFrom": "singlestat",
            "format": "percent",
            "options": {"old": true}
        }));
        let mut seen = None;
        panel.plugin_loaded("10.0.0", |panel, previous, options| {
            seen = Some((previous.to_string(), options));
            panel.options = Some(json!({"reduceOptions": {}}));
        });
        let (previous, options) = seen.unwrap();
        assert_eq!(previous, "singlestat");
        assert_eq!(options.get("format"), Some(&json!("percent")));
        assert_eq!(options.get("options"), Some(&json!({"old": true})));
        assert_eq!(panel.get("title"), Some(&json!("CPU")));
        assert_eq!(panel.get("pluginVersion"), Some(&json!("10.0.0")));
        assert_eq!(panel.auto_migrate_from, None);
    }
}
