// Dashboard domain model - the canonical in-memory document and its panel layout operations
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use tokio::sync::broadcast;

use super::events::DashboardEvent;
use super::grid::GRID_COLUMN_COUNT;
use super::lenient;
use super::panel::{ADD_PANEL_TYPE, PanelArena, PanelKey, PanelModel};
use super::variable::VariableModel;

const EVENT_CAPACITY: usize = 64;
pub const DEFAULT_ANNOTATION_COLOR: &str = "rgba(0, 211, 255, 1)";
pub const GRAFANA_DATASOURCE_UID: &str = "-- Grafana --";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Templating {
    pub list: Vec<VariableModel>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    pub list: Vec<Value>,
    pub extra: Map<String, Value>,
}

#[derive(Debug)]
pub struct DashboardModel {
    pub id: Value,
    pub uid: Value,
    pub title: Value,
    pub description: Option<Value>,
    pub revision: Option<Value>,
    pub auto_update: Option<Value>,
    pub tags: Value,
    pub style: Value,
    pub timezone: Value,
    pub week_start: Value,
    pub editable: bool,
    pub graph_tooltip: Value,
    pub time: Value,
    pub timepicker: Value,
    pub live_now: bool,
    pub templating: Templating,
    pub annotations: Annotations,
    pub refresh: Option<Value>,
    pub snapshot: Option<Value>,
    pub schema_version: i64,
    pub fiscal_year_start_month: Value,
    pub version: Value,
    pub links: Value,
    pub gnet_id: Value,
    /// Top-level panels in layout order.
    pub panels: Vec<PanelKey>,
    pub arena: PanelArena,
    pub(crate) iteration: Option<i64>,
    events: broadcast::Sender<DashboardEvent>,
}

impl Default for DashboardModel {
    fn default() -> Self {
        Self::from_value(&Value::Null)
    }
}

fn or_default(value: Option<&Value>, fallback: Value) -> Value {
    match value {
        None | Some(Value::Null) => fallback,
        Some(other) => other.clone(),
    }
}

fn or_null(value: Option<&Value>) -> Value {
    match value {
        Some(v) if lenient::truthy(Some(v)) => v.clone(),
        _ => Value::Null,
    }
}

fn split_list(value: Option<&Value>) -> (Vec<Value>, Map<String, Value>) {
    let Some(Value::Object(map)) = value else {
        return (Vec::new(), Map::new());
    };
    let mut extra = map.clone();
    let list = match extra.remove("list") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    (list, extra)
}

impl DashboardModel {
    /// Decodes a stored document without migrating it. Never fails: missing or
    /// malformed fields fall back to their defaults.
    pub fn from_value(data: &Value) -> Self {
        let empty = Map::new();
        let data = data.as_object().unwrap_or(&empty);
        let field = |key: &str| data.get(key);

        let (variables, templating_extra) = split_list(field("templating"));
        let (annotation_list, annotations_extra) = split_list(field("annotations"));

        let mut arena = PanelArena::new();
        let panels = match field("panels") {
            Some(Value::Array(items)) => items.iter().map(|item| arena.insert_value(item.clone())).collect(),
            _ => Vec::new(),
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            id: or_null(field("id")),
            uid: or_null(field("uid")),
            title: or_default(field("title"), json!("No Title")),
            description: field("description").cloned(),
            revision: field("revision").cloned(),
            auto_update: field("autoUpdate").cloned(),
            tags: or_default(field("tags"), json!([])),
            style: or_default(field("style"), json!("dark")),
            timezone: or_default(field("timezone"), json!("")),
            week_start: or_default(field("weekStart"), json!("")),
            editable: field("editable") != Some(&Value::Bool(false)),
            graph_tooltip: match field("graphTooltip") {
                Some(v) if lenient::truthy(Some(v)) => v.clone(),
                _ => json!(0),
            },
            time: or_default(field("time"), json!({"from": "now-6h", "to": "now"})),
            timepicker: or_default(field("timepicker"), json!({})),
            live_now: lenient::truthy(field("liveNow")),
            templating: Templating {
                list: variables.into_iter().map(VariableModel::from_value).collect(),
                extra: templating_extra,
            },
            annotations: Annotations {
                list: annotation_list,
                extra: annotations_extra,
            },
            refresh: field("refresh").cloned(),
            snapshot: field("snapshot").cloned(),
            schema_version: field("schemaVersion").and_then(lenient::as_i64).unwrap_or(0),
            fiscal_year_start_month: or_default(field("fiscalYearStartMonth"), json!(0)),
            version: or_default(field("version"), json!(0)),
            links: or_default(field("links"), json!([])),
            gnet_id: or_null(field("gnetId")),
            panels,
            arena,
            iteration: None,
            events,
        }
    }

    /// Load-time normalisation that follows schema migration.
    pub fn finish_load(&mut self) {
        self.drop_persisted_repeats();
        self.ensure_unique_panel_ids();
        self.add_built_in_annotation_query();
        self.sort_panels_by_grid_pos();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit_panels_changed(&self) {
        // No subscribers is not an error.
        let _ = self.events.send(DashboardEvent::PanelsChanged);
    }

    pub fn is_snapshot(&self) -> bool {
        lenient::truthy(self.snapshot.as_ref())
    }

    pub fn has_variables(&self) -> bool {
        !self.templating.list.is_empty()
    }

    pub fn panel(&self, key: PanelKey) -> Option<&PanelModel> {
        self.arena.get(key)
    }

    pub fn panel_mut(&mut self, key: PanelKey) -> Option<&mut PanelModel> {
        self.arena.get_mut(key)
    }

    /// Every panel in iteration order: each top-level panel followed by its nested panels.
    pub fn all_panel_keys(&self) -> Vec<PanelKey> {
        let mut keys = Vec::new();
        for key in &self.panels {
            keys.push(*key);
            keys.extend(self.arena.children(*key));
        }
        keys
    }

    pub fn next_panel_id(&self) -> i64 {
        let mut max = 0;
        for key in &self.panels {
            let panel = &self.arena[*key];
            max = max.max(panel.id);
            if panel.is_collapsed() {
                for child in panel.children.iter().flatten() {
                    max = max.max(self.arena[*child].id);
                }
            }
        }
        max.saturating_add(1)
    }

    /// Top-level panel with the given id.
    pub fn panel_by_id(&self, id: i64) -> Option<PanelKey> {
        self.panels.iter().copied().find(|key| self.arena[*key].id == id)
    }

    pub fn sort_panels_by_grid_pos(&mut self) {
        let arena = &self.arena;
        self.panels.sort_by(|a, b| {
            let (a, b) = (&arena[*a].grid_pos, &arena[*b].grid_pos);
            (a.y, a.x).cmp(&(b.y, b.x))
        });
    }

    pub fn add_panel(&mut self, panel_data: Value) -> PanelKey {
        let id = self.next_panel_id();
        let key = self.arena.insert_value(panel_data);
        self.arena[key].id = id;
        self.panels.insert(0, key);
        self.sort_panels_by_grid_pos();
        self.emit_panels_changed();
        key
    }

    pub fn remove_panel(&mut self, key: PanelKey) {
        self.panels.retain(|panel| *panel != key);
        self.arena.remove(key);
        self.emit_panels_changed();
    }

    /// Copies a panel next to the original (or below it when there is no room) without
    /// any repeat state.
    pub fn duplicate_panel(&mut self, key: PanelKey) -> Option<PanelKey> {
        let source = self.arena.get(key)?;
        let mut model = self.arena.save_model(key);
        let grid_pos = source.grid_pos.clone();
        if let Value::Object(map) = &mut model {
            for transient in ["repeat", "repeatIteration", "repeatPanelId", "scopedVars"] {
                map.remove(transient);
            }
            if map.remove("alert").is_some() {
                map.remove("thresholds");
            }
            let fits_right = grid_pos.x.saturating_add(grid_pos.w.saturating_mul(2)) <= GRID_COLUMN_COUNT;
            if let Some(pos) = lenient::object_mut(map.get_mut("gridPos")) {
                let (axis, delta) = if fits_right { ("x", grid_pos.w) } else { ("y", grid_pos.h) };
                let base = if fits_right { grid_pos.x } else { grid_pos.y };
                pos.insert(axis.to_string(), json!(base.saturating_add(delta)));
            }
        }
        Some(self.add_panel(model))
    }

    /// Panels that follow the row at `row_index` up to the next row.
    pub fn row_panels(&self, row_index: usize) -> Vec<PanelKey> {
        self.panels
            .iter()
            .skip(row_index + 1)
            .take_while(|key| !self.arena[**key].is_row())
            .copied()
            .collect()
    }

    /// Collapses an expanded row into its nested list, or expands a collapsed one back
    /// into the layout, pushing the panels below down.
    pub fn toggle_row(&mut self, row: PanelKey) {
        let Some(row_index) = self.panels.iter().position(|key| *key == row) else {
            return;
        };

        if self.arena[row].is_collapsed() {
            self.arena[row].collapsed = Some(false);
            let children = self.arena[row].children.take().unwrap_or_default();
            self.arena[row].children = Some(Vec::new());
            let has_repeat = children
                .iter()
                .any(|child| self.arena[*child].repeat_variable().is_some());

            if let Some(first) = children.first() {
                let row_pos = self.arena[row].grid_pos.clone();
                let y_diff = self.arena[*first].grid_pos.y.saturating_sub(row_pos.bottom());
                let mut insert_pos = row_index + 1;
                let mut y_max = row_pos.y;

                for child in &children {
                    let pos = &mut self.arena[*child].grid_pos;
                    pos.y = pos.y.saturating_sub(y_diff);
                    y_max = y_max.max(pos.bottom());
                    self.panels.insert(insert_pos, *child);
                    insert_pos += 1;
                }

                let push_down = y_max.saturating_sub(row_pos.y).saturating_sub(1);
                for key in &self.panels[insert_pos..] {
                    let pos = &mut self.arena[*key].grid_pos;
                    pos.y = pos.y.saturating_add(push_down);
                }

                if has_repeat {
                    self.process_row_repeats(row);
                }
            }

            self.sort_panels_by_grid_pos();
            self.emit_panels_changed();
            return;
        }

        let row_panels = self.row_panels(row_index);
        self.panels.retain(|key| !row_panels.contains(key));
        let row_model = &mut self.arena[row];
        row_model.children = Some(row_panels);
        row_model.collapsed = Some(true);
        self.emit_panels_changed();
    }

    /// Removes a row, either keeping its panels in the layout or dropping them with it.
    pub fn remove_row(&mut self, row: PanelKey, remove_panels: bool) {
        let collapsed = self.arena.get(row).is_some_and(PanelModel::is_collapsed);
        if (!remove_panels && collapsed) || (remove_panels && !collapsed) {
            self.toggle_row(row);
        }
        self.remove_panel(row);
    }

    pub fn expand_rows(&mut self) {
        let rows: Vec<PanelKey> = self
            .panels
            .iter()
            .copied()
            .filter(|key| self.arena[*key].is_row() && self.arena[*key].is_collapsed())
            .collect();
        for row in rows {
            self.toggle_row(row);
        }
    }

    pub fn collapse_rows(&mut self) {
        let rows: Vec<PanelKey> = self
            .panels
            .iter()
            .copied()
            .filter(|key| self.arena[*key].is_row() && !self.arena[*key].is_collapsed())
            .collect();
        for row in rows {
            self.toggle_row(row);
        }
    }

    /// Dropping clones that a previous session persisted; they are regenerated from
    /// their templates by the repeat engine.
    fn drop_persisted_repeats(&mut self) {
        if self.is_snapshot() {
            return;
        }
        let stale: Vec<PanelKey> = self
            .panels
            .iter()
            .copied()
            .filter(|key| self.arena[*key].is_repeat_clone() || self.arena[*key].is_repeated_by_row())
            .collect();
        self.panels.retain(|key| !stale.contains(key));
        for key in stale {
            self.arena.remove(key);
        }

        for key in self.panels.clone() {
            let Some(children) = self.arena[key].children.clone() else {
                continue;
            };
            let (clones, kept): (Vec<PanelKey>, Vec<PanelKey>) = children
                .into_iter()
                .partition(|child| self.arena[*child].is_repeat_clone());
            self.arena[key].children = Some(kept);
            for clone in clones {
                self.arena.remove(clone);
            }
        }
    }

    /// Gives every panel without an id, or with an id already taken, the next free id.
    fn ensure_unique_panel_ids(&mut self) {
        let keys = self.all_panel_keys();
        let mut next = keys.iter().map(|key| self.arena[*key].id).max().unwrap_or(0).max(0).saturating_add(1);
        let mut seen = HashSet::new();
        for key in keys {
            let panel = &mut self.arena[key];
            if panel.id == 0 || !seen.insert(panel.id) {
                panel.id = next;
                seen.insert(next);
                next = next.saturating_add(1);
            }
        }
    }

    pub fn add_built_in_annotation_query(&mut self) {
        let found = self
            .annotations
            .list
            .iter()
            .any(|item| item.get("builtIn").and_then(lenient::as_i64) == Some(1));
        if found {
            return;
        }
        self.annotations.list.insert(
            0,
            json!({
                "datasource": {"type": "grafana", "uid": GRAFANA_DATASOURCE_UID},
                "name": "Annotations & Alerts",
                "type": "dashboard",
                "iconColor": DEFAULT_ANNOTATION_COLOR,
                "enable": true,
                "hide": true,
                "builtIn": 1,
            }),
        );
    }

    fn panel_save_models(&self) -> Vec<Value> {
        let snapshot = self.is_snapshot();
        self.panels
            .iter()
            .filter(|key| {
                let panel = &self.arena[**key];
                snapshot
                    || !(panel.panel_type == ADD_PANEL_TYPE || panel.is_repeat_clone() || panel.is_repeated_by_row())
            })
            .map(|key| {
                let mut model = self.arena.save_model(*key);
                if snapshot {
                    return model;
                }
                if let Value::Object(map) = &mut model {
                    map.remove("scopedVars");
                    if let Some(Value::Array(children)) = map.get_mut("panels") {
                        children.retain(|child| {
                            !child.get("repeatPanelId").is_some_and(|id| lenient::truthy(Some(id)))
                        });
                        for child in children.iter_mut().filter_map(Value::as_object_mut) {
                            child.remove("scopedVars");
                        }
                    }
                }
                model
            })
            .collect()
    }

    /// Persistable form of the dashboard. Key order and null pruning are left to the
    /// canonical writer.
    pub fn save_model(&self) -> Value {
        let mut copy = Map::new();
        let mut put = |key: &str, value: Value| {
            copy.insert(key.to_string(), value);
        };
        put("id", self.id.clone());
        put("uid", self.uid.clone());
        put("title", self.title.clone());
        for (key, value) in [
            ("description", &self.description),
            ("revision", &self.revision),
            ("autoUpdate", &self.auto_update),
            ("refresh", &self.refresh),
            ("snapshot", &self.snapshot),
        ] {
            if let Some(value) = value {
                put(key, value.clone());
            }
        }
        put("tags", self.tags.clone());
        put("style", self.style.clone());
        put("timezone", self.timezone.clone());
        put("weekStart", self.week_start.clone());
        put("editable", Value::Bool(self.editable));
        put("graphTooltip", self.graph_tooltip.clone());
        put("time", self.time.clone());
        put("timepicker", self.timepicker.clone());
        put("liveNow", Value::Bool(self.live_now));

        let mut templating = self.templating.extra.clone();
        templating.insert(
            "list".to_string(),
            Value::Array(self.templating.list.iter().map(VariableModel::save_model).collect()),
        );
        put("templating", Value::Object(templating));

        let mut annotations = self.annotations.extra.clone();
        annotations.insert("list".to_string(), Value::Array(self.annotations.list.clone()));
        put("annotations", Value::Object(annotations));

        put("schemaVersion", json!(self.schema_version));
        put("fiscalYearStartMonth", self.fiscal_year_start_month.clone());
        put("version", self.version.clone());
        put("links", self.links.clone());
        put("gnetId", self.gnet_id.clone());
        put("panels", Value::Array(self.panel_save_models()));
        Value::Object(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dashboard(panels: Value) -> DashboardModel {
        DashboardModel::from_value(&json!({ "panels": panels }))
    }

    fn ids(dashboard: &DashboardModel) -> Vec<i64> {
        dashboard.panels.iter().map(|key| dashboard.arena[*key].id).collect()
    }

    #[test]
    fn test_defaults_for_empty_document() {
        let model = DashboardModel::from_value(&json!({}));
        assert_eq!(model.title, json!("No Title"));
        assert_eq!(model.time, json!({"from": "now-6h", "to": "now"}));
        assert!(model.editable);
        assert_eq!(model.schema_version, 0);
        assert!(model.panels.is_empty());
    }

    #[test]
    fn test_non_object_input_is_treated_as_empty() {
        let model = DashboardModel::from_value(&json!("garbage"));
        assert_eq!(model.title, json!("No Title"));
        let model = DashboardModel::from_value(&json!({"panels": {"a": 1}, "templating": {"list": 3}}));
        assert!(model.panels.is_empty());
        assert!(model.templating.list.is_empty());
    }

    #[test]
    fn test_next_panel_id_includes_collapsed_children() {
        let model = dashboard(json!([
            {"id": 5},
            {"id": 6, "type": "row", "collapsed": true, "panels": [{"id": 11}]}
        ]));
        assert_eq!(model.next_panel_id(), 12);
    }

    #[test]
    fn test_built_in_annotation_added_once() {
        let mut model = DashboardModel::from_value(&json!({"annotations": {"enable": true}}));
        model.add_built_in_annotation_query();
        model.add_built_in_annotation_query();
        assert_eq!(model.annotations.list.len(), 1);
        assert_eq!(model.annotations.list[0]["builtIn"], json!(1));
    }

    #[test]
    fn test_duplicate_ids_are_reassigned() {
        let mut model = dashboard(json!([
            {"id": 1, "gridPos": {"x": 0, "y": 0, "w": 6, "h": 3}},
            {"id": 1, "gridPos": {"x": 6, "y": 0, "w": 6, "h": 3}},
            {"gridPos": {"x": 12, "y": 0, "w": 6, "h": 3}},
            {"id": 4, "type": "row", "collapsed": true, "gridPos": {"x": 0, "y": 3, "w": 24, "h": 1},
             "panels": [{"id": 4}]}
        ]));
        model.finish_load();
        let mut all: Vec<i64> = model.all_panel_keys().iter().map(|key| model.arena[*key].id).collect();
        all.sort();
        assert_eq!(all, vec![1, 4, 5, 6, 7]);
    }

    #[test]
    fn test_persisted_repeat_clones_are_dropped_on_load() {
        let mut model = dashboard(json!([
            {"id": 1, "repeat": "apps"},
            {"id": 2, "repeatPanelId": 1},
            {"id": 3, "type": "row", "collapsed": true, "panels": [{"id": 4}, {"id": 5, "repeatPanelId": 4}]}
        ]));
        model.finish_load();
        assert_eq!(model.all_panel_keys().len(), 3);
    }

    #[test]
    fn test_collapse_row_moves_panels_inside() {
        let mut model = dashboard(json!([
            {"id": 1, "type": "graph", "gridPos": {"x": 0, "y": 0, "w": 24, "h": 2}},
            {"id": 2, "type": "row", "gridPos": {"x": 0, "y": 2, "w": 24, "h": 2}},
            {"id": 3, "type": "graph", "gridPos": {"x": 0, "y": 4, "w": 12, "h": 2}},
            {"id": 4, "type": "graph", "gridPos": {"x": 12, "y": 4, "w": 12, "h": 2}},
            {"id": 5, "type": "row", "gridPos": {"x": 0, "y": 6, "w": 24, "h": 2}}
        ]));
        let row = model.panels[1];
        model.toggle_row(row);
        assert_eq!(model.panels.len(), 3);
        assert_eq!(model.arena.children(row).len(), 2);
        assert_eq!(model.arena[row].collapsed, Some(true));

        model.remove_row(row, true);
        assert_eq!(ids(&model), vec![1, 5]);
    }

    #[test]
    fn test_remove_collapsed_row_keeps_its_panels() {
        let mut model = dashboard(json!([
            {"id": 1, "gridPos": {"x": 0, "y": 0, "w": 24, "h": 2}},
            {"id": 2, "type": "row", "gridPos": {"x": 0, "y": 2, "w": 24, "h": 2}},
            {"id": 3, "gridPos": {"x": 0, "y": 4, "w": 12, "h": 2}},
            {"id": 4, "gridPos": {"x": 12, "y": 4, "w": 12, "h": 2}},
            {"id": 5, "type": "row", "gridPos": {"x": 0, "y": 6, "w": 24, "h": 2}}
        ]));
        let row = model.panels[1];
        model.toggle_row(row);
        model.remove_row(row, false);
        assert_eq!(model.panels.len(), 4);
    }

    #[test]
    fn test_moved_row_round_trip_keeps_children_relative_to_row() {
        let mut model = dashboard(json!([
            {"id": 1, "type": "graph", "gridPos": {"x": 0, "y": 0, "w": 24, "h": 2}},
            {"id": 2, "type": "row", "gridPos": {"x": 0, "y": 2, "w": 24, "h": 1}},
            {"id": 3, "type": "graph", "gridPos": {"x": 0, "y": 3, "w": 12, "h": 2}},
            {"id": 4, "type": "graph", "gridPos": {"x": 12, "y": 3, "w": 12, "h": 2}},
            {"id": 5, "type": "row", "gridPos": {"x": 0, "y": 5, "w": 24, "h": 1}}
        ]));
        let row = model.panels[1];
        model.toggle_row(row);
        assert_eq!(ids(&model), vec![1, 2, 5]);
        assert_eq!(model.arena[row].collapsed, Some(true));

        model.arena[row].grid_pos.y = 10;
        model.toggle_row(row);

        assert_eq!(model.arena[row].collapsed, Some(false));
        assert_eq!(model.arena.save_model(row)["panels"], json!([]));
        assert_eq!(ids(&model), vec![1, 5, 2, 3, 4]);
        let children: Vec<(i64, i64)> = model.panels[3..]
            .iter()
            .map(|key| (model.arena[*key].grid_pos.x, model.arena[*key].grid_pos.y))
            .collect();
        assert_eq!(children, vec![(0, 11), (12, 11)]);
        assert_eq!(model.arena[model.panels[1]].grid_pos.y, 7);
    }

    #[test]
    fn test_expand_row_restores_and_pushes_down() {
        let mut model = dashboard(json!([
            {"id": 1, "type": "graph", "gridPos": {"x": 0, "y": 0, "w": 24, "h": 6}},
            {"id": 2, "type": "row", "gridPos": {"x": 0, "y": 6, "w": 24, "h": 1}, "collapsed": true,
             "panels": [
                {"id": 3, "type": "graph", "gridPos": {"x": 0, "y": 7, "w": 12, "h": 2}},
                {"id": 4, "type": "graph", "gridPos": {"x": 12, "y": 7, "w": 12, "h": 2}}
             ]},
            {"id": 5, "type": "row", "gridPos": {"x": 0, "y": 7, "w": 1, "h": 1}}
        ]));
        let mut events = model.subscribe();
        let row = model.panels[1];
        model.toggle_row(row);

        assert_eq!(ids(&model), vec![1, 2, 3, 4, 5]);
        let third = &model.arena[model.panels[2]].grid_pos;
        assert_eq!((third.x, third.y, third.w, third.h), (0, 7, 12, 2));
        let last = &model.arena[model.panels[4]].grid_pos;
        assert_eq!((last.x, last.y, last.w, last.h), (0, 9, 1, 1));
        assert_eq!(model.arena.children(row), Vec::<PanelKey>::new());
        assert_eq!(events.try_recv().ok(), Some(DashboardEvent::PanelsChanged));

        model.remove_row(row, true);
        assert_eq!(ids(&model), vec![1, 5]);
    }

    #[test]
    fn test_duplicate_panel_goes_right_without_repeat_state() {
        let mut model = DashboardModel::from_value(&json!({}));
        let key = model.add_panel(json!({
            "id": 10,
            "gridPos": {"x": 0, "y": 0, "w": 6, "h": 2},
            "repeat": "asd",
            "scopedVars": {"test": "asd"}
        }));
        let copy = model.duplicate_panel(key).unwrap();
        let copy = &model.arena[copy];
        assert_eq!((copy.grid_pos.x, copy.grid_pos.y, copy.grid_pos.w, copy.grid_pos.h), (6, 0, 6, 2));
        assert_eq!(copy.repeat, None);
        assert_eq!(copy.scoped_vars, None);
        assert_eq!(copy.id, 2);
    }

    #[test]
    fn test_save_model_skips_generated_panels() {
        let model = dashboard(json!([
            {"id": 1, "type": "add-panel"},
            {"id": 2, "scopedVars": {"a": {"value": "x"}}},
            {"id": 3, "repeatPanelId": 2},
            {"id": 4, "type": "row", "collapsed": true, "panels": [{"id": 5}, {"id": 6, "repeatPanelId": 5}]}
        ]));
        let saved = model.save_model();
        assert_eq!(
            saved["panels"],
            json!([
                {"id": 2, "gridPos": {"x": 0, "y": 0, "w": 6, "h": 3}},
                {"id": 4, "type": "row", "collapsed": true, "gridPos": {"x": 0, "y": 0, "w": 6, "h": 3},
                 "panels": [{"id": 5, "gridPos": {"x": 0, "y": 0, "w": 6, "h": 3}}]}
            ])
        );
    }
}
