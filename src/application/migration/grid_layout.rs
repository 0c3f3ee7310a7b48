// Grid layout synthesis - legacy rows of spans become absolute grid positions (v16, v17)
use super::{MigrationPass, PanelPass};
use crate::domain::grid::{DEFAULT_PANEL_SPAN, DEFAULT_ROW_HEIGHT, GRID_COLUMN_COUNT, GridPos, RowArea, grid_height};
use crate::domain::lenient;
use crate::domain::panel::{PanelKey, PanelModel, ROW_PANEL_TYPE};
use serde_json::{Value, json};
use tracing::debug;

/// Divisors of the column count, ascending.
const COLUMN_FACTORS: [i64; 8] = [1, 2, 3, 4, 6, 8, 12, 24];

/// Legacy spans count twelve columns.
const WIDTH_FACTOR: i64 = GRID_COLUMN_COUNT / 12;

/// Every span wider than the grid places the same way, so larger ones are cut here.
const MAX_SPAN: f64 = 13.0;

/// Grid width of a legacy span, at least one column.
fn span_width(span: f64) -> i64 {
    (span.floor().clamp(0.0, MAX_SPAN) as i64 * WIDTH_FACTOR).max(1)
}

fn row_panels(row: &Value) -> &[Value] {
    row.get("panels").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

fn synthesized_row(row: &Value, id: i64, y: i64, height: i64) -> PanelModel {
    let mut panel = PanelModel {
        id,
        panel_type: ROW_PANEL_TYPE.to_string(),
        grid_pos: GridPos::new(0, y, GRID_COLUMN_COUNT, height),
        collapsed: row.get("collapse").filter(|value| !value.is_null()).map(|value| lenient::truthy(Some(value))),
        repeat: row.get("repeat").and_then(Value::as_str).map(str::to_string),
        children: Some(Vec::new()),
        ..PanelModel::default()
    };
    if let Some(title) = row.get("title") {
        panel.set("title", title.clone());
    }
    panel
}

pub fn upgrade_to_grid_layout(pass: &mut MigrationPass<'_>) {
    let Some(rows) = pass.legacy.get("rows").and_then(Value::as_array) else {
        return;
    };

    // Without any numeric panel id the synthesized rows stay unnumbered and get ids on load.
    let mut next_row_id = rows
        .iter()
        .flat_map(row_panels)
        .filter_map(|panel| panel.get("id").and_then(lenient::as_i64))
        .max()
        .map(|max| max + 1);
    let show_rows = rows.iter().any(|row| {
        ["collapse", "showTitle", "repeat"]
            .iter()
            .any(|key| lenient::truthy(row.get(key)))
    });

    let dashboard = &mut *pass.dashboard;
    let mut y_pos = 0;
    for row in rows {
        if lenient::truthy(row.get("repeatIteration")) {
            continue;
        }
        let height = row
            .get("height")
            .filter(|height| lenient::truthy(Some(height)))
            .cloned()
            .unwrap_or(json!(DEFAULT_ROW_HEIGHT));
        let row_height = grid_height(&height);
        let collapsed = lenient::truthy(row.get("collapse"));

        let mut row_panel = None;
        if show_rows {
            row_panel = Some(synthesized_row(row, next_row_id.unwrap_or(0), y_pos, row_height));
            next_row_id = next_row_id.map(|id| id + 1);
            y_pos = y_pos.saturating_add(1);
        }

        let mut area = RowArea::new(row_height, GRID_COLUMN_COUNT, y_pos);
        let mut nested: Vec<PanelKey> = Vec::new();
        for raw in row_panels(row) {
            let Value::Object(mut panel) = raw.clone() else {
                continue;
            };
            let span = panel
                .get("span")
                .filter(|span| lenient::truthy(Some(span)))
                .and_then(lenient::to_number)
                .unwrap_or(DEFAULT_PANEL_SPAN);
            if let Some(min_span) = panel.get("minSpan").filter(|span| lenient::truthy(Some(span))) {
                if let Some(min_span) = lenient::to_number(min_span) {
                    let scaled = (GRID_COLUMN_COUNT as f64).min(WIDTH_FACTOR as f64 * min_span);
                    panel.insert("minSpan".to_string(), lenient::number(scaled));
                }
            }

            let width = span_width(span);
            let height = match panel.get("height") {
                Some(height) if lenient::truthy(Some(height)) => grid_height(height),
                _ => row_height,
            };
            let grid_pos = match area.panel_position(width) {
                Some((x, y)) => GridPos::new(x, area.y_pos.saturating_add(y), width, height),
                None => {
                    debug!(width, "panel wider than the grid, placing it on its own line");
                    GridPos::new(0, area.y_pos, width.min(GRID_COLUMN_COUNT), height)
                }
            };
            y_pos = area.y_pos;
            area.add_panel(&grid_pos);
            panel.remove("span");

            let key = dashboard.arena.insert_value(Value::Object(panel));
            dashboard.arena[key].grid_pos = grid_pos;
            if row_panel.is_some() && collapsed {
                nested.push(key);
            } else {
                dashboard.panels.push(key);
            }
        }

        if let Some(mut panel) = row_panel {
            panel.children = Some(nested);
            let key = dashboard.arena.insert(panel);
            dashboard.panels.push(key);
        }
        if !(show_rows && collapsed) {
            y_pos = y_pos.saturating_add(row_height);
        }
    }
}

/// Largest factor of the column count that keeps panels at least `minSpan` wide.
fn max_per_row(min_span: &Value) -> Option<i64> {
    let limit = GRID_COLUMN_COUNT as f64 / lenient::to_number(min_span)?;
    let index = COLUMN_FACTORS.iter().position(|factor| *factor as f64 > limit)?;
    index.checked_sub(1).map(|index| COLUMN_FACTORS[index])
}

pub fn min_span_to_max_per_row(panel: &mut PanelModel, _: &mut PanelPass<'_>) {
    if let Some(min_span) = panel.remove("minSpan") {
        if lenient::truthy(Some(&min_span)) {
            panel.max_per_row = max_per_row(&min_span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::migration::fixtures::{apply_dashboard_rule, apply_panel_rule};
    use crate::domain::dashboard::DashboardModel;
    use pretty_assertions::assert_eq;

    fn positions(dashboard: &DashboardModel) -> Vec<(i64, String, i64, i64, i64, i64)> {
        dashboard
            .panels
            .iter()
            .map(|key| {
                let panel = &dashboard.arena[*key];
                let pos = &panel.grid_pos;
                (panel.id, panel.panel_type.clone(), pos.x, pos.y, pos.w, pos.h)
            })
            .collect()
    }

    #[test]
    fn test_spans_pack_left_to_right_and_wrap() {
        let dashboard = apply_dashboard_rule(
            upgrade_to_grid_layout,
            json!({"rows": [{"height": 250, "panels": [
                {"id": 1, "span": 8},
                {"id": 2, "span": 4, "height": 100},
                {"id": 3, "span": 6}
            ]}]}),
        );
        assert_eq!(
            positions(&dashboard),
            vec![
                (1, String::new(), 0, 0, 16, 7),
                (2, String::new(), 16, 0, 8, 3),
                (3, String::new(), 0, 7, 12, 7),
            ]
        );
    }

    #[test]
    fn test_any_titled_row_adds_row_panels_everywhere() {
        let dashboard = apply_dashboard_rule(
            upgrade_to_grid_layout,
            json!({"rows": [
                {"title": "A", "showTitle": true, "height": "100px", "panels": [{"id": 4, "span": 12}]},
                {"title": "B", "collapse": true, "panels": [{"id": 5}]},
                {"title": "C", "panels": []}
            ]}),
        );
        assert_eq!(
            positions(&dashboard),
            vec![
                (4, String::new(), 0, 1, 24, 3),
                (6, "row".to_string(), 0, 0, 24, 3),
                (7, "row".to_string(), 0, 4, 24, 7),
                (8, "row".to_string(), 0, 5, 24, 7),
            ]
        );
        let collapsed = dashboard.panels[2];
        let nested = dashboard.arena.children(collapsed);
        assert_eq!(nested.len(), 1);
        assert_eq!(dashboard.arena[nested[0]].grid_pos, GridPos::new(0, 5, 8, 7));
        assert_eq!(dashboard.arena[collapsed].get("title"), Some(&json!("B")));
    }

    #[test]
    fn test_rows_without_panel_ids_stay_unnumbered() {
        let dashboard = apply_dashboard_rule(
            upgrade_to_grid_layout,
            json!({"rows": [{"collapse": true, "panels": [{"span": 6}]}]}),
        );
        assert_eq!(dashboard.panels.len(), 1);
        assert_eq!(dashboard.arena[dashboard.panels[0]].id, 0);
    }

    #[test]
    fn test_repeated_row_copies_are_skipped() {
        let dashboard = apply_dashboard_rule(
            upgrade_to_grid_layout,
            json!({"rows": [
                {"panels": [{"id": 1, "span": 12}]},
                {"repeatIteration": 123, "panels": [{"id": 2, "span": 12}]}
            ]}),
        );
        assert_eq!(positions(&dashboard), vec![(1, String::new(), 0, 0, 24, 7)]);
    }

    #[test]
    fn test_too_wide_panel_is_clamped() {
        let dashboard = apply_dashboard_rule(
            upgrade_to_grid_layout,
            json!({"rows": [{"panels": [{"id": 1, "span": 6}, {"id": 2, "span": 14}]}]}),
        );
        assert_eq!(
            positions(&dashboard),
            vec![(1, String::new(), 0, 0, 12, 7), (2, String::new(), 0, 7, 24, 7)]
        );
    }

    #[test]
    fn test_out_of_range_spans_keep_panels_on_grid() {
        let dashboard = apply_dashboard_rule(
            upgrade_to_grid_layout,
            json!({"rows": [{"panels": [
                {"id": 1, "span": 1e19},
                {"id": 2, "span": -3},
                {"id": 3, "span": 0.5}
            ]}]}),
        );
        assert_eq!(
            positions(&dashboard),
            vec![
                (1, String::new(), 0, 7, 24, 7),
                (2, String::new(), 0, 14, 1, 7),
                (3, String::new(), 1, 14, 1, 7),
            ]
        );
    }

    #[test]
    fn test_huge_row_heights_do_not_overflow() {
        let dashboard = apply_dashboard_rule(
            upgrade_to_grid_layout,
            json!({"rows": [
                {"title": "A", "showTitle": true, "height": 1e30, "panels": [{"id": 1, "span": 12}]},
                {"height": 1e30, "panels": [{"id": 2, "span": 12}]}
            ]}),
        );
        assert_eq!(dashboard.panels.len(), 4);
        for key in &dashboard.panels {
            assert!(dashboard.arena[*key].grid_pos.y >= 0);
        }
    }

    #[test]
    fn test_min_span_picks_largest_fitting_factor() {
        let panel = apply_panel_rule(min_span_to_max_per_row, json!({"minSpan": 8}));
        assert_eq!(panel["maxPerRow"], json!(3));
        let panel = apply_panel_rule(min_span_to_max_per_row, json!({"minSpan": 5}));
        assert_eq!(panel["maxPerRow"], json!(4));
        let panel = apply_panel_rule(min_span_to_max_per_row, json!({"minSpan": 1, "maxPerRow": 2}));
        assert!(panel.get("maxPerRow").is_none());
        assert!(panel.get("minSpan").is_none());
    }
}
