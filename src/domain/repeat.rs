// Repeat expansion - clones panels and rows once per selected variable value
use chrono::Utc;

use super::dashboard::DashboardModel;
use super::grid::{GRID_COLUMN_COUNT, REPEAT_DIR_VERTICAL};
use super::panel::{PanelKey, PanelModel};
use super::variable::VariableModel;

const DEFAULT_MAX_PER_ROW: i64 = 4;

/// A later panel sits to the right of `source` on the same grid row.
fn is_on_same_grid_row(source: &PanelModel, other: &PanelModel) -> bool {
    if source.repeat_direction.as_deref() == Some(REPEAT_DIR_VERTICAL) {
        return false;
    }
    other.grid_pos.x >= source.grid_pos.x.saturating_add(source.grid_pos.w) && other.grid_pos.y == source.grid_pos.y
}

impl DashboardModel {
    /// Regenerates every repeated panel and row from its template. Publishes a single
    /// `PanelsChanged` however many panels were touched.
    pub fn process_repeats(&mut self) {
        if self.is_snapshot() || !self.has_variables() {
            return;
        }
        self.remove_stale_repeats();
        self.iteration = Some(self.next_iteration());

        let mut index = 0;
        while index < self.panels.len() {
            let key = self.panels[index];
            if self.arena[key].repeat_variable().is_some() {
                self.repeat_panel(key, index);
            }
            index += 1;
        }

        self.sort_panels_by_grid_pos();
        self.emit_panels_changed();
    }

    /// Removes clones generated by an earlier cycle.
    pub fn clean_up_repeats(&mut self) {
        if self.is_snapshot() || !self.has_variables() {
            return;
        }
        self.remove_stale_repeats();
        self.sort_panels_by_grid_pos();
        self.emit_panels_changed();
    }

    /// Re-expands the repeating panels of one row, used when the row is opened.
    pub fn process_row_repeats(&mut self, row: PanelKey) {
        if self.is_snapshot() || !self.has_variables() {
            return;
        }
        let collapsed = self.arena[row].is_collapsed();
        let mut row_panels = if collapsed {
            self.arena.children(row)
        } else {
            match self.panels.iter().position(|key| *key == row) {
                Some(index) => self.row_panels(index),
                None => return,
            }
        };

        let stale: Vec<PanelKey> = row_panels
            .iter()
            .copied()
            .filter(|key| {
                let panel = &self.arena[*key];
                panel.repeat_variable().is_none() && panel.is_repeat_clone()
            })
            .collect();
        row_panels.retain(|key| !stale.contains(key));
        if collapsed {
            self.arena[row].children = Some(row_panels.clone());
        }
        self.panels.retain(|key| !stale.contains(key));
        for key in stale {
            self.arena.remove(key);
        }

        for key in row_panels {
            if self.arena[key].repeat_variable().is_none() {
                continue;
            }
            if let Some(index) = self.panels.iter().position(|candidate| *candidate == key) {
                self.repeat_panel(key, index);
            }
        }
    }

    fn next_iteration(&self) -> i64 {
        self.iteration.unwrap_or_else(|| Utc::now().timestamp_millis()) + 1
    }

    fn remove_stale_repeats(&mut self) {
        self.iteration = Some(self.next_iteration());
        for key in &self.panels {
            self.arena[*key].scoped_vars = None;
        }

        let iteration = self.iteration;
        let stale: Vec<PanelKey> = self
            .panels
            .iter()
            .copied()
            .filter(|key| {
                let panel = &self.arena[*key];
                (panel.repeat_variable().is_none() || panel.is_repeated_by_row())
                    && panel.is_repeat_clone()
                    && panel.repeat_iteration != iteration
            })
            .collect();
        self.panels.retain(|key| !stale.contains(key));
        for key in stale {
            self.arena.remove(key);
        }
    }

    fn repeat_variable_of(&self, key: PanelKey) -> Option<VariableModel> {
        let name = self.arena[key].repeat_variable()?;
        self.templating
            .list
            .iter()
            .find(|variable| variable.name.as_deref() == Some(name))
            .cloned()
    }

    fn insert_panel_at(&mut self, index: usize, key: PanelKey) {
        let index = index.min(self.panels.len());
        self.panels.insert(index, key);
    }

    /// Gives a copied panel a fresh id and records where it came from.
    fn update_repeated_panel_ids(&mut self, key: PanelKey, repeated_by_row: bool) {
        let id = self.next_panel_id();
        let iteration = self.iteration;
        let panel = &mut self.arena[key];
        panel.repeat_panel_id = Some(panel.id);
        panel.id = id;
        panel.repeat_iteration = iteration;
        if repeated_by_row {
            panel.repeated_by_row = Some(true);
        } else {
            panel.repeat = None;
        }
    }

    fn panel_repeat_clone(&mut self, source: PanelKey, value_index: usize, source_index: usize) -> PanelKey {
        if value_index == 0 {
            return source;
        }
        let Some(clone) = self.arena.deep_clone(source) else {
            return source;
        };
        let id = self.next_panel_id();
        let source_id = self.arena[source].id;
        let iteration = self.iteration;
        let panel = &mut self.arena[clone];
        panel.id = id;
        panel.repeat_iteration = iteration;
        panel.repeat_panel_id = Some(source_id);
        panel.repeat = None;
        self.insert_panel_at(source_index + value_index, clone);
        clone
    }

    fn repeat_panel(&mut self, key: PanelKey, panel_index: usize) {
        let Some(variable) = self.repeat_variable_of(key) else {
            return;
        };
        if self.arena[key].is_row() {
            self.repeat_row(key, panel_index, &variable);
            return;
        }

        let name = variable.name.clone().unwrap_or_default();
        let selected = variable.selected_options();
        let template = &self.arena[key];
        let max_per_row = template
            .max_per_row
            .filter(|max| *max > 0)
            .map_or(DEFAULT_MAX_PER_ROW, |max| max.min(GRID_COLUMN_COUNT));
        let vertical = template.repeat_direction.as_deref() == Some(REPEAT_DIR_VERTICAL);
        let template_y = template.grid_pos.y;
        let mut x_pos = 0;
        let mut y_pos = template_y;
        let count = selected.len() as i64;

        for (index, option) in selected.iter().enumerate() {
            let copy = self.panel_repeat_clone(key, index, panel_index);
            let panel = &mut self.arena[copy];
            panel.set_scoped_var(&name, option.to_value());

            if vertical {
                if index > 0 {
                    y_pos = y_pos.saturating_add(panel.grid_pos.h);
                }
                panel.grid_pos.y = y_pos;
            } else {
                // At most `max_per_row` copies share a line, never below one column.
                let per_row_width = (GRID_COLUMN_COUNT + max_per_row - 1) / max_per_row;
                let width = (GRID_COLUMN_COUNT / count).max(per_row_width).max(1);
                panel.grid_pos.w = width;
                panel.grid_pos.x = x_pos;
                panel.grid_pos.y = y_pos;
                x_pos += width;
                if x_pos + width > GRID_COLUMN_COUNT {
                    x_pos = 0;
                    y_pos = y_pos.saturating_add(panel.grid_pos.h);
                }
            }
        }

        let y_offset = y_pos.saturating_sub(template_y);
        if y_offset > 0 {
            let below = self.panels.iter().skip(panel_index + selected.len()).copied();
            let shifted: Vec<PanelKey> = below
                .filter(|other| !is_on_same_grid_row(&self.arena[key], &self.arena[*other]))
                .collect();
            for other in shifted {
                let pos = &mut self.arena[other].grid_pos;
                pos.y = pos.y.saturating_add(y_offset);
            }
        }
    }

    fn row_repeat_clone(&mut self, source: PanelKey, value_index: usize, source_index: usize) -> PanelKey {
        let collapsed = self.arena[source].is_collapsed();
        if value_index == 0 {
            if !collapsed {
                let row_panels = self.row_panels(source_index);
                self.arena[source].children = Some(row_panels);
            }
            return source;
        }

        let Some(clone) = self.arena.deep_clone(source) else {
            return source;
        };
        let insert_pos = if collapsed {
            source_index + value_index
        } else {
            let row_panels = self.row_panels(source_index);
            let copies: Vec<PanelKey> = row_panels.iter().filter_map(|key| self.arena.deep_clone(*key)).collect();
            if let Some(stale) = self.arena[clone].children.replace(copies) {
                for key in stale {
                    self.arena.remove(key);
                }
            }
            source_index + (row_panels.len() + 1) * value_index
        };
        self.insert_panel_at(insert_pos, clone);
        self.update_repeated_panel_ids(clone, false);
        clone
    }

    /// Distance from the row's top to the lowest bottom edge of its panels.
    fn row_height(&self, row: PanelKey) -> i64 {
        let row_y = self.arena[row].grid_pos.y;
        self.arena
            .children(row)
            .iter()
            .map(|key| self.arena[*key].grid_pos.bottom())
            .max()
            .map(|bottom| bottom.saturating_sub(row_y))
            .unwrap_or(0)
    }

    fn repeat_row(&mut self, key: PanelKey, panel_index: usize, variable: &VariableModel) {
        let name = variable.name.clone().unwrap_or_default();
        let selected = variable.selected_options();
        let collapsed = self.arena[key].is_collapsed();
        let mut y_pos = self.arena[key].grid_pos.y;

        for (option_index, option) in selected.iter().enumerate() {
            let option_value = option.to_value();
            let offset = option_index as i64;
            let row_copy = self.row_repeat_clone(key, option_index, panel_index);
            self.arena[row_copy].set_scoped_var(&name, option_value.clone());
            let row_height = self.row_height(row_copy);
            let row_panels = self.arena.children(row_copy);

            let panel_below_index = if collapsed {
                for child in &row_panels {
                    self.arena[*child].set_scoped_var(&name, option_value.clone());
                    if option_index > 0 {
                        self.update_repeated_panel_ids(*child, true);
                    }
                }
                let pos = &mut self.arena[row_copy].grid_pos;
                pos.y = pos.y.saturating_add(offset);
                y_pos = y_pos.saturating_add(offset);
                panel_index + option_index + 1
            } else {
                let insert_pos = panel_index + (row_panels.len() + 1) * option_index + 1;
                for (i, child) in row_panels.iter().enumerate() {
                    self.arena[*child].set_scoped_var(&name, option_value.clone());
                    if option_index > 0 {
                        self.update_repeated_panel_ids(*child, true);
                        let pos = &mut self.arena[*child].grid_pos;
                        pos.y = pos.y.saturating_add(row_height.saturating_mul(offset));
                        self.insert_panel_at(insert_pos + i, *child);
                    }
                }
                let row_model = &mut self.arena[row_copy];
                row_model.children = Some(Vec::new());
                row_model.grid_pos.y = row_model.grid_pos.y.saturating_add(row_height.saturating_mul(offset));
                y_pos = y_pos.saturating_add(row_height);
                insert_pos + row_panels.len()
            };

            if selected.len() > 1 {
                for other in self.panels.iter().skip(panel_below_index) {
                    let pos = &mut self.arena[*other].grid_pos;
                    pos.y = pos.y.saturating_add(y_pos);
                }
            }
        }
    }
}
