// Grid domain model - the fixed 24 column layout and the legacy row packing cursor
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

pub const GRID_COLUMN_COUNT: i64 = 24;
pub const GRID_CELL_HEIGHT: i64 = 30;
pub const GRID_CELL_VMARGIN: i64 = 8;
pub const MIN_PANEL_HEIGHT: i64 = GRID_CELL_HEIGHT * 3;
pub const DEFAULT_ROW_HEIGHT: i64 = 250;
pub const DEFAULT_PANEL_SPAN: f64 = 4.0;
pub const REPEAT_DIR_VERTICAL: &str = "v";
/// Largest magnitude kept for a stored coordinate or pixel height.
pub const MAX_GRID_COORD: i64 = i32::MAX as i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    /// Keys such as `static` that are carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for GridPos {
    fn default() -> Self {
        Self::new(0, 0, 6, 3)
    }
}

impl GridPos {
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Self {
        Self { x, y, w, h, extra: Map::new() }
    }

    /// Reads a stored position, defaulting each missing or non-numeric coordinate.
    pub fn from_value(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };
        let defaults = Self::default();
        let coord = |key: &str, fallback: i64| {
            map.get(key)
                .and_then(lenient::as_i64)
                .map_or(fallback, |value| value.clamp(-MAX_GRID_COORD, MAX_GRID_COORD))
        };
        let extra = map
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "x" | "y" | "w" | "h"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self {
            x: coord("x", defaults.x),
            y: coord("y", defaults.y),
            w: coord("w", defaults.w),
            h: coord("h", defaults.h),
            extra,
        }
    }

    pub fn bottom(&self) -> i64 {
        self.y.saturating_add(self.h)
    }
}

/// Converts a legacy pixel height (`250` or `"250px"`) into grid units.
pub fn grid_height(height: &Value) -> i64 {
    let pixels = match height {
        Value::String(text) => lenient::parse_int(&text.replace("px", "")),
        other => lenient::as_i64(other),
    };
    let pixels = pixels.unwrap_or(MIN_PANEL_HEIGHT).clamp(MIN_PANEL_HEIGHT, MAX_GRID_COORD);
    let unit = GRID_CELL_HEIGHT + GRID_CELL_VMARGIN;
    (pixels + unit - 1) / unit
}

/// Packing cursor for one legacy row. Each column records how many grid units
/// are already filled below the row's current `y_pos`.
#[derive(Debug, Clone)]
pub struct RowArea {
    area: Vec<i64>,
    pub y_pos: i64,
    height: i64,
}

impl RowArea {
    pub fn new(height: i64, width: i64, row_y_pos: i64) -> Self {
        Self {
            area: vec![0; width.max(0) as usize],
            y_pos: row_y_pos,
            height,
        }
    }

    fn reset(&mut self) {
        self.area.iter_mut().for_each(|cell| *cell = 0);
    }

    /// Marks the columns covered by `pos` as filled.
    pub fn add_panel(&mut self, pos: &GridPos) {
        let filled = pos.bottom().saturating_sub(self.y_pos);
        let start = pos.x.max(0) as usize;
        let end = pos.x.saturating_add(pos.w).max(0) as usize;
        for cell in self.area.iter_mut().take(end).skip(start) {
            if *cell == 0 || filled > *cell {
                *cell = filled;
            }
        }
    }

    /// Finds `(x, y)` relative to `y_pos` for a panel of the given width, wrapping the
    /// row once when it does not fit. `None` when the panel is wider than the grid.
    /// Only the row height bounds the search, the panel's own height does not.
    pub fn panel_position(&mut self, panel_width: i64) -> Option<(i64, i64)> {
        self.position(panel_width, false)
    }

    fn position(&mut self, panel_width: i64, wrapped: bool) -> Option<(i64, i64)> {
        let mut start_place: Option<usize> = None;
        let mut end_place: Option<usize> = None;
        let last = self.area.len();

        for i in (0..last).rev() {
            if self.height - self.area[i] <= 0 {
                break;
            }
            if end_place.is_none() {
                end_place = Some(i);
            } else if i < last - 1 && self.area[i] <= self.area[i + 1] {
                start_place = Some(i);
            } else {
                break;
            }
        }

        if let (Some(start), Some(end)) = (start_place, end_place) {
            if (end - start) as i64 >= panel_width - 1 {
                let y = self.area[start..].iter().copied().max().unwrap_or(0);
                return Some((start as i64, y));
            }
        }

        if wrapped {
            return None;
        }
        self.y_pos = self.y_pos.saturating_add(self.height);
        self.reset();
        self.position(panel_width, true)
    }
}
