use crate::models::{MediaId, Row, Tile};

/// The rows produced by one full layout pass.
///
/// Never patched after construction: the engine swaps in a new snapshot on
/// every recompute, so readers always see a consistent row set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutSnapshot {
    pub rows: Vec<Row>,
    pub container_width: f64,
    pub padding: f64,
    pub target_row_height: f64,
}

impl LayoutSnapshot {
    pub fn empty(container_width: f64, padding: f64, target_row_height: f64) -> Self {
        Self {
            rows: Vec::new(),
            container_width,
            padding,
            target_row_height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bottom of the last row, 0 for an empty layout.
    pub fn content_height(&self) -> f64 {
        self.rows.last().map_or(0.0, |row| row.row_end_height)
    }

    pub fn tile_count(&self) -> usize {
        self.rows.iter().map(Row::len).sum()
    }

    /// All tiles in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.rows.iter().flat_map(|row| row.tiles.iter())
    }

    pub fn find(&self, id: &MediaId) -> Option<&Tile> {
        self.tiles().find(|tile| &tile.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: &MediaId) -> Option<&mut Tile> {
        self.rows
            .iter_mut()
            .flat_map(|row| row.tiles.iter_mut())
            .find(|tile| &tile.id == id)
    }
}
