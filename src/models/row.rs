use super::tile::Tile;

/// A horizontal run of tiles, left to right in packing order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub tiles: Vec<Tile>,
    /// Container width at packing time
    pub max_width: f64,
    pub row_start_height: f64,
    pub row_end_height: f64,
}

impl Row {
    pub fn new(max_width: f64) -> Self {
        Self {
            tiles: Vec::new(),
            max_width,
            row_start_height: 0.0,
            row_end_height: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Sum of scaled tile widths, gaps excluded.
    pub fn tiles_width(&self) -> f64 {
        self.tiles.iter().map(Tile::scaled_width).sum()
    }

    /// Total width of the gaps between tiles.
    pub fn gap_width(&self, padding: f64) -> f64 {
        padding * self.tiles.len().saturating_sub(1) as f64
    }

    /// Sum of scaled tile widths plus the gaps between them.
    pub fn natural_width(&self, padding: f64) -> f64 {
        self.tiles_width() + self.gap_width(padding)
    }
}
