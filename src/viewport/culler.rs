use crate::layout::LayoutSnapshot;
use crate::models::{Row, Tile};

/// Visibility test applied to each tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    /// A tile is drawn when its bottom edge lies strictly inside the band.
    ///
    /// A tile taller than the band whose bottom is below the band's end is
    /// skipped even though its top part would be on screen.
    #[default]
    BottomEdge,
    /// A tile is drawn when any part of it overlaps the band.
    Intersects,
}

/// Selects the tiles inside the visible band plus an over-scan margin.
#[derive(Debug, Clone, Copy)]
pub struct ViewportCuller {
    pub viewport_height: f64,
    pub overscan_ratio: f64,
    pub mode: CullMode,
}

impl ViewportCuller {
    pub fn new(viewport_height: f64, overscan_ratio: f64) -> Self {
        Self {
            viewport_height,
            overscan_ratio,
            mode: CullMode::BottomEdge,
        }
    }

    pub fn with_mode(mut self, mode: CullMode) -> Self {
        self.mode = mode;
        self
    }

    /// Content-space band `(start, end)` for a scroll offset.
    ///
    /// `offset` is negative once content has scrolled up, so the band starts
    /// at `-offset`.
    pub fn band(&self, offset: f64) -> (f64, f64) {
        let start = -offset;
        let end = start + self.viewport_height + self.viewport_height * self.overscan_ratio;
        (start, end)
    }

    pub fn is_visible(&self, tile: &Tile, offset: f64) -> bool {
        let (start, end) = self.band(offset);
        self.in_band(tile, start, end)
    }

    fn in_band(&self, tile: &Tile, start: f64, end: f64) -> bool {
        let bottom = tile.bottom();
        match self.mode {
            CullMode::BottomEdge => bottom > start && bottom < end,
            CullMode::Intersects => bottom > start && tile.start_y < end,
        }
    }

    /// Lazily yields the visible tiles of `rows`.
    ///
    /// Rows are ordered by position, so rows ending above the band are
    /// skipped with a binary search and iteration stops at the first row
    /// starting below it.
    pub fn visible<'a>(&self, rows: &'a [Row], offset: f64) -> impl Iterator<Item = &'a Tile> + 'a {
        let culler = *self;
        let (start, end) = self.band(offset);
        let first = rows.partition_point(|row| row.row_end_height <= start);

        rows[first..]
            .iter()
            .take_while(move |row| row.row_start_height < end)
            .flat_map(|row| row.tiles.iter())
            .filter(move |tile| culler.in_band(tile, start, end))
    }

    pub fn visible_in<'a>(
        &self,
        snapshot: &'a LayoutSnapshot,
        offset: f64,
    ) -> impl Iterator<Item = &'a Tile> + 'a {
        self.visible(&snapshot.rows, offset)
    }
}

/// Free-function form of [`ViewportCuller::visible`] using the default
/// bottom-edge test.
pub fn visible(
    rows: &[Row],
    offset: f64,
    viewport_height: f64,
    overscan_ratio: f64,
) -> impl Iterator<Item = &Tile> + '_ {
    ViewportCuller::new(viewport_height, overscan_ratio).visible(rows, offset)
}
