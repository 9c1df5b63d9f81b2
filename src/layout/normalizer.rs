use crate::models::{Row, Tile};

/// Relative tolerance for the equal-height check inside a row.
const ROW_HEIGHT_TOLERANCE: f64 = 1e-6;

/// Stretches packed rows to the container width and stacks them vertically.
///
/// # Algorithm
/// 1. Width pass, per row: scale every tile by
///    `(container_width - padding * (n - 1)) / sum(scaled_width)` so tiles and
///    gaps together span the container, then chain `start_x` left to right
///    with `padding` between tiles. When the gaps alone are as wide as the
///    container, tiles fall back to `container_width / natural_width`.
/// 2. Height pass, sequential: row one starts at `padding / 2` and reserves an
///    extra half padding at its end; every later row starts where the previous
///    one ends and adds `padding` below its tiles.
#[derive(Debug, Clone, Copy)]
pub struct RowNormalizer {
    pub container_width: f64,
    pub padding: f64,
}

impl RowNormalizer {
    pub fn new(container_width: f64, padding: f64) -> Self {
        Self {
            container_width,
            padding,
        }
    }

    /// Runs both passes in place. Running it again on its own output leaves
    /// the positions unchanged.
    pub fn normalize(&self, rows: &mut [Row]) {
        for row in rows.iter_mut() {
            self.normalize_width(row);
        }
        self.normalize_heights(rows);
    }

    /// Width pass for a single row. Rows are independent of each other here.
    pub fn normalize_width(&self, row: &mut Row) {
        if row.is_empty() {
            return;
        }

        let tiles_width = row.tiles_width();
        if tiles_width > 0.0 && tiles_width.is_finite() {
            let available = self.container_width - row.gap_width(self.padding);
            let width_correction = if available > 0.0 {
                available / tiles_width
            } else {
                self.container_width / row.natural_width(self.padding)
            };
            for tile in &mut row.tiles {
                tile.set_scale_factor(tile.scale_factor() * width_correction);
            }
        }

        let padding = self.padding;
        let mut tiles = row.tiles.iter_mut();
        let Some(first) = tiles.next() else {
            return;
        };
        first.row_position = 1;
        let mut previous = (first.start_x + first.scaled_width(), first.row_position);
        for tile in tiles {
            tile.start_x = previous.0 + padding;
            tile.row_position = previous.1 + 1;
            previous = (tile.right(), tile.row_position);
        }
    }

    /// Height pass. Must run after every row's width pass.
    pub fn normalize_heights(&self, rows: &mut [Row]) {
        let half_padding = self.padding / 2.0;
        let mut previous_end: Option<f64> = None;

        for row in rows.iter_mut() {
            let Some(row_height) = row.tiles.first().map(Tile::scaled_height) else {
                continue;
            };
            debug_assert_uniform_height(row, row_height);

            let (start, end) = match previous_end {
                None => (
                    half_padding,
                    half_padding + row_height + self.padding * 1.5,
                ),
                Some(previous) => (previous, previous + row_height + self.padding),
            };

            for tile in &mut row.tiles {
                tile.start_y = start;
            }
            row.row_start_height = start;
            row.row_end_height = end;
            previous_end = Some(end);
        }
    }
}

fn debug_assert_uniform_height(row: &Row, expected: f64) {
    debug_assert!(
        row.tiles
            .iter()
            .all(|t| (t.scaled_height() - expected).abs() <= ROW_HEIGHT_TOLERANCE * expected.max(1.0)),
        "tiles in a row must share one height"
    );
}
