use crate::models::{Row, Tile};

/// Greedy row packing for the justified grid.
///
/// Tiles are fitted to a shared row height and streamed left to right. A tile
/// that would overflow the container still joins the current row when enough
/// of it fits, which favours fewer, fuller rows; normalization shrinks the row
/// back to the container width afterwards.
#[derive(Debug, Clone, Copy)]
pub struct RowPacker {
    /// Height every tile is fitted to before normalization
    pub target_row_height: f64,
    /// Width rows are filled up to
    pub container_width: f64,
    /// Fraction of an overflowing tile that must fit to keep it in the row
    pub line_break_threshold: f64,
}

impl RowPacker {
    pub fn new(target_row_height: f64, container_width: f64, line_break_threshold: f64) -> Self {
        Self {
            target_row_height,
            container_width,
            line_break_threshold,
        }
    }

    /// Splits `tiles` into rows, preserving order.
    ///
    /// Every tile is copied, its position reset and its scale factor set so
    /// that its height equals `target_row_height`. No tile is dropped; an empty
    /// input yields no rows.
    pub fn pack(&self, tiles: &[Tile]) -> Vec<Row> {
        let mut rows = Vec::new();
        let mut current = Row::new(self.container_width);
        let mut row_width = 0.0f64;

        for tile in tiles {
            let mut tile = tile.clone();
            tile.reset_position();
            tile.set_scale_factor(self.target_row_height / tile.intrinsic_height());
            let tile_width = tile.scaled_width();

            if current.is_empty() {
                row_width = tile_width;
                current.tiles.push(tile);
                continue;
            }

            if self.accepts(row_width, tile_width) {
                row_width += tile_width;
                current.tiles.push(tile);
            } else {
                rows.push(std::mem::replace(
                    &mut current,
                    Row::new(self.container_width),
                ));
                row_width = tile_width;
                current.tiles.push(tile);
            }
        }

        if !current.is_empty() {
            rows.push(current);
        }

        rows
    }

    /// Whether a tile of `tile_width` joins a row already `row_width` wide.
    fn accepts(&self, row_width: f64, tile_width: f64) -> bool {
        if row_width + tile_width < self.container_width {
            return true;
        }
        let leftover_space = self.container_width - row_width;
        let fit_fraction = leftover_space / tile_width;
        fit_fraction > self.line_break_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tile(name: &str, width: f64, height: f64) -> Tile {
        Tile::new(name.into(), width, height)
    }

    fn row_sizes(rows: &[Row]) -> Vec<usize> {
        rows.iter().map(Row::len).collect()
    }

    #[test]
    fn test_empty_tiles() {
        let packer = RowPacker::new(100.0, 300.0, 0.5);
        assert!(packer.pack(&[]).is_empty());
    }

    #[test]
    fn test_overflow_tolerance_scenario() {
        let packer = RowPacker::new(100.0, 300.0, 0.5);
        let tiles = vec![
            make_tile("a", 150.0, 100.0),
            make_tile("b", 150.0, 100.0),
            make_tile("c", 100.0, 100.0),
        ];
        let rows = packer.pack(&tiles);
        assert_eq!(row_sizes(&rows), vec![2, 1]);
        assert_eq!(rows[0].tiles[1].id.as_str(), "b");
        assert_eq!(rows[1].tiles[0].id.as_str(), "c");
    }

    #[test]
    fn test_low_fit_fraction_breaks_line() {
        // 250 wide row, 100 wide tile: only 50% fits, threshold 0.6 rejects it.
        let packer = RowPacker::new(100.0, 300.0, 0.6);
        let tiles = vec![make_tile("a", 250.0, 100.0), make_tile("b", 100.0, 100.0)];
        assert_eq!(row_sizes(&packer.pack(&tiles)), vec![1, 1]);

        let packer = RowPacker::new(100.0, 300.0, 0.4);
        assert_eq!(row_sizes(&packer.pack(&tiles)), vec![2]);
    }

    #[test]
    fn test_tiles_are_fitted_to_target_height() {
        let packer = RowPacker::new(120.0, 2000.0, 0.5);
        let tiles = vec![
            make_tile("wide", 1920.0, 1080.0),
            make_tile("square", 500.0, 500.0),
            make_tile("tall", 1080.0, 1920.0),
        ];
        let rows = packer.pack(&tiles);
        for tile in rows.iter().flat_map(|r| r.tiles.iter()) {
            assert!((tile.scaled_height() - 120.0).abs() < 1e-9);
            assert!((tile.scaled_width() / tile.scaled_height() - tile.aspect_ratio()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_oversized_tile_gets_own_row() {
        let packer = RowPacker::new(100.0, 300.0, 0.5);
        let tiles = vec![
            make_tile("a", 100.0, 100.0),
            make_tile("pano", 1200.0, 100.0),
            make_tile("b", 100.0, 100.0),
        ];
        let rows = packer.pack(&tiles);
        assert_eq!(row_sizes(&rows), vec![1, 1, 1]);
        assert_eq!(rows[1].tiles[0].id.as_str(), "pano");
    }

    #[test]
    fn test_no_tile_dropped_and_order_kept() {
        let packer = RowPacker::new(220.0, 1920.0, 0.5);
        let tiles: Vec<Tile> = (0..57)
            .map(|i| make_tile(&format!("{}.jpg", i), 400.0 + (i % 7) as f64 * 150.0, 600.0))
            .collect();
        let rows = packer.pack(&tiles);
        let ids: Vec<&str> = rows
            .iter()
            .flat_map(|r| r.tiles.iter().map(|t| t.id.as_str()))
            .collect();
        let expected: Vec<String> = (0..57).map(|i| format!("{}.jpg", i)).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(rows.iter().all(|r| !r.is_empty()));
    }

    #[test]
    fn test_broken_rows_are_nearly_full() {
        let threshold = 0.3;
        let container = 1000.0;
        let packer = RowPacker::new(100.0, container, threshold);
        let tiles: Vec<Tile> = (0..40)
            .map(|i| make_tile(&i.to_string(), 60.0 + (i * 37 % 11) as f64 * 25.0, 100.0))
            .collect();
        let rows = packer.pack(&tiles);

        for pair in rows.windows(2) {
            let width: f64 = pair[0].tiles.iter().map(Tile::scaled_width).sum();
            let next_width = pair[1].tiles[0].scaled_width();
            let leftover = container - width;
            assert!(
                leftover <= threshold * next_width + 1e-9,
                "row left {} px free, next tile {} px wide",
                leftover,
                next_width
            );
        }
    }

    #[test]
    fn test_positions_are_reset() {
        let mut tile = make_tile("a", 100.0, 100.0);
        tile.start_x = 42.0;
        tile.start_y = 99.0;
        tile.row_position = 3;
        let rows = RowPacker::new(100.0, 300.0, 0.5).pack(&[tile]);
        let packed = &rows[0].tiles[0];
        assert_eq!((packed.start_x, packed.start_y, packed.row_position), (0.0, 0.0, 0));
    }
}
