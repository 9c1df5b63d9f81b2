use std::fmt;
use std::sync::Arc;

/// Opaque handle to an external media resource.
///
/// The layout core only compares and clones it; providers decide what it
/// means (a file path for the file-system provider).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaId(Arc<str>);

impl MediaId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Axis-aligned rectangle in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// One media item placed in the grid.
///
/// Intrinsic dimensions are fixed at creation; the scale factor and the
/// position fields are rewritten by every layout pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub id: MediaId,
    intrinsic_width: f64,
    intrinsic_height: f64,
    scale_factor: f64,
    pub start_x: f64,
    pub start_y: f64,
    /// 1-based index within the row, 0 until normalized
    pub row_position: usize,
    pub selected: bool,
    /// Set when the size probe failed and fallback dimensions are in use
    pub unavailable: bool,
}

impl Tile {
    /// Creates a tile from probed dimensions. Non-positive sizes are clamped
    /// to one pixel so the aspect ratio stays defined.
    pub fn new(id: MediaId, intrinsic_width: f64, intrinsic_height: f64) -> Self {
        Self {
            id,
            intrinsic_width: sanitize_dimension(intrinsic_width),
            intrinsic_height: sanitize_dimension(intrinsic_height),
            scale_factor: 1.0,
            start_x: 0.0,
            start_y: 0.0,
            row_position: 0,
            selected: false,
            unavailable: false,
        }
    }

    /// Creates a tile for media whose size could not be read.
    pub fn unavailable(id: MediaId, fallback_width: f64, fallback_height: f64) -> Self {
        let mut tile = Self::new(id, fallback_width, fallback_height);
        tile.unavailable = true;
        tile
    }

    pub fn intrinsic_width(&self) -> f64 {
        self.intrinsic_width
    }

    pub fn intrinsic_height(&self) -> f64 {
        self.intrinsic_height
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.intrinsic_width / self.intrinsic_height
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Sets the scale factor. Non-positive or non-finite factors are ignored
    /// so the tile never collapses.
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        if scale_factor.is_finite() && scale_factor > 0.0 {
            self.scale_factor = scale_factor;
        }
    }

    pub fn scaled_width(&self) -> f64 {
        self.intrinsic_width * self.scale_factor
    }

    pub fn scaled_height(&self) -> f64 {
        self.intrinsic_height * self.scale_factor
    }

    pub fn right(&self) -> f64 {
        self.start_x + self.scaled_width()
    }

    pub fn bottom(&self) -> f64 {
        self.start_y + self.scaled_height()
    }

    /// Clears the placement left behind by a previous layout pass.
    pub fn reset_position(&mut self) {
        self.start_x = 0.0;
        self.start_y = 0.0;
        self.row_position = 0;
    }

    /// Strict containment test against the tile's absolute bounds.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.start_x < x && x < self.right() && self.start_y < y && y < self.bottom()
    }
}

fn sanitize_dimension(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_dimensions_follow_scale_factor() {
        let mut tile = Tile::new("a.jpg".into(), 300.0, 200.0);
        tile.set_scale_factor(0.5);
        assert_eq!(tile.scaled_width(), 150.0);
        assert_eq!(tile.scaled_height(), 100.0);
        assert!((tile.scaled_width() / tile.scaled_height() - tile.aspect_ratio()).abs() < 1e-9);
    }

    #[test]
    fn test_scale_factor_stays_positive() {
        let mut tile = Tile::new("a.jpg".into(), 100.0, 100.0);
        tile.set_scale_factor(2.0);
        tile.set_scale_factor(0.0);
        tile.set_scale_factor(-1.0);
        tile.set_scale_factor(f64::NAN);
        assert_eq!(tile.scale_factor(), 2.0);
    }

    #[test]
    fn test_degenerate_dimensions_are_clamped() {
        let tile = Tile::new("broken".into(), 0.0, f64::INFINITY);
        assert_eq!(tile.intrinsic_width(), 1.0);
        assert_eq!(tile.intrinsic_height(), 1.0);
    }

    #[test]
    fn test_unavailable_tile() {
        let tile = Tile::unavailable("missing.png".into(), 330.0, 220.0);
        assert!(tile.unavailable);
        assert_eq!(tile.intrinsic_width(), 330.0);
    }

    #[test]
    fn test_contains_is_strict() {
        let mut tile = Tile::new("a".into(), 100.0, 50.0);
        tile.start_x = 10.0;
        tile.start_y = 20.0;
        assert!(tile.contains(50.0, 40.0));
        assert!(!tile.contains(10.0, 40.0));
        assert!(!tile.contains(50.0, 70.0));
    }
}
