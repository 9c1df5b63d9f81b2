use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use super::normalizer::RowNormalizer;
use super::packer::RowPacker;
use super::snapshot::LayoutSnapshot;
use crate::config::{
    clamp_zoom, validate_damping, validate_finite, validate_padding, validate_positive,
    validate_threshold, GridConfig,
};
use crate::error::ConfigError;
use crate::models::{MediaId, Tile};
use crate::viewport::{
    hit_test, CullMode, ScrollOutcome, ScrollZoomController, SelectionSink, ViewportCuller,
    ViewportState, ZoomDamping,
};

/// Runs a full pack and normalize pass over `tiles`.
pub fn recompute(config: &GridConfig, tiles: &[Tile]) -> LayoutSnapshot {
    let target_row_height = config.target_row_height();
    let packer = RowPacker::new(
        target_row_height,
        config.viewport_width,
        config.line_break_threshold,
    );
    let mut rows = packer.pack(tiles);
    RowNormalizer::new(config.viewport_width, config.padding).normalize(&mut rows);

    LayoutSnapshot {
        rows,
        container_width: config.viewport_width,
        padding: config.padding,
        target_row_height,
    }
}

/// Owns the tile list, the configuration, the viewport state and the current
/// layout snapshot.
///
/// Every configuration change or tile-set mutation re-runs the whole pipeline;
/// the packing decision for a tile depends on every tile before it, so there
/// is no partial re-layout. All methods take `&mut self`, which keeps
/// recomputes from overlapping.
pub struct LayoutEngine {
    config: GridConfig,
    tiles: Vec<Tile>,
    snapshot: Arc<LayoutSnapshot>,
    controller: ScrollZoomController,
}

impl LayoutEngine {
    pub fn new(config: GridConfig) -> Result<Self, ConfigError> {
        let config = config.normalized()?;
        let controller = ScrollZoomController::new(config.zoom_factor, config.zoom_damping);
        let snapshot = Arc::new(LayoutSnapshot::empty(
            config.viewport_width,
            config.padding,
            config.target_row_height(),
        ));
        Ok(Self {
            config,
            tiles: Vec::new(),
            snapshot,
            controller,
        })
    }

    pub fn with_tiles(config: GridConfig, tiles: Vec<Tile>) -> Result<Self, ConfigError> {
        let mut engine = Self::new(config)?;
        engine.set_tiles(tiles);
        Ok(engine)
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// The current layout. Cheap to clone and safe to hold across recomputes.
    pub fn snapshot(&self) -> Arc<LayoutSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn viewport(&self) -> ViewportState {
        self.controller.state()
    }

    pub fn culler(&self) -> ViewportCuller {
        ViewportCuller::new(self.config.viewport_height, self.config.overscan_ratio)
            .with_mode(self.config.cull_mode)
    }

    /// Re-lays out every tile and replaces the snapshot.
    pub fn recompute(&mut self) -> Arc<LayoutSnapshot> {
        let started = Instant::now();
        let snapshot = Arc::new(recompute(&self.config, &self.tiles));

        self.controller.update_bounds(
            snapshot.content_height(),
            self.config.viewport_height,
            self.config.padding,
        );
        self.snapshot = Arc::clone(&snapshot);

        debug!(
            rows = snapshot.rows.len(),
            tiles = self.tiles.len(),
            content_height = snapshot.content_height(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Recomputed grid layout"
        );
        snapshot
    }

    // =====================================================================
    // Tile set
    // =====================================================================

    pub fn set_tiles(&mut self, tiles: Vec<Tile>) {
        self.tiles = tiles;
        self.recompute();
    }

    pub fn append_tiles(&mut self, tiles: impl IntoIterator<Item = Tile>) {
        let before = self.tiles.len();
        self.tiles.extend(tiles);
        if self.tiles.len() != before {
            self.recompute();
        }
    }

    /// Removes a tile and re-lays out. Returns the removed tile.
    pub fn remove_tile(&mut self, id: &MediaId) -> Option<Tile> {
        let index = self.tiles.iter().position(|tile| &tile.id == id)?;
        let removed = self.tiles.remove(index);
        self.recompute();
        Some(removed)
    }

    /// Updates a tile's selection flag without re-packing.
    ///
    /// The snapshot is copied before the flag changes so readers holding the
    /// previous snapshot are unaffected.
    pub fn set_selected(&mut self, id: &MediaId, selected: bool) -> bool {
        let Some(tile) = self.tiles.iter_mut().find(|tile| &tile.id == id) else {
            return false;
        };
        tile.selected = selected;

        let mut snapshot = (*self.snapshot).clone();
        if let Some(tile) = snapshot.find_mut(id) {
            tile.selected = selected;
        }
        self.snapshot = Arc::new(snapshot);
        true
    }

    // =====================================================================
    // Configuration triggers
    // =====================================================================

    /// Container resize. Unchanged sizes do not re-lay out.
    pub fn resize(&mut self, width: f64, height: f64) -> Result<(), ConfigError> {
        validate_positive("viewport_width", width)?;
        validate_positive("viewport_height", height)?;
        if width == self.config.viewport_width && height == self.config.viewport_height {
            return Ok(());
        }
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self.recompute();
        Ok(())
    }

    pub fn set_padding(&mut self, padding: f64) -> Result<(), ConfigError> {
        validate_padding(padding)?;
        self.config.padding = padding;
        self.recompute();
        Ok(())
    }

    pub fn set_line_break_threshold(&mut self, threshold: f64) -> Result<(), ConfigError> {
        validate_threshold(threshold)?;
        self.config.line_break_threshold = threshold;
        self.recompute();
        Ok(())
    }

    pub fn set_max_tile_height(&mut self, height: f64) -> Result<(), ConfigError> {
        validate_positive("max_tile_height", height)?;
        self.config.max_tile_height = height;
        self.recompute();
        Ok(())
    }

    /// Fallback width for tiles whose media is unavailable. Existing tiles
    /// keep their dimensions; only tiles created afterwards pick it up.
    pub fn set_max_tile_width(&mut self, width: f64) -> Result<(), ConfigError> {
        validate_positive("max_tile_width", width)?;
        self.config.max_tile_width = width;
        self.recompute();
        Ok(())
    }

    pub fn set_overscan_ratio(&mut self, ratio: f64) -> Result<(), ConfigError> {
        validate_finite("overscan_ratio", ratio)?;
        if ratio < 0.0 {
            return Err(ConfigError::NonPositive {
                field: "overscan_ratio",
                value: ratio,
            });
        }
        self.config.overscan_ratio = ratio;
        Ok(())
    }

    pub fn set_cull_mode(&mut self, mode: CullMode) {
        self.config.cull_mode = mode;
    }

    pub fn set_zoom_damping(&mut self, damping: ZoomDamping) -> Result<(), ConfigError> {
        validate_damping(damping)?;
        self.config.zoom_damping = damping;
        self.controller.set_damping(damping);
        Ok(())
    }

    /// Sets the zoom factor, clamped to [0.2, 1.5].
    pub fn set_zoom(&mut self, zoom: f64) -> Result<(), ConfigError> {
        validate_finite("zoom_factor", zoom)?;
        if let Some(zoom) = self.controller.set_zoom(clamp_zoom(zoom)) {
            self.config.zoom_factor = zoom;
            self.recompute();
        }
        Ok(())
    }

    // =====================================================================
    // Input
    // =====================================================================

    /// Feeds a scroll delta. Returns what the next frame should render.
    pub fn scroll(&mut self, delta: f64) -> ScrollOutcome {
        let outcome = self.controller.scroll(delta);
        trace!(delta, ?outcome, "Scroll");
        outcome
    }

    pub fn scroll_to(&mut self, offset: f64) {
        self.controller.scroll_to(offset);
    }

    /// Feeds one callback of a zoom gesture; re-lays out when the zoom moved.
    pub fn apply_zoom_gesture(&mut self, delta: f64, now: Instant) -> bool {
        match self.controller.zoom(delta, now) {
            Some(zoom) => {
                self.config.zoom_factor = zoom;
                self.recompute();
                true
            }
            None => false,
        }
    }

    pub fn end_zoom_gesture(&mut self) {
        self.controller.end_zoom_gesture();
    }

    /// Tiles to draw at the committed offset.
    pub fn visible_tiles(&self) -> Vec<Tile> {
        self.visible_tiles_at(self.controller.offset())
    }

    /// Tiles to draw at an arbitrary offset, e.g. an overscroll frame.
    pub fn visible_tiles_at(&self, offset: f64) -> Vec<Tile> {
        self.culler()
            .visible(&self.snapshot.rows, offset)
            .cloned()
            .collect()
    }

    /// Tile under a pointer position, in viewport coordinates.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<&Tile> {
        hit_test(&self.snapshot, x, y, self.controller.offset())
    }

    /// Resolves a click and forwards the hit to `sink`.
    pub fn click(&self, x: f64, y: f64, sink: &mut impl SelectionSink) -> Option<MediaId> {
        let tile = self.hit_test(x, y)?;
        sink.on_selected(x, y, tile);
        Some(tile.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(width: f64, height: f64) -> GridConfig {
        GridConfig {
            padding: 10.0,
            max_tile_height: 100.0,
            max_tile_width: 150.0,
            line_break_threshold: 0.5,
            zoom_factor: 1.0,
            viewport_width: width,
            viewport_height: height,
            zoom_damping: ZoomDamping::None,
            ..GridConfig::default()
        }
    }

    fn tiles(count: usize) -> Vec<Tile> {
        (0..count)
            .map(|i| {
                let width = 100.0 + (i % 5) as f64 * 40.0;
                Tile::new(format!("{}.jpg", i).as_str().into(), width, 100.0)
            })
            .collect()
    }

    #[test]
    fn test_empty_engine() {
        let engine = LayoutEngine::new(config(300.0, 200.0)).unwrap();
        assert!(engine.snapshot().is_empty());
        assert!(engine.visible_tiles().is_empty());
        assert_eq!(engine.viewport().content_max_height, 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = GridConfig {
            padding: -3.0,
            ..config(300.0, 200.0)
        };
        assert!(LayoutEngine::new(bad).is_err());
    }

    #[test]
    fn test_scenario_snapshot() {
        let tiles = vec![
            Tile::new("a".into(), 150.0, 100.0),
            Tile::new("b".into(), 150.0, 100.0),
            Tile::new("c".into(), 100.0, 100.0),
        ];
        let engine = LayoutEngine::with_tiles(config(300.0, 200.0), tiles).unwrap();
        let snapshot = engine.snapshot();
        let sizes: Vec<usize> = snapshot.rows.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![2, 1]);
        let expected_max = snapshot.content_height() - 200.0 + 5.0;
        assert!((engine.viewport().content_max_height - expected_max).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_replaced_not_mutated() {
        let mut engine = LayoutEngine::with_tiles(config(600.0, 400.0), tiles(20)).unwrap();
        let before = engine.snapshot();
        let before_copy = (*before).clone();
        engine.resize(900.0, 400.0).unwrap();
        assert_eq!(*before, before_copy);
        assert!(!Arc::ptr_eq(&before, &engine.snapshot()));
        assert_eq!(engine.snapshot().container_width, 900.0);
    }

    #[test]
    fn test_every_trigger_recomputes() {
        let mut engine = LayoutEngine::with_tiles(config(600.0, 400.0), tiles(30)).unwrap();
        let mut last = engine.snapshot();
        let mut assert_changed = |engine: &LayoutEngine| {
            let now = engine.snapshot();
            assert!(!Arc::ptr_eq(&last, &now));
            last = now;
        };

        engine.set_padding(4.0).unwrap();
        assert_changed(&engine);
        engine.set_line_break_threshold(0.2).unwrap();
        assert_changed(&engine);
        engine.set_zoom(0.6).unwrap();
        assert_changed(&engine);
        engine.resize(700.0, 400.0).unwrap();
        assert_changed(&engine);
        engine.append_tiles(tiles(3));
        assert_changed(&engine);
        engine.set_max_tile_height(80.0).unwrap();
        assert_changed(&engine);
    }

    #[test]
    fn test_setters_validate() {
        let mut engine = LayoutEngine::with_tiles(config(600.0, 400.0), tiles(5)).unwrap();
        let before = engine.snapshot();
        assert!(engine.set_padding(-1.0).is_err());
        assert!(engine.set_line_break_threshold(2.0).is_err());
        assert!(engine.resize(0.0, 100.0).is_err());
        assert!(engine.set_zoom(f64::INFINITY).is_err());
        assert!(Arc::ptr_eq(&before, &engine.snapshot()));
        assert_eq!(engine.config().padding, 10.0);
    }

    #[test]
    fn test_zoom_changes_row_height_and_clamps() {
        let mut engine = LayoutEngine::with_tiles(config(600.0, 400.0), tiles(10)).unwrap();
        engine.set_zoom(5.0).unwrap();
        assert_eq!(engine.viewport().zoom_factor, 1.5);
        assert_eq!(engine.snapshot().target_row_height, 150.0);

        engine.set_zoom(0.0001).unwrap();
        assert_eq!(engine.viewport().zoom_factor, 0.2);
        assert!((engine.snapshot().target_row_height - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_nan_smoothing_exponent_rejected() {
        let bad = GridConfig {
            zoom_damping: ZoomDamping::Smoothing { exponent: f64::NAN },
            ..config(600.0, 400.0)
        };
        assert!(LayoutEngine::new(bad).is_err());

        let mut engine = LayoutEngine::with_tiles(config(600.0, 400.0), tiles(10)).unwrap();
        assert!(engine
            .set_zoom_damping(ZoomDamping::Smoothing { exponent: f64::NAN })
            .is_err());
        assert_eq!(engine.config().zoom_damping, ZoomDamping::None);

        engine
            .set_zoom_damping(ZoomDamping::Smoothing { exponent: 0.5 })
            .unwrap();
        assert!(engine.apply_zoom_gesture(1.21, Instant::now()));
        let zoom = engine.viewport().zoom_factor;
        assert!((zoom - 1.1).abs() < 1e-9, "zoom {} after smoothed gesture", zoom);
    }

    #[test]
    fn test_zoom_gesture_relayouts() {
        let mut engine = LayoutEngine::with_tiles(config(600.0, 400.0), tiles(10)).unwrap();
        let now = Instant::now();
        assert!(engine.apply_zoom_gesture(1.2, now));
        assert!((engine.config().zoom_factor - 1.2).abs() < 1e-9);
        assert!((engine.snapshot().target_row_height - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_offset_reclamped_after_shrinking_content() {
        let mut engine = LayoutEngine::with_tiles(config(400.0, 300.0), tiles(60)).unwrap();
        let max = engine.viewport().content_max_height;
        engine.scroll_to(-max);
        assert_eq!(engine.viewport().offset, -max);

        // Wider container, fewer rows: the old offset is out of range.
        engine.resize(2000.0, 300.0).unwrap();
        let new_max = engine.viewport().content_max_height.max(0.0);
        assert!(new_max < max);
        assert!(engine.viewport().offset >= -new_max);
    }

    #[test]
    fn test_scroll_moves_visible_band() {
        let mut engine = LayoutEngine::with_tiles(config(400.0, 300.0), tiles(60)).unwrap();
        let top: Vec<MediaId> = engine.visible_tiles().into_iter().map(|t| t.id).collect();
        assert!(top.contains(&MediaId::from("0.jpg")));

        let outcome = engine.scroll(-1500.0);
        assert!(matches!(outcome, ScrollOutcome::Scrolled { .. }));
        let scrolled: Vec<MediaId> = engine.visible_tiles().into_iter().map(|t| t.id).collect();
        assert!(!scrolled.contains(&MediaId::from("0.jpg")));
        assert!(!scrolled.is_empty());
    }

    #[test]
    fn test_visible_tiles_inside_band() {
        let mut engine = LayoutEngine::with_tiles(config(500.0, 300.0), tiles(80)).unwrap();
        engine.scroll(-700.0);
        let offset = engine.viewport().offset;
        let (start, end) = engine.culler().band(offset);
        for tile in engine.visible_tiles() {
            assert!(tile.bottom() > start && tile.bottom() < end);
        }
    }

    #[test]
    fn test_remove_tile() {
        let mut engine = LayoutEngine::with_tiles(config(600.0, 400.0), tiles(6)).unwrap();
        let removed = engine.remove_tile(&MediaId::from("2.jpg"));
        assert!(removed.is_some());
        assert_eq!(engine.snapshot().tile_count(), 5);
        assert!(engine.remove_tile(&MediaId::from("missing")).is_none());
    }

    #[test]
    fn test_set_selected_copies_snapshot() {
        let mut engine = LayoutEngine::with_tiles(config(600.0, 400.0), tiles(4)).unwrap();
        let before = engine.snapshot();
        let id = MediaId::from("1.jpg");
        assert!(engine.set_selected(&id, true));
        assert!(!before.find(&id).unwrap().selected);
        assert!(engine.snapshot().find(&id).unwrap().selected);

        // Selection survives a re-layout.
        engine.set_padding(2.0).unwrap();
        assert!(engine.snapshot().find(&id).unwrap().selected);
    }

    #[test]
    fn test_click_forwards_to_sink() {
        let engine = LayoutEngine::with_tiles(config(600.0, 400.0), tiles(4)).unwrap();
        let mut hits = Vec::new();
        {
            let mut sink = |_x: f64, _y: f64, tile: &Tile| hits.push(tile.id.clone());
            let id = engine.click(10.0, 10.0, &mut sink);
            assert_eq!(id, Some(MediaId::from("0.jpg")));
            assert!(engine.click(10.0, 10_000.0, &mut sink).is_none());
        }
        assert_eq!(hits, vec![MediaId::from("0.jpg")]);
    }
}
