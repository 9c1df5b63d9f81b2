//! Per-frame draw pass.
//!
//! Each frame clears the viewport, then draws the culled tiles at
//! `y = start_y + offset`. Tiles without a decoded image get a placeholder
//! and a decode request; finished decodes are picked up by
//! [`GridRenderer::poll_completions`] and drawn only if their tile is still
//! on screen, using its current geometry.

pub mod canvas;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use tracing::{debug, trace, warn};

use crate::error::MediaError;
use crate::layout::{LayoutEngine, LayoutSnapshot};
use crate::media::{DecodeHandle, DecodeStatus, MediaProvider};
use crate::models::{MediaId, Rect, Tile};

pub use canvas::RgbaCanvas;

/// Drawing surface.
pub trait Renderer {
    type Image;

    /// Fills `area` with the background.
    fn clear(&mut self, area: Rect);

    fn draw_image(&mut self, image: &Self::Image, x: f64, y: f64, width: f64, height: f64);

    /// Blank rectangle for a tile whose image is pending or failed.
    fn draw_placeholder(&mut self, x: f64, y: f64, width: f64, height: f64);
}

/// What one frame did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Tiles drawn from a decoded image
    pub drawn: usize,
    /// Tiles drawn as placeholders
    pub placeholders: usize,
    /// Decode requests issued during the frame
    pub requested: usize,
}

/// Draws a [`LayoutEngine`]'s visible tiles with images from a provider.
pub struct GridRenderer<P: MediaProvider> {
    provider: Arc<P>,
    pending: HashMap<MediaId, DecodeHandle<P::Image>>,
    failed: HashSet<MediaId>,
    /// Layout the per-tile state was last checked against
    seen_layout: Weak<LayoutSnapshot>,
}

impl<P: MediaProvider> GridRenderer<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            pending: HashMap::new(),
            failed: HashSet::new(),
            seen_layout: Weak::new(),
        }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Number of outstanding decode requests.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_failed(&self, id: &MediaId) -> bool {
        self.failed.contains(id)
    }

    /// Draws one frame at `offset`.
    ///
    /// `offset` is usually the committed viewport offset, or the transient
    /// offset of an overscroll frame.
    pub fn render<R>(&mut self, engine: &LayoutEngine, offset: f64, target: &mut R) -> FrameStats
    where
        R: Renderer<Image = P::Image>,
    {
        let config = engine.config();
        target.clear(Rect::new(
            0.0,
            0.0,
            config.viewport_width,
            config.viewport_height,
        ));

        let snapshot = engine.snapshot();
        if !Weak::ptr_eq(&self.seen_layout, &Arc::downgrade(&snapshot)) {
            self.forget_removed(&snapshot);
            self.seen_layout = Arc::downgrade(&snapshot);
        }

        let mut stats = FrameStats::default();
        for tile in engine.culler().visible_in(&snapshot, offset) {
            self.draw_tile(tile, offset, target, &mut stats);
        }

        trace!(
            offset,
            drawn = stats.drawn,
            placeholders = stats.placeholders,
            requested = stats.requested,
            "Rendered frame"
        );
        stats
    }

    fn draw_tile<R>(&mut self, tile: &Tile, offset: f64, target: &mut R, stats: &mut FrameStats)
    where
        R: Renderer<Image = P::Image>,
    {
        let (x, y) = (tile.start_x, tile.start_y + offset);
        let (width, height) = (tile.scaled_width(), tile.scaled_height());

        if tile.unavailable || self.failed.contains(&tile.id) {
            target.draw_placeholder(x, y, width, height);
            stats.placeholders += 1;
            return;
        }

        if let Some(image) = self.provider.cached(&tile.id) {
            target.draw_image(&image, x, y, width, height);
            stats.drawn += 1;
            return;
        }

        if !self.pending.contains_key(&tile.id) {
            let handle = self.provider.decode(&tile.id, width, height);
            self.pending.insert(tile.id.clone(), handle);
            stats.requested += 1;
        }
        target.draw_placeholder(x, y, width, height);
        stats.placeholders += 1;
    }

    /// Collects finished decodes.
    ///
    /// Ready images are post-processed to their tile's current size and
    /// stored with the provider; they are drawn right away only when the
    /// tile is visible at `offset`. Failed items keep their placeholder and
    /// are not requested again. Returns the number of images drawn.
    pub fn poll_completions<R>(&mut self, engine: &LayoutEngine, offset: f64, target: &mut R) -> usize
    where
        R: Renderer<Image = P::Image>,
    {
        let finished: Vec<(MediaId, DecodeStatus<P::Image>)> = self
            .pending
            .iter()
            .filter_map(|(id, handle)| match handle.try_take() {
                DecodeStatus::Pending => None,
                status => Some((id.clone(), status)),
            })
            .collect();
        if finished.is_empty() {
            return 0;
        }

        let snapshot = engine.snapshot();
        let culler = engine.culler();
        let mut drawn = 0;

        for (id, status) in finished {
            self.pending.remove(&id);
            match status {
                DecodeStatus::Ready(image) => {
                    let Some(tile) = snapshot.find(&id) else {
                        trace!(%id, "Decoded tile no longer in the grid");
                        continue;
                    };
                    let image = self.provider.post_process(
                        image,
                        tile.scaled_height(),
                        tile.scaled_width(),
                    );
                    self.provider.store(&id, image.clone());

                    if culler.is_visible(tile, offset) {
                        target.draw_image(
                            &image,
                            tile.start_x,
                            tile.start_y + offset,
                            tile.scaled_width(),
                            tile.scaled_height(),
                        );
                        drawn += 1;
                    } else {
                        trace!(%id, "Decoded tile scrolled out of view");
                    }
                }
                DecodeStatus::Failed(MediaError::Cancelled) => {
                    trace!(%id, "Decode cancelled, will request again");
                }
                DecodeStatus::Failed(e) => {
                    warn!(%id, error = %e, "Giving up on media");
                    self.failed.insert(id);
                }
                DecodeStatus::Pending => {}
            }
        }
        drawn
    }

    /// Drops outstanding decodes for tiles outside the band at `offset`.
    pub fn cancel_offscreen(&mut self, engine: &LayoutEngine, offset: f64) -> usize {
        let snapshot = engine.snapshot();
        let visible: HashSet<&MediaId> = engine
            .culler()
            .visible_in(&snapshot, offset)
            .map(|tile| &tile.id)
            .collect();

        let before = self.pending.len();
        self.pending.retain(|id, _| visible.contains(id));
        let cancelled = before - self.pending.len();
        if cancelled > 0 {
            debug!(cancelled, "Cancelled off-screen decodes");
        }
        cancelled
    }

    /// Drops pending decodes and failure marks of tiles no longer laid out.
    fn forget_removed(&mut self, snapshot: &LayoutSnapshot) {
        if self.pending.is_empty() && self.failed.is_empty() {
            return;
        }
        let present: HashSet<&MediaId> = snapshot.tiles().map(|tile| &tile.id).collect();
        let before = self.pending.len() + self.failed.len();
        self.pending.retain(|id, _| present.contains(id));
        self.failed.retain(|id| present.contains(id));
        let forgotten = before - self.pending.len() - self.failed.len();
        if forgotten > 0 {
            debug!(forgotten, "Forgot state of removed tiles");
        }
    }
}
