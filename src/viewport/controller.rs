use std::time::Instant;

use tracing::trace;

use super::damping::{ZoomDamper, ZoomDamping};
use crate::config::clamp_zoom;

/// Ratio between the previous and current end-of-content delta above which an
/// overscroll frame is rendered. Lower ratios are treated as noisy outliers.
const BOUNDARY_DELTA_RATIO: f64 = 0.5;

/// Zoom changes smaller than this are ignored.
const ZOOM_EPSILON: f64 = 1e-9;

/// Scroll position and zoom of the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    /// Content offset; 0 at the top, negative once content moved up
    pub offset: f64,
    /// Zoom factor within [0.2, 1.5]
    pub zoom_factor: f64,
    /// Largest distance content can scroll up
    pub content_max_height: f64,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            offset: 0.0,
            zoom_factor: 1.0,
            content_max_height: 0.0,
        }
    }
}

/// Result of feeding one scroll delta to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollOutcome {
    /// The offset moved; render at the new committed offset.
    Scrolled { offset: f64 },
    /// Past the end of content: render one frame at `render_offset` without
    /// moving the committed offset.
    Overscroll { render_offset: f64 },
    /// Nothing to redraw.
    Suppressed,
}

impl ScrollOutcome {
    /// Offset to render the next frame with, if any.
    pub fn render_offset(&self) -> Option<f64> {
        match *self {
            Self::Scrolled { offset } => Some(offset),
            Self::Overscroll { render_offset } => Some(render_offset),
            Self::Suppressed => None,
        }
    }
}

/// Maps raw scroll and zoom input onto the viewport state.
#[derive(Debug, Clone)]
pub struct ScrollZoomController {
    state: ViewportState,
    last_boundary_delta: f64,
    damper: ZoomDamper,
}

impl ScrollZoomController {
    pub fn new(zoom_factor: f64, damping: ZoomDamping) -> Self {
        Self {
            state: ViewportState {
                zoom_factor: clamp_zoom(zoom_factor),
                ..ViewportState::default()
            },
            last_boundary_delta: 0.0,
            damper: ZoomDamper::new(damping),
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn offset(&self) -> f64 {
        self.state.offset
    }

    pub fn zoom_factor(&self) -> f64 {
        self.state.zoom_factor
    }

    pub fn content_max_height(&self) -> f64 {
        self.state.content_max_height
    }

    pub fn set_damping(&mut self, damping: ZoomDamping) {
        self.damper.set_policy(damping);
    }

    /// Applies a scroll delta; positive moves content towards the top.
    pub fn scroll(&mut self, delta: f64) -> ScrollOutcome {
        if !delta.is_finite() || delta == 0.0 {
            return ScrollOutcome::Suppressed;
        }

        let tentative = self.state.offset + delta;
        if -tentative < self.state.content_max_height {
            self.state.offset = tentative;
            if self.state.offset > 0.0 {
                // Scrolled past the top: rubber-band by at most one delta.
                self.state.offset = delta;
            }
            return ScrollOutcome::Scrolled {
                offset: self.state.offset,
            };
        }

        let previous = self.last_boundary_delta;
        self.last_boundary_delta = delta;
        if previous / delta > BOUNDARY_DELTA_RATIO {
            ScrollOutcome::Overscroll {
                render_offset: tentative,
            }
        } else {
            trace!(previous, delta, "Suppressed end-of-content scroll delta");
            ScrollOutcome::Suppressed
        }
    }

    /// Feeds one callback of a continuous zoom gesture.
    ///
    /// Returns the new zoom factor when it changed; the caller re-lays out.
    pub fn zoom(&mut self, delta: f64, now: Instant) -> Option<f64> {
        let delta = self.damper.filter(delta, now)?;
        self.commit_zoom(clamp_zoom(delta * self.state.zoom_factor))
    }

    /// Marks the end of a zoom gesture.
    pub fn end_zoom_gesture(&mut self) {
        self.damper.reset();
    }

    /// Sets the zoom directly, bypassing damping. Out-of-range values clamp.
    pub fn set_zoom(&mut self, zoom: f64) -> Option<f64> {
        if !zoom.is_finite() {
            return None;
        }
        self.commit_zoom(clamp_zoom(zoom))
    }

    fn commit_zoom(&mut self, zoom: f64) -> Option<f64> {
        if !zoom.is_finite() || (zoom - self.state.zoom_factor).abs() < ZOOM_EPSILON {
            return None;
        }
        self.state.zoom_factor = zoom;
        if zoom < 1.0 {
            // Keep the focal point in place when zooming out.
            self.state.offset *= zoom;
        }
        Some(zoom)
    }

    /// Re-derives the scroll bound after a layout pass and pulls the offset
    /// back into `[-max(content_max_height, 0), 0]`.
    pub fn update_bounds(&mut self, content_height: f64, viewport_height: f64, padding: f64) {
        self.state.content_max_height = if content_height > 0.0 {
            content_height - viewport_height + padding / 2.0
        } else {
            0.0
        };
        let floor = -self.state.content_max_height.max(0.0);
        self.state.offset = self.state.offset.clamp(floor, 0.0);
    }

    /// Jumps to an absolute offset, clamped into the scrollable range.
    pub fn scroll_to(&mut self, offset: f64) {
        if offset.is_finite() {
            let floor = -self.state.content_max_height.max(0.0);
            self.state.offset = offset.clamp(floor, 0.0);
        }
    }
}

impl Default for ScrollZoomController {
    fn default() -> Self {
        Self::new(1.0, ZoomDamping::default())
    }
}
