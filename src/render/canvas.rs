//! Off-screen RGBA render target.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::Renderer;
use crate::models::Rect;

const BACKGROUND: Rgba<u8> = Rgba([24, 24, 27, 255]);
const PLACEHOLDER: Rgba<u8> = Rgba([63, 63, 70, 255]);

/// In-memory canvas the size of the viewport.
///
/// Coordinates are viewport pixels; anything outside the canvas is clipped.
pub struct RgbaCanvas {
    buffer: RgbaImage,
    background: Rgba<u8>,
    placeholder: Rgba<u8>,
}

impl RgbaCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: RgbaImage::from_pixel(width.max(1), height.max(1), BACKGROUND),
            background: BACKGROUND,
            placeholder: PLACEHOLDER,
        }
    }

    pub fn with_colors(mut self, background: Rgba<u8>, placeholder: Rgba<u8>) -> Self {
        self.background = background;
        self.placeholder = placeholder;
        self
    }

    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    /// Writes the canvas to `path`; the format follows the extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.buffer
            .save(path)
            .with_context(|| format!("Failed to write frame: {:?}", path))
    }

    fn fill(&mut self, x: f64, y: f64, width: f64, height: f64, color: Rgba<u8>) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, width, height) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                self.buffer.put_pixel(px, py, color);
            }
        }
    }

    /// Pixel bounds `[x0, x1) x [y0, y1)` of a rectangle, clipped to the
    /// canvas. `None` when nothing is left.
    fn clip(&self, x: f64, y: f64, width: f64, height: f64) -> Option<(u32, u32, u32, u32)> {
        let (cw, ch) = (f64::from(self.buffer.width()), f64::from(self.buffer.height()));
        let x0 = x.round().clamp(0.0, cw);
        let y0 = y.round().clamp(0.0, ch);
        let x1 = (x + width).round().clamp(0.0, cw);
        let y1 = (y + height).round().clamp(0.0, ch);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

impl Renderer for RgbaCanvas {
    type Image = Arc<RgbaImage>;

    fn clear(&mut self, area: Rect) {
        let color = self.background;
        self.fill(area.x, area.y, area.width, area.height, color);
    }

    fn draw_image(&mut self, image: &Arc<RgbaImage>, x: f64, y: f64, width: f64, height: f64) {
        if self.clip(x, y, width, height).is_none() {
            return;
        }
        let w = width.round().max(1.0) as u32;
        let h = height.round().max(1.0) as u32;
        if image.dimensions() == (w, h) {
            imageops::overlay(&mut self.buffer, &**image, x.round() as i64, y.round() as i64);
        } else {
            let scaled = imageops::resize(&**image, w, h, FilterType::Triangle);
            imageops::overlay(&mut self.buffer, &scaled, x.round() as i64, y.round() as i64);
        }
    }

    fn draw_placeholder(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let color = self.placeholder;
        self.fill(x, y, width, height, color);
    }
}
