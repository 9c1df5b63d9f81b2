//! Media provider backed by image files on disk.
//!
//! Media ids are file paths. Sizes are read from image headers without a full
//! decode; pixels are decoded on the [`DecodeQueue`] workers and downscaled
//! to the requested bounds before they reach the render thread.

use std::io::{self, Cursor};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use image::codecs::gif::GifDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, DynamicImage, ImageFormat, ImageReader, RgbaImage};

use super::cache::ImageCache;
use super::decode_queue::DecodeQueue;
use super::{DecodeHandle, MediaProvider};
use crate::error::MediaError;
use crate::models::MediaId;

/// Decoded, display-ready image.
pub type SharedImage = Arc<RgbaImage>;

/// Reads and decodes image files referenced by path.
pub struct FsMediaProvider {
    queue: DecodeQueue<SharedImage>,
    cache: ImageCache,
}

impl FsMediaProvider {
    pub fn new(workers: usize, cache: ImageCache) -> io::Result<Self> {
        let queue = DecodeQueue::new(workers, |id: &MediaId, max_width: f64, max_height: f64| {
            decode_file(Path::new(id.as_str()), max_width, max_height)
                .map(Arc::new)
                .map_err(|e| MediaError::decode_failed(id.as_str(), format!("{:#}", e)))
        })?;
        Ok(Self { queue, cache })
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// True while decodes are queued or running.
    pub fn is_busy(&self) -> bool {
        self.queue.is_busy()
    }
}

impl MediaProvider for FsMediaProvider {
    type Image = SharedImage;

    fn probe_size(&self, id: &MediaId) -> Result<(f64, f64), MediaError> {
        let (width, height) = read_dimensions(Path::new(id.as_str()))
            .map_err(|e| MediaError::unavailable(id.as_str(), format!("{:#}", e)))?;
        if width == 0 || height == 0 {
            return Err(MediaError::unavailable(id.as_str(), "image has no pixels"));
        }
        Ok((f64::from(width), f64::from(height)))
    }

    fn decode(&self, id: &MediaId, max_width: f64, max_height: f64) -> DecodeHandle<SharedImage> {
        self.queue.submit(id, max_width, max_height)
    }

    fn post_process(&self, image: SharedImage, max_height: f64, max_width: f64) -> SharedImage {
        let (width, height) = fit_dimensions(image.width(), image.height(), max_width, max_height);
        if (width, height) == image.dimensions() {
            return image;
        }
        Arc::new(imageops::resize(&*image, width, height, FilterType::Triangle))
    }

    fn cached(&self, id: &MediaId) -> Option<SharedImage> {
        self.cache.get(id)
    }

    fn store(&self, id: &MediaId, image: SharedImage) {
        self.cache.insert(id, image);
    }
}

/// Decodes an image file; animated GIFs yield their first frame.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    let format = image::guess_format(&bytes).ok();

    if format == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(Cursor::new(bytes))
            .with_context(|| format!("Failed to decode GIF: {:?}", path))?;
        let mut frames = decoder.into_frames();
        if let Some(frame) = frames.next() {
            let frame = frame.context("Failed to decode GIF frame")?;
            return Ok(DynamicImage::ImageRgba8(frame.into_buffer()));
        }
        return Err(anyhow!("GIF has no frames: {:?}", path));
    }

    match format {
        Some(fmt) => image::load_from_memory_with_format(&bytes, fmt)
            .with_context(|| format!("Failed to decode image: {:?}", path)),
        None => image::load_from_memory(&bytes)
            .with_context(|| format!("Failed to decode image: {:?}", path)),
    }
}

/// Reads `(width, height)` from the image header.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    ImageReader::open(path)
        .with_context(|| format!("Failed to open image: {:?}", path))?
        .with_guessed_format()
        .context("Failed to guess image format")?
        .into_dimensions()
        .with_context(|| format!("Failed to read dimensions: {:?}", path))
}

/// Decodes `path` and shrinks it to fit `max_width x max_height`.
fn decode_file(path: &Path, max_width: f64, max_height: f64) -> Result<RgbaImage> {
    let img = open_image(path)?;
    let (width, height) = fit_dimensions(img.width(), img.height(), max_width, max_height);
    if (width, height) == (img.width(), img.height()) {
        return Ok(img.into_rgba8());
    }
    Ok(img.resize_exact(width, height, FilterType::CatmullRom).into_rgba8())
}

/// Largest size with the source aspect ratio that fits the bounds.
///
/// Never upscales. Unusable bounds leave the size unchanged.
fn fit_dimensions(src_width: u32, src_height: u32, max_width: f64, max_height: f64) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (src_width.max(1), src_height.max(1));
    }
    if !(max_width.is_finite() && max_height.is_finite()) || max_width <= 0.0 || max_height <= 0.0
    {
        return (src_width, src_height);
    }

    let scale = (max_width / f64::from(src_width))
        .min(max_height / f64::from(src_height))
        .min(1.0);
    let width = (f64::from(src_width) * scale).round().max(1.0) as u32;
    let height = (f64::from(src_height) * scale).round().max(1.0) as u32;
    (width, height)
}
