//! Byte-bounded LRU cache of post-processed images.
//!
//! Keys are xxh3 hashes of the media id. Entries are evicted least recently
//! used first once the decoded pixel data exceeds the memory limit.

use std::sync::Arc;

use image::RgbaImage;
use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

use crate::models::MediaId;

/// Default memory limit in megabytes.
pub const DEFAULT_MAX_MEMORY_MB: usize = 192;

/// Minimum memory limit in megabytes.
const MIN_MEMORY_MB: usize = 16;

/// Maximum memory limit in megabytes.
const MAX_MEMORY_MB: usize = 1024;

/// Bytes per RGBA pixel.
const BYTES_PER_PIXEL: usize = 4;

/// Bump when the stored image format changes.
const CACHE_VERSION: u8 = 1;

/// Cache key for image lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn new(id: &MediaId) -> Self {
        let bytes = id.as_str().as_bytes();
        let mut data = Vec::with_capacity(bytes.len() + 1);
        data.push(CACHE_VERSION);
        data.extend_from_slice(bytes);
        Self(xxh3_64(&data))
    }
}

#[derive(Clone)]
struct CachedImage {
    image: Arc<RgbaImage>,
    memory_bytes: usize,
}

impl CachedImage {
    fn new(image: Arc<RgbaImage>) -> Self {
        let memory_bytes = image.width() as usize * image.height() as usize * BYTES_PER_PIXEL;
        Self {
            image,
            memory_bytes,
        }
    }
}

/// Shared image cache. Clones refer to the same storage.
#[derive(Clone)]
pub struct ImageCache {
    max_memory_bytes: usize,
    current_memory_bytes: Arc<RwLock<usize>>,
    entries: Arc<RwLock<LruCache<CacheKey, CachedImage>>>,
}

impl ImageCache {
    /// Creates a cache limited to `max_memory_mb`, clamped to a sane range.
    pub fn new(max_memory_mb: usize) -> Self {
        let max_memory_mb = max_memory_mb.clamp(MIN_MEMORY_MB, MAX_MEMORY_MB);
        debug!(max_memory_mb, "Initialized image cache");
        Self::with_max_bytes(max_memory_mb * 1024 * 1024)
    }

    /// Creates a cache with an exact byte limit.
    pub fn with_max_bytes(max_memory_bytes: usize) -> Self {
        Self {
            max_memory_bytes,
            current_memory_bytes: Arc::new(RwLock::new(0)),
            entries: Arc::new(RwLock::new(LruCache::unbounded())),
        }
    }

    /// Looks up an image and marks it as recently used.
    pub fn get(&self, id: &MediaId) -> Option<Arc<RgbaImage>> {
        self.entries
            .write()
            .get(&CacheKey::new(id))
            .map(|cached| Arc::clone(&cached.image))
    }

    pub fn contains(&self, id: &MediaId) -> bool {
        self.entries.read().contains(&CacheKey::new(id))
    }

    /// Inserts an image, evicting older entries to stay under the limit.
    ///
    /// Images larger than the whole limit are not cached.
    pub fn insert(&self, id: &MediaId, image: Arc<RgbaImage>) {
        let cached = CachedImage::new(image);
        let new_size = cached.memory_bytes;
        if new_size > self.max_memory_bytes {
            trace!(%id, bytes = new_size, "Image larger than cache, not cached");
            return;
        }

        let key = CacheKey::new(id);
        let mut current = self.current_memory_bytes.write();
        let mut entries = self.entries.write();

        if let Some(old) = entries.pop(&key) {
            *current = current.saturating_sub(old.memory_bytes);
        }

        while *current + new_size > self.max_memory_bytes {
            match entries.pop_lru() {
                Some((_, evicted)) => {
                    *current = current.saturating_sub(evicted.memory_bytes);
                    trace!(
                        evicted_bytes = evicted.memory_bytes,
                        current_bytes = *current,
                        "Evicted image from cache"
                    );
                }
                None => break,
            }
        }

        entries.put(key, cached);
        *current += new_size;
    }

    pub fn remove(&self, id: &MediaId) -> bool {
        let mut current = self.current_memory_bytes.write();
        match self.entries.write().pop(&CacheKey::new(id)) {
            Some(evicted) => {
                *current = current.saturating_sub(evicted.memory_bytes);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let mut current = self.current_memory_bytes.write();
        self.entries.write().clear();
        *current = 0;
        debug!("Cleared image cache");
    }

    /// Current memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        *self.current_memory_bytes.read()
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory_bytes
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORY_MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::new(width, height))
    }

    #[test]
    fn test_cache_key_hash() {
        let a = CacheKey::new(&MediaId::from("/photos/a.jpg"));
        let b = CacheKey::new(&MediaId::from("/photos/a.jpg"));
        let c = CacheKey::new(&MediaId::from("/photos/b.jpg"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_memory_limit_clamping() {
        assert_eq!(ImageCache::new(1).max_memory(), MIN_MEMORY_MB * 1024 * 1024);
        assert_eq!(
            ImageCache::new(100_000).max_memory(),
            MAX_MEMORY_MB * 1024 * 1024
        );
    }

    #[test]
    fn test_insert_and_get() {
        let cache = ImageCache::with_max_bytes(10_000);
        let id = MediaId::from("a.png");
        cache.insert(&id, image(10, 10));
        assert!(cache.contains(&id));
        assert_eq!(cache.memory_usage(), 400);
        assert_eq!(cache.get(&id).map(|img| img.width()), Some(10));
    }

    #[test]
    fn test_evicts_least_recently_used() {
        // Room for exactly two 10x10 images.
        let cache = ImageCache::with_max_bytes(800);
        let (a, b, c) = (
            MediaId::from("a"),
            MediaId::from("b"),
            MediaId::from("c"),
        );
        cache.insert(&a, image(10, 10));
        cache.insert(&b, image(10, 10));
        // Touch `a` so `b` becomes the eviction candidate.
        assert!(cache.get(&a).is_some());
        cache.insert(&c, image(10, 10));

        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert!(cache.memory_usage() <= cache.max_memory());
    }

    #[test]
    fn test_replacing_entry_keeps_accounting() {
        let cache = ImageCache::with_max_bytes(10_000);
        let id = MediaId::from("a");
        cache.insert(&id, image(10, 10));
        cache.insert(&id, image(5, 5));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.memory_usage(), 100);
    }

    #[test]
    fn test_oversized_image_not_cached() {
        let cache = ImageCache::with_max_bytes(100);
        let id = MediaId::from("big");
        cache.insert(&id, image(100, 100));
        assert!(cache.is_empty());
        assert_eq!(cache.memory_usage(), 0);
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = ImageCache::with_max_bytes(10_000);
        let id = MediaId::from("a");
        cache.insert(&id, image(4, 4));
        assert!(cache.remove(&id));
        assert!(!cache.remove(&id));
        assert_eq!(cache.memory_usage(), 0);

        cache.insert(&id, image(4, 4));
        cache.clear();
        assert!(cache.is_empty());
    }
}
