//! Thumbnail rendering with a bounded in-memory cache.

use super::metadata;
use camino::{Utf8Path, Utf8PathBuf};
use image::{DynamicImage, RgbaImage};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};

/// Default memory budget for cached thumbnails, in bytes of pixel data
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;

/// Cap on cached entries, which also bounds the number of cached failures
pub const MAX_CACHE_ENTRIES: usize = 4096;

/// Produces displayable bitmaps for files.
///
/// Implementations must be safe to call repeatedly with the same arguments and
/// must signal unsupported or corrupt input with `None` rather than an error.
#[cfg_attr(test, mockall::automock)]
pub trait ThumbnailProvider {
    /// Render `path` fitted into a `size` x `size` box, keeping the aspect ratio.
    fn render(&self, path: &Utf8Path, size: u32) -> Option<RgbaImage>;
}

/// [`ThumbnailProvider`] backed by the `image` crate.
///
/// Results are cached per `(path, size)`; failures are cached too so a corrupt
/// file is decoded only once per size. The oldest entries are evicted once the
/// pixel data exceeds the byte budget.
pub struct ImageThumbnailer {
    cache: RefCell<IndexMap<(Utf8PathBuf, u32), Option<RgbaImage>>>,
    cached_bytes: Cell<usize>,
    budget: usize,
}

impl ImageThumbnailer {
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_CACHE_BYTES)
    }

    /// Create a thumbnailer whose cache holds at most `budget` bytes of pixels
    pub fn with_budget(budget: usize) -> Self {
        Self {
            cache: RefCell::new(IndexMap::new()),
            cached_bytes: Cell::new(0),
            budget,
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Pixel bytes currently held by the cache
    pub fn cached_bytes(&self) -> usize {
        self.cached_bytes.get()
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
        self.cached_bytes.set(0);
    }

    fn decode(path: &Utf8Path, size: u32) -> Option<RgbaImage> {
        let image = match image::open(path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("Failed to decode {}: {}", path, e);
                return None;
            }
        };

        let image = apply_orientation(image, metadata::orientation(path));
        Some(image.thumbnail(size, size).to_rgba8())
    }
}

impl Default for ImageThumbnailer {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailProvider for ImageThumbnailer {
    fn render(&self, path: &Utf8Path, size: u32) -> Option<RgbaImage> {
        let key = (path.to_path_buf(), size);
        if let Some(hit) = self.cache.borrow().get(&key) {
            return hit.clone();
        }

        let rendered = Self::decode(path, size);

        let mut cache = self.cache.borrow_mut();
        let mut bytes = self.cached_bytes.get() + entry_bytes(&rendered);
        if let Some(replaced) = cache.insert(key, rendered.clone()) {
            bytes -= entry_bytes(&replaced);
        }
        while bytes > self.budget || cache.len() > MAX_CACHE_ENTRIES {
            match cache.shift_remove_index(0) {
                Some((_, evicted)) => bytes -= entry_bytes(&evicted),
                None => break,
            }
        }
        self.cached_bytes.set(bytes);
        rendered
    }
}

fn entry_bytes(entry: &Option<RgbaImage>) -> usize {
    entry.as_ref().map_or(0, |image| image.as_raw().len())
}

/// Rotate/flip an image so that EXIF orientation `orientation` displays upright.
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}
