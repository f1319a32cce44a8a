//! Level-of-detail bitmaps of the source image.
//!
//! The view asks for a bitmap matching its zoom level; the cache answers from
//! memory when it can and otherwise rasterizes on a worker thread. Results are
//! only applied from [`RenderCache::poll_completed`], on the owning thread,
//! after checking they were produced for the current source image.

use crate::errors::Result;
use crate::math::Size;
use crate::task_scheduler::{RasterResult, RasterScheduler};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Identifies one consumer of the cache; later requests from the same caller
/// supersede its earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerId(Uuid);

impl CallerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallerId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for PixelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Hashable form of a requested scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScaleKey(u32);

impl From<f32> for ScaleKey {
    fn from(scale: f32) -> Self {
        Self(scale.to_bits())
    }
}

impl ScaleKey {
    pub fn scale(self) -> f32 {
        f32::from_bits(self.0)
    }
}

pub type RenderCallback = Box<dyn FnOnce(Arc<RgbaImage>)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub rasterized: usize,
    pub discarded: usize,
    pub pending_scales: usize,
}

/// Resizes `source` to `size` and flips it to a bottom-left origin.
pub fn rasterize(source: &RgbaImage, size: PixelSize) -> RgbaImage {
    if source.dimensions() == (size.width, size.height) {
        imageops::flip_vertical(source)
    } else {
        let resized = imageops::resize(source, size.width, size.height, FilterType::Triangle);
        imageops::flip_vertical(&resized)
    }
}

pub struct RenderCache {
    image: Option<Arc<RgbaImage>>,
    generation: u64,
    device_density: f32,
    cache: HashMap<PixelSize, Arc<RgbaImage>>,
    pending: HashMap<ScaleKey, Vec<(CallerId, RenderCallback)>>,
    ready: Vec<(RenderCallback, Arc<RgbaImage>)>,
    scheduler: RasterScheduler,
    rasterized: usize,
    discarded: usize,
}

impl RenderCache {
    pub fn new(device_density: f32, workers: usize) -> Result<Self> {
        Ok(Self {
            image: None,
            generation: 0,
            device_density,
            cache: HashMap::new(),
            pending: HashMap::new(),
            ready: Vec::new(),
            scheduler: RasterScheduler::new(workers)?,
            rasterized: 0,
            discarded: 0,
        })
    }

    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the source image. Anything derived from the old one is
    /// dropped, and work still running for it will be discarded on arrival.
    pub fn set_image(&mut self, image: Arc<RgbaImage>) {
        if let Some(current) = &self.image {
            if Arc::ptr_eq(current, &image) {
                return;
            }
        }
        self.generation += 1;
        self.image = Some(image);
        self.pending.clear();
        self.ready.clear();
        self.clear_cache();
        let dropped = self.scheduler.discard_stale(self.generation);
        tracing::debug!(generation = self.generation, dropped_jobs = dropped, "source image replaced");
    }

    pub fn clear_cache(&mut self) {
        if !self.cache.is_empty() {
            tracing::debug!(entries = self.cache.len(), "clearing render cache");
        }
        self.cache.clear();
    }

    /// Half-extents of the image quad in normalized view space.
    ///
    /// An image smaller than the view on both axes keeps its native size;
    /// otherwise the short view axis is filled.
    pub fn quad_extent(&self, viewport: Size) -> Option<(f32, f32)> {
        let image = self.image.as_ref()?;
        if viewport.is_empty() {
            return None;
        }
        let (image_width, image_height) = (image.width() as f32, image.height() as f32);
        let aspect = image_width / image_height;
        let (width, height) = (viewport.width, viewport.height);
        let min_dimension = width.min(height);

        let extent = if image_width < width && image_height < height {
            (image_width / width, image_height / height)
        } else if width == min_dimension {
            (min_dimension / width, (min_dimension / height) / aspect)
        } else {
            ((min_dimension / width) * aspect, min_dimension / height)
        };
        Some(extent)
    }

    /// Pixel size of the bitmap for `scale` in `viewport`, never larger than
    /// the source.
    pub fn target_pixel_size(&self, scale: f32, viewport: Size) -> Option<PixelSize> {
        let image = self.image.as_ref()?;
        if viewport.is_empty() {
            return None;
        }
        let (image_width, image_height) = image.dimensions();
        let aspect = image_width as f32 / image_height as f32;
        let min_dimension = viewport.width.min(viewport.height);

        let (logical_width, logical_height) = if viewport.width == min_dimension {
            (min_dimension, min_dimension / aspect)
        } else {
            (min_dimension * aspect, min_dimension)
        };

        let true_scale = scale * self.device_density;
        let width = logical_width * true_scale;
        let height = logical_height * true_scale;

        if width > image_width as f32 || height > image_height as f32 {
            return Some(PixelSize::new(image_width, image_height));
        }
        Some(PixelSize::new(
            (width.round() as u32).max(1),
            (height.round() as u32).max(1),
        ))
    }

    /// Asks for the bitmap at `scale`; `callback` runs from a later
    /// [`poll_completed`](Self::poll_completed), never synchronously.
    ///
    /// Only the newest request per caller survives. Requests for a scale that
    /// is already being rasterized join that job instead of starting another.
    pub fn request_render(&mut self, scale: f32, viewport: Size, caller: CallerId, callback: RenderCallback) {
        let Some(size) = self.target_pixel_size(scale, viewport) else {
            tracing::trace!(scale, "render request without image or viewport ignored");
            return;
        };

        for waiting in self.pending.values_mut() {
            waiting.retain(|(id, _)| *id != caller);
        }

        if let Some(bitmap) = self.cache.get(&size) {
            tracing::trace!(scale, size = %size, "render cache hit");
            self.ready.push((callback, Arc::clone(bitmap)));
            return;
        }
        tracing::trace!(scale, size = %size, "render cache miss");

        match self.pending.entry(ScaleKey::from(scale)) {
            Entry::Occupied(mut waiting) => {
                waiting.get_mut().push((caller, callback));
            }
            Entry::Vacant(slot) => {
                slot.insert(vec![(caller, callback)]);
                // Checked by target_pixel_size above.
                if let Some(source) = &self.image {
                    let job = self.scheduler.submit(
                        self.generation,
                        ScaleKey::from(scale),
                        size,
                        Arc::clone(source),
                    );
                    tracing::debug!(job, scale, size = %size, generation = self.generation, "raster job submitted");
                }
            }
        }
    }

    /// Synchronous variant of [`request_render`](Self::request_render) for
    /// the first layout, before any background result exists.
    pub fn render_immediate(&mut self, scale: f32, viewport: Size) -> Option<Arc<RgbaImage>> {
        let size = self.target_pixel_size(scale, viewport)?;
        if let Some(bitmap) = self.cache.get(&size) {
            tracing::trace!(scale, size = %size, "render cache hit");
            return Some(Arc::clone(bitmap));
        }

        let source = self.image.as_ref()?;
        let bitmap = Arc::new(rasterize(source, size));
        self.rasterized += 1;
        self.cache.insert(size, Arc::clone(&bitmap));
        tracing::debug!(scale, size = %size, "rasterized on caller thread");
        Some(bitmap)
    }

    /// Applies finished work and runs due callbacks. Returns how many
    /// callbacks ran.
    pub fn poll_completed(&mut self) -> usize {
        let mut fired = 0;
        for (callback, bitmap) in std::mem::take(&mut self.ready) {
            callback(bitmap);
            fired += 1;
        }
        while let Some(result) = self.scheduler.try_recv_result() {
            fired += self.complete(result);
        }
        fired
    }

    /// Like [`poll_completed`](Self::poll_completed), but when nothing was
    /// ready and work is outstanding, blocks up to `timeout` for one result.
    pub fn wait_for_results(&mut self, timeout: Duration) -> usize {
        let fired = self.poll_completed();
        if fired > 0 || self.pending.is_empty() {
            return fired;
        }
        match self.scheduler.recv_result_timeout(timeout) {
            Some(result) => self.complete(result) + self.poll_completed(),
            None => 0,
        }
    }

    fn complete(&mut self, result: RasterResult) -> usize {
        if result.generation != self.generation {
            self.discarded += 1;
            tracing::warn!(
                job = result.job_id,
                job_generation = result.generation,
                generation = self.generation,
                "discarding render for replaced image"
            );
            return 0;
        }

        self.rasterized += 1;
        self.cache.insert(result.size, Arc::clone(&result.bitmap));
        let waiting = self.pending.remove(&result.scale).unwrap_or_default();
        tracing::debug!(
            job = result.job_id,
            size = %result.size,
            callbacks = waiting.len(),
            "render completed"
        );

        let fired = waiting.len();
        for (_, callback) in waiting {
            callback(Arc::clone(&result.bitmap));
        }
        fired
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || !self.ready.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.len(),
            rasterized: self.rasterized,
            discarded: self.discarded,
            pending_scales: self.pending.len(),
        }
    }
}
