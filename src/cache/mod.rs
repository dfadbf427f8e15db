//! The hillshading tile cache
//!
//! Routes each request through admission, index lookup, future
//! coalescing and LRU bookkeeping. One cache serves one
//! (DEM folder, kernel) configuration; the frontend rebuilds it
//! atomically when the configuration changes.

pub mod future;
pub mod limiter;
pub mod lru;
pub mod tile_info;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::bitmap::ShadeBitmap;
use crate::dem::{DemFolder, DemIndex};
use crate::error::Result;
use crate::pipeline::{PipelineParams, RasterPipeline, StopSignal, ThreadConfig};
use crate::pool::RasterPools;
use crate::shading::ShadingKernel;
use crate::types::TileKey;

pub use future::{Lazy, LoadFuture};
pub use limiter::SumLimiter;
pub use lru::ShadeLru;
pub use tile_info::HgtFileInfo;

/// LRU byte budget granted per configured megabyte
const BYTES_PER_MB: u64 = 125_000;

static MAX_MEMORY_MB: AtomicUsize = AtomicUsize::new(256);

/// Sets the process-wide memory ceiling feeding new caches' byte budget
pub fn set_max_memory_mb(mb: usize) {
    MAX_MEMORY_MB.store(mb.max(1), Ordering::SeqCst);
}

/// Current process-wide memory ceiling in megabytes
pub fn max_memory_mb() -> usize {
    MAX_MEMORY_MB.load(Ordering::SeqCst)
}

/// LRU sizing of one cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries never evicted by the byte budget
    pub min_count: usize,
    pub max_count: usize,
    pub max_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_count: 2,
            max_count: 128,
            max_bytes: max_memory_mb() as u64 * BYTES_PER_MB,
        }
    }
}

/// Per-configuration cache of rendered shade tiles
pub struct HgtCache {
    folder: Arc<dyn DemFolder>,
    kernel: Arc<dyn ShadingKernel>,
    padding: usize,
    threads: ThreadConfig,
    index: Arc<Lazy<Arc<DemIndex>>>,
    lru: ShadeLru,
    limiter: SumLimiter,
    pools: Arc<RasterPools>,
    stop: Arc<StopSignal>,
}

impl HgtCache {
    pub fn new(
        folder: Arc<dyn DemFolder>,
        kernel: Arc<dyn ShadingKernel>,
        padding: usize,
        threads: ThreadConfig,
        config: CacheConfig,
    ) -> Self {
        let index_folder = Arc::clone(&folder);
        Self {
            folder,
            kernel,
            padding,
            threads,
            index: Arc::new(Lazy::new(move || Arc::new(DemIndex::build(&index_folder)))),
            lru: ShadeLru::new(config.min_count, config.max_count, config.max_bytes),
            limiter: SumLimiter::new(),
            pools: Arc::new(RasterPools::new()),
            stop: Arc::new(StopSignal::new()),
        }
    }

    pub fn folder(&self) -> &Arc<dyn DemFolder> {
        &self.folder
    }

    pub fn kernel(&self) -> &Arc<dyn ShadingKernel> {
        &self.kernel
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Kicks off index building on a background worker
    pub fn start_indexing(&self) {
        self.index.start_on_background();
    }

    /// Problems encountered while indexing. Forces the index to build if
    /// it has not yet.
    pub fn index_problems(&self) -> Vec<String> {
        self.index.get().problems().to_vec()
    }

    /// Number of indexed tiles; forces the index to build
    pub fn indexed_tiles(&self) -> usize {
        self.index.get().len()
    }

    /// Bytes currently held by completed renders
    pub fn size_bytes(&self) -> u64 {
        self.lru.size_bytes()
    }

    /// Requests cooperative cancellation of in-flight renders
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Clears a previous stop request
    pub fn resume(&self) {
        self.stop.resume();
    }

    /// Renders or retrieves the shade bitmap of one tile.
    ///
    /// Admission is bounded by the LRU byte budget; eviction makes room
    /// before a pending render materialises, and the completed future is
    /// recorded in the LRU afterwards. Concurrent requests for the same
    /// `(tile, zoom)` under an unchanged cache tag share one render.
    pub fn shading_tile(
        &self,
        key: TileKey,
        zoom: i32,
        px_lat: f64,
        px_lon: f64,
    ) -> Option<Arc<ShadeBitmap>> {
        let index = self.index.get();
        let info = Arc::clone(index.get(&key)?);

        let (zoom_min, zoom_max) = self.kernel.zoom_range(&info);
        if zoom < zoom_min || zoom > zoom_max {
            return None;
        }

        let estimate = self
            .kernel
            .output_size_bytes(&info, self.padding, zoom, px_lat, px_lon);

        self.limiter.add(estimate, self.lru.max_bytes());
        let _admission = AdmissionGuard {
            limiter: &self.limiter,
            amount: estimate,
        };

        let tag = self
            .kernel
            .cache_tag(&info, self.padding, zoom, px_lat, px_lon);
        let fut =
            info.get_or_create_future(zoom, tag, || self.render_future(&info, tag, zoom, px_lat, px_lon));

        if !fut.is_done() {
            self.lru.ensure_enough_space(estimate);
        }
        let bitmap = fut.wait();
        self.lru.mark_used(&fut);
        bitmap
    }

    fn render_future(
        &self,
        info: &Arc<HgtFileInfo>,
        tag: i64,
        zoom: i32,
        px_lat: f64,
        px_lon: f64,
    ) -> LoadFuture {
        let info = Arc::clone(info);
        let kernel = Arc::clone(&self.kernel);
        let pools = Arc::clone(&self.pools);
        let stop = Arc::clone(&self.stop);
        let threads = self.threads.clone();
        let padding = self.padding;

        LoadFuture::new(tag, move || {
            render_tile(&info, &kernel, pools, threads, stop, padding, zoom, px_lat, px_lon)
        })
    }
}

fn render_tile(
    info: &Arc<HgtFileInfo>,
    kernel: &Arc<dyn ShadingKernel>,
    pools: Arc<RasterPools>,
    threads: ThreadConfig,
    stop: Arc<StopSignal>,
    padding: usize,
    zoom: i32,
    px_lat: f64,
    px_lon: f64,
) -> Result<Option<Arc<ShadeBitmap>>> {
    let params = PipelineParams::for_tile(info, &**kernel, padding, zoom, px_lat, px_lon);
    if params.output_axis_len == 0 {
        return Ok(None);
    }

    let stopped = Arc::clone(&stop);
    let pipeline = RasterPipeline::new(pools, threads, stop);
    let file = Arc::clone(info.file());
    let bytes = pipeline.render(&file, kernel, &params);

    if stopped.is_stopped() {
        // The caller discards stopped output; absent, not an error.
        return Ok(None);
    }

    Ok(Some(Arc::new(ShadeBitmap::new(
        params.output_axis_len,
        padding,
        bytes,
    )?)))
}

/// Subtracts the admission estimate on every exit path
struct AdmissionGuard<'a> {
    limiter: &'a SumLimiter,
    amount: u64,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.limiter.subtract(self.amount);
    }
}
