//! Render-configuration frontend
//!
//! The stable facade the map renderer talks to. Holds the mutable
//! (DEM folder, kernel) configuration; a mismatch with the current cache
//! rebuilds a fresh cache atomically, never mutating one in place.

use std::sync::{Arc, Mutex};

use crate::bitmap::ShadeBitmap;
use crate::cache::{CacheConfig, HgtCache};
use crate::dem::DemFolder;
use crate::pipeline::ThreadConfig;
use crate::shading::ShadingKernel;
use crate::types::TileKey;

/// Longitudes beyond this magnitude retry across the antimeridian when
/// the primary lookup finds nothing
const ANTIMERIDIAN_MARGIN: f64 = 178.0;

struct ConfigState {
    folder: Option<Arc<dyn DemFolder>>,
    kernel: Arc<dyn ShadingKernel>,
    interpolation_overlap: bool,
    threads: ThreadConfig,
    cache_sizing: CacheConfig,
    cache: Option<Arc<HgtCache>>,
}

impl ConfigState {
    fn padding(&self) -> usize {
        if self.interpolation_overlap {
            1
        } else {
            0
        }
    }

    /// Rebuilds the cache when the configuration no longer matches it.
    /// Returns the fresh cache if one was built.
    fn refresh(&mut self) -> Option<Arc<HgtCache>> {
        let Some(folder) = &self.folder else {
            self.cache = None;
            return None;
        };

        let stale = match &self.cache {
            None => true,
            Some(cache) => {
                !Arc::ptr_eq(cache.folder(), folder)
                    || !Arc::ptr_eq(cache.kernel(), &self.kernel)
                    || cache.padding() != self.padding()
            }
        };
        if !stale {
            return None;
        }

        log::debug!("rebuilding hillshading cache");
        let fresh = Arc::new(HgtCache::new(
            Arc::clone(folder),
            Arc::clone(&self.kernel),
            self.padding(),
            self.threads.clone(),
            self.cache_sizing.clone(),
        ));
        self.cache = Some(Arc::clone(&fresh));
        Some(fresh)
    }
}

/// Hillshading frontend: configuration plus the current cache
pub struct RenderConfig {
    state: Mutex<ConfigState>,
}

impl RenderConfig {
    pub fn new(kernel: Arc<dyn ShadingKernel>) -> Self {
        Self {
            state: Mutex::new(ConfigState {
                folder: None,
                kernel,
                interpolation_overlap: true,
                threads: ThreadConfig::default(),
                cache_sizing: CacheConfig::default(),
                cache: None,
            }),
        }
    }

    /// Points the engine at a DEM folder; takes effect on the next
    /// `apply_configuration` or request
    pub fn set_dem_folder(&self, folder: Arc<dyn DemFolder>) {
        self.state.lock().unwrap().folder = Some(folder);
    }

    /// Swaps the shading kernel
    pub fn set_kernel(&self, kernel: Arc<dyn ShadingKernel>) {
        self.state.lock().unwrap().kernel = kernel;
    }

    /// Enables the one-pixel padding ring filled from neighbor tiles
    pub fn set_interpolation_overlap(&self, enabled: bool) {
        self.state.lock().unwrap().interpolation_overlap = enabled;
    }

    pub fn set_thread_config(&self, threads: ThreadConfig) {
        self.state.lock().unwrap().threads = threads;
    }

    pub fn set_cache_sizing(&self, sizing: CacheConfig) {
        self.state.lock().unwrap().cache_sizing = sizing;
    }

    /// Rebuilds the cache if the configuration changed since it was
    /// built. With `allow_background`, a fresh cache starts indexing on
    /// a background worker. Returns whether a rebuild happened.
    pub fn apply_configuration(&self, allow_background: bool) -> bool {
        let fresh = self.state.lock().unwrap().refresh();
        match fresh {
            Some(cache) => {
                if allow_background {
                    cache.start_indexing();
                }
                true
            }
            None => false,
        }
    }

    /// The cache serving requests right now, if a folder is configured
    pub fn current_cache(&self) -> Option<Arc<HgtCache>> {
        let mut state = self.state.lock().unwrap();
        state.refresh();
        state.cache.clone()
    }

    /// Requests cooperative cancellation of in-flight renders
    pub fn stop(&self) {
        if let Some(cache) = self.state.lock().unwrap().cache.clone() {
            cache.stop();
        }
    }

    /// Renders or retrieves the shade tile containing `(lat, lon)`.
    ///
    /// Near the antimeridian, a missing tile is retried once with the
    /// longitude wrapped across the 180th meridian, papering over boundary-tile
    /// absences and just-out-of-range longitudes from renderer math.
    pub fn shading_tile(
        &self,
        lat: f64,
        lon: f64,
        zoom: i32,
        px_lat: f64,
        px_lon: f64,
    ) -> Option<Arc<ShadeBitmap>> {
        let cache = self.current_cache()?;

        let tile = cache.shading_tile(TileKey::from_coords(lat, lon), zoom, px_lat, px_lon);
        if tile.is_some() || lon.abs() <= ANTIMERIDIAN_MARGIN {
            return tile;
        }

        let wrapped = if lon > 0.0 { lon - 360.0 } else { lon + 360.0 };
        cache.shading_tile(TileKey::from_coords(lat, wrapped), zoom, px_lat, px_lon)
    }
}
