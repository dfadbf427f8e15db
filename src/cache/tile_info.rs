//! Per-tile bookkeeping: source geometry and the per-zoom future table

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use crate::cache::future::LoadFuture;
use crate::dem::DemFile;
use crate::error::{Error, Result};
use crate::types::{BoundingBox, TileKey};

/// An indexed elevation source together with its derived geometry and
/// the table of current render futures, one weak slot per zoom level.
///
/// The slots are weak on purpose: the LRU owns completed renders, and a
/// slot whose future was evicted simply lapses and is re-derived. At most
/// one live future exists per `(tile, zoom)`; a cache-tag mismatch
/// replaces it.
pub struct HgtFileInfo {
    file: Arc<dyn DemFile>,
    key: TileKey,
    size_bytes: u64,
    side: usize,
    futures: Mutex<HashMap<i32, Weak<LoadFuture>>>,
}

impl std::fmt::Debug for HgtFileInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HgtFileInfo")
            .field("file", &self.file.name())
            .field("key", &self.key)
            .field("size_bytes", &self.size_bytes)
            .field("side", &self.side)
            .finish()
    }
}

impl HgtFileInfo {
    /// Validates the elevation grid layout and wraps the source.
    ///
    /// `size / 2` must be a perfect square of at least 2x2 samples.
    pub fn new(file: Arc<dyn DemFile>, key: TileKey) -> Result<Self> {
        let size = file.size_bytes();
        let side = grid_side(size).ok_or_else(|| {
            Error::InvalidDem(format!(
                "{}: {} bytes is not a square number of 16-bit samples",
                file.name(),
                size
            ))
        })?;

        if side < 2 {
            return Err(Error::InvalidDem(format!(
                "{}: grid of side {} has no unit elements",
                file.name(),
                side
            )));
        }

        Ok(Self {
            file,
            key,
            size_bytes: size,
            side,
            futures: Mutex::new(HashMap::new()),
        })
    }

    pub fn file(&self) -> &Arc<dyn DemFile> {
        &self.file
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Samples per grid axis, including the one-sample neighbor overlap
    /// (3601 for 1" tiles, 1201 for 3")
    pub fn side(&self) -> usize {
        self.side
    }

    /// Unit elements per axis: `sqrt(size/2) - 1`
    pub fn input_axis_len(&self) -> usize {
        self.side - 1
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.key.bounding_box()
    }

    /// Returns the current future for `zoom`, deriving a fresh one when
    /// the slot is empty, reclaimed, or carries a stale cache tag.
    ///
    /// Overlapping requests with a matching tag always receive the same
    /// future: lookup, tag check and replacement happen under the table
    /// lock.
    pub fn get_or_create_future(
        &self,
        zoom: i32,
        tag: i64,
        make: impl FnOnce() -> LoadFuture,
    ) -> Arc<LoadFuture> {
        let mut futures = self.futures.lock().unwrap();

        if let Some(slot) = futures.get(&zoom) {
            if let Some(existing) = slot.upgrade() {
                if existing.tag() == tag {
                    return existing;
                }
                log::debug!(
                    "tile {:?} zoom {}: cache tag changed, re-deriving render",
                    self.key,
                    zoom
                );
            }
        }

        let fresh = Arc::new(make());
        futures.insert(zoom, Arc::downgrade(&fresh));
        fresh
    }
}

/// Side length of a square grid of 16-bit samples occupying `size`
/// bytes, or `None` when the byte count is not such a grid
pub fn grid_side(size: u64) -> Option<usize> {
    if size % 2 != 0 {
        return None;
    }
    let samples = size / 2;
    let side = (samples as f64).sqrt().round() as u64;
    (side * side == samples).then_some(side as usize)
}
