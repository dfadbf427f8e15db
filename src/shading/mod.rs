//! Shading kernels
//!
//! A kernel owns the mapping from elevation unit elements to output
//! bytes: sizing, cache identity, zoom envelope and the per-element
//! shade computation. The raster pipeline guarantees each unit element
//! is delivered exactly once, in row-major order; everything else is the
//! kernel's business.

pub mod adaptive;
pub mod simple;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::cache::tile_info::HgtFileInfo;
use crate::pipeline::{OutputWindow, PipelineParams};

pub use adaptive::AdaptiveShadingKernel;
pub use simple::SimpleShadingKernel;

/// Base max zoom at the 1" grid unit of 3600 elements per degree
const BASE_MAX_ZOOM: i32 = 17;
const BASE_AXIS_LEN: f64 = 3600.0;

/// A pluggable shade computation over DEM unit elements
pub trait ShadingKernel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Unit elements per input axis: `sqrt(size/2) - 1`
    fn input_axis_len(&self, info: &HgtFileInfo) -> usize {
        info.input_axis_len()
    }

    /// Shade pixels per output axis, before padding
    fn output_axis_len(&self, info: &HgtFileInfo, zoom: i32, px_lat: f64, px_lon: f64) -> usize;

    /// Total output width including both padding columns
    fn output_width(
        &self,
        info: &HgtFileInfo,
        padding: usize,
        zoom: i32,
        px_lat: f64,
        px_lon: f64,
    ) -> usize {
        self.output_axis_len(info, zoom, px_lat, px_lon) + 2 * padding
    }

    /// Upper bound on the rendered byte grid, used for admission
    fn output_size_bytes(
        &self,
        info: &HgtFileInfo,
        padding: usize,
        zoom: i32,
        px_lat: f64,
        px_lon: f64,
    ) -> u64 {
        let width = self.output_width(info, padding, zoom, px_lat, px_lon) as u64;
        width * width
    }

    /// Kernel-specific contribution to the cache tag; the adaptive
    /// kernel returns its quality factor
    fn cache_tag_bin(&self, _info: &HgtFileInfo, _zoom: i32, _px_lat: f64, _px_lon: f64) -> i64 {
        0
    }

    /// Fingerprint of everything that determines whether an existing
    /// render is reusable
    fn cache_tag(
        &self,
        info: &HgtFileInfo,
        padding: usize,
        zoom: i32,
        px_lat: f64,
        px_lon: f64,
    ) -> i64 {
        hash_info(info)
            .wrapping_mul(31)
            .wrapping_add(padding as i64)
            .wrapping_mul(31)
            .wrapping_add(self.cache_tag_bin(info, zoom, px_lat, px_lon))
    }

    /// Inclusive zoom interval this kernel will render for the tile
    fn zoom_range(&self, _info: &HgtFileInfo) -> (i32, i32) {
        (0, i32::MAX)
    }

    /// Signed output scaling: `f > 0` writes an f-by-f block per element,
    /// `f < 0` aggregates |f|-by-|f| elements per output pixel, 1 is
    /// identity
    fn resolution_factor(&self, _info: &HgtFileInfo, _zoom: i32, _px_lat: f64, _px_lon: f64) -> i32 {
        1
    }

    /// Creates the per-task shader state for a strip of element rows
    /// starting at `line_from`
    fn begin_strip(&self, params: &PipelineParams, line_from: usize) -> Box<dyn StripShader>;
}

/// Per-task kernel state walking one strip of unit elements
pub trait StripShader: Send {
    /// Consumes one unit element and returns the next output index.
    ///
    /// Elements arrive in row-major order, exactly once each. The
    /// returned index already encodes the kernel's output scaling.
    fn process_unit_element(
        &mut self,
        nw: i16,
        sw: i16,
        se: i16,
        ne: i16,
        meters_per_element: f64,
        out_ix: usize,
        out: &mut OutputWindow<'_>,
    ) -> usize;

    /// Advances the output index past the padding between element row
    /// `line` and the next
    fn advance_line(&mut self, out_ix: usize, line: usize) -> usize;
}

/// One greyscale shade byte from the 2x2 sample window.
///
/// Central-difference gradients, illuminated from the north-west; flat
/// ground renders mid-grey 128.
pub fn shade_value(nw: i16, sw: i16, se: i16, ne: i16, meters_per_element: f64) -> u8 {
    if meters_per_element <= 0.0 {
        return 128;
    }

    let (nw, sw, se, ne) = (nw as f64, sw as f64, se as f64, ne as f64);
    let dzdx = ((ne + se) - (nw + sw)) / (2.0 * meters_per_element);
    let dzdy = ((sw + se) - (nw + ne)) / (2.0 * meters_per_element);

    let v = 128.0 - 127.0 * ((dzdx + dzdy) / 2.0).clamp(-1.0, 1.0);
    v.round().clamp(0.0, 255.0) as u8
}

/// Max zoom envelope for an input axis length: 17 at 3600 elements,
/// one less per halving, one more per doubling
pub fn max_zoom_for_axis(axis_len: usize) -> i32 {
    if axis_len == 0 {
        return 0;
    }
    BASE_MAX_ZOOM + (axis_len as f64 / BASE_AXIS_LEN).log2().trunc() as i32
}

fn hash_info(info: &HgtFileInfo) -> i64 {
    let mut hasher = DefaultHasher::new();
    info.key().hash(&mut hasher);
    info.size_bytes().hash(&mut hasher);
    info.file().name().hash(&mut hasher);
    hasher.finish() as i64
}
