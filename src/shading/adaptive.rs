//! Adaptive-quality shading kernel
//!
//! Chooses a signed quality factor from the display parameters: when the
//! display resolves fewer pixels than the DEM provides, the kernel
//! sub-samples by an exact divisor of the input axis; when the display
//! out-resolves the DEM, it super-samples by an integer multiplier. The
//! factor participates in the cache tag, so a zoom change that alters
//! quality invalidates the cached render.

use dashmap::DashMap;

use crate::cache::tile_info::HgtFileInfo;
use crate::pipeline::{OutputWindow, PipelineParams};
use crate::shading::simple::IdentityStrip;
use crate::shading::{max_zoom_for_axis, shade_value, ShadingKernel, StripShader};

/// Displays below this many effective pixels per degree are clamped
const MIN_EFFECTIVE_PX: f64 = 4.0;

/// Adaptive kernel: quality selection plus scaled rendering
pub struct AdaptiveShadingKernel {
    custom_scale: f64,
    hq_enabled: bool,
    strides: DashMap<(usize, u64), i32>,
}

impl AdaptiveShadingKernel {
    pub fn new() -> Self {
        Self::with_quality(1.0, true)
    }

    /// `custom_scale` must lie in `(0, 1]`; values outside are clamped.
    /// Disabling `hq` caps the maximum zoom by one and disables
    /// super-sampling.
    pub fn with_quality(custom_scale: f64, hq_enabled: bool) -> Self {
        Self {
            custom_scale: if custom_scale > 0.0 && custom_scale <= 1.0 {
                custom_scale
            } else {
                1.0
            },
            hq_enabled,
            strides: DashMap::new(),
        }
    }

    /// Signed quality factor for a tile of `axis_len` unit elements
    /// displayed at `px_lat` pixels per degree of latitude.
    ///
    /// Negative values are exact divisors of `axis_len`, which keeps the
    /// sub-sampled output rows aligned with input rows downstream.
    pub fn quality_factor(&self, axis_len: usize, px_lat: f64) -> i32 {
        if axis_len == 0 {
            return 1;
        }

        let effective_px = (px_lat * self.custom_scale).max(MIN_EFFECTIVE_PX);
        let memo_key = (axis_len, effective_px.to_bits());
        if let Some(found) = self.strides.get(&memo_key) {
            return *found;
        }

        let scale = axis_len as f64 / effective_px;
        let factor = if scale >= 2.0 {
            let divisor0 = ((axis_len as f64 / scale).round() as usize).max(1);
            let mut stride = (axis_len / divisor0).max(1);
            if stride * (axis_len / stride) != axis_len {
                // Descend to the largest exact divisor.
                while axis_len % stride != 0 {
                    stride -= 1;
                }
            }
            if stride > 1 {
                -(stride as i32)
            } else {
                1
            }
        } else if scale > 1.0 / 1.25 || !self.hq_enabled {
            1
        } else {
            2
        };

        self.strides.insert(memo_key, factor);
        factor
    }

    /// Applies a signed factor to an axis length
    pub fn scale_axis(axis_len: usize, factor: i32) -> usize {
        if factor >= 1 {
            axis_len * factor as usize
        } else {
            axis_len / (-factor) as usize
        }
    }
}

impl Default for AdaptiveShadingKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadingKernel for AdaptiveShadingKernel {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn output_axis_len(&self, info: &HgtFileInfo, _zoom: i32, px_lat: f64, _px_lon: f64) -> usize {
        let axis = info.input_axis_len();
        Self::scale_axis(axis, self.quality_factor(axis, px_lat))
    }

    fn cache_tag_bin(&self, info: &HgtFileInfo, _zoom: i32, px_lat: f64, _px_lon: f64) -> i64 {
        self.quality_factor(info.input_axis_len(), px_lat) as i64
    }

    fn zoom_range(&self, info: &HgtFileInfo) -> (i32, i32) {
        let mut max = max_zoom_for_axis(info.input_axis_len());
        if !self.hq_enabled {
            max -= 1;
        }
        (0, max)
    }

    fn resolution_factor(&self, info: &HgtFileInfo, _zoom: i32, px_lat: f64, _px_lon: f64) -> i32 {
        self.quality_factor(info.input_axis_len(), px_lat)
    }

    fn begin_strip(&self, params: &PipelineParams, _line_from: usize) -> Box<dyn StripShader> {
        match params.resolution_factor {
            f if f >= 2 => Box::new(SuperStrip {
                factor: f as usize,
                width: params.output_width,
                padding: params.padding,
            }),
            f if f <= -2 => Box::new(SubStrip {
                stride: (-f) as usize,
                padding: params.padding,
                output_axis_len: params.output_axis_len,
                acc: vec![0u32; params.output_axis_len],
                col: 0,
                sub_row: 0,
            }),
            _ => Box::new(IdentityStrip {
                padding: params.padding,
            }),
        }
    }
}

/// Super-sampling: each element fills an f-by-f output block
struct SuperStrip {
    factor: usize,
    width: usize,
    padding: usize,
}

impl StripShader for SuperStrip {
    fn process_unit_element(
        &mut self,
        nw: i16,
        sw: i16,
        se: i16,
        ne: i16,
        meters_per_element: f64,
        out_ix: usize,
        out: &mut OutputWindow<'_>,
    ) -> usize {
        let v = shade_value(nw, sw, se, ne, meters_per_element);
        for row in 0..self.factor {
            let base = out_ix + row * self.width;
            for col in 0..self.factor {
                out.set(base + col, v);
            }
        }
        out_ix + self.factor
    }

    fn advance_line(&mut self, out_ix: usize, _line: usize) -> usize {
        out_ix + (self.factor - 1) * self.width + 2 * self.padding
    }
}

/// Sub-sampling: stride-by-stride blocks of elements are averaged into one output
/// pixel. The output index advances once per element column block and
/// rewinds to the row start between the input rows of one block row, so
/// each output byte is written exactly once, on the block's last
/// element.
struct SubStrip {
    stride: usize,
    padding: usize,
    output_axis_len: usize,
    acc: Vec<u32>,
    col: usize,
    sub_row: usize,
}

impl StripShader for SubStrip {
    fn process_unit_element(
        &mut self,
        nw: i16,
        sw: i16,
        se: i16,
        ne: i16,
        meters_per_element: f64,
        out_ix: usize,
        out: &mut OutputWindow<'_>,
    ) -> usize {
        let block = self.col / self.stride;
        self.acc[block] += shade_value(nw, sw, se, ne, meters_per_element) as u32;
        self.col += 1;

        if self.col % self.stride != 0 {
            return out_ix;
        }

        if self.sub_row + 1 == self.stride {
            let mean = self.acc[block] / (self.stride * self.stride) as u32;
            out.set(out_ix, mean as u8);
            self.acc[block] = 0;
        }
        out_ix + 1
    }

    fn advance_line(&mut self, out_ix: usize, line: usize) -> usize {
        self.col = 0;
        if line % self.stride == 0 {
            self.sub_row = 0;
            out_ix + 2 * self.padding
        } else {
            self.sub_row += 1;
            out_ix - self.output_axis_len
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dem::MemoryDemFile;
    use crate::types::TileKey;
    use std::sync::Arc;

    fn info_of_side(side: usize) -> HgtFileInfo {
        let file: Arc<dyn crate::dem::DemFile> =
            Arc::new(MemoryDemFile::new("N10E020.hgt", vec![0u8; side * side * 2]));
        HgtFileInfo::new(file, TileKey::new(10, 20)).unwrap()
    }

    #[test]
    fn test_factor_divides_at_half_resolution() {
        let kernel = AdaptiveShadingKernel::new();
        // scale = 3600 / 1800 = 2.0 exactly
        assert_eq!(kernel.quality_factor(3600, 1800.0), -2);
    }

    #[test]
    fn test_factor_multiplies_when_display_out_resolves() {
        let kernel = AdaptiveShadingKernel::new();
        // scale = 0.5 <= 1/1.25
        assert_eq!(kernel.quality_factor(3600, 7200.0), 2);
    }

    #[test]
    fn test_factor_identity_near_native() {
        let kernel = AdaptiveShadingKernel::new();
        // scale = 1.0, inside (1/1.25, 2.0)
        assert_eq!(kernel.quality_factor(3600, 3600.0), 1);
    }

    #[test]
    fn test_factor_without_hq_never_multiplies() {
        let kernel = AdaptiveShadingKernel::with_quality(1.0, false);
        assert_eq!(kernel.quality_factor(3600, 7200.0), 1);
        assert_eq!(kernel.quality_factor(3600, 1800.0), -2);
    }

    #[test]
    fn test_factor_deep_subsampling() {
        let kernel = AdaptiveShadingKernel::new();
        // scale = 36; stride 36 divides 3600 exactly
        assert_eq!(kernel.quality_factor(3600, 100.0), -36);
    }

    #[test]
    fn test_descent_finds_largest_divisor() {
        let kernel = AdaptiveShadingKernel::new();
        // effective px = 7, stride = 1200 / 7 = 171, which does not
        // divide 1200; the descent lands on 150.
        assert_eq!(kernel.quality_factor(1200, 7.0), -150);
    }

    #[test]
    fn test_divisor_property_holds() {
        let kernel = AdaptiveShadingKernel::new();
        for axis in [1200usize, 3600] {
            for px in [4.0, 7.0, 33.0, 100.0, 450.0, 901.0, 1800.0] {
                let f = kernel.quality_factor(axis, px);
                if f < 0 {
                    assert_eq!(axis % (-f) as usize, 0, "axis {} px {} f {}", axis, px, f);
                } else {
                    assert!(f == 1 || f == 2);
                }
            }
        }
    }

    #[test]
    fn test_effective_px_floor() {
        let kernel = AdaptiveShadingKernel::new();
        // px 1 clamps to 4, like px 4 itself.
        assert_eq!(
            kernel.quality_factor(3600, 1.0),
            kernel.quality_factor(3600, 4.0)
        );
    }

    #[test]
    fn test_memoisation_returns_same_factor() {
        let kernel = AdaptiveShadingKernel::new();
        let first = kernel.quality_factor(3600, 123.0);
        assert_eq!(kernel.quality_factor(3600, 123.0), first);
        assert_eq!(kernel.strides.len(), 1);
    }

    #[test]
    fn test_scale_axis() {
        assert_eq!(AdaptiveShadingKernel::scale_axis(1200, 2), 2400);
        assert_eq!(AdaptiveShadingKernel::scale_axis(1200, 1), 1200);
        assert_eq!(AdaptiveShadingKernel::scale_axis(1200, -4), 300);
    }

    #[test]
    fn test_output_sizing_follows_factor() {
        let kernel = AdaptiveShadingKernel::new();
        let info = info_of_side(3601);

        assert_eq!(kernel.output_axis_len(&info, 12, 1800.0, 1800.0), 1800);
        assert_eq!(kernel.output_axis_len(&info, 12, 7200.0, 7200.0), 7200);
        assert_eq!(kernel.cache_tag_bin(&info, 12, 1800.0, 1800.0), -2);
    }

    #[test]
    fn test_zoom_range() {
        let kernel = AdaptiveShadingKernel::new();
        let info = info_of_side(3601);
        assert_eq!(kernel.zoom_range(&info), (0, 17));

        let lq = AdaptiveShadingKernel::with_quality(1.0, false);
        assert_eq!(lq.zoom_range(&info), (0, 16));
    }
}
