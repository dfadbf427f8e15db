//! Identity-scale shading kernel

use crate::cache::tile_info::HgtFileInfo;
use crate::pipeline::{OutputWindow, PipelineParams};
use crate::shading::{shade_value, ShadingKernel, StripShader};

/// The non-adaptive baseline: one output pixel per unit element,
/// whatever the display parameters.
pub struct SimpleShadingKernel;

impl SimpleShadingKernel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimpleShadingKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadingKernel for SimpleShadingKernel {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn output_axis_len(&self, info: &HgtFileInfo, _zoom: i32, _px_lat: f64, _px_lon: f64) -> usize {
        info.input_axis_len()
    }

    fn begin_strip(&self, params: &PipelineParams, _line_from: usize) -> Box<dyn StripShader> {
        Box::new(IdentityStrip {
            padding: params.padding,
        })
    }
}

/// Writes one byte per element and steps over the padding columns
/// between rows. Shared by every kernel rendering at identity scale.
pub(crate) struct IdentityStrip {
    pub(crate) padding: usize,
}

impl StripShader for IdentityStrip {
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
        out.set(out_ix, shade_value(nw, sw, se, ne, meters_per_element));
        out_ix + 1
    }

    fn advance_line(&mut self, out_ix: usize, _line: usize) -> usize {
        out_ix + 2 * self.padding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dem::MemoryDemFile;
    use crate::types::TileKey;
    use std::sync::Arc;

    #[test]
    fn test_sizing_is_identity() {
        let file: Arc<dyn crate::dem::DemFile> =
            Arc::new(MemoryDemFile::new("N10E020.hgt", vec![0u8; 2 * 1201 * 1201]));
        let info = HgtFileInfo::new(file, TileKey::new(10, 20)).unwrap();
        let kernel = SimpleShadingKernel::new();

        assert_eq!(kernel.output_axis_len(&info, 12, 99999.0, 1.0), 1200);
        assert_eq!(kernel.output_width(&info, 1, 12, 1.0, 1.0), 1202);
        assert_eq!(kernel.output_size_bytes(&info, 1, 12, 1.0, 1.0), 1202 * 1202);
        assert_eq!(kernel.resolution_factor(&info, 12, 1.0, 1.0), 1);
    }
}
