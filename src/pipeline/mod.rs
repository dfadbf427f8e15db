//! Parallel raster pipeline
//!
//! Streams DEM samples through reader tasks into compute tasks, paced by
//! an active-task cap, producing the padded output byte grid. Reader `i`
//! owns a contiguous range of compute tasks; each compute task owns a
//! disjoint range of element rows, and therefore a disjoint contiguous
//! window of the output, so tasks write without sharing.

pub mod awaiter;
pub mod compute;
pub mod executor;
pub mod reader;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::tile_info::HgtFileInfo;
use crate::dem::DemFile;
use crate::pool::RasterPools;
use crate::shading::ShadingKernel;

pub use awaiter::{ActiveTasks, Awaiter};
pub use compute::OutputWindow;
pub use executor::{close_render_pool, SpawnCtx, ThreadConfig};

/// Target unit elements per compute task
pub const ELEMENTS_PER_TASK: usize = 16_000;

/// Ground meters spanned by one degree at the equator
const METERS_PER_DEGREE: f64 = 111_319.49;

/// Cooperative stop flag checked per row by readers and compute tasks
#[derive(Default)]
pub struct StopSignal {
    stopped: AtomicBool,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests all pipeline loops to exit early
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Clears the stop request
    pub fn resume(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// The immutable parameter bundle of one pipeline invocation.
///
/// Built once per render and passed by reference to every task; never
/// mutated after construction.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    /// Unit elements per input axis (samples per row minus the overlap)
    pub input_axis_len: usize,
    /// Shade pixels per output axis, before padding
    pub output_axis_len: usize,
    pub padding: usize,
    /// `output_axis_len + 2 * padding`
    pub output_width: usize,
    /// Signed kernel scaling; see [`ShadingKernel::resolution_factor`]
    pub resolution_factor: i32,
    /// Ground meters per element at the tile's north edge
    pub north_meters: f64,
    /// Ground meters per element at the tile's south edge
    pub south_meters: f64,
}

impl PipelineParams {
    /// Derives the bundle for one tile under the given kernel and
    /// display parameters
    pub fn for_tile(
        info: &HgtFileInfo,
        kernel: &dyn ShadingKernel,
        padding: usize,
        zoom: i32,
        px_lat: f64,
        px_lon: f64,
    ) -> Self {
        let input_axis_len = kernel.input_axis_len(info);
        let output_axis_len = kernel.output_axis_len(info, zoom, px_lat, px_lon);
        let bb = info.bounding_box();

        Self {
            input_axis_len,
            output_axis_len,
            padding,
            output_width: output_axis_len + 2 * padding,
            resolution_factor: kernel.resolution_factor(info, zoom, px_lat, px_lon),
            north_meters: element_meters_at(bb.max_lat, input_axis_len),
            south_meters: element_meters_at(bb.min_lat, input_axis_len),
        }
    }

    /// Ground meters per element at 1-based element row `line`, linearly
    /// interpolated between the tile edges
    pub fn meters_per_element(&self, line: usize) -> f64 {
        let lin = self.input_axis_len as f64;
        (self.south_meters * line as f64 + self.north_meters * (lin - line as f64)) / lin
    }

    /// Output pixel row of 0-based element row `element_row`
    fn out_row(&self, element_row: usize) -> usize {
        let f = self.resolution_factor;
        if f >= 1 {
            element_row * f as usize
        } else {
            element_row / (-f) as usize
        }
    }

    /// Output index of the first pixel written by the task starting at
    /// element row `line_from`
    pub fn initial_out_index(&self, line_from: usize) -> usize {
        (self.padding + self.out_row(line_from - 1)) * self.output_width + self.padding
    }

    /// Byte range of the output grid owned by a task covering element
    /// rows `line_from..=line_to` (whole pixel rows, padding included)
    pub fn window_byte_range(&self, line_from: usize, line_to: usize) -> std::ops::Range<usize> {
        let start = (self.padding + self.out_row(line_from - 1)) * self.output_width;
        let end = (self.padding + self.out_row(line_to)) * self.output_width;
        start..end
    }
}

fn element_meters_at(lat: f64, input_axis_len: usize) -> f64 {
    if input_axis_len == 0 {
        return 0.0;
    }
    METERS_PER_DEGREE * lat.to_radians().cos() / input_axis_len as f64
}

/// Task decomposition of one pipeline invocation
#[derive(Debug, Clone)]
pub struct TaskPlan {
    pub input_axis_len: usize,
    /// Number of compute tasks (C)
    pub compute_tasks: usize,
    /// Number of reader tasks including the caller (R)
    pub reader_tasks: usize,
    /// Element rows per compute task; the final task absorbs the
    /// remainder
    pub lines_per_task: usize,
    /// Admission cap on tasks queued or running
    pub max_active_tasks: usize,
}

impl TaskPlan {
    /// Chooses C and R for the given shape.
    ///
    /// Sources that cannot skip cheaply force a single reader. When
    /// sub-sampling, `lines_per_task` is rounded to a multiple of the
    /// stride so every task owns whole output rows.
    pub fn derive(
        params: &PipelineParams,
        threads: &ThreadConfig,
        fast_skip: bool,
        elements_per_task: usize,
    ) -> Self {
        let lin = params.input_axis_len.max(1);

        let readers = if fast_skip { 1 + threads.reader_threads } else { 1 };

        let compute = if threads.compute_threads == 0 {
            1
        } else {
            let by_budget = (lin * lin / elements_per_task.max(1)).min(lin / 2);
            readers.max(by_budget).clamp(1, lin)
        };

        let mut lines_per_task = (lin / compute).max(1);
        if params.resolution_factor < 0 {
            let stride = (-params.resolution_factor) as usize;
            lines_per_task = (lines_per_task - lines_per_task % stride).max(stride);
        }

        let compute = (lin / lines_per_task).max(1);
        let readers = readers.min(compute);

        Self {
            input_axis_len: lin,
            compute_tasks: compute,
            reader_tasks: readers,
            lines_per_task,
            max_active_tasks: (1 + 2 * threads.compute_threads) * (1 + threads.reader_threads),
        }
    }

    /// Inclusive 1-based element row span of compute task `k`
    pub fn line_span(&self, k: usize) -> (usize, usize) {
        let from = 1 + k * self.lines_per_task;
        let to = if k + 1 == self.compute_tasks {
            self.input_axis_len
        } else {
            from + self.lines_per_task - 1
        };
        (from, to)
    }

    /// Compute task range `[lo, hi)` owned by reader `r`; the last
    /// reader absorbs the remainder
    pub fn reader_span(&self, r: usize) -> (usize, usize) {
        let per_reader = self.compute_tasks / self.reader_tasks;
        let lo = r * per_reader;
        let hi = if r + 1 == self.reader_tasks {
            self.compute_tasks
        } else {
            lo + per_reader
        };
        (lo, hi)
    }
}

/// Everything a reader or compute task needs, borrowed from the render
/// invocation frame
#[derive(Clone, Copy)]
pub(crate) struct RenderContext<'a> {
    pub params: &'a PipelineParams,
    pub plan: &'a TaskPlan,
    pub kernel: &'a dyn ShadingKernel,
    pub file: &'a dyn DemFile,
    pub pools: &'a RasterPools,
    pub counter: &'a ActiveTasks,
    pub stop: &'a StopSignal,
}

/// The multi-reader / multi-computer raster pipeline
pub struct RasterPipeline {
    pools: Arc<RasterPools>,
    threads: ThreadConfig,
    stop: Arc<StopSignal>,
}

impl RasterPipeline {
    pub fn new(pools: Arc<RasterPools>, threads: ThreadConfig, stop: Arc<StopSignal>) -> Self {
        Self {
            pools,
            threads,
            stop,
        }
    }

    pub fn stop_signal(&self) -> &Arc<StopSignal> {
        &self.stop
    }

    /// Renders the padded output byte grid for one tile.
    ///
    /// IO failures inside a reader abandon that reader's remaining
    /// tasks; the grid is still returned, partially written. A stop
    /// request exits early with whatever was produced.
    pub fn render(
        &self,
        file: &Arc<dyn DemFile>,
        kernel: &Arc<dyn ShadingKernel>,
        params: &PipelineParams,
    ) -> Vec<u8> {
        let side = params.output_axis_len + 2 * params.padding;
        let mut output = vec![0u8; side * side];
        if params.input_axis_len == 0 || params.output_axis_len == 0 {
            return output;
        }

        let plan = TaskPlan::derive(params, &self.threads, file.fast_skip(), ELEMENTS_PER_TASK);
        let counter = ActiveTasks::new(plan.max_active_tasks);
        let ctx = RenderContext {
            params,
            plan: &plan,
            kernel: &**kernel,
            file: &**file,
            pools: &self.pools,
            counter: &counter,
            stop: &self.stop,
        };

        let mut windows = split_windows(params, &plan, &mut output);
        let mut per_reader = Vec::with_capacity(plan.reader_tasks);
        for r in 0..plan.reader_tasks {
            let (lo, hi) = plan.reader_span(r);
            per_reader.push(windows.drain(..hi - lo).collect::<Vec<_>>());
        }

        executor::with_render_pool(self.threads.pool_size(), move |pool| match pool {
            Some(pool) => pool.in_place_scope(|scope| {
                let mut readers = per_reader.into_iter().enumerate();
                let own = readers.next();
                for (ix, wins) in readers {
                    let ctx_ref = &ctx;
                    scope.spawn(move |s| {
                        reader::run_reader(ctx_ref, ix, wins, &SpawnCtx::Pool(s));
                    });
                }
                if let Some((ix, wins)) = own {
                    reader::run_reader(&ctx, ix, wins, &SpawnCtx::Pool(scope));
                }
            }),
            None => {
                for (ix, wins) in per_reader.into_iter().enumerate() {
                    reader::run_reader(&ctx, ix, wins, &SpawnCtx::Inline);
                }
            }
        });

        output
    }
}

/// Splits the output grid into one disjoint window per compute task.
///
/// Windows cover whole pixel rows; the top and bottom padding rows stay
/// unowned and zero until a neighbor merge fills them.
fn split_windows<'a>(
    params: &PipelineParams,
    plan: &TaskPlan,
    output: &'a mut [u8],
) -> Vec<OutputWindow<'a>> {
    let mut windows = Vec::with_capacity(plan.compute_tasks);
    let mut rest: &'a mut [u8] = output;
    let mut consumed = 0usize;

    for k in 0..plan.compute_tasks {
        let (from, to) = plan.line_span(k);
        let range = params.window_byte_range(from, to);

        let tail = std::mem::take(&mut rest);
        let (_gap, tail) = tail.split_at_mut(range.start - consumed);
        let (window, tail) = tail.split_at_mut(range.len());
        windows.push(OutputWindow::new(range.start, window));
        rest = tail;
        consumed = range.end;
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tile_info::HgtFileInfo;
    use crate::dem::{MemoryDemFile, NO_DATA};
    use crate::shading::{AdaptiveShadingKernel, SimpleShadingKernel, StripShader};
    use crate::types::TileKey;

    fn flat_info(side: usize, height: i16) -> (Arc<dyn DemFile>, HgtFileInfo) {
        let file: Arc<dyn DemFile> = Arc::new(MemoryDemFile::from_samples(
            "N10E020.hgt",
            &vec![height; side * side],
        ));
        let info = HgtFileInfo::new(Arc::clone(&file), TileKey::new(10, 20)).unwrap();
        (file, info)
    }

    fn identity_params(lin: usize, padding: usize) -> PipelineParams {
        PipelineParams {
            input_axis_len: lin,
            output_axis_len: lin,
            padding,
            output_width: lin + 2 * padding,
            resolution_factor: 1,
            north_meters: 30.0,
            south_meters: 30.0,
        }
    }

    #[test]
    fn test_meters_interpolation() {
        let mut params = identity_params(100, 0);
        params.north_meters = 10.0;
        params.south_meters = 20.0;

        assert!((params.meters_per_element(0) - 10.0).abs() < 1e-9);
        assert!((params.meters_per_element(100) - 20.0).abs() < 1e-9);
        assert!((params.meters_per_element(50) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_small_tile_falls_back_to_readers() {
        let params = identity_params(12, 0);
        let threads = ThreadConfig {
            reader_threads: 1,
            compute_threads: 1,
        };

        let plan = TaskPlan::derive(&params, &threads, true, ELEMENTS_PER_TASK);
        assert_eq!(plan.compute_tasks, 2);
        assert_eq!(plan.reader_tasks, 2);
        assert_eq!(plan.lines_per_task, 6);
        assert_eq!(plan.max_active_tasks, 6);
    }

    #[test]
    fn test_plan_four_tasks_two_readers() {
        // The 1200-element shape with an explicit per-task budget of
        // 360000 elements: 4 tasks of 300 lines across 2 readers.
        let params = identity_params(1200, 0);
        let threads = ThreadConfig {
            reader_threads: 1,
            compute_threads: 1,
        };

        let plan = TaskPlan::derive(&params, &threads, true, 360_000);
        assert_eq!(plan.compute_tasks, 4);
        assert_eq!(plan.reader_tasks, 2);
        assert_eq!(plan.lines_per_task, 300);

        assert_eq!(plan.reader_span(0), (0, 2));
        assert_eq!(plan.reader_span(1), (2, 4));
        assert_eq!(plan.line_span(0), (1, 300));
        assert_eq!(plan.line_span(2), (601, 900));
        assert_eq!(plan.line_span(3), (901, 1200));

        // Reader 1 skips all rows before task 2's previous row.
        let (first_line, _) = plan.line_span(2);
        let skip_bytes = 2 * (1200 + 1) * (first_line - 1);
        assert_eq!(skip_bytes, 1_441_200);
    }

    #[test]
    fn test_plan_task_budget_drives_count() {
        let params = identity_params(400, 0);
        let threads = ThreadConfig {
            reader_threads: 1,
            compute_threads: 2,
        };

        let plan = TaskPlan::derive(&params, &threads, true, ELEMENTS_PER_TASK);
        // 400^2 / 16000 = 10 tasks of 40 lines.
        assert_eq!(plan.compute_tasks, 10);
        assert_eq!(plan.lines_per_task, 40);
        assert_eq!(plan.max_active_tasks, 10);
    }

    #[test]
    fn test_plan_slow_skip_forces_single_reader() {
        let params = identity_params(400, 0);
        let threads = ThreadConfig {
            reader_threads: 3,
            compute_threads: 2,
        };

        let plan = TaskPlan::derive(&params, &threads, false, ELEMENTS_PER_TASK);
        assert_eq!(plan.reader_tasks, 1);
        assert!(plan.compute_tasks > 1);
    }

    #[test]
    fn test_plan_zero_compute_threads_single_task() {
        let params = identity_params(400, 0);
        let plan = TaskPlan::derive(
            &params,
            &ThreadConfig::single_threaded(),
            true,
            ELEMENTS_PER_TASK,
        );
        assert_eq!(plan.compute_tasks, 1);
        assert_eq!(plan.reader_tasks, 1);
        assert_eq!(plan.lines_per_task, 400);
        assert_eq!(plan.max_active_tasks, 1);
    }

    #[test]
    fn test_plan_subsampling_aligns_tasks_to_stride() {
        let mut params = identity_params(3600, 0);
        params.resolution_factor = -30;
        params.output_axis_len = 120;
        params.output_width = 120;

        let threads = ThreadConfig {
            reader_threads: 1,
            compute_threads: 4,
        };
        let plan = TaskPlan::derive(&params, &threads, true, ELEMENTS_PER_TASK);

        assert_eq!(plan.lines_per_task % 30, 0);
        for k in 0..plan.compute_tasks {
            let (from, to) = plan.line_span(k);
            assert_eq!((from - 1) % 30, 0);
            assert_eq!(to % 30, 0);
        }
    }

    #[test]
    fn test_window_ranges_are_disjoint_and_cover_interior() {
        let params = identity_params(40, 1);
        let threads = ThreadConfig {
            reader_threads: 1,
            compute_threads: 1,
        };
        let plan = TaskPlan::derive(&params, &threads, true, 100);

        let mut covered = 0usize;
        let mut expected_start = params.output_width; // below the top padding row
        for k in 0..plan.compute_tasks {
            let (from, to) = plan.line_span(k);
            let range = params.window_byte_range(from, to);
            assert_eq!(range.start, expected_start);
            expected_start = range.end;
            covered += range.len();
        }
        assert_eq!(covered, params.output_width * 40);
    }

    /// Kernel that stamps every write and counts element invocations
    struct StampKernel {
        invocations: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl StampKernel {
        fn new() -> Self {
            Self {
                invocations: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            }
        }
    }

    impl crate::shading::ShadingKernel for StampKernel {
        fn name(&self) -> &'static str {
            "stamp"
        }

        fn output_axis_len(&self, info: &HgtFileInfo, _z: i32, _plat: f64, _plon: f64) -> usize {
            info.input_axis_len()
        }

        fn begin_strip(&self, params: &PipelineParams, _line_from: usize) -> Box<dyn StripShader> {
            Box::new(StampStrip {
                padding: params.padding,
                invocations: Arc::clone(&self.invocations),
            })
        }
    }

    struct StampStrip {
        padding: usize,
        invocations: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl StripShader for StampStrip {
        fn process_unit_element(
            &mut self,
            _nw: i16,
            _sw: i16,
            _se: i16,
            _ne: i16,
            _meters: f64,
            out_ix: usize,
            out: &mut OutputWindow<'_>,
        ) -> usize {
            self.invocations
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            out.set(out_ix, 255);
            out_ix + 1
        }

        fn advance_line(&mut self, out_ix: usize, _line: usize) -> usize {
            out_ix + 2 * self.padding
        }
    }

    fn render_with(
        side: usize,
        padding: usize,
        threads: ThreadConfig,
        kernel: Arc<dyn ShadingKernel>,
    ) -> (Vec<u8>, PipelineParams) {
        let (file, info) = flat_info(side, 100);
        let params = PipelineParams::for_tile(&info, &*kernel, padding, 12, 1e9, 1e9);
        let pipeline = RasterPipeline::new(
            Arc::new(RasterPools::new()),
            threads,
            Arc::new(StopSignal::new()),
        );
        (pipeline.render(&file, &kernel, &params), params)
    }

    #[test]
    fn test_row_major_coverage_single_threaded() {
        let kernel = Arc::new(StampKernel::new());
        let invocations = &kernel.invocations;
        let (output, params) = render_with(
            41,
            1,
            ThreadConfig::single_threaded(),
            Arc::<StampKernel>::clone(&kernel) as Arc<dyn ShadingKernel>,
        );

        let lin = 40usize;
        assert_eq!(
            invocations.load(std::sync::atomic::Ordering::SeqCst),
            lin * lin
        );

        let w = params.output_width;
        for y in 0..w {
            for x in 0..w {
                let interior = x >= 1 && x <= lin && y >= 1 && y <= lin;
                let value = output[y * w + x];
                assert_eq!(value, if interior { 255 } else { 0 }, "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_row_major_coverage_parallel() {
        let kernel = Arc::new(StampKernel::new());
        let threads = ThreadConfig {
            reader_threads: 1,
            compute_threads: 2,
        };
        let (output, params) = render_with(
            401,
            1,
            threads,
            Arc::<StampKernel>::clone(&kernel) as Arc<dyn ShadingKernel>,
        );

        let lin = 400usize;
        assert_eq!(
            kernel.invocations.load(std::sync::atomic::Ordering::SeqCst),
            lin * lin
        );

        let w = params.output_width;
        let stamped = output.iter().filter(|&&v| v == 255).count();
        assert_eq!(stamped, lin * lin);
        // Padding ring untouched.
        for x in 0..w {
            assert_eq!(output[x], 0);
            assert_eq!(output[(w - 1) * w + x], 0);
        }
    }

    #[test]
    fn test_flat_terrain_renders_mid_grey() {
        let (output, params) = render_with(
            41,
            1,
            ThreadConfig {
                reader_threads: 1,
                compute_threads: 1,
            },
            Arc::new(SimpleShadingKernel::new()),
        );

        let w = params.output_width;
        for y in 1..=40 {
            for x in 1..=40 {
                assert_eq!(output[y * w + x], 128);
            }
        }
    }

    #[test]
    fn test_no_data_substitution_keeps_flat_terrain_flat() {
        let side = 41;
        let mut samples = vec![100i16; side * side];
        samples[5 * side + 7] = NO_DATA;
        samples[20 * side + 3] = NO_DATA;

        let file: Arc<dyn DemFile> =
            Arc::new(MemoryDemFile::from_samples("N10E020.hgt", &samples));
        let info = HgtFileInfo::new(Arc::clone(&file), TileKey::new(10, 20)).unwrap();
        let kernel: Arc<dyn ShadingKernel> = Arc::new(SimpleShadingKernel::new());
        let params = PipelineParams::for_tile(&info, &*kernel, 0, 12, 1e9, 1e9);

        let pipeline = RasterPipeline::new(
            Arc::new(RasterPools::new()),
            ThreadConfig::single_threaded(),
            Arc::new(StopSignal::new()),
        );
        let output = pipeline.render(&file, &kernel, &params);

        assert!(output.iter().all(|&v| v == 128));
    }

    #[test]
    fn test_subsampled_render_covers_reduced_grid() {
        // 40 elements sub-sampled by 4 into a 10x10 grid of mid-grey:
        // 10 px per degree gives scale 4, an exact divisor of 40.
        let kernel = Arc::new(AdaptiveShadingKernel::new());
        let (file, info) = flat_info(41, 500);
        let params = PipelineParams::for_tile(&info, &*kernel, 0, 8, 10.0, 10.0);
        assert_eq!(params.resolution_factor, -4);
        assert_eq!(params.output_axis_len, 10);

        let pipeline = RasterPipeline::new(
            Arc::new(RasterPools::new()),
            ThreadConfig {
                reader_threads: 1,
                compute_threads: 1,
            },
            Arc::new(StopSignal::new()),
        );
        let kernel: Arc<dyn ShadingKernel> = kernel;
        let output = pipeline.render(&file, &kernel, &params);

        assert_eq!(output.len(), 100);
        assert!(output.iter().all(|&v| v == 128), "{:?}", output);
    }

    #[test]
    fn test_supersampled_render_fills_blocks() {
        let kernel = Arc::new(AdaptiveShadingKernel::new());
        let (file, info) = flat_info(21, 500);
        // scale = 20 / 40 = 0.5 <= 1/1.25 -> factor 2.
        let params = PipelineParams::for_tile(&info, &*kernel, 1, 8, 40.0, 40.0);
        assert_eq!(params.resolution_factor, 2);
        assert_eq!(params.output_axis_len, 40);

        let pipeline = RasterPipeline::new(
            Arc::new(RasterPools::new()),
            ThreadConfig::single_threaded(),
            Arc::new(StopSignal::new()),
        );
        let kernel: Arc<dyn ShadingKernel> = kernel;
        let output = pipeline.render(&file, &kernel, &params);

        let w = params.output_width;
        assert_eq!(output.len(), w * w);
        for y in 1..=40 {
            for x in 1..=40 {
                assert_eq!(output[y * w + x], 128, "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_stop_leaves_output_untouched() {
        let (file, info) = flat_info(41, 100);
        let kernel: Arc<dyn ShadingKernel> = Arc::new(SimpleShadingKernel::new());
        let params = PipelineParams::for_tile(&info, &*kernel, 0, 12, 1e9, 1e9);

        let stop = Arc::new(StopSignal::new());
        stop.stop();
        let pipeline = RasterPipeline::new(
            Arc::new(RasterPools::new()),
            ThreadConfig::single_threaded(),
            Arc::clone(&stop),
        );
        let output = pipeline.render(&file, &kernel, &params);
        assert!(output.iter().all(|&v| v == 0));

        stop.resume();
        let output = pipeline.render(&file, &kernel, &params);
        assert!(output.iter().any(|&v| v != 0));
    }

    #[test]
    fn test_buffers_return_to_pools() {
        let pools = Arc::new(RasterPools::new());
        let (file, info) = flat_info(401, 100);
        let kernel: Arc<dyn ShadingKernel> = Arc::new(SimpleShadingKernel::new());
        let params = PipelineParams::for_tile(&info, &*kernel, 0, 12, 1e9, 1e9);

        let pipeline = RasterPipeline::new(
            Arc::clone(&pools),
            ThreadConfig {
                reader_threads: 1,
                compute_threads: 1,
            },
            Arc::new(StopSignal::new()),
        );
        let _ = pipeline.render(&file, &kernel, &params);

        // Everything handed out was recycled.
        assert!(pools.lines.shelved() > 0);
        assert!(pools.blocks.shelved() > 0);
    }
}
