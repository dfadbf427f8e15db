//! Compute tasks: the 2x2 sliding window over one strip of element rows

use crate::dem::{DemStream, NO_DATA};
use crate::pipeline::{ActiveTasks, RenderContext};

/// One compute task's disjoint view of the output grid.
///
/// Indices are global output-grid positions; the window owns whole pixel
/// rows, so any index a well-behaved strip shader produces lands inside.
pub struct OutputWindow<'a> {
    base: usize,
    data: &'a mut [u8],
}

impl<'a> OutputWindow<'a> {
    pub fn new(base: usize, data: &'a mut [u8]) -> Self {
        Self { base, data }
    }

    /// First global index covered by this window
    pub fn base(&self) -> usize {
        self.base
    }

    /// Writes one shade byte at a global output index
    pub fn set(&mut self, ix: usize, value: u8) {
        let local = ix.wrapping_sub(self.base);
        debug_assert!(local < self.data.len(), "write at {} outside window", ix);
        if let Some(slot) = self.data.get_mut(local) {
            *slot = value;
        }
    }
}

/// Releases the active-task slot on every exit path
struct ReleaseGuard<'a> {
    counter: &'a ActiveTasks,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        self.counter.release();
    }
}

/// Runs a compute task over a pre-read block of rows.
///
/// `block` holds the task's element rows, `prev` the row above the
/// first. Both buffers are recycled and the active-task slot released
/// when the task finishes.
pub(crate) fn run_block_task(
    ctx: RenderContext<'_>,
    line_from: usize,
    line_to: usize,
    block: Vec<i16>,
    prev: Vec<i16>,
    mut window: OutputWindow<'_>,
) {
    let _slot = ReleaseGuard {
        counter: ctx.counter,
    };

    let lin = ctx.params.input_axis_len;
    let row_len = lin + 1;
    let mut out_ix = ctx.params.initial_out_index(line_from);
    let mut shader = ctx.kernel.begin_strip(ctx.params, line_from);

    for (r, line) in (line_from..=line_to).enumerate() {
        if ctx.stop.is_stopped() {
            break;
        }

        let prev_row: &[i16] = if r == 0 {
            &prev[..row_len]
        } else {
            &block[(r - 1) * row_len..r * row_len]
        };
        let cur_row = &block[r * row_len..(r + 1) * row_len];
        let meters = ctx.params.meters_per_element(line);

        let mut nw = prev_row[0];
        let mut sw = cur_row[0];
        for col in 1..=lin {
            let ne = prev_row[col];
            let se = cur_row[col];
            out_ix = shader.process_unit_element(nw, sw, se, ne, meters, out_ix, &mut window);
            nw = ne;
            sw = se;
        }
        out_ix = shader.advance_line(out_ix, line);
    }

    ctx.pools.blocks.recycle(block);
    ctx.pools.lines.recycle(prev);
}

/// Runs the memory-optimised trailing compute task, reading rows from
/// the stream over a single line buffer.
///
/// `line_buf` arrives holding the row above `line_from`. Each row is
/// read in place: the pre-overwrite value at an index is the sample one
/// row up, which is exactly the no-data fallback.
pub(crate) fn run_stream_task(
    ctx: RenderContext<'_>,
    line_from: usize,
    line_to: usize,
    stream: &mut dyn DemStream,
    mut line_buf: Vec<i16>,
    mut window: OutputWindow<'_>,
) {
    let _slot = ReleaseGuard {
        counter: ctx.counter,
    };

    let lin = ctx.params.input_axis_len;
    let mut out_ix = ctx.params.initial_out_index(line_from);
    let mut shader = ctx.kernel.begin_strip(ctx.params, line_from);

    'rows: for line in line_from..=line_to {
        if ctx.stop.is_stopped() {
            break;
        }

        let meters = ctx.params.meters_per_element(line);

        let first = match stream.next_sample() {
            Ok(Some(s)) if s != NO_DATA => s,
            Ok(_) => line_buf[0],
            Err(e) => {
                log::warn!("DEM read failed at row {}: {}", line, e);
                break 'rows;
            }
        };
        let mut nw = line_buf[0];
        let mut sw = first;
        line_buf[0] = first;

        for col in 1..=lin {
            let ne = line_buf[col];
            let se = match stream.next_sample() {
                Ok(Some(s)) if s != NO_DATA => s,
                Ok(_) => ne,
                Err(e) => {
                    log::warn!("DEM read failed at row {}: {}", line, e);
                    break 'rows;
                }
            };
            out_ix = shader.process_unit_element(nw, sw, se, ne, meters, out_ix, &mut window);
            line_buf[col] = se;
            nw = ne;
            sw = se;
        }
        out_ix = shader.advance_line(out_ix, line);
    }

    ctx.pools.lines.recycle(line_buf);
}
