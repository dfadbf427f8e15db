//! Reader tasks: stream DEM rows into compute tasks

use std::io;

use crossbeam::sync::WaitGroup;

use crate::dem::{DemStream, NO_DATA};
use crate::pipeline::{compute, OutputWindow, RenderContext, SpawnCtx};

/// Runs reader `reader_ix` over its contiguous range of compute tasks.
///
/// The reader opens its own stream, seeks to the row before its first
/// task's element rows, then reads one block per task, handing each
/// block's last row forward as the next task's previous-row buffer. All
/// but the last task are posted via `spawn`; the last reads the stream
/// directly and runs inline here. A failed read abandons the reader's
/// remaining tasks; the rest of the pipeline is unaffected.
pub(crate) fn run_reader<'scope>(
    ctx: &RenderContext<'scope>,
    reader_ix: usize,
    windows: Vec<OutputWindow<'scope>>,
    spawn: &SpawnCtx<'_, 'scope>,
) {
    let params = ctx.params;
    let plan = ctx.plan;
    let lin = params.input_axis_len;
    let row_len = lin + 1;

    let (task_lo, task_hi) = plan.reader_span(reader_ix);
    if task_lo >= task_hi {
        return;
    }

    let mut stream = match ctx.file.open_stream() {
        Ok(stream) => stream,
        Err(e) => {
            log::warn!("reader {}: DEM stream not available: {}", reader_ix, e);
            return;
        }
    };

    // Position on the row before the first task's element rows.
    let (first_line, _) = plan.line_span(task_lo);
    let skip_rows = (first_line - 1) as u64;
    if skip_rows > 0 {
        if let Err(e) = stream.skip_bytes(2 * row_len as u64 * skip_rows) {
            log::warn!("reader {}: DEM seek failed: {}", reader_ix, e);
            return;
        }
    }

    let wg = WaitGroup::new();
    let mut windows = windows.into_iter();
    let mut line_buf: Option<Vec<i16>> = None;

    for k in task_lo..task_hi {
        if ctx.stop.is_stopped() {
            break;
        }

        ctx.counter.pace();

        let Some(window) = windows.next() else {
            ctx.counter.release();
            break;
        };

        // Previous-row buffer: read for the first task, handed forward
        // by the one before otherwise.
        let prev = match line_buf.take() {
            Some(buf) => buf,
            None => {
                let mut buf = ctx.pools.lines.get(row_len);
                if let Err(e) = read_row(stream.as_mut(), &mut buf) {
                    log::warn!("reader {}: DEM read failed: {}", reader_ix, e);
                    ctx.pools.lines.recycle(buf);
                    ctx.counter.release();
                    break;
                }
                buf
            }
        };

        let (line_from, line_to) = plan.line_span(k);

        if k + 1 < task_hi {
            let rows = line_to - line_from + 1;
            let mut block = ctx.pools.blocks.get(row_len * rows);
            if let Err(e) = read_block(stream.as_mut(), &mut block, &prev, row_len) {
                log::warn!("reader {}: DEM read failed: {}", reader_ix, e);
                ctx.pools.blocks.recycle(block);
                ctx.pools.lines.recycle(prev);
                ctx.counter.release();
                break;
            }

            // Peel the block's last row off as the next task's
            // previous-row buffer.
            let mut next_line = ctx.pools.lines.get(row_len);
            next_line.copy_from_slice(&block[(rows - 1) * row_len..]);
            line_buf = Some(next_line);

            let task_ctx = *ctx;
            let task_wg = wg.clone();
            spawn.spawn(move || {
                compute::run_block_task(task_ctx, line_from, line_to, block, prev, window);
                drop(task_wg);
            });
        } else {
            // Trailing task: no block array, the stream itself feeds a
            // single line buffer. Runs inline on this reader thread.
            compute::run_stream_task(*ctx, line_from, line_to, stream.as_mut(), prev, window);
        }
    }

    if let Some(buf) = line_buf.take() {
        ctx.pools.lines.recycle(buf);
    }

    // Await this reader's posted compute tasks; the stream closes on
    // drop afterwards.
    wg.wait();
}

/// Reads one row of samples, substituting no-data and EOF with the
/// previous column (0 for a missing first sample)
fn read_row(stream: &mut dyn DemStream, buf: &mut [i16]) -> io::Result<()> {
    for i in 0..buf.len() {
        buf[i] = match stream.next_sample()? {
            Some(s) if s != NO_DATA => s,
            _ => {
                if i > 0 {
                    buf[i - 1]
                } else {
                    0
                }
            }
        };
    }
    Ok(())
}

/// Reads a block of full rows, substituting no-data and EOF with the
/// sample one row up (`prev_row` covers the block's first row)
fn read_block(
    stream: &mut dyn DemStream,
    block: &mut [i16],
    prev_row: &[i16],
    row_len: usize,
) -> io::Result<()> {
    for i in 0..block.len() {
        block[i] = match stream.next_sample()? {
            Some(s) if s != NO_DATA => s,
            _ => {
                if i >= row_len {
                    block[i - row_len]
                } else {
                    prev_row[i]
                }
            }
        };
    }
    Ok(())
}
