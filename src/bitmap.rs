//! Greyscale shade bitmaps and neighbor border merging

use std::sync::Mutex;

use crate::error::{Error, Result};

/// Edge of a tile bitmap, named for the compass direction of the
/// neighboring tile the padding stripe is filled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Border {
    North,
    South,
    East,
    West,
}

/// A rendered greyscale shade tile.
///
/// `width == height == axis_len + 2 * padding`; the padding ring is
/// filled from neighbor tiles via [`ShadeBitmap::merge_border`] to hide
/// interpolation seams. The internal mutex serialises pixel mutation, so
/// only one merge writes into a given sink at a time.
pub struct ShadeBitmap {
    axis_len: usize,
    padding: usize,
    pixels: Mutex<Vec<u8>>,
}

impl ShadeBitmap {
    /// Wraps a raw byte grid of `(axis_len + 2 * padding)^2` shade values
    pub fn new(axis_len: usize, padding: usize, pixels: Vec<u8>) -> Result<Self> {
        let side = axis_len + 2 * padding;
        if pixels.len() != side * side {
            return Err(Error::InvalidDem(format!(
                "bitmap byte grid of {} bytes does not match side {}",
                pixels.len(),
                side
            )));
        }

        Ok(Self {
            axis_len,
            padding,
            pixels: Mutex::new(pixels),
        })
    }

    /// Side length of the unpadded shade grid
    pub fn axis_len(&self) -> usize {
        self.axis_len
    }

    /// Padding ring width in pixels
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Total bitmap width (equals height)
    pub fn width(&self) -> usize {
        self.axis_len + 2 * self.padding
    }

    /// Total bitmap height (equals width)
    pub fn height(&self) -> usize {
        self.width()
    }

    /// In-memory footprint of the pixel grid in bytes
    pub fn size_bytes(&self) -> u64 {
        (self.width() * self.height()) as u64
    }

    /// Returns a copy of the pixel grid, row-major
    pub fn pixels(&self) -> Vec<u8> {
        self.pixels.lock().unwrap().clone()
    }

    /// Reads one pixel
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels.lock().unwrap()[y * self.width() + x]
    }

    /// Copies the matching edge stripe of a same-sized neighbor into this
    /// bitmap's padding ring.
    ///
    /// The neighbor's stripe is copied out under its own lock before the
    /// sink lock is taken, so two tiles merging into each other cannot
    /// deadlock.
    pub fn merge_border(&self, border: Border, neighbor: &ShadeBitmap) -> Result<()> {
        let w = self.width();
        let h = self.height();
        let p = self.padding;

        if neighbor.width() != w || neighbor.height() != h {
            return Err(Error::InvalidDem(format!(
                "neighbor bitmap {}x{} does not match sink {}x{}",
                neighbor.width(),
                neighbor.height(),
                w,
                h
            )));
        }
        if p == 0 {
            return Ok(());
        }

        // Clip rect on the sink and the sink-minus-source offset, per edge.
        let (clip_x, clip_y, clip_w, clip_h, off_x, off_y) = match border {
            Border::West => (0, p, p, h - 2 * p, -(w as isize) + 2 * p as isize, 0),
            Border::East => (w - p, p, p, h - 2 * p, w as isize - 2 * p as isize, 0),
            Border::North => (p, 0, w - 2 * p, p, 0, -(h as isize) + 2 * p as isize),
            Border::South => (p, h - p, w - 2 * p, p, 0, h as isize - 2 * p as isize),
        };

        let stripe = {
            let src = neighbor.pixels.lock().unwrap();
            let mut stripe = Vec::with_capacity(clip_w * clip_h);
            for y in clip_y..clip_y + clip_h {
                let sy = (y as isize - off_y) as usize;
                let sx = (clip_x as isize - off_x) as usize;
                stripe.extend_from_slice(&src[sy * w + sx..sy * w + sx + clip_w]);
            }
            stripe
        };

        let mut dst = self.pixels.lock().unwrap();
        for (row, y) in (clip_y..clip_y + clip_h).enumerate() {
            let d = y * w + clip_x;
            dst[d..d + clip_w].copy_from_slice(&stripe[row * clip_w..(row + 1) * clip_w]);
        }

        Ok(())
    }
}

impl std::fmt::Debug for ShadeBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadeBitmap")
            .field("axis_len", &self.axis_len)
            .field("padding", &self.padding)
            .finish()
    }
}
