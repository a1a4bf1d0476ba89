//! Canny edge detector on 8-bit intensity images
//!
//! Stages:
//! 1. 5x5 binomial Gaussian smoothing (separable `[1 4 6 4 1] / 16`)
//! 2. 3x3 Sobel gradients, L1 magnitude `|gx| + |gy|`
//! 3. Non-maximum suppression along the gradient direction quantized to
//!    0/45/90/135 degrees
//! 4. Hysteresis: pixels above `high` seed edges, pixels above `low` are kept
//!    only when 8-connected to a seed
//!
//! Borders are replicated for smoothing and gradients. All arithmetic is
//! integer, so output is bit-exact across runs and targets. Output pixels are
//! either 0 or [`EDGE`].

use crate::error::{PipelineError, Result};

/// Value written for edge pixels
pub const EDGE: u8 = 255;

const BINOMIAL_5: [u32; 5] = [1, 4, 6, 4, 1];

// tan(22.5 deg) in Q15
const TAN_22_5_Q15: i64 = 13573;

const NOT_EDGE: u8 = 0;
const WEAK: u8 = 1;
const STRONG: u8 = 2;

/// Reusable Canny detector. Scratch planes are kept between calls and only
/// grow when a larger frame arrives.
#[derive(Debug, Default)]
pub struct CannyDetector {
    low: i32,
    high: i32,
    smooth_rows: Vec<u32>,
    smoothed: Vec<u8>,
    gx: Vec<i32>,
    gy: Vec<i32>,
    magnitude: Vec<i32>,
    class: Vec<u8>,
    stack: Vec<usize>,
}

impl CannyDetector {
    pub fn new(low_threshold: u32, high_threshold: u32) -> Self {
        Self {
            low: low_threshold.min(i32::MAX as u32) as i32,
            high: high_threshold.min(i32::MAX as u32) as i32,
            ..Self::default()
        }
    }

    pub fn thresholds(&self) -> (u32, u32) {
        (self.low as u32, self.high as u32)
    }

    /// Detect edges in `gray` (`width * height` bytes) into `edges`.
    ///
    /// Every byte of `edges` is overwritten.
    pub fn detect(
        &mut self,
        gray: &[u8],
        edges: &mut [u8],
        width: usize,
        height: usize,
    ) -> Result<()> {
        let len = width
            .checked_mul(height)
            .ok_or_else(|| PipelineError::Processing("edge map size overflows".into()))?;
        if gray.len() != len || edges.len() != len {
            return Err(PipelineError::Processing(format!(
                "edge detector expects {len} pixels, got {} in and {} out",
                gray.len(),
                edges.len()
            )));
        }

        edges.fill(0);
        if len == 0 {
            return Ok(());
        }

        prepare(&mut self.smooth_rows, len, "canny smoothing")?;
        prepare(&mut self.smoothed, len, "canny smoothed")?;
        prepare(&mut self.gx, len, "canny gx")?;
        prepare(&mut self.gy, len, "canny gy")?;
        prepare(&mut self.magnitude, len, "canny magnitude")?;
        prepare(&mut self.class, len, "canny class")?;
        self.stack.clear();

        gaussian_blur(gray, &mut self.smooth_rows, &mut self.smoothed, width, height);
        sobel(
            &self.smoothed,
            &mut self.gx,
            &mut self.gy,
            &mut self.magnitude,
            width,
            height,
        );
        non_maximum_suppression(
            &self.gx,
            &self.gy,
            &self.magnitude,
            &mut self.class,
            width,
            height,
            self.low,
            self.high,
        );
        hysteresis(&mut self.class, &mut self.stack, edges, width, height);

        Ok(())
    }
}

/// Resize a scratch plane to `len` elements, reporting allocation failure
fn prepare<T: Copy + Default>(buf: &mut Vec<T>, len: usize, name: &'static str) -> Result<()> {
    buf.clear();
    buf.try_reserve_exact(len)
        .map_err(|source| PipelineError::BufferAllocation {
            buffer: name,
            bytes: len * std::mem::size_of::<T>(),
            source,
        })?;
    buf.resize(len, T::default());
    Ok(())
}

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// Separable 5x5 binomial blur with replicated borders.
///
/// The horizontal pass keeps sums scaled by 16, the vertical pass by 256;
/// the final value is rounded back to 8 bits.
fn gaussian_blur(src: &[u8], rows: &mut [u32], dst: &mut [u8], width: usize, height: usize) {
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        let out = &mut rows[y * width..(y + 1) * width];
        for (x, acc) in out.iter_mut().enumerate() {
            *acc = BINOMIAL_5
                .iter()
                .enumerate()
                .map(|(k, w)| w * row[clamp_index(x as isize + k as isize - 2, width)] as u32)
                .sum();
        }
    }

    for y in 0..height {
        for x in 0..width {
            let sum: u32 = BINOMIAL_5
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let row = clamp_index(y as isize + k as isize - 2, height);
                    w * rows[row * width + x]
                })
                .sum();
            dst[y * width + x] = ((sum + 128) >> 8) as u8;
        }
    }
}

/// 3x3 Sobel with replicated borders
fn sobel(
    src: &[u8],
    gx: &mut [i32],
    gy: &mut [i32],
    magnitude: &mut [i32],
    width: usize,
    height: usize,
) {
    let at = |x: usize, y: usize| src[y * width + x] as i32;

    for y in 0..height {
        let ym = y.saturating_sub(1);
        let yp = (y + 1).min(height - 1);
        for x in 0..width {
            let xm = x.saturating_sub(1);
            let xp = (x + 1).min(width - 1);

            let dx = (at(xp, ym) + 2 * at(xp, y) + at(xp, yp))
                - (at(xm, ym) + 2 * at(xm, y) + at(xm, yp));
            let dy = (at(xm, yp) + 2 * at(x, yp) + at(xp, yp))
                - (at(xm, ym) + 2 * at(x, ym) + at(xp, ym));

            let idx = y * width + x;
            gx[idx] = dx;
            gy[idx] = dy;
            magnitude[idx] = dx.abs() + dy.abs();
        }
    }
}

/// Thin gradient ridges to single-pixel width and classify survivors.
///
/// Neighbors outside the image count as zero magnitude. Ties along the
/// gradient keep the first pixel of a plateau (strict `>` on the negative
/// side, `>=` on the positive side) so a two-pixel-wide ridge yields one
/// edge line.
#[allow(clippy::too_many_arguments)]
fn non_maximum_suppression(
    gx: &[i32],
    gy: &[i32],
    magnitude: &[i32],
    class: &mut [u8],
    width: usize,
    height: usize,
    low: i32,
    high: i32,
) {
    let mag = |x: isize, y: isize| -> i32 {
        if x < 0 || y < 0 || x >= width as isize || y >= height as isize {
            0
        } else {
            magnitude[y as usize * width + x as usize]
        }
    };

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let m = magnitude[idx];
            class[idx] = NOT_EDGE;
            if m <= low {
                continue;
            }

            let (dx, dy) = (gx[idx], gy[idx]);
            let ax = dx.unsigned_abs() as i64;
            let ay = (dy.unsigned_abs() as i64) << 15;
            let tan22 = ax * TAN_22_5_Q15;
            let (xi, yi) = (x as isize, y as isize);

            let is_max = if ay < tan22 {
                // mostly horizontal gradient: compare left/right
                m > mag(xi - 1, yi) && m >= mag(xi + 1, yi)
            } else if ay > tan22 + (ax << 16) {
                // mostly vertical gradient: compare up/down
                m > mag(xi, yi - 1) && m >= mag(xi, yi + 1)
            } else {
                let s = if (dx ^ dy) < 0 { -1 } else { 1 };
                m > mag(xi - s, yi - 1) && m > mag(xi + s, yi + 1)
            };

            if is_max {
                class[idx] = if m > high { STRONG } else { WEAK };
            }
        }
    }
}

/// Trace strong pixels through 8-connected weak pixels
fn hysteresis(
    class: &mut [u8],
    stack: &mut Vec<usize>,
    edges: &mut [u8],
    width: usize,
    height: usize,
) {
    stack.extend(
        class
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == STRONG)
            .map(|(i, _)| i),
    );
    for &idx in stack.iter() {
        edges[idx] = EDGE;
    }

    while let Some(idx) = stack.pop() {
        let (x, y) = ((idx % width) as isize, (idx / width) as isize);
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                    continue;
                }
                let n = ny as usize * width + nx as usize;
                if class[n] == WEAK {
                    class[n] = STRONG;
                    edges[n] = EDGE;
                    stack.push(n);
                }
            }
        }
    }
}
