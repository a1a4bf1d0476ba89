//! Color-space conversion between packed RGB and single-channel intensity
//!
//! Fixed-point BT.601 luma weights (0.299, 0.587, 0.114) in Q14, so results
//! are exact and identical on every platform.

use crate::error::{PipelineError, Result};

const LUMA_SHIFT: u32 = 14;
const LUMA_R: u32 = 4899; // 0.299 * 2^14
const LUMA_G: u32 = 9617; // 0.587 * 2^14
const LUMA_B: u32 = 1868; // 0.114 * 2^14
const LUMA_ROUND: u32 = 1 << (LUMA_SHIFT - 1);

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B + LUMA_ROUND) >> LUMA_SHIFT) as u8
}

fn as_rgb_pixels(bytes: &[u8]) -> Result<&[[u8; 3]]> {
    bytemuck::try_cast_slice(bytes)
        .map_err(|e| PipelineError::Processing(format!("rgb buffer is not pixel aligned: {e}")))
}

fn as_rgb_pixels_mut(bytes: &mut [u8]) -> Result<&mut [[u8; 3]]> {
    bytemuck::try_cast_slice_mut(bytes)
        .map_err(|e| PipelineError::Processing(format!("rgb buffer is not pixel aligned: {e}")))
}

fn check_pixel_counts(rgb: usize, gray: usize) -> Result<()> {
    if rgb != gray {
        return Err(PipelineError::Processing(format!(
            "pixel count mismatch: {rgb} rgb pixels vs {gray} gray pixels"
        )));
    }
    Ok(())
}

/// Convert packed RGB24 to 8-bit luminance
///
/// `input` holds `n * 3` bytes, `output` holds `n` bytes.
pub fn rgb_to_gray(input: &[u8], output: &mut [u8]) -> Result<()> {
    let pixels = as_rgb_pixels(input)?;
    check_pixel_counts(pixels.len(), output.len())?;

    for (dst, &[r, g, b]) in output.iter_mut().zip(pixels) {
        *dst = luma(r, g, b);
    }

    Ok(())
}

/// Broadcast 8-bit intensity into all three channels of packed RGB24
pub fn gray_to_rgb(input: &[u8], output: &mut [u8]) -> Result<()> {
    let pixels = as_rgb_pixels_mut(output)?;
    check_pixel_counts(pixels.len(), input.len())?;

    for (dst, &v) in pixels.iter_mut().zip(input) {
        *dst = [v, v, v];
    }

    Ok(())
}
