//! JPEG encoding of packed RGB24 frames

use crate::error::{PipelineError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// Encodes an RGB24 image to JPEG.
///
/// # Arguments
///
/// * `pixels` - Packed RGB pixel data, `width * height * 3` bytes
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `quality` - JPEG quality, 1 to 100
///
/// # Errors
///
/// Returns an error if the pixel data does not match the dimensions or the
/// encoder rejects the image (for example dimensions above 65535).
pub fn encode_jpeg(pixels: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3));
    if expected != Some(pixels.len()) {
        return Err(PipelineError::Processing(format!(
            "jpeg input has {} bytes, {}x{} rgb needs {:?}",
            pixels.len(),
            width,
            height,
            expected
        )));
    }

    // compressed edge maps are small; a tenth of the raw size avoids most regrowth
    let mut out = Vec::with_capacity(pixels.len() / 10 + 1024);
    JpegEncoder::new_with_quality(&mut out, quality).write_image(
        pixels,
        width,
        height,
        ExtendedColorType::Rgb8,
    )?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    #[test]
    fn test_encode_decodes_to_same_size() {
        let pixels = vec![128u8; 24 * 16 * 3];
        let jpeg = encode_jpeg(&pixels, 24, 16, 80).unwrap();

        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "missing SOI marker");
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (24, 16));
    }

    #[test]
    fn test_quality_affects_size() {
        let pixels: Vec<u8> = (0..64 * 64 * 3).map(|i| (i * 37 % 251) as u8).collect();
        let low = encode_jpeg(&pixels, 64, 64, 10).unwrap();
        let high = encode_jpeg(&pixels, 64, 64, 100).unwrap();

        assert!(low.len() < high.len());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = encode_jpeg(&[0u8; 10], 2, 2, 80);
        assert!(matches!(result, Err(PipelineError::Processing(_))));
    }
}
