//! Frame pipeline: RGB frame in, JPEG edge map out
//!
//! Each call runs the fixed stage sequence over the processor's pooled
//! buffers: load, grayscale, Canny, expand to RGB, encode.

use crate::buffer_pool::{BufferPool, PoolStats};
use crate::canny::CannyDetector;
use crate::color_conversion::{gray_to_rgb, rgb_to_gray};
use crate::encode::encode_jpeg;
use crate::error::{PipelineError, Result};
use crate::types::{FrameSize, PipelineConfig, PixelFormat};
use std::time::{Duration, Instant};

/// Lifecycle state of a processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Uninitialized,
    Ready,
}

/// Stateful edge-detection engine for one host session.
///
/// A processor owns its buffers exclusively. `process_frame` takes
/// `&mut self`; hosts sharing a processor across threads must wrap it in a
/// lock (the registry does this).
#[derive(Debug)]
pub struct Processor {
    state: ProcessorState,
    config: PipelineConfig,
    pool: BufferPool,
    detector: CannyDetector,
    frames_processed: u64,
    frames_failed: u64,
    last_frame_time: Duration,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// Create an uninitialized processor with the default thresholds
    /// (50/150) and JPEG quality 80
    pub fn new() -> Self {
        let config = PipelineConfig::default();
        log::info!("Processor created");
        Self {
            state: ProcessorState::Uninitialized,
            config,
            pool: BufferPool::new(),
            detector: CannyDetector::new(config.low_threshold, config.high_threshold),
            frames_processed: 0,
            frames_failed: 0,
            last_frame_time: Duration::ZERO,
        }
    }

    /// Create an uninitialized processor with custom constants
    pub fn with_config(config: PipelineConfig) -> Result<Self> {
        if config.low_threshold > config.high_threshold {
            return Err(PipelineError::InvalidConfig(format!(
                "low threshold {} exceeds high threshold {}",
                config.low_threshold, config.high_threshold
            )));
        }
        if !(1..=100).contains(&config.jpeg_quality) {
            return Err(PipelineError::InvalidConfig(format!(
                "jpeg quality {} outside 1..=100",
                config.jpeg_quality
            )));
        }

        let mut processor = Self::new();
        processor.config = config;
        processor.detector = CannyDetector::new(config.low_threshold, config.high_threshold);
        Ok(processor)
    }

    /// Transition to `Ready`. Calling it again is harmless.
    pub fn initialize(&mut self) -> bool {
        if self.state == ProcessorState::Ready {
            log::debug!("Processor already initialized");
        } else {
            log::info!("Initializing processor");
            self.state = ProcessorState::Ready;
        }
        true
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ProcessorState::Ready
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Run one frame through the pipeline.
    ///
    /// `pixels` is row-major packed RGB and must hold at least
    /// `width * height * 3` bytes; extra trailing bytes are ignored.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` before `initialize`
    /// - `InvalidFrame` for zero dimensions or a short buffer
    /// - `BufferAllocation` when the pool cannot be allocated
    /// - `Processing`/`Encode` when a stage fails
    ///
    /// The processor stays usable after any error.
    pub fn process_frame(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        if !self.is_ready() {
            return Err(PipelineError::NotInitialized);
        }

        let size = FrameSize::new(width, height);
        log::trace!("Processing frame: {}, size: {}", size, pixels.len());
        let start = Instant::now();

        let result = validate_frame(pixels.len(), size)
            .and_then(|required| self.run_stages(&pixels[..required], size));

        match result {
            Ok(jpeg) => {
                self.frames_processed += 1;
                self.last_frame_time = start.elapsed();
                log::trace!(
                    "Frame encoded to {} bytes in {:.2?}",
                    jpeg.len(),
                    self.last_frame_time
                );
                Ok(jpeg)
            }
            Err(err) => {
                self.frames_failed += 1;
                Err(err)
            }
        }
    }

    /// `process_frame` with the host-facing failure policy: errors are
    /// logged and reported as an empty result. An empty result always means
    /// "no output", never a valid image.
    pub fn process_frame_or_empty(&mut self, pixels: &[u8], width: u32, height: u32) -> Vec<u8> {
        match self.process_frame(pixels, width, height) {
            Ok(jpeg) => jpeg,
            Err(err) => {
                log::log!(err.log_level(), "Frame processing failed: {}", err);
                Vec::new()
            }
        }
    }

    fn run_stages(&mut self, pixels: &[u8], size: FrameSize) -> Result<Vec<u8>> {
        let buffers = self.pool.ensure(size)?;

        buffers.input.copy_from_slice(pixels);
        rgb_to_gray(&buffers.input, &mut buffers.grayscale)?;
        self.detector.detect(
            &buffers.grayscale,
            &mut buffers.edges,
            size.width as usize,
            size.height as usize,
        )?;
        gray_to_rgb(&buffers.edges, &mut buffers.output)?;

        encode_jpeg(&buffers.output, size.width, size.height, self.config.jpeg_quality)
    }

    /// Get processing statistics
    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            frames_processed: self.frames_processed,
            frames_failed: self.frames_failed,
            last_frame_time: self.last_frame_time,
            pool: self.pool.stats(),
        }
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        log::info!(
            "Processor destroyed after {} frames ({} failed)",
            self.frames_processed,
            self.frames_failed
        );
    }
}

/// Check dimensions against the supplied byte count and return the number
/// of bytes the frame occupies
fn validate_frame(len: usize, size: FrameSize) -> Result<usize> {
    if size.is_empty() {
        return Err(PipelineError::invalid_frame(
            size.width,
            size.height,
            "width and height must be non-zero",
        ));
    }

    let required = PixelFormat::Rgb24
        .calculate_size(size.width, size.height)
        .ok_or_else(|| {
            PipelineError::invalid_frame(size.width, size.height, "frame size overflows usize")
        })?;

    if len < required {
        return Err(PipelineError::invalid_frame(
            size.width,
            size.height,
            format!("need {required} bytes, got {len}"),
        ));
    }

    Ok(required)
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessorStats {
    pub frames_processed: u64,
    /// Frames that were rejected or failed in a stage. Calls made before
    /// `initialize` are not counted.
    pub frames_failed: u64,
    /// Wall time of the last successful frame
    pub last_frame_time: Duration,
    pub pool: PoolStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canny::EDGE;
    use crate::error::ErrorKind;
    use image::{ImageFormat, RgbImage};

    fn ready_processor() -> Processor {
        let mut processor = Processor::new();
        assert!(processor.initialize());
        processor
    }

    fn uniform_frame(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        rgb.iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect()
    }

    /// Left half `left`, right half `right`
    fn split_frame(width: u32, height: u32, left: [u8; 3], right: [u8; 3]) -> Vec<u8> {
        let mut frame = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..height {
            for x in 0..width {
                frame.extend_from_slice(if x < width / 2 { &left } else { &right });
            }
        }
        frame
    }

    fn decode(jpeg: &[u8]) -> RgbImage {
        image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
            .unwrap()
            .to_rgb8()
    }

    #[test]
    fn test_rejects_before_initialize() {
        let mut processor = Processor::new();
        let frame = uniform_frame(4, 4, [10, 20, 30]);

        assert_eq!(processor.state(), ProcessorState::Uninitialized);
        assert!(matches!(
            processor.process_frame(&frame, 4, 4),
            Err(PipelineError::NotInitialized)
        ));
        assert!(processor.process_frame_or_empty(&frame, 4, 4).is_empty());
        assert!(!processor.pool().is_allocated());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut processor = Processor::new();
        assert!(processor.initialize());
        assert!(processor.initialize());
        assert_eq!(processor.state(), ProcessorState::Ready);
    }

    #[test]
    fn test_output_matches_input_dimensions() {
        let mut processor = ready_processor();
        let frame = split_frame(40, 30, [0, 0, 0], [255, 255, 255]);

        let jpeg = processor.process_frame(&frame, 40, 30).unwrap();

        let decoded = decode(&jpeg);
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_uniform_frame_has_no_edges() {
        let mut processor = ready_processor();
        let frame = uniform_frame(4, 4, [90, 160, 40]);

        let jpeg = processor.process_frame(&frame, 4, 4).unwrap();

        let edges = &processor.pool().buffers().unwrap().edges;
        assert!(edges.iter().all(|&v| v == 0));
        // lossy, but black stays (near) black
        assert!(decode(&jpeg).iter().all(|&v| v <= 8));
    }

    #[test]
    fn test_vertical_boundary_detected() {
        let mut processor = ready_processor();
        let frame = split_frame(4, 4, [0, 0, 0], [255, 255, 255]);

        let jpeg = processor.process_frame(&frame, 4, 4).unwrap();

        let buffers = processor.pool().buffers().unwrap();
        for y in 0..4 {
            assert_eq!(buffers.edges.get_pixel(1, y).0, [EDGE], "row {y}");
            assert_eq!(buffers.edges.get_pixel(3, y).0, [0], "row {y}");
            assert_eq!(buffers.output.get_pixel(1, y).0, [EDGE; 3]);
        }

        let decoded = decode(&jpeg);
        let boundary: u32 = (0..4).map(|y| decoded.get_pixel(1, y).0[0] as u32).sum();
        let far: u32 = (0..4).map(|y| decoded.get_pixel(3, y).0[0] as u32).sum();
        assert!(boundary > far, "boundary {boundary} vs far {far}");
    }

    #[test]
    fn test_deterministic_output() {
        let mut processor = ready_processor();
        let frame = split_frame(64, 48, [200, 30, 30], [10, 10, 90]);

        let first = processor.process_frame(&frame, 64, 48).unwrap();
        let second = processor.process_frame(&frame, 64, 48).unwrap();

        assert_eq!(first, second);

        let mut other = ready_processor();
        assert_eq!(other.process_frame(&frame, 64, 48).unwrap(), first);
    }

    #[test]
    fn test_buffers_reused_and_overwritten() {
        let mut processor = ready_processor();
        let edges_frame = split_frame(16, 16, [0, 0, 0], [255, 255, 255]);
        let flat_frame = uniform_frame(16, 16, [128, 128, 128]);

        processor.process_frame(&edges_frame, 16, 16).unwrap();
        let input_ptr = processor.pool().buffers().unwrap().input.as_ptr();
        assert!(processor
            .pool()
            .buffers()
            .unwrap()
            .edges
            .iter()
            .any(|&v| v == EDGE));

        processor.process_frame(&flat_frame, 16, 16).unwrap();
        let buffers = processor.pool().buffers().unwrap();

        assert_eq!(buffers.input.as_ptr(), input_ptr);
        assert_eq!(processor.stats().pool.allocations, 1);
        assert_eq!(buffers.input.as_raw(), &flat_frame);
        assert!(buffers.edges.iter().all(|&v| v == 0), "stale edges leaked");
        assert!(buffers.output.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_dimension_change_reallocates() {
        let mut processor = ready_processor();

        processor
            .process_frame(&uniform_frame(8, 8, [1, 2, 3]), 8, 8)
            .unwrap();
        let jpeg = processor
            .process_frame(&split_frame(20, 10, [0, 0, 0], [250, 250, 250]), 20, 10)
            .unwrap();

        assert_eq!(processor.pool().size(), Some(FrameSize::new(20, 10)));
        assert_eq!(processor.stats().pool.allocations, 2);
        assert_eq!(decode(&jpeg).dimensions(), (20, 10));
    }

    #[test]
    fn test_undersized_buffer_rejected() {
        let mut processor = ready_processor();
        let frame = vec![0u8; 4 * 4 * 3 - 1];

        let err = processor.process_frame(&frame, 4, 4).unwrap_err();

        assert!(matches!(err, PipelineError::InvalidFrame { .. }));
        assert!(!processor.pool().is_allocated());
        assert!(processor.process_frame_or_empty(&frame, 4, 4).is_empty());
    }

    #[test]
    fn test_oversized_buffer_uses_prefix() {
        let mut processor = ready_processor();
        let mut frame = uniform_frame(4, 4, [50, 50, 50]);
        frame.extend_from_slice(&[255; 30]);

        processor.process_frame(&frame, 4, 4).unwrap();

        let input = &processor.pool().buffers().unwrap().input;
        assert!(input.iter().all(|&v| v == 50));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let mut processor = ready_processor();
        assert!(matches!(
            processor.process_frame(&[], 0, 4),
            Err(PipelineError::InvalidFrame { .. })
        ));
        assert!(matches!(
            processor.process_frame(&[0; 12], 4, 0),
            Err(PipelineError::InvalidFrame { .. })
        ));
    }

    #[test]
    fn test_recovers_after_failure() {
        let mut processor = ready_processor();
        let good = uniform_frame(8, 8, [7, 7, 7]);

        assert!(processor.process_frame(&good[..10], 8, 8).is_err());
        assert!(processor.process_frame(&good, 8, 8).is_ok());

        let stats = processor.stats();
        assert_eq!(stats.frames_processed, 1);
        assert_eq!(stats.frames_failed, 1);
    }

    #[test]
    fn test_every_rejection_counts_as_failed() {
        let mut processor = Processor::new();
        assert!(processor.process_frame(&[0; 12], 2, 2).is_err());
        assert_eq!(processor.stats().frames_failed, 0);

        processor.initialize();
        assert!(processor.process_frame(&[0; 12], 0, 2).is_err());
        assert!(processor.process_frame(&[0; 11], 2, 2).is_err());
        assert!(processor.process_frame(&[0; 12], 2, 2).is_ok());

        let stats = processor.stats();
        assert_eq!(stats.frames_failed, 2);
        assert_eq!(stats.frames_processed, 1);
    }

    #[test]
    fn test_usable_after_allocation_failure() {
        let mut processor = ready_processor();
        let frame = uniform_frame(4, 4, [40, 40, 40]);
        processor.process_frame(&frame, 4, 4).unwrap();

        // fits in usize but exceeds isize::MAX, so the reservation must fail
        let err = processor
            .pool
            .ensure(FrameSize::new(u32::MAX, 1 << 30))
            .unwrap_err();
        assert!(matches!(err, PipelineError::BufferAllocation { buffer: "input", .. }));
        assert_eq!(err.kind(), ErrorKind::BufferAllocation);
        assert!(!processor.pool().is_allocated());

        let jpeg = processor.process_frame(&frame, 4, 4).unwrap();
        assert_eq!(decode(&jpeg).dimensions(), (4, 4));
        assert_eq!(processor.pool().size(), Some(FrameSize::new(4, 4)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let inverted = PipelineConfig {
            low_threshold: 200,
            high_threshold: 100,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Processor::with_config(inverted),
            Err(PipelineError::InvalidConfig(_))
        ));

        let no_quality = PipelineConfig {
            jpeg_quality: 0,
            ..PipelineConfig::default()
        };
        assert!(Processor::with_config(no_quality).is_err());
    }

    #[test]
    fn test_custom_thresholds_suppress_edges() {
        // thresholds above any possible L1 Sobel response
        let config = PipelineConfig {
            low_threshold: 5000,
            high_threshold: 6000,
            ..PipelineConfig::default()
        };
        let mut processor = Processor::with_config(config).unwrap();
        processor.initialize();

        processor
            .process_frame(&split_frame(8, 8, [0, 0, 0], [255, 255, 255]), 8, 8)
            .unwrap();

        let edges = &processor.pool().buffers().unwrap().edges;
        assert!(edges.iter().all(|&v| v == 0));
    }
}
