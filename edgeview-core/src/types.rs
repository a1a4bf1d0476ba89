//! Frame data types and pipeline constants

use std::fmt;

/// Default low hysteresis threshold (0-255 intensity scale)
pub const DEFAULT_LOW_THRESHOLD: u32 = 50;
/// Default high hysteresis threshold (0-255 intensity scale)
pub const DEFAULT_HIGH_THRESHOLD: u32 = 150;
/// Default JPEG quality (0-100)
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Pixel format of a pool buffer
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24 = 1, // Packed RGB, 3 bytes per pixel
    Gray8 = 2, // Single intensity channel
}

impl PixelFormat {
    /// Returns bytes per pixel
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Calculate frame size in bytes, `None` on overflow
    pub fn calculate_size(self, width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(self.channels())
    }
}

/// Role of a buffer inside the pool. The format of each role never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Input,
    Grayscale,
    EdgeMap,
    Output,
}

impl BufferRole {
    pub fn format(self) -> PixelFormat {
        match self {
            BufferRole::Input | BufferRole::Output => PixelFormat::Rgb24,
            BufferRole::Grayscale | BufferRole::EdgeMap => PixelFormat::Gray8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BufferRole::Input => "input",
            BufferRole::Grayscale => "grayscale",
            BufferRole::EdgeMap => "edge-map",
            BufferRole::Output => "output",
        }
    }
}

impl fmt::Display for BufferRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Tunable constants of the fixed pipeline.
///
/// The stage sequence itself is not configurable; only the detector
/// thresholds and the encoder quality are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub low_threshold: u32,
    pub high_threshold: u32,
    pub jpeg_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            low_threshold: DEFAULT_LOW_THRESHOLD,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}
