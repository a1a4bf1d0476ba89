//! Edgeview Core - per-frame edge detection pipeline
//!
//! Turns raw RGB camera frames into JPEG-compressed Canny edge maps.
//!
//! Key properties:
//! - Four pooled buffers per processor, allocated lazily and reused while
//!   the frame size stays the same
//! - Integer-only grayscale and Canny stages, so output is deterministic
//! - Every failure is contained in the call that caused it
//!
//! ```no_run
//! use edgeview_core::Processor;
//!
//! # fn main() -> Result<(), edgeview_core::PipelineError> {
//! let mut processor = Processor::new();
//! processor.initialize();
//!
//! let frame = vec![0u8; 640 * 480 * 3];
//! let jpeg = processor.process_frame(&frame, 640, 480)?;
//! println!("encoded {} bytes", jpeg.len());
//! # Ok(())
//! # }
//! ```

pub mod buffer_pool;
pub mod canny;
pub mod color_conversion;
pub mod encode;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod types;

pub use buffer_pool::*;
pub use canny::CannyDetector;
pub use color_conversion::*;
pub use encode::*;
pub use error::*;
pub use pipeline::*;
pub use registry::*;
pub use types::*;
