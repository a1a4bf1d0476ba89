//! Pipeline error types

use std::collections::TryReserveError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure of a single `process_frame` call. None of these leave the
/// processor unusable; the next call starts from a clean state.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("processor is not initialized")]
    NotInitialized,

    #[error("invalid {width}x{height} frame: {reason}")]
    InvalidFrame {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("failed to allocate {bytes} bytes for the {buffer} buffer")]
    BufferAllocation {
        buffer: &'static str,
        bytes: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("invalid pipeline config: {0}")]
    InvalidConfig(String),

    #[error("processing failed: {0}")]
    Processing(String),

    #[error("jpeg encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl PipelineError {
    pub(crate) fn invalid_frame(width: u32, height: u32, reason: impl Into<String>) -> Self {
        PipelineError::InvalidFrame {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Stable classification used at the C boundary
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::NotInitialized => ErrorKind::NotInitialized,
            PipelineError::InvalidFrame { .. } => ErrorKind::InvalidFrame,
            PipelineError::BufferAllocation { .. } => ErrorKind::BufferAllocation,
            PipelineError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            PipelineError::Processing(_) | PipelineError::Encode(_) => ErrorKind::Processing,
        }
    }

    /// Level at which a failed call is reported. Rejected input is a
    /// warning; everything else is an error.
    pub fn log_level(&self) -> log::Level {
        match self {
            PipelineError::InvalidFrame { .. } => log::Level::Warn,
            _ => log::Level::Error,
        }
    }
}

/// Lookup failure in the processor registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown or destroyed processor handle {0}")]
    UnknownHandle(u64),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::UnknownHandle(_) => ErrorKind::InvalidHandle,
        }
    }
}

/// Error classification with fixed numeric values
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotInitialized = 1,
    InvalidFrame = 2,
    BufferAllocation = 3,
    Processing = 4,
    InvalidHandle = 5,
    InvalidConfig = 6,
}
