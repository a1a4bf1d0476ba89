//! Edgeview FFI - C Foreign Function Interface
//!
//! Provides a C-compatible API so a host application (JNI glue, C++ camera
//! code) can drive processors by integer handle.
//!
//! Handles are `u64` values from the process-wide registry. Using a handle
//! after `edgeview_processor_destroy` returns `EdgeviewStatus::InvalidHandle`
//! rather than touching freed memory. No panic crosses this boundary.

use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Once;

use edgeview_core::{ErrorKind, ProcessorRegistry};
use libc::size_t;

/// Status code returned by every fallible call
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeviewStatus {
    Ok = 0,
    NotInitialized = 1,
    InvalidFrame = 2,
    BufferAllocation = 3,
    Processing = 4,
    InvalidHandle = 5,
    InvalidConfig = 6,
    InvalidArgument = 7,
}

impl From<ErrorKind> for EdgeviewStatus {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotInitialized => EdgeviewStatus::NotInitialized,
            ErrorKind::InvalidFrame => EdgeviewStatus::InvalidFrame,
            ErrorKind::BufferAllocation => EdgeviewStatus::BufferAllocation,
            ErrorKind::Processing => EdgeviewStatus::Processing,
            ErrorKind::InvalidHandle => EdgeviewStatus::InvalidHandle,
            ErrorKind::InvalidConfig => EdgeviewStatus::InvalidConfig,
        }
    }
}

/// Byte buffer handed to the host. Owned by the host until passed to
/// `edgeview_buffer_free`. An empty buffer has `data == NULL` and `len == 0`.
#[repr(C)]
#[derive(Debug)]
pub struct EdgeviewBuffer {
    pub data: *mut u8,
    pub len: size_t,
}

impl EdgeviewBuffer {
    fn empty() -> Self {
        Self {
            data: ptr::null_mut(),
            len: 0,
        }
    }

    fn from_vec(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            return Self::empty();
        }
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len();
        Self {
            data: Box::into_raw(boxed) as *mut u8,
            len,
        }
    }
}

/// Run `f`, turning a panic into `fallback`
fn guarded<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            log::error!("Panic caught at FFI boundary");
            fallback
        }
    }
}

// ============================================================================
// PROCESSOR API
// ============================================================================

/// Create a processor in the uninitialized state
///
/// Returns a non-zero handle, or 0 on failure.
#[no_mangle]
pub extern "C" fn edgeview_processor_create() -> u64 {
    guarded(0, || {
        let handle = ProcessorRegistry::global().create();
        log::info!("Created processor instance: {}", handle);
        handle
    })
}

/// Destroy a processor and release its buffers
///
/// Destroying an unknown or already destroyed handle returns
/// `InvalidHandle` and has no other effect.
#[no_mangle]
pub extern "C" fn edgeview_processor_destroy(handle: u64) -> EdgeviewStatus {
    guarded(EdgeviewStatus::Processing, || {
        match ProcessorRegistry::global().destroy(handle) {
            Ok(()) => {
                log::info!("Destroyed processor instance: {}", handle);
                EdgeviewStatus::Ok
            }
            Err(err) => {
                log::warn!("{}", err);
                err.kind().into()
            }
        }
    })
}

/// Move a processor to the ready state. Safe to call repeatedly.
#[no_mangle]
pub extern "C" fn edgeview_processor_initialize(handle: u64) -> bool {
    guarded(false, || match ProcessorRegistry::global().get(handle) {
        Ok(processor) => {
            let result = processor.lock().initialize();
            log::info!(
                "Initialized processor {}: {}",
                handle,
                if result { "success" } else { "failed" }
            );
            result
        }
        Err(err) => {
            log::warn!("{}", err);
            false
        }
    })
}

/// Process one RGB24 frame into a JPEG edge map
///
/// On success `*out` receives the JPEG bytes, which the caller must release
/// with `edgeview_buffer_free`. On any failure `*out` is an empty buffer.
///
/// # Safety
/// `data` must point to `len` readable bytes. `out` must be a valid pointer.
/// A `len` above `isize::MAX` is rejected with `InvalidArgument`.
#[no_mangle]
pub unsafe extern "C" fn edgeview_processor_process_frame(
    handle: u64,
    data: *const u8,
    len: size_t,
    width: u32,
    height: u32,
    out: *mut EdgeviewBuffer,
) -> EdgeviewStatus {
    if out.is_null() {
        return EdgeviewStatus::InvalidArgument;
    }
    out.write(EdgeviewBuffer::empty());

    if data.is_null() || len > isize::MAX as usize {
        return EdgeviewStatus::InvalidArgument;
    }

    let processor = match ProcessorRegistry::global().get(handle) {
        Ok(processor) => processor,
        Err(err) => {
            log::warn!("{}", err);
            return err.kind().into();
        }
    };
    let input = std::slice::from_raw_parts(data, len);

    guarded(EdgeviewStatus::Processing, || {
        let result = processor.lock().process_frame(input, width, height);
        match result {
            Ok(jpeg) => {
                out.write(EdgeviewBuffer::from_vec(jpeg));
                EdgeviewStatus::Ok
            }
            Err(err) => {
                log::log!(
                    err.log_level(),
                    "Error processing frame on {}: {}",
                    handle,
                    err
                );
                err.kind().into()
            }
        }
    })
}

/// Get number of successfully processed frames, 0 for unknown handles
#[no_mangle]
pub extern "C" fn edgeview_processor_frames_processed(handle: u64) -> u64 {
    guarded(0, || {
        ProcessorRegistry::global()
            .get(handle)
            .map(|processor| processor.lock().stats().frames_processed)
            .unwrap_or(0)
    })
}

// ============================================================================
// UTILITY FUNCTIONS
// ============================================================================

/// Release a buffer returned by `edgeview_processor_process_frame`
///
/// # Safety
/// `buffer` must come from this library and must not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn edgeview_buffer_free(buffer: EdgeviewBuffer) {
    if !buffer.data.is_null() {
        let slice = ptr::slice_from_raw_parts_mut(buffer.data, buffer.len);
        drop(Box::from_raw(slice));
    }
}

/// Get library version string
#[no_mangle]
pub extern "C" fn edgeview_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr() as *const c_char
}

/// Install a console logger for hosts without their own log sink
///
/// `level`: 0 off, 1 error, 2 warn, 3 info, 4 debug, 5+ trace. Only the
/// first call has an effect.
#[no_mangle]
pub extern "C" fn edgeview_init_logging(level: u32) {
    static INIT_LOGGER: Once = Once::new();

    let filter = match level {
        0 => log::LevelFilter::Off,
        1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new().filter_level(filter).try_init();
    });
}
