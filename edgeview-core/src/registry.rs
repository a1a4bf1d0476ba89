//! Handle registry for processors owned by a foreign host
//!
//! Hosts that can only carry integers get a `u64` handle per processor.
//! Handles come from a monotonic counter and are never reused, so a handle
//! used after `destroy` is always rejected instead of aliasing a newer
//! processor.

use crate::error::RegistryError;
use crate::pipeline::Processor;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// A registered processor. The mutex serializes concurrent host calls
/// against the same handle.
pub type SharedProcessor = Arc<Mutex<Processor>>;

pub struct ProcessorRegistry {
    processors: Mutex<HashMap<u64, SharedProcessor>>,
    next_handle: AtomicU64,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Process-wide registry used by the C API
    pub fn global() -> &'static ProcessorRegistry {
        static REGISTRY: OnceLock<ProcessorRegistry> = OnceLock::new();
        REGISTRY.get_or_init(ProcessorRegistry::new)
    }

    /// Register a new uninitialized processor and return its handle.
    /// Handles are non-zero.
    pub fn create(&self) -> u64 {
        self.insert(Processor::new())
    }

    /// Register an existing processor
    pub fn insert(&self, processor: Processor) -> u64 {
        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.processors
            .lock()
            .insert(handle, Arc::new(Mutex::new(processor)));
        log::debug!("Registered processor handle {}", handle);
        handle
    }

    pub fn get(&self, handle: u64) -> Result<SharedProcessor, RegistryError> {
        self.processors
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(RegistryError::UnknownHandle(handle))
    }

    /// Remove a processor. Its buffers are freed once any in-flight call
    /// on it returns.
    pub fn destroy(&self, handle: u64) -> Result<(), RegistryError> {
        match self.processors.lock().remove(&handle) {
            Some(_) => {
                log::debug!("Destroyed processor handle {}", handle);
                Ok(())
            }
            None => Err(RegistryError::UnknownHandle(handle)),
        }
    }

    pub fn len(&self) -> usize {
        self.processors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.lock().is_empty()
    }
}
