//! Device
//!
//! State shared by every batch of a gpu: the kernel facility, the buffer
//! manager and the workaround buffer.

use std::sync::Arc;

use crate::error::*;

pub mod nohw;
pub(crate) mod raw;

pub use nohw::*;
pub use raw::*;

/// Size of the workaround buffer
pub const WORKAROUND_BO_SIZE: u64 = 4096;

/// Notifications from the batch core to the context that owns it
///
/// Both default to doing nothing
pub trait ContextCallbacks: Send + Sync {
    /// The hardware context of `batch` was replaced, every piece of gpu state
    /// previously emitted into it must be emitted again
    fn lost_context_state(&self, batch: crate::BatchName) {
        let _ = batch;
    }

    /// A submission failed because the device was reset
    fn device_reset(&self, status: crate::ResetStatus) {
        let _ = status;
    }
}

/// [`ContextCallbacks`] that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallbacks;

impl ContextCallbacks for NoCallbacks {}

/// A Device
///
/// Owns the buffer manager and the buffers every batch on the gpu shares
pub struct Device {
    pub(crate) kernel: Arc<dyn Kernel>,
    pub(crate) bufmgr: crate::BufferManager,
    pub(crate) workaround_bo: crate::Bo,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Device workaround bo: {:?}", self.workaround_bo)
    }
}

impl Device {
    /// Create a new Device on top of `kernel`
    pub fn new(kernel: Arc<dyn Kernel>) -> Result<Self, Error> {
        #[cfg(feature = "logging")]
        log::trace!("BATCH: Create Device");

        let bufmgr = crate::BufferManager::new(Arc::clone(&kernel));
        let workaround_bo = bufmgr.alloc(&crate::BoDesc {
            name: "workaround",
            size: WORKAROUND_BO_SIZE,
            zone: crate::MemZone::Other,
            flags: crate::ExecObjectFlags::empty(),
        })?;

        Ok(Self {
            kernel,
            bufmgr,
            workaround_bo,
        })
    }

    /// Create a Device that never touches a gpu
    pub fn no_hw() -> Result<Self, Error> {
        Self::new(Arc::new(NoHwKernel::new()))
    }

    pub fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.kernel
    }

    pub fn bufmgr(&self) -> &crate::BufferManager {
        &self.bufmgr
    }

    /// Allocate a new buffer
    pub fn create_bo(&self, desc: &crate::BoDesc<'_>) -> Result<crate::Bo, Error> {
        self.bufmgr.alloc(desc)
    }

    /// Scratch buffer for hardware workarounds
    ///
    /// Writes to it are never ordered, so it is never tracked as written
    pub fn workaround_bo(&self) -> &crate::Bo {
        &self.workaround_bo
    }
}
