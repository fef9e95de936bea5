//! Syncpoints, gpu signalled completion markers

use std::sync::Arc;

use crate::error::*;

pub(crate) struct SyncptInner {
    pub handle: u32,
    pub kernel: Arc<dyn crate::Kernel>,
}

impl Drop for SyncptInner {
    fn drop(&mut self) {
        self.kernel.syncobj_destroy(self.handle);
    }
}

/// A Syncpoint
///
/// Wraps a kernel sync object. A batch signals a fresh one every submission
/// so that "this submission has completed" can be waited on by other batches.
#[derive(Clone)]
pub struct Syncpt {
    pub(crate) raw: Arc<SyncptInner>,
}

impl PartialEq for Syncpt {
    fn eq(&self, other: &Syncpt) -> bool {
        Arc::ptr_eq(&self.raw, &other.raw)
    }
}

impl Eq for Syncpt {}

impl std::fmt::Debug for Syncpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Syncpt handle: {}", self.raw.handle)
    }
}

impl Syncpt {
    /// Create a new unsignalled Syncpoint
    pub fn new(kernel: &Arc<dyn crate::Kernel>) -> Result<Self, Error> {
        let handle = kernel.syncobj_create()?;
        Ok(Self {
            raw: Arc::new(SyncptInner {
                handle,
                kernel: Arc::clone(kernel),
            }),
        })
    }

    /// Kernel handle of the sync object
    pub fn handle(&self) -> u32 {
        self.raw.handle
    }

    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.raw)
    }

    /// Block until the gpu signals the syncpoint
    ///
    /// returns false if `timeout_ns` elapsed first
    pub fn wait(&self, timeout_ns: i64) -> Result<bool, Error> {
        self.raw.kernel.syncobj_wait(&[self.raw.handle], timeout_ns)
    }
}
