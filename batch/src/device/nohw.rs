//! A kernel that accepts everything without a gpu behind it

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::*;

/// [`crate::Kernel`] for running without hardware
///
/// Hands out fresh handles, accepts every submission and reports sync
/// objects as signalled straight away
#[derive(Debug)]
pub struct NoHwKernel {
    next_handle: AtomicU32,
    next_ctx: AtomicU32,
    next_syncobj: AtomicU32,
    submissions: AtomicU32,
}

impl Default for NoHwKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl NoHwKernel {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU32::new(1),
            next_ctx: AtomicU32::new(1),
            next_syncobj: AtomicU32::new(1),
            submissions: AtomicU32::new(0),
        }
    }

    /// Number of batches accepted so far
    pub fn submissions(&self) -> u32 {
        self.submissions.load(Ordering::Relaxed)
    }
}

impl crate::Kernel for NoHwKernel {
    fn gem_create(&self, _size: u64) -> Result<u32, Error> {
        Ok(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn gem_close(&self, _handle: u32) {}

    fn execbuffer(&self, _execbuf: &crate::ExecBuffer<'_>) -> Result<(), SubmitError> {
        self.submissions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn reset_stats(&self, ctx_id: u32) -> Result<crate::ResetStats, Error> {
        Ok(crate::ResetStats {
            ctx_id,
            ..Default::default()
        })
    }

    fn create_context(&self) -> Result<u32, Error> {
        Ok(self.next_ctx.fetch_add(1, Ordering::Relaxed))
    }

    fn clone_context(&self, _ctx_id: u32) -> Result<u32, Error> {
        self.create_context()
    }

    fn destroy_context(&self, _ctx_id: u32) {}

    fn set_context_priority(&self, _ctx_id: u32, _priority: i32) -> Result<(), Error> {
        Ok(())
    }

    fn syncobj_create(&self) -> Result<u32, Error> {
        Ok(self.next_syncobj.fetch_add(1, Ordering::Relaxed))
    }

    fn syncobj_destroy(&self, _handle: u32) {}

    fn syncobj_wait(&self, _handles: &[u32], _timeout_ns: i64) -> Result<bool, Error> {
        Ok(true)
    }
}
