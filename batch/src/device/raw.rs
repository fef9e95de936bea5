//! The kernel facility and the records passed across it

use bytemuck::{Pod, Zeroable};

use crate::error::*;

/// One entry of the validation list, laid out as the kernel reads it
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ExecObject {
    /// kernel handle of the buffer
    pub handle: u32,
    pub relocation_count: u32,
    pub relocs_ptr: u64,
    pub alignment: u64,
    /// gpu address the buffer is pinned at
    pub offset: u64,
    /// raw [`crate::ExecObjectFlags`]
    pub flags: u64,
    pub rsvd1: u64,
    pub rsvd2: u64,
}

impl ExecObject {
    pub fn new(handle: u32, offset: u64, flags: crate::ExecObjectFlags) -> Self {
        Self {
            handle,
            offset,
            flags: flags.bits(),
            ..Self::default()
        }
    }

    pub fn flags(&self) -> crate::ExecObjectFlags {
        crate::ExecObjectFlags::from_bits_truncate(self.flags)
    }

    pub fn is_write(&self) -> bool {
        self.flags().contains(crate::ExecObjectFlags::WRITE)
    }
}

/// A fence that a submission waits on or signals
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ExecFence {
    /// kernel handle of the sync object
    pub handle: u32,
    /// raw [`crate::FenceFlags`]
    pub flags: u32,
}

impl ExecFence {
    pub fn new(handle: u32, flags: crate::FenceFlags) -> Self {
        Self {
            handle,
            flags: flags.bits(),
        }
    }

    pub fn flags(&self) -> crate::FenceFlags {
        crate::FenceFlags::from_bits_truncate(self.flags)
    }
}

/// The submission record in the kernel's own layout
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct RawExecBuffer {
    pub buffers_ptr: u64,
    pub buffer_count: u32,
    pub batch_start_offset: u32,
    pub batch_len: u32,
    pub dr1: u32,
    pub dr4: u32,
    /// number of fences when `FENCE_ARRAY` is set
    pub num_cliprects: u32,
    /// fence array when `FENCE_ARRAY` is set
    pub cliprects_ptr: u64,
    pub flags: u64,
    /// hardware context id
    pub rsvd1: u64,
    pub rsvd2: u64,
}

/// A request to execute a batch
#[derive(Debug, Clone, Copy)]
pub struct ExecBuffer<'a> {
    /// every buffer the commands reference, the batch buffer first
    pub objects: &'a [ExecObject],
    /// fences to wait on and signal
    pub fences: &'a [ExecFence],
    pub batch_start_offset: u32,
    /// length of the first batch buffer in bytes, 8 byte aligned
    pub batch_len: u32,
    pub engine: crate::Engine,
    pub flags: crate::ExecFlags,
    /// hardware context to execute in
    pub ctx_id: u32,
}

impl<'a> ExecBuffer<'a> {
    /// engine selector combined with the flags
    pub fn raw_flags(&self) -> u64 {
        self.engine.ring() | self.flags.bits()
    }

    /// Build the kernel record, the pointers borrow from `self`
    pub fn to_raw(&self) -> RawExecBuffer {
        let mut raw = RawExecBuffer {
            buffers_ptr: self.objects.as_ptr() as usize as u64,
            buffer_count: self.objects.len() as u32,
            batch_start_offset: self.batch_start_offset,
            batch_len: self.batch_len,
            flags: self.raw_flags(),
            rsvd1: self.ctx_id as u64,
            ..RawExecBuffer::default()
        };
        if self.flags.contains(crate::ExecFlags::FENCE_ARRAY) {
            raw.num_cliprects = self.fences.len() as u32;
            raw.cliprects_ptr = self.fences.as_ptr() as usize as u64;
        }
        raw
    }
}

/// Reset counters the kernel keeps for a hardware context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetStats {
    pub ctx_id: u32,
    /// resets of the whole gpu
    pub reset_count: u32,
    /// resets while a batch from this context was executing
    pub batch_active: u32,
    /// resets while a batch from this context was queued
    pub batch_pending: u32,
}

/// The kernel graphics driver
///
/// Everything the batch core needs from below: buffer handles, hardware
/// contexts, sync objects and the submission call itself. All calls are
/// synchronous, submission returns once the kernel has accepted the work.
pub trait Kernel: Send + Sync {
    /// Create a buffer of `size` bytes and return its handle
    fn gem_create(&self, size: u64) -> Result<u32, Error>;

    fn gem_close(&self, handle: u32);

    /// Queue a batch for execution
    fn execbuffer(&self, execbuf: &ExecBuffer<'_>) -> Result<(), SubmitError>;

    fn reset_stats(&self, ctx_id: u32) -> Result<ResetStats, Error>;

    fn create_context(&self) -> Result<u32, Error>;

    /// Create a new context with the same parameters as `ctx_id`
    fn clone_context(&self, ctx_id: u32) -> Result<u32, Error>;

    fn destroy_context(&self, ctx_id: u32);

    fn set_context_priority(&self, ctx_id: u32, priority: i32) -> Result<(), Error>;

    fn syncobj_create(&self) -> Result<u32, Error>;

    fn syncobj_destroy(&self, handle: u32);

    /// Wait until every sync object in `handles` has signalled
    ///
    /// returns false on timeout
    fn syncobj_wait(&self, handles: &[u32], timeout_ns: i64) -> Result<bool, Error>;
}
