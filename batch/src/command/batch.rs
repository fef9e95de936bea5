use std::sync::Arc;

use super::raw;
use super::ValidationList;

use crate::error::*;
use crate::{Bo, DebugFlags, ExecFence, ExecObject, FenceFlags, ResetStatus, Syncpt};

/// A Batch
///
/// Accumulates gpu commands together with every buffer they reference and
/// submits them to the kernel as one unit. After each submission the batch
/// starts over with a fresh command buffer, validation list and completion
/// fence; it lives for as long as the context that owns it.
pub struct Batch {
    pub(crate) name: crate::BatchName,
    pub(crate) engine: crate::Engine,
    pub(crate) device: Arc<crate::Device>,
    pub(crate) callbacks: Arc<dyn crate::ContextCallbacks>,
    pub(crate) hw_ctx_id: u32,

    /// buffer that commands are currently written to
    pub(crate) bo: Bo,
    /// cpu copy of `bo`, written back when chaining away from it or submitting
    pub(crate) map: Vec<u8>,
    pub(crate) map_next: usize,
    pub(crate) batch_size: usize,
    /// length of the first buffer, fixed when chaining or finishing
    pub(crate) primary_batch_size: usize,

    pub(crate) validation: ValidationList,

    /// fences passed to the kernel with the next submission
    pub(crate) exec_fences: Vec<ExecFence>,
    /// keeps every fence in `exec_fences` alive, the signalled one first
    pub(crate) syncpts: Vec<Syncpt>,
    /// completion fence of the previous submission
    pub(crate) last_syncpt: Option<Syncpt>,

    pub(crate) contains_draw: bool,
    pub(crate) debug: DebugFlags,
    /// set while the batch has no command buffer, after a failed reset
    pub(crate) needs_reset: bool,
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Batch name: {} hw ctx: {} bos: {} used: {}",
            self.name,
            self.hw_ctx_id,
            self.validation.len(),
            self.map_next
        )
    }
}

impl Batch {
    /// Create a new Batch with its own hardware context
    pub fn new(
        device: &Arc<crate::Device>,
        callbacks: Arc<dyn crate::ContextCallbacks>,
        desc: &crate::BatchDesc,
    ) -> Result<Self, Error> {
        #[cfg(feature = "logging")]
        log::trace!("BATCH: Create Batch {} on {:?}", desc.name, desc.engine);

        if desc.batch_size == 0 || desc.batch_size % raw::BATCH_LEN_ALIGN != 0 {
            return Err(Error::InvalidBatchSize(desc.batch_size));
        }

        let bo = Self::alloc_command_bo(device, desc.batch_size)?;

        let hw_ctx_id = device.kernel.create_context()?;
        if let Err(_e) = device
            .kernel
            .set_context_priority(hw_ctx_id, desc.priority.value())
        {
            #[cfg(feature = "logging")]
            log::warn!("BATCH: Failed to set priority of hw context {}: {}", hw_ctx_id, _e);
        }

        let mut batch = Self {
            name: desc.name,
            engine: desc.engine,
            device: Arc::clone(device),
            callbacks,
            hw_ctx_id,
            bo: bo.clone(),
            map: Vec::new(),
            map_next: 0,
            batch_size: desc.batch_size,
            primary_batch_size: 0,
            validation: ValidationList::with_capacity(desc.exec_capacity),
            exec_fences: Vec::new(),
            syncpts: Vec::new(),
            last_syncpt: None,
            contains_draw: false,
            debug: desc.debug,
            needs_reset: false,
        };

        batch.begin_chunk(bo);
        batch.arm_completion_fence()?;

        Ok(batch)
    }

    fn alloc_command_bo(device: &crate::Device, batch_size: usize) -> Result<Bo, Error> {
        device.bufmgr.alloc(&crate::BoDesc {
            name: "command buffer",
            size: (batch_size + crate::BATCH_RESERVED) as u64,
            zone: crate::MemZone::Other,
            flags: crate::ExecObjectFlags::CAPTURE,
        })
    }

    /// Start writing commands into `bo`, which becomes the newest tracked buffer
    fn begin_chunk(&mut self, bo: Bo) {
        self.map.clear();
        self.map.resize(self.batch_size + crate::BATCH_RESERVED, 0);
        self.map_next = 0;
        self.validation.add(&bo, false);
        self.bo = bo;
    }

    fn arm_completion_fence(&mut self) -> Result<(), Error> {
        let syncpt = Syncpt::new(&self.device.kernel)?;
        self.push_completion_fence(syncpt);
        Ok(())
    }

    /// The completion fence always comes first, ahead of any waits added
    /// while the batch was waiting to be reset
    fn push_completion_fence(&mut self, syncpt: Syncpt) {
        self.exec_fences
            .insert(0, ExecFence::new(syncpt.handle(), FenceFlags::SIGNAL));
        self.syncpts.insert(0, syncpt);
    }

    /// Start a new generation: fresh command buffer and completion fence
    ///
    /// The old stream is dropped before anything can fail. If allocating
    /// fails the batch is left empty and the reset is retried on next use.
    fn reset(&mut self) -> Result<(), Error> {
        #[cfg(feature = "logging")]
        log::debug!("BATCH: Reset {} batch", self.name);

        self.needs_reset = true;
        self.map_next = 0;
        self.primary_batch_size = 0;
        self.contains_draw = false;
        debug_assert_eq!(self.validation.len(), 0);

        let bo = Self::alloc_command_bo(&self.device, self.batch_size)?;
        let syncpt = Syncpt::new(&self.device.kernel)?;

        self.begin_chunk(bo);
        debug_assert_eq!(self.bo.index(), 0);
        self.push_completion_fence(syncpt);
        self.needs_reset = false;
        Ok(())
    }

    /// Finish a reset that failed earlier
    fn ensure_ready(&mut self) -> Result<(), Error> {
        if self.needs_reset {
            self.reset()?;
        }
        Ok(())
    }

    /// Make the next submission wait on or signal `syncpt`
    pub fn add_syncpt(&mut self, syncpt: &Syncpt, flags: FenceFlags) {
        self.exec_fences.push(ExecFence::new(syncpt.handle(), flags));
        self.syncpts.push(syncpt.clone());
    }

    /// The validation entry for `bo`, if this batch references it
    pub fn find_entry(&self, bo: &Bo) -> Option<&ExecObject> {
        self.validation
            .find(bo)
            .map(|index| &self.validation.entries[index])
    }

    /// Does the batch reference `bo`, is it in the validation list
    pub fn references(&self, bo: &Bo) -> bool {
        self.validation.find(bo).is_some()
    }

    /// Add a buffer to the validation list
    ///
    /// Must be called for every buffer that the following commands touch, a
    /// buffer that is not in the list does not exist as far as the gpu is
    /// concerned. The first time the batch sees a buffer every batch in
    /// `peers` that also references it is flushed and waited on if either
    /// side writes it.
    pub fn use_bo(&mut self, bo: &Bo, writable: bool, peers: &mut [&mut Batch]) -> Result<(), Error> {
        debug_assert!(bo.kflags().contains(crate::ExecObjectFlags::PINNED));
        self.ensure_ready()?;

        // the order of writes to the workaround bo doesn't matter and marking
        // it written would serialize every batch that shares it
        let writable = writable && *bo != self.device.workaround_bo;

        if let Some(index) = self.validation.find(bo) {
            if writable {
                self.validation.mark_write(index);
            }
            return Ok(());
        }

        if *bo != self.bo {
            for other in peers.iter_mut() {
                let other_writes = match other.validation.find(bo) {
                    Some(index) => other.validation.is_write(index),
                    None => continue,
                };

                // read/read needs nothing, any write orders the two batches
                if other_writes || writable {
                    #[cfg(feature = "logging")]
                    log::trace!(
                        "BATCH: {} batch syncs with {} batch on {:?}",
                        self.name,
                        other.name,
                        bo
                    );
                    other.flush()?;
                    if let Some(syncpt) = &other.last_syncpt {
                        self.add_syncpt(syncpt, FenceFlags::WAIT);
                    }
                }
            }
        }

        #[cfg(feature = "logging")]
        log::trace!("BATCH: {} batch uses {:?} writable: {}", self.name, bo, writable);
        self.validation.add(bo, writable);

        Ok(())
    }

    /// Bytes of commands in the current buffer
    pub fn bytes_used(&self) -> usize {
        self.map_next
    }

    /// Bytes left before the current buffer is full
    pub fn remaining(&self) -> usize {
        self.batch_size.saturating_sub(self.map_next)
    }

    /// Has the batch chained to a second buffer since the last submission
    pub fn is_chained(&self) -> bool {
        self.validation
            .exec_bos
            .first()
            .is_some_and(|first| *first != self.bo)
    }

    /// Chain to a new buffer if `bytes` more bytes wouldn't fit
    pub fn require_command_space(&mut self, bytes: usize) -> Result<(), Error> {
        self.ensure_ready()?;
        if self.bytes_used() + bytes >= self.batch_size {
            if bytes >= self.batch_size {
                return Err(Error::OutOfSpace {
                    requested: bytes,
                    capacity: self.batch_size,
                });
            }
            self.chain_to_new_batch()?;
        }
        Ok(())
    }

    /// Reserve `bytes` bytes of the command stream to write into
    pub fn command_space(&mut self, bytes: usize) -> Result<&mut [u8], Error> {
        self.require_command_space(bytes)?;
        let start = self.map_next;
        self.map_next += bytes;
        Ok(&mut self.map[start..self.map_next])
    }

    /// Append `dwords` to the command stream
    pub fn emit(&mut self, dwords: &[u32]) -> Result<(), Error> {
        let bytes: &[u8] = bytemuck::cast_slice(dwords);
        self.command_space(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Continue the command stream in a new buffer
    ///
    /// A jump to the new buffer is written at the end of the current one,
    /// which is then only kept alive by the validation list. Only one hop
    /// is allowed per submission.
    pub fn chain_to_new_batch(&mut self) -> Result<(), Error> {
        self.ensure_ready()?;
        if self.is_chained() {
            return Err(Error::AlreadyChained);
        }

        let new_bo = Self::alloc_command_bo(&self.device, self.batch_size)?;

        let cmd = self.map_next;
        self.map_next += raw::MI_BATCH_BUFFER_START_LEN;
        self.primary_batch_size = self.map_next;
        raw::encode_batch_buffer_start(&mut self.map[cmd..self.map_next], new_bo.address());
        self.bo.write(0, &self.map[..self.primary_batch_size]);

        #[cfg(feature = "logging")]
        log::trace!(
            "BATCH: {} batch chains {:?} -> {:?} after {} bytes",
            self.name,
            self.bo,
            new_bo,
            self.primary_batch_size
        );

        self.begin_chunk(new_bo);
        Ok(())
    }

    /// Flush if the batch has chained or `estimate` more bytes would fill it
    ///
    /// Should only be called between draws
    pub fn maybe_flush(&mut self, estimate: usize) -> Result<(), Error> {
        if self.is_chained() || self.bytes_used() + estimate >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn finish_batch(&mut self) {
        let at = self.map_next;
        raw::encode_batch_buffer_end(&mut self.map[at..at + 4]);
        self.map_next += 4;

        if !self.is_chained() {
            self.primary_batch_size = self.bytes_used();
        }
    }

    /// Submit the batch to the gpu and start a new one
    ///
    /// Does nothing if no commands have been recorded. If the kernel reports
    /// that the hardware context was banned it is replaced and the owner is
    /// told that all state was lost; any other failure is fatal. Either way
    /// every buffer reference is released and the batch is reset.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.ensure_ready()?;
        if self.bytes_used() == 0 && !self.is_chained() {
            return Ok(());
        }

        self.finish_batch();

        if self.debug.intersects(DebugFlags::BATCH | DebugFlags::SUBMIT) {
            eprintln!("{}", self.flush_stats());
            eprintln!("{}", self.fence_list_dump());
            eprint!("{}", self.validation_list_dump());
        }

        let used = self.bytes_used();
        let result = raw::submit(
            &*self.device.kernel,
            &self.bo,
            &self.map[..used],
            &mut self.validation,
            &self.exec_fences,
            self.engine,
            self.hw_ctx_id,
            self.primary_batch_size,
        );

        if let Some(syncpt) = self.syncpts.first() {
            self.last_syncpt = Some(syncpt.clone());
        }
        self.syncpts.clear();
        self.exec_fences.clear();

        let submitted = result.is_ok();
        let reset = self.reset();
        self.handle_submit_result(result)?;
        reset?;

        if submitted && self.debug.contains(DebugFlags::SYNC) {
            if let Some(syncpt) = &self.last_syncpt {
                #[cfg(feature = "logging")]
                log::debug!("BATCH: waiting for idle");
                syncpt.wait(i64::MAX)?;
            }
        }

        Ok(())
    }

    fn handle_submit_result(&mut self, result: Result<(), SubmitError>) -> Result<(), Error> {
        match result {
            Ok(()) => Ok(()),
            Err(SubmitError::ContextLost) => {
                self.replace_hw_ctx()?;
                self.callbacks.device_reset(ResetStatus::Guilty);
                Ok(())
            }
            Err(e) => {
                #[cfg(feature = "logging")]
                log::error!("BATCH: Failed to submit {} batch: {}", self.name, e);
                if self.debug.contains(DebugFlags::SUBMIT) {
                    let (start, end) = if self.debug.contains(DebugFlags::COLOR) {
                        ("\x1b[1;41m", "\x1b[0m")
                    } else {
                        ("", "")
                    };
                    eprintln!("{}batch: Failed to submit batchbuffer: {:<80}{}", start, e.to_string(), end);
                }
                Err(Error::Submit(e))
            }
        }
    }

    /// Swap the hardware context for a fresh copy, in case it was banned
    fn replace_hw_ctx(&mut self) -> Result<(), Error> {
        let new_ctx = self
            .device
            .kernel
            .clone_context(self.hw_ctx_id)
            .map_err(|e| match e {
                Error::Kernel { errno, .. } => Error::ContextReplace(errno),
                e => e,
            })?;

        #[cfg(feature = "logging")]
        log::warn!("BATCH: Replacing {} hw context {} with {}", self.name, self.hw_ctx_id, new_ctx);

        self.device.kernel.destroy_context(self.hw_ctx_id);
        self.hw_ctx_id = new_ctx;

        self.callbacks.lost_context_state(self.name);
        Ok(())
    }

    /// Ask the kernel whether the gpu was reset while this batch's work was
    /// running or queued, replacing the hardware context if so
    ///
    /// Only [`crate::ContextCallbacks::lost_context_state`] is called here,
    /// reporting the reset itself is left to the caller (see
    /// [`crate::BatchSet::check_for_reset`])
    pub fn check_for_reset(&mut self) -> Result<ResetStatus, Error> {
        let stats = match self.device.kernel.reset_stats(self.hw_ctx_id) {
            Ok(stats) => stats,
            Err(_e) => {
                #[cfg(feature = "logging")]
                log::debug!("BATCH: Failed to get reset stats: {}", _e);
                crate::ResetStats::default()
            }
        };

        let status = if stats.batch_active != 0 {
            ResetStatus::Guilty
        } else if stats.batch_pending != 0 {
            ResetStatus::Innocent
        } else {
            ResetStatus::NoReset
        };

        if status != ResetStatus::NoReset {
            // the context is probably banned, replace it before the next
            // submission fails
            self.replace_hw_ctx()?;
        }

        Ok(status)
    }

    pub fn name(&self) -> crate::BatchName {
        self.name
    }

    pub fn engine(&self) -> crate::Engine {
        self.engine
    }

    pub fn hw_ctx_id(&self) -> u32 {
        self.hw_ctx_id
    }

    pub fn device(&self) -> &Arc<crate::Device> {
        &self.device
    }

    /// Buffer commands are currently written to
    pub fn bo(&self) -> &Bo {
        &self.bo
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn primary_batch_size(&self) -> usize {
        self.primary_batch_size
    }

    /// Number of buffers in the validation list
    pub fn exec_count(&self) -> usize {
        self.validation.len()
    }

    /// Slots in the validation list before it has to grow
    pub fn exec_capacity(&self) -> usize {
        self.validation.capacity()
    }

    pub fn exec_bos(&self) -> &[Bo] {
        &self.validation.exec_bos
    }

    pub fn validation_list(&self) -> &[ExecObject] {
        &self.validation.entries
    }

    /// Total size of every referenced buffer
    pub fn aperture_space(&self) -> u64 {
        self.validation.aperture_space
    }

    pub fn exec_fences(&self) -> &[ExecFence] {
        &self.exec_fences
    }

    /// Completion fence of the last submission
    pub fn last_syncpt(&self) -> Option<&Syncpt> {
        self.last_syncpt.as_ref()
    }

    /// Syncpoint the next submission signals
    pub fn completion_syncpt(&self) -> Option<&Syncpt> {
        self.syncpts.first()
    }

    pub fn contains_draw(&self) -> bool {
        self.contains_draw
    }

    /// Record that a draw or dispatch was emitted
    pub fn set_contains_draw(&mut self) {
        self.contains_draw = true;
    }

    pub fn debug_flags(&self) -> DebugFlags {
        self.debug
    }

    /// The tracked buffer containing gpu address `address`
    pub fn bo_for_address(&self, address: u64) -> Option<&Bo> {
        self.validation.bo_for_address(address)
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        log::trace!("BATCH: Destroy {} batch", self.name);
        self.device.kernel.destroy_context(self.hw_ctx_id);
    }
}
