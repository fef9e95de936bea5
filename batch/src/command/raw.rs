use crate::error::*;

/// Terminates a batch buffer
pub const MI_BATCH_BUFFER_END: u32 = 0xA << 23;

/// Jumps to another batch buffer, followed by a 64 bit address
///
/// Bit 8 selects the per context address space, the low bits hold the
/// dword length minus two
pub const MI_BATCH_BUFFER_START: u32 = (0x31 << 23) | (1 << 8) | (3 - 2);

/// Bytes taken by [`MI_BATCH_BUFFER_START`] and its address
pub const MI_BATCH_BUFFER_START_LEN: usize = 12;

/// Submission length must be a multiple of this
pub const BATCH_LEN_ALIGN: usize = 8;

/// Write the batch end command into `dst`
pub(crate) fn encode_batch_buffer_end(dst: &mut [u8]) {
    dst[..4].copy_from_slice(bytemuck::bytes_of(&MI_BATCH_BUFFER_END));
}

/// Write a jump to `address` into `dst`
pub(crate) fn encode_batch_buffer_start(dst: &mut [u8], address: u64) {
    dst[..4].copy_from_slice(bytemuck::bytes_of(&MI_BATCH_BUFFER_START));
    dst[4..12].copy_from_slice(bytemuck::bytes_of(&address));
}

/// Hand the finished batch to the kernel
///
/// `map` is written back into `batch_bo` first. The validation list is
/// released whatever the outcome.
pub(crate) fn submit(
    kernel: &dyn crate::Kernel,
    batch_bo: &crate::Bo,
    map: &[u8],
    validation: &mut super::ValidationList,
    fences: &[crate::ExecFence],
    engine: crate::Engine,
    ctx_id: u32,
    primary_batch_size: usize,
) -> Result<(), SubmitError> {
    batch_bo.write(0, map);

    // NO_RELOC requires every address in the list to already match where
    // the buffer is bound, which pinning guarantees
    let mut flags = crate::ExecFlags::NO_RELOC
        | crate::ExecFlags::BATCH_FIRST
        | crate::ExecFlags::HANDLE_LUT;
    if !fences.is_empty() {
        flags |= crate::ExecFlags::FENCE_ARRAY;
    }

    let execbuf = crate::ExecBuffer {
        objects: &validation.entries,
        fences,
        batch_start_offset: 0,
        batch_len: crate::utils::align_usize(primary_batch_size, BATCH_LEN_ALIGN) as u32,
        engine,
        flags,
        ctx_id,
    };

    #[cfg(feature = "logging")]
    log::trace!(
        "BATCH: execbuffer ctx {} len {} bos {} fences {}",
        ctx_id,
        execbuf.batch_len,
        execbuf.objects.len(),
        execbuf.fences.len()
    );
    let result = kernel.execbuffer(&execbuf);

    validation.release();

    result
}
