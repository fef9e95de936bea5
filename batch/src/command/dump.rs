//! Human readable dumps of a batch, printed when debug output is enabled

use crate::{Bo, ExecFence, ExecObject, FenceFlags};

/// Lists every fence, `...` marks a wait and `!` a signal
#[derive(Debug, Clone, Copy)]
pub struct FenceListDump<'a> {
    pub fences: &'a [ExecFence],
}

impl std::fmt::Display for FenceListDump<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fence list (length {}):      ", self.fences.len())?;
        for fence in self.fences {
            let flags = fence.flags();
            write!(
                f,
                "{}{}{} ",
                if flags.contains(FenceFlags::WAIT) { "..." } else { "" },
                fence.handle,
                if flags.contains(FenceFlags::SIGNAL) { "!" } else { "" },
            )?;
        }
        Ok(())
    }
}

/// One line per tracked buffer
#[derive(Debug, Clone, Copy)]
pub struct ValidationListDump<'a> {
    pub bos: &'a [Bo],
    pub entries: &'a [ExecObject],
}

impl std::fmt::Display for ValidationListDump<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Validation list (length {}):", self.entries.len())?;
        for (i, (bo, entry)) in self.bos.iter().zip(self.entries).enumerate() {
            debug_assert_eq!(entry.handle, bo.handle());
            writeln!(
                f,
                "[{:2}]: {:2} {:<14} @ 0x{:016x} ({}B)\t {:2} refs{}",
                i,
                entry.handle,
                bo.name(),
                entry.offset,
                bo.size(),
                bo.refcount(),
                if entry.is_write() { " (write)" } else { "" },
            )?;
        }
        Ok(())
    }
}

/// Summary line printed on every flush
#[derive(Debug, Clone, Copy)]
pub struct FlushStats<'a> {
    pub batch: &'a super::Batch,
}

impl std::fmt::Display for FlushStats<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let batch = self.batch;
        let mut bytes_for_commands = batch.bytes_used();
        let mut second_bytes = 0;
        if batch.is_chained() {
            second_bytes = bytes_for_commands;
            bytes_for_commands += batch.primary_batch_size();
        }
        write!(
            f,
            "{} batch [{}] flush with {:5}+{:5}b ({:.1}%) (cmds), {:4} BOs ({:.1}Mb aperture)",
            batch.name(),
            batch.hw_ctx_id(),
            batch.primary_batch_size(),
            second_bytes,
            100.0 * bytes_for_commands as f32 / batch.batch_size() as f32,
            batch.exec_count(),
            batch.aperture_space() as f32 / (1024.0 * 1024.0),
        )
    }
}

impl super::Batch {
    pub fn fence_list_dump(&self) -> FenceListDump<'_> {
        FenceListDump {
            fences: &self.exec_fences,
        }
    }

    pub fn validation_list_dump(&self) -> ValidationListDump<'_> {
        ValidationListDump {
            bos: &self.validation.exec_bos,
            entries: &self.validation.entries,
        }
    }

    pub fn flush_stats(&self) -> FlushStats<'_> {
        FlushStats { batch: self }
    }
}
