use std::sync::Arc;

use crate::error::*;
use crate::{Batch, BatchName, Bo, ResetStatus};

/// The batches of one context, one per [`BatchName`]
///
/// Each batch sees the others as peers when it adds a buffer, so shared
/// buffers are ordered between the command streams.
pub struct BatchSet {
    batches: Vec<Batch>,
}

impl std::fmt::Debug for BatchSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.batches.iter()).finish()
    }
}

impl BatchSet {
    /// Create every batch from `desc`, its name is replaced per batch
    pub fn new(
        device: &Arc<crate::Device>,
        callbacks: Arc<dyn crate::ContextCallbacks>,
        desc: &crate::BatchDesc,
    ) -> Result<Self, Error> {
        let batches = BatchName::ALL
            .iter()
            .map(|&name| {
                Batch::new(
                    device,
                    Arc::clone(&callbacks),
                    &crate::BatchDesc { name, ..*desc },
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { batches })
    }

    pub fn get(&self, name: BatchName) -> &Batch {
        &self.batches[name.index()]
    }

    pub fn get_mut(&mut self, name: BatchName) -> &mut Batch {
        &mut self.batches[name.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Batch> {
        self.batches.iter()
    }

    /// Add `bo` to the `name` batch, synchronizing with the other batches
    pub fn use_bo(&mut self, name: BatchName, bo: &Bo, writable: bool) -> Result<(), Error> {
        let mut target = None;
        let mut peers = Vec::with_capacity(self.batches.len() - 1);
        for batch in self.batches.iter_mut() {
            if batch.name() == name {
                target = Some(batch);
            } else {
                peers.push(batch);
            }
        }

        match target {
            Some(batch) => batch.use_bo(bo, writable, &mut peers),
            None => Ok(()),
        }
    }

    pub fn references(&self, name: BatchName, bo: &Bo) -> bool {
        self.get(name).references(bo)
    }

    pub fn flush(&mut self, name: BatchName) -> Result<(), Error> {
        self.get_mut(name).flush()
    }

    pub fn maybe_flush(&mut self, name: BatchName, estimate: usize) -> Result<(), Error> {
        self.get_mut(name).maybe_flush(estimate)
    }

    pub fn flush_all(&mut self) -> Result<(), Error> {
        for batch in self.batches.iter_mut() {
            batch.flush()?;
        }
        Ok(())
    }

    /// Check every batch for a reset, reporting the worst status seen
    ///
    /// Every batch is checked even if one fails. If any batch was reset the
    /// owner hears about it once through [`crate::ContextCallbacks::device_reset`].
    pub fn check_for_reset(&mut self) -> Result<ResetStatus, Error> {
        let mut status = ResetStatus::NoReset;
        let mut error = None;
        for batch in self.batches.iter_mut() {
            match batch.check_for_reset() {
                Ok(ResetStatus::Guilty) => status = ResetStatus::Guilty,
                Ok(ResetStatus::Innocent) if status == ResetStatus::NoReset => {
                    status = ResetStatus::Innocent
                }
                Ok(_) => (),
                Err(e) => {
                    error.get_or_insert(e);
                }
            }
        }

        if status != ResetStatus::NoReset {
            if let Some(batch) = self.batches.first() {
                batch.callbacks.device_reset(status);
            }
        }

        match error {
            Some(e) => Err(e),
            None => Ok(status),
        }
    }
}
