use crate::{Bo, ExecObject, ExecObjectFlags};

/// The buffers a batch references
///
/// `exec_bos[i]` and `entries[i]` describe the same buffer. Every buffer in
/// the list is kept alive by the list until [`ValidationList::release`].
pub(crate) struct ValidationList {
    pub exec_bos: Vec<Bo>,
    pub entries: Vec<ExecObject>,
    /// sum of the sizes of every buffer in the list
    pub aperture_space: u64,
}

impl ValidationList {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            exec_bos: Vec::with_capacity(capacity),
            entries: Vec::with_capacity(capacity),
            aperture_space: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.exec_bos.len()
    }

    pub fn capacity(&self) -> usize {
        self.exec_bos.capacity()
    }

    /// Slot of `bo`, trying the index hint on the buffer before scanning
    pub fn find(&self, bo: &Bo) -> Option<usize> {
        let index = bo.index();
        if index < self.exec_bos.len() && self.exec_bos[index] == *bo {
            return Some(index);
        }

        // the hint belongs to another batch that shares the buffer
        self.exec_bos.iter().position(|b| b == bo)
    }

    pub fn is_write(&self, index: usize) -> bool {
        self.entries[index].is_write()
    }

    pub fn mark_write(&mut self, index: usize) {
        self.entries[index].flags |= ExecObjectFlags::WRITE.bits();
    }

    /// Append an entry for `bo`, which must not already be in the list
    pub fn add(&mut self, bo: &Bo, writable: bool) -> usize {
        debug_assert!(self.find(bo).is_none());

        if self.exec_bos.len() == self.exec_bos.capacity() {
            let grow = self.exec_bos.capacity();
            self.exec_bos.reserve_exact(grow);
            self.entries.reserve_exact(grow);
        }

        let mut flags = bo.kflags();
        if writable {
            flags |= ExecObjectFlags::WRITE;
        }

        let index = self.exec_bos.len();
        self.entries.push(ExecObject::new(bo.handle(), bo.address(), flags));
        bo.set_index(index);
        self.exec_bos.push(bo.clone());
        self.aperture_space += bo.size();
        index
    }

    /// Drop the list's reference on every buffer
    ///
    /// Called once the list has been handed to the kernel, so every buffer is
    /// now busy on the gpu
    pub fn release(&mut self) {
        for bo in self.exec_bos.drain(..) {
            bo.set_busy();
            bo.set_index(Bo::NO_INDEX);
        }
        self.entries.clear();
        self.aperture_space = 0;
    }

    /// The tracked buffer whose address range contains `address`
    pub fn bo_for_address(&self, address: u64) -> Option<&Bo> {
        // decoders zero the top 16 bits of addresses
        const MASK: u64 = !0u64 >> 16;
        let address = address & MASK;
        self.exec_bos.iter().find(|bo| {
            let start = bo.address() & MASK;
            address >= start && address < start + bo.size()
        })
    }
}
