//! Buffer objects + the manager that places them in the gpu address space

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::*;

/// Alignment of every buffer's size and address
pub const PAGE_SIZE: u64 = 4096;

/// Describes a buffer
#[derive(Debug, Clone, Copy)]
pub struct BoDesc<'a> {
    /// The name of the buffer, shown in debug dumps
    pub name: &'a str,
    /// the size of the buffer, rounded up to a page
    pub size: u64,
    /// where in the address space the buffer lives
    pub zone: crate::MemZone,
    /// extra flags to hand to the kernel, the buffer is always pinned
    pub flags: crate::ExecObjectFlags,
}

pub(crate) struct BoInner {
    pub name: String,
    pub gem_handle: u32,
    pub size: u64,
    pub gtt_offset: u64,
    pub kflags: crate::ExecObjectFlags,
    pub zone: crate::MemZone,
    /// hint of the slot in the validation list of the last batch that added it
    pub index: AtomicUsize,
    pub idle: AtomicBool,
    /// cpu view of the buffer contents
    pub contents: Mutex<Vec<u8>>,
    pub kernel: Arc<dyn crate::Kernel>,
}

impl Drop for BoInner {
    fn drop(&mut self) {
        #[cfg(feature = "logging")]
        log::trace!("BATCH: Free bo {} handle {}", self.name, self.gem_handle);
        self.kernel.gem_close(self.gem_handle);
    }
}

/// A Buffer Object
///
/// Reference counted gpu memory pinned at a fixed address. Clones share the
/// same memory, the kernel handle is closed when the last clone is dropped.
#[derive(Clone)]
pub struct Bo {
    pub(crate) raw: Arc<BoInner>,
}

impl PartialEq for Bo {
    fn eq(&self, other: &Bo) -> bool {
        Arc::ptr_eq(&self.raw, &other.raw)
    }
}

impl Eq for Bo {}

impl std::hash::Hash for Bo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.raw) as usize).hash(state)
    }
}

impl std::fmt::Debug for Bo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bo handle: {} name: {:?} @ 0x{:016x}",
            self.raw.gem_handle, self.raw.name, self.raw.gtt_offset
        )
    }
}

impl Bo {
    /// Value of the index hint when the buffer is in no validation list
    pub const NO_INDEX: usize = usize::MAX;

    pub fn name(&self) -> &str {
        &self.raw.name
    }

    /// Kernel handle
    pub fn handle(&self) -> u32 {
        self.raw.gem_handle
    }

    pub fn size(&self) -> u64 {
        self.raw.size
    }

    /// Gpu virtual address
    pub fn address(&self) -> u64 {
        self.raw.gtt_offset
    }

    pub fn kflags(&self) -> crate::ExecObjectFlags {
        self.raw.kflags
    }

    pub fn zone(&self) -> crate::MemZone {
        self.raw.zone
    }

    /// Number of live references, including this one
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.raw)
    }

    /// False once the buffer has been submitted to the gpu
    pub fn is_idle(&self) -> bool {
        self.raw.idle.load(Ordering::Relaxed)
    }

    /// Mark the buffer idle again, after waiting for the gpu
    pub fn set_idle(&self) {
        self.raw.idle.store(true, Ordering::Relaxed);
    }

    pub(crate) fn set_busy(&self) {
        self.raw.idle.store(false, Ordering::Relaxed);
    }

    pub(crate) fn index(&self) -> usize {
        self.raw.index.load(Ordering::Relaxed)
    }

    pub(crate) fn set_index(&self, index: usize) {
        self.raw.index.store(index, Ordering::Relaxed);
    }

    /// Copy `data` into the buffer at `offset`
    ///
    /// # Panics
    ///
    /// If the write would end past [`Bo::size`]
    pub fn write(&self, offset: u64, data: &[u8]) {
        let offset = offset as usize;
        let end = offset + data.len();
        assert!(end as u64 <= self.raw.size, "write past the end of bo {}", self.raw.name);
        let mut contents = self.raw.contents.lock();
        if contents.len() < end {
            contents.resize(end, 0);
        }
        contents[offset..end].copy_from_slice(data);
    }

    /// Copy `len` bytes out of the buffer starting at `offset`
    ///
    /// Bytes never written read as zero.
    ///
    /// # Panics
    ///
    /// If the range ends past [`Bo::size`]
    pub fn read(&self, offset: u64, len: usize) -> Vec<u8> {
        let offset = offset as usize;
        let end = offset + len;
        assert!(end as u64 <= self.raw.size, "read past the end of bo {}", self.raw.name);
        let contents = self.raw.contents.lock();
        let mut out = vec![0u8; len];
        if offset < contents.len() {
            let avail = contents.len().min(end);
            out[..avail - offset].copy_from_slice(&contents[offset..avail]);
        }
        out
    }

    /// Read dwords, used for looking at command streams
    ///
    /// # Panics
    ///
    /// Same as [`Bo::read`]
    pub fn read_dwords(&self, offset: u64, count: usize) -> Vec<u32> {
        let bytes = self.read(offset, count * 4);
        bytemuck::pod_collect_to_vec(&bytes)
    }
}

/// Allocates buffers and gives each a fixed address within its zone
pub struct BufferManager {
    kernel: Arc<dyn crate::Kernel>,
    /// next free address in each zone
    next_address: Mutex<[u64; 5]>,
}

impl std::fmt::Debug for BufferManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BufferManager next addresses: {:x?}", *self.next_address.lock())
    }
}

impl BufferManager {
    pub fn new(kernel: Arc<dyn crate::Kernel>) -> Self {
        let mut next_address = [0; 5];
        for zone in crate::MemZone::ALL {
            next_address[zone.index()] = zone.start();
        }
        // address 0 is never handed out, a zero address means "unbound"
        next_address[crate::MemZone::Shader.index()] = PAGE_SIZE;
        Self {
            kernel,
            next_address: Mutex::new(next_address),
        }
    }

    fn alloc_address(&self, zone: crate::MemZone, size: u64) -> Result<u64, Error> {
        let mut next_address = self.next_address.lock();
        let address = next_address[zone.index()];
        let end = address
            .checked_add(size)
            .filter(|&end| end <= zone.end())
            .ok_or(Error::ZoneExhausted(zone))?;
        next_address[zone.index()] = crate::utils::align_u64(end, PAGE_SIZE);
        Ok(address)
    }

    /// Create a new buffer
    pub fn alloc(&self, desc: &BoDesc<'_>) -> Result<Bo, Error> {
        #[cfg(feature = "logging")]
        log::trace!("BATCH: Create bo {:?} size {} in {:?}", desc.name, desc.size, desc.zone);

        let size = crate::utils::align_u64(desc.size.max(1), PAGE_SIZE);
        let gtt_offset = self.alloc_address(desc.zone, size)?;
        let gem_handle = self.kernel.gem_create(size)?;

        Ok(Bo {
            raw: Arc::new(BoInner {
                name: desc.name.to_string(),
                gem_handle,
                size,
                gtt_offset,
                kflags: desc.flags
                    | crate::ExecObjectFlags::PINNED
                    | crate::ExecObjectFlags::SUPPORTS_48B_ADDRESS,
                zone: desc.zone,
                index: AtomicUsize::new(Bo::NO_INDEX),
                idle: AtomicBool::new(true),
                contents: Mutex::new(Vec::new()),
                kernel: Arc::clone(&self.kernel),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bufmgr() -> BufferManager {
        BufferManager::new(Arc::new(crate::NoHwKernel::new()))
    }

    fn desc(name: &str, size: u64, zone: crate::MemZone) -> BoDesc<'_> {
        BoDesc {
            name,
            size,
            zone,
            flags: crate::ExecObjectFlags::empty(),
        }
    }

    #[test]
    fn addresses_stay_in_zone() {
        let bufmgr = bufmgr();
        let a = bufmgr.alloc(&desc("a", 100, crate::MemZone::Dynamic)).unwrap();
        let b = bufmgr.alloc(&desc("b", 5000, crate::MemZone::Dynamic)).unwrap();
        let c = bufmgr.alloc(&desc("c", 1, crate::MemZone::Shader)).unwrap();

        assert_eq!(a.address(), crate::MemZone::Dynamic.start());
        assert_eq!(a.size(), PAGE_SIZE);
        assert_eq!(b.address(), a.address() + PAGE_SIZE);
        assert_eq!(b.size(), 2 * PAGE_SIZE);
        assert_eq!(c.address(), PAGE_SIZE);
        assert!(a.kflags().contains(crate::ExecObjectFlags::PINNED));
        assert_ne!(a.handle(), b.handle());
    }

    #[test]
    fn binder_zone_runs_out() {
        let bufmgr = bufmgr();
        let d = desc("binder", crate::MemZone::BINDER_SIZE, crate::MemZone::Binder);
        bufmgr.alloc(&d).unwrap();
        assert_eq!(
            bufmgr.alloc(&d).unwrap_err(),
            Error::ZoneExhausted(crate::MemZone::Binder)
        );
    }

    #[test]
    fn contents_and_refcount() {
        let bufmgr = bufmgr();
        let bo = bufmgr.alloc(&desc("data", 64, crate::MemZone::Other)).unwrap();
        bo.write(8, &[1, 2, 3, 4]);
        assert_eq!(bo.read(6, 6), vec![0, 0, 1, 2, 3, 4]);
        assert_eq!(bo.read_dwords(8, 1), vec![u32::from_le_bytes([1, 2, 3, 4])]);

        assert_eq!(bo.refcount(), 1);
        let other = bo.clone();
        assert_eq!(bo.refcount(), 2);
        assert_eq!(bo, other);
        assert_eq!(bo.index(), Bo::NO_INDEX);
        assert!(bo.is_idle());
    }

    #[test]
    #[should_panic(expected = "write past the end")]
    fn write_past_end_panics() {
        let bufmgr = bufmgr();
        let bo = bufmgr.alloc(&desc("small", 16, crate::MemZone::Other)).unwrap();
        bo.write(PAGE_SIZE - 2, &[0; 4]);
    }
}
