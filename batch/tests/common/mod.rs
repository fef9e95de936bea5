#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::Mutex;

use batch::*;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Copy of everything the kernel was handed in one submission
#[derive(Debug, Clone)]
pub struct Submission {
    pub ctx_id: u32,
    pub objects: Vec<ExecObject>,
    pub fences: Vec<ExecFence>,
    pub batch_len: u32,
    pub flags: u64,
    pub raw: RawExecBuffer,
}

impl Submission {
    pub fn waits(&self) -> Vec<u32> {
        self.fences
            .iter()
            .filter(|f| f.flags().contains(FenceFlags::WAIT))
            .map(|f| f.handle)
            .collect()
    }

    pub fn signals(&self) -> Vec<u32> {
        self.fences
            .iter()
            .filter(|f| f.flags().contains(FenceFlags::SIGNAL))
            .map(|f| f.handle)
            .collect()
    }
}

/// A kernel that records every call and fails on request
#[derive(Default)]
pub struct FakeKernel {
    next_handle: AtomicU32,
    pub submissions: Mutex<Vec<Submission>>,
    pub fail_next_submit: Mutex<Option<SubmitError>>,
    pub fail_clone: AtomicBool,
    pub fail_gem_create: AtomicBool,
    pub fail_wait: AtomicBool,
    pub reset_stats: Mutex<HashMap<u32, ResetStats>>,
    pub live_contexts: Mutex<HashSet<u32>>,
    pub destroyed_contexts: Mutex<Vec<u32>>,
    pub priorities: Mutex<HashMap<u32, i32>>,
    pub live_syncobjs: Mutex<HashSet<u32>>,
    pub waits: Mutex<Vec<u32>>,
    pub live_bos: Mutex<HashSet<u32>>,
}

impl FakeKernel {
    fn next(&self) -> u32 {
        self.next_handle.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    pub fn last_submission(&self) -> Submission {
        self.submissions
            .lock()
            .last()
            .cloned()
            .expect("nothing was submitted")
    }

    pub fn set_reset_stats(&self, ctx_id: u32, batch_active: u32, batch_pending: u32) {
        self.reset_stats.lock().insert(
            ctx_id,
            ResetStats {
                ctx_id,
                reset_count: 1,
                batch_active,
                batch_pending,
            },
        );
    }
}

impl Kernel for FakeKernel {
    fn gem_create(&self, _size: u64) -> Result<u32, Error> {
        if self.fail_gem_create.load(Ordering::Relaxed) {
            return Err(Error::Kernel {
                op: "gem_create",
                errno: 12,
            });
        }
        let handle = self.next();
        self.live_bos.lock().insert(handle);
        Ok(handle)
    }

    fn gem_close(&self, handle: u32) {
        assert!(self.live_bos.lock().remove(&handle), "double close of {}", handle);
    }

    fn execbuffer(&self, execbuf: &ExecBuffer<'_>) -> Result<(), SubmitError> {
        self.submissions.lock().push(Submission {
            ctx_id: execbuf.ctx_id,
            objects: execbuf.objects.to_vec(),
            fences: execbuf.fences.to_vec(),
            batch_len: execbuf.batch_len,
            flags: execbuf.raw_flags(),
            raw: execbuf.to_raw(),
        });
        match self.fail_next_submit.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn reset_stats(&self, ctx_id: u32) -> Result<ResetStats, Error> {
        Ok(self
            .reset_stats
            .lock()
            .get(&ctx_id)
            .copied()
            .unwrap_or(ResetStats {
                ctx_id,
                ..Default::default()
            }))
    }

    fn create_context(&self) -> Result<u32, Error> {
        let ctx = self.next();
        self.live_contexts.lock().insert(ctx);
        Ok(ctx)
    }

    fn clone_context(&self, ctx_id: u32) -> Result<u32, Error> {
        if self.fail_clone.load(Ordering::Relaxed) {
            return Err(Error::Kernel {
                op: "clone_context",
                errno: 5,
            });
        }
        let ctx = self.create_context()?;
        let priority = self.priorities.lock().get(&ctx_id).copied();
        if let Some(priority) = priority {
            self.priorities.lock().insert(ctx, priority);
        }
        Ok(ctx)
    }

    fn destroy_context(&self, ctx_id: u32) {
        assert!(self.live_contexts.lock().remove(&ctx_id), "unknown context {}", ctx_id);
        self.destroyed_contexts.lock().push(ctx_id);
    }

    fn set_context_priority(&self, ctx_id: u32, priority: i32) -> Result<(), Error> {
        self.priorities.lock().insert(ctx_id, priority);
        Ok(())
    }

    fn syncobj_create(&self) -> Result<u32, Error> {
        let handle = self.next();
        self.live_syncobjs.lock().insert(handle);
        Ok(handle)
    }

    fn syncobj_destroy(&self, handle: u32) {
        assert!(self.live_syncobjs.lock().remove(&handle), "unknown syncobj {}", handle);
    }

    fn syncobj_wait(&self, handles: &[u32], _timeout_ns: i64) -> Result<bool, Error> {
        if self.fail_wait.load(Ordering::Relaxed) {
            return Err(Error::Kernel {
                op: "syncobj_wait",
                errno: 62,
            });
        }
        self.waits.lock().extend_from_slice(handles);
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    LostState(BatchName),
    Reset(ResetStatus),
}

/// Remembers every notification
#[derive(Default)]
pub struct RecordingCallbacks {
    pub events: Mutex<Vec<Event>>,
}

impl ContextCallbacks for RecordingCallbacks {
    fn lost_context_state(&self, batch: BatchName) {
        self.events.lock().push(Event::LostState(batch));
    }

    fn device_reset(&self, status: ResetStatus) {
        self.events.lock().push(Event::Reset(status));
    }
}

pub struct Fixture {
    pub kernel: Arc<FakeKernel>,
    pub device: Arc<Device>,
    pub callbacks: Arc<RecordingCallbacks>,
}

impl Fixture {
    pub fn new() -> Self {
        init_logging();
        let kernel = Arc::new(FakeKernel::default());
        let device = Arc::new(Device::new(Arc::clone(&kernel) as Arc<dyn Kernel>).unwrap());
        Self {
            kernel,
            device,
            callbacks: Arc::new(RecordingCallbacks::default()),
        }
    }

    pub fn desc(&self, name: BatchName) -> BatchDesc {
        BatchDesc {
            name,
            debug: DebugFlags::empty(),
            ..Default::default()
        }
    }

    pub fn batch(&self, name: BatchName) -> Batch {
        self.batch_with(&self.desc(name))
    }

    pub fn batch_with(&self, desc: &BatchDesc) -> Batch {
        Batch::new(
            &self.device,
            Arc::clone(&self.callbacks) as Arc<dyn ContextCallbacks>,
            desc,
        )
        .unwrap()
    }

    pub fn batch_set(&self) -> BatchSet {
        BatchSet::new(
            &self.device,
            Arc::clone(&self.callbacks) as Arc<dyn ContextCallbacks>,
            &self.desc(BatchName::Render),
        )
        .unwrap()
    }

    pub fn bo(&self, name: &str, size: u64) -> Bo {
        self.device
            .create_bo(&BoDesc {
                name,
                size,
                zone: MemZone::Other,
                flags: ExecObjectFlags::empty(),
            })
            .unwrap()
    }

    pub fn events(&self) -> Vec<Event> {
        self.callbacks.events.lock().clone()
    }
}

/// Some arbitrary command dwords
pub const NOOPS: [u32; 4] = [0, 0, 0, 0];
