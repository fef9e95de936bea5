/// Default size of the command region of one batch buffer
pub const BATCH_SZ: usize = 20 * 1024;

/// Bytes kept free after the command region
///
/// Terminating takes 4 bytes for the end command or 12 for a jump when
/// chaining, plus up to 4 bytes padding to a qword
pub const BATCH_RESERVED: usize = 16;

/// Default number of validation list slots before the first growth
pub const EXEC_CAPACITY: usize = 100;

/// Describes a batch
#[derive(Debug, Clone, Copy)]
pub struct BatchDesc {
    /// which of the context's command streams this is
    pub name: crate::BatchName,
    /// engine the batch executes on
    pub engine: crate::Engine,
    /// scheduling priority of the batch's hardware context
    pub priority: crate::ContextPriority,
    /// usable bytes of each batch buffer, also the threshold `maybe_flush`
    /// compares against
    pub batch_size: usize,
    /// initial number of validation list slots
    pub exec_capacity: usize,
    /// debug output
    pub debug: crate::DebugFlags,
}

impl Default for BatchDesc {
    fn default() -> Self {
        Self {
            name: crate::BatchName::Render,
            engine: crate::Engine::Render,
            priority: crate::ContextPriority::Medium,
            batch_size: BATCH_SZ,
            exec_capacity: EXEC_CAPACITY,
            debug: *crate::ENV_DEBUG,
        }
    }
}
