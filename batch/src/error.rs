/// Why the kernel refused a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The hardware context was banned after a gpu reset (EIO)
    /// Can be recovered from by replacing the context
    ContextLost,
    /// Any other errno returned by the submission call
    Errno(i32),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContextLost => write!(f, "hardware context lost (EIO)"),
            Self::Errno(e) => write!(f, "errno {}", e),
        }
    }
}

impl std::error::Error for SubmitError {}

/// An all encompassing error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A kernel call other than submission failed
    Kernel {
        /// name of the call
        op: &'static str,
        /// errno returned
        errno: i32,
    },
    /// Submitting a batch failed for a reason other than a lost context
    /// Cannot be recovered from, the command stream is gone
    Submit(SubmitError),
    /// A banned hardware context could not be replaced
    /// Cannot be recovered from
    ContextReplace(i32),
    /// A batch can only chain to a second buffer once per submission
    AlreadyChained,
    /// A single request for command space larger than a whole batch
    OutOfSpace {
        /// bytes requested
        requested: usize,
        /// usable bytes in one batch buffer
        capacity: usize,
    },
    /// The batch size must be a non zero multiple of 8 bytes
    InvalidBatchSize(usize),
    /// No address space left in a memory zone
    ZoneExhausted(crate::MemZone),
}

impl Error {
    /// Fatal errors leave nothing sensible to retry, the owner should stop submitting
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Submit(_) | Self::ContextReplace(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kernel { op, errno } => write!(f, "kernel call {} failed with errno {}", op, errno),
            Self::Submit(e) => write!(f, "Failed to submit batchbuffer: {}", e),
            Self::ContextReplace(e) => write!(f, "Failed to replace hardware context: errno {}", e),
            Self::AlreadyChained => write!(f, "batch has already chained to a second buffer"),
            Self::OutOfSpace { requested, capacity } => write!(
                f,
                "requested {} bytes of command space, a batch only holds {}",
                requested, capacity
            ),
            Self::InvalidBatchSize(s) => write!(f, "invalid batch size {}", s),
            Self::ZoneExhausted(z) => write!(f, "memory zone {:?} is out of address space", z),
        }
    }
}

impl std::error::Error for Error {}

impl From<SubmitError> for Error {
    fn from(e: SubmitError) -> Self {
        Self::Submit(e)
    }
}
