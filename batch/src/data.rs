//! Flag words and small value types shared by the whole crate

bitflags::bitflags! {
    /// Per object flags of a validation entry, as understood by the kernel
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExecObjectFlags: u64 {
        /// Object needs a fence register
        const NEEDS_FENCE          = 1 << 0;
        /// Object must be bound in the global gtt
        const NEEDS_GTT            = 1 << 1;
        /// The gpu may write to the object during this batch
        const WRITE                = 1 << 2;
        /// Object can live anywhere in the 48 bit address space
        const SUPPORTS_48B_ADDRESS = 1 << 3;
        /// Object lives at a fixed address chosen by userspace
        const PINNED               = 1 << 4;
        /// Pad the object binding out to its size
        const PAD_TO_SIZE          = 1 << 5;
        /// Don't implicitly synchronize with other users of the object
        const ASYNC                = 1 << 6;
        /// Include the object contents in the error state on a hang
        const CAPTURE              = 1 << 7;
    }
}

bitflags::bitflags! {
    /// Submission flags, the engine selector is carried separately in [`Engine`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ExecFlags: u64 {
        /// Addresses in the validation list are final, no relocation pass
        const NO_RELOC    = 1 << 11;
        /// Handles refer to indices into the validation list
        const HANDLE_LUT  = 1 << 12;
        /// The batch buffer is the first, not the last, validation entry
        const BATCH_FIRST = 1 << 18;
        /// The cliprects fields carry an array of fences
        const FENCE_ARRAY = 1 << 19;
    }
}

bitflags::bitflags! {
    /// How a submission uses a fence
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FenceFlags: u32 {
        /// Wait for the fence before starting the batch
        const WAIT   = 1 << 0;
        /// Signal the fence when the batch completes
        const SIGNAL = 1 << 1;
    }
}

bitflags::bitflags! {
    /// Debug output toggles, fixed when a batch is created
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DebugFlags: u32 {
        /// Print flush statistics and the validation and fence lists
        const BATCH  = 1 << 0;
        /// Print flush statistics and lists on every submission
        const SUBMIT = 1 << 1;
        /// Wait for every batch to complete after submitting it
        const SYNC   = 1 << 2;
        /// Use terminal colours in error output
        const COLOR  = 1 << 3;
    }
}

impl DebugFlags {
    /// Name of the environment variable read by [`DebugFlags::from_env`]
    pub const ENV_VAR: &'static str = "BATCH_DEBUG";

    /// Parse a comma separated list such as `"submit,sync"`
    ///
    /// Unknown names are ignored, `all` enables everything
    pub fn parse(s: &str) -> Self {
        let mut flags = Self::empty();
        for name in s.split(|c| c == ',' || c == ':' || c == ' ') {
            match name.trim().to_ascii_lowercase().as_str() {
                "batch" => flags |= Self::BATCH,
                "submit" => flags |= Self::SUBMIT,
                "sync" => flags |= Self::SYNC,
                "color" => flags |= Self::COLOR,
                "all" => flags = Self::all(),
                _ => (),
            }
        }
        flags
    }

    /// Read the flags from `BATCH_DEBUG`, empty if unset
    pub fn from_env() -> Self {
        match std::env::var(Self::ENV_VAR) {
            Ok(s) => Self::parse(&s),
            Err(_) => Self::empty(),
        }
    }
}

/// A hardware engine that a batch is executed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    /// 3d and compute
    Render,
    /// video decode
    Video,
    /// blitter
    Blitter,
    /// video enhancement
    VideoEnhance,
}

impl Engine {
    /// Mask of the engine selector bits in the raw submission flags
    pub const RING_MASK: u64 = 0x3f;

    /// The kernel's ring selector for this engine
    pub fn ring(self) -> u64 {
        match self {
            Self::Render => 1,
            Self::Video => 2,
            Self::Blitter => 3,
            Self::VideoEnhance => 4,
        }
    }
}

/// Scheduling priority of a hardware context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextPriority {
    Low,
    Medium,
    High,
}

impl ContextPriority {
    /// Lowest priority accepted by the kernel for user contexts
    pub const MIN: i32 = -1023;
    /// Highest priority accepted by the kernel for user contexts
    pub const MAX: i32 = 1023;

    pub fn value(self) -> i32 {
        match self {
            Self::Low => Self::MIN / 2,
            Self::Medium => 0,
            Self::High => Self::MAX / 2,
        }
    }
}

/// The batches that a context owns, one per independent command stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchName {
    Render,
    Compute,
}

/// Number of [`BatchName`]s
pub const BATCH_COUNT: usize = 2;

impl BatchName {
    pub const ALL: [BatchName; BATCH_COUNT] = [BatchName::Render, BatchName::Compute];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Compute => "compute",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for BatchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of asking the kernel whether a hardware context saw a gpu reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetStatus {
    /// No reset happened
    NoReset,
    /// A batch from this context was executing, it most likely caused the hang
    Guilty,
    /// A batch from this context was queued but not running
    Innocent,
}

/// Ranges of the gpu address space that buffers are placed in
///
/// Shaders, binding tables and dynamic state are addressed relative to base
/// addresses programmed into the hardware so each gets its own range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemZone {
    Shader,
    Binder,
    Surface,
    Dynamic,
    Other,
}

const GIB_4: u64 = 1 << 32;

impl MemZone {
    pub const ALL: [MemZone; 5] = [
        MemZone::Shader,
        MemZone::Binder,
        MemZone::Surface,
        MemZone::Dynamic,
        MemZone::Other,
    ];

    /// Size of the binding table zone
    pub const BINDER_SIZE: u64 = 64 * 1024;

    pub fn start(self) -> u64 {
        match self {
            Self::Shader => 0,
            Self::Binder => GIB_4,
            Self::Surface => GIB_4 + Self::BINDER_SIZE,
            Self::Dynamic => 2 * GIB_4,
            Self::Other => 3 * GIB_4,
        }
    }

    /// One past the last address of the zone
    pub fn end(self) -> u64 {
        match self {
            Self::Shader => Self::Binder.start(),
            Self::Binder => Self::Surface.start(),
            Self::Surface => Self::Dynamic.start(),
            Self::Dynamic => Self::Other.start(),
            Self::Other => 1 << 48,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}
