//! [`Batch`]es accumulate gpu commands and submit them to the kernel

mod batch;
pub mod dump;
pub mod set;
pub(crate) mod raw;
pub(crate) mod validation;

pub use batch::*;
pub use dump::*;
pub use set::*;
pub use raw::{
    MI_BATCH_BUFFER_END, MI_BATCH_BUFFER_START, MI_BATCH_BUFFER_START_LEN, BATCH_LEN_ALIGN,
};

pub(crate) use validation::*;
