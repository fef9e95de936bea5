//! Gpu command batch submission
//!
//! Every draw or dispatch turns into gpu commands which are collected in a
//! [`Batch`]. Together with the commands a batch keeps the validation list:
//! every buffer object the commands reference. The kernel makes sure the
//! buffers in the list are resident at their pinned addresses before it runs
//! the batch, a buffer missing from the list effectively doesn't exist.
//!
//! A context usually owns one batch per command stream (see [`BatchSet`]).
//! When two batches reference the same buffer and either writes it the other
//! batch is flushed and waited on, so the streams never race.

pub mod error;
pub mod data;
pub mod desc;
pub mod buffer;
pub mod device;
pub mod sync;
pub mod command;
pub mod utils;

pub use error::*;
pub use data::*;
pub use desc::*;
pub use buffer::*;
pub use device::*;
pub use sync::*;
pub use command::*;

lazy_static::lazy_static! {
    /// Debug flags from the environment, read once and only used as the
    /// default for new batches
    pub(crate) static ref ENV_DEBUG: DebugFlags = DebugFlags::from_env();
}
