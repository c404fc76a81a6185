//! Test support for the trellis crates: an in-memory [`MemoryHost`]
//! adapter with a recorded operation log, and a [`ManualScheduler`] for
//! driving the runtime by hand.

pub mod memory_host;
pub mod scheduler;

pub use memory_host::{HostOp, MemNode, MemState, MemoryHost};
pub use scheduler::ManualScheduler;

/// One-stop imports for reconciler tests.
pub mod prelude {
    pub use crate::{HostOp, MemNode, MemState, MemoryHost, ManualScheduler};
}
