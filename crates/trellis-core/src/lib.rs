//! Reactive core for the trellis tree renderer.
//!
//! Hosts the pieces that have no opinion about what a tree node looks like:
//! the two-tier task [`runtime`], the [`reactive`] dependency graph, and the
//! [`platform`] scheduler seam that tells an embedder when queued work exists.

pub mod collections;
pub mod platform;
pub mod reactive;
pub mod runtime;

pub use platform::{DefaultScheduler, RuntimeScheduler};
pub use reactive::{Cleanup, Computed, Effect, EvalError, Flush, Graph, State};
pub use runtime::{Runtime, RuntimeHandle, TaskError};
