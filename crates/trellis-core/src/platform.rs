//! Platform abstraction for runtime scheduling.
//!
//! The runtime never spins on its own: whenever work lands on one of its
//! queues it asks the host, through this trait, to arrange a future call to
//! the flush entry points. Hosts with an event loop wire this into their
//! wake-up mechanism; tests drive the flushes by hand.

/// Schedules flush work for the Trellis runtime.
///
/// Implementations must be safe to invoke from multiple threads even though
/// the runtime itself is single-threaded; a wake-up may originate from a
/// host-owned thread.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host call back into the runtime's flush entry points.
    fn schedule_flush(&self);
}

/// Scheduler that does nothing; the embedder drains the runtime manually.
#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_flush(&self) {}
}
