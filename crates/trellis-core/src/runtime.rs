//! Cooperative two-tier task runtime.
//!
//! Single-threaded, event-loop-style scheduling with two deferred tiers: a
//! microtask queue that drains to empty at every checkpoint, and a macrotask
//! queue whose entries each run with a microtask checkpoint after them. This
//! mirrors the browser-style ordering the reactive layer depends on: `pre`
//! effects observe every write made before the next microtask checkpoint,
//! `post` effects and coalesced re-renders batch across a full macrotask
//! turn.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::platform::RuntimeScheduler;

/// Error surfaced by a queued task; aborts the flush that ran it.
pub type TaskError = Box<dyn std::error::Error + 'static>;

type Task = Box<dyn FnOnce() -> Result<(), TaskError> + 'static>;

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    micro_tasks: RefCell<VecDeque<Task>>,
    macro_tasks: RefCell<VecDeque<Task>>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            micro_tasks: RefCell::new(VecDeque::new()),
            macro_tasks: RefCell::new(VecDeque::new()),
        }
    }

    fn enqueue_micro(&self, task: Task) {
        self.micro_tasks.borrow_mut().push_back(task);
        self.scheduler.schedule_flush();
    }

    fn enqueue_macro(&self, task: Task) {
        self.macro_tasks.borrow_mut().push_back(task);
        self.scheduler.schedule_flush();
    }

    fn pop_micro(&self) -> Option<Task> {
        self.micro_tasks.borrow_mut().pop_front()
    }

    fn pop_macro(&self) -> Option<Task> {
        self.macro_tasks.borrow_mut().pop_front()
    }

    fn has_pending(&self) -> bool {
        !self.micro_tasks.borrow().is_empty() || !self.macro_tasks.borrow().is_empty()
    }
}

/// Owner of the task queues. Embedders hold the `Runtime` and call the flush
/// entry points when their scheduler fires; everything else talks to it
/// through [`RuntimeHandle`].
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Drains the microtask queue to empty. Tasks enqueued while draining run
    /// within the same checkpoint. The first task error aborts the flush and
    /// is returned; remaining tasks stay queued.
    pub fn flush_microtasks(&self) -> Result<(), TaskError> {
        while let Some(task) = self.inner.pop_micro() {
            task()?;
        }
        Ok(())
    }

    /// Runs a microtask checkpoint, then pops macrotasks one at a time with a
    /// microtask checkpoint after each.
    pub fn flush_macrotasks(&self) -> Result<(), TaskError> {
        self.flush_microtasks()?;
        while let Some(task) = self.inner.pop_macro() {
            task()?;
            self.flush_microtasks()?;
        }
        Ok(())
    }

    /// Loops until both queues are empty.
    pub fn run_until_idle(&self) -> Result<(), TaskError> {
        while self.inner.has_pending() {
            self.flush_macrotasks()?;
        }
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        self.inner.has_pending()
    }
}

/// Weak clone of the runtime. Enqueuing through a handle whose runtime has
/// been dropped is a silent no-op, matching the liveness rule that a
/// scheduled flush must not outlive its owner.
#[derive(Clone)]
pub struct RuntimeHandle {
    inner: Weak<RuntimeInner>,
}

impl RuntimeHandle {
    pub fn enqueue_micro(&self, task: impl FnOnce() + 'static) {
        self.enqueue_micro_fallible(move || {
            task();
            Ok(())
        });
    }

    pub fn enqueue_macro(&self, task: impl FnOnce() + 'static) {
        self.enqueue_macro_fallible(move || {
            task();
            Ok(())
        });
    }

    pub fn enqueue_micro_fallible(
        &self,
        task: impl FnOnce() -> Result<(), TaskError> + 'static,
    ) {
        match self.inner.upgrade() {
            Some(inner) => inner.enqueue_micro(Box::new(task)),
            None => log::trace!("microtask enqueued on a dropped runtime; ignored"),
        }
    }

    pub fn enqueue_macro_fallible(
        &self,
        task: impl FnOnce() -> Result<(), TaskError> + 'static,
    ) {
        match self.inner.upgrade() {
            Some(inner) => inner.enqueue_macro(Box::new(task)),
            None => log::trace!("macrotask enqueued on a dropped runtime; ignored"),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.has_pending())
            .unwrap_or(false)
    }
}
