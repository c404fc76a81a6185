//! Per-mount component state: props, inherited context, lifecycle hooks and
//! coalesced re-render scheduling.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use trellis_core::collections::map::HashMap;
use trellis_core::runtime::{RuntimeHandle, TaskError};

use crate::node::Props;
use crate::RenderError;

/// Read-only inherited scope chain. A component writes into its own layer
/// through [`Context::set`]; lookups walk toward the root, so descendants
/// see ancestor entries unless shadowed.
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

struct ContextInner {
    parent: Option<Context>,
    entries: RefCell<HashMap<Rc<str>, Rc<dyn Any>>>,
}

impl Context {
    pub fn root() -> Self {
        Self {
            inner: Rc::new(ContextInner {
                parent: None,
                entries: RefCell::new(HashMap::default()),
            }),
        }
    }

    /// Derives the scope handed to a component's subtree.
    pub fn child(&self) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                parent: Some(self.clone()),
                entries: RefCell::new(HashMap::default()),
            }),
        }
    }

    pub fn set(&self, name: impl Into<Rc<str>>, value: Rc<dyn Any>) {
        self.inner.entries.borrow_mut().insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Any>> {
        let mut scope = Some(self.clone());
        while let Some(current) = scope {
            if let Some(value) = current.inner.entries.borrow().get(name) {
                return Some(value.clone());
            }
            scope = current.inner.parent.clone();
        }
        None
    }

    pub fn get_as<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.get(name).and_then(|value| value.downcast::<T>().ok())
    }
}

/// Lifecycle phases a component can hook into. The error channel is
/// separate ([`Instance::on_error`]) because its callbacks take a payload.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LifecycleEvent {
    Mount,
    Mounted,
    Update,
    Updated,
    Unmount,
    Unmounted,
}

const PHASE_COUNT: usize = 6;

impl LifecycleEvent {
    fn index(self) -> usize {
        match self {
            LifecycleEvent::Mount => 0,
            LifecycleEvent::Mounted => 1,
            LifecycleEvent::Update => 2,
            LifecycleEvent::Updated => 3,
            LifecycleEvent::Unmount => 4,
            LifecycleEvent::Unmounted => 5,
        }
    }
}

struct PhaseHook {
    id: u64,
    callback: Rc<dyn Fn()>,
}

struct ErrorHook {
    id: u64,
    callback: Rc<dyn Fn(&RenderError)>,
}

enum HookSlot {
    Phase(usize),
    Error,
}

/// De-registration capability returned by [`Instance::on`] /
/// [`Instance::on_error`].
pub struct HookRegistration {
    owner: Weak<InstanceInner>,
    slot: HookSlot,
    id: u64,
}

impl HookRegistration {
    pub fn unsubscribe(self) {
        let Some(owner) = self.owner.upgrade() else {
            return;
        };
        match self.slot {
            HookSlot::Phase(index) => {
                owner.phases[index]
                    .borrow_mut()
                    .retain(|hook| hook.id != self.id);
            }
            HookSlot::Error => {
                owner
                    .error_hooks
                    .borrow_mut()
                    .retain(|hook| hook.id != self.id);
            }
        }
    }
}

pub(crate) type Rerender = Rc<dyn Fn() -> Result<(), RenderError>>;

pub(crate) struct InstanceInner {
    props: RefCell<Props>,
    context: Context,
    runtime: RuntimeHandle,
    phases: [RefCell<Vec<PhaseHook>>; PHASE_COUNT],
    error_hooks: RefCell<Vec<ErrorHook>>,
    next_hook_id: Cell<u64>,
    dirty: Cell<bool>,
    released: Cell<bool>,
    rerender: RefCell<Option<Rerender>>,
}

impl InstanceInner {
    pub(crate) fn fire(&self, event: LifecycleEvent) {
        // Snapshot first so a hook may (un)register without aliasing.
        let hooks: SmallVec<[Rc<dyn Fn()>; 4]> = self.phases[event.index()]
            .borrow()
            .iter()
            .map(|hook| hook.callback.clone())
            .collect();
        for hook in hooks {
            hook();
        }
    }

    /// Delivers `err` to every error hook; `false` means nobody handled it
    /// and the caller must propagate.
    pub(crate) fn deliver_error(&self, err: &RenderError) -> bool {
        let hooks: SmallVec<[Rc<dyn Fn(&RenderError)>; 2]> = self
            .error_hooks
            .borrow()
            .iter()
            .map(|hook| hook.callback.clone())
            .collect();
        if hooks.is_empty() {
            return false;
        }
        for hook in hooks {
            hook(err);
        }
        true
    }

    pub(crate) fn props_snapshot(&self) -> Props {
        self.props.borrow().clone()
    }

    pub(crate) fn set_props(&self, props: Props) {
        *self.props.borrow_mut() = props;
    }

    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    pub(crate) fn install_rerender(&self, rerender: Rerender) {
        *self.rerender.borrow_mut() = Some(rerender);
    }

    /// Unmount teardown: hooks cleared, pending flushes turned into no-ops.
    pub(crate) fn release(&self) {
        self.released.set(true);
        self.dirty.set(false);
        for phase in &self.phases {
            phase.borrow_mut().clear();
        }
        self.error_hooks.borrow_mut().clear();
        *self.rerender.borrow_mut() = None;
    }
}

/// Handle to a mounted component's state bag. Component functions receive
/// `&Instance` at mount; the reconciler keeps one alive per mount.
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

impl Instance {
    pub fn new(props: Props, context: Context, runtime: RuntimeHandle) -> Self {
        Self {
            inner: Rc::new(InstanceInner {
                props: RefCell::new(props),
                context,
                runtime,
                phases: std::array::from_fn(|_| RefCell::new(Vec::new())),
                error_hooks: RefCell::new(Vec::new()),
                next_hook_id: Cell::new(1),
                dirty: Cell::new(false),
                released: Cell::new(false),
                rerender: RefCell::new(None),
            }),
        }
    }

    pub fn props(&self) -> Props {
        self.inner.props_snapshot()
    }

    pub fn context(&self) -> &Context {
        self.inner.context()
    }

    pub fn on(&self, event: LifecycleEvent, hook: impl Fn() + 'static) -> HookRegistration {
        let id = self.allocate_hook_id();
        self.inner.phases[event.index()].borrow_mut().push(PhaseHook {
            id,
            callback: Rc::new(hook),
        });
        HookRegistration {
            owner: Rc::downgrade(&self.inner),
            slot: HookSlot::Phase(event.index()),
            id,
        }
    }

    pub fn on_error(&self, hook: impl Fn(&RenderError) + 'static) -> HookRegistration {
        let id = self.allocate_hook_id();
        self.inner.error_hooks.borrow_mut().push(ErrorHook {
            id,
            callback: Rc::new(hook),
        });
        HookRegistration {
            owner: Rc::downgrade(&self.inner),
            slot: HookSlot::Error,
            id,
        }
    }

    /// Marks the instance dirty and schedules one coalescing re-render on
    /// the macrotask queue; `immediate` (if any) runs earlier, on the
    /// microtask queue. Any number of calls before the flush collapse into
    /// a single re-render.
    pub fn update(&self, immediate: Option<Box<dyn FnOnce()>>) {
        if self.inner.released.get() {
            return;
        }
        self.inner.dirty.set(true);
        if let Some(task) = immediate {
            self.inner.runtime.enqueue_micro(task);
        }
        let weak = Rc::downgrade(&self.inner);
        self.inner.runtime.enqueue_macro_fallible(move || {
            let Some(inner) = weak.upgrade() else {
                return Ok(());
            };
            if inner.released.get() || !inner.dirty.replace(false) {
                return Ok(());
            }
            let rerender = inner.rerender.borrow().clone();
            match rerender {
                Some(rerender) => rerender().map_err(|err| Box::new(err) as TaskError),
                None => Ok(()),
            }
        });
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    fn allocate_hook_id(&self) -> u64 {
        let id = self.inner.next_hook_id.get();
        self.inner.next_hook_id.set(id + 1);
        id
    }

    pub(crate) fn inner(&self) -> &Rc<InstanceInner> {
        &self.inner
    }
}
