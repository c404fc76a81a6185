//! Fine-grained reactive dependency graph: State, Computed, Effect.
//!
//! A [`Graph`] owns the "currently evaluating" observer stack, so dependency
//! capture is per-graph state threaded through cell handles rather than a
//! hidden global. Two graphs never observe each other and a graph can be
//! constructed per test.
//!
//! Dependency flow is pull-based: writes bump a version counter and poke
//! subscribed effects; derived values re-check their captured versions on
//! read and only then recompute. Effects are the only entities that must be
//! explicitly released via [`Effect::revoke`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::collections::map::HashMap;
use crate::runtime::RuntimeHandle;

/// Identifier for a cell (state, computed, or effect) within its graph.
pub type CellId = u64;

/// Teardown callback returned by an effect body; runs before the next
/// execution and on revoke.
pub type Cleanup = Box<dyn FnOnce()>;

/// When a triggered effect actually executes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flush {
    /// Inline, before the triggering write returns.
    Sync,
    /// On the next microtask checkpoint; multiple triggers coalesce.
    Pre,
    /// On the next macrotask turn; multiple triggers coalesce.
    Post,
}

/// Error produced by a fallible computed evaluation.
///
/// Cloneable so the same failure can travel to several readers; the
/// originating computed rolls its dependency state back, so later reads
/// re-evaluate only once a previously-good dependency actually changes.
#[derive(Clone)]
pub struct EvalError {
    inner: Rc<ErrorRepr>,
}

struct ErrorRepr {
    message: String,
    source: Option<Box<dyn std::error::Error + 'static>>,
}

impl EvalError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(ErrorRepr {
                message: message.into(),
                source: None,
            }),
        }
    }

    pub fn caused_by(
        message: impl Into<String>,
        source: impl std::error::Error + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(ErrorRepr {
                message: message.into(),
                source: Some(Box::new(source)),
            }),
        }
    }

    pub fn message(&self) -> &str {
        &self.inner.message
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.message)
    }
}

impl fmt::Debug for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalError")
            .field("message", &self.inner.message)
            .finish()
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source.as_deref()
    }
}

/// Type-erased view of a state cell as seen by dependents.
trait Source {
    fn cell_id(&self) -> CellId;
    fn version(&self) -> u64;
    fn link_effect(&self, effect: &Rc<EffectInner>);
    fn unlink_effect(&self, effect: CellId);
}

/// Type-erased view of a computed cell as seen by dependents.
trait DerivedCell {
    fn version(&self) -> u64;
    fn is_dirty(&self) -> bool;
    fn record_state(&self, source: Rc<dyn Source>, seen: u64);
    fn record_computed(&self, source: Rc<dyn DerivedCell>, seen: u64);
    /// Subscribe `effect` to every state reachable through this computed's
    /// captured dependency set, recursing through nested computeds.
    fn link_transitive(&self, effect: &Rc<EffectInner>);
}

enum Frame {
    Computed(Rc<dyn DerivedCell>),
    Effect(Rc<EffectInner>),
}

struct GraphInner {
    runtime: RuntimeHandle,
    frames: RefCell<Vec<Frame>>,
    next_cell_id: Cell<CellId>,
}

impl GraphInner {
    fn allocate_id(&self) -> CellId {
        let id = self.next_cell_id.get();
        self.next_cell_id.set(id + 1);
        id
    }

    fn push_frame(&self, frame: Frame) {
        self.frames.borrow_mut().push(frame);
    }

    fn pop_frame(&self) {
        self.frames.borrow_mut().pop();
    }

    /// Innermost computed currently evaluating, if any.
    fn nearest_computed(&self) -> Option<Rc<dyn DerivedCell>> {
        self.frames.borrow().iter().rev().find_map(|frame| match frame {
            Frame::Computed(computed) => Some(computed.clone()),
            Frame::Effect(_) => None,
        })
    }

    /// Innermost effect on the stack; computed evaluations nested under an
    /// effect still link the states they read to that effect.
    fn nearest_effect(&self) -> Option<Rc<EffectInner>> {
        self.frames.borrow().iter().rev().find_map(|frame| match frame {
            Frame::Effect(effect) => Some(effect.clone()),
            Frame::Computed(_) => None,
        })
    }

    fn record_state_read(&self, source: &Rc<dyn Source>) {
        if let Some(sink) = self.nearest_computed() {
            sink.record_state(source.clone(), source.version());
        }
        if let Some(effect) = self.nearest_effect() {
            link_state_effect(source, &effect);
        }
    }
}

fn link_state_effect(source: &Rc<dyn Source>, effect: &Rc<EffectInner>) {
    source.link_effect(effect);
    effect
        .subscriptions
        .borrow_mut()
        .insert(source.cell_id(), source.clone());
}

/// Handle to a reactive graph; cells created from the same graph share one
/// observer stack and one runtime for deferred flushes.
#[derive(Clone)]
pub struct Graph {
    inner: Rc<GraphInner>,
}

impl Graph {
    pub fn new(runtime: RuntimeHandle) -> Self {
        Self {
            inner: Rc::new(GraphInner {
                runtime,
                frames: RefCell::new(Vec::new()),
                next_cell_id: Cell::new(1),
            }),
        }
    }

    pub fn state<T: 'static>(&self, value: T) -> State<T> {
        State {
            inner: Rc::new(StateInner {
                id: self.inner.allocate_id(),
                graph: self.clone(),
                value: RefCell::new(value),
                version: Cell::new(0),
                effects: RefCell::new(HashMap::default()),
            }),
        }
    }

    pub fn computed<T, F>(&self, func: F) -> Computed<T>
    where
        T: PartialEq + Clone + 'static,
        F: Fn() -> T + 'static,
    {
        self.computed_fallible(move || Ok(func()))
    }

    pub fn computed_fallible<T, F>(&self, func: F) -> Computed<T>
    where
        T: PartialEq + Clone + 'static,
        F: Fn() -> Result<T, EvalError> + 'static,
    {
        Computed {
            inner: Rc::new(ComputedInner {
                graph: self.clone(),
                func: Box::new(func),
                cache: RefCell::new(None),
                version: Cell::new(0),
                dirty: Cell::new(true),
                states: RefCell::new(HashMap::default()),
                computeds: RefCell::new(HashMap::default()),
            }),
        }
    }

    /// Creates an effect and runs it eagerly to discover its dependencies.
    pub fn effect<F>(&self, flush: Flush, func: F) -> Effect
    where
        F: FnMut() -> Option<Cleanup> + 'static,
    {
        let inner = Rc::new(EffectInner {
            id: self.inner.allocate_id(),
            graph: self.clone(),
            func: RefCell::new(Box::new(func)),
            cleanup: RefCell::new(None),
            flush,
            subscriptions: RefCell::new(HashMap::default()),
            scheduled: Cell::new(false),
            revoked: Cell::new(false),
        });
        inner.execute();
        Effect { inner }
    }
}

struct StateInner<T> {
    id: CellId,
    graph: Graph,
    value: RefCell<T>,
    version: Cell<u64>,
    effects: RefCell<HashMap<CellId, Weak<EffectInner>>>,
}

impl<T: 'static> StateInner<T> {
    fn notify(&self) {
        let mut subscribers: SmallVec<[Rc<EffectInner>; 4]> = SmallVec::new();
        self.effects.borrow_mut().retain(|_, weak| match weak.upgrade() {
            Some(effect) => {
                subscribers.push(effect);
                true
            }
            None => false,
        });
        for effect in subscribers {
            effect.run();
        }
    }
}

impl<T: 'static> Source for StateInner<T> {
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn version(&self) -> u64 {
        self.version.get()
    }

    fn link_effect(&self, effect: &Rc<EffectInner>) {
        self.effects
            .borrow_mut()
            .insert(effect.id, Rc::downgrade(effect));
    }

    fn unlink_effect(&self, effect: CellId) {
        self.effects.borrow_mut().remove(&effect);
    }
}

/// Mutable observable cell.
pub struct State<T: 'static> {
    inner: Rc<StateInner<T>>,
}

impl<T: 'static> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> State<T> {
    /// Tracked read: records this cell into the currently evaluating
    /// computed's dependency map and subscribes the currently running effect.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        let source: Rc<dyn Source> = self.inner.clone();
        self.inner.graph.inner.record_state_read(&source);
        self.inner.value.borrow().clone()
    }

    /// Writes the cell. Writing a value equal to the current one is a no-op:
    /// no version bump, zero effect runs.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        if *self.inner.value.borrow() == value {
            return;
        }
        *self.inner.value.borrow_mut() = value;
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.notify();
    }

    pub fn update(&self, f: impl FnOnce(&T) -> T)
    where
        T: Clone + PartialEq,
    {
        // Drop the borrow before calling `f` so it may write through
        // another handle to this cell.
        let current = self.inner.value.borrow().clone();
        self.set(f(&current));
    }
}

struct StateDep {
    source: Rc<dyn Source>,
    seen: u64,
}

struct ComputedDep {
    source: Rc<dyn DerivedCell>,
    seen: u64,
}

struct ComputedInner<T> {
    graph: Graph,
    func: Box<dyn Fn() -> Result<T, EvalError>>,
    cache: RefCell<Option<T>>,
    version: Cell<u64>,
    dirty: Cell<bool>,
    states: RefCell<HashMap<CellId, StateDep>>,
    computeds: RefCell<HashMap<CellId, ComputedDep>>,
}

impl<T: PartialEq + 'static> ComputedInner<T> {
    fn evaluate(self: &Rc<Self>) -> Result<(), EvalError> {
        let prior_states = self.states.replace(HashMap::default());
        let prior_computeds = self.computeds.replace(HashMap::default());
        let sink: Rc<dyn DerivedCell> = self.clone();
        self.graph.inner.push_frame(Frame::Computed(sink));
        let result = (self.func)();
        self.graph.inner.pop_frame();
        match result {
            Ok(value) => {
                // Value-stable recomputation keeps the version so ancestors
                // that captured it stay clean.
                let changed = self.cache.borrow().as_ref() != Some(&value);
                if changed {
                    self.version.set(self.version.get() + 1);
                    *self.cache.borrow_mut() = Some(value);
                }
                self.dirty.set(false);
                Ok(())
            }
            Err(err) => {
                // Roll back to the pre-evaluation capture: the next read
                // re-evaluates only when a previously-good dependency moved.
                *self.states.borrow_mut() = prior_states;
                *self.computeds.borrow_mut() = prior_computeds;
                self.dirty.set(self.cache.borrow().is_none());
                Err(err)
            }
        }
    }

    /// Makes this computed's dependency set visible to whoever is currently
    /// evaluating, without re-running the function.
    fn propagate(self: &Rc<Self>) {
        if let Some(sink) = self.graph.inner.nearest_computed() {
            let source: Rc<dyn DerivedCell> = self.clone();
            sink.record_computed(source, self.version.get());
        }
        if let Some(effect) = self.graph.inner.nearest_effect() {
            self.link_transitive(&effect);
        }
    }
}

impl<T: 'static> DerivedCell for ComputedInner<T> {
    fn version(&self) -> u64 {
        self.version.get()
    }

    fn is_dirty(&self) -> bool {
        if self.dirty.get() {
            return true;
        }
        if self.cache.borrow().is_none() {
            return true;
        }
        for dep in self.states.borrow().values() {
            if dep.source.version() != dep.seen {
                return true;
            }
        }
        for dep in self.computeds.borrow().values() {
            if dep.source.is_dirty() || dep.source.version() != dep.seen {
                return true;
            }
        }
        false
    }

    fn record_state(&self, source: Rc<dyn Source>, seen: u64) {
        self.states
            .borrow_mut()
            .insert(source.cell_id(), StateDep { source, seen });
    }

    fn record_computed(&self, source: Rc<dyn DerivedCell>, seen: u64) {
        let key = Rc::as_ptr(&source) as *const () as u64;
        self.computeds
            .borrow_mut()
            .insert(key, ComputedDep { source, seen });
    }

    fn link_transitive(&self, effect: &Rc<EffectInner>) {
        for dep in self.states.borrow().values() {
            link_state_effect(&dep.source, effect);
        }
        for dep in self.computeds.borrow().values() {
            dep.source.link_transitive(effect);
        }
    }
}

/// Lazy derived cell: recomputes on read only when a captured dependency
/// changed since the last evaluation.
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: PartialEq + Clone + 'static> Computed<T> {
    pub fn get(&self) -> Result<T, EvalError> {
        if !self.inner.is_dirty() {
            self.inner.propagate();
            return Ok(self
                .inner
                .cache
                .borrow()
                .clone()
                .expect("clean computed holds a cached value"));
        }
        self.inner.evaluate()?;
        self.inner.propagate();
        Ok(self
            .inner
            .cache
            .borrow()
            .clone()
            .expect("evaluated computed holds a cached value"))
    }
}

pub(crate) struct EffectInner {
    id: CellId,
    graph: Graph,
    func: RefCell<Box<dyn FnMut() -> Option<Cleanup>>>,
    cleanup: RefCell<Option<Cleanup>>,
    flush: Flush,
    subscriptions: RefCell<HashMap<CellId, Rc<dyn Source>>>,
    scheduled: Cell<bool>,
    revoked: Cell<bool>,
}

impl EffectInner {
    /// Re-runs the body, deriving the subscription set from scratch so a
    /// dependency read behind a flipped branch is dropped cleanly.
    fn execute(self: &Rc<Self>) {
        if self.revoked.get() {
            return;
        }
        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            cleanup();
        }
        self.clear_subscriptions();
        self.graph.inner.push_frame(Frame::Effect(self.clone()));
        let cleanup = {
            let mut func = self.func.borrow_mut();
            (&mut **func)()
        };
        self.graph.inner.pop_frame();
        *self.cleanup.borrow_mut() = cleanup;
    }

    fn run(self: &Rc<Self>) {
        if self.revoked.get() {
            return;
        }
        match self.flush {
            Flush::Sync => self.execute(),
            Flush::Pre | Flush::Post => {
                if self.scheduled.replace(true) {
                    return;
                }
                let weak = Rc::downgrade(self);
                let task = move || {
                    if let Some(effect) = weak.upgrade() {
                        effect.scheduled.set(false);
                        effect.execute();
                    }
                };
                match self.flush {
                    Flush::Pre => self.graph.inner.runtime.enqueue_micro(task),
                    _ => self.graph.inner.runtime.enqueue_macro(task),
                }
            }
        }
    }

    fn clear_subscriptions(&self) {
        let sources: Vec<Rc<dyn Source>> = self
            .subscriptions
            .borrow_mut()
            .drain()
            .map(|(_, source)| source)
            .collect();
        for source in sources {
            source.unlink_effect(self.id);
        }
    }

    fn revoke(&self) {
        if self.revoked.replace(true) {
            return;
        }
        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            cleanup();
        }
        self.clear_subscriptions();
    }
}

/// Eager side-effecting subscriber. Must be revoked to release its
/// state subscriptions; a revoked effect's pending flush no-ops.
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    pub fn revoke(&self) {
        self.inner.revoke();
    }

    pub fn is_revoked(&self) -> bool {
        self.inner.revoked.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DefaultScheduler;
    use crate::runtime::Runtime;
    use std::sync::Arc;

    fn setup() -> (Runtime, Graph) {
        let runtime = Runtime::new(Arc::new(DefaultScheduler));
        let graph = Graph::new(runtime.handle());
        (runtime, graph)
    }

    #[test]
    fn computed_is_lazy() {
        let (_rt, graph) = setup();
        let count = Rc::new(Cell::new(0));
        let state = graph.state(21);

        let evals = count.clone();
        let s = state.clone();
        let doubled = graph.computed(move || {
            evals.set(evals.get() + 1);
            s.get() * 2
        });

        assert_eq!(doubled.get().unwrap(), 42);
        assert_eq!(doubled.get().unwrap(), 42);
        assert_eq!(doubled.get().unwrap(), 42);
        assert_eq!(count.get(), 1);

        state.set(30);
        assert_eq!(doubled.get().unwrap(), 60);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn update_tolerates_a_nested_write_to_the_same_cell() {
        let (_rt, graph) = setup();
        let state = graph.state(1);

        let s = state.clone();
        state.update(move |value| {
            // A write through another handle mid-update must not trip the
            // cell's interior borrow; the update's own result lands last.
            s.set(*value + 10);
            value * 2
        });
        assert_eq!(state.get(), 2);
    }

    #[test]
    fn equal_write_is_a_no_op() {
        let (_rt, graph) = setup();
        let state = graph.state(7);
        let runs = Rc::new(Cell::new(0));

        let counter = runs.clone();
        let s = state.clone();
        let effect = graph.effect(Flush::Sync, move || {
            s.get();
            counter.set(counter.get() + 1);
            None
        });
        assert_eq!(runs.get(), 1);

        state.set(7);
        assert_eq!(runs.get(), 1);

        state.set(8);
        assert_eq!(runs.get(), 2);
        effect.revoke();
    }

    #[test]
    fn equal_write_keeps_computed_clean() {
        let (_rt, graph) = setup();
        let state = graph.state(5);
        let evals = Rc::new(Cell::new(0));

        let count = evals.clone();
        let s = state.clone();
        let derived = graph.computed(move || {
            count.set(count.get() + 1);
            s.get() + 1
        });

        assert_eq!(derived.get().unwrap(), 6);
        state.set(5);
        assert_eq!(derived.get().unwrap(), 6);
        assert_eq!(evals.get(), 1);
    }

    #[test]
    fn pre_effect_batches_writes_into_one_run() {
        let (rt, graph) = setup();
        let state = graph.state(0);
        let runs = Rc::new(Cell::new(0));

        let counter = runs.clone();
        let s = state.clone();
        let effect = graph.effect(Flush::Pre, move || {
            s.get();
            counter.set(counter.get() + 1);
            None
        });
        assert_eq!(runs.get(), 1);

        state.set(1);
        state.set(2);
        state.set(3);
        assert_eq!(runs.get(), 1, "deferred effect must not run inline");

        rt.flush_microtasks().unwrap();
        assert_eq!(runs.get(), 2, "three writes coalesce into one run");
        assert_eq!(state.get(), 3);
        effect.revoke();
    }

    #[test]
    fn effect_resubscribes_across_branch_flip() {
        let (_rt, graph) = setup();
        let use_left = graph.state(true);
        let left = graph.state(1);
        let right = graph.state(10);
        let runs = Rc::new(Cell::new(0));

        let counter = runs.clone();
        let (flag, a, b) = (use_left.clone(), left.clone(), right.clone());
        let effect = graph.effect(Flush::Sync, move || {
            if flag.get() {
                a.get();
            } else {
                b.get();
            }
            counter.set(counter.get() + 1);
            None
        });
        assert_eq!(runs.get(), 1);

        // Subscribed to flag + left only.
        right.set(11);
        assert_eq!(runs.get(), 1);

        use_left.set(false);
        assert_eq!(runs.get(), 2);

        // After the flip the stale `left` subscription must be gone.
        left.set(2);
        assert_eq!(runs.get(), 2);
        right.set(12);
        assert_eq!(runs.get(), 3);
        effect.revoke();
    }

    #[test]
    fn effect_subscribes_through_computed() {
        let (_rt, graph) = setup();
        let state = graph.state(2);
        let s = state.clone();
        let squared = graph.computed(move || s.get() * s.get());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        let sq = squared.clone();
        let effect = graph.effect(Flush::Sync, move || {
            log.borrow_mut().push(sq.get().unwrap());
            None
        });
        assert_eq!(*seen.borrow(), vec![4]);

        state.set(3);
        assert_eq!(*seen.borrow(), vec![4, 9]);
        effect.revoke();
    }

    #[test]
    fn failed_computed_rolls_back_dependencies() {
        let (_rt, graph) = setup();
        let state = graph.state(2);
        let poison = Rc::new(Cell::new(false));

        let s = state.clone();
        let fail = poison.clone();
        let derived = graph.computed_fallible(move || {
            let value = s.get();
            if fail.get() {
                return Err(EvalError::msg("poisoned"));
            }
            Ok(value * 10)
        });

        assert_eq!(derived.get().unwrap(), 20);

        // The poison flag is untracked; with dependencies unchanged the
        // computed must serve its last good value without re-running.
        poison.set(true);
        assert_eq!(derived.get().unwrap(), 20);

        // A real dependency change re-evaluates and surfaces the error.
        state.set(3);
        assert!(derived.get().is_err());

        // Rollback kept the old capture: the next read re-evaluates again
        // (the dependency is still ahead of the captured version).
        poison.set(false);
        assert_eq!(derived.get().unwrap(), 30);
    }

    #[test]
    fn nested_computed_settles_after_stable_recompute() {
        let (_rt, graph) = setup();
        let state = graph.state(11);
        let outer_evals = Rc::new(Cell::new(0));

        let s = state.clone();
        let tens = graph.computed(move || s.get() / 10);
        let count = outer_evals.clone();
        let t = tens.clone();
        let label = graph.computed(move || {
            count.set(count.get() + 1);
            format!("bucket-{}", t.get().unwrap())
        });

        assert_eq!(label.get().unwrap(), "bucket-1");
        assert_eq!(outer_evals.get(), 1);

        // 11 -> 12 leaves the inner value at 1; the outer re-evaluates once
        // to discover that, then settles.
        state.set(12);
        assert_eq!(label.get().unwrap(), "bucket-1");
        assert_eq!(outer_evals.get(), 2);
        assert_eq!(label.get().unwrap(), "bucket-1");
        assert_eq!(outer_evals.get(), 2);
    }

    #[test]
    fn cleanup_runs_before_rerun_and_on_revoke() {
        let (_rt, graph) = setup();
        let state = graph.state(0);
        let log = Rc::new(RefCell::new(Vec::new()));

        let events = log.clone();
        let s = state.clone();
        let effect = graph.effect(Flush::Sync, move || {
            let value = s.get();
            events.borrow_mut().push(format!("run-{value}"));
            let events = events.clone();
            Some(Box::new(move || {
                events.borrow_mut().push(format!("cleanup-{value}"));
            }) as Cleanup)
        });

        state.set(1);
        effect.revoke();
        assert_eq!(
            *log.borrow(),
            vec!["run-0", "cleanup-0", "run-1", "cleanup-1"]
        );
    }

    #[test]
    fn revoked_effect_ignores_writes_and_pending_flushes() {
        let (rt, graph) = setup();
        let state = graph.state(0);
        let runs = Rc::new(Cell::new(0));

        let counter = runs.clone();
        let s = state.clone();
        let effect = graph.effect(Flush::Pre, move || {
            s.get();
            counter.set(counter.get() + 1);
            None
        });
        assert_eq!(runs.get(), 1);

        state.set(1);
        effect.revoke();
        rt.flush_microtasks().unwrap();
        assert_eq!(runs.get(), 1, "queued flush must notice the revoke");

        state.set(2);
        rt.flush_microtasks().unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn post_effect_defers_to_macrotask_turn() {
        let (rt, graph) = setup();
        let state = graph.state(0);
        let runs = Rc::new(Cell::new(0));

        let counter = runs.clone();
        let s = state.clone();
        let effect = graph.effect(Flush::Post, move || {
            s.get();
            counter.set(counter.get() + 1);
            None
        });

        state.set(1);
        rt.flush_microtasks().unwrap();
        assert_eq!(runs.get(), 1, "post effect must wait for the macrotask turn");

        rt.flush_macrotasks().unwrap();
        assert_eq!(runs.get(), 2);
        effect.revoke();
    }
}
