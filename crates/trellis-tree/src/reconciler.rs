//! Mount / update / unmount over a live ref tree, including the keyed
//! list diff.
//!
//! Every mounted [`RenderNode`] has a [`LiveRef`] counterpart owning its
//! host handle (or, for lists and components, the refs that do). Update is
//! in place: the caller's slot is the ref, so a shape-compatible transition
//! mutates it and a mismatch swaps a freshly mounted ref into the slot
//! before tearing the old one down.

use std::cell::RefCell;
use std::rc::Rc;

use trellis_core::collections::map::HashMap;
use trellis_core::runtime::RuntimeHandle;

use crate::adapter::{HostAdapter, HostSpec};
use crate::instance::{Context, Instance, InstanceInner, LifecycleEvent, Rerender};
use crate::node::{ChildList, Key, RenderNode};
use crate::RenderError;

/// Live counterpart of a mounted snapshot.
pub enum LiveRef<H: HostAdapter> {
    Item(ItemRef<H>),
    List(ListRef<H>),
    Component(ComponentRef<H>),
}

/// Empty, leaf or element: exactly one host node, plus the element's
/// optional child subtree.
pub struct ItemRef<H: HostAdapter> {
    vnode: RenderNode,
    node: H::Node,
    state: H::NodeState,
    child: Option<Box<LiveRef<H>>>,
}

/// Ordered members of a list snapshot; never empty.
pub struct ListRef<H: HostAdapter> {
    vnode: RenderNode,
    refs: Vec<LiveRef<H>>,
}

/// A mounted component: its instance, the render function obtained at
/// mount, and whatever that function last produced. The `rendered` cell is
/// shared (weakly) with the instance's re-render closure.
pub struct ComponentRef<H: HostAdapter> {
    vnode: RenderNode,
    instance: Instance,
    render: Rc<RefCell<crate::node::RenderFn>>,
    rendered: Rc<RefCell<LiveRef<H>>>,
}

impl<H: HostAdapter> LiveRef<H> {
    /// The last snapshot applied to this ref.
    pub fn vnode(&self) -> &RenderNode {
        match self {
            LiveRef::Item(item) => &item.vnode,
            LiveRef::List(list) => &list.vnode,
            LiveRef::Component(comp) => &comp.vnode,
        }
    }

    /// First host node of this subtree, in host order.
    pub fn first_node(&self) -> H::Node {
        match self {
            LiveRef::Item(item) => item.node.clone(),
            LiveRef::List(list) => list
                .refs
                .first()
                .expect("list ref is never empty")
                .first_node(),
            LiveRef::Component(comp) => comp.rendered.borrow().first_node(),
        }
    }

    pub fn last_node(&self) -> H::Node {
        match self {
            LiveRef::Item(item) => item.node.clone(),
            LiveRef::List(list) => list
                .refs
                .last()
                .expect("list ref is never empty")
                .last_node(),
            LiveRef::Component(comp) => comp.rendered.borrow().last_node(),
        }
    }

    /// The component instance, when this ref is a component mount.
    pub fn instance(&self) -> Option<&Instance> {
        match self {
            LiveRef::Component(comp) => Some(&comp.instance),
            _ => None,
        }
    }

    /// Member refs, when this ref is a list.
    pub fn members(&self) -> Option<&[LiveRef<H>]> {
        match self {
            LiveRef::List(list) => Some(&list.refs),
            _ => None,
        }
    }
}

/// Maps snapshot transitions onto live-ref and host mutations. Cheap to
/// clone; clones share the host.
pub struct Reconciler<H: HostAdapter> {
    host: Rc<H>,
    runtime: RuntimeHandle,
}

impl<H: HostAdapter> Clone for Reconciler<H> {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<H: HostAdapter> Reconciler<H> {
    pub fn new(host: Rc<H>, runtime: RuntimeHandle) -> Self {
        Self { host, runtime }
    }

    pub fn host(&self) -> &Rc<H> {
        &self.host
    }

    /// Mounts `vnode` under `parent`, before `reference` (or at the end).
    pub fn mount(
        &self,
        parent: &H::Node,
        reference: Option<&H::Node>,
        parent_state: &H::NodeState,
        vnode: &RenderNode,
        ctx: &Context,
    ) -> Result<LiveRef<H>, RenderError> {
        match vnode {
            RenderNode::Empty | RenderNode::Leaf(_) => {
                let (node, state) = self.host.create_node(host_spec(vnode), parent_state);
                self.host.insert_before(parent, &node, reference);
                Ok(LiveRef::Item(ItemRef {
                    vnode: vnode.clone(),
                    node,
                    state,
                    child: None,
                }))
            }
            RenderNode::Element(element) => {
                let (node, state) = self.host.create_node(host_spec(vnode), parent_state);
                self.host.insert_before(parent, &node, reference);
                self.host
                    .mount_attributes_before_children(&node, host_spec(vnode), &state);
                let child = match &element.children {
                    None => None,
                    Some(child_vnode) => {
                        match self.mount(&node, None, &state, child_vnode, ctx) {
                            Ok(child) => Some(Box::new(child)),
                            Err(err) => {
                                self.host.remove_child(parent, &node);
                                return Err(err);
                            }
                        }
                    }
                };
                self.host
                    .mount_attributes_after_children(&node, host_spec(vnode), &state);
                Ok(LiveRef::Item(ItemRef {
                    vnode: vnode.clone(),
                    node,
                    state,
                    child,
                }))
            }
            RenderNode::List(items) => {
                let mut refs = Vec::with_capacity(items.len());
                for item in items.items() {
                    match self.mount(parent, reference, parent_state, item, ctx) {
                        Ok(live) => refs.push(live),
                        Err(err) => {
                            for mounted in refs.into_iter().rev() {
                                self.unmount_inner(mounted, true);
                            }
                            return Err(err);
                        }
                    }
                }
                Ok(LiveRef::List(ListRef {
                    vnode: vnode.clone(),
                    refs,
                }))
            }
            RenderNode::Component(spec) => {
                let child_ctx = ctx.child();
                let instance =
                    Instance::new(spec.props.clone(), child_ctx.clone(), self.runtime.clone());
                let render_fn = (spec.component)(&spec.props, &instance);
                let render = Rc::new(RefCell::new(render_fn));
                let rendered_vnode = {
                    let mut render = render.borrow_mut();
                    (&mut **render)(&spec.props)?
                };
                instance.inner().fire(LifecycleEvent::Mount);
                let rendered =
                    self.mount(parent, reference, parent_state, &rendered_vnode, &child_ctx)?;
                instance.inner().fire(LifecycleEvent::Mounted);
                let rendered = Rc::new(RefCell::new(rendered));
                instance
                    .inner()
                    .install_rerender(self.rerender_closure(&instance, &render, &rendered, parent_state));
                Ok(LiveRef::Component(ComponentRef {
                    vnode: vnode.clone(),
                    instance,
                    render,
                    rendered,
                }))
            }
        }
    }

    /// Applies `vnode` to the mounted ref in `live`, reusing it when the
    /// shapes are compatible and swapping in a fresh mount otherwise.
    pub fn update(
        &self,
        live: &mut LiveRef<H>,
        parent_state: &H::NodeState,
        vnode: &RenderNode,
        ctx: &Context,
    ) -> Result<(), RenderError> {
        if live.vnode().same_snapshot(vnode) {
            return Ok(());
        }
        if !compatible(live.vnode(), vnode) {
            return self.replace(live, parent_state, vnode, ctx);
        }
        match live {
            LiveRef::Item(item) => match vnode {
                RenderNode::Empty => {
                    item.vnode = RenderNode::Empty;
                }
                RenderNode::Leaf(_) => {
                    // Content is an attribute; the adapter decides whether
                    // the write is a no-op.
                    self.host.update_attributes_before_children(
                        &item.node,
                        host_spec(vnode),
                        host_spec(&item.vnode),
                        &item.state,
                    );
                    self.host.update_attributes_after_children(
                        &item.node,
                        host_spec(vnode),
                        host_spec(&item.vnode),
                        &item.state,
                    );
                    item.vnode = vnode.clone();
                }
                RenderNode::Element(new_element) => {
                    let old_element = match &item.vnode {
                        RenderNode::Element(element) => element.clone(),
                        _ => unreachable!("compatible update pairs elements with elements"),
                    };
                    self.host.update_attributes_before_children(
                        &item.node,
                        HostSpec::Element(new_element),
                        HostSpec::Element(&old_element),
                        &item.state,
                    );
                    match (item.child.take(), new_element.children.as_ref()) {
                        (None, None) => {}
                        (None, Some(child_vnode)) => {
                            item.child = Some(Box::new(self.mount(
                                &item.node,
                                None,
                                &item.state,
                                child_vnode,
                                ctx,
                            )?));
                        }
                        (Some(child), None) => self.unmount_inner(*child, true),
                        (Some(mut child), Some(child_vnode)) => {
                            let result = self.update(&mut child, &item.state, child_vnode, ctx);
                            item.child = Some(child);
                            result?;
                        }
                    }
                    self.host.update_attributes_after_children(
                        &item.node,
                        HostSpec::Element(new_element),
                        HostSpec::Element(&old_element),
                        &item.state,
                    );
                    item.vnode = vnode.clone();
                }
                RenderNode::List(_) | RenderNode::Component(_) => {
                    unreachable!("item refs only update to host-visible snapshots")
                }
            },
            LiveRef::List(list) => {
                let items = match vnode {
                    RenderNode::List(items) => items.clone(),
                    _ => unreachable!("compatible update pairs lists with lists"),
                };
                self.update_list(list, parent_state, &items, vnode, ctx)?;
            }
            LiveRef::Component(comp) => {
                let spec = match vnode {
                    RenderNode::Component(spec) => spec.clone(),
                    _ => unreachable!("compatible update pairs components with components"),
                };
                comp.instance.inner().set_props(spec.props.clone());
                // Re-invoke the render function kept from mount, never the
                // component constructor.
                let rendered_vnode = {
                    let mut render = comp.render.borrow_mut();
                    (&mut **render)(&spec.props)?
                };
                let result = {
                    let child_ctx = comp.instance.context().clone();
                    let mut slot = comp.rendered.borrow_mut();
                    self.update(&mut slot, parent_state, &rendered_vnode, &child_ctx)
                };
                result?;
                comp.vnode = vnode.clone();
            }
        }
        Ok(())
    }

    /// Tears the subtree down, children first, detaching from the host only
    /// at the top item nodes.
    pub fn unmount(&self, live: LiveRef<H>) {
        self.unmount_inner(live, true);
    }

    fn unmount_inner(&self, live: LiveRef<H>, touch_host: bool) {
        match live {
            LiveRef::Item(item) => {
                let ItemRef {
                    vnode,
                    node,
                    state,
                    child,
                } = item;
                self.host
                    .unmount_attributes_before_children(&node, host_spec(&vnode), &state);
                if let Some(child) = child {
                    // Child host nodes fall with this node; no per-child detach.
                    self.unmount_inner(*child, false);
                }
                self.host
                    .unmount_attributes_after_children(&node, host_spec(&vnode), &state);
                if touch_host {
                    if let Some(parent) = self.host.parent_of(&node) {
                        self.host.remove_child(&parent, &node);
                    }
                }
            }
            LiveRef::List(list) => {
                for member in list.refs.into_iter().rev() {
                    self.unmount_inner(member, touch_host);
                }
            }
            LiveRef::Component(comp) => {
                comp.instance.inner().fire(LifecycleEvent::Unmount);
                match Rc::try_unwrap(comp.rendered) {
                    Ok(rendered) => self.unmount_inner(rendered.into_inner(), touch_host),
                    Err(_) => {
                        log::error!("component subtree still shared at unmount; skipping teardown");
                    }
                }
                comp.instance.inner().fire(LifecycleEvent::Unmounted);
                comp.instance.inner().release();
            }
        }
    }

    /// Shape-mismatch fallback: mount the new snapshot at the old subtree's
    /// first host position, swap it into the slot, tear the old one down.
    fn replace(
        &self,
        live: &mut LiveRef<H>,
        parent_state: &H::NodeState,
        vnode: &RenderNode,
        ctx: &Context,
    ) -> Result<(), RenderError> {
        let reference = live.first_node();
        let parent = self
            .host
            .parent_of(&reference)
            .expect("mounted host node has a parent");
        let fresh = self.mount(&parent, Some(&reference), parent_state, vnode, ctx)?;
        let old = std::mem::replace(live, fresh);
        self.unmount_inner(old, true);
        Ok(())
    }

    /// Whether `live` actually sits somewhere other than just before
    /// `reference`. A keyed match can resolve to the position the subtree
    /// already occupies; moving it again would be a host no-op that still
    /// costs a mutation.
    fn needs_move(&self, live: &LiveRef<H>, reference: Option<&H::Node>) -> bool {
        match (self.host.next_sibling_of(&live.last_node()), reference) {
            (None, None) => false,
            (Some(next), Some(reference)) => next != *reference,
            _ => true,
        }
    }

    /// Moves every host node of `live` before `reference` under `parent`,
    /// keeping the subtree's internal order.
    fn reposition(&self, live: &LiveRef<H>, parent: &H::Node, reference: Option<&H::Node>) {
        match live {
            LiveRef::Item(item) => self.host.insert_before(parent, &item.node, reference),
            LiveRef::List(list) => {
                for member in &list.refs {
                    self.reposition(member, parent, reference);
                }
            }
            LiveRef::Component(comp) => {
                self.reposition(&comp.rendered.borrow(), parent, reference)
            }
        }
    }

    fn update_list(
        &self,
        list: &mut ListRef<H>,
        parent_state: &H::NodeState,
        items: &ChildList,
        vnode: &RenderNode,
        ctx: &Context,
    ) -> Result<(), RenderError> {
        let last = list
            .refs
            .last()
            .expect("list ref is never empty")
            .last_node();
        let parent = self
            .host
            .parent_of(&last)
            .expect("mounted list has a host parent");
        let after_last = self.host.next_sibling_of(&last);

        let mut old_refs: Vec<Option<LiveRef<H>>> =
            std::mem::take(&mut list.refs).into_iter().map(Some).collect();
        let mut new_refs: Vec<Option<LiveRef<H>>> = Vec::new();
        new_refs.resize_with(items.len(), || None);

        let outcome = self.diff_children(
            &mut old_refs,
            &mut new_refs,
            &parent,
            after_last,
            parent_state,
            items.items(),
            ctx,
        );
        match outcome {
            Ok(()) => {
                for leftover in old_refs.into_iter().rev().flatten() {
                    self.unmount_inner(leftover, true);
                }
                list.refs = new_refs
                    .into_iter()
                    .map(|slot| slot.expect("finished diff fills every new slot"))
                    .collect();
                list.vnode = vnode.clone();
                Ok(())
            }
            Err(err) => {
                // Abort mid-diff: keep every still-live child so the ref
                // tree stays consistent; host order is repaired by the next
                // successful pass.
                let mut survivors: Vec<LiveRef<H>> = new_refs.into_iter().flatten().collect();
                survivors.extend(old_refs.into_iter().flatten());
                debug_assert!(!survivors.is_empty(), "aborted diff keeps a live child");
                list.refs = survivors;
                Err(err)
            }
        }
    }

    /// Four-pointer keyed diff: positional matches first, keyed moves only
    /// when position cannot resolve.
    #[allow(clippy::too_many_arguments)]
    fn diff_children(
        &self,
        old_refs: &mut [Option<LiveRef<H>>],
        new_refs: &mut [Option<LiveRef<H>>],
        parent: &H::Node,
        after_last: Option<H::Node>,
        parent_state: &H::NodeState,
        items: &[RenderNode],
        ctx: &Context,
    ) -> Result<(), RenderError> {
        let mut old_start: isize = 0;
        let mut old_end: isize = old_refs.len() as isize - 1;
        let mut new_start: isize = 0;
        let mut new_end: isize = items.len() as isize - 1;
        // Built once, on the first iteration positional matching fails.
        let mut key_index: Option<HashMap<Key, usize>> = None;
        // Outer None: not computed yet. Inner None: append at the list end.
        let mut reference: Option<Option<H::Node>> = None;

        while new_start <= new_end {
            if old_start <= old_end {
                // Slots consumed by keyed extraction are skipped first so
                // positional matching stays aligned.
                if old_refs[old_start as usize].is_none() {
                    old_start += 1;
                    continue;
                }
                if old_refs[old_end as usize].is_none() {
                    old_end -= 1;
                    continue;
                }
            }

            // Forward positional match: no host move.
            let new_item = &items[new_start as usize];
            if slot(old_refs, old_start).map_or(false, |r| suited(r.vnode(), new_item)) {
                let mut old = old_refs[old_start as usize]
                    .take()
                    .expect("forward candidate present");
                let result = self.update(&mut old, parent_state, new_item, ctx);
                new_refs[new_start as usize] = Some(old);
                result?;
                new_start += 1;
                old_start += 1;
                continue;
            }

            // Backward positional match: unchanged suffixes (prepends).
            let new_tail = &items[new_end as usize];
            if slot(old_refs, old_end).map_or(false, |r| suited(r.vnode(), new_tail)) {
                let mut old = old_refs[old_end as usize]
                    .take()
                    .expect("backward candidate present");
                let result = self.update(&mut old, parent_state, new_tail, ctx);
                new_refs[new_end as usize] = Some(old);
                result?;
                new_end -= 1;
                old_end -= 1;
                continue;
            }

            let key_index = key_index.get_or_insert_with(|| {
                let mut map: HashMap<Key, usize> = HashMap::default();
                let mut i = old_start;
                while i <= old_end {
                    if let Some(key) = slot(old_refs, i).and_then(|r| r.vnode().key()) {
                        map.insert(key.clone(), i as usize);
                    }
                    i += 1;
                }
                map
            });

            let old_start_ref_exists = slot(old_refs, old_start).is_some();
            if !old_start_ref_exists && reference.is_none() {
                // Positional candidates are exhausted; anchor the remaining
                // mounts to whatever already sits to the right.
                reference = Some(if (new_end as usize) < items.len() - 1 {
                    new_refs[(new_end + 1) as usize]
                        .as_ref()
                        .map(|r| r.first_node())
                } else {
                    after_last.clone()
                });
            }

            // Keyed match: reuse with a host move when out of position.
            if let Some(new_key) = new_item.key() {
                if let Some(&old_idx) = key_index.get(new_key) {
                    let old_start_slot_keyed = slot(old_refs, old_start)
                        .map_or(false, |r| r.vnode().key().is_some());
                    match old_refs[old_idx].take() {
                        Some(mut old) => {
                            if old_idx as isize != old_start {
                                let anchor = match &reference {
                                    Some(reference) => reference.clone(),
                                    None => slot(old_refs, old_start).map(|r| r.first_node()),
                                };
                                if self.needs_move(&old, anchor.as_ref()) {
                                    self.reposition(&old, parent, anchor.as_ref());
                                }
                            }
                            let result = self.update(&mut old, parent_state, new_item, ctx);
                            new_refs[new_start as usize] = Some(old);
                            result?;
                        }
                        None => {
                            // Slot already consumed: duplicate key in the
                            // new sequence. First match won; mount fresh.
                            log::warn!(
                                "duplicate key {new_key:?} in child list; mounting a fresh node"
                            );
                            let anchor = match &reference {
                                Some(reference) => reference.clone(),
                                None => slot(old_refs, old_start).map(|r| r.first_node()),
                            };
                            let fresh =
                                self.mount(parent, anchor.as_ref(), parent_state, new_item, ctx)?;
                            new_refs[new_start as usize] = Some(fresh);
                        }
                    }
                    new_start += 1;
                    // A keyed item at the positional cursor is reserved for
                    // a later keyed match; step past it when the extraction
                    // happened at or beyond the cursor.
                    if old_start_slot_keyed && old_start <= old_idx as isize {
                        old_start += 1;
                    }
                    continue;
                }
            }

            if !old_start_ref_exists {
                let anchor = reference.clone().flatten();
                let fresh = self.mount(parent, anchor.as_ref(), parent_state, new_item, ctx)?;
                new_refs[new_start as usize] = Some(fresh);
                new_start += 1;
                continue;
            }

            if new_item.key().is_some() {
                // Keyed new with no old counterpart: fresh mount before the
                // positional candidate.
                let anchor = slot(old_refs, old_start).map(|r| r.first_node());
                let fresh = self.mount(parent, anchor.as_ref(), parent_state, new_item, ctx)?;
                new_refs[new_start as usize] = Some(fresh);
                new_start += 1;
                continue;
            }

            if slot(old_refs, old_start).map_or(false, |r| r.vnode().key().is_some()) {
                // A keyless new item never consumes a keyed old one.
                old_start += 1;
                continue;
            }

            let mut old = old_refs[old_start as usize]
                .take()
                .expect("keyless positional candidate present");
            let result = self.update(&mut old, parent_state, new_item, ctx);
            new_refs[new_start as usize] = Some(old);
            result?;
            new_start += 1;
            old_start += 1;
        }
        Ok(())
    }

    fn rerender_closure(
        &self,
        instance: &Instance,
        render: &Rc<RefCell<crate::node::RenderFn>>,
        rendered: &Rc<RefCell<LiveRef<H>>>,
        parent_state: &H::NodeState,
    ) -> Rerender {
        let reconciler = self.clone();
        let weak_instance = Rc::downgrade(instance.inner());
        let weak_render = Rc::downgrade(render);
        let weak_rendered = Rc::downgrade(rendered);
        let parent_state = parent_state.clone();
        Rc::new(move || {
            let (Some(inner), Some(render), Some(rendered)) = (
                weak_instance.upgrade(),
                weak_render.upgrade(),
                weak_rendered.upgrade(),
            ) else {
                return Ok(());
            };
            let props = inner.props_snapshot();
            let next = {
                let mut render = render.borrow_mut();
                match (&mut **render)(&props) {
                    Ok(next) => next,
                    Err(err) => return deliver_or(&inner, err),
                }
            };
            inner.fire(LifecycleEvent::Update);
            let result = {
                let child_ctx = inner.context().clone();
                let mut slot = rendered.borrow_mut();
                reconciler.update(&mut slot, &parent_state, &next, &child_ctx)
            };
            match result {
                Ok(()) => {
                    inner.fire(LifecycleEvent::Updated);
                    Ok(())
                }
                Err(err) => deliver_or(&inner, err),
            }
        })
    }
}

/// Recovery at the failing instance: handled means the previous subtree
/// stays; unhandled propagates to the caller of the pass.
fn deliver_or(inner: &InstanceInner, err: RenderError) -> Result<(), RenderError> {
    if inner.deliver_error(&err) {
        Ok(())
    } else {
        Err(err)
    }
}

fn slot<'a, H: HostAdapter>(
    refs: &'a [Option<LiveRef<H>>],
    idx: isize,
) -> Option<&'a LiveRef<H>> {
    if idx < 0 || idx as usize >= refs.len() {
        None
    } else {
        refs[idx as usize].as_ref()
    }
}

/// Whether an old child can be updated in place by a new one: equal keys
/// (both may be absent) and the same shape token, meaning element tag,
/// component identity, or any keyless plain shape.
fn suited(old: &RenderNode, new: &RenderNode) -> bool {
    if old.key() != new.key() {
        return false;
    }
    match (old, new) {
        (RenderNode::Element(a), RenderNode::Element(b)) => a.tag == b.tag,
        (RenderNode::Component(a), RenderNode::Component(b)) => {
            Rc::ptr_eq(&a.component, &b.component)
        }
        (RenderNode::Element(_) | RenderNode::Component(_), _)
        | (_, RenderNode::Element(_) | RenderNode::Component(_)) => false,
        _ => true,
    }
}

/// Shape-compatible reuse test for the update dispatch.
fn compatible(old: &RenderNode, new: &RenderNode) -> bool {
    match (old, new) {
        (RenderNode::Empty, RenderNode::Empty) => true,
        (RenderNode::Leaf(_), RenderNode::Leaf(_)) => true,
        (RenderNode::Element(a), RenderNode::Element(b)) => a.tag == b.tag,
        (RenderNode::List(_), RenderNode::List(_)) => true,
        (RenderNode::Component(a), RenderNode::Component(b)) => {
            Rc::ptr_eq(&a.component, &b.component)
        }
        _ => false,
    }
}

fn host_spec(vnode: &RenderNode) -> HostSpec<'_> {
    HostSpec::of(vnode).expect("item refs hold host-visible snapshots only")
}
