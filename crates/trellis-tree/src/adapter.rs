//! Host adapter boundary.
//!
//! The reconciler never touches a real render target; every structural or
//! attribute mutation goes through this trait. Implementations own the
//! target (a retained scene graph, a document, an in-memory arena) behind
//! interior mutability, so all methods take `&self`.

use crate::node::{Element, Leaf, RenderNode};

/// Borrowed view of the host-visible snapshot variants. Lists and component
/// invocations never reach an adapter; the reconciler resolves them first.
#[derive(Clone, Copy)]
pub enum HostSpec<'a> {
    Empty,
    Leaf(&'a Leaf),
    Element(&'a Element),
}

impl<'a> HostSpec<'a> {
    /// `None` for snapshot variants the adapter never sees.
    pub fn of(node: &'a RenderNode) -> Option<Self> {
        match node {
            RenderNode::Empty => Some(HostSpec::Empty),
            RenderNode::Leaf(leaf) => Some(HostSpec::Leaf(leaf)),
            RenderNode::Element(element) => Some(HostSpec::Element(element)),
            RenderNode::List(_) | RenderNode::Component(_) => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            HostSpec::Element(element) => Some(&element.tag),
            _ => None,
        }
    }
}

/// Operations the reconciler needs from a concrete render target.
///
/// `NodeState` is adapter-defined per-node context inherited down the tree
/// (a namespace, a depth, a layout scope); the reconciler threads it from
/// parent to child without interpreting it.
///
/// Attribute application is two-phase around child mount/update/unmount so
/// an adapter can implement attributes that must observe the populated
/// subtree (a back-reference callback, a measured size).
pub trait HostAdapter: 'static {
    /// Host handle; equality is node identity.
    type Node: Clone + PartialEq;
    type NodeState: Clone;

    /// State handed to nodes mounted directly under the host root.
    fn root_state(&self) -> Self::NodeState;

    fn create_node(
        &self,
        spec: HostSpec<'_>,
        parent_state: &Self::NodeState,
    ) -> (Self::Node, Self::NodeState);

    fn mount_attributes_before_children(
        &self,
        node: &Self::Node,
        spec: HostSpec<'_>,
        state: &Self::NodeState,
    );

    fn mount_attributes_after_children(
        &self,
        node: &Self::Node,
        spec: HostSpec<'_>,
        state: &Self::NodeState,
    );

    /// Leaf content counts as an attribute: a leaf-to-leaf transition
    /// arrives here and the adapter decides whether the write is a no-op.
    fn update_attributes_before_children(
        &self,
        node: &Self::Node,
        new: HostSpec<'_>,
        old: HostSpec<'_>,
        state: &Self::NodeState,
    );

    fn update_attributes_after_children(
        &self,
        node: &Self::Node,
        new: HostSpec<'_>,
        old: HostSpec<'_>,
        state: &Self::NodeState,
    );

    fn unmount_attributes_before_children(
        &self,
        node: &Self::Node,
        spec: HostSpec<'_>,
        state: &Self::NodeState,
    );

    fn unmount_attributes_after_children(
        &self,
        node: &Self::Node,
        spec: HostSpec<'_>,
        state: &Self::NodeState,
    );

    fn insert_before(&self, parent: &Self::Node, node: &Self::Node, reference: Option<&Self::Node>);

    fn remove_child(&self, parent: &Self::Node, node: &Self::Node);

    fn parent_of(&self, node: &Self::Node) -> Option<Self::Node>;

    fn next_sibling_of(&self, node: &Self::Node) -> Option<Self::Node>;
}
