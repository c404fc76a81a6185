//! In-memory host with a recorded operation log.
//!
//! Nodes live in an arena; every structural or attribute mutation the
//! reconciler performs is appended to [`MemoryHost::ops`], so tests assert
//! on exactly which host operations a transition produced, not only on the
//! final shape.

use std::cell::RefCell;

use trellis_tree::{HostAdapter, HostSpec, PropValue};

/// Arena index handle. `Copy`, compares by identity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MemNode(usize);

impl MemNode {
    pub fn id(self) -> usize {
        self.0
    }
}

/// Inherited per-node context: tree depth only, enough to observe that the
/// reconciler threads parent state downward.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MemState {
    pub depth: usize,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum HostOp {
    Create { node: usize, kind: String },
    InsertBefore { parent: usize, node: usize, reference: Option<usize> },
    RemoveChild { parent: usize, node: usize },
    SetText { node: usize, text: String },
    SetAttribute { node: usize, name: String, value: String },
    RemoveAttribute { node: usize, name: String },
}

#[derive(Clone, PartialEq, Eq, Debug)]
enum NodeKind {
    Root,
    Placeholder,
    Text,
    Element(String),
}

struct NodeData {
    kind: NodeKind,
    parent: Option<usize>,
    children: Vec<usize>,
    text: Option<String>,
    attrs: Vec<(String, String)>,
}

pub struct MemoryHost {
    arena: RefCell<Vec<NodeData>>,
    ops: RefCell<Vec<HostOp>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        let host = Self {
            arena: RefCell::new(Vec::new()),
            ops: RefCell::new(Vec::new()),
        };
        host.allocate(NodeKind::Root, None);
        host
    }

    /// The mount root; exists from construction and is never removed.
    pub fn root(&self) -> MemNode {
        MemNode(0)
    }

    pub fn ops(&self) -> Vec<HostOp> {
        self.ops.borrow().clone()
    }

    /// Drains the log, so follow-up assertions see only new operations.
    pub fn take_ops(&self) -> Vec<HostOp> {
        std::mem::take(&mut *self.ops.borrow_mut())
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    pub fn children_of(&self, node: MemNode) -> Vec<MemNode> {
        self.arena.borrow()[node.0]
            .children
            .iter()
            .map(|&id| MemNode(id))
            .collect()
    }

    pub fn text_of(&self, node: MemNode) -> Option<String> {
        self.arena.borrow()[node.0].text.clone()
    }

    pub fn attr_of(&self, node: MemNode, name: &str) -> Option<String> {
        self.arena.borrow()[node.0]
            .attrs
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.clone())
    }

    /// Compact textual dump of a subtree, for shape assertions:
    /// elements as `<tag attr=value>…</tag>`, text as its content, empty
    /// placeholders as `·`.
    pub fn dump(&self, node: MemNode) -> String {
        let arena = self.arena.borrow();
        fn walk(arena: &[NodeData], id: usize, out: &mut String) {
            let data = &arena[id];
            match &data.kind {
                NodeKind::Root => {
                    for &child in &data.children {
                        walk(arena, child, out);
                    }
                }
                NodeKind::Placeholder => out.push('·'),
                NodeKind::Text => out.push_str(data.text.as_deref().unwrap_or("")),
                NodeKind::Element(tag) => {
                    out.push('<');
                    out.push_str(tag);
                    for (name, value) in &data.attrs {
                        out.push(' ');
                        out.push_str(name);
                        out.push('=');
                        out.push_str(value);
                    }
                    out.push('>');
                    for &child in &data.children {
                        walk(arena, child, out);
                    }
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
        let mut out = String::new();
        walk(&arena, node.0, &mut out);
        out
    }

    fn allocate(&self, kind: NodeKind, text: Option<String>) -> usize {
        let mut arena = self.arena.borrow_mut();
        let id = arena.len();
        arena.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            text,
            attrs: Vec::new(),
        });
        id
    }

    fn record(&self, op: HostOp) {
        self.ops.borrow_mut().push(op);
    }

    fn set_attr(&self, node: usize, name: &str, value: String) {
        let mut arena = self.arena.borrow_mut();
        let attrs = &mut arena[node].attrs;
        match attrs.iter_mut().find(|(attr, _)| attr == name) {
            Some(slot) => slot.1 = value.clone(),
            None => attrs.push((name.to_owned(), value.clone())),
        }
        drop(arena);
        self.record(HostOp::SetAttribute {
            node,
            name: name.to_owned(),
            value,
        });
    }

    fn remove_attr(&self, node: usize, name: &str) {
        self.arena.borrow_mut()[node]
            .attrs
            .retain(|(attr, _)| attr != name);
        self.record(HostOp::RemoveAttribute {
            node,
            name: name.to_owned(),
        });
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

fn attr_value(value: &PropValue) -> Option<String> {
    match value {
        PropValue::Bool(value) => Some(value.to_string()),
        PropValue::Int(value) => Some(value.to_string()),
        PropValue::Float(value) => Some(value.to_string()),
        PropValue::Text(value) => Some(value.to_string()),
        // Handlers are wired by a real host; the arena has no event loop.
        PropValue::Handler(_) => None,
    }
}

impl HostAdapter for MemoryHost {
    type Node = MemNode;
    type NodeState = MemState;

    fn root_state(&self) -> MemState {
        MemState { depth: 0 }
    }

    fn create_node(&self, spec: HostSpec<'_>, parent_state: &MemState) -> (MemNode, MemState) {
        let (kind, text, label) = match &spec {
            HostSpec::Empty => (NodeKind::Placeholder, None, "placeholder".to_owned()),
            HostSpec::Leaf(leaf) => (NodeKind::Text, Some(leaf.to_string()), "text".to_owned()),
            HostSpec::Element(element) => (
                NodeKind::Element(element.tag.to_string()),
                None,
                format!("element:{}", element.tag),
            ),
        };
        let id = self.allocate(kind, text);
        self.record(HostOp::Create { node: id, kind: label });
        (
            MemNode(id),
            MemState {
                depth: parent_state.depth + 1,
            },
        )
    }

    fn mount_attributes_before_children(
        &self,
        node: &MemNode,
        spec: HostSpec<'_>,
        _state: &MemState,
    ) {
        if let HostSpec::Element(element) = spec {
            for (name, value) in element.props.iter() {
                if let Some(value) = attr_value(value) {
                    self.set_attr(node.0, name, value);
                }
            }
        }
    }

    fn mount_attributes_after_children(
        &self,
        _node: &MemNode,
        _spec: HostSpec<'_>,
        _state: &MemState,
    ) {
    }

    fn update_attributes_before_children(
        &self,
        node: &MemNode,
        new: HostSpec<'_>,
        old: HostSpec<'_>,
        _state: &MemState,
    ) {
        match (new, old) {
            (HostSpec::Leaf(new_leaf), HostSpec::Leaf(_)) => {
                let text = new_leaf.to_string();
                if self.arena.borrow()[node.0].text.as_deref() != Some(text.as_str()) {
                    self.arena.borrow_mut()[node.0].text = Some(text.clone());
                    self.record(HostOp::SetText { node: node.0, text });
                }
            }
            (HostSpec::Element(new_element), HostSpec::Element(old_element)) => {
                for (name, value) in new_element.props.iter() {
                    let old_value = old_element.props.get(name);
                    if old_value != Some(value) {
                        if let Some(value) = attr_value(value) {
                            self.set_attr(node.0, name, value);
                        }
                    }
                }
                for (name, _) in old_element.props.iter() {
                    if new_element.props.get(name).is_none() {
                        self.remove_attr(node.0, name);
                    }
                }
            }
            _ => {}
        }
    }

    fn update_attributes_after_children(
        &self,
        _node: &MemNode,
        _new: HostSpec<'_>,
        _old: HostSpec<'_>,
        _state: &MemState,
    ) {
    }

    fn unmount_attributes_before_children(
        &self,
        _node: &MemNode,
        _spec: HostSpec<'_>,
        _state: &MemState,
    ) {
    }

    fn unmount_attributes_after_children(
        &self,
        _node: &MemNode,
        _spec: HostSpec<'_>,
        _state: &MemState,
    ) {
    }

    fn insert_before(&self, parent: &MemNode, node: &MemNode, reference: Option<&MemNode>) {
        let mut arena = self.arena.borrow_mut();
        // insert_before doubles as move: detach from any current parent.
        if let Some(old_parent) = arena[node.0].parent {
            let child = node.0;
            arena[old_parent].children.retain(|&id| id != child);
        }
        let position = match reference {
            Some(reference) => arena[parent.0]
                .children
                .iter()
                .position(|&id| id == reference.0)
                .unwrap_or(arena[parent.0].children.len()),
            None => arena[parent.0].children.len(),
        };
        arena[parent.0].children.insert(position, node.0);
        arena[node.0].parent = Some(parent.0);
        drop(arena);
        self.record(HostOp::InsertBefore {
            parent: parent.0,
            node: node.0,
            reference: reference.map(|r| r.0),
        });
    }

    fn remove_child(&self, parent: &MemNode, node: &MemNode) {
        let mut arena = self.arena.borrow_mut();
        let child = node.0;
        arena[parent.0].children.retain(|&id| id != child);
        arena[child].parent = None;
        drop(arena);
        self.record(HostOp::RemoveChild {
            parent: parent.0,
            node: node.0,
        });
    }

    fn parent_of(&self, node: &MemNode) -> Option<MemNode> {
        self.arena.borrow()[node.0].parent.map(MemNode)
    }

    fn next_sibling_of(&self, node: &MemNode) -> Option<MemNode> {
        let arena = self.arena.borrow();
        let parent = arena[node.0].parent?;
        let siblings = &arena[parent].children;
        let position = siblings.iter().position(|&id| id == node.0)?;
        siblings.get(position + 1).map(|&id| MemNode(id))
    }
}
