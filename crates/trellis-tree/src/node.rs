//! Immutable render-tree snapshots.
//!
//! A [`RenderNode`] is re-created on every render call and never mutated;
//! pointer identity of the shared-payload variants is the update fast path.
//! The variant set is closed: malformed shapes (an empty list, a keyless
//! map where a key list is expected) are unconstructible rather than
//! runtime-checked.

use std::fmt;
use std::rc::Rc;

use crate::instance::Instance;
use crate::RenderError;

/// Stable child identity, distinct from structural position.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Key {
    Index(i64),
    Name(Rc<str>),
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Index(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Name(Rc::from(value))
    }
}

/// Event-handler property; compared by allocation identity, never by body.
#[derive(Clone)]
pub struct Handler(pub Rc<dyn Fn()>);

impl Handler {
    pub fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn invoke(&self) {
        (self.0)();
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0))
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(Rc<str>),
    Handler(Handler),
}

impl PropValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(Rc::from(value))
    }
}

impl From<Handler> for PropValue {
    fn from(value: Handler) -> Self {
        PropValue::Handler(value)
    }
}

/// Ordered, immutable property snapshot. Cheap to clone and to compare for
/// identity; a fresh snapshot is built per render call.
#[derive(Clone, PartialEq, Debug)]
pub struct Props {
    entries: Rc<[(Rc<str>, PropValue)]>,
}

impl Props {
    pub fn empty() -> Self {
        Self {
            entries: Rc::from(Vec::new()),
        }
    }

    pub fn builder() -> PropsBuilder {
        PropsBuilder {
            entries: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries
            .iter()
            .find(|(entry, _)| &**entry == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(name, value)| (&**name, value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Props {
    fn default() -> Self {
        Self::empty()
    }
}

pub struct PropsBuilder {
    entries: Vec<(Rc<str>, PropValue)>,
}

impl PropsBuilder {
    pub fn set(mut self, name: impl Into<Rc<str>>, value: impl Into<PropValue>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    pub fn build(self) -> Props {
        Props {
            entries: Rc::from(self.entries),
        }
    }
}

/// Atomic displayable value.
#[derive(Clone, PartialEq, Debug)]
pub enum Leaf {
    Text(Rc<str>),
    Int(i64),
    Float(f64),
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Text(text) => write!(f, "{text}"),
            Leaf::Int(value) => write!(f, "{value}"),
            Leaf::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Tagged host element: tag identifier, properties, optional key, and at
/// most one nested children snapshot.
#[derive(Debug)]
pub struct Element {
    pub tag: Rc<str>,
    pub key: Option<Key>,
    pub props: Props,
    pub children: Option<RenderNode>,
}

impl Element {
    pub fn builder(tag: impl Into<Rc<str>>) -> ElementBuilder {
        ElementBuilder {
            tag: tag.into(),
            key: None,
            props: Props::empty(),
            children: None,
        }
    }
}

pub struct ElementBuilder {
    tag: Rc<str>,
    key: Option<Key>,
    props: Props,
    children: Option<RenderNode>,
}

impl ElementBuilder {
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    pub fn child(mut self, child: RenderNode) -> Self {
        self.children = Some(child);
        self
    }

    pub fn build(self) -> RenderNode {
        RenderNode::Element(Rc::new(Element {
            tag: self.tag,
            key: self.key,
            props: self.props,
            children: self.children,
        }))
    }
}

/// Ordered child sequence; non-empty by construction.
#[derive(Clone, Debug)]
pub struct ChildList {
    items: Rc<[RenderNode]>,
}

impl ChildList {
    /// Returns `None` for an empty vec; callers wanting the normalizing
    /// behaviour use [`RenderNode::list`] instead.
    pub fn new(items: Vec<RenderNode>) -> Option<Self> {
        if items.is_empty() {
            None
        } else {
            Some(Self {
                items: Rc::from(items),
            })
        }
    }

    pub fn items(&self) -> &[RenderNode] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }
}

/// Render function obtained from a component: invoked with current props on
/// every render of that instance.
pub type RenderFn = Box<dyn FnMut(&Props) -> Result<RenderNode, RenderError>>;

/// A component is a function from (initial props, instance handle) to a
/// render function. The outer function runs once at mount to register hooks
/// and reactive subscriptions; identity is the allocation, so two mounts of
/// the same `Component` value reconcile in place.
pub type Component = Rc<dyn Fn(&Props, &Instance) -> RenderFn>;

/// Component invocation snapshot.
pub struct ComponentSpec {
    pub component: Component,
    pub key: Option<Key>,
    pub props: Props,
}

/// Immutable description of desired tree shape.
#[derive(Clone)]
pub enum RenderNode {
    /// Renders a host placeholder, holding a stable position for later
    /// non-empty transitions.
    Empty,
    Leaf(Leaf),
    Element(Rc<Element>),
    List(ChildList),
    Component(Rc<ComponentSpec>),
}

impl RenderNode {
    pub fn text(value: impl Into<Rc<str>>) -> Self {
        RenderNode::Leaf(Leaf::Text(value.into()))
    }

    pub fn int(value: i64) -> Self {
        RenderNode::Leaf(Leaf::Int(value))
    }

    pub fn float(value: f64) -> Self {
        RenderNode::Leaf(Leaf::Float(value))
    }

    /// An empty vec normalizes to [`RenderNode::Empty`], keeping the
    /// non-empty list invariant out of every consumer's way.
    pub fn list(items: Vec<RenderNode>) -> Self {
        match ChildList::new(items) {
            Some(list) => RenderNode::List(list),
            None => RenderNode::Empty,
        }
    }

    pub fn component(component: Component, props: Props) -> Self {
        RenderNode::Component(Rc::new(ComponentSpec {
            component,
            key: None,
            props,
        }))
    }

    pub fn keyed_component(component: Component, key: impl Into<Key>, props: Props) -> Self {
        RenderNode::Component(Rc::new(ComponentSpec {
            component,
            key: Some(key.into()),
            props,
        }))
    }

    /// Snapshot-identity fast path: `true` means nothing can have changed.
    /// Shared-payload variants compare by pointer; `Empty` and `Leaf` carry
    /// their whole value, so value equality is identity.
    pub fn same_snapshot(&self, other: &RenderNode) -> bool {
        match (self, other) {
            (RenderNode::Empty, RenderNode::Empty) => true,
            (RenderNode::Leaf(a), RenderNode::Leaf(b)) => a == b,
            (RenderNode::Element(a), RenderNode::Element(b)) => Rc::ptr_eq(a, b),
            (RenderNode::List(a), RenderNode::List(b)) => a.ptr_eq(b),
            (RenderNode::Component(a), RenderNode::Component(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The stable identity a list diff matches on, if any.
    pub fn key(&self) -> Option<&Key> {
        match self {
            RenderNode::Element(element) => element.key.as_ref(),
            RenderNode::Component(spec) => spec.key.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Debug for RenderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderNode::Empty => write!(f, "Empty"),
            RenderNode::Leaf(leaf) => write!(f, "Leaf({leaf})"),
            RenderNode::Element(element) => f
                .debug_struct("Element")
                .field("tag", &element.tag)
                .field("key", &element.key)
                .finish(),
            RenderNode::List(list) => write!(f, "List(len={})", list.len()),
            RenderNode::Component(spec) => write!(f, "Component({:p})", Rc::as_ptr(spec)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_normalizes_to_empty() {
        assert!(matches!(RenderNode::list(Vec::new()), RenderNode::Empty));
        assert!(ChildList::new(Vec::new()).is_none());
    }

    #[test]
    fn snapshot_identity_is_pointer_based_for_shared_variants() {
        let element = Element::builder("panel").build();
        assert!(element.same_snapshot(&element.clone()));

        let rebuilt = Element::builder("panel").build();
        assert!(!element.same_snapshot(&rebuilt));
    }

    #[test]
    fn leaf_snapshots_compare_by_value() {
        assert!(RenderNode::text("a").same_snapshot(&RenderNode::text("a")));
        assert!(!RenderNode::text("a").same_snapshot(&RenderNode::text("b")));
        assert!(!RenderNode::int(1).same_snapshot(&RenderNode::float(1.0)));
        assert!(RenderNode::Empty.same_snapshot(&RenderNode::Empty));
    }

    #[test]
    fn keys_come_from_elements_and_components_only() {
        let keyed = Element::builder("row").key(3i64).build();
        assert_eq!(keyed.key(), Some(&Key::Index(3)));
        assert_eq!(RenderNode::text("x").key(), None);
        assert_eq!(RenderNode::list(vec![RenderNode::Empty]).key(), None);
    }

    #[test]
    fn props_lookup_and_handler_identity() {
        let handler = Handler::new(|| {});
        let props = Props::builder()
            .set("label", "ok")
            .set("on_press", handler.clone())
            .build();
        assert_eq!(props.get("label").and_then(PropValue::as_text), Some("ok"));
        assert_eq!(
            props.get("on_press"),
            Some(&PropValue::Handler(handler.clone()))
        );
        assert_ne!(
            props.get("on_press"),
            Some(&PropValue::Handler(Handler::new(|| {})))
        );
    }
}
