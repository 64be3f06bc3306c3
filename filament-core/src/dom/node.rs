//! Live Nodes
//!
//! Nodes are reference-counted handles: cloning a `Node` yields another
//! handle to the same node, and identity is compared with [`Node::ptr_eq`].
//! Parents own their children; children point back with a weak reference.

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::Serialize;

use super::event::{Event, Listener, ListenerId};

/// Unique identifier for a live node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// The structural kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element,
    Text,
    Fragment,
}

/// What changed on an observed node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationKind {
    Attribute { name: String },
    Text,
    ChildList,
}

/// A change to a node that was part of the live tree when it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mutation {
    pub target: NodeId,
    #[serde(flatten)]
    pub kind: MutationKind,
}

/// Document-wide state every node of one document shares.
pub(crate) struct Shared {
    pub(crate) id: u64,
    pub(crate) observing: Cell<bool>,
    pub(crate) mutations: RefCell<Vec<Mutation>>,
}

enum NodeData {
    Document,
    Element {
        tag: String,
        attributes: RefCell<IndexMap<String, String>>,
    },
    Text(RefCell<String>),
    Fragment,
}

struct NodeInner {
    id: NodeId,
    data: NodeData,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    listeners: RefCell<Vec<Listener>>,
    shared: Rc<Shared>,
}

/// Structural, serializable view of a subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Snapshot {
    Document {
        children: Vec<Snapshot>,
    },
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
        children: Vec<Snapshot>,
    },
    Text {
        text: String,
    },
    Fragment {
        children: Vec<Snapshot>,
    },
}

/// Handle to a live node.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

impl Node {
    fn with_data(shared: &Rc<Shared>, data: NodeData) -> Self {
        Self(Rc::new(NodeInner {
            id: NodeId::new(),
            data,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            shared: Rc::clone(shared),
        }))
    }

    pub(crate) fn new_document(shared: &Rc<Shared>) -> Self {
        Self::with_data(shared, NodeData::Document)
    }

    pub(crate) fn new_element(shared: &Rc<Shared>, tag: &str) -> Self {
        Self::with_data(
            shared,
            NodeData::Element {
                tag: tag.to_ascii_lowercase(),
                attributes: RefCell::new(IndexMap::new()),
            },
        )
    }

    pub(crate) fn new_text(shared: &Rc<Shared>, text: &str) -> Self {
        Self::with_data(shared, NodeData::Text(RefCell::new(text.to_string())))
    }

    pub(crate) fn new_fragment(shared: &Rc<Shared>) -> Self {
        Self::with_data(shared, NodeData::Fragment)
    }

    /// Create a detached node of the same kind and tag, without attributes,
    /// children or listeners.
    pub fn clone_shallow(&self) -> Node {
        let data = match &self.0.data {
            NodeData::Document => NodeData::Document,
            NodeData::Element { tag, .. } => NodeData::Element {
                tag: tag.clone(),
                attributes: RefCell::new(IndexMap::new()),
            },
            NodeData::Text(text) => NodeData::Text(RefCell::new(text.borrow().clone())),
            NodeData::Fragment => NodeData::Fragment,
        };
        Self::with_data(&self.0.shared, data)
    }

    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// Id of the document this node was created by.
    pub fn document_id(&self) -> u64 {
        self.0.shared.id
    }

    pub fn kind(&self) -> NodeKind {
        match &self.0.data {
            NodeData::Document => NodeKind::Document,
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text(_) => NodeKind::Text,
            NodeData::Fragment => NodeKind::Fragment,
        }
    }

    pub fn is_element(&self) -> bool {
        self.kind() == NodeKind::Element
    }

    pub fn is_text(&self) -> bool {
        self.kind() == NodeKind::Text
    }

    pub fn is_fragment(&self) -> bool {
        self.kind() == NodeKind::Fragment
    }

    /// Lowercased tag name for elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.data {
            NodeData::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Whether both handles point at the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn record(&self, kind: MutationKind) {
        let shared = &self.0.shared;
        if shared.observing.get() && self.is_connected() {
            shared.mutations.borrow_mut().push(Mutation {
                target: self.id(),
                kind,
            });
        }
    }

    // ------------------------------------------------------------------
    // Tree structure
    // ------------------------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn child(&self, index: usize) -> Option<Node> {
        self.0.children.borrow().get(index).cloned()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.child(0)
    }

    pub fn first_element_child(&self) -> Option<Node> {
        self.0
            .children
            .borrow()
            .iter()
            .find(|child| child.is_element())
            .cloned()
    }

    /// Whether `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node.ptr_eq(self) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Whether the node is attached to its document.
    pub fn is_connected(&self) -> bool {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current.kind() == NodeKind::Document
    }

    /// Number of ancestors above this node.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(node) = current {
            depth += 1;
            current = node.parent();
        }
        depth
    }

    fn set_parent(&self, parent: Option<&Node>) {
        *self.0.parent.borrow_mut() = parent.map_or_else(Weak::new, |p| Rc::downgrade(&p.0));
    }

    fn index_of(&self, child: &Node) -> Option<usize> {
        self.0
            .children
            .borrow()
            .iter()
            .position(|candidate| candidate.ptr_eq(child))
    }

    /// Append `child`. A fragment moves its children instead of itself.
    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None` or not a child of this node.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if child.is_fragment() {
            let moved = std::mem::take(&mut *child.0.children.borrow_mut());
            for grandchild in &moved {
                grandchild.set_parent(None);
            }
            for grandchild in &moved {
                self.insert_before(grandchild, reference);
            }
            return;
        }
        if child.kind() == NodeKind::Document || child.contains(self) {
            tracing::warn!(child = child.id().raw(), "refusing to insert a node into itself");
            return;
        }

        child.remove();
        {
            let mut children = self.0.children.borrow_mut();
            let index = reference
                .and_then(|reference| children.iter().position(|c| c.ptr_eq(reference)))
                .unwrap_or(children.len());
            children.insert(index, child.clone());
        }
        child.set_parent(Some(self));
        self.record(MutationKind::ChildList);
    }

    /// Remove `child`; returns false if it is not a child of this node.
    pub fn remove_child(&self, child: &Node) -> bool {
        let Some(index) = self.index_of(child) else {
            return false;
        };
        self.0.children.borrow_mut().remove(index);
        child.set_parent(None);
        self.record(MutationKind::ChildList);
        true
    }

    /// Replace `old` with `new`; returns false if `old` is not a child.
    pub fn replace_child(&self, new: &Node, old: &Node) -> bool {
        if self.index_of(old).is_none() {
            return false;
        }
        if new.is_fragment() {
            self.insert_before(new, Some(old));
            return self.remove_child(old);
        }

        new.remove();
        let Some(index) = self.index_of(old) else {
            return false;
        };
        self.0.children.borrow_mut()[index] = new.clone();
        old.set_parent(None);
        new.set_parent(Some(self));
        self.record(MutationKind::ChildList);
        true
    }

    /// Detach this node from its parent, if any.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.remove_child(self);
        }
    }

    // ------------------------------------------------------------------
    // Attributes and text
    // ------------------------------------------------------------------

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        match &self.0.data {
            NodeData::Element { attributes, .. } => attributes.borrow().get(name).cloned(),
            _ => None,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        match &self.0.data {
            NodeData::Element { attributes, .. } => attributes.borrow().contains_key(name),
            _ => false,
        }
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        match &self.0.data {
            NodeData::Element { attributes, .. } => attributes
                .borrow()
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        if let NodeData::Element { attributes, .. } = &self.0.data {
            attributes
                .borrow_mut()
                .insert(name.to_string(), value.to_string());
            self.record(MutationKind::Attribute {
                name: name.to_string(),
            });
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        if let NodeData::Element { attributes, .. } = &self.0.data {
            let removed = attributes.borrow_mut().shift_remove(name).is_some();
            if removed {
                self.record(MutationKind::Attribute {
                    name: name.to_string(),
                });
            }
        }
    }

    /// Text of a text node, or the concatenated text of a subtree.
    pub fn text(&self) -> String {
        match &self.0.data {
            NodeData::Text(text) => text.borrow().clone(),
            _ => self
                .0
                .children
                .borrow()
                .iter()
                .map(Node::text)
                .collect(),
        }
    }

    /// Replace the text of a text node, or every child of a container with
    /// one text node.
    pub fn set_text(&self, value: &str) {
        match &self.0.data {
            NodeData::Text(text) => {
                *text.borrow_mut() = value.to_string();
                self.record(MutationKind::Text);
            }
            _ => {
                for child in self.children() {
                    self.remove_child(&child);
                }
                let text = Node::new_text(&self.0.shared, value);
                self.append_child(&text);
            }
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Attach a listener. Capturing listeners on an ancestor see the event
    /// before the target does.
    pub fn add_event_listener<F>(&self, name: &str, capture: bool, callback: F) -> ListenerId
    where
        F: Fn(&Event) + 'static,
    {
        let listener = Listener::new(name, capture, Rc::new(callback));
        let id = listener.id;
        self.0.listeners.borrow_mut().push(listener);
        id
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.0.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    /// Number of native listeners registered for `name` on this node.
    pub fn listener_count(&self, name: &str) -> usize {
        self.0
            .listeners
            .borrow()
            .iter()
            .filter(|listener| listener.name == name)
            .count()
    }

    fn listeners_for(&self, name: &str, phase: impl Fn(bool) -> bool) -> Vec<Listener> {
        self.0
            .listeners
            .borrow()
            .iter()
            .filter(|listener| listener.name == name && phase(listener.capture))
            .cloned()
            .collect()
    }

    /// Dispatch `event` with this node as its target.
    ///
    /// Capturing listeners run from the outermost ancestor inwards, then the
    /// target's own listeners, then (for bubbling events) non-capturing
    /// listeners from the parent outwards.
    pub fn dispatch_event(&self, event: &Event) {
        event.set_target(self.clone());

        let mut ancestors = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            ancestors.push(node);
        }

        for node in ancestors.iter().rev() {
            for listener in node.listeners_for(event.name(), |capture| capture) {
                if event.is_propagation_stopped() {
                    return;
                }
                listener.invoke(event);
            }
        }

        if event.is_propagation_stopped() {
            return;
        }
        for listener in self.listeners_for(event.name(), |_| true) {
            listener.invoke(event);
        }

        if !event.bubbles() {
            return;
        }
        for node in &ancestors {
            if event.is_propagation_stopped() {
                return;
            }
            for listener in node.listeners_for(event.name(), |capture| !capture) {
                listener.invoke(event);
            }
        }
    }

    /// Dispatch a bubbling `click` event at this node.
    pub fn click(&self) {
        self.dispatch_event(&Event::new("click"));
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialized markup of this node's children.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.0.children.borrow().iter() {
            child.write_html(&mut out);
        }
        out
    }

    /// Serialized markup of this node.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match &self.0.data {
            NodeData::Text(text) => out.push_str(&escape_text(&text.borrow())),
            NodeData::Element { tag, attributes } => {
                let _ = write!(out, "<{tag}");
                for (name, value) in attributes.borrow().iter() {
                    let _ = write!(out, " {name}=\"{}\"", escape_attribute(value));
                }
                out.push('>');
                out.push_str(&self.inner_html());
                let _ = write!(out, "</{tag}>");
            }
            NodeData::Document | NodeData::Fragment => out.push_str(&self.inner_html()),
        }
    }

    /// Structural snapshot of this subtree.
    pub fn snapshot(&self) -> Snapshot {
        let children = || self.0.children.borrow().iter().map(Node::snapshot).collect();
        match &self.0.data {
            NodeData::Document => Snapshot::Document {
                children: children(),
            },
            NodeData::Element { tag, attributes } => Snapshot::Element {
                tag: tag.clone(),
                attributes: attributes.borrow().clone(),
                children: children(),
            },
            NodeData::Text(text) => Snapshot::Text {
                text: text.borrow().clone(),
            },
            NodeData::Fragment => Snapshot::Fragment {
                children: children(),
            },
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            NodeKind::Text => write!(f, "Text({:?})", self.text()),
            NodeKind::Element => write!(f, "<{}#{}>", self.tag().unwrap_or_default(), self.id().raw()),
            kind => write!(f, "{kind:?}#{}", self.id().raw()),
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
