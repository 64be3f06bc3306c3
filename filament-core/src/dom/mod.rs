//! In-Memory Document
//!
//! The renderer targets this tree: elements with ordered attributes, text
//! nodes, fragments, native event listeners with capture and bubble phases,
//! a small selector engine and an opt-in mutation log.
//!
//! # Mutation records
//!
//! While a document is observing, every change to a node that is connected
//! at the moment of the change is appended to the log. Building a detached
//! subtree and then inserting it records a single child-list change on the
//! parent. Tests use this to assert that a re-render touched only what it
//! had to.

mod event;
mod node;
mod selector;

pub use event::{Event, ListenerId};
pub use node::{Mutation, MutationKind, Node, NodeId, NodeKind, Snapshot};
pub use selector::Selector;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use node::Shared;

/// Identifies a document; render registries are scoped by it.
pub type DocumentId = u64;

/// A document tree rooted at a document node holding `<html><body>`.
#[derive(Clone)]
pub struct Document {
    shared: Rc<Shared>,
    root: Node,
    body: Node,
}

impl Document {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let shared = Rc::new(Shared {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            observing: Cell::new(false),
            mutations: RefCell::new(Vec::new()),
        });

        let root = Node::new_document(&shared);
        let html = Node::new_element(&shared, "html");
        let body = Node::new_element(&shared, "body");
        html.append_child(&body);
        root.append_child(&html);

        Self { shared, root, body }
    }

    pub fn id(&self) -> DocumentId {
        self.shared.id
    }

    /// The document node itself.
    pub fn root(&self) -> Node {
        self.root.clone()
    }

    pub fn body(&self) -> Node {
        self.body.clone()
    }

    pub fn create_element(&self, tag: &str) -> Node {
        Node::new_element(&self.shared, tag)
    }

    pub fn create_text(&self, text: &str) -> Node {
        Node::new_text(&self.shared, text)
    }

    pub fn create_fragment(&self) -> Node {
        Node::new_fragment(&self.shared)
    }

    /// First connected element matching `selector`, in document order.
    pub fn query_selector(&self, selector: &str) -> Option<Node> {
        let selector = Selector::parse(selector)?;
        selector::descendants(&self.root)
            .into_iter()
            .find(|node| selector.matches(node))
    }

    /// Every connected element matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Vec<Node> {
        let Some(selector) = Selector::parse(selector) else {
            return Vec::new();
        };
        selector::descendants(&self.root)
            .into_iter()
            .filter(|node| selector.matches(node))
            .collect()
    }

    /// Whether `node` is part of this document's live tree.
    pub fn contains(&self, node: &Node) -> bool {
        self.root.contains(node)
    }

    /// Start recording mutations. Any previous log is discarded.
    pub fn observe(&self) {
        self.shared.mutations.borrow_mut().clear();
        self.shared.observing.set(true);
    }

    pub fn stop_observing(&self) {
        self.shared.observing.set(false);
    }

    /// Drain the mutation log.
    pub fn take_mutations(&self) -> Vec<Mutation> {
        std::mem::take(&mut *self.shared.mutations.borrow_mut())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document").field("id", &self.shared.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
