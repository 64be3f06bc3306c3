//! Events and native listeners.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::node::Node;

/// Handle returned by [`Node::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

pub(crate) type Callback = Rc<dyn Fn(&Event)>;

#[derive(Clone)]
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) name: String,
    pub(crate) capture: bool,
    callback: Callback,
}

impl Listener {
    pub(crate) fn new(name: &str, capture: bool, callback: Callback) -> Self {
        Self {
            id: ListenerId::new(),
            name: name.to_string(),
            capture,
            callback,
        }
    }

    pub(crate) fn invoke(&self, event: &Event) {
        (self.callback)(event);
    }
}

/// An event travelling through the tree.
pub struct Event {
    name: String,
    bubbles: bool,
    target: RefCell<Option<Node>>,
    propagation_stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl Event {
    /// A bubbling event.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bubbles: true,
            target: RefCell::new(None),
            propagation_stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    /// An event that only reaches capturing ancestors and the target.
    pub fn non_bubbling(name: impl Into<String>) -> Self {
        Self {
            bubbles: false,
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// The node the event was dispatched at.
    pub fn target(&self) -> Option<Node> {
        self.target.borrow().clone()
    }

    pub(crate) fn set_target(&self, target: Node) {
        *self.target.borrow_mut() = Some(target);
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("bubbles", &self.bubbles)
            .field("target", &self.target.borrow())
            .finish()
    }
}
