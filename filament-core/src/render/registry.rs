//! Component Registry
//!
//! One entry per mounted root, keyed by the document and the root selector.
//! An entry tracks the delegated event names bound at the root, the
//! handlers each live element declared, the native listeners on the root
//! element and the cleanups returned by post-render hooks.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::dom::{DocumentId, ListenerId, Node, NodeId};
use crate::reactive::Cleanup;

use super::element::EventHandler;

/// Identifies one mounted root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    pub document: DocumentId,
    pub selector: String,
}

impl RegistryKey {
    pub fn new(document: DocumentId, selector: impl Into<String>) -> Self {
        Self {
            document,
            selector: selector.into(),
        }
    }
}

/// Handlers one element declared, by event name.
pub(crate) struct Bindings {
    pub(crate) node: Node,
    pub(crate) handlers: IndexMap<String, EventHandler>,
}

#[derive(Default)]
pub struct ComponentRegistry {
    pub(crate) event_names: IndexSet<String>,
    pub(crate) events: IndexMap<NodeId, Bindings>,
    pub(crate) root_listeners: Vec<ListenerId>,
    pub(crate) cleanups: IndexMap<NodeId, (Node, Cleanup)>,
}

impl ComponentRegistry {
    /// Delegated event names bound at the root.
    pub fn event_names(&self) -> Vec<String> {
        self.event_names.iter().cloned().collect()
    }

    /// Number of elements with at least one delegated handler.
    pub fn bound_elements(&self) -> usize {
        self.events.len()
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleanups.len()
    }

    pub(crate) fn handler(&self, node: NodeId, event: &str) -> Option<EventHandler> {
        self.events.get(&node)?.handlers.get(event).cloned()
    }
}

type Shared = Rc<RefCell<ComponentRegistry>>;

thread_local! {
    static REGISTRIES: RefCell<HashMap<RegistryKey, Shared>> = RefCell::new(HashMap::new());
}

/// The entry for `key`, created on first access.
pub(crate) fn component_registry(key: &RegistryKey) -> Shared {
    REGISTRIES.with(|registries| {
        Rc::clone(
            registries
                .borrow_mut()
                .entry(key.clone())
                .or_default(),
        )
    })
}

/// Run `f` against the entry for `key`, if one exists.
pub fn with_registry<R>(key: &RegistryKey, f: impl FnOnce(&ComponentRegistry) -> R) -> Option<R> {
    let entry = REGISTRIES.with(|registries| registries.borrow().get(key).cloned())?;
    let registry = entry.borrow();
    Some(f(&registry))
}

/// Drop the entry for `key`. The next access starts from an empty one.
pub(crate) fn reset_component_registry(key: &RegistryKey) {
    REGISTRIES.with(|registries| registries.borrow_mut().remove(key));
}

/// Run every registered cleanup and remove the entry for `key`.
pub(crate) fn cleanup_component_registry(key: &RegistryKey) {
    let Some(entry) = REGISTRIES.with(|registries| registries.borrow_mut().remove(key)) else {
        return;
    };
    let cleanups = std::mem::take(&mut entry.borrow_mut().cleanups);
    tracing::debug!(selector = %key.selector, cleanups = cleanups.len(), "tearing down component registry");
    for (_, (_, cleanup)) in cleanups {
        cleanup.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::dom::Document;

    #[test]
    fn entries_are_created_on_first_access() {
        let key = RegistryKey::new(u64::MAX, "#created");
        assert!(with_registry(&key, |_| ()).is_none());
        component_registry(&key);
        assert_eq!(with_registry(&key, |r| r.bound_elements()), Some(0));
        cleanup_component_registry(&key);
        assert!(with_registry(&key, |_| ()).is_none());
    }

    #[test]
    fn cleanup_runs_registered_cleanups_once() {
        let doc = Document::new();
        let key = RegistryKey::new(doc.id(), "#app");
        let ran = Rc::new(Cell::new(0));
        let node = doc.create_element("div");
        let r = ran.clone();
        component_registry(&key)
            .borrow_mut()
            .cleanups
            .insert(node.id(), (node, Cleanup::new(move || r.set(r.get() + 1))));

        cleanup_component_registry(&key);
        cleanup_component_registry(&key);
        assert_eq!(ran.get(), 1);
    }

    #[test]
    fn reset_drops_the_entry() {
        let doc = Document::new();
        let key = RegistryKey::new(doc.id(), "#reset");
        component_registry(&key)
            .borrow_mut()
            .event_names
            .insert("click".into());
        reset_component_registry(&key);
        assert!(with_registry(&key, |_| ()).is_none());

        // Recreated empty on the next access
        assert!(component_registry(&key).borrow().event_names.is_empty());
        reset_component_registry(&key);
    }
}
