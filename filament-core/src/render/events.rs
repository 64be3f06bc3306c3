//! Event Delegation
//!
//! Handlers are never attached to the element that declares them. The
//! first time an event name is used under a root, one capturing listener
//! for that name is attached to the root element; on dispatch it looks up
//! the exact target in the registry and calls the handler bound there.

use indexmap::IndexMap;

use crate::dom::{Document, Node};

use super::element::EventHandler;
use super::nodes::Scope;
use super::registry::{component_registry, with_registry, Bindings, RegistryKey};

/// Bind `handler` for `event` on `node` under the scope's root.
pub(crate) fn attach_event(scope: &Scope, node: &Node, event: &str, handler: EventHandler) {
    let registry = component_registry(&scope.key);
    let needs_root_listener = {
        let mut registry = registry.borrow_mut();
        registry
            .events
            .entry(node.id())
            .or_insert_with(|| Bindings {
                node: node.clone(),
                handlers: IndexMap::new(),
            })
            .handlers
            .insert(event.to_string(), handler);
        !registry.event_names.contains(event)
    };

    if needs_root_listener {
        let key = scope.key.clone();
        let name = event.to_string();
        let listener = scope.root.add_event_listener(event, true, move |event| {
            let Some(target) = event.target() else {
                return;
            };
            let handler = with_registry(&key, |registry| registry.handler(target.id(), &name)).flatten();
            if let Some(handler) = handler {
                handler.call(event);
            }
        });

        let mut registry = registry.borrow_mut();
        registry.event_names.insert(event.to_string());
        registry.root_listeners.push(listener);
        tracing::debug!(selector = %scope.key.selector, event, "delegated listener attached");
    }
}

/// Copy `old`'s bindings onto `new` for every event `new` does not bind
/// itself. Used when the diff replaces an element wholesale.
pub(crate) fn replace_events(key: &RegistryKey, old: &Node, new: &Node) {
    let registry = component_registry(key);
    let mut registry = registry.borrow_mut();
    let Some(old_bindings) = registry.events.get(&old.id()) else {
        return;
    };
    let inherited = old_bindings.handlers.clone();
    let bindings = registry.events.entry(new.id()).or_insert_with(|| Bindings {
        node: new.clone(),
        handlers: IndexMap::new(),
    });
    for (event, handler) in inherited {
        bindings.handlers.entry(event).or_insert(handler);
    }
}

/// Give `current` exactly the bindings `next` declared. Used when the diff
/// merges `next` into the live element `current`.
pub(crate) fn adopt_events(key: &RegistryKey, current: &Node, next: &Node) {
    let registry = component_registry(key);
    let mut registry = registry.borrow_mut();
    match registry.events.shift_remove(&next.id()) {
        Some(bindings) => {
            registry.events.insert(
                current.id(),
                Bindings {
                    node: current.clone(),
                    handlers: bindings.handlers,
                },
            );
        }
        None => {
            registry.events.shift_remove(&current.id());
        }
    }
}

/// Detach every delegated listener from `root`.
pub(crate) fn remove_delegated_listeners(key: &RegistryKey, root: &Node) {
    let Some(listeners) = with_registry(key, |registry| registry.root_listeners.clone()) else {
        return;
    };
    for listener in listeners {
        root.remove_event_listener(listener);
    }
    let registry = component_registry(key);
    let mut registry = registry.borrow_mut();
    registry.root_listeners.clear();
    registry.event_names.clear();
}

/// Drop bindings of elements that are no longer in the document, and run
/// the cleanups registered for them.
pub(crate) fn cleanup_delegated_events(key: &RegistryKey, document: &Document) {
    let registry = component_registry(key);
    let dead_cleanups = {
        let mut registry = registry.borrow_mut();
        let before = registry.events.len();
        registry
            .events
            .retain(|_, bindings| document.contains(&bindings.node));
        let swept = before - registry.events.len();

        let (live, dead): (IndexMap<_, _>, IndexMap<_, _>) = std::mem::take(&mut registry.cleanups)
            .into_iter()
            .partition(|(_, (node, _))| document.contains(node));
        registry.cleanups = live;

        if swept > 0 || !dead.is_empty() {
            tracing::debug!(
                selector = %key.selector,
                swept,
                cleanups = dead.len(),
                "swept dead elements"
            );
        }
        dead
    };

    for (_, (_, cleanup)) in dead_cleanups {
        cleanup.run();
    }
}
