//! Render Entry Point
//!
//! [`render`] mounts a view under the single node matching a selector. A
//! static view is rendered once. A reactive view runs inside an effect, so
//! every signal read while building the description (reactive children
//! included) re-renders the root when it changes. Each pass reconciles the
//! root's children against the new nodes and then sweeps bindings of
//! elements that left the tree.

use std::cell::Cell;
use std::rc::Rc;

use crate::dom::{Document, Node};
use crate::error::{Error, Result};
use crate::reactive::Effect;

use super::diff::reconcile_children;
use super::element::Element;
use super::events::{cleanup_delegated_events, remove_delegated_listeners};
use super::nodes::{run_render_hooks, Materializer, Scope};
use super::registry::{cleanup_component_registry, reset_component_registry, with_registry, RegistryKey};

/// What to mount: a fixed description or a function producing one.
#[derive(Clone)]
pub enum View {
    Static(Element),
    Reactive(Rc<dyn Fn() -> Element>),
}

impl View {
    pub fn reactive<F>(f: F) -> Self
    where
        F: Fn() -> Element + 'static,
    {
        Self::Reactive(Rc::new(f))
    }
}

impl From<Element> for View {
    fn from(element: Element) -> Self {
        Self::Static(element)
    }
}

/// The only node matching `selector`.
pub fn root_element(document: &Document, selector: &str) -> Result<Node> {
    let mut matches = document.query_selector_all(selector);
    match matches.len() {
        0 => Err(Error::RootNotFound {
            selector: selector.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(Error::AmbiguousRoot {
            selector: selector.to_string(),
            count,
        }),
    }
}

fn render_pass(scope: &Scope, element: &Element) -> Result<()> {
    let materialized = Materializer::new(scope).materialize(element)?;
    tracing::debug!(
        selector = %scope.key.selector,
        nodes = materialized.nodes.len(),
        "render pass"
    );
    reconcile_children(scope, &scope.root, materialized.nodes);
    run_render_hooks(scope, materialized.hooks);
    cleanup_delegated_events(&scope.key, &scope.document);
    Ok(())
}

/// Mount `view` under the node matching `selector`.
///
/// The selector must match exactly one node. A reactive view's first pass
/// runs before this returns, so mount errors surface here; errors from
/// later passes are returned by the signal write that triggered them.
///
/// # Example
///
/// ```rust
/// use filament_core::dom::Document;
/// use filament_core::reactive::Signal;
/// use filament_core::render::{html, render, View};
///
/// let doc = Document::new();
/// let app = doc.create_element("div");
/// app.set_attribute("id", "app");
/// doc.body().append_child(&app);
///
/// let count = Signal::new(0);
/// let c = count.clone();
/// let handle = render(
///     &doc,
///     View::reactive(move || html::p().child(format!("count: {}", c.get()))),
///     "#app",
/// )
/// .unwrap();
///
/// count.set(2).unwrap();
/// assert_eq!(app.inner_html(), "<p>count: 2</p>");
/// handle.dispose();
/// ```
pub fn render(document: &Document, view: impl Into<View>, selector: &str) -> Result<RenderHandle> {
    let root = root_element(document, selector)?;
    let scope = Rc::new(Scope::new(document, &root, selector));
    tracing::debug!(selector, document = document.id(), "mounting");

    let effect = match view.into() {
        View::Static(element) => {
            if let Err(error) = render_pass(&scope, &element) {
                teardown(&scope.key, &root);
                return Err(error);
            }
            None
        }
        View::Reactive(build) => {
            let pass_scope = Rc::clone(&scope);
            match Effect::new(move || render_pass(&pass_scope, &build())) {
                Ok(effect) => Some(effect),
                Err(error) => {
                    teardown(&scope.key, &root);
                    return Err(error);
                }
            }
        }
    };

    Ok(RenderHandle {
        key: scope.key.clone(),
        root,
        effect,
        disposed: Cell::new(false),
    })
}

fn teardown(key: &RegistryKey, root: &Node) {
    remove_delegated_listeners(key, root);
    cleanup_component_registry(key);
}

/// Disposer for a mounted view.
#[must_use = "dropping the handle leaves the view mounted with no way to dispose it"]
pub struct RenderHandle {
    key: RegistryKey,
    root: Node,
    effect: Option<Effect>,
    disposed: Cell<bool>,
}

impl RenderHandle {
    /// The node the view is mounted under.
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn selector(&self) -> &str {
        &self.key.selector
    }

    /// The render effect of a reactive view.
    pub fn effect(&self) -> Option<&Effect> {
        self.effect.as_ref()
    }

    /// Delegated event names currently bound at the root.
    pub fn event_names(&self) -> Vec<String> {
        with_registry(&self.key, |registry| registry.event_names()).unwrap_or_default()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Detach delegated listeners, run registered cleanups, stop the render
    /// effect and drop the registry entry. Repeated calls are no-ops.
    ///
    /// The rendered nodes stay in the document.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        teardown(&self.key, &self.root);
        if let Some(effect) = &self.effect {
            effect.dispose();
        }
        reset_component_registry(&self.key);
        tracing::debug!(selector = %self.key.selector, "render disposed");
    }
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandle")
            .field("selector", &self.key.selector)
            .field("root", &self.root)
            .field("disposed", &self.disposed.get())
            .finish()
    }
}
