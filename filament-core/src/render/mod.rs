//! Incremental Renderer
//!
//! Projects element descriptions onto a [`Document`](crate::dom::Document)
//! and keeps the projection in sync.
//!
//! # Pipeline
//!
//! 1. **Materialize**: build detached live nodes from the description,
//!    validating tags and depth and applying props.
//! 2. **Diff**: patch the root's existing children in place against the new
//!    nodes, position by position.
//! 3. **Hooks**: run post-render hooks of elements that entered the tree.
//! 4. **Sweep**: drop delegated bindings and cleanups of elements that left
//!    the tree.
//!
//! Event handlers are delegated: one capturing listener per event name sits
//! on the root element, however many elements declare handlers.

mod core;
mod diff;
mod element;
mod events;
mod nodes;
mod props;
pub(crate) mod registry;
pub mod sanitize;
mod validation;

pub use self::core::{render, root_element, RenderHandle, View};
pub use element::{html, AttrValue, Child, ClassValue, Element, EventHandler, Prop};
pub use registry::{with_registry, ComponentRegistry, RegistryKey};
