//! Filament Core
//!
//! This crate provides the core runtime for the Filament reactive UI
//! framework. It implements:
//!
//! - Reactive primitives (signals, computed values, effects, batches)
//! - An in-memory document tree with native events
//! - An incremental renderer with node diffing and delegated events
//! - Stores: named groups of signals with batched updates
//!
//! Execution is single-threaded. All reactive and renderer state lives in
//! thread-locals, so each thread is an independent execution context.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `dom`: The live document tree the renderer projects onto
//! - `render`: Element descriptions, materialization, diffing and delegation
//! - `store`: Signal groups over JSON values
//! - `config`: Runtime limits
//! - `error`: The crate-wide error type
//!
//! # Example
//!
//! ```rust
//! use filament_core::dom::Document;
//! use filament_core::reactive::{Computed, Signal};
//! use filament_core::render::{html, render, View};
//!
//! let doc = Document::new();
//! let app = doc.create_element("div");
//! app.set_attribute("id", "app");
//! doc.body().append_child(&app);
//!
//! // Create a signal and a derived value
//! let count = Signal::new(1);
//! let c = count.clone();
//! let doubled = Computed::new(move || c.get() * 2);
//!
//! // Mount a view that reads the derived value
//! let d = doubled.clone();
//! let handle = render(&doc, View::reactive(move || html::p().child(d.get())), "#app").unwrap();
//! assert_eq!(app.inner_html(), "<p>2</p>");
//!
//! // Update the signal; the view patches itself
//! count.set(5).unwrap();
//! assert_eq!(app.inner_html(), "<p>10</p>");
//!
//! handle.dispose();
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod reactive;
pub mod render;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
