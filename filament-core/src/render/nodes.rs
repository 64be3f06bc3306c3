//! Materialization
//!
//! Turns an element description into detached live nodes, depth first.
//! Children are built into a detached fragment and appended with a single
//! insertion. Post-render hooks are collected rather than run, because the
//! node they belong to may be merged into an existing element by the diff
//! and never enter the tree itself.

use std::rc::Rc;

use crate::config::Config;
use crate::dom::{Document, Node};
use crate::error::Result;
use crate::reactive::untrack;

use super::element::{format_number, Child, Element, RenderHook};
use super::props::apply_props;
use super::registry::{component_registry, RegistryKey};
use super::validation::{validate_depth, validate_tag};

/// Everything a render pass needs to know about its mount point.
pub(crate) struct Scope {
    pub(crate) document: Document,
    pub(crate) root: Node,
    pub(crate) key: RegistryKey,
    pub(crate) config: Rc<Config>,
}

impl Scope {
    pub(crate) fn new(document: &Document, root: &Node, selector: &str) -> Self {
        Self {
            document: document.clone(),
            root: root.clone(),
            key: RegistryKey::new(document.id(), selector),
            config: crate::config::current(),
        }
    }
}

/// Output of one materialization: the top-level nodes (a fragment
/// description yields several) and the post-render hooks found on the way.
pub(crate) struct Materialized {
    pub(crate) nodes: Vec<Node>,
    pub(crate) hooks: Vec<(Node, RenderHook)>,
}

pub(crate) struct Materializer<'a> {
    scope: &'a Scope,
    text_template: Node,
    hooks: Vec<(Node, RenderHook)>,
}

impl<'a> Materializer<'a> {
    pub(crate) fn new(scope: &'a Scope) -> Self {
        Self {
            scope,
            text_template: scope.document.create_text(""),
            hooks: Vec::new(),
        }
    }

    /// Materialize `element` as it would sit directly under the root.
    pub(crate) fn materialize(mut self, element: &Element) -> Result<Materialized> {
        let depth = self.scope.root.depth() + 1;
        let node = self.element(element, depth)?;
        let nodes = if node.is_fragment() {
            node.children()
        } else {
            vec![node]
        };
        Ok(Materialized {
            nodes,
            hooks: self.hooks,
        })
    }

    fn element(&mut self, element: &Element, depth: usize) -> Result<Node> {
        if let Some(hook) = element.pre_render_hook() {
            untrack(|| hook());
        }

        let Some(tag) = element.tag() else {
            let fragment = self.scope.document.create_fragment();
            self.children(&fragment, element.children_list(), depth)?;
            return Ok(fragment);
        };

        validate_depth(&self.scope.config, depth)?;
        validate_tag(&self.scope.config, tag)?;

        let node = self.scope.document.create_element(tag);
        apply_props(self.scope, &node, element)?;
        self.children(&node, element.children_list(), depth + 1)?;

        if let Some(hook) = element.render_hook() {
            self.hooks.push((node.clone(), Rc::clone(hook)));
        }
        Ok(node)
    }

    fn children(&mut self, parent: &Node, children: &[Child], depth: usize) -> Result<()> {
        let batch = self.scope.document.create_fragment();
        for child in children {
            self.child(&batch, child, depth)?;
        }
        parent.append_child(&batch);
        Ok(())
    }

    fn child(&mut self, batch: &Node, child: &Child, depth: usize) -> Result<()> {
        match child {
            Child::Empty => {}
            Child::Reactive(produce) => {
                for produced in produce() {
                    self.child(batch, &produced, depth)?;
                }
            }
            Child::Text(text) => batch.append_child(&self.text(text)),
            Child::Number(n) => batch.append_child(&self.text(&format_number(*n))),
            Child::Element(element) => {
                let node = self.element(element, depth)?;
                batch.append_child(&node);
            }
        }
        Ok(())
    }

    fn text(&self, text: &str) -> Node {
        let node = self.text_template.clone_shallow();
        node.set_text(text);
        node
    }
}

/// Run the hooks whose element made it into the live tree, registering any
/// cleanup they return.
pub(crate) fn run_render_hooks(scope: &Scope, hooks: Vec<(Node, RenderHook)>) {
    for (node, hook) in hooks {
        if !scope.document.contains(&node) {
            continue;
        }
        let cleanup = untrack(|| hook(&node));
        if let Some(cleanup) = cleanup {
            component_registry(&scope.key)
                .borrow_mut()
                .cleanups
                .insert(node.id(), (node, cleanup));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    use crate::error::Error;
    use crate::reactive::Cleanup;
    use crate::render::html;

    fn scope(doc: &Document) -> Scope {
        let root = doc.create_element("div");
        doc.body().append_child(&root);
        Scope::new(doc, &root, "#nodes-test")
    }

    #[test]
    fn materializes_nested_elements() {
        let doc = Document::new();
        let scope = scope(&doc);
        let element = html::ul()
            .classes("list")
            .child(html::li().child("one"))
            .child(html::li().child(2))
            .child(None::<Element>);

        let out = Materializer::new(&scope).materialize(&element).unwrap();
        assert_eq!(out.nodes.len(), 1);
        assert_eq!(
            out.nodes[0].outer_html(),
            "<ul class=\"list\"><li>one</li><li>2</li></ul>"
        );
    }

    #[test]
    fn fragments_splice_children() {
        let doc = Document::new();
        let scope = scope(&doc);
        let element = html::fragment()
            .child(html::span().child("a"))
            .child(html::fragment().child("b").child("c"));

        let out = Materializer::new(&scope).materialize(&element).unwrap();
        let html: Vec<_> = out.nodes.iter().map(Node::outer_html).collect();
        assert_eq!(html, vec!["<span>a</span>", "b", "c"]);
    }

    #[test]
    fn reactive_children_expand_in_place() {
        let doc = Document::new();
        let scope = scope(&doc);
        let items = Rc::new(RefCell::new(vec!["x", "y"]));
        let source = items.clone();
        let element = html::p().reactive(move || {
            source
                .borrow()
                .iter()
                .map(|item| html::b().child(*item).into())
                .collect()
        });

        let out = Materializer::new(&scope).materialize(&element).unwrap();
        assert_eq!(out.nodes[0].outer_html(), "<p><b>x</b><b>y</b></p>");
    }

    #[test]
    fn denied_tag_fails() {
        let doc = Document::new();
        let scope = scope(&doc);
        let element = html::div().child(Element::new("script"));
        let result = Materializer::new(&scope).materialize(&element);
        assert!(matches!(result, Err(Error::DisallowedTag { .. })));
    }

    #[test]
    fn depth_counts_from_the_root() {
        crate::config::set(Config {
            max_depth: 6,
            ..Config::default()
        });
        let doc = Document::new();
        let scope = scope(&doc);
        // The root sits at depth 3 (document > html > body > div).
        let shallow = html::div().child(html::div());
        let deep = html::div().child(html::div().child(html::div()));

        let shallow_result = Materializer::new(&scope).materialize(&shallow);
        let deep_result = Materializer::new(&scope).materialize(&deep);
        crate::config::set(Config::default());

        assert!(shallow_result.is_ok());
        assert_eq!(deep_result.err(), Some(Error::MaxDepthExceeded { limit: 6 }));
    }

    #[test]
    fn hooks_run_only_for_connected_nodes() {
        let doc = Document::new();
        let scope = scope(&doc);
        let pre = Rc::new(Cell::new(0));
        let post = Rc::new(Cell::new(0));
        let (pre2, post2) = (pre.clone(), post.clone());
        let element = html::div()
            .on_pre_render(move || pre2.set(pre2.get() + 1))
            .on_render(move |_| {
                post2.set(post2.get() + 1);
                Some(Cleanup::new(|| {}))
            });

        let out = Materializer::new(&scope).materialize(&element).unwrap();
        assert_eq!(pre.get(), 1);
        assert_eq!(post.get(), 0);

        let detached = Materialized {
            nodes: out.nodes.clone(),
            hooks: out.hooks.clone(),
        };
        run_render_hooks(&scope, detached.hooks);
        assert_eq!(post.get(), 0);

        scope.root.append_child(&out.nodes[0]);
        run_render_hooks(&scope, out.hooks);
        assert_eq!(post.get(), 1);
        assert_eq!(
            crate::render::registry::with_registry(&scope.key, |r| r.cleanup_count()),
            Some(1)
        );
        crate::render::registry::cleanup_component_registry(&scope.key);
    }
}
