//! Node Diffing
//!
//! Patches a live node in place against a freshly materialized one.
//! Children are matched by position; there is no keyed reconciliation.

use crate::config::Config;
use crate::dom::{Node, NodeKind};

use super::events::{adopt_events, replace_events};
use super::nodes::Scope;

/// Reconcile the children of the live `parent` against `next`, position by
/// position up to the longer of the two lists.
pub(crate) fn reconcile_children(scope: &Scope, parent: &Node, next: Vec<Node>) {
    let current = parent.children();
    let len = current.len().max(next.len());
    for index in 0..len {
        match (current.get(index), next.get(index)) {
            (Some(current), None) => {
                parent.remove_child(current);
            }
            (None, Some(next)) => parent.append_child(next),
            (Some(current), Some(next)) => diff_nodes(scope, parent, current, next),
            (None, None) => {}
        }
    }
}

/// Patch `current` (a live child of `parent`) to look like `next`.
pub(crate) fn diff_nodes(scope: &Scope, parent: &Node, current: &Node, next: &Node) {
    match (current.kind(), next.kind()) {
        (NodeKind::Text, NodeKind::Text) => {
            let text = next.text();
            if current.text() != text {
                current.set_text(&text);
            }
        }
        (NodeKind::Element, NodeKind::Element) if current.tag() == next.tag() => {
            reconcile_attributes(&scope.config, current, next);
            adopt_events(&scope.key, current, next);
            reconcile_children(scope, current, next.children());
        }
        _ => {
            replace_events(&scope.key, current, next);
            if !parent.replace_child(next, current) {
                tracing::warn!(node = current.id().raw(), "node replacement failed: invalid parent reference");
            }
        }
    }
}

/// Remove attributes `next` lacks and set those whose values differ.
/// Framework marker classes on `current` survive a class update.
fn reconcile_attributes(config: &Config, current: &Node, next: &Node) {
    let markers: Vec<String> = current
        .get_attribute("class")
        .unwrap_or_default()
        .split_whitespace()
        .filter(|class| class.starts_with(config.marker_class_prefix.as_str()))
        .map(str::to_string)
        .collect();

    for (name, _) in current.attributes() {
        if !next.has_attribute(&name) {
            current.remove_attribute(&name);
        }
    }

    for (name, value) in next.attributes() {
        let value = if name == "class" {
            merge_classes(&markers, &value)
        } else {
            value
        };
        if current.get_attribute(&name).as_deref() != Some(value.as_str()) {
            current.set_attribute(&name, &value);
        }
    }
}

fn merge_classes(markers: &[String], next: &str) -> String {
    let next: Vec<&str> = next.split_whitespace().collect();
    markers
        .iter()
        .map(String::as_str)
        .filter(|marker| !next.contains(marker))
        .chain(next.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, MutationKind};

    fn setup() -> (Document, Scope) {
        let doc = Document::new();
        let root = doc.create_element("div");
        doc.body().append_child(&root);
        let scope = Scope::new(&doc, &root, "#diff-test");
        (doc, scope)
    }

    fn element(doc: &Document, tag: &str, attrs: &[(&str, &str)], text: &str) -> Node {
        let node = doc.create_element(tag);
        for (name, value) in attrs {
            node.set_attribute(name, value);
        }
        if !text.is_empty() {
            node.append_child(&doc.create_text(text));
        }
        node
    }

    #[test]
    fn identical_nodes_produce_no_mutations() {
        let (doc, scope) = setup();
        let live = element(&doc, "p", &[("id", "a"), ("class", "x")], "hello");
        scope.root.append_child(&live);

        doc.observe();
        let next = element(&doc, "p", &[("id", "a"), ("class", "x")], "hello");
        diff_nodes(&scope, &scope.root, &live, &next);
        assert!(doc.take_mutations().is_empty());
    }

    #[test]
    fn text_changes_patch_in_place() {
        let (doc, scope) = setup();
        let live = element(&doc, "p", &[], "old");
        scope.root.append_child(&live);
        let text_node = live.first_child().unwrap();

        doc.observe();
        diff_nodes(&scope, &scope.root, &live, &element(&doc, "p", &[], "new"));

        assert_eq!(live.text(), "new");
        assert!(live.first_child().unwrap().ptr_eq(&text_node));
        let mutations = doc.take_mutations();
        assert_eq!(mutations.len(), 1);
        assert_eq!(mutations[0].target, text_node.id());
        assert_eq!(mutations[0].kind, MutationKind::Text);
    }

    #[test]
    fn different_tags_are_replaced() {
        let (doc, scope) = setup();
        let live = element(&doc, "p", &[], "a");
        scope.root.append_child(&live);
        let next = element(&doc, "span", &[], "a");

        diff_nodes(&scope, &scope.root, &live, &next);
        assert!(scope.root.first_child().unwrap().ptr_eq(&next));
        assert!(live.parent().is_none());
    }

    #[test]
    fn attributes_reconcile_and_keep_markers() {
        let (doc, scope) = setup();
        let live = element(&doc, "div", &[("class", "h-root old"), ("title", "t"), ("style", "color: red")], "");
        scope.root.append_child(&live);
        let next = element(&doc, "div", &[("class", "new"), ("style", "color: blue")], "");

        diff_nodes(&scope, &scope.root, &live, &next);
        assert_eq!(live.get_attribute("class").as_deref(), Some("h-root new"));
        assert_eq!(live.get_attribute("style").as_deref(), Some("color: blue"));
        assert!(!live.has_attribute("title"));
    }

    #[test]
    fn children_grow_and_shrink() {
        let (doc, scope) = setup();
        let list = doc.create_element("ul");
        for text in ["a", "b", "c"] {
            list.append_child(&element(&doc, "li", &[], text));
        }
        scope.root.append_child(&list);

        let shorter = doc.create_element("ul");
        shorter.append_child(&element(&doc, "li", &[], "a"));
        diff_nodes(&scope, &scope.root, &list, &shorter);
        assert_eq!(list.inner_html(), "<li>a</li>");

        let longer = doc.create_element("ul");
        for text in ["a", "b"] {
            longer.append_child(&element(&doc, "li", &[], text));
        }
        diff_nodes(&scope, &scope.root, &list, &longer);
        assert_eq!(list.inner_html(), "<li>a</li><li>b</li>");
    }

    #[test]
    fn merge_classes_dedupes_markers() {
        let markers = vec!["h-a".to_string(), "h-b".to_string()];
        assert_eq!(merge_classes(&markers, "h-b x"), "h-a h-b x");
        assert_eq!(merge_classes(&[], "x  y"), "x y");
    }
}
