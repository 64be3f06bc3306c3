//! Property Application
//!
//! Dispatch by key: `classes`/`css` become the `class` attribute, `data`
//! expands to `data-*` attributes, `on*` keys bind delegated handlers and
//! everything else is a sanitized attribute.

use crate::dom::Node;
use crate::error::{Error, Result};

use super::element::{AttrValue, Element, Prop};
use super::events::attach_event;
use super::nodes::Scope;
use super::sanitize::{sanitize_url, sanitize_value, should_sanitize_prop};
use super::validation::validate_event_handler;

/// Apply every prop of `element` to the freshly created `node`.
pub(crate) fn apply_props(scope: &Scope, node: &Node, element: &Element) -> Result<()> {
    for (key, prop) in element.props() {
        if prop.is_falsy() {
            continue;
        }
        match (key.as_str(), prop) {
            ("classes" | "css", prop) => regular_prop(node, "class", prop),
            ("data", Prop::Data(entries)) => {
                for (name, value) in entries {
                    let attribute = format!("data-{name}");
                    let sanitized = value.to_attr().map(|text| sanitize_value(&text));
                    match sanitized.filter(|text| !text.is_empty()) {
                        Some(text) => node.set_attribute(&attribute, &text),
                        None => node.remove_attribute(&attribute),
                    }
                }
            }
            (key, prop) if key.starts_with("on") => event_prop(scope, node, key, prop)?,
            (key, prop) => regular_prop(node, key, prop),
        }
    }
    Ok(())
}

fn event_prop(scope: &Scope, node: &Node, key: &str, prop: &Prop) -> Result<()> {
    let Prop::Handler(handler) = prop else {
        return Err(Error::HandlerNotCallable {
            key: key.to_string(),
        });
    };
    let event = key[2..].to_ascii_lowercase();
    validate_event_handler(&scope.config, &event, handler)?;
    attach_event(scope, node, &event, handler.clone());
    Ok(())
}

fn regular_prop(node: &Node, key: &str, prop: &Prop) {
    let value = match prop {
        Prop::Value(value) => value.clone(),
        Prop::Dynamic(resolve) => resolve(),
        Prop::Classes(classes) => AttrValue::Text(classes.to_class_string()),
        Prop::Data(_) | Prop::Handler(_) => {
            tracing::warn!(key, "ignoring structured value on a plain attribute");
            return;
        }
    };
    if value.is_falsy() {
        node.remove_attribute(key);
        return;
    }
    update_attribute(node, key, value.to_attr());
}

/// Sanitize and set `value`, or remove the attribute when nothing survives.
fn update_attribute(node: &Node, key: &str, value: Option<String>) {
    let sanitized = value.map(|text| {
        if should_sanitize_prop(key) {
            sanitize_url(&text)
        } else {
            sanitize_value(&text)
        }
    });
    match sanitized.filter(|text| !text.is_empty()) {
        Some(text) => node.set_attribute(key, &text),
        None => node.remove_attribute(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::dom::Document;
    use crate::render::element::{html, EventHandler};
    use crate::render::registry::{cleanup_component_registry, with_registry};

    fn scope(doc: &Document, selector: &str) -> Scope {
        let root = doc.create_element("div");
        doc.body().append_child(&root);
        Scope::new(doc, &root, selector)
    }

    #[test]
    fn classes_and_data_expand() {
        let doc = Document::new();
        let scope = scope(&doc, "#props-classes");
        let node = doc.create_element("div");
        let element = html::div()
            .classes([("active", true), ("hidden", false)])
            .data("id", 42)
            .data("label", "a<b>");

        apply_props(&scope, &node, &element).unwrap();
        assert_eq!(node.get_attribute("class").as_deref(), Some("active"));
        assert_eq!(node.get_attribute("data-id").as_deref(), Some("42"));
        assert_eq!(node.get_attribute("data-label").as_deref(), Some("ab"));
    }

    #[test]
    fn urls_are_sanitized() {
        let doc = Document::new();
        let scope = scope(&doc, "#props-urls");
        let safe = doc.create_element("a");
        let unsafe_link = doc.create_element("a");

        apply_props(&scope, &safe, &html::a().attr("href", "https://x.dev/?q=1")).unwrap();
        apply_props(&scope, &unsafe_link, &html::a().attr("href", "javascript:alert(1)")).unwrap();

        assert_eq!(safe.get_attribute("href").as_deref(), Some("https://x.dev/?q=1"));
        assert!(!unsafe_link.has_attribute("href"));
    }

    #[test]
    fn falsy_and_dynamic_values() {
        let doc = Document::new();
        let scope = scope(&doc, "#props-dynamic");
        let node = doc.create_element("input");
        let element = html::input()
            .attr("disabled", false)
            .attr("placeholder", None::<String>)
            .attr("value", "")
            .attr_fn("title", || "computed");

        apply_props(&scope, &node, &element).unwrap();
        assert_eq!(node.attributes(), vec![("title".to_string(), "computed".to_string())]);
    }

    #[test]
    fn handlers_are_validated_and_delegated() {
        let doc = Document::new();
        let scope = scope(&doc, "#props-handlers");
        let node = doc.create_element("button");

        let not_callable = html::button().attr("onclick", "alert(1)");
        assert_eq!(
            apply_props(&scope, &node, &not_callable),
            Err(Error::HandlerNotCallable { key: "onclick".into() })
        );

        let flagged = html::button().handler("click", EventHandler::labeled("eval(code)", |_| {}));
        assert_eq!(
            apply_props(&scope, &node, &flagged),
            Err(Error::UnsafeHandler { event: "click".into() })
        );

        let clicks = Rc::new(std::cell::Cell::new(0));
        let c = clicks.clone();
        let ok = html::button().on("click", move |_| c.set(c.get() + 1));
        apply_props(&scope, &node, &ok).unwrap();
        assert!(!node.has_attribute("onclick"));
        assert_eq!(node.listener_count("click"), 0);
        assert_eq!(scope.root.listener_count("click"), 1);

        scope.root.append_child(&node);
        node.click();
        assert_eq!(clicks.get(), 1);
        assert_eq!(with_registry(&scope.key, |r| r.bound_elements()), Some(1));
        cleanup_component_registry(&scope.key);
    }
}
