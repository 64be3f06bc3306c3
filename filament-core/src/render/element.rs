//! Element Descriptions
//!
//! An [`Element`] is a plain description of a subtree: a tag (or none, for a
//! fragment), properties, children and two optional lifecycle hooks. The
//! renderer builds a fresh description on every pass and never mutates it.
//!
//! Children and property values are closed enums decided when the
//! description is built, so the renderer dispatches with a `match`.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dom::{Event, Node};
use crate::reactive::{Cleanup, Computed, Signal};

/// A scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Bool(bool),
    None,
}

impl AttrValue {
    /// `None` and `false` are skipped entirely when props are applied.
    pub fn is_falsy(&self) -> bool {
        matches!(self, Self::None | Self::Bool(false))
    }

    /// The attribute text, or `None` when the attribute should be absent.
    pub(crate) fn to_attr(&self) -> Option<String> {
        match self {
            Self::Text(text) if text.is_empty() => None,
            Self::Text(text) => Some(text.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Bool(true) => Some("true".to_string()),
            Self::Bool(false) | Self::None => None,
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

macro_rules! numeric_conversions {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for AttrValue {
                fn from(value: $ty) -> Self {
                    Self::Number(value as f64)
                }
            }

            impl From<$ty> for Child {
                fn from(value: $ty) -> Self {
                    Self::Number(value as f64)
                }
            }
        )*
    };
}

numeric_conversions!(i32, i64, u32, u64, usize, f32, f64);

/// The `classes` prop: a raw string, a list, or name → enabled toggles.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassValue {
    Text(String),
    List(Vec<String>),
    Toggles(IndexMap<String, bool>),
}

impl ClassValue {
    /// The normalized `class` attribute text.
    pub fn to_class_string(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::List(list) => list
                .iter()
                .filter(|class| !class.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
            Self::Toggles(toggles) => toggles
                .iter()
                .filter(|(_, enabled)| **enabled)
                .map(|(class, _)| class.clone())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl From<&str> for ClassValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ClassValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<&str>> for ClassValue {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ClassValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl<const N: usize> From<[(&str, bool); N]> for ClassValue {
    fn from(value: [(&str, bool); N]) -> Self {
        Self::Toggles(
            value
                .into_iter()
                .map(|(class, enabled)| (class.to_string(), enabled))
                .collect(),
        )
    }
}

/// A delegated event handler.
///
/// The optional label stands in for handler source text: it is what the
/// static pattern guard inspects before the handler is bound.
#[derive(Clone)]
pub struct EventHandler {
    label: Option<String>,
    callback: Rc<dyn Fn(&Event)>,
}

impl EventHandler {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Self {
            label: None,
            callback: Rc::new(callback),
        }
    }

    pub fn labeled<F>(label: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Self {
            label: Some(label.into()),
            callback: Rc::new(callback),
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn call(&self, event: &Event) {
        (self.callback)(event);
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// A property value on an element description.
#[derive(Clone)]
pub enum Prop {
    Value(AttrValue),
    /// Resolved each time props are applied.
    Dynamic(Rc<dyn Fn() -> AttrValue>),
    Classes(ClassValue),
    Data(IndexMap<String, AttrValue>),
    Handler(EventHandler),
}

impl Prop {
    /// Falsy props are skipped before any dispatch.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Value(value) => value.is_falsy(),
            _ => false,
        }
    }
}

impl fmt::Debug for Prop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
            Self::Classes(classes) => f.debug_tuple("Classes").field(classes).finish(),
            Self::Data(data) => f.debug_tuple("Data").field(data).finish(),
            Self::Handler(handler) => f.debug_tuple("Handler").field(handler).finish(),
        }
    }
}

impl From<AttrValue> for Prop {
    fn from(value: AttrValue) -> Self {
        Self::Value(value)
    }
}

impl From<ClassValue> for Prop {
    fn from(value: ClassValue) -> Self {
        Self::Classes(value)
    }
}

impl From<EventHandler> for Prop {
    fn from(value: EventHandler) -> Self {
        Self::Handler(value)
    }
}

/// A child of an element description.
#[derive(Clone)]
pub enum Child {
    Element(Element),
    Text(String),
    Number(f64),
    /// Invoked during materialization, inside the render effect.
    Reactive(Rc<dyn Fn() -> Vec<Child>>),
    Empty,
}

impl Child {
    pub fn reactive<F>(f: F) -> Self
    where
        F: Fn() -> Vec<Child> + 'static,
    {
        Self::Reactive(Rc::new(f))
    }
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(element) => fmt::Debug::fmt(element, f),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Self::Reactive(_) => f.write_str("Reactive(..)"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

impl From<Element> for Child {
    fn from(value: Element) -> Self {
        Self::Element(value)
    }
}

impl From<&str> for Child {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Child {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for Child {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

impl<T> From<Signal<T>> for Child
where
    T: Clone + PartialEq + fmt::Display + 'static,
{
    fn from(signal: Signal<T>) -> Self {
        Self::reactive(move || vec![Child::Text(signal.get().to_string())])
    }
}

impl<T> From<&Signal<T>> for Child
where
    T: Clone + PartialEq + fmt::Display + 'static,
{
    fn from(signal: &Signal<T>) -> Self {
        signal.clone().into()
    }
}

impl<T> From<Computed<T>> for Child
where
    T: Clone + PartialEq + fmt::Display + 'static,
{
    fn from(computed: Computed<T>) -> Self {
        Self::reactive(move || vec![Child::Text(computed.get().to_string())])
    }
}

pub(crate) type PreRenderHook = Rc<dyn Fn()>;
pub(crate) type RenderHook = Rc<dyn Fn(&Node) -> Option<Cleanup>>;

/// A description of one element or fragment.
#[derive(Clone, Default)]
pub struct Element {
    tag: Option<String>,
    props: IndexMap<String, Prop>,
    children: Vec<Child>,
    on_pre_render: Option<PreRenderHook>,
    on_render: Option<RenderHook>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// A description without a tag: its children are spliced into the
    /// parent.
    pub fn fragment() -> Self {
        Self::default()
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn is_fragment(&self) -> bool {
        self.tag.is_none()
    }

    pub fn props(&self) -> &IndexMap<String, Prop> {
        &self.props
    }

    pub fn children_list(&self) -> &[Child] {
        &self.children
    }

    pub(crate) fn pre_render_hook(&self) -> Option<&PreRenderHook> {
        self.on_pre_render.as_ref()
    }

    pub(crate) fn render_hook(&self) -> Option<&RenderHook> {
        self.on_render.as_ref()
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Prop>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn attr(self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.prop(key, Prop::Value(value.into()))
    }

    /// An attribute resolved on every render pass.
    pub fn attr_fn<F, V>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> V + 'static,
        V: Into<AttrValue>,
    {
        self.prop(key, Prop::Dynamic(Rc::new(move || f().into())))
    }

    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id.into())
    }

    pub fn classes(self, classes: impl Into<ClassValue>) -> Self {
        self.prop("classes", Prop::Classes(classes.into()))
    }

    /// Add one `data-*` entry.
    pub fn data(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let entry = self
            .props
            .entry("data".to_string())
            .or_insert_with(|| Prop::Data(IndexMap::new()));
        if let Prop::Data(data) = entry {
            data.insert(key.into(), value.into());
        }
        self
    }

    /// Bind a delegated handler for `event` (without the `on` prefix).
    pub fn on<F>(self, event: &str, f: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        self.handler(event, EventHandler::new(f))
    }

    pub fn handler(self, event: &str, handler: EventHandler) -> Self {
        self.prop(format!("on{event}"), Prop::Handler(handler))
    }

    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Child>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    /// A child produced by `f` each time the render effect runs.
    pub fn reactive<F>(self, f: F) -> Self
    where
        F: Fn() -> Vec<Child> + 'static,
    {
        self.child(Child::reactive(f))
    }

    /// Runs before this element's subtree is materialized.
    pub fn on_pre_render<F>(mut self, f: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.on_pre_render = Some(Rc::new(f));
        self
    }

    /// Runs once the element is in the live tree. A returned cleanup runs
    /// when the element leaves the tree or the render is disposed.
    pub fn on_render<F>(mut self, f: F) -> Self
    where
        F: Fn(&Node) -> Option<Cleanup> + 'static,
    {
        self.on_render = Some(Rc::new(f));
        self
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag)
            .field("props", &self.props)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Tag constructors: `html::div()` is `Element::new("div")`.
pub mod html {
    use super::Element;

    macro_rules! tags {
        ($($name:ident),* $(,)?) => {
            $(
                pub fn $name() -> Element {
                    Element::new(stringify!($name))
                }
            )*
        };
    }

    tags!(
        a, article, aside, b, blockquote, br, button, canvas, code, dd, div, dl, dt, em,
        fieldset, footer, form, h1, h2, h3, h4, h5, h6, header, hr, i, img, input, label,
        legend, li, main, nav, ol, option, p, pre, section, select, small, span, strong,
        table, tbody, td, textarea, tfoot, th, thead, tr, ul,
    );

    /// `html::fragment()` is `Element::fragment()`.
    pub fn fragment() -> Element {
        Element::fragment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_collect_props_in_order() {
        let element = html::a()
            .attr("href", "/home")
            .classes(vec!["nav", "", "active"])
            .data("id", 7)
            .data("kind", "link")
            .child("Home");

        let keys: Vec<_> = element.props().keys().cloned().collect();
        assert_eq!(keys, vec!["href", "classes", "data"]);
        match &element.props()["data"] {
            Prop::Data(data) => assert_eq!(data.len(), 2),
            other => panic!("unexpected prop {other:?}"),
        }
        assert_eq!(element.children_list().len(), 1);
    }

    #[test]
    fn class_values_normalize() {
        assert_eq!(ClassValue::from("a b").to_class_string(), "a b");
        assert_eq!(ClassValue::from(vec!["a", "", "b"]).to_class_string(), "a b");
        assert_eq!(
            ClassValue::from([("on", true), ("off", false), ("x", true)]).to_class_string(),
            "on x"
        );
    }

    #[test]
    fn attr_values_render() {
        assert_eq!(AttrValue::from(3).to_attr().as_deref(), Some("3"));
        assert_eq!(AttrValue::from(1.5).to_attr().as_deref(), Some("1.5"));
        assert_eq!(AttrValue::from("").to_attr(), None);
        assert!(AttrValue::from(false).is_falsy());
        assert!(AttrValue::from(None::<String>).is_falsy());
        assert!(!AttrValue::from(0).is_falsy());
    }

    #[test]
    fn on_prefixes_event_names() {
        let element = html::button().on("click", |_| {});
        assert!(matches!(element.props()["onclick"], Prop::Handler(_)));
        assert!(html::fragment().is_fragment());
    }
}
