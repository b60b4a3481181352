//! Component Definitions
//!
//! [`define_component`] validates a component declaration and registers it
//! with the custom element registry. Elements of that tag are upgraded with
//! a fresh component instance whose lifecycle hooks do the rest.

use std::rc::Rc;

use indexmap::IndexMap;

use super::instance::ComponentInner;
use super::props::Props;
use super::ui::{Queries, Ui};
use crate::dom::registry::{self, CustomElementDefinition, CustomElementHooks};
use crate::dom::Element;
use crate::effects::Effects;
use crate::error::{Error, Result};

pub(crate) type SelectFn = Rc<dyn Fn(&mut Queries) -> Result<()>>;
pub(crate) type SetupFn = Rc<dyn Fn(&Ui) -> Setup>;

pub(crate) struct Definition {
    pub(crate) name: String,
    pub(crate) props: Props,
    pub(crate) select: SelectFn,
    pub(crate) setup: SetupFn,
}

impl CustomElementDefinition for Rc<Definition> {
    fn observed_attributes(&self) -> Vec<String> {
        self.props
            .iter()
            .filter(|(_, init)| init.is_parser())
            .map(|(name, _)| attribute_name(name))
            .collect()
    }

    fn construct(&self, element: &Element) -> Rc<dyn CustomElementHooks> {
        ComponentInner::install(self, element)
    }
}

/// The effects a component attaches on connect, keyed by ui entry name.
/// `"host"` targets the component element itself.
#[derive(Default)]
pub struct Setup {
    entries: IndexMap<String, Effects>,
}

impl Setup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `effects` to the ui entry `key`. Repeating a key adds to it.
    pub fn with(mut self, key: &str, effects: impl Into<Effects>) -> Self {
        let effects = effects.into();
        let merged = match self.entries.shift_remove(key) {
            Some(existing) => existing.and(effects),
            None => effects,
        };
        self.entries.insert(key.to_string(), merged);
        self
    }

    pub(crate) fn into_entries(self) -> IndexMap<String, Effects> {
        self.entries
    }
}

/// The attribute reflecting property `name`.
pub(crate) fn attribute_name(name: &str) -> String {
    name.to_ascii_lowercase()
}

const RESERVED_WORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "constructor", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for",
    "function", "if", "implements", "import", "in", "instanceof", "interface", "let", "new",
    "null", "package", "private", "protected", "prototype", "public", "return", "static",
    "super", "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void",
    "while", "with", "yield",
];

const ELEMENT_MEMBERS: &[&str] = &[
    "accessKey", "addEventListener", "after", "append", "attachShadow", "attributes",
    "attributeChangedCallback", "before", "blur", "childNodes", "children", "classList",
    "className", "click", "closest", "connectedCallback", "contains", "dataset", "dir",
    "disconnectedCallback", "dispatchEvent", "draggable", "firstChild", "focus",
    "getAttribute", "hasAttribute", "hidden", "id", "innerHTML", "innerText", "inert",
    "isConnected", "lang", "lastChild", "localName", "matches", "nextSibling", "nodeName",
    "nodeType", "nodeValue", "outerHTML", "ownerDocument", "parentElement", "parentNode",
    "prepend", "previousSibling", "querySelector", "querySelectorAll", "remove",
    "removeAttribute", "removeEventListener", "replaceChildren", "replaceWith",
    "setAttribute", "shadowRoot", "slot", "style", "tabIndex", "tagName", "textContent",
    "title", "toggleAttribute", "translate",
];

/// Check a property name against identifier rules, JavaScript reserved
/// words and the members every element already has.
pub fn validate_property_name(name: &str) -> std::result::Result<(), &'static str> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("must not be empty"),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_' || c == '$') => {
            return Err("must start with a letter, `_` or `$`")
        }
        _ => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return Err("must be a valid identifier");
    }
    if RESERVED_WORDS.contains(&name) {
        return Err("is a reserved word");
    }
    if ELEMENT_MEMBERS.contains(&name) {
        return Err("is a native element member");
    }
    Ok(())
}

/// Define a custom element backed by reactive properties.
///
/// - `props` declares the reactive properties and their initializers.
/// - `select` names the elements the effects attach to.
/// - `setup` returns the effects to attach on every connect.
///
/// Name and property errors are returned here. Errors found while
/// connecting are logged and kept on the instance (see
/// [`Component::error`](super::Component::error)).
///
/// # Example
///
/// ```rust
/// use letruc_core::component::{define_component, Props, Setup};
/// use letruc_core::dom::{Document, Element};
/// use letruc_core::effects::{on, set_text, Updates};
///
/// define_component(
///     "click-counter",
///     Props::new().value("count", 0),
///     |q| {
///         q.first_required("label", "span")?;
///         Ok(())
///     },
///     |_| {
///         Setup::new()
///             .with("host", on("click", |_, host, _| {
///                 let count = host.get("count").ok()?.as_i64()?;
///                 Some(Updates::new().set("count", count + 1))
///             }))
///             .with("label", set_text("count"))
///     },
/// )
/// .unwrap();
///
/// let document = Document::new();
/// let counter = Element::new("click-counter");
/// counter.set_inner_html("<span></span>");
/// document.body().append_child(&counter);
/// counter.click();
/// assert_eq!(counter.text_content(), "1");
/// ```
pub fn define_component<S, F>(name: &str, props: Props, select: S, setup: F) -> Result<()>
where
    S: Fn(&mut Queries) -> Result<()> + 'static,
    F: Fn(&Ui) -> Setup + 'static,
{
    registry::validate_name(name).map_err(|reason| Error::InvalidComponentName {
        name: name.to_string(),
        reason,
    })?;
    for prop in props.names() {
        validate_property_name(prop).map_err(|reason| Error::InvalidPropertyName {
            component: name.to_string(),
            prop: prop.to_string(),
            reason,
        })?;
    }
    let props_count = props.len();
    let definition = Rc::new(Definition {
        name: name.to_string(),
        props,
        select: Rc::new(select),
        setup: Rc::new(setup),
    });
    registry::define(name, Rc::new(definition))?;
    tracing::debug!(name, props = props_count, "component defined");
    Ok(())
}
