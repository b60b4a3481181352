//! Custom Element Registry
//!
//! Maps tag names to definitions. An element whose tag is defined gets
//! upgraded (its definition constructs per-element hooks) as soon as it is
//! created, connected, or, for elements already in a document, defined.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::node::{Document, Element, WeakNode};
use crate::error::{Error, Result};

/// Lifecycle reactions of one upgraded element.
pub trait CustomElementHooks {
    fn connected(&self, _element: &Element) {}

    fn disconnected(&self, _element: &Element) {}

    /// Called for observed attributes only, also once per present observed
    /// attribute at upgrade time.
    fn attribute_changed(
        &self,
        _element: &Element,
        _name: &str,
        _old: Option<&str>,
        _new: Option<&str>,
    ) {
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// A custom element class.
pub trait CustomElementDefinition {
    fn observed_attributes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Build the hooks of a newly upgraded element.
    fn construct(&self, element: &Element) -> Rc<dyn CustomElementHooks>;
}

pub(crate) struct CustomState {
    hooks: Rc<dyn CustomElementHooks>,
    observed: Rc<[String]>,
}

struct Entry {
    definition: Rc<dyn CustomElementDefinition>,
    observed: Rc<[String]>,
}

#[derive(Default)]
struct Registry {
    definitions: RefCell<IndexMap<String, Rc<Entry>>>,
    documents: RefCell<Vec<WeakNode>>,
}

thread_local! {
    static REGISTRY: Registry = Registry::default();
}

fn with_registry<R>(f: impl FnOnce(&Registry) -> R) -> Option<R> {
    REGISTRY.try_with(f).ok()
}

const RESERVED_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// Check the custom element name rules.
pub fn validate_name(name: &str) -> std::result::Result<(), &'static str> {
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err("must start with a lowercase ASCII letter");
    }
    if !name.contains('-') {
        return Err("must contain a hyphen");
    }
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("must not contain uppercase letters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "-._".contains(c) || !c.is_ascii())
    {
        return Err("contains characters not allowed in a tag name");
    }
    if RESERVED_NAMES.contains(&name) {
        return Err("is a reserved name");
    }
    Ok(())
}

/// Register `definition` for `name` and upgrade matching elements that are
/// already in a document.
pub fn define(name: &str, definition: Rc<dyn CustomElementDefinition>) -> Result<()> {
    validate_name(name).map_err(|reason| Error::InvalidComponentName {
        name: name.to_string(),
        reason,
    })?;
    let entry = Rc::new(Entry {
        observed: definition.observed_attributes().into(),
        definition,
    });
    let inserted = with_registry(|r| {
        let mut definitions = r.definitions.borrow_mut();
        if definitions.contains_key(name) {
            return false;
        }
        definitions.insert(name.to_string(), entry);
        true
    })
    .unwrap_or(false);
    if !inserted {
        return Err(Error::InvalidComponentName {
            name: name.to_string(),
            reason: "is already defined",
        });
    }
    tracing::debug!(name, "custom element defined");

    let documents: Vec<Document> = with_registry(|r| {
        let mut documents = r.documents.borrow_mut();
        documents.retain(|d| d.upgrade().is_some());
        documents
            .iter()
            .filter_map(WeakNode::upgrade)
            .filter_map(|n| n.owner_document())
            .collect()
    })
    .unwrap_or_default();
    for document in documents {
        for node in document.shadow_including_inclusive_descendants() {
            if let Some(element) = node.as_element().filter(|e| e.tag_name() == name) {
                upgrade(&element);
            }
        }
    }
    Ok(())
}

pub fn is_defined(name: &str) -> bool {
    with_registry(|r| r.definitions.borrow().contains_key(name)).unwrap_or(false)
}

fn lookup(name: &str) -> Option<Rc<Entry>> {
    with_registry(|r| r.definitions.borrow().get(name).cloned()).flatten()
}

pub(crate) fn register_document(document: &Document) {
    with_registry(|r| r.documents.borrow_mut().push(document.downgrade()));
}

/// The hooks of an upgraded element.
pub(crate) fn hooks(element: &Element) -> Option<Rc<dyn CustomElementHooks>> {
    element
        .data()
        .custom
        .borrow()
        .as_ref()
        .map(|s| Rc::clone(&s.hooks))
}

pub fn is_upgraded(element: &Element) -> bool {
    element.data().custom.borrow().is_some()
}

pub(crate) fn upgrade(element: &Element) {
    if is_upgraded(element) {
        return;
    }
    let Some(entry) = lookup(element.tag_name()) else {
        return;
    };
    let hooks = entry.definition.construct(element);
    *element.data().custom.borrow_mut() = Some(CustomState {
        hooks: Rc::clone(&hooks),
        observed: Rc::clone(&entry.observed),
    });
    tracing::trace!(tag = element.tag_name(), "element upgraded");

    for (name, value) in element.attributes() {
        if entry.observed.contains(&name) {
            hooks.attribute_changed(element, &name, None, Some(&value));
        }
    }
    if element.is_connected() {
        hooks.connected(element);
    }
}

pub(crate) fn connected(element: &Element) {
    match hooks(element) {
        Some(hooks) => hooks.connected(element),
        None => upgrade(element),
    }
}

pub(crate) fn disconnected(element: &Element) {
    if let Some(hooks) = hooks(element) {
        hooks.disconnected(element);
    }
}

pub(crate) fn attribute_changed(element: &Element, name: &str, old: Option<&str>, new: Option<&str>) {
    let observed = element
        .data()
        .custom
        .borrow()
        .as_ref()
        .filter(|s| s.observed.iter().any(|o| o == name))
        .map(|s| Rc::clone(&s.hooks));
    if let Some(hooks) = observed {
        hooks.attribute_changed(element, name, old, new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder(Log);

    impl CustomElementHooks for Recorder {
        fn connected(&self, _: &Element) {
            self.0.borrow_mut().push("connected".into());
        }

        fn disconnected(&self, _: &Element) {
            self.0.borrow_mut().push("disconnected".into());
        }

        fn attribute_changed(&self, _: &Element, name: &str, old: Option<&str>, new: Option<&str>) {
            self.0
                .borrow_mut()
                .push(format!("{name}: {old:?} -> {new:?}"));
        }

        fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
            self
        }
    }

    struct RecorderDefinition(Log);

    impl CustomElementDefinition for RecorderDefinition {
        fn observed_attributes(&self) -> Vec<String> {
            vec!["value".into()]
        }

        fn construct(&self, _: &Element) -> Rc<dyn CustomElementHooks> {
            self.0.borrow_mut().push("constructed".into());
            Rc::new(Recorder(Rc::clone(&self.0)))
        }
    }

    fn define_recorder(name: &str) -> Log {
        let log: Log = Rc::default();
        define(name, Rc::new(RecorderDefinition(Rc::clone(&log)))).unwrap();
        log
    }

    #[test]
    fn names_are_validated() {
        assert!(validate_name("my-element").is_ok());
        assert!(validate_name("myelement").is_err());
        assert!(validate_name("My-element").is_err());
        assert!(validate_name("my-Element").is_err());
        assert!(validate_name("1-element").is_err());
        assert!(validate_name("font-face").is_err());
        assert!(validate_name("my element-x").is_err());
    }

    #[test]
    fn duplicate_definition_fails() {
        define_recorder("dup-element");
        let log: Log = Rc::default();
        assert!(matches!(
            define("dup-element", Rc::new(RecorderDefinition(log))),
            Err(Error::InvalidComponentName { .. })
        ));
    }

    #[test]
    fn existing_elements_upgrade_on_define() {
        let document = Document::new();
        let el = Element::new("late-element");
        el.set_attribute("value", "1");
        document.body().append_child(&el);

        let log = define_recorder("late-element");
        assert_eq!(
            *log.borrow(),
            vec!["constructed", "value: None -> Some(\"1\")", "connected"]
        );
        assert!(is_upgraded(&el));
    }

    #[test]
    fn lifecycle_follows_tree_moves() {
        let log = define_recorder("move-element");
        let document = Document::new();
        let el = Element::new("move-element");
        assert_eq!(*log.borrow(), vec!["constructed"]);

        let a = Element::new("div");
        let b = Element::new("div");
        document.body().append_child(&a);
        document.body().append_child(&b);

        a.append_child(&el);
        b.append_child(&el);
        el.set_attribute("value", "x");
        el.set_attribute("other", "ignored");
        el.remove();

        assert_eq!(
            *log.borrow(),
            vec![
                "constructed",
                "connected",
                "disconnected",
                "connected",
                "value: None -> Some(\"x\")",
                "disconnected",
            ]
        );
    }
}
