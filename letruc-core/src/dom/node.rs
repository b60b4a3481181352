//! Document Tree
//!
//! Nodes are reference counted. A parent owns its children; children point
//! back to their parent weakly, so dropping a detached subtree frees it.
//!
//! # Connectedness
//!
//! A node is connected when walking up through parents and shadow hosts ends
//! at a [`Document`]. Inserting into a connected parent connects the whole
//! inserted subtree (running custom element `connected` hooks in tree
//! order); removing disconnects it. Moving a node is a removal followed by
//! an insertion.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::event::{Event, Listener};
use super::observer::{self, Registration};
use super::registry::{self, CustomState};
use crate::error::{Error, Result};
use crate::value::Value;

thread_local! {
    static NEXT_KEY: Cell<u64> = const { Cell::new(1) };
}

fn next_key() -> u64 {
    NEXT_KEY.with(|k| {
        let key = k.get();
        k.set(key + 1);
        key
    })
}

/// Stable identity of a node for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey(u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Document,
    Element,
    Text,
    Comment,
    ShadowRoot,
    Fragment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowRootMode {
    #[default]
    Open,
    Closed,
}

/// Overrides reads and writes of one element property.
pub trait PropertyAccessor {
    fn get(&self, element: &Element) -> Result<Value>;
    fn set(&self, element: &Element, value: Value) -> Result<()>;
}

/// A named element method, as invoked by [`Element::call_method`].
pub type Method = Rc<dyn Fn(&Element, &[Value]) -> Result<Value>>;

pub(crate) struct ElementData {
    tag: String,
    attributes: RefCell<IndexMap<String, String>>,
    properties: RefCell<IndexMap<String, Value>>,
    accessors: RefCell<IndexMap<String, Rc<dyn PropertyAccessor>>>,
    methods: RefCell<IndexMap<String, Method>>,
    shadow_root: RefCell<Option<Node>>,
    pub(crate) custom: RefCell<Option<CustomState>>,
}

pub(crate) enum NodeData {
    Document { active: RefCell<Option<WeakNode>> },
    Element(ElementData),
    Text(RefCell<String>),
    Comment(RefCell<String>),
    ShadowRoot { host: Weak<NodeInner>, mode: ShadowRootMode },
    Fragment,
}

pub(crate) struct NodeInner {
    key: u64,
    data: NodeData,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    pub(crate) registrations: RefCell<Vec<Registration>>,
    pub(crate) listeners: RefCell<Vec<Listener>>,
}

/// A node in the document tree.
#[derive(Clone)]
pub struct Node(pub(crate) Rc<NodeInner>);

/// A non-owning node reference.
#[derive(Clone, Default)]
pub struct WeakNode(Weak<NodeInner>);

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }
}

impl Node {
    fn create(data: NodeData) -> Self {
        Node(Rc::new(NodeInner {
            key: next_key(),
            data,
            parent: RefCell::new(Weak::new()),
            children: RefCell::default(),
            registrations: RefCell::default(),
            listeners: RefCell::default(),
        }))
    }

    pub fn text(data: &str) -> Self {
        Self::create(NodeData::Text(RefCell::new(data.to_string())))
    }

    pub fn comment(data: &str) -> Self {
        Self::create(NodeData::Comment(RefCell::new(data.to_string())))
    }

    /// A parentless container; inserting it moves its children instead.
    pub fn fragment() -> Self {
        Self::create(NodeData::Fragment)
    }

    pub fn key(&self) -> NodeKey {
        NodeKey(self.0.key)
    }

    pub fn node_type(&self) -> NodeType {
        match &self.0.data {
            NodeData::Document { .. } => NodeType::Document,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Text(_) => NodeType::Text,
            NodeData::Comment(_) => NodeType::Comment,
            NodeData::ShadowRoot { .. } => NodeType::ShadowRoot,
            NodeData::Fragment => NodeType::Fragment,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.data, NodeData::Element(_))
    }

    pub fn as_element(&self) -> Option<Element> {
        self.is_element().then(|| Element(self.clone()))
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.0))
    }

    pub fn parent(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    pub fn parent_element(&self) -> Option<Element> {
        self.parent().and_then(|p| p.as_element())
    }

    /// The parent, or the host element for a shadow root.
    pub(crate) fn parent_or_host(&self) -> Option<Node> {
        match &self.0.data {
            NodeData::ShadowRoot { host, .. } => host.upgrade().map(Node),
            _ => self.parent(),
        }
    }

    /// The host element of a shadow root.
    pub fn host(&self) -> Option<Element> {
        match &self.0.data {
            NodeData::ShadowRoot { host, .. } => host.upgrade().map(|h| Element(Node(h))),
            _ => None,
        }
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn child_elements(&self) -> Vec<Element> {
        self.0
            .children
            .borrow()
            .iter()
            .filter_map(Node::as_element)
            .collect()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.children.borrow().first().cloned()
    }

    pub fn last_child(&self) -> Option<Node> {
        self.0.children.borrow().last().cloned()
    }

    /// Position among the parent's children.
    pub fn index(&self) -> Option<usize> {
        let parent = self.parent()?;
        let children = parent.0.children.borrow();
        children.iter().position(|c| c == self)
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let index = self.index()?;
        let parent = self.parent()?;
        let sibling = parent.0.children.borrow().get(index + 1).cloned();
        sibling
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        let index = self.index()?.checked_sub(1)?;
        let parent = self.parent()?;
        let sibling = parent.0.children.borrow().get(index).cloned();
        sibling
    }

    /// Inclusive descendant check, not crossing shadow boundaries.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if &node == self {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// The topmost ancestor, stopping at shadow roots.
    pub fn root(&self) -> Node {
        let mut node = self.clone();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    pub fn is_connected(&self) -> bool {
        self.owner_document().is_some()
    }

    /// The document this node is connected to, through shadow hosts.
    pub fn owner_document(&self) -> Option<Document> {
        let mut node = self.clone();
        while let Some(next) = node.parent_or_host() {
            node = next;
        }
        (node.node_type() == NodeType::Document).then_some(Document(node))
    }

    /// Descendants in tree order, excluding shadow trees.
    pub fn descendants(&self) -> Vec<Node> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out, false);
        out
    }

    /// Inclusive descendants in tree order, with each shadow tree visited
    /// right after its host.
    pub(crate) fn shadow_including_inclusive_descendants(&self) -> Vec<Node> {
        let mut out = vec![self.clone()];
        if let Some(shadow) = self.as_element().and_then(|e| e.shadow_root_any()) {
            shadow.collect_descendants(&mut out, true);
        }
        self.collect_descendants(&mut out, true);
        out
    }

    fn collect_descendants(&self, out: &mut Vec<Node>, shadows: bool) {
        for child in self.children() {
            out.push(child.clone());
            if shadows {
                if let Some(shadow) = child.as_element().and_then(|e| e.shadow_root_any()) {
                    shadow.collect_descendants(out, true);
                }
            }
            child.collect_descendants(out, shadows);
        }
    }

    fn can_have_children(&self) -> bool {
        !matches!(self.0.data, NodeData::Text(_) | NodeData::Comment(_))
    }

    pub fn append_child(&self, child: &Node) {
        self.insert_before(child, None);
    }

    /// Insert `child` before `reference`, or at the end when `reference` is
    /// `None` or not a child. A fragment inserts its children instead.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) {
        if !self.can_have_children()
            || matches!(child.node_type(), NodeType::Document | NodeType::ShadowRoot)
        {
            tracing::warn!(parent = ?self, ?child, "rejected insertion of an invalid child");
            return;
        }
        if child.contains(self) {
            tracing::warn!(parent = ?self, ?child, "rejected insertion that would create a cycle");
            return;
        }

        let nodes = if child.node_type() == NodeType::Fragment {
            let nodes: Vec<Node> = child.0.children.borrow_mut().drain(..).collect();
            for node in &nodes {
                *node.0.parent.borrow_mut() = Weak::new();
            }
            if !nodes.is_empty() {
                observer::queue_child_list(child, Vec::new(), nodes.clone());
            }
            nodes
        } else {
            if let Some(old_parent) = child.parent() {
                old_parent.detach(child);
            }
            vec![child.clone()]
        };
        if nodes.is_empty() {
            return;
        }

        {
            let mut children = self.0.children.borrow_mut();
            let index = reference
                .and_then(|r| children.iter().position(|c| c == r))
                .unwrap_or(children.len());
            for (offset, node) in nodes.iter().enumerate() {
                *node.0.parent.borrow_mut() = Rc::downgrade(&self.0);
                children.insert(index + offset, node.clone());
            }
        }
        observer::queue_child_list(self, nodes.clone(), Vec::new());

        if self.is_connected() {
            for node in &nodes {
                connect_subtree(node);
            }
        }
    }

    pub fn remove_child(&self, child: &Node) -> bool {
        self.detach(child)
    }

    /// Remove this node from its parent.
    pub fn remove(&self) {
        if let Some(parent) = self.parent() {
            parent.detach(self);
        }
    }

    fn detach(&self, child: &Node) -> bool {
        let removed = {
            let mut children = self.0.children.borrow_mut();
            match children.iter().position(|c| c == child) {
                Some(index) => {
                    children.remove(index);
                    true
                }
                None => false,
            }
        };
        if !removed {
            return false;
        }
        *child.0.parent.borrow_mut() = Weak::new();
        observer::queue_child_list(self, Vec::new(), vec![child.clone()]);

        if let Some(document) = self.owner_document() {
            document.blur_within(child);
            disconnect_subtree(child);
        }
        true
    }

    /// Replace every child with `nodes`.
    pub fn replace_children(&self, nodes: Vec<Node>) {
        let old: Vec<Node> = self.0.children.borrow_mut().drain(..).collect();
        for node in &old {
            *node.0.parent.borrow_mut() = Weak::new();
        }
        if !old.is_empty() {
            observer::queue_child_list(self, Vec::new(), old.clone());
            if let Some(document) = self.owner_document() {
                for node in &old {
                    document.blur_within(node);
                    disconnect_subtree(node);
                }
            }
        }
        for node in nodes {
            self.append_child(&node);
        }
    }

    /// Character data of a text or comment node.
    pub fn data(&self) -> Option<String> {
        match &self.0.data {
            NodeData::Text(data) | NodeData::Comment(data) => Some(data.borrow().clone()),
            _ => None,
        }
    }

    pub fn set_data(&self, value: &str) {
        if let NodeData::Text(data) | NodeData::Comment(data) = &self.0.data {
            *data.borrow_mut() = value.to_string();
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.data, NodeData::Text(_))
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.0.data, NodeData::Comment(_))
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self) -> String {
        match &self.0.data {
            NodeData::Text(data) | NodeData::Comment(data) => data.borrow().clone(),
            _ => self
                .descendants()
                .iter()
                .filter_map(|n| if n.is_text() { n.data() } else { None })
                .collect(),
        }
    }

    /// Replace the children with a single text node (none for `""`).
    pub fn set_text_content(&self, text: &str) {
        match &self.0.data {
            NodeData::Text(_) | NodeData::Comment(_) => self.set_data(text),
            _ if text.is_empty() => self.replace_children(Vec::new()),
            _ => self.replace_children(vec![Node::text(text)]),
        }
    }
}

fn connect_subtree(node: &Node) {
    for node in node.shadow_including_inclusive_descendants() {
        if let Some(element) = node.as_element() {
            if element.is_connected() {
                registry::connected(&element);
            }
        }
    }
}

fn disconnect_subtree(node: &Node) {
    for node in node.shadow_including_inclusive_descendants() {
        if let Some(element) = node.as_element() {
            registry::disconnected(&element);
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.data {
            NodeData::Element(data) => write!(f, "<{}>#{}", data.tag, self.0.key),
            NodeData::Text(data) => write!(f, "#text({:?})", data.borrow()),
            NodeData::Comment(data) => write!(f, "#comment({:?})", data.borrow()),
            NodeData::Document { .. } => f.write_str("#document"),
            NodeData::ShadowRoot { .. } => f.write_str("#shadow-root"),
            NodeData::Fragment => f.write_str("#fragment"),
        }
    }
}

// ----------------------------------------------------------------------------
// Element
// ----------------------------------------------------------------------------

/// An element node.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Element(Node);

impl Element {
    /// Create a detached element. A tag with a registered custom element
    /// definition is upgraded right away.
    pub fn new(tag: &str) -> Self {
        let element = Element(Node::create(NodeData::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: RefCell::default(),
            properties: RefCell::default(),
            accessors: RefCell::default(),
            methods: RefCell::default(),
            shadow_root: RefCell::new(None),
            custom: RefCell::new(None),
        })));
        registry::upgrade(&element);
        element
    }

    pub(crate) fn data(&self) -> &ElementData {
        match &self.0 .0.data {
            NodeData::Element(data) => data,
            _ => unreachable!("Element always wraps element data"),
        }
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn tag_name(&self) -> &str {
        &self.data().tag
    }

    pub fn id(&self) -> String {
        self.attribute("id").unwrap_or_default()
    }

    // ---- Attributes ----

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.data()
            .attributes
            .borrow()
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.data()
            .attributes
            .borrow()
            .contains_key(&name.to_ascii_lowercase())
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.data().attributes.borrow().keys().cloned().collect()
    }

    pub fn attributes(&self) -> Vec<(String, String)> {
        self.data()
            .attributes
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let old = self
            .data()
            .attributes
            .borrow_mut()
            .insert(name.clone(), value.to_string());
        observer::queue_attribute(self, &name, old.clone());
        registry::attribute_changed(self, &name, old.as_deref(), Some(value));
    }

    /// Returns whether the attribute was present.
    pub fn remove_attribute(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        let old = self.data().attributes.borrow_mut().shift_remove(&name);
        match old {
            Some(old) => {
                observer::queue_attribute(self, &name, Some(old.clone()));
                registry::attribute_changed(self, &name, Some(&old), None);
                true
            }
            None => false,
        }
    }

    /// Add or remove a boolean attribute. Returns whether it is now present.
    pub fn toggle_attribute(&self, name: &str, force: Option<bool>) -> bool {
        let present = self.has_attribute(name);
        let wanted = force.unwrap_or(!present);
        if wanted && !present {
            self.set_attribute(name, "");
        } else if !wanted && present {
            self.remove_attribute(name);
        }
        wanted
    }

    // ---- Classes ----

    pub fn class_list(&self) -> Vec<String> {
        self.attribute("class")
            .map(|c| c.split_ascii_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, token: &str) -> bool {
        self.class_list().iter().any(|c| c == token)
    }

    pub fn add_class(&self, token: &str) {
        let mut classes = self.class_list();
        if !classes.iter().any(|c| c == token) {
            classes.push(token.to_string());
            self.set_attribute("class", &classes.join(" "));
        }
    }

    pub fn remove_class(&self, token: &str) {
        let mut classes = self.class_list();
        let before = classes.len();
        classes.retain(|c| c != token);
        if classes.len() != before {
            self.set_attribute("class", &classes.join(" "));
        }
    }

    /// Returns whether the class is now present.
    pub fn toggle_class(&self, token: &str, force: Option<bool>) -> bool {
        let wanted = force.unwrap_or(!self.has_class(token));
        if wanted {
            self.add_class(token);
        } else {
            self.remove_class(token);
        }
        wanted
    }

    // ---- Inline style ----

    fn style_declarations(&self) -> Vec<(String, String)> {
        self.attribute("style")
            .unwrap_or_default()
            .split(';')
            .filter_map(|decl| {
                let (name, value) = decl.split_once(':')?;
                let name = name.trim();
                (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
            })
            .collect()
    }

    fn write_style(&self, declarations: &[(String, String)]) {
        if declarations.is_empty() {
            self.remove_attribute("style");
        } else {
            let text = declarations
                .iter()
                .map(|(n, v)| format!("{n}: {v}"))
                .collect::<Vec<_>>()
                .join("; ");
            self.set_attribute("style", &format!("{text};"));
        }
    }

    pub fn style_property(&self, name: &str) -> Option<String> {
        self.style_declarations()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn set_style_property(&self, name: &str, value: &str) {
        let mut declarations = self.style_declarations();
        match declarations.iter_mut().find(|(n, _)| n == name) {
            Some(decl) => decl.1 = value.to_string(),
            None => declarations.push((name.to_string(), value.to_string())),
        }
        self.write_style(&declarations);
    }

    pub fn remove_style_property(&self, name: &str) {
        let mut declarations = self.style_declarations();
        let before = declarations.len();
        declarations.retain(|(n, _)| n != name);
        if declarations.len() != before {
            self.write_style(&declarations);
        }
    }

    // ---- Properties ----

    /// Install an accessor pair for `name`, replacing any previous one.
    pub fn define_property(&self, name: &str, accessor: Rc<dyn PropertyAccessor>) {
        self.data()
            .accessors
            .borrow_mut()
            .insert(name.to_string(), accessor);
    }

    pub fn remove_property_accessor(&self, name: &str) {
        self.data().accessors.borrow_mut().shift_remove(name);
    }

    pub fn has_property_accessor(&self, name: &str) -> bool {
        self.data().accessors.borrow().contains_key(name)
    }

    fn accessor(&self, name: &str) -> Option<Rc<dyn PropertyAccessor>> {
        self.data().accessors.borrow().get(name).cloned()
    }

    /// Read a property. Unknown plain properties read as `Null`.
    pub fn property(&self, name: &str) -> Result<Value> {
        if let Some(accessor) = self.accessor(name) {
            return accessor.get(self);
        }
        Ok(match name {
            "hidden" => Value::Bool(self.has_attribute("hidden")),
            "id" => Value::String(self.id()),
            "className" => Value::String(self.attribute("class").unwrap_or_default()),
            "tagName" => Value::String(self.tag_name().to_ascii_uppercase()),
            "textContent" => Value::String(self.text_content()),
            "isConnected" => Value::Bool(self.is_connected()),
            _ => self
                .data()
                .properties
                .borrow()
                .get(name)
                .cloned()
                .unwrap_or_default(),
        })
    }

    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if let Some(accessor) = self.accessor(name) {
            return accessor.set(self, value);
        }
        match name {
            "hidden" => {
                self.toggle_attribute("hidden", Some(value.is_truthy()));
            }
            "id" => self.set_attribute("id", &value.to_string()),
            "className" => self.set_attribute("class", &value.to_string()),
            "textContent" => self.set_text_content(&value.to_string()),
            "tagName" | "isConnected" => {
                return Err(Error::ReadonlySignal {
                    name: name.to_string(),
                })
            }
            _ => {
                self.data()
                    .properties
                    .borrow_mut()
                    .insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    // ---- Methods ----

    pub fn define_method(
        &self,
        name: &str,
        method: impl Fn(&Element, &[Value]) -> Result<Value> + 'static,
    ) {
        self.data()
            .methods
            .borrow_mut()
            .insert(name.to_string(), Rc::new(method));
    }

    /// Call a registered method or one of the built-ins `focus`, `blur`,
    /// `click` and `remove`.
    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        let method = self.data().methods.borrow().get(name).cloned();
        if let Some(method) = method {
            return method(self, args);
        }
        match name {
            "focus" => self.focus(),
            "blur" => self.blur(),
            "click" => self.click(),
            "remove" => self.remove(),
            _ => {
                return Err(Error::InvalidCallback {
                    context: format!("<{}> has no method `{name}`", self.tag_name()),
                })
            }
        }
        Ok(Value::Null)
    }

    // ---- Focus and activation ----

    pub fn focus(&self) {
        let Some(document) = self.owner_document() else {
            return;
        };
        let active = document.active_element();
        if active.as_ref() == Some(self) {
            return;
        }
        if let Some(previous) = active {
            previous.blur();
        }
        document.set_active(Some(self));
        self.dispatch_event(&Event::new("focus"));
    }

    pub fn blur(&self) {
        let Some(document) = self.owner_document() else {
            return;
        };
        if document.active_element().as_ref() == Some(self) {
            document.set_active(None);
            self.dispatch_event(&Event::new("blur"));
        }
    }

    pub fn is_focused(&self) -> bool {
        self.owner_document()
            .and_then(|d| d.active_element())
            .is_some_and(|active| &active == self)
    }

    /// Dispatch a bubbling, cancelable `click` event.
    pub fn click(&self) {
        self.dispatch_event(&Event::new("click").bubbles(true).cancelable(true));
    }

    // ---- Shadow DOM ----

    /// Attach a shadow root, or return the one already attached.
    pub fn attach_shadow(&self, mode: ShadowRootMode) -> Node {
        if let Some(existing) = self.shadow_root_any() {
            return existing;
        }
        let root = Node::create(NodeData::ShadowRoot {
            host: Rc::downgrade(&self.0 .0),
            mode,
        });
        *self.data().shadow_root.borrow_mut() = Some(root.clone());
        root
    }

    /// The shadow root, if one is attached in open mode.
    pub fn shadow_root(&self) -> Option<Node> {
        self.shadow_root_any().filter(|root| {
            matches!(
                root.0.data,
                NodeData::ShadowRoot {
                    mode: ShadowRootMode::Open,
                    ..
                }
            )
        })
    }

    pub(crate) fn shadow_root_any(&self) -> Option<Node> {
        self.data().shadow_root.borrow().clone()
    }
}

impl Deref for Element {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl AsRef<Node> for Element {
    fn as_ref(&self) -> &Node {
        &self.0
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        element.0
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ----------------------------------------------------------------------------
// Document
// ----------------------------------------------------------------------------

/// The root of a connected tree.
#[derive(Clone, PartialEq, Eq)]
pub struct Document(Node);

impl Document {
    /// Create a document with `<html>`, `<head>` and `<body>`.
    pub fn new() -> Self {
        let document = Document(Node::create(NodeData::Document {
            active: RefCell::new(None),
        }));
        let html = Element::new("html");
        html.append_child(&Element::new("head"));
        html.append_child(&Element::new("body"));
        document.append_child(&html);
        registry::register_document(&document);
        document
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    pub fn document_element(&self) -> Option<Element> {
        self.0.child_elements().into_iter().next()
    }

    fn section(&self, tag: &str) -> Element {
        let html = match self.document_element() {
            Some(html) => html,
            None => {
                let html = Element::new("html");
                self.append_child(&html);
                html
            }
        };
        if let Some(found) = html.child_elements().into_iter().find(|e| e.tag_name() == tag) {
            return found;
        }
        let created = Element::new(tag);
        html.append_child(&created);
        created
    }

    pub fn head(&self) -> Element {
        self.section("head")
    }

    pub fn body(&self) -> Element {
        self.section("body")
    }

    pub fn create_element(&self, tag: &str) -> Element {
        Element::new(tag)
    }

    pub fn create_text_node(&self, data: &str) -> Node {
        Node::text(data)
    }

    pub fn create_comment(&self, data: &str) -> Node {
        Node::comment(data)
    }

    pub fn active_element(&self) -> Option<Element> {
        match &self.0 .0.data {
            NodeData::Document { active } => active
                .borrow()
                .as_ref()
                .and_then(WeakNode::upgrade)
                .and_then(|n| n.as_element()),
            _ => None,
        }
    }

    fn set_active(&self, element: Option<&Element>) {
        if let NodeData::Document { active } = &self.0 .0.data {
            *active.borrow_mut() = element.map(|e| e.downgrade());
        }
    }

    /// Drop focus when the active element is inside a removed subtree.
    fn blur_within(&self, removed: &Node) {
        if let Some(active) = self.active_element() {
            if removed.contains(&active) {
                self.set_active(None);
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Document {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.0
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#document")
    }
}

// ---- Tests ----
