//! UI Queries
//!
//! A component's `select` function names the elements its effects attach
//! to. Queries run against the host's shadow root when one is attached and
//! against the host otherwise.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::config::with_config;
use crate::dom::{Element, Node, Selector, WeakNode};
use crate::error::{Error, Result};
use crate::reactive::Collection;

/// The ui key that always refers to the host element.
pub const HOST: &str = "host";

/// One named ui entry.
#[derive(Clone)]
pub enum UiEntry {
    /// The first match, if any.
    One(Option<Element>),
    /// Every match, kept live.
    All(Collection),
}

impl fmt::Debug for UiEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiEntry::One(element) => f.debug_tuple("One").field(element).finish(),
            UiEntry::All(collection) => f.debug_tuple("All").field(collection).finish(),
        }
    }
}

struct UiInner {
    component: String,
    host: WeakNode,
    entries: IndexMap<String, UiEntry>,
}

/// The elements of one component instance, by name.
///
/// A `Ui` does not keep its host alive.
#[derive(Clone)]
pub struct Ui {
    inner: Rc<UiInner>,
}

impl Ui {
    pub fn component(&self) -> &str {
        &self.inner.component
    }

    /// The host element.
    pub fn host(&self) -> Result<Element> {
        self.inner
            .host
            .upgrade()
            .and_then(|node| node.as_element())
            .ok_or_else(|| Error::DetachedComponent {
                component: self.inner.component.clone(),
            })
    }

    pub fn entry(&self, name: &str) -> Option<&UiEntry> {
        self.inner.entries.get(name)
    }

    /// Whether `name` is the host key or a selected entry.
    pub fn has(&self, name: &str) -> bool {
        name == HOST || self.inner.entries.contains_key(name)
    }

    /// The element of a `first` entry. `"host"` resolves to the host.
    pub fn first(&self, name: &str) -> Option<Element> {
        if name == HOST {
            return self.host().ok();
        }
        match self.inner.entries.get(name)? {
            UiEntry::One(element) => element.clone(),
            UiEntry::All(collection) => collection.at(0),
        }
    }

    /// The collection of an `all` entry.
    pub fn all(&self, name: &str) -> Option<Collection> {
        match self.inner.entries.get(name)? {
            UiEntry::All(collection) => Some(collection.clone()),
            UiEntry::One(_) => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.entries.keys().map(String::as_str)
    }

    pub(crate) fn dispose(&self) {
        for entry in self.inner.entries.values() {
            if let UiEntry::All(collection) = entry {
                collection.dispose();
            }
        }
    }
}

impl fmt::Debug for Ui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ui")
            .field("component", &self.inner.component)
            .field("entries", &self.inner.entries)
            .finish()
    }
}

/// Builder handed to a component's `select` function.
///
/// ```rust,ignore
/// |q: &mut Queries| {
///     q.first_required("count", ".count")?.all("items", "li")?;
///     Ok(())
/// }
/// ```
pub struct Queries {
    component: String,
    host: Element,
    root: Node,
    entries: IndexMap<String, UiEntry>,
}

impl Queries {
    pub(crate) fn new(component: &str, host: &Element) -> Self {
        let root = host
            .shadow_root_any()
            .unwrap_or_else(|| host.node().clone());
        Self {
            component: component.to_string(),
            host: host.clone(),
            root,
            entries: IndexMap::new(),
        }
    }

    pub fn host(&self) -> &Element {
        &self.host
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if name == HOST || self.entries.contains_key(name) {
            return Err(Error::InvalidEffects {
                component: self.component.clone(),
                reason: format!("ui entry \"{name}\" is declared twice"),
            });
        }
        Ok(())
    }

    /// The first element matching `selector`, or nothing.
    pub fn first(&mut self, name: &str, selector: &str) -> Result<&mut Self> {
        self.check_name(name)?;
        let selector = Selector::parse(selector)?;
        let element = self.root.select_first(&selector);
        if element.is_none() && with_config(|c| c.warn_on_missing_optional) {
            tracing::warn!(
                component = %self.component,
                %selector,
                "optional ui element not found"
            );
        }
        self.entries.insert(name.to_string(), UiEntry::One(element));
        Ok(self)
    }

    /// The first element matching `selector`. Fails with
    /// [`Error::MissingElement`] when there is none.
    pub fn first_required(&mut self, name: &str, selector: &str) -> Result<&mut Self> {
        self.check_name(name)?;
        let parsed = Selector::parse(selector)?;
        let element = self
            .root
            .select_first(&parsed)
            .ok_or_else(|| Error::MissingElement {
                component: self.component.clone(),
                selector: selector.to_string(),
            })?;
        self.entries
            .insert(name.to_string(), UiEntry::One(Some(element)));
        Ok(self)
    }

    /// A live collection of every element matching `selector`.
    pub fn all(&mut self, name: &str, selector: &str) -> Result<&mut Self> {
        self.check_name(name)?;
        let collection = Collection::new(&self.root, selector)?;
        self.entries
            .insert(name.to_string(), UiEntry::All(collection));
        Ok(self)
    }

    pub(crate) fn finish(self) -> Ui {
        Ui {
            inner: Rc::new(UiInner {
                component: self.component,
                host: self.host.downgrade(),
                entries: self.entries,
            }),
        }
    }
}
