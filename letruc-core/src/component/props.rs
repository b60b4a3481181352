//! Property Initializers
//!
//! Every reactive property of a component is declared with an
//! [`Initializer`] saying where its signal comes from when the component
//! first connects.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::parsers::Parser;
use super::ui::Ui;
use crate::error::Result;
use crate::reactive::{AnySignal, Signal};
use crate::value::Value;

pub type Reader = Rc<dyn Fn(&Ui) -> Result<Value>>;
pub type Producer = Rc<dyn Fn(&Ui) -> Result<AnySignal<Value>>>;

/// Where a property's signal comes from.
#[derive(Clone)]
pub enum Initializer {
    /// A fresh state seeded with this value, or with the matching attribute
    /// parsed by the value's kind when present.
    Value(Value),
    /// An existing signal, bound to at most one live instance.
    Signal(AnySignal<Value>),
    /// A fresh state seeded by the parser and re-parsed on every change of
    /// the matching attribute.
    Parser(Parser),
    /// A memo over the ui.
    Reader(Reader),
    /// Any signal built from the ui, such as a sensor or a collection view.
    Producer(Producer),
}

impl Initializer {
    pub fn is_parser(&self) -> bool {
        matches!(self, Initializer::Parser(_))
    }
}

impl fmt::Debug for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Initializer::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Initializer::Signal(s) => f.debug_tuple("Signal").field(&s.id()).finish(),
            Initializer::Parser(_) => f.write_str("Parser"),
            Initializer::Reader(_) => f.write_str("Reader"),
            Initializer::Producer(_) => f.write_str("Producer"),
        }
    }
}

impl From<Parser> for Initializer {
    fn from(parser: Parser) -> Self {
        Initializer::Parser(parser)
    }
}

/// The declared properties of a component, in declaration order.
///
/// ```rust
/// use letruc_core::component::{as_integer, Props};
///
/// let props = Props::new()
///     .value("label", "Count")
///     .parser("count", as_integer(0));
/// assert_eq!(props.names().collect::<Vec<_>>(), ["label", "count"]);
/// ```
#[derive(Clone, Default)]
pub struct Props {
    entries: IndexMap<String, Initializer>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(mut self, name: &str, initializer: Initializer) -> Self {
        self.entries.insert(name.to_string(), initializer);
        self
    }

    pub fn value(self, name: &str, value: impl Into<Value>) -> Self {
        self.init(name, Initializer::Value(value.into()))
    }

    pub fn signal(self, name: &str, signal: impl Signal<Value>) -> Self {
        self.init(name, Initializer::Signal(Rc::new(signal)))
    }

    pub fn parser(self, name: &str, parser: Parser) -> Self {
        self.init(name, Initializer::Parser(parser))
    }

    pub fn reader(self, name: &str, reader: impl Fn(&Ui) -> Result<Value> + 'static) -> Self {
        self.init(name, Initializer::Reader(Rc::new(reader)))
    }

    pub fn producer(
        self,
        name: &str,
        producer: impl Fn(&Ui) -> Result<AnySignal<Value>> + 'static,
    ) -> Self {
        self.init(name, Initializer::Producer(Rc::new(producer)))
    }

    pub fn get(&self, name: &str) -> Option<&Initializer> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Initializer)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}
