//! CSS Selectors
//!
//! Supports selector lists, descendant and child combinators, and compound
//! selectors made of a type (or `*`), `#id`, `.class` and attribute tests
//! (`[a]`, `[a=v]`, `[a~=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`).
//!
//! Matching runs right to left, and ancestors outside the query root may
//! satisfy combinators, as in browsers.

use std::fmt;

use super::node::{Element, Node};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    Prefix,
    Suffix,
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrTest {
    name: String,
    op: AttrOp,
    value: String,
}

impl AttrTest {
    fn matches(&self, element: &Element) -> bool {
        let Some(actual) = element.attribute(&self.name) else {
            return false;
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == self.value,
            AttrOp::Includes => actual.split_ascii_whitespace().any(|t| t == self.value),
            AttrOp::Prefix => !self.value.is_empty() && actual.starts_with(&self.value),
            AttrOp::Suffix => !self.value.is_empty() && actual.ends_with(&self.value),
            AttrOp::Substring => !self.value.is_empty() && actual.contains(&self.value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && !element.tag_name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attribute("id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = element.class_list();
            if !self.classes.iter().all(|c| classes.contains(c)) {
                return false;
            }
        }
        self.attrs.iter().all(|a| a.matches(element))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// One complex selector: compounds joined by combinators, left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    head: Compound,
    tail: Vec<(Combinator, Compound)>,
}

impl Complex {
    fn matches(&self, element: &Element) -> bool {
        let mut parts: Vec<(&Compound, Option<Combinator>)> = vec![(&self.head, None)];
        parts.extend(self.tail.iter().map(|(c, comp)| (comp, Some(*c))));
        match_from(&parts, parts.len() - 1, element)
    }
}

/// Match `parts[..=index]` with `parts[index]` on `element`.
fn match_from(parts: &[(&Compound, Option<Combinator>)], index: usize, element: &Element) -> bool {
    let (compound, combinator) = parts[index];
    if !compound.matches(element) {
        return false;
    }
    let Some(combinator) = combinator else {
        return true;
    };
    match combinator {
        Combinator::Child => element
            .parent_element()
            .is_some_and(|parent| match_from(parts, index - 1, &parent)),
        Combinator::Descendant => {
            let mut ancestor = element.parent_element();
            while let Some(candidate) = ancestor {
                if match_from(parts, index - 1, &candidate) {
                    return true;
                }
                ancestor = candidate.parent_element();
            }
            false
        }
    }
}

/// A parsed selector list.
#[derive(Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    list: Vec<Complex>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        let list = Parser::new(source).parse_list()?;
        Ok(Self {
            source: source.trim().to_string(),
            list,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, element: &Element) -> bool {
        self.list.iter().any(|c| c.matches(element))
    }

    /// Attribute names that can change the result of [`matches`](Self::matches).
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut push = |name: &str| {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        };
        for complex in &self.list {
            for compound in std::iter::once(&complex.head).chain(complex.tail.iter().map(|(_, c)| c)) {
                if compound.id.is_some() {
                    push("id");
                }
                if !compound.classes.is_empty() {
                    push("class");
                }
                for attr in &compound.attrs {
                    push(&attr.name);
                }
            }
        }
        names
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({:?})", self.source)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::InvalidSelector {
            selector: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn ident(&mut self) -> Result<String> {
        self.name(false)
    }

    /// Attribute names may carry a namespace prefix (`xlink:href`).
    fn name(&mut self, allow_colon: bool) -> Result<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_' || (allow_colon && c == ':'))
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error(match self.peek() {
                Some(c) => format!("unexpected `{c}` at {start}"),
                None => "unexpected end".to_string(),
            }));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_list(&mut self) -> Result<Vec<Complex>> {
        let mut list = Vec::new();
        loop {
            self.skip_whitespace();
            list.push(self.parse_complex()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                None => return Ok(list),
                Some(c) => return Err(self.error(format!("unexpected `{c}` at {}", self.pos))),
            }
        }
    }

    fn parse_complex(&mut self) -> Result<Complex> {
        let head = self.parse_compound()?;
        let mut tail = Vec::new();
        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(',') | None => break,
                Some(_) if had_space => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected `{c}` at {}", self.pos))),
            };
            tail.push((combinator, self.parse_compound()?));
        }
        Ok(Complex { head, tail })
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                compound.tag = Some("*".into());
            }
            Some(c) if c.is_alphabetic() => compound.tag = Some(self.ident()?.to_ascii_lowercase()),
            _ => {}
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.parse_attribute()?);
                }
                Some(':') => return Err(self.error("pseudo-classes are not supported")),
                _ => break,
            }
        }
        if compound.is_empty() {
            return Err(self.error(match self.peek() {
                Some(c) => format!("expected a selector at `{c}`"),
                None => "expected a selector".to_string(),
            }));
        }
        Ok(compound)
    }

    fn parse_attribute(&mut self) -> Result<AttrTest> {
        self.skip_whitespace();
        let name = self.name(true)?.to_ascii_lowercase();
        self.skip_whitespace();
        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrTest {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some('=') => AttrOp::Equals,
            Some('~') => AttrOp::Includes,
            Some('^') => AttrOp::Prefix,
            Some('$') => AttrOp::Suffix,
            Some('*') => AttrOp::Substring,
            _ => return Err(self.error("malformed attribute selector")),
        };
        self.pos += 1;
        if op != AttrOp::Equals {
            if self.peek() != Some('=') {
                return Err(self.error("malformed attribute operator"));
            }
            self.pos += 1;
        }
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(self.error("unterminated string"));
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                value
            }
            _ => self.ident()?,
        };
        self.skip_whitespace();
        if self.peek() != Some(']') {
            return Err(self.error("expected `]`"));
        }
        self.pos += 1;
        Ok(AttrTest { name, op, value })
    }
}

impl Node {
    /// First descendant element matching `selector`, in tree order.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>> {
        let selector = Selector::parse(selector)?;
        Ok(self.select_first(&selector))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>> {
        let selector = Selector::parse(selector)?;
        Ok(self.select_all(&selector))
    }

    pub fn select_first(&self, selector: &Selector) -> Option<Element> {
        self.descendants()
            .into_iter()
            .filter_map(|n| n.as_element())
            .find(|e| selector.matches(e))
    }

    pub fn select_all(&self, selector: &Selector) -> Vec<Element> {
        self.descendants()
            .into_iter()
            .filter_map(|n| n.as_element())
            .filter(|e| selector.matches(e))
            .collect()
    }
}

impl Element {
    pub fn matches(&self, selector: &str) -> Result<bool> {
        Ok(Selector::parse(selector)?.matches(self))
    }

    /// The nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, selector: &str) -> Result<Option<Element>> {
        let selector = Selector::parse(selector)?;
        let mut current = Some(self.clone());
        while let Some(element) = current {
            if selector.matches(&element) {
                return Ok(Some(element));
            }
            current = element.parent_element();
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Element {
        let root = Element::new("div");
        let list = Element::new("ul");
        list.set_attribute("class", "items main");
        for (id, kind) in [("a", "fruit"), ("b", "veg"), ("c", "fruit-dried")] {
            let item = Element::new("li");
            item.set_attribute("id", id);
            item.set_attribute("data-kind", kind);
            list.append_child(&item);
        }
        root.append_child(&list);
        root
    }

    fn ids(elements: Vec<Element>) -> Vec<String> {
        elements.iter().map(Element::id).collect()
    }

    #[test]
    fn simple_selectors() {
        let root = tree();
        assert_eq!(ids(root.query_selector_all("li").unwrap()), ["a", "b", "c"]);
        assert_eq!(ids(root.query_selector_all("#b").unwrap()), ["b"]);
        assert_eq!(root.query_selector_all(".items.main").unwrap().len(), 1);
        assert_eq!(root.query_selector_all("*").unwrap().len(), 4);
    }

    #[test]
    fn attribute_operators() {
        let root = tree();
        assert_eq!(ids(root.query_selector_all("[data-kind=fruit]").unwrap()), ["a"]);
        assert_eq!(ids(root.query_selector_all("[data-kind^='fruit']").unwrap()), ["a", "c"]);
        assert_eq!(ids(root.query_selector_all("[data-kind$=\"dried\"]").unwrap()), ["c"]);
        assert_eq!(ids(root.query_selector_all("[data-kind*=e]").unwrap()), ["b", "c"]);
        assert_eq!(root.query_selector_all("[class~=main]").unwrap().len(), 1);
        assert_eq!(root.query_selector_all("[id]").unwrap().len(), 3);
    }

    #[test]
    fn combinators() {
        let root = tree();
        assert_eq!(root.query_selector_all("div li").unwrap().len(), 3);
        assert_eq!(root.query_selector_all("div > li").unwrap().len(), 0);
        assert_eq!(root.query_selector_all("ul > li#c").unwrap().len(), 1);
        assert_eq!(ids(root.query_selector_all("#c, #a").unwrap()), ["a", "c"]);
    }

    #[test]
    fn closest_and_matches() {
        let root = tree();
        let item = root.query_selector("#b").unwrap().unwrap();
        assert!(item.matches("ul li").unwrap());
        assert_eq!(item.closest("ul").unwrap().map(|e| e.tag_name().to_string()), Some("ul".into()));
        assert!(item.closest("section").unwrap().is_none());
    }

    #[test]
    fn invalid_selectors_are_errors() {
        for bad in ["", "div >", "[x", "a:hover", ".", "li,,li", "[a|=b]"] {
            assert!(
                matches!(Selector::parse(bad), Err(Error::InvalidSelector { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn reports_attribute_dependencies() {
        let selector = Selector::parse("li.active[data-id], #main").unwrap();
        assert_eq!(selector.attribute_names(), ["class", "data-id", "id"]);
    }
}
