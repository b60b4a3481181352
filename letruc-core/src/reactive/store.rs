//! Store Implementation
//!
//! A Store mirrors a JSON object as a tree of signals: every leaf is a
//! [`State`], every nested object is another store, and each store keeps a
//! signal of its key set. Readers depend only on what they read, so a write
//! to `user.name` does not wake a reader of `user.age`.
//!
//! [`Store::set`] diffs the new object against the current tree and writes
//! only the leaves that changed, all in one batch. Adding or removing keys
//! notifies readers of the key set (and of [`Store::get`]).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use super::runtime::batch;
use super::signal::State;
use crate::error::{Error, Result};

#[derive(Clone)]
enum Entry {
    Leaf(State<Json>),
    Nested(Store),
}

impl Entry {
    fn from_json(value: Json) -> Self {
        match value {
            Json::Object(map) => Entry::Nested(Store::from_map(map)),
            other => Entry::Leaf(State::new(other)),
        }
    }

    fn get(&self) -> Json {
        match self {
            Entry::Leaf(state) => state.get(),
            Entry::Nested(store) => store.get(),
        }
    }
}

struct StoreInner {
    keys: State<Vec<String>>,
    /// Bumped when an entry is replaced by one of a different shape.
    shape: State<u64>,
    entries: RefCell<IndexMap<String, Entry>>,
}

/// A reactive JSON object.
///
/// # Example
///
/// ```rust
/// use letruc_core::reactive::Store;
/// use serde_json::json;
///
/// let store = Store::new(json!({ "user": { "name": "Ada", "age": 36 } })).unwrap();
/// let name = store.path("user.name").unwrap();
/// assert_eq!(name.get(), json!("Ada"));
///
/// store.set(json!({ "user": { "name": "Grace", "age": 36 } })).unwrap();
/// assert_eq!(name.get(), json!("Grace"));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    /// Build a store from a JSON object.
    pub fn new(value: Json) -> Result<Self> {
        match value {
            Json::Object(map) => Ok(Self::from_map(map)),
            other => Err(Error::InvalidSignalValue {
                name: "store".into(),
                reason: format!("expected a JSON object, got {other}"),
            }),
        }
    }

    fn from_map(map: Map<String, Json>) -> Self {
        let entries: IndexMap<String, Entry> = map
            .into_iter()
            .map(|(k, v)| (k, Entry::from_json(v)))
            .collect();
        Self {
            inner: Rc::new(StoreInner {
                keys: State::new(entries.keys().cloned().collect()),
                shape: State::new(0),
                entries: RefCell::new(entries),
            }),
        }
    }

    /// The whole object. Tracks the key set and every leaf.
    pub fn get(&self) -> Json {
        self.inner.keys.get();
        self.inner.shape.get();
        let entries: Vec<(String, Entry)> = self
            .inner
            .entries
            .borrow()
            .iter()
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();
        Json::Object(entries.into_iter().map(|(k, e)| (k, e.get())).collect())
    }

    /// The current keys, tracked.
    pub fn keys(&self) -> Vec<String> {
        self.inner.keys.get()
    }

    pub fn len(&self) -> usize {
        self.inner.keys.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The signal of a leaf field.
    pub fn field(&self, name: &str) -> Option<State<Json>> {
        match self.inner.entries.borrow().get(name) {
            Some(Entry::Leaf(state)) => Some(state.clone()),
            _ => None,
        }
    }

    /// A nested store.
    pub fn store(&self, name: &str) -> Option<Store> {
        match self.inner.entries.borrow().get(name) {
            Some(Entry::Nested(store)) => Some(store.clone()),
            _ => None,
        }
    }

    /// The leaf signal at a dotted path such as `"user.address.city"`.
    pub fn path(&self, path: &str) -> Option<State<Json>> {
        let mut segments = path.split('.').peekable();
        let mut store = self.clone();
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                return store.field(segment);
            }
            store = store.store(segment)?;
        }
        None
    }

    /// Replace the contents with `value`, writing only what changed.
    pub fn set(&self, value: Json) -> Result<()> {
        let Json::Object(map) = value else {
            return Err(Error::InvalidSignalValue {
                name: "store".into(),
                reason: "expected a JSON object".into(),
            });
        };
        batch(|| self.apply(map));
        Ok(())
    }

    fn apply(&self, mut map: Map<String, Json>) {
        let existing: Vec<String> = self.inner.entries.borrow().keys().cloned().collect();
        for key in existing {
            match map.remove(&key) {
                Some(value) => self.write(&key, value),
                None => {
                    self.inner.entries.borrow_mut().shift_remove(&key);
                }
            }
        }
        for (key, value) in map {
            self.inner
                .entries
                .borrow_mut()
                .insert(key, Entry::from_json(value));
        }
        self.sync_keys();
    }

    fn write(&self, key: &str, value: Json) {
        let current = self.inner.entries.borrow().get(key).cloned();
        match (current, value) {
            (Some(Entry::Nested(store)), Json::Object(map)) => store.apply(map),
            (Some(Entry::Leaf(state)), value) if !value.is_object() => state.set(value),
            (_, value) => {
                self.inner
                    .entries
                    .borrow_mut()
                    .insert(key.to_string(), Entry::from_json(value));
                self.inner.shape.update(|n| n + 1);
            }
        }
    }

    fn sync_keys(&self) {
        let keys: Vec<String> = self.inner.entries.borrow().keys().cloned().collect();
        self.inner.keys.set(keys);
    }

    /// Add or replace one entry.
    pub fn insert(&self, key: &str, value: Json) {
        batch(|| {
            if self.inner.entries.borrow().contains_key(key) {
                self.write(key, value);
            } else {
                self.inner
                    .entries
                    .borrow_mut()
                    .insert(key.to_string(), Entry::from_json(value));
            }
            self.sync_keys();
        });
    }

    /// Remove one entry. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.inner.entries.borrow_mut().shift_remove(key).is_some();
        if removed {
            self.sync_keys();
        }
        removed
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self.inner.keys.get_untracked();
        f.debug_struct("Store").field("keys", &keys).finish()
    }
}
