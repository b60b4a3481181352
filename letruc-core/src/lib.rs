//! Le Truc Core
//!
//! This crate provides the runtime of the Le Truc web component library.
//! It implements:
//!
//! - Reactive primitives (states, memos, effects, sensors, tasks,
//!   collections, stores)
//! - A frame scheduler and batched effect flushing
//! - Component definitions that turn reactive properties into custom
//!   elements
//! - A library of effects binding signals to DOM mutations
//!
//! # Architecture
//!
//! - `graph`: the dependency graph, an arena of nodes addressed by id
//! - `reactive`: signal primitives, tracking, batching and scheduling
//! - `dom`: the host document model (nodes, events, mutation observers,
//!   custom element registry, event loop)
//! - `component`: `define_component` and component instances
//! - `effects`: effect factories attached by component setup
//!
//! Everything is single threaded. The runtime, the document model and the
//! configuration live in thread-locals.
//!
//! # Example
//!
//! ```rust
//! use letruc_core::reactive::{Effect, Memo, State};
//!
//! let count = State::new(0);
//! let doubled = Memo::new({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! let effect = Effect::new({
//!     let doubled = doubled.clone();
//!     move || println!("doubled: {:?}", doubled.get())
//! });
//!
//! count.set(5);
//! assert_eq!(doubled.get(), Ok(10));
//! effect.dispose();
//! ```

pub mod component;
pub mod config;
pub mod dom;
pub mod effects;
pub mod error;
pub mod graph;
pub mod reactive;
pub mod value;

pub use component::{define_component, Component, Props, Setup};
pub use config::{config, configure, Config};
pub use error::{Error, Result};
pub use reactive::{batch, schedule, untrack, Effect, Memo, State};
pub use value::Value;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
