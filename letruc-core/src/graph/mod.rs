//! Dependency Graph
//!
//! This module implements the computational dependency graph that tracks
//! relationships between reactive values and computations.
//!
//! # Overview
//!
//! The dependency graph is a directed acyclic graph (DAG) where:
//!
//! - Nodes represent reactive values (sources) or computations (memos, effects)
//! - Edges represent dependencies: if A depends on B, there is an edge from B to A
//!
//! When a source changes, we traverse the graph to find all affected nodes
//! and mark them as dirty. Re-evaluation happens lazily when a stale node is
//! read or a stale effect is flushed.
//!
//! # Design Decisions
//!
//! 1. Nodes live in a generational arena ([`slotmap`]) and refer to each other
//!    by [`NodeId`], never by pointer. There are no reference cycles between
//!    signals and their observers, and a stale id held by a disposed observer
//!    can never reach a newer node.
//!
//! 2. We maintain both forward (sources) and reverse (observers) edges
//!    to enable efficient traversal in both directions.
//!
//! 3. Values are not stored in the graph. Typed handles own their values;
//!    the graph only knows how to ask a node to re-evaluate.

mod arena;
mod node;

pub use arena::ReactiveGraph;
pub use node::{Computation, DirtyState, Edges, Node, NodeId, NodeKind};
pub(crate) use node::Handler;
