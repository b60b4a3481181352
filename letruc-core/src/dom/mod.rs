//! Host Document Model
//!
//! The platform primitives the component layer builds on: a document tree
//! with attributes, properties and shadow roots, event dispatch, mutation
//! observers, CSS selectors, HTML fragments, a custom element registry and
//! a manually driven event loop.
//!
//! Everything here is single-threaded and lives in thread-locals, like the
//! reactive runtime.

mod event;
mod event_loop;
mod html;
mod node;
mod observer;
pub mod registry;
mod selector;

pub use event::{Event, ListenerId, ListenerOptions};
pub use event_loop::{
    cancel_animation_frame, frame_count, has_pending_work, perform_microtask_checkpoint,
    queue_microtask, request_animation_frame, run_animation_frame, run_script,
    set_script_runner, FrameHandle, ScriptRunner,
};
pub use html::{decode_entities, parse_fragment};
pub use node::{
    Document, Element, Method, Node, NodeKey, NodeType, PropertyAccessor, ShadowRootMode,
    WeakNode,
};
pub use observer::{MutationKind, MutationObserver, MutationObserverInit, MutationRecord};
pub use registry::{CustomElementDefinition, CustomElementHooks};
pub use selector::Selector;
