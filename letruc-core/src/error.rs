//! Error Types
//!
//! Every failure the core can report is a named variant of [`Error`]. The
//! variants carry the component, property, or selector involved so the
//! message points straight at the misconfiguration.
//!
//! Configuration errors (component names, property names, effect wiring)
//! are returned at definition or attach time. Graph errors (cycles, timeouts)
//! are returned from the read that discovers them.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All failure kinds of the reactive core and the component layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A custom element name is not a valid custom element name.
    #[error("invalid component name \"{name}\": {reason}")]
    InvalidComponentName { name: String, reason: &'static str },

    /// A declared property collides with a reserved word or a native element member.
    #[error("invalid property name \"{prop}\" for component <{component}>: {reason}")]
    InvalidPropertyName {
        component: String,
        prop: String,
        reason: &'static str,
    },

    /// The target of `pass` is not an upgraded component.
    #[error("target <{tag}> is not a defined custom element")]
    InvalidCustomElement { tag: String },

    /// The reactives handed to `pass` do not fit the target component.
    #[error("invalid reactives for <{component}>: {reason}")]
    InvalidReactives { component: String, reason: String },

    /// The effects returned by a component setup cannot be attached.
    #[error("invalid effects for <{component}>: {reason}")]
    InvalidEffects { component: String, reason: String },

    /// A value was rejected by the signal it was written to.
    #[error("invalid value for signal \"{name}\": {reason}")]
    InvalidSignalValue { name: String, reason: String },

    /// A non-nullable signal would have been set to null.
    #[error("nullish value for signal \"{name}\"")]
    NullishSignalValue { name: String },

    /// A write to a signal that has no setter.
    #[error("signal \"{name}\" is read-only")]
    ReadonlySignal { name: String },

    /// A callback argument could not be used.
    #[error("invalid callback for {context}")]
    InvalidCallback { context: String },

    /// A derived signal read itself while it was being computed.
    #[error("circular dependency detected while computing {node}")]
    CircularDependency { node: String },

    /// An awaited dependency did not resolve within the allowed time.
    #[error("dependency {node} did not resolve within {timeout_ms}ms")]
    DependencyTimeout { node: String, timeout_ms: u64 },

    /// A required UI element was not found in the component's subtree.
    #[error("missing required element \"{selector}\" in <{component}>")]
    MissingElement { component: String, selector: String },

    /// A CSS selector could not be parsed.
    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// An attribute write was refused because it could carry script.
    #[error("unsafe value for attribute \"{name}\": {value}")]
    UnsafeAttribute { name: String, value: String },

    /// The element behind a component handle no longer exists.
    #[error("element of <{component}> has been dropped")]
    DetachedComponent { component: String },
}

impl Error {
    /// Whether this error is a configuration error that should have been
    /// caught at definition time.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidComponentName { .. }
                | Error::InvalidPropertyName { .. }
                | Error::InvalidCustomElement { .. }
                | Error::InvalidReactives { .. }
                | Error::InvalidEffects { .. }
                | Error::InvalidCallback { .. }
                | Error::InvalidSelector { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = Error::InvalidPropertyName {
            component: "my-counter".into(),
            prop: "id".into(),
            reason: "native element member",
        };
        let message = err.to_string();
        assert!(message.contains("my-counter"));
        assert!(message.contains("\"id\""));
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(Error::InvalidComponentName {
            name: "x".into(),
            reason: "must contain a hyphen"
        }
        .is_configuration());
        assert!(!Error::CircularDependency { node: "memo".into() }.is_configuration());
    }
}
