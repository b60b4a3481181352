//! Attribute, class and style effects.

use super::{bind, EffectFn, Reactive};
use crate::error::{Error, Result};
use crate::value::Value;

const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "formaction",
    "poster",
    "cite",
    "background",
    "xlink:href",
];

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto", "tel", "ftp"];

/// Reject attribute writes that could execute script: event handler
/// attributes, and URL attributes with a scheme outside the safe list.
/// Relative URLs have no scheme and pass.
pub fn check_attribute(name: &str, value: &str) -> Result<()> {
    let unsafe_attribute = || Error::UnsafeAttribute {
        name: name.to_string(),
        value: value.to_string(),
    };
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("on") {
        return Err(unsafe_attribute());
    }
    if !URL_ATTRIBUTES.contains(&lower.as_str()) {
        return Ok(());
    }
    match url_scheme(value) {
        Some(scheme) if !SAFE_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) => {
            Err(unsafe_attribute())
        }
        _ => Ok(()),
    }
}

/// The scheme of `url`, ignoring whitespace and control characters
/// browsers strip before parsing.
fn url_scheme(url: &str) -> Option<String> {
    let cleaned: String = url
        .trim()
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect();
    let colon = cleaned.find(':')?;
    let scheme = &cleaned[..colon];
    if scheme.is_empty() || scheme.contains(['/', '?', '#']) {
        return None;
    }
    Some(scheme.to_string())
}

/// Reflect `reactive` into attribute `name`. `Null` removes the attribute.
///
/// Unsafe values are logged and leave the attribute as it was.
pub fn set_attribute(name: &str, reactive: impl Into<Reactive<Value>>) -> EffectFn {
    let name = name.to_string();
    bind(reactive.into(), move |host, target, value: Value| {
        match value.to_attribute() {
            None => {
                target.remove_attribute(&name);
            }
            Some(value) => {
                if let Err(error) = check_attribute(&name, &value) {
                    tracing::warn!(component = host.name(), %error, "attribute write rejected");
                    return Ok(());
                }
                if target.attribute(&name).as_deref() != Some(value.as_str()) {
                    target.set_attribute(&name, &value);
                }
            }
        }
        Ok(())
    })
}

/// Add attribute `name` (empty value) while `reactive` is true.
pub fn toggle_attribute(name: &str, reactive: impl Into<Reactive<bool>>) -> EffectFn {
    let name = name.to_string();
    bind(reactive.into(), move |_, target, present: bool| {
        if target.has_attribute(&name) != present {
            target.toggle_attribute(&name, Some(present));
        }
        Ok(())
    })
}

pub fn toggle_class(token: &str, reactive: impl Into<Reactive<bool>>) -> EffectFn {
    let token = token.to_string();
    bind(reactive.into(), move |_, target, present: bool| {
        target.toggle_class(&token, Some(present));
        Ok(())
    })
}

/// Set inline style property `name`. `Null` removes it.
pub fn set_style(name: &str, reactive: impl Into<Reactive<Value>>) -> EffectFn {
    let name = name.to_string();
    bind(reactive.into(), move |_, target, value: Value| {
        match value.to_attribute() {
            Some(value) => target.set_style_property(&name, &value),
            None => target.remove_style_property(&name),
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Props;
    use crate::effects::run_effects;
    use crate::effects::testing::host;
    use crate::reactive::State;

    #[test]
    fn unsafe_values_are_detected() {
        assert!(check_attribute("href", "https://example.com").is_ok());
        assert!(check_attribute("href", "/relative/path?x=a:b").is_ok());
        assert!(check_attribute("title", "javascript:alert(1)").is_ok());
        assert!(check_attribute("href", " JavaScript:alert(1)").is_err());
        assert!(check_attribute("src", "java\tscript:alert(1)").is_err());
        assert!(check_attribute("onclick", "alert(1)").is_err());
        assert!(check_attribute("ONLOAD", "x").is_err());
    }

    #[test]
    fn attribute_follows_reactive_and_rejects_unsafe_values() {
        let (_doc, component) = host("x-attr", Props::new());
        let target = component.element().clone();
        let href = State::new(Value::from("https://example.com"));
        let cleanup =
            run_effects(&set_attribute("href", href.clone()).into(), &component, &target).unwrap();
        assert_eq!(target.attribute("href").as_deref(), Some("https://example.com"));

        href.set(Value::from("javascript:alert(1)"));
        assert_eq!(target.attribute("href").as_deref(), Some("https://example.com"));

        href.set(Value::Null);
        assert!(!target.has_attribute("href"));

        cleanup.run();
        href.set(Value::from("/after"));
        assert!(!target.has_attribute("href"));
    }

    #[test]
    fn class_and_style_effects() {
        let (_doc, component) = host("x-class", Props::new().value("active", true));
        let target = component.element().clone();
        let width = State::new(Value::from("10px"));
        let effects = crate::effects::Effects::from([
            toggle_class("active", "active"),
            set_style("width", width.clone()),
        ]);
        let _cleanup = run_effects(&effects, &component, &target).unwrap();
        assert!(target.has_class("active"));
        assert_eq!(target.style_property("width").as_deref(), Some("10px"));

        component.set("active", false).unwrap();
        width.set(Value::Null);
        assert!(!target.has_class("active"));
        assert_eq!(target.style_property("width"), None);
    }
}
