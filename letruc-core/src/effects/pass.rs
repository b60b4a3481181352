//! Passing signals down to descendant components.

use std::rc::Rc;

use super::{EffectFn, Reactive};
use crate::component::Component;
use crate::dom::Element;
use crate::error::{Error, Result};
use crate::reactive::{AnySignal, Cleanup, Memo, State};
use crate::value::Value;

/// Back properties of a descendant component with signals of the host.
///
/// Each entry maps a property of the target to a reactive of the host. A
/// host property name passes the host's own signal, so writes from either
/// side are seen by both. A literal becomes a fresh state and a closure a
/// memo. The target's original signals come back when the effect is
/// cleaned up.
///
/// The target must be a component, and every named property must be one of
/// its properties.
pub fn pass<'a, I>(props: I) -> EffectFn
where
    I: IntoIterator<Item = (&'a str, Reactive<Value>)>,
{
    let props: Vec<(String, Reactive<Value>)> = props
        .into_iter()
        .map(|(name, reactive)| (name.to_string(), reactive))
        .collect();
    EffectFn::new(move |host, target| {
        let Some(child) = Component::from_element(target) else {
            return Err(Error::InvalidCustomElement {
                tag: target.tag_name().to_string(),
            });
        };
        let mut passed: Vec<String> = Vec::with_capacity(props.len());
        for (name, reactive) in &props {
            let result = to_signal(host, target, reactive)
                .and_then(|signal| child.pass_signal(name, signal));
            if let Err(error) = result {
                for name in &passed {
                    child.restore(name);
                }
                return Err(error);
            }
            passed.push(name.clone());
        }
        tracing::debug!(
            from = host.name(),
            to = child.name(),
            props = passed.len(),
            "signals passed"
        );
        Ok(Cleanup::new(move || {
            for name in &passed {
                child.restore(name);
            }
        }))
    })
}

fn to_signal(host: &Component, target: &Element, reactive: &Reactive<Value>) -> Result<AnySignal<Value>> {
    Ok(match reactive {
        Reactive::Signal(signal) => Rc::clone(signal),
        Reactive::Prop(name) => host.signal(name).ok_or_else(|| Error::InvalidReactives {
            component: host.name().to_string(),
            reason: format!("host has no property `{name}` to pass"),
        })?,
        Reactive::Static(value) => Rc::new(State::new(value.clone())),
        Reactive::Fn(f) => {
            let (f, host, target) = (Rc::clone(f), host.clone(), target.clone());
            Rc::new(Memo::new(move || f(&host, &target)))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{define_component, Props, Setup};
    use crate::dom::Document;
    use crate::effects::run_effects;
    use crate::effects::testing::host;

    #[test]
    fn passed_signal_is_shared_until_restored() {
        define_component("x-child", Props::new().value("value", 0), |_| Ok(()), |_| {
            Setup::new()
        })
        .unwrap();
        let (_doc, parent) = host("x-parent", Props::new().value("count", 5));
        let child_element = Element::new("x-child");
        parent.element().append_child(&child_element);
        let child = Component::from_element(&child_element).unwrap();
        child.set("value", 1).unwrap();

        let cleanup = run_effects(
            &pass([("value", Reactive::prop("count"))]).into(),
            &parent,
            &child_element,
        )
        .unwrap();
        assert_eq!(child.get("value"), Ok(Value::Int(5)));

        child.set("value", 7).unwrap();
        assert_eq!(parent.get("count"), Ok(Value::Int(7)));
        parent.set("count", 8).unwrap();
        assert_eq!(child_element.property("value"), Ok(Value::Int(8)));

        cleanup.run();
        assert_eq!(child.get("value"), Ok(Value::Int(1)));
        assert_eq!(parent.get("count"), Ok(Value::Int(8)));
    }

    #[test]
    fn derived_values_pass_as_readonly() {
        define_component("x-leaf", Props::new().value("label", ""), |_| Ok(()), |_| {
            Setup::new()
        })
        .unwrap();
        let (_doc, parent) = host("x-root", Props::new().value("count", 2));
        let leaf = Element::new("x-leaf");
        parent.element().append_child(&leaf);
        let child = Component::from_element(&leaf).unwrap();

        let label = Reactive::func(|host: &Component, _: &Element| {
            Value::from(format!("{} items", host.get("count").unwrap_or_default()))
        });
        let _cleanup = run_effects(&pass([("label", label)]).into(), &parent, &leaf).unwrap();
        assert_eq!(child.get("label"), Ok(Value::from("2 items")));
        parent.set("count", 3).unwrap();
        assert_eq!(child.get("label"), Ok(Value::from("3 items")));
        assert!(matches!(
            child.set("label", "x"),
            Err(Error::ReadonlySignal { .. })
        ));
    }

    #[test]
    fn non_conforming_targets_are_rejected() {
        define_component("x-kid", Props::new().value("value", 0), |_| Ok(()), |_| {
            Setup::new()
        })
        .unwrap();
        let (_doc, parent) = host("x-host", Props::new().value("count", 0));
        let plain = Element::new("div");
        assert!(matches!(
            run_effects(&pass([("value", Reactive::prop("count"))]).into(), &parent, &plain),
            Err(Error::InvalidCustomElement { .. })
        ));

        let kid = Element::new("x-kid");
        let document = Document::new();
        document.body().append_child(&kid);
        let effects = pass([
            ("value", Reactive::prop("count")),
            ("missing", Reactive::value(Value::Int(1))),
        ]);
        assert!(matches!(
            run_effects(&effects.into(), &parent, &kid),
            Err(Error::InvalidReactives { .. })
        ));
        let child = Component::from_element(&kid).unwrap();
        assert!(child.signal("value").is_some_and(|s| s.try_get() == Ok(Value::Int(0))));
    }
}
