//! Property and method effects.

use super::{bind, EffectFn, Reactive};
use crate::value::Value;

/// Write `reactive` into property `name` of the target. On a component
/// target this goes through the component's own validation.
pub fn set_property(name: &str, reactive: impl Into<Reactive<Value>>) -> EffectFn {
    let name = name.to_string();
    bind(reactive.into(), move |_, target, value: Value| {
        if target.property(&name)? != value {
            target.set_property(&name, value)?;
        }
        Ok(())
    })
}

/// Show the target while `reactive` is true by toggling `hidden`.
pub fn show(reactive: impl Into<Reactive<bool>>) -> EffectFn {
    bind(reactive.into(), |_, target, visible: bool| {
        target.set_property("hidden", !visible)
    })
}

/// Focus the target whenever `reactive` becomes true.
pub fn focus(reactive: impl Into<Reactive<bool>>) -> EffectFn {
    bind(reactive.into(), |_, target, wanted: bool| {
        if wanted {
            target.focus();
        }
        Ok(())
    })
}

/// Call method `name` with `args` on the target whenever `reactive`
/// becomes true.
pub fn call_method(name: &str, reactive: impl Into<Reactive<bool>>, args: Vec<Value>) -> EffectFn {
    let name = name.to_string();
    bind(reactive.into(), move |_, target, wanted: bool| {
        if wanted {
            target.call_method(&name, &args)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Props;
    use crate::dom::Element;
    use crate::effects::testing::host;
    use crate::effects::{run_effects, Effects};
    use crate::reactive::State;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn property_and_visibility() {
        let (_doc, component) = host("x-prop", Props::new().value("open", false));
        let target = Element::new("input");
        component.element().append_child(&target);

        let value = State::new(Value::from("hello"));
        let effects = Effects::from([set_property("value", value.clone()), show("open")]);
        let _cleanup = run_effects(&effects, &component, &target).unwrap();
        assert_eq!(target.property("value"), Ok(Value::from("hello")));
        assert!(target.has_attribute("hidden"));

        value.set(Value::from("bye"));
        component.set("open", true).unwrap();
        assert_eq!(target.property("value"), Ok(Value::from("bye")));
        assert!(!target.has_attribute("hidden"));
    }

    #[test]
    fn focus_and_method_calls_fire_when_true() {
        let (document, component) = host("x-focus", Props::new().value("active", false));
        let target = Element::new("button");
        component.element().append_child(&target);
        let calls = Rc::new(RefCell::new(Vec::new()));
        target.define_method("scrollTo", {
            let calls = Rc::clone(&calls);
            move |_, args| {
                calls.borrow_mut().push(args.to_vec());
                Ok(Value::Null)
            }
        });

        let effects = Effects::from([
            focus("active"),
            call_method("scrollTo", "active", vec![Value::Int(0), Value::Int(40)]),
        ]);
        let _cleanup = run_effects(&effects, &component, &target).unwrap();
        assert_eq!(document.active_element(), None);
        assert!(calls.borrow().is_empty());

        component.set("active", true).unwrap();
        assert_eq!(document.active_element(), Some(target.clone()));
        assert_eq!(*calls.borrow(), vec![vec![Value::Int(0), Value::Int(40)]]);
    }
}
