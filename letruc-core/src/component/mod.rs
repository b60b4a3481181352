//! Component Layer
//!
//! Turns a declaration (properties, ui queries, setup) into a custom
//! element. See [`define_component`].
//!
//! Each property is a signal behind a [`SignalSlot`]. The element exposes it
//! as a property of the same name, so `element.set_property("count", 5)`
//! writes the signal and `element.property("count")` reads it. Parser
//! properties also follow their attribute.

mod define;
mod instance;
mod parsers;
mod props;
mod slot;
mod ui;

pub use define::{define_component, validate_property_name, Setup};
pub use instance::{Component, Lifecycle};
pub use parsers::{as_boolean, as_enum, as_integer, as_json, as_number, as_string, parser, Parser};
pub use props::{Initializer, Producer, Props, Reader};
pub use slot::SignalSlot;
pub use ui::{Queries, Ui, UiEntry, HOST};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{perform_microtask_checkpoint, Document, Element};
    use crate::effects::{on, set_attribute, set_text, toggle_attribute, Updates};
    use crate::error::Error;
    use crate::reactive::{Memo, State};
    use crate::value::Value;
    use std::cell::Cell;
    use std::rc::Rc;

    fn mount(document: &Document, tag: &str, html: &str) -> Element {
        let element = Element::new(tag);
        element.set_inner_html(html);
        document.body().append_child(&element);
        element
    }

    #[test]
    fn lifecycle_resolves_once_and_reattaches() {
        let setups = Rc::new(Cell::new(0));
        define_component("life-cycle", Props::new().value("count", 1), |_| Ok(()), {
            let setups = Rc::clone(&setups);
            move |_| {
                setups.set(setups.get() + 1);
                Setup::new()
            }
        })
        .unwrap();

        let document = Document::new();
        let element = Element::new("life-cycle");
        let component = Component::from_element(&element).unwrap();
        assert_eq!(component.lifecycle(), Lifecycle::Unattached);
        assert!(!component.is_resolved());

        document.body().append_child(&element);
        assert_eq!(component.lifecycle(), Lifecycle::Connected);
        component.set("count", 5).unwrap();
        let slot_before = component.signal("count").map(|s| s.id());

        element.remove();
        assert_eq!(component.lifecycle(), Lifecycle::Disconnected);
        document.body().append_child(&element);
        assert_eq!(component.lifecycle(), Lifecycle::Connected);

        assert_eq!(setups.get(), 2);
        assert_eq!(component.get("count"), Ok(Value::Int(5)));
        assert_eq!(component.signal("count").map(|s| s.id()), slot_before);
    }

    #[test]
    fn checkbox_scenario_toggles_attribute() {
        define_component(
            "toggle-box",
            Props::new().value("checked", false),
            |_| Ok(()),
            |_| {
                Setup::new()
                    .with("host", toggle_attribute("checked", "checked"))
                    .with(
                        "host",
                        on("click", |_, host, _| {
                            let checked = host.get("checked").ok()?.is_truthy();
                            Some(Updates::new().set("checked", !checked))
                        }),
                    )
            },
        )
        .unwrap();

        let document = Document::new();
        let toggle = mount(&document, "toggle-box", "");
        assert!(!toggle.has_attribute("checked"));
        toggle.click();
        assert!(toggle.has_attribute("checked"));
        assert_eq!(toggle.property("checked"), Ok(Value::Bool(true)));
        toggle.click();
        assert!(!toggle.has_attribute("checked"));
    }

    #[test]
    fn property_and_attribute_round_trip() {
        define_component(
            "round-trip",
            Props::new().parser("x", as_integer(0)),
            |_| Ok(()),
            |_| Setup::new().with("host", set_attribute("x", "x")),
        )
        .unwrap();

        let document = Document::new();
        let element = mount(&document, "round-trip", "");
        element.set_attribute("x", "5");
        assert_eq!(element.property("x"), Ok(Value::Int(5)));

        element.set_property("x", 6).unwrap();
        assert_eq!(element.attribute("x").as_deref(), Some("6"));
    }

    #[test]
    fn attribute_seeds_plain_values_and_early_writes_apply() {
        define_component(
            "seeded-value",
            Props::new().value("label", "none").value("size", 1),
            |q| {
                q.first("out", "output")?;
                Ok(())
            },
            |_| Setup::new().with("out", set_text("label")),
        )
        .unwrap();

        let document = Document::new();
        let element = Element::new("seeded-value");
        element.set_inner_html("<output></output>");
        element.set_attribute("label", "from attribute");
        element.set_property("size", 3).unwrap();
        assert_eq!(element.property("label"), Ok(Value::from("from attribute")));

        document.body().append_child(&element);
        assert_eq!(element.text_content(), "from attribute");
        assert_eq!(element.property("size"), Ok(Value::Int(3)));
    }

    #[test]
    fn writes_are_validated() {
        define_component(
            "strict-props",
            Props::new()
                .value("count", 0)
                .reader("double", |ui| {
                    let count = ui.host()?.property("count")?;
                    Ok(Value::Int(count.as_i64().unwrap_or_default() * 2))
                }),
            |_| Ok(()),
            |_| Setup::new(),
        )
        .unwrap();

        let document = Document::new();
        let element = mount(&document, "strict-props", "");
        let component = Component::from_element(&element).unwrap();

        assert!(matches!(
            component.set("count", Value::Null),
            Err(Error::NullishSignalValue { .. })
        ));
        assert!(matches!(
            component.set("count", "three"),
            Err(Error::InvalidSignalValue { .. })
        ));
        assert!(matches!(
            component.set("double", 4),
            Err(Error::ReadonlySignal { .. })
        ));
        assert!(matches!(
            component.set("nope", 1),
            Err(Error::InvalidPropertyName { .. })
        ));

        component.set("count", 2.0).unwrap();
        assert_eq!(component.get("double"), Ok(Value::Int(4)));
    }

    #[test]
    fn missing_required_element_blocks_connect() {
        define_component(
            "needs-button",
            Props::new(),
            |q| {
                q.first_required("button", "button")?;
                Ok(())
            },
            |_| Setup::new(),
        )
        .unwrap();

        let document = Document::new();
        let element = mount(&document, "needs-button", "<span></span>");
        let component = Component::from_element(&element).unwrap();
        assert!(!component.is_resolved());
        assert!(matches!(component.error(), Some(Error::MissingElement { .. })));

        element.remove();
        element.set_inner_html("<button>go</button>");
        document.body().append_child(&element);
        assert!(component.is_resolved());
        assert_eq!(component.error(), None);
    }

    #[test]
    fn unknown_setup_keys_are_rejected() {
        define_component("bad-keys", Props::new(), |_| Ok(()), |_| {
            Setup::new().with("missing", set_text("label"))
        })
        .unwrap();

        let document = Document::new();
        let element = mount(&document, "bad-keys", "");
        let component = Component::from_element(&element).unwrap();
        assert!(matches!(component.error(), Some(Error::InvalidEffects { .. })));
    }

    #[test]
    fn shared_signal_is_bound_to_one_live_instance() {
        let shared = State::new(Value::Int(0));
        define_component(
            "shared-prop",
            Props::new().signal("value", shared.clone()),
            |_| Ok(()),
            |_| Setup::new(),
        )
        .unwrap();

        let document = Document::new();
        let first = mount(&document, "shared-prop", "");
        let second = mount(&document, "shared-prop", "");
        let first = Component::from_element(&first).unwrap();
        let second_component = Component::from_element(&second).unwrap();
        assert_eq!(first.error(), None);
        assert!(matches!(
            second_component.error(),
            Some(Error::InvalidReactives { .. })
        ));

        first.element().remove();
        second.remove();
        document.body().append_child(&second);
        assert_eq!(second_component.error(), None);
        second_component.set("value", 9).unwrap();
        assert_eq!(shared.get(), Value::Int(9));
    }

    #[test]
    fn effects_follow_collection_membership() {
        define_component(
            "item-list",
            Props::new().value("mark", "x"),
            |q| {
                q.all("items", "li")?;
                Ok(())
            },
            |_| Setup::new().with("items", set_attribute("data-mark", "mark")),
        )
        .unwrap();

        let document = Document::new();
        let list = mount(&document, "item-list", "<ul><li>a</li></ul>");
        let ul = list.query_selector("ul").unwrap().unwrap();
        assert_eq!(ul.child_elements()[0].attribute("data-mark").as_deref(), Some("x"));

        let added = Element::new("li");
        ul.append_child(&added);
        perform_microtask_checkpoint();
        assert_eq!(added.attribute("data-mark").as_deref(), Some("x"));

        list.set_property("mark", "y").unwrap();
        assert_eq!(added.attribute("data-mark").as_deref(), Some("y"));

        added.remove();
        perform_microtask_checkpoint();
        list.set_property("mark", "z").unwrap();
        assert_eq!(added.attribute("data-mark").as_deref(), Some("y"));
    }

    #[test]
    fn reader_props_are_memos_over_the_ui() {
        define_component(
            "reads-ui",
            Props::new().reader("items", |ui| {
                Ok(Value::Int(ui.all("items").map_or(0, |c| c.len()) as i64))
            }),
            |q| {
                q.all("items", "li")?;
                Ok(())
            },
            |_| Setup::new(),
        )
        .unwrap();

        let document = Document::new();
        let element = mount(&document, "reads-ui", "<li></li><li></li>");
        let count = Memo::new({
            let element = element.clone();
            move || element.property("items").unwrap_or_default()
        });
        assert_eq!(count.get(), Ok(Value::Int(2)));

        element.append_child(&Element::new("li"));
        perform_microtask_checkpoint();
        assert_eq!(count.get(), Ok(Value::Int(3)));
    }
}
