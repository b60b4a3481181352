//! Text and markup effects.

use super::{bind, EffectFn, Reactive};
use crate::dom::{run_script, Element, Node, NodeType, ShadowRootMode};

/// Replace the target's content with one text node. Comment children stay
/// where they are.
pub fn set_text(reactive: impl Into<Reactive<String>>) -> EffectFn {
    bind(reactive.into(), |_, target, text: String| {
        let content: Vec<Node> = target
            .children()
            .into_iter()
            .filter(|n| n.node_type() != NodeType::Comment)
            .collect();
        if let [only] = content.as_slice() {
            if only.node_type() == NodeType::Text && only.data().as_deref() == Some(text.as_str()) {
                return Ok(());
            }
        }
        for child in &content {
            target.remove_child(child);
        }
        target.append_child(&Node::text(&text));
        Ok(())
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HtmlOptions {
    /// Render into a shadow root of this mode instead of the light DOM.
    pub shadow_root_mode: Option<ShadowRootMode>,
    /// Re-create `<script>` elements so the script runner executes them.
    pub allow_scripts: bool,
}

/// Replace the target's markup with `reactive`.
///
/// Parsed markup never executes scripts. With
/// [`allow_scripts`](HtmlOptions::allow_scripts) every `<script>` in the new
/// markup is replaced by a fresh copy and handed to the installed script
/// runner.
pub fn dangerously_set_inner_html(
    reactive: impl Into<Reactive<String>>,
    options: HtmlOptions,
) -> EffectFn {
    bind(reactive.into(), move |host, target, html: String| {
        let root = match options.shadow_root_mode {
            Some(mode) => target.attach_shadow(mode),
            None => target.node().clone(),
        };
        if root.inner_html() == html {
            return Ok(());
        }
        root.set_inner_html(&html);
        if options.allow_scripts {
            let scripts = root.query_selector_all("script")?;
            tracing::debug!(component = host.name(), scripts = scripts.len(), "re-creating scripts");
            for script in scripts {
                rerun_script(&script);
            }
        }
        Ok(())
    })
}

fn rerun_script(script: &Element) {
    let Some(parent) = script.parent() else {
        return;
    };
    let fresh = Element::new("script");
    for (name, value) in script.attributes() {
        fresh.set_attribute(&name, &value);
    }
    fresh.set_text_content(&script.text_content());
    parent.insert_before(&fresh, Some(script.node()));
    script.remove();
    run_script(&fresh);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Props;
    use crate::dom::set_script_runner;
    use crate::effects::run_effects;
    use crate::effects::testing::host;
    use crate::reactive::State;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn set_text_keeps_comments() {
        let (_doc, component) = host("x-text", Props::new().value("label", "one"));
        let target = Element::new("p");
        target.set_inner_html("<!--marker--><b>old</b>text");
        component.element().append_child(&target);

        let _cleanup = run_effects(&set_text("label").into(), &component, &target).unwrap();
        assert_eq!(target.inner_html(), "<!--marker-->one");

        component.set("label", "two").unwrap();
        assert_eq!(target.inner_html(), "<!--marker-->two");
    }

    #[test]
    fn inner_html_into_shadow_root() {
        let (_doc, component) = host("x-shadow", Props::new());
        let target = component.element().clone();
        let markup = State::new(String::from("<p>a</p>"));
        let options = HtmlOptions {
            shadow_root_mode: Some(ShadowRootMode::Open),
            allow_scripts: false,
        };
        let _cleanup = run_effects(
            &dangerously_set_inner_html(markup.clone(), options).into(),
            &component,
            &target,
        )
        .unwrap();
        let root = target.shadow_root().unwrap();
        assert_eq!(root.inner_html(), "<p>a</p>");
        assert_eq!(target.inner_html(), "");

        markup.set(String::from("<p>b</p>"));
        assert_eq!(root.inner_html(), "<p>b</p>");
    }

    #[test]
    fn scripts_run_only_when_allowed() {
        let ran = Rc::new(RefCell::new(Vec::new()));
        set_script_runner({
            let ran = Rc::clone(&ran);
            move |script| ran.borrow_mut().push(script.text_content())
        });
        let (_doc, component) = host("x-scripts", Props::new());
        let html = "<script>boot()</script><p>x</p>";

        let inert = Element::new("div");
        let _a = run_effects(
            &dangerously_set_inner_html(Reactive::value(html.to_string()), HtmlOptions::default())
                .into(),
            &component,
            &inert,
        )
        .unwrap();
        assert!(ran.borrow().is_empty());

        let live = Element::new("div");
        let options = HtmlOptions {
            allow_scripts: true,
            ..HtmlOptions::default()
        };
        let _b = run_effects(
            &dangerously_set_inner_html(Reactive::value(html.to_string()), options).into(),
            &component,
            &live,
        )
        .unwrap();
        assert_eq!(*ran.borrow(), vec!["boot()".to_string()]);
        assert_eq!(live.inner_html(), html);
    }
}
