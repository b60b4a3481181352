//! Effect Library
//!
//! Factories for the effects a component attaches to its elements. Each
//! factory returns an [`EffectFn`]: given the host component and a target
//! element, it starts a reactive [`Effect`] that reads a [`Reactive`] value
//! and writes it into the DOM, and returns the cleanup that stops it.
//!
//! A failing DOM write is logged and the effect stays subscribed; it runs
//! again the next time its dependencies change.

mod attribute;
mod content;
mod event;
mod pass;
mod property;

use std::fmt;
use std::rc::Rc;

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;

use crate::component::Component;
use crate::dom::Element;
use crate::error::{Error, Result};
use crate::reactive::{spawn, untrack, AnySignal, Cleanup, Effect, Memo, Signal, State};
use crate::value::FromValue;

pub use attribute::{check_attribute, set_attribute, set_style, toggle_attribute, toggle_class};
pub use content::{dangerously_set_inner_html, set_text, HtmlOptions};
pub use event::{on, Updates};
pub use pass::pass;
pub use property::{call_method, focus, set_property, show};

/// A value an effect reads: a literal, a host property, a signal, or a
/// function of the host and the target.
///
/// A string converts to a host property name, so `set_text("count")` shows
/// the host's `count` property.
pub enum Reactive<T: 'static> {
    Static(T),
    Prop(String),
    Signal(AnySignal<T>),
    Fn(Rc<dyn Fn(&Component, &Element) -> T>),
}

impl<T: 'static> Reactive<T> {
    pub fn value(value: T) -> Self {
        Reactive::Static(value)
    }

    pub fn prop(name: &str) -> Self {
        Reactive::Prop(name.to_string())
    }

    pub fn signal(signal: impl Signal<T>) -> Self {
        Reactive::Signal(Rc::new(signal))
    }

    pub fn func(f: impl Fn(&Component, &Element) -> T + 'static) -> Self {
        Reactive::Fn(Rc::new(f))
    }
}

impl<T: FromValue + Clone + 'static> Reactive<T> {
    /// Read the value, tracking whatever it depends on.
    pub fn read(&self, host: &Component, target: &Element) -> Result<T> {
        match self {
            Reactive::Static(value) => Ok(value.clone()),
            Reactive::Prop(name) => host.get(name).map(T::from_value),
            Reactive::Signal(signal) => signal.try_get(),
            Reactive::Fn(f) => Ok(f(host, target)),
        }
    }
}

impl<T> Clone for Reactive<T>
where
    T: Clone + 'static,
{
    fn clone(&self) -> Self {
        match self {
            Reactive::Static(value) => Reactive::Static(value.clone()),
            Reactive::Prop(name) => Reactive::Prop(name.clone()),
            Reactive::Signal(signal) => Reactive::Signal(Rc::clone(signal)),
            Reactive::Fn(f) => Reactive::Fn(Rc::clone(f)),
        }
    }
}

impl<T: 'static> From<&str> for Reactive<T> {
    fn from(name: &str) -> Self {
        Reactive::prop(name)
    }
}

impl<T: Clone + 'static> From<State<T>> for Reactive<T> {
    fn from(state: State<T>) -> Self {
        Reactive::signal(state)
    }
}

impl<T: Clone + 'static> From<Memo<T>> for Reactive<T> {
    fn from(memo: Memo<T>) -> Self {
        Reactive::signal(memo)
    }
}

impl<T> fmt::Debug for Reactive<T>
where
    T: fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reactive::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Reactive::Prop(name) => f.debug_tuple("Prop").field(name).finish(),
            Reactive::Signal(signal) => f.debug_tuple("Signal").field(&signal.id()).finish(),
            Reactive::Fn(_) => f.write_str("Fn"),
        }
    }
}

type AttachFn = dyn Fn(&Component, &Element) -> Result<Cleanup>;

/// An effect waiting to be attached to a target.
#[derive(Clone)]
pub struct EffectFn(Rc<AttachFn>);

impl EffectFn {
    pub fn new(attach: impl Fn(&Component, &Element) -> Result<Cleanup> + 'static) -> Self {
        Self(Rc::new(attach))
    }

    pub fn attach(&self, host: &Component, target: &Element) -> Result<Cleanup> {
        (self.0)(host, target)
    }
}

impl fmt::Debug for EffectFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EffectFn")
    }
}

type DeferredFn = dyn Fn() -> LocalBoxFuture<'static, Result<Effects>>;

/// One or more effects for one target.
#[derive(Clone)]
pub enum Effects {
    One(EffectFn),
    Many(Vec<EffectFn>),
    /// Effects produced asynchronously, such as from a lazily loaded
    /// module. They attach once the future resolves.
    Deferred(Rc<DeferredFn>),
}

impl Effects {
    pub fn deferred<F, Fut>(load: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: std::future::Future<Output = Result<Effects>> + 'static,
    {
        Effects::Deferred(Rc::new(move || load().boxed_local()))
    }

    /// Both `self` and `other`.
    pub fn and(self, other: Effects) -> Effects {
        match (self, other) {
            (Effects::Many(mut a), Effects::Many(b)) => {
                a.extend(b);
                Effects::Many(a)
            }
            (Effects::Many(mut a), Effects::One(b)) => {
                a.push(b);
                Effects::Many(a)
            }
            (Effects::One(a), Effects::Many(mut b)) => {
                b.insert(0, a);
                Effects::Many(b)
            }
            (Effects::One(a), Effects::One(b)) => Effects::Many(vec![a, b]),
            (a, b) => Effects::Many(vec![
                EffectFn::new(move |host, target| run_effects(&a, host, target)),
                EffectFn::new(move |host, target| run_effects(&b, host, target)),
            ]),
        }
    }
}

impl From<EffectFn> for Effects {
    fn from(effect: EffectFn) -> Self {
        Effects::One(effect)
    }
}

impl From<Vec<EffectFn>> for Effects {
    fn from(effects: Vec<EffectFn>) -> Self {
        Effects::Many(effects)
    }
}

impl<const N: usize> From<[EffectFn; N]> for Effects {
    fn from(effects: [EffectFn; N]) -> Self {
        Effects::Many(effects.into())
    }
}

impl fmt::Debug for Effects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effects::One(_) => f.write_str("One"),
            Effects::Many(effects) => write!(f, "Many({})", effects.len()),
            Effects::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// Attach `effects` to `target` and return a cleanup that stops all of them.
///
/// If one effect fails to attach, the ones already attached are cleaned up
/// and the error is returned. Deferred effects need
/// [`run_local`](crate::reactive::run_local); outside it they fail with
/// [`Error::InvalidEffects`].
pub fn run_effects(effects: &Effects, host: &Component, target: &Element) -> Result<Cleanup> {
    match effects {
        Effects::One(effect) => effect.attach(host, target),
        Effects::Many(list) => {
            let mut cleanups = Vec::with_capacity(list.len());
            for effect in list {
                match effect.attach(host, target) {
                    Ok(cleanup) => cleanups.push(cleanup),
                    Err(error) => {
                        Cleanup::all(cleanups).run();
                        return Err(error);
                    }
                }
            }
            Ok(Cleanup::all(cleanups))
        }
        Effects::Deferred(load) => run_deferred(load(), host, target),
    }
}

fn run_deferred(
    future: LocalBoxFuture<'static, Result<Effects>>,
    host: &Component,
    target: &Element,
) -> Result<Cleanup> {
    let attached: Rc<std::cell::RefCell<Option<Cleanup>>> = Rc::default();
    let cancelled = Rc::new(std::cell::Cell::new(false));
    let handle = spawn("deferred effects", {
        let (host, target) = (host.clone(), target.clone());
        let (attached, cancelled) = (Rc::clone(&attached), Rc::clone(&cancelled));
        async move {
            let effects = match future.await {
                Ok(effects) => effects,
                Err(error) => {
                    tracing::error!(component = host.name(), %error, "deferred effects failed to load");
                    return;
                }
            };
            if cancelled.get() {
                return;
            }
            match untrack(|| run_effects(&effects, &host, &target)) {
                Ok(cleanup) => *attached.borrow_mut() = Some(cleanup),
                Err(error) => {
                    tracing::error!(component = host.name(), %error, "deferred effects failed to attach")
                }
            }
        }
    })
    .map_err(|error| Error::InvalidEffects {
        component: host.name().to_string(),
        reason: error.to_string(),
    })?;
    Ok(Cleanup::new(move || {
        cancelled.set(true);
        handle.abort();
        let cleanup = attached.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }
    }))
}

/// Build an effect that writes `reactive` into the target with `update`
/// every time it changes.
pub(crate) fn bind<T, U>(reactive: Reactive<T>, update: U) -> EffectFn
where
    T: FromValue + Clone + 'static,
    U: Fn(&Component, &Element, T) -> Result<()> + 'static,
{
    let update = Rc::new(update);
    EffectFn::new(move |host, target| {
        let (reactive, update) = (reactive.clone(), Rc::clone(&update));
        let (host, target) = (host.clone(), target.clone());
        let effect = Effect::new(move || -> Result<()> {
            let value = reactive.read(&host, &target)?;
            untrack(|| update(&host, &target, value))
        });
        Ok(effect.into_cleanup())
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::component::{define_component, Props, Setup};
    use crate::dom::Document;

    /// A connected component named `tag` with `props`, for effect tests.
    pub(crate) fn host(tag: &str, props: Props) -> (Document, Component) {
        define_component(tag, props, |_| Ok(()), |_| Setup::new()).unwrap();
        let document = Document::new();
        let element = Element::new(tag);
        document.body().append_child(&element);
        let component = Component::from_element(&element).unwrap();
        (document, component)
    }
}
