//! Event listener effects.

use std::rc::Rc;

use indexmap::IndexMap;

use super::EffectFn;
use crate::component::Component;
use crate::config::with_config;
use crate::dom::{Element, Event, ListenerOptions};
use crate::reactive::{batch, schedule, Cleanup, DedupeKey};
use crate::value::Value;

/// Property writes returned by an event handler, applied to the host in
/// one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Updates(IndexMap<String, Value>);

impl Updates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn apply(self, host: &Component) {
        batch(|| {
            for (name, value) in self.0 {
                if let Err(error) = host.set(&name, value) {
                    tracing::error!(component = host.name(), prop = %name, %error, "event update failed");
                }
            }
        });
    }
}

type Handler = dyn Fn(&Event, &Component, &Element) -> Option<Updates>;

/// Listen for `event_type` on the target.
///
/// The handler may return [`Updates`] for the host. Passive event types
/// (see [`Config::passive_events`](crate::config::Config::passive_events))
/// register a passive listener and run the handler on the next animation
/// frame; rapid events collapse into the last one.
pub fn on<H>(event_type: &str, handler: H) -> EffectFn
where
    H: Fn(&Event, &Component, &Element) -> Option<Updates> + 'static,
{
    let event_type = event_type.to_string();
    let handler: Rc<Handler> = Rc::new(handler);
    EffectFn::new(move |host, target| {
        let passive = with_config(|c| c.is_passive(&event_type));
        let (host, listening) = (host.clone(), target.clone());
        let handler = Rc::clone(&handler);
        let listener = if passive {
            let key = DedupeKey::unique();
            target.add_event_listener(
                &event_type,
                move |event| {
                    let (event, host, target) = (event.clone(), host.clone(), listening.clone());
                    let handler = Rc::clone(&handler);
                    schedule(
                        move || {
                            if let Some(updates) = handler(&event, &host, &target) {
                                updates.apply(&host);
                            }
                        },
                        Some(key.clone()),
                    );
                },
                ListenerOptions::passive(),
            )
        } else {
            target.add_event_listener(
                &event_type,
                move |event| {
                    if let Some(updates) = handler(event, &host, &listening) {
                        updates.apply(&host);
                    }
                },
                ListenerOptions::default(),
            )
        };
        let target = target.clone();
        Ok(Cleanup::new(move || {
            target.remove_event_listener(listener);
        }))
    })
}
