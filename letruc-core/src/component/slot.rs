//! Signal Slots
//!
//! Each component property reads and writes through a slot: a cell holding
//! the signal currently backing the property. `pass` swaps the backing
//! signal of a descendant's slot and later restores the original. Readers
//! also depend on the slot's version, so a swap re-runs them against the new
//! signal.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::graph::NodeId;
use crate::reactive::{untrack, AnySignal, Signal, State};
use crate::value::Value;

pub struct SignalSlot {
    name: String,
    original: AnySignal<Value>,
    current: RefCell<AnySignal<Value>>,
    version: State<u64>,
}

impl SignalSlot {
    pub fn new(name: &str, signal: AnySignal<Value>) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            current: RefCell::new(Rc::clone(&signal)),
            original: signal,
            version: State::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The signal currently backing the slot.
    pub fn current(&self) -> AnySignal<Value> {
        Rc::clone(&self.current.borrow())
    }

    pub fn original(&self) -> AnySignal<Value> {
        Rc::clone(&self.original)
    }

    pub fn is_passed(&self) -> bool {
        !Rc::ptr_eq(&self.current.borrow(), &self.original)
    }

    pub fn get(&self) -> Result<Value> {
        self.version.get();
        self.current().try_get()
    }

    pub fn get_untracked(&self) -> Result<Value> {
        untrack(|| self.current().try_get())
    }

    pub fn set(&self, value: Value) -> Result<()> {
        self.current().try_set(value)
    }

    pub fn is_writable(&self) -> bool {
        self.current.borrow().is_writable()
    }

    /// Back the slot with `signal` until [`restore`](Self::restore).
    pub fn replace(&self, signal: AnySignal<Value>) {
        *self.current.borrow_mut() = signal;
        self.version.update(|v| v + 1);
    }

    pub fn restore(&self) {
        if self.is_passed() {
            self.replace(Rc::clone(&self.original));
        }
    }
}

impl Signal<Value> for Rc<SignalSlot> {
    fn id(&self) -> NodeId {
        self.version.id()
    }

    fn try_get(&self) -> Result<Value> {
        self.get()
    }

    fn try_set(&self, value: Value) -> Result<()> {
        self.set(value)
    }

    fn is_writable(&self) -> bool {
        SignalSlot::is_writable(self)
    }
}

impl fmt::Debug for SignalSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSlot")
            .field("name", &self.name)
            .field("passed", &self.is_passed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Memo};
    use std::cell::RefCell as Log;

    #[test]
    fn replace_and_restore_switch_the_backing_signal() {
        let own = State::new(Value::Int(1));
        let slot = SignalSlot::new("count", Rc::new(own.clone()));
        let parent = State::new(Value::Int(10));

        let seen = Rc::new(Log::new(Vec::new()));
        let effect = Effect::new({
            let (slot, seen) = (Rc::clone(&slot), Rc::clone(&seen));
            move || seen.borrow_mut().push(slot.get().unwrap_or_default())
        });

        slot.replace(Rc::new(parent.clone()));
        assert!(slot.is_passed());
        slot.set(Value::Int(11)).unwrap();
        assert_eq!(parent.get(), Value::Int(11));
        assert_eq!(own.get(), Value::Int(1));

        slot.restore();
        assert!(!slot.is_passed());
        assert_eq!(
            *seen.borrow(),
            vec![Value::Int(1), Value::Int(10), Value::Int(11), Value::Int(1)]
        );
        effect.dispose();
    }

    #[test]
    fn readonly_signals_reject_writes() {
        let memo = Memo::new(|| Value::from("fixed"));
        let slot = SignalSlot::new("label", Rc::new(memo));
        assert!(!slot.is_writable());
        assert!(slot.set(Value::from("x")).is_err());
    }
}
