//! Fan-out of operation events to callback subscribers.

use std::{
    cell::{Cell, RefCell},
    panic::{AssertUnwindSafe, catch_unwind},
    rc::{Rc, Weak},
};

use crate::operation::Operation;

use super::events::OperationEvent;

/// A subscriber callback.
pub type Listener = Rc<dyn Fn(&OperationEvent)>;

/// Ordered listener set.
///
/// Delivery is synchronous and follows subscription order. A panicking
/// listener is logged and skipped; later listeners still receive the event.
#[derive(Default)]
pub struct SubscriberHub {
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_id: Cell<u64>,
}

impl SubscriberHub {
    /// An empty hub.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Registers for live events only.
    pub fn subscribe(self: &Rc<Self>, listener: impl Fn(&OperationEvent) + 'static) -> Subscription {
        self.register(Rc::new(listener))
    }

    /// Replays `existing` as [`OperationEvent::Created`] to the new listener
    /// before registering it for live events.
    pub fn subscribe_with_replay(
        self: &Rc<Self>,
        existing: Vec<Operation>,
        listener: impl Fn(&OperationEvent) + 'static,
    ) -> Subscription {
        let listener: Listener = Rc::new(listener);
        let id = self.next_id.get();
        for op in existing {
            deliver(id, &listener, &OperationEvent::Created(op));
        }
        self.register(listener)
    }

    /// Delivers `event` to every current listener.
    pub fn notify(&self, event: &OperationEvent) {
        let listeners: Vec<(u64, Listener)> = self
            .listeners
            .borrow()
            .iter()
            .map(|(id, l)| (*id, Rc::clone(l)))
            .collect();
        for (id, listener) in listeners {
            deliver(id, &listener, event);
        }
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// True with no listeners.
    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    fn register(self: &Rc<Self>, listener: Listener) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, listener));
        Subscription {
            hub: Rc::downgrade(self),
            id,
            active: Cell::new(true),
        }
    }

    fn remove(&self, id: u64) {
        self.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
    }
}

fn deliver(id: u64, listener: &Listener, event: &OperationEvent) {
    if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
        tracing::error!(
            subscriber = id,
            operation_id = ?event.operation_id(),
            "subscriber panicked; continuing delivery"
        );
    }
}

/// Handle returned by [`SubscriberHub::subscribe`].
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    hub: Weak<SubscriberHub>,
    id: u64,
    active: Cell<bool>,
}

impl Subscription {
    /// Stops delivery. Safe to call repeatedly.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }

    /// False after unsubscribing or once the hub is gone.
    pub fn is_active(&self) -> bool {
        self.active.get() && self.hub.strong_count() > 0
    }
}
