//! Synchronous fan-out of change events to subscribers on the UI thread.
//!
//! Events published while a dispatch is already running are queued and delivered
//! once the current event has reached every subscriber, so a subscriber that
//! publishes from inside its callback never re-enters the bus.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

type Listener<E> = Rc<dyn Fn(&E)>;

struct Table<E> {
    next_id: u64,
    entries: Vec<(u64, Listener<E>)>,
}

impl<E> Table<E> {
    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }
}

pub struct ChangeBus<E> {
    table: Rc<RefCell<Table<E>>>,
    pending: RefCell<VecDeque<E>>,
    dispatching: Cell<bool>,
}

/// Handle returned by `subscribe`. Dropping it detaches the callback.
#[must_use = "dropping a subscription immediately unsubscribes"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<E: 'static> ChangeBus<E> {
    pub fn new() -> Self {
        Self {
            table: Rc::new(RefCell::new(Table {
                next_id: 0,
                entries: Vec::new(),
            })),
            pending: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
        }
    }

    pub fn subscribe(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        let id = {
            let mut table = self.table.borrow_mut();
            let id = table.next_id;
            table.next_id += 1;
            table.entries.push((id, Rc::new(callback)));
            id
        };

        let table = Rc::downgrade(&self.table);
        Subscription {
            release: Some(Box::new(move || {
                if let Some(table) = table.upgrade() {
                    table.borrow_mut().entries.retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Delivers `event` to every subscriber in registration order.
    pub fn publish(&self, event: E) {
        self.pending.borrow_mut().push_back(event);
        if self.dispatching.replace(true) {
            return;
        }
        let _guard = DispatchGuard(&self.dispatching);

        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(event) = next else { break };

            let listeners: Vec<(u64, Listener<E>)> = self.table.borrow().entries.clone();
            for (id, listener) in listeners {
                // a callback earlier in this round may have released this one
                if self.table.borrow().contains(id) {
                    listener(&event);
                }
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.table.borrow().entries.len()
    }
}

impl<E: 'static> Default for ChangeBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_in_registration_order() {
        let bus = ChangeBus::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = {
            let seen = seen.clone();
            bus.subscribe(move |event| seen.borrow_mut().push(("first", *event)))
        };
        let second = {
            let seen = seen.clone();
            bus.subscribe(move |event| seen.borrow_mut().push(("second", *event)))
        };

        bus.publish(7);
        assert_eq!(*seen.borrow(), vec![("first", 7), ("second", 7)]);
        drop((first, second));
    }

    #[test]
    fn dropping_subscription_detaches_callback() {
        let bus = ChangeBus::<u32>::new();
        let hits = Rc::new(Cell::new(0));

        let subscription = {
            let hits = hits.clone();
            bus.subscribe(move |_| hits.set(hits.get() + 1))
        };
        bus.publish(1);
        drop(subscription);
        bus.publish(2);

        assert_eq!(hits.get(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn publish_from_callback_is_queued_not_reentered() {
        let bus = Rc::new(ChangeBus::<u32>::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let republisher = {
            let bus_ref = Rc::downgrade(&bus);
            let log = log.clone();
            bus.subscribe(move |event| {
                log.borrow_mut().push(format!("a{event}"));
                if *event == 1 {
                    if let Some(bus) = bus_ref.upgrade() {
                        bus.publish(2);
                    }
                }
            })
        };
        let observer = {
            let log = log.clone();
            bus.subscribe(move |event| log.borrow_mut().push(format!("b{event}")))
        };

        bus.publish(1);
        assert_eq!(*log.borrow(), vec!["a1", "b1", "a2", "b2"]);
        drop((republisher, observer));
    }
}
