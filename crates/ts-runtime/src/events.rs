use ts_core::{Action, Message, ThreadState, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Also published for transient typing bubbles, which are never stored.
    MessageAdded { message: Message },
    ContactUnlocked { contact: String },
    ThreadStateChanged { contact: String, state: ThreadState },
    VariableChanged { name: String, value: Value },
    /// The full action, so hosts can act on its parameters. Unlock and end
    /// actions are reported when their notice is delivered.
    ActionExecuted { contact: String, action: Action },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&EngineEvent)>;

/// In-process publish/subscribe. Listeners run synchronously, in subscription
/// order, on the thread that drives the engine.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&EngineEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(candidate, _)| *candidate != id);
        self.listeners.len() != before
    }

    pub fn publish(&mut self, event: &EngineEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod events_tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new();

        let first_seen = Rc::clone(&seen);
        let first = bus.subscribe(move |event| {
            if let EngineEvent::ContactUnlocked { contact } = event {
                first_seen.borrow_mut().push(format!("first:{}", contact));
            }
        });
        let second_seen = Rc::clone(&seen);
        bus.subscribe(move |event| {
            if let EngineEvent::ContactUnlocked { contact } = event {
                second_seen.borrow_mut().push(format!("second:{}", contact));
            }
        });

        bus.publish(&EngineEvent::ContactUnlocked {
            contact: "Mara".to_string(),
        });
        assert!(bus.unsubscribe(first));
        assert!(!bus.unsubscribe(first));
        bus.publish(&EngineEvent::ContactUnlocked {
            contact: "Sam".to_string(),
        });

        assert_eq!(
            *seen.borrow(),
            vec!["first:Mara", "second:Mara", "second:Sam"]
        );
        assert_eq!(bus.listener_count(), 1);
    }
}
