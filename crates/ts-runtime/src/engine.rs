use std::sync::Arc;

use ts_core::{
    Action, ActionKind, Choice, Delivery, Diagnostic, GameData, GameState, LocationPin, Message,
    MessageKind, Notification, PendingDelivery, Round, RoundKey, ThreadScriptError, ThreadState,
    Value, Variables, DEFAULT_GLOBAL_TYPING_DELAY_MS, END_THREAD_NOTICE, TYPING_INDICATOR_MS,
};
use ts_parser::{evaluate_body, Evaluation};

use crate::clock::{Clock, SystemClock};
use crate::events::{EngineEvent, EventBus, SubscriptionId};
use crate::scheduler::{ScheduledTask, Scheduler};
use crate::store::{decode_state, encode_state, MemoryStore, StateStore};

mod actions;
mod choice;
mod delivery;
mod lifecycle;
mod queries;
mod variables;

pub use actions::ActionPlan;

/// Upper bound on tasks fired by one `flush`, so a script that keeps
/// scheduling work cannot spin forever.
const FLUSH_GUARD: usize = 10_000;

#[derive(Clone)]
pub struct EngineOptions {
    /// Starting typing delay; scripts may change it with `set_typing_delay`.
    pub global_typing_delay_ms: u64,
    pub typing_indicator_ms: u64,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn StateStore>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            global_typing_delay_ms: DEFAULT_GLOBAL_TYPING_DELAY_MS,
            typing_indicator_ms: TYPING_INDICATOR_MS,
            clock: Arc::new(SystemClock::new()),
            store: Arc::new(MemoryStore::new()),
        }
    }
}

/// How a round's text reaches the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pacing {
    /// Appended at once: opening messages and freshly unlocked contacts.
    Immediate,
    /// Behind the typing delay and indicator.
    Typed,
}

/// Runs one compiled program. Owns its state exclusively; all time comes from
/// the injected clock and all delayed work goes through the scheduler.
pub struct Engine {
    data: GameData,
    state: GameState,
    scheduler: Scheduler,
    events: EventBus,
    clock: Arc<dyn Clock>,
    store: Arc<dyn StateStore>,
    epoch: u64,
    default_typing_delay: u64,
    typing_indicator_ms: u64,
}

impl Engine {
    pub fn subscribe(&mut self, listener: impl FnMut(&EngineEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    fn publish(&mut self, event: EngineEvent) {
        self.events.publish(&event);
    }

    /// Saves the state together with whatever is still on the timeline, so
    /// an engine rebuilt from the store resumes mid-delay.
    fn persist(&mut self) {
        self.state.pending_deliveries = self
            .scheduler
            .iter()
            .map(|(fire_at, task)| PendingDelivery {
                contact: task.contact.clone(),
                fire_at,
                delivery: task.task.clone(),
            })
            .collect();
        let written = encode_state(&self.state).and_then(|document| self.store.write(&document));
        if let Err(error) = written {
            tracing::warn!(code = error.code.as_str(), message = error.message.as_str(), "failed to persist state");
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("contacts", &self.data.contact_order)
            .field("epoch", &self.epoch)
            .field("pending_tasks", &self.scheduler.len())
            .finish()
    }
}
