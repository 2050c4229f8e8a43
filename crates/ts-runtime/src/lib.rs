mod clock;
mod engine;
mod events;
mod scheduler;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{ActionPlan, Engine, EngineOptions};
pub use events::{EngineEvent, EventBus, SubscriptionId};
pub use scheduler::{ScheduledTask, Scheduler};
pub use store::{
    decode_state, encode_state, FileStore, MemoryStore, PersistedState, StateStore,
    STATE_SCHEMA_V1,
};
