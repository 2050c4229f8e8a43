use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_core::{ThreadState, Value};

pub const TESTCASE_SCHEMA_V1: &str = "threadscript-case.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub schema_version: String,
    /// Starting typing delay. Cases default to zero; delivery order does not
    /// depend on it because the runner drains the whole queue after each step.
    #[serde(default)]
    pub typing_delay_ms: u64,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub expected_events: Vec<ExpectedEvent>,
    #[serde(default)]
    pub final_threads: BTreeMap<String, ThreadState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TestAction {
    Choose { contact: String, index: usize },
    SetVariable { name: String, value: Value },
}

impl TestAction {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Choose { .. } => "choose",
            Self::SetVariable { .. } => "setVariable",
        }
    }
}

/// What a case observes: delivered messages, unlocks and thread state
/// transitions, in publication order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExpectedEvent {
    Message {
        contact: String,
        text: String,
        #[serde(default, rename = "fromPlayer")]
        from_player: bool,
    },
    Unlocked {
        contact: String,
    },
    Thread {
        contact: String,
        state: ThreadState,
    },
}
