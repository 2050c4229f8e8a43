use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::action::{Action, LocationPin};
use crate::program::{GameData, RoundKey};
use crate::value::Variables;

pub const DEFAULT_GLOBAL_TYPING_DELAY_MS: u64 = 2000;
/// How long a typing bubble stays up before the reply it announces.
pub const TYPING_INDICATOR_MS: u64 = 400;
pub const END_THREAD_NOTICE: &str = "The Conversation Has Ended";

pub fn unlock_notice(contact: &str) -> String {
    format!("{} has been unlocked", contact)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    Active,
    Locked,
    Ended,
}

impl ThreadState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Locked => "locked",
            Self::Ended => "ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Photo,
    Video,
    Location,
    Typing,
    UnlockContact,
    EndThread,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub contact: String,
    pub text: String,
    pub timestamp: u64,
    pub from_player: bool,
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationPin>,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub contact: String,
    pub title: Option<String>,
    pub text: String,
    pub timestamp: u64,
}

/// One piece of timeline work for a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delivery {
    /// Transient typing bubble ahead of a reply.
    Typing,
    Reply { text: String },
    /// A delayed or message-producing action.
    Payload { action: Action },
    /// Pending unlock notices, then the pending end notice.
    Notices,
}

/// A delivery that was scheduled but had not fired when the state was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDelivery {
    pub contact: String,
    pub fire_at: u64,
    pub delivery: Delivery,
}

/// Everything the engine mutates. Owned by exactly one engine and rebuilt from
/// `GameData` (plus an optional persisted copy) at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub current_rounds: BTreeMap<String, RoundKey>,
    pub threads: BTreeMap<String, ThreadState>,
    pub messages: BTreeMap<String, Vec<Message>>,
    pub unlocked_contacts: BTreeSet<String>,
    pub viewed_contacts: BTreeSet<String>,
    pub global_typing_delay: u64,
    #[serde(default)]
    pub pending_unlocks: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub pending_end: BTreeSet<String>,
    /// Outstanding timeline work in firing order, rewritten on every save.
    #[serde(default)]
    pub pending_deliveries: Vec<PendingDelivery>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    pub variables: Variables,
    #[serde(default)]
    pub contact_status: BTreeMap<String, String>,
    #[serde(default)]
    pub next_message_id: u64,
}

impl GameState {
    pub fn initial(data: &GameData, global_typing_delay: u64) -> Self {
        let mut state = Self {
            current_rounds: BTreeMap::new(),
            threads: BTreeMap::new(),
            messages: BTreeMap::new(),
            unlocked_contacts: BTreeSet::new(),
            viewed_contacts: BTreeSet::new(),
            global_typing_delay,
            pending_unlocks: BTreeMap::new(),
            pending_end: BTreeSet::new(),
            pending_deliveries: Vec::new(),
            notifications: Vec::new(),
            variables: data.initial_variables.clone(),
            contact_status: BTreeMap::new(),
            next_message_id: 1,
        };

        for contact in data.contacts_in_order() {
            state.messages.insert(contact.name.clone(), Vec::new());
            if contact.initially_unlocked {
                state.threads.insert(contact.name.clone(), ThreadState::Active);
                state.unlocked_contacts.insert(contact.name.clone());
                if let Some(first) = contact.first_round_key() {
                    state.current_rounds.insert(contact.name.clone(), first);
                }
            } else {
                state.threads.insert(contact.name.clone(), ThreadState::Locked);
            }
        }

        state
    }

    pub fn thread_state(&self, contact: &str) -> Option<ThreadState> {
        self.threads.get(contact).copied()
    }

    pub fn allocate_message_id(&mut self, contact: &str) -> String {
        let id = format!("{}-{}", contact, self.next_message_id);
        self.next_message_id += 1;
        id
    }
}

#[cfg(test)]
mod state_tests {
    use super::*;
    use crate::program::Contact;
    use crate::value::Value;

    fn two_contact_data() -> GameData {
        let mut eli = Contact::new("Eli");
        eli.initially_unlocked = true;
        let mut data = GameData::default();
        data.contacts.insert("Eli".to_string(), eli);
        data.contacts
            .insert("Mara".to_string(), Contact::new("Mara"));
        data.contact_order = vec!["Eli".to_string(), "Mara".to_string()];
        data.initial_variables
            .insert("met".to_string(), Value::Bool(false));
        data
    }

    #[test]
    fn initial_state_unlocks_only_initial_contacts() {
        let state = GameState::initial(&two_contact_data(), DEFAULT_GLOBAL_TYPING_DELAY_MS);
        assert_eq!(state.thread_state("Eli"), Some(ThreadState::Active));
        assert_eq!(state.thread_state("Mara"), Some(ThreadState::Locked));
        assert!(state.unlocked_contacts.contains("Eli"));
        assert!(!state.unlocked_contacts.contains("Mara"));
        assert_eq!(state.variables.get("met"), Some(&Value::Bool(false)));
        assert_eq!(state.global_typing_delay, 2000);
    }

    #[test]
    fn sets_persist_as_json_arrays() {
        let state = GameState::initial(&two_contact_data(), 0);
        let json = serde_json::to_value(&state).expect("state should serialize");
        assert_eq!(json["unlockedContacts"], serde_json::json!(["Eli"]));
        assert_eq!(json["viewedContacts"], serde_json::json!([]));
    }

    #[test]
    fn pending_deliveries_round_trip_and_default_to_empty() {
        let mut state = GameState::initial(&two_contact_data(), 0);
        state.pending_deliveries.push(PendingDelivery {
            contact: "Eli".to_string(),
            fire_at: 2_400,
            delivery: Delivery::Reply {
                text: "Bye".to_string(),
            },
        });
        let mut json = serde_json::to_value(&state).expect("state should serialize");
        assert_eq!(json["pendingDeliveries"][0]["delivery"]["type"], "reply");
        let back: GameState = serde_json::from_value(json.clone()).expect("state should parse");
        assert_eq!(back, state);

        json.as_object_mut()
            .expect("state should be an object")
            .remove("pendingDeliveries");
        let older: GameState = serde_json::from_value(json).expect("older state should parse");
        assert!(older.pending_deliveries.is_empty());
    }

    #[test]
    fn message_ids_are_sequential() {
        let mut state = GameState::initial(&two_contact_data(), 0);
        assert_eq!(state.allocate_message_id("Eli"), "Eli-1");
        assert_eq!(state.allocate_message_id("Mara"), "Mara-2");
    }
}
