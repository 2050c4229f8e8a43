use std::collections::BTreeMap;

use ts_core::{GameState, ThreadState};
use ts_runtime::Engine;

use crate::{json_string, BoundaryResult, Speaker, ThreadView};

/// Message count per contact, taken before a command runs.
pub(crate) type MessageBaseline = BTreeMap<String, usize>;

pub(crate) fn message_baseline(state: &GameState) -> MessageBaseline {
    state
        .messages
        .iter()
        .map(|(contact, messages)| (contact.clone(), messages.len()))
        .collect()
}

pub(crate) fn collect_boundary(engine: &Engine, baseline: &MessageBaseline) -> BoundaryResult {
    let mut messages = Vec::new();
    for contact in &engine.game_data().contact_order {
        let seen = baseline.get(contact).copied().unwrap_or(0);
        messages.extend(engine.contact_messages(contact).iter().skip(seen).cloned());
    }
    messages.sort_by_key(|message| message.timestamp);

    let threads = engine
        .unlocked_contacts()
        .into_iter()
        .map(|contact| ThreadView {
            contact: contact.to_string(),
            state: engine
                .contact_state(contact)
                .unwrap_or(ThreadState::Locked),
            choices: engine
                .current_choices(contact)
                .into_iter()
                .map(|choice| choice.text)
                .collect(),
        })
        .collect();

    BoundaryResult { messages, threads }
}

pub(crate) fn emit_boundary(boundary: BoundaryResult, state_out: &str) {
    println!("RESULT:OK");
    for message in &boundary.messages {
        println!(
            "MESSAGE:{}|{}|{}",
            message.contact,
            Speaker::of(message).as_str(),
            json_string(&message.text)
        );
    }
    for thread in &boundary.threads {
        println!("THREAD:{}|{}", thread.contact, thread.state.as_str());
        for (index, text) in thread.choices.iter().enumerate() {
            println!("CHOICE:{}|{}|{}", thread.contact, index, json_string(text));
        }
    }
    println!("STATE_OUT:{}", state_out);
}
