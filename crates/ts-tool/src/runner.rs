use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use ts_api::{create_engine, CreateEngineOptions};
use ts_core::{MessageKind, ThreadState};
use ts_runtime::{Engine, EngineEvent, EngineOptions, ManualClock, MemoryStore};

use crate::source::{read_test_case, read_twee_source_from_dir};
use crate::{ExpectedEvent, TestAction, TestCase, ToolError};

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub observed_events: Vec<ExpectedEvent>,
    pub consumed_actions: usize,
    pub final_threads: BTreeMap<String, ThreadState>,
}

fn observe(event: &EngineEvent) -> Option<ExpectedEvent> {
    match event {
        EngineEvent::MessageAdded { message } if message.kind != MessageKind::Typing => {
            Some(ExpectedEvent::Message {
                contact: message.contact.clone(),
                text: message.text.clone(),
                from_player: message.from_player,
            })
        }
        EngineEvent::ContactUnlocked { contact } => Some(ExpectedEvent::Unlocked {
            contact: contact.clone(),
        }),
        EngineEvent::ThreadStateChanged { contact, state } => Some(ExpectedEvent::Thread {
            contact: contact.clone(),
            state: *state,
        }),
        _ => None,
    }
}

/// Messages delivered while the engine was being built, before anyone could
/// subscribe.
fn opening_events(engine: &Engine) -> Vec<ExpectedEvent> {
    engine
        .unlocked_contacts()
        .into_iter()
        .flat_map(|contact| engine.contact_messages(contact).iter())
        .map(|message| ExpectedEvent::Message {
            contact: message.contact.clone(),
            text: message.text.clone(),
            from_player: message.from_player,
        })
        .collect()
}

pub fn run_case(scenario_dir: &Path, case: &TestCase) -> Result<RunReport, ToolError> {
    let source = read_twee_source_from_dir(scenario_dir)?;
    let created = create_engine(CreateEngineOptions {
        source,
        engine: EngineOptions {
            global_typing_delay_ms: case.typing_delay_ms,
            clock: Arc::new(ManualClock::new(0)),
            store: Arc::new(MemoryStore::new()),
            ..EngineOptions::default()
        },
    })?;
    for warning in &created.warnings {
        tracing::warn!(%warning, scenario = %scenario_dir.display(), "case script warning");
    }
    let mut engine = created.engine;

    let recorded = Rc::new(RefCell::new(opening_events(&engine)));
    let sink = Rc::clone(&recorded);
    engine.subscribe(move |event| {
        if let Some(observed) = observe(event) {
            sink.borrow_mut().push(observed);
        }
    });
    engine.flush();

    let mut consumed_actions = 0usize;
    for (action_index, action) in case.actions.iter().enumerate() {
        match action {
            TestAction::Choose { contact, index } => {
                if !engine.submit_choice(contact, *index) {
                    return Err(ToolError::ChoiceRejected {
                        action_index,
                        contact: contact.clone(),
                        index: *index,
                    });
                }
            }
            TestAction::SetVariable { name, value } => {
                engine.set_variable(name.clone(), value.clone());
            }
        }
        engine.flush();
        consumed_actions += 1;
    }

    let final_threads = engine.state().threads.clone();
    let observed_events = recorded.borrow().clone();
    Ok(RunReport {
        observed_events,
        consumed_actions,
        final_threads,
    })
}

pub fn assert_case(scenario_dir: &Path, case_path: &Path) -> Result<(), ToolError> {
    let case = read_test_case(case_path)?;
    let report = run_case(scenario_dir, &case)?;

    if report.observed_events.len() != case.expected_events.len() {
        let observed = serde_json::to_string_pretty(&report.observed_events)
            .map_err(ToolError::EventSerialize)?;
        return Err(ToolError::EventCountMismatch {
            expected: case.expected_events.len(),
            actual: report.observed_events.len(),
            observed,
        });
    }

    for (index, (expected, actual)) in case
        .expected_events
        .iter()
        .zip(report.observed_events.iter())
        .enumerate()
    {
        if expected != actual {
            let expected = serde_json::to_string(expected).map_err(ToolError::EventSerialize)?;
            let actual = serde_json::to_string(actual).map_err(ToolError::EventSerialize)?;
            return Err(ToolError::EventMismatch {
                index,
                expected,
                actual,
            });
        }
    }

    for (contact, expected) in &case.final_threads {
        let actual = report.final_threads.get(contact).copied();
        if actual != Some(*expected) {
            return Err(ToolError::FinalThreadMismatch {
                contact: contact.clone(),
                expected: expected.as_str().to_string(),
                actual: actual.map(ThreadState::as_str).unwrap_or("missing").to_string(),
            });
        }
    }

    Ok(())
}
