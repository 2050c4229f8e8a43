use std::path::Path;
use std::sync::Arc;

use ts_api::{create_engine, resume_engine, CreateEngineOptions, ResumeEngineOptions};
use ts_core::{ThreadScriptError, Value, DEFAULT_GLOBAL_TYPING_DELAY_MS};
use ts_runtime::{Engine, EngineOptions, MemoryStore};

use crate::{
    collect_boundary, emit_boundary, load_player_state, load_script_source, message_baseline,
    save_player_state, AgentArgs, AgentCommand, ChooseArgs, MessageBaseline, PlayerState,
    SetVarArgs, StartArgs, PLAYER_STATE_SCHEMA,
};

pub(super) fn run_agent(args: AgentArgs) -> Result<i32, ThreadScriptError> {
    match args.command {
        AgentCommand::Start(args) => run_start(args),
        AgentCommand::Choose(args) => run_choose(args),
        AgentCommand::SetVar(args) => run_set_var(args),
    }
}

fn agent_engine_options(typing_delay: Option<u64>) -> EngineOptions {
    EngineOptions {
        global_typing_delay_ms: typing_delay.unwrap_or(DEFAULT_GLOBAL_TYPING_DELAY_MS),
        store: Arc::new(MemoryStore::new()),
        ..EngineOptions::default()
    }
}

pub(super) fn run_start(args: StartArgs) -> Result<i32, ThreadScriptError> {
    let loaded = load_script_source(&args.script)?;
    let created = create_engine(CreateEngineOptions {
        source: loaded.source,
        engine: agent_engine_options(args.typing_delay),
    })?;
    for warning in &created.warnings {
        tracing::warn!(%warning, "script compiled with warning");
    }

    let mut engine = created.engine;
    engine.flush();
    finish(&engine, &MessageBaseline::new(), &loaded.id, &args.state_out)
}

pub(super) fn run_choose(args: ChooseArgs) -> Result<i32, ThreadScriptError> {
    run_state_transition(&args.state_in, &args.state_out, |engine| {
        if engine.submit_choice(&args.contact, args.choice) {
            return Ok(());
        }
        Err(ThreadScriptError::new(
            "CLI_CHOICE_REJECTED",
            format!(
                "Choice {} is not available for contact \"{}\".",
                args.choice, args.contact
            ),
        ))
    })
}

pub(super) fn run_set_var(args: SetVarArgs) -> Result<i32, ThreadScriptError> {
    run_state_transition(&args.state_in, &args.state_out, |engine| {
        engine.set_variable(args.name.clone(), Value::parse_literal(&args.value));
        Ok(())
    })
}

fn run_state_transition(
    state_in: &str,
    state_out: &str,
    transition: impl FnOnce(&mut Engine) -> Result<(), ThreadScriptError>,
) -> Result<i32, ThreadScriptError> {
    let saved = load_player_state(Path::new(state_in))?;
    let loaded = load_script_source(&saved.script)?;
    let baseline = message_baseline(&saved.state);

    let mut engine = resume_engine(ResumeEngineOptions {
        source: loaded.source,
        state: saved.state,
        engine: agent_engine_options(None),
    })?
    .engine;
    engine.flush();
    transition(&mut engine)?;
    engine.flush();
    finish(&engine, &baseline, &saved.script, state_out)
}

fn finish(
    engine: &Engine,
    baseline: &MessageBaseline,
    script: &str,
    state_out: &str,
) -> Result<i32, ThreadScriptError> {
    save_player_state(
        Path::new(state_out),
        &PlayerState {
            schema_version: PLAYER_STATE_SCHEMA.to_string(),
            script: script.to_string(),
            state: engine.state().clone(),
        },
    )?;
    emit_boundary(collect_boundary(engine, baseline), state_out);
    Ok(0)
}
