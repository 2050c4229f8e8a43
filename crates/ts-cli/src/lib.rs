use std::ffi::OsString;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use ts_api::compile_script;
use ts_core::ThreadScriptError;

mod agent;
mod boundary;
mod cli_args;
mod error_map;
mod models;
mod source_loader;
mod state_store;

pub(crate) use boundary::{collect_boundary, emit_boundary, message_baseline, MessageBaseline};
pub(crate) use cli_args::{
    AgentArgs, AgentCommand, ChooseArgs, Cli, CompileArgs, Mode, SetVarArgs, StartArgs,
};
pub(crate) use error_map::{emit_error, file_error, json_string, FileOp};
pub(crate) use models::{
    BoundaryResult, LoadedScript, PlayerState, Speaker, ThreadView, PLAYER_STATE_SCHEMA,
};
pub(crate) use source_loader::load_script_source;
#[cfg(test)]
pub(crate) use source_loader::{read_twee_files_from_dir, resolve_script_path};
pub(crate) use state_store::{load_player_state, save_player_state};

/// Log filter variable; defaults to `warn`. Logs go to stderr so stdout stays
/// line-oriented for agents.
pub const LOG_ENV: &str = "THREADSCRIPT_LOG";

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    init_logging();
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second init in the same process (tests) is not an error worth reporting.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli) -> Result<i32, ThreadScriptError> {
    match cli.command {
        Mode::Compile(args) => run_compile(args),
        Mode::Agent(args) => agent::run_agent(args),
    }
}

fn run_compile(args: CompileArgs) -> Result<i32, ThreadScriptError> {
    let loaded = load_script_source(&args.script)?;
    let output = compile_script(&loaded.source);
    let warnings = output.warnings.clone();
    let program = output.into_result()?;

    println!("RESULT:OK");
    for contact in program.contacts_in_order() {
        println!(
            "CONTACT:{}|{}|{}",
            contact.name,
            contact.rounds.len(),
            if contact.initially_unlocked {
                "unlocked"
            } else {
                "locked"
            }
        );
    }
    for warning in &warnings {
        let line = warning
            .line()
            .map(|line| line.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "WARNING:{}|{}|{}",
            warning.code,
            line,
            json_string(&warning.message)
        );
    }
    Ok(0)
}

#[cfg(test)]
mod tests;
