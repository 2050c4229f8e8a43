use std::fs;
use std::path::Path;

use ts_compiler::{compile, CompileOutput};
use ts_core::{Diagnostic, GameState, ThreadScriptError};
use ts_runtime::{encode_state, Engine, EngineOptions};

#[derive(Clone)]
pub struct CreateEngineOptions {
    pub source: String,
    pub engine: EngineOptions,
}

#[derive(Clone)]
pub struct ResumeEngineOptions {
    pub source: String,
    pub state: GameState,
    pub engine: EngineOptions,
}

/// A running engine plus the warnings its script compiled with.
#[derive(Debug)]
pub struct LoadedEngine {
    pub engine: Engine,
    pub warnings: Vec<Diagnostic>,
}

pub fn compile_script(source: &str) -> CompileOutput {
    compile(source)
}

pub fn compile_script_file(path: &Path) -> Result<CompileOutput, ThreadScriptError> {
    let source = fs::read_to_string(path).map_err(|error| {
        ThreadScriptError::new(
            "API_SOURCE_READ",
            format!("Cannot read \"{}\": {}", path.display(), error),
        )
    })?;
    Ok(compile(&source))
}

/// Compiles `source` and starts an engine on it. Structural compile errors
/// are a hard failure; the store in `options.engine` decides whether the
/// engine resumes or starts fresh.
pub fn create_engine(options: CreateEngineOptions) -> Result<LoadedEngine, ThreadScriptError> {
    let output = compile(&options.source);
    let warnings = output.warnings.clone();
    let program = output.into_result()?;
    if program.is_empty() {
        tracing::warn!("script has no contacts");
    }
    Ok(LoadedEngine {
        engine: Engine::new(program, options.engine),
        warnings,
    })
}

/// Starts an engine from an explicit saved state, overwriting whatever the
/// configured store held.
pub fn resume_engine(options: ResumeEngineOptions) -> Result<LoadedEngine, ThreadScriptError> {
    let document = encode_state(&options.state)?;
    options.engine.store.write(&document)?;
    create_engine(CreateEngineOptions {
        source: options.source,
        engine: options.engine,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use ts_core::ThreadState;
    use ts_runtime::{ManualClock, MemoryStore};

    const SCRIPT: &str = r#":: Eli-Round-1 [initial_contact]
Hey, you up?
[[Yeah|Eli-Round-2]]

:: Eli-Round-2 [chat]
Good.
"#;

    fn options() -> EngineOptions {
        EngineOptions {
            global_typing_delay_ms: 0,
            clock: Arc::new(ManualClock::new(0)),
            store: Arc::new(MemoryStore::new()),
            ..EngineOptions::default()
        }
    }

    #[test]
    fn compile_script_reports_program() {
        let output = compile_script(SCRIPT);
        assert!(output.is_ok());
        assert_eq!(output.program.contact_order, vec!["Eli"]);
    }

    #[test]
    fn compile_script_file_maps_missing_file() {
        let error = compile_script_file(Path::new("/definitely/not/here.twee"))
            .expect_err("missing file should fail");
        assert_eq!(error.code, "API_SOURCE_READ");
    }

    #[test]
    fn create_engine_sends_opening_message() {
        let loaded = create_engine(CreateEngineOptions {
            source: SCRIPT.to_string(),
            engine: options(),
        })
        .expect("engine should build");
        assert!(loaded.warnings.is_empty());
        let messages = loaded.engine.contact_messages("Eli");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "Hey, you up?");
    }

    #[test]
    fn create_engine_rejects_structural_errors() {
        let error = create_engine(CreateEngineOptions {
            source: ":: Eli-Round-1 [chat]\na\n:: Eli-Round-1 [chat]\nb\n".to_string(),
            engine: options(),
        })
        .expect_err("duplicate round should fail");
        assert_eq!(error.code, "ROUND_KEY_DUPLICATE");
    }

    #[test]
    fn resume_engine_continues_from_saved_state() {
        let mut first = create_engine(CreateEngineOptions {
            source: SCRIPT.to_string(),
            engine: options(),
        })
        .expect("engine should build")
        .engine;
        assert!(first.submit_choice("Eli", 0));
        let saved = first.state().clone();

        let resumed = resume_engine(ResumeEngineOptions {
            source: SCRIPT.to_string(),
            state: saved.clone(),
            engine: options(),
        })
        .expect("resume should succeed")
        .engine;
        assert_eq!(resumed.state(), &saved);
        assert_eq!(resumed.contact_messages("Eli").len(), 3);
        assert_eq!(resumed.contact_state("Eli"), Some(ThreadState::Active));
    }
}
