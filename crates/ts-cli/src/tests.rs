use super::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ts_core::{GameState, ThreadState, Value};

const SCRIPT: &str = r#":: Eli-Round-1 [initial_contact]
Hey, you up?
[[Yeah|Eli-Round-2]]
[[No|Eli-Round-3]]

:: Eli-Round-2 [chat]
Good. Talk to Mara.
[Action: unlock_contact: Mara]
[Action: end_thread]

:: Eli-Round-3 [chat]
Fine.
[Action: end_thread]

:: Mara-Round-1 [chat]
Eli sent you?

:: Mara-Round-2.0 [chat]
(if: $trust is true)
Then I trust you too.
(endif)
"#;

fn temp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be monotonic")
        .as_nanos();
    std::env::temp_dir().join(format!("threadscript-cli-{}-{}", name, nanos))
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn script_file(name: &str) -> PathBuf {
    let path = temp_path(name).join("story.twee");
    write_file(&path, SCRIPT);
    path
}

fn cli(args: &[&str]) -> i32 {
    let mut full = vec!["ts-cli"];
    full.extend_from_slice(args);
    run_cli_from_args(full)
}

#[test]
fn resolve_script_path_reports_missing_path() {
    let missing = temp_path("missing");
    let error = resolve_script_path(missing.to_string_lossy().as_ref())
        .expect_err("missing path should fail");
    assert_eq!(error.code, "CLI_SOURCE_NOT_FOUND");
}

#[test]
fn read_twee_files_from_dir_sorts_and_filters() {
    let root = temp_path("twee-dir");
    write_file(&root.join("b.twee"), ":: B-Round-1 [chat]\nB\n");
    write_file(&root.join("a/first.twee"), ":: A-Round-1 [chat]\nA\n");
    write_file(&root.join("notes.txt"), "ignored");

    let files = read_twee_files_from_dir(&root).expect("scan should pass");
    let names = files.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["a/first.twee", "b.twee"]);
}

#[test]
fn read_twee_files_from_dir_fails_without_scripts() {
    let root = temp_path("twee-empty");
    write_file(&root.join("notes.txt"), "ignored");
    let error = read_twee_files_from_dir(&root).expect_err("empty dir should fail");
    assert_eq!(error.code, "CLI_SOURCE_EMPTY");
}

#[test]
fn load_script_source_joins_directory_files() {
    let root = temp_path("twee-join");
    write_file(&root.join("1-eli.twee"), ":: Eli-Round-1 [initial_contact]\nHi\n");
    write_file(&root.join("2-mara.twee"), ":: Mara-Round-1 [chat]\nHey\n");

    let loaded = load_script_source(root.to_string_lossy().as_ref()).expect("load should pass");
    let program = compile_script(&loaded.source)
        .into_result()
        .expect("joined source should compile");
    assert_eq!(program.contact_order, vec!["Eli", "Mara"]);
}

#[test]
fn player_state_round_trips_and_checks_schema() {
    let path = temp_path("player-state").join("state.json");
    let state = PlayerState {
        schema_version: PLAYER_STATE_SCHEMA.to_string(),
        script: "/tmp/story.twee".to_string(),
        state: GameState::initial(&compile_script(SCRIPT).program, 2000),
    };
    save_player_state(&path, &state).expect("save should pass");
    let loaded = load_player_state(&path).expect("load should pass");
    assert_eq!(loaded, state);

    let old = PlayerState {
        schema_version: "threadscript-player.v0".to_string(),
        ..state.clone()
    };
    save_player_state(&path, &old).expect("save should pass");
    let schema_error = load_player_state(&path).expect_err("old schema should fail");
    assert_eq!(schema_error.code, "CLI_STATE_SCHEMA");

    write_file(&path, "{");
    let invalid = load_player_state(&path).expect_err("bad json should fail");
    assert_eq!(invalid.code, "CLI_STATE_INVALID");

    let missing = load_player_state(&temp_path("no-state")).expect_err("missing should fail");
    assert_eq!(missing.code, "CLI_STATE_NOT_FOUND");
}

#[test]
fn load_player_state_checks_schema_before_layout() {
    let path = temp_path("foreign-state").join("state.json");
    write_file(
        &path,
        r#"{"schemaVersion":"threadscript-player.v0","threads":["legacy"]}"#,
    );
    let error = load_player_state(&path).expect_err("foreign schema should fail");
    assert_eq!(error.code, "CLI_STATE_SCHEMA");
    assert!(error.message.contains("threadscript-player.v0"));

    write_file(&path, r#"{"threads":[]}"#);
    let untagged = load_player_state(&path).expect_err("missing schema should fail");
    assert_eq!(untagged.code, "CLI_STATE_SCHEMA");
}

#[test]
fn save_player_state_leaves_no_staging_file() {
    let path = temp_path("staged").join("nested/state.json");
    let state = PlayerState {
        schema_version: PLAYER_STATE_SCHEMA.to_string(),
        script: "/tmp/story.twee".to_string(),
        state: GameState::initial(&compile_script(SCRIPT).program, 0),
    };
    save_player_state(&path, &state).expect("save should pass");
    assert!(path.exists());
    assert!(!path.with_file_name("state.json.tmp").exists());
    save_player_state(&path, &state).expect("overwrite should pass");
    assert_eq!(load_player_state(&path).expect("load should pass"), state);
}

#[test]
fn speaker_labels_system_notices() {
    let mut message = ts_core::Message {
        id: "Eli-1".to_string(),
        contact: "Eli".to_string(),
        text: "x".to_string(),
        timestamp: 0,
        from_player: false,
        kind: ts_core::MessageKind::Text,
        media: None,
        location: None,
        read: false,
    };
    assert_eq!(Speaker::of(&message), Speaker::Contact);
    message.kind = ts_core::MessageKind::EndThread;
    assert_eq!(Speaker::of(&message), Speaker::System);
    message.from_player = true;
    assert_eq!(Speaker::of(&message).as_str(), "player");
}

#[test]
fn compile_command_succeeds_and_fails_on_structural_errors() {
    let script = script_file("compile-ok");
    assert_eq!(cli(&["compile", "--script", &path_arg(&script)]), 0);

    let broken = temp_path("compile-bad").join("story.twee");
    write_file(&broken, ":: A-Round-1 [chat]\na\n:: A-Round-1 [chat]\nb\n");
    assert_eq!(cli(&["compile", "--script", &path_arg(&broken)]), 1);
}

#[test]
fn agent_start_then_choose_advances_saved_state() {
    let script = script_file("agent");
    let root = temp_path("agent-states");
    let start_out = root.join("start.json");
    let choose_out = root.join("choose.json");

    let code = cli(&[
        "agent",
        "start",
        "--script",
        &path_arg(&script),
        "--state-out",
        &path_arg(&start_out),
    ]);
    assert_eq!(code, 0);
    let started = load_player_state(&start_out).expect("start state should load");
    assert_eq!(started.state.messages["Eli"].len(), 1);
    assert_eq!(started.state.thread_state("Mara"), Some(ThreadState::Locked));

    let code = cli(&[
        "agent",
        "choose",
        "--state-in",
        &path_arg(&start_out),
        "--contact",
        "Eli",
        "--choice",
        "0",
        "--state-out",
        &path_arg(&choose_out),
    ]);
    assert_eq!(code, 0);
    let chosen = load_player_state(&choose_out).expect("choose state should load");
    assert_eq!(chosen.state.thread_state("Eli"), Some(ThreadState::Ended));
    assert_eq!(chosen.state.thread_state("Mara"), Some(ThreadState::Active));
    let mara = chosen.state.messages["Mara"]
        .iter()
        .map(|message| message.text.as_str())
        .collect::<Vec<_>>();
    assert_eq!(mara, vec!["Eli sent you?"]);
}

#[test]
fn agent_choose_rejects_unavailable_choice() {
    let script = script_file("agent-reject");
    let root = temp_path("agent-reject-states");
    let start_out = root.join("start.json");
    assert_eq!(
        cli(&[
            "agent",
            "start",
            "--script",
            &path_arg(&script),
            "--state-out",
            &path_arg(&start_out),
        ]),
        0
    );

    let code = cli(&[
        "agent",
        "choose",
        "--state-in",
        &path_arg(&start_out),
        "--contact",
        "Eli",
        "--choice",
        "9",
        "--state-out",
        &path_arg(&root.join("never.json")),
    ]);
    assert_eq!(code, 1);
    assert!(!root.join("never.json").exists());
}

#[test]
fn agent_set_var_reopens_conditional_thread() {
    let script = script_file("agent-set-var");
    let root = temp_path("agent-set-var-states");
    let start_out = root.join("start.json");
    let set_out = root.join("set.json");
    assert_eq!(
        cli(&[
            "agent",
            "start",
            "--script",
            &path_arg(&script),
            "--state-out",
            &path_arg(&start_out),
        ]),
        0
    );

    let code = cli(&[
        "agent",
        "set-var",
        "--state-in",
        &path_arg(&start_out),
        "--name",
        "trust",
        "--value",
        "true",
        "--state-out",
        &path_arg(&set_out),
    ]);
    assert_eq!(code, 0);
    let updated = load_player_state(&set_out).expect("state should load");
    assert_eq!(updated.state.variables.get("trust"), Some(&Value::Bool(true)));
    assert_eq!(updated.state.thread_state("Mara"), Some(ThreadState::Active));
    let last = updated.state.messages["Mara"]
        .last()
        .expect("Mara should have a message");
    assert_eq!(last.text, "Then I trust you too.");
}

#[test]
fn collect_boundary_reports_new_messages_and_choices() {
    let created = ts_api::create_engine(ts_api::CreateEngineOptions {
        source: SCRIPT.to_string(),
        engine: ts_runtime::EngineOptions {
            global_typing_delay_ms: 0,
            store: std::sync::Arc::new(ts_runtime::MemoryStore::new()),
            ..ts_runtime::EngineOptions::default()
        },
    })
    .expect("engine should build");
    let mut engine = created.engine;

    let fresh = collect_boundary(&engine, &MessageBaseline::new());
    assert_eq!(fresh.messages.len(), 1);
    assert_eq!(fresh.threads.len(), 1);
    assert_eq!(fresh.threads[0].choices, vec!["Yeah", "No"]);

    let baseline = message_baseline(engine.state());
    assert!(engine.submit_choice("Eli", 1));
    engine.flush();
    let after = collect_boundary(&engine, &baseline);
    let texts = after
        .messages
        .iter()
        .map(|message| message.text.as_str())
        .collect::<Vec<_>>();
    assert_eq!(texts, vec!["No", "Fine.", "The Conversation Has Ended"]);
    assert_eq!(after.threads[0].state, ThreadState::Ended);
    assert!(after.threads[0].choices.is_empty());
}

#[test]
fn invalid_arguments_return_clap_exit_code() {
    assert_ne!(cli(&["agent", "choose"]), 0);
}
