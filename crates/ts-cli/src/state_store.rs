use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ts_core::ThreadScriptError;

use crate::{file_error, FileOp, PlayerState, PLAYER_STATE_SCHEMA};

/// Writes the state beside its target and renames it into place, so an agent
/// never picks up a half-written file between steps.
pub(crate) fn save_player_state(path: &Path, state: &PlayerState) -> Result<(), ThreadScriptError> {
    let payload = serde_json::to_string_pretty(state).map_err(|error| {
        ThreadScriptError::new(
            "CLI_STATE_ENCODE",
            format!("Cannot encode player state: {}", error),
        )
    })?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|error| file_error(FileOp::WriteState, parent, error))?;
    }
    let staging = staging_path(path);
    fs::write(&staging, payload).map_err(|error| file_error(FileOp::WriteState, &staging, error))?;
    fs::rename(&staging, path).map_err(|error| file_error(FileOp::WriteState, path, error))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Reads a state file written by `save_player_state`. The schema tag is
/// checked before the body, so a file from another version reports
/// `CLI_STATE_SCHEMA` even when its layout no longer matches.
pub(crate) fn load_player_state(path: &Path) -> Result<PlayerState, ThreadScriptError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(ThreadScriptError::new(
                "CLI_STATE_NOT_FOUND",
                format!("State file does not exist: {}", path.display()),
            ));
        }
        Err(error) => return Err(file_error(FileOp::ReadState, path, error)),
    };

    let invalid = |error: serde_json::Error| {
        ThreadScriptError::new(
            "CLI_STATE_INVALID",
            format!("State file \"{}\" is not valid: {}", path.display(), error),
        )
    };
    let document: serde_json::Value = serde_json::from_str(&raw).map_err(invalid)?;
    let schema = document
        .get("schemaVersion")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    if schema != PLAYER_STATE_SCHEMA {
        return Err(ThreadScriptError::new(
            "CLI_STATE_SCHEMA",
            format!(
                "State file \"{}\" has schema \"{}\"; expected \"{}\".",
                path.display(),
                schema,
                PLAYER_STATE_SCHEMA
            ),
        ));
    }
    serde_json::from_value(document).map_err(invalid)
}
