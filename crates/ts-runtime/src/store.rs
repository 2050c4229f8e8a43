use std::fmt::Display;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use ts_core::{GameState, ThreadScriptError};

pub const STATE_SCHEMA_V1: &str = "threadscript-state.v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub schema_version: String,
    pub state: GameState,
}

impl PersistedState {
    pub fn new(state: GameState) -> Self {
        Self {
            schema_version: STATE_SCHEMA_V1.to_string(),
            state,
        }
    }
}

fn map_error(code: &'static str, error: impl Display) -> ThreadScriptError {
    ThreadScriptError::new(code, error.to_string())
}

pub fn encode_state(state: &GameState) -> Result<String, ThreadScriptError> {
    serde_json::to_string(&PersistedState::new(state.clone()))
        .map_err(|error| map_error("STORE_ENCODE", error))
}

pub fn decode_state(document: &str) -> Result<GameState, ThreadScriptError> {
    let persisted: PersistedState =
        serde_json::from_str(document).map_err(|error| map_error("STORE_INVALID", error))?;
    if persisted.schema_version != STATE_SCHEMA_V1 {
        return Err(ThreadScriptError::new(
            "STORE_SCHEMA",
            format!("Unsupported state schema: {}", persisted.schema_version),
        ));
    }
    Ok(persisted.state)
}

/// Holds at most one persisted document. `read` returns `Ok(None)` when
/// nothing has been written yet.
pub trait StateStore: Send + Sync {
    fn read(&self) -> Result<Option<String>, ThreadScriptError>;
    fn write(&self, document: &str) -> Result<(), ThreadScriptError>;
    fn clear(&self) -> Result<(), ThreadScriptError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, ThreadScriptError> {
        self.document
            .lock()
            .map_err(|error| map_error("STORE_LOCK", error))
    }
}

impl StateStore for MemoryStore {
    fn read(&self) -> Result<Option<String>, ThreadScriptError> {
        Ok(self.lock()?.clone())
    }

    fn write(&self, document: &str) -> Result<(), ThreadScriptError> {
        *self.lock()? = Some(document.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ThreadScriptError> {
        *self.lock()? = None;
        Ok(())
    }
}

/// One JSON file on disk. Parent directories are created on first write.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStore {
    fn read(&self) -> Result<Option<String>, ThreadScriptError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(map_error("STORE_READ", error)),
        }
    }

    fn write(&self, document: &str) -> Result<(), ThreadScriptError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|error| map_error("STORE_WRITE", error))?;
        fs::write(&self.path, document).map_err(|error| map_error("STORE_WRITE", error))
    }

    fn clear(&self) -> Result<(), ThreadScriptError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(map_error("STORE_WRITE", error)),
        }
    }
}
