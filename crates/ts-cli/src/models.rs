use serde::{Deserialize, Serialize};
use ts_core::{GameState, Message, MessageKind, ThreadState};

pub(crate) const PLAYER_STATE_SCHEMA: &str = "threadscript-player.v1";

#[derive(Debug, Clone)]
pub(crate) struct LoadedScript {
    /// Canonical script reference stored in the player state.
    pub(crate) id: String,
    pub(crate) source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlayerState {
    pub(crate) schema_version: String,
    pub(crate) script: String,
    pub(crate) state: GameState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Speaker {
    Player,
    Contact,
    System,
}

impl Speaker {
    pub(crate) fn of(message: &Message) -> Self {
        if message.from_player {
            return Self::Player;
        }
        match message.kind {
            MessageKind::UnlockContact | MessageKind::EndThread => Self::System,
            _ => Self::Contact,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Contact => "contact",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ThreadView {
    pub(crate) contact: String,
    pub(crate) state: ThreadState,
    pub(crate) choices: Vec<String>,
}

/// Everything an agent needs after one command: messages that arrived during
/// it and the choices now open in every unlocked thread.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BoundaryResult {
    pub(crate) messages: Vec<Message>,
    pub(crate) threads: Vec<ThreadView>,
}
