use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A scripted side effect. `delay` is in milliseconds and is added on top of
/// the engine's global typing delay, never substituted for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub kind: ActionKind,
    #[serde(default)]
    pub delay: u64,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { kind, delay: 0 }
    }

    pub fn delayed(kind: ActionKind, delay: u64) -> Self {
        Self { kind, delay }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPin {
    pub label: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    UnlockContact {
        contact: String,
    },
    EndThread,
    DelayedMessage {
        text: String,
        contact: Option<String>,
    },
    SendPhoto {
        media: String,
        caption: Option<String>,
    },
    SendVideo {
        media: String,
        caption: Option<String>,
    },
    DropPin {
        location: LocationPin,
    },
    #[serde(rename = "call_911")]
    Call911,
    OpenThread {
        contact: String,
    },
    TriggerEliNeedsCode,
    TypingIndicator {
        duration: u64,
    },
    SetTypingDelay {
        typing_delay: u64,
    },
    ShowNotification {
        title: Option<String>,
        text: String,
    },
    Vibrate {
        duration: u64,
    },
    SetContactStatus {
        contact: String,
        status: String,
    },
    TriggerEmergencyCall {
        number: Option<String>,
    },
    SetVariable {
        name: String,
        value: Value,
    },
}

pub const ACTION_KIND_NAMES: &[&str] = &[
    "unlock_contact",
    "end_thread",
    "delayed_message",
    "send_photo",
    "send_video",
    "drop_pin",
    "call_911",
    "open_thread",
    "trigger_eli_needs_code",
    "typing_indicator",
    "set_typing_delay",
    "show_notification",
    "vibrate",
    "set_contact_status",
    "trigger_emergency_call",
    "set_variable",
];

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::UnlockContact { .. } => "unlock_contact",
            Self::EndThread => "end_thread",
            Self::DelayedMessage { .. } => "delayed_message",
            Self::SendPhoto { .. } => "send_photo",
            Self::SendVideo { .. } => "send_video",
            Self::DropPin { .. } => "drop_pin",
            Self::Call911 => "call_911",
            Self::OpenThread { .. } => "open_thread",
            Self::TriggerEliNeedsCode => "trigger_eli_needs_code",
            Self::TypingIndicator { .. } => "typing_indicator",
            Self::SetTypingDelay { .. } => "set_typing_delay",
            Self::ShowNotification { .. } => "show_notification",
            Self::Vibrate { .. } => "vibrate",
            Self::SetContactStatus { .. } => "set_contact_status",
            Self::TriggerEmergencyCall { .. } => "trigger_emergency_call",
            Self::SetVariable { .. } => "set_variable",
        }
    }

    /// Kinds whose effect is held back and attached after the next reply.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::UnlockContact { .. } | Self::EndThread)
    }

    /// Kinds that put a new bubble into the thread.
    pub fn produces_message(&self) -> bool {
        matches!(
            self,
            Self::DelayedMessage { .. }
                | Self::SendPhoto { .. }
                | Self::SendVideo { .. }
                | Self::DropPin { .. }
                | Self::TypingIndicator { .. }
        )
    }
}
