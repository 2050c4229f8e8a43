use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::body::{Choice, Condition, Fragment};
use crate::error::ThreadScriptError;
use crate::value::Variables;

/// `N` or `N.M`. Keys order numerically so `2` sorts before `10`, and a bare
/// `N` sorts before any `N.M`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoundKey {
    pub major: u32,
    pub minor: Option<u32>,
}

impl RoundKey {
    pub fn new(major: u32, minor: Option<u32>) -> Self {
        Self { major, minor }
    }

    /// Rounds keyed `N.0` are only reachable while their condition holds.
    pub fn is_conditional(&self) -> bool {
        self.minor == Some(0)
    }

    /// Pulls the key out of a passage reference such as `Eli-Round-2.1`.
    pub fn extract(reference: &str) -> Option<Self> {
        static ROUND_REF: OnceLock<Regex> = OnceLock::new();
        let regex = ROUND_REF.get_or_init(|| {
            Regex::new(r"Round-(\d+(?:\.\d+)?)\s*$").expect("round reference regex must compile")
        });
        regex
            .captures(reference.trim())
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

impl FromStr for RoundKey {
    type Err = ThreadScriptError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ThreadScriptError::new(
                "ROUND_KEY_INVALID",
                format!("\"{}\" is not a round key.", raw),
            )
        };
        let (major, minor) = match raw.split_once('.') {
            Some((major, minor)) => (major, Some(minor)),
            None => (raw, None),
        };
        let major = key_part(major).ok_or_else(invalid)?;
        let minor = match minor {
            Some(minor) => Some(key_part(minor).ok_or_else(invalid)?),
            None => None,
        };
        Ok(Self { major, minor })
    }
}

/// Digits only, without leading zeros, so `2.01` can never alias `2.1`.
fn key_part(raw: &str) -> Option<u32> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    if raw.len() > 1 && raw.starts_with('0') {
        return None;
    }
    raw.parse().ok()
}

impl TryFrom<String> for RoundKey {
    type Error = ThreadScriptError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoundKey> for String {
    fn from(key: RoundKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "{}.{}", self.major, minor),
            None => write!(f, "{}", self.major),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub key: RoundKey,
    pub title: String,
    /// Text as resolved against the compile-time variable snapshot.
    pub text: String,
    pub choices: Vec<Choice>,
    pub actions: Vec<Action>,
    pub original_content: String,
    pub body: Vec<Fragment>,
    pub condition: Option<Condition>,
}

impl Round {
    /// A conditional round with no leading `(if:)` is always reachable.
    pub fn is_available(&self, variables: &Variables) -> bool {
        if !self.key.is_conditional() {
            return true;
        }
        self.condition
            .as_ref()
            .map(|condition| condition.evaluate(variables))
            .unwrap_or(true)
    }

    pub fn first_line(&self) -> &str {
        self.text.lines().next().unwrap_or_default().trim()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: String,
    pub initially_unlocked: bool,
    pub rounds: BTreeMap<RoundKey, Round>,
}

impl Contact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initially_unlocked: false,
            rounds: BTreeMap::new(),
        }
    }

    pub fn first_round_key(&self) -> Option<RoundKey> {
        self.rounds.keys().next().copied()
    }

    pub fn round(&self, key: &RoundKey) -> Option<&Round> {
        self.rounds.get(key)
    }

    pub fn conditional_rounds(&self) -> impl Iterator<Item = &Round> {
        self.rounds.values().filter(|round| round.key.is_conditional())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryMetadata {
    pub title: Option<String>,
    pub start: Option<String>,
    pub format: Option<String>,
    pub ifid: Option<String>,
}

/// The compiled program. Read-only once produced by the compiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    pub contacts: BTreeMap<String, Contact>,
    pub contact_order: Vec<String>,
    pub initial_variables: Variables,
    pub metadata: StoryMetadata,
}

impl GameData {
    pub fn contact(&self, name: &str) -> Option<&Contact> {
        self.contacts.get(name)
    }

    pub fn contacts_in_order(&self) -> impl Iterator<Item = &Contact> {
        self.contact_order
            .iter()
            .filter_map(|name| self.contacts.get(name))
    }

    pub fn first_initial_contact(&self) -> Option<&Contact> {
        self.contacts_in_order()
            .find(|contact| contact.initially_unlocked)
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}
