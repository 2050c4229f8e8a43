use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use ts_core::{Action, ActionKind, Diagnostic, LocationPin, Value, TYPING_INDICATOR_MS};

const DEFAULT_VIBRATE_MS: u64 = 200;

fn delay_regex() -> &'static Regex {
    static DELAY: OnceLock<Regex> = OnceLock::new();
    DELAY.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|[\s,])delay\s*:\s*["']?(-?\d+)["']?\s*,?"#)
            .expect("delay regex must compile")
    })
}

fn named_item_regex() -> &'static Regex {
    static NAMED: OnceLock<Regex> = OnceLock::new();
    NAMED.get_or_init(|| {
        Regex::new(r"(?s)^([A-Za-z_]\w*)\s*:\s*(.*)$").expect("named param regex must compile")
    })
}

/// Parameters of one action after the `delay:` token has been removed.
/// Items are split on top-level commas; `key: value` items are named, the
/// rest are positional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamBag {
    pub named: BTreeMap<String, String>,
    pub positional: Vec<String>,
}

impl ParamBag {
    pub fn parse(raw: &str) -> Self {
        let mut bag = Self::default();
        for item in split_top_level(raw) {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            match named_item_regex().captures(item) {
                Some(caps) if !starts_quoted(item) => {
                    let key = caps[1].to_ascii_lowercase();
                    bag.named.insert(key, unquote(&caps[2]));
                }
                _ => bag.positional.push(unquote(item)),
            }
        }
        bag
    }

    pub fn get(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|key| self.named.get(*key))
            .map(String::as_str)
    }

    pub fn position(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    fn named_or_position(&self, keys: &[&str], index: usize) -> Option<String> {
        self.get(keys)
            .or_else(|| self.position(index))
            .map(str::to_string)
            .filter(|value| !value.is_empty())
    }

    /// Free text: a named key, or every positional item joined back together
    /// so unquoted commas survive.
    fn text(&self, keys: &[&str]) -> Option<String> {
        if let Some(value) = self.get(keys) {
            return Some(value.to_string()).filter(|value| !value.is_empty());
        }
        Some(self.positional.join(", ")).filter(|value| !value.is_empty())
    }
}

fn starts_quoted(item: &str) -> bool {
    item.starts_with('"') || item.starts_with('\'')
}

fn unquote(raw: &str) -> String {
    let trimmed = raw.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

/// Whether byte offset `at` sits inside a quoted value. A quote only opens
/// at the start of an item or right after `key:`, so apostrophes in bare
/// text ("don't") do not count.
fn in_quoted_value(raw: &str, at: usize) -> bool {
    let mut quote: Option<char> = None;
    let mut previous: Option<char> = None;
    for (index, ch) in raw.char_indices() {
        if index >= at {
            break;
        }
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None if (ch == '"' || ch == '\'') && matches!(previous, None | Some(',') | Some(':')) => {
                quote = Some(ch);
            }
            None => {}
        }
        if !ch.is_whitespace() {
            previous = Some(ch);
        }
    }
    quote.is_some()
}

fn split_top_level(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in raw.chars() {
        match quote {
            Some(open) => {
                current.push(ch);
                if ch == open {
                    quote = None;
                }
            }
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            None if ch == ',' => items.push(std::mem::take(&mut current)),
            None => current.push(ch),
        }
    }
    items.push(current);
    items
}

/// Parses the inside of `[Action: ...]`, e.g. `unlock_contact: Mara delay: 500`
/// or `end_thread`. Problems are pushed to `warnings` and the action is
/// dropped.
pub fn parse_action(source: &str, line: usize, warnings: &mut Vec<Diagnostic>) -> Option<Action> {
    let source = source.trim();
    let kind_end = source
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .unwrap_or(source.len());
    let kind_name = source[..kind_end].to_ascii_lowercase();
    if kind_name.is_empty() {
        warnings.push(Diagnostic::at_line(
            "ACTION_KIND_MISSING",
            format!("Action \"{}\" has no kind.", source),
            line,
        ));
        return None;
    }

    let mut rest = source[kind_end..].trim_start();
    if let Some(stripped) = rest.strip_prefix(':') {
        rest = stripped;
    }

    let mut delay = 0u64;
    let mut params = rest.to_string();
    let delay_caps = delay_regex()
        .captures_iter(rest)
        .find(|caps| caps.get(0).is_some_and(|whole| !in_quoted_value(rest, whole.start())));
    if let Some(caps) = delay_caps {
        let raw_delay = &caps[1];
        match raw_delay.parse::<u64>() {
            Ok(value) => delay = value,
            Err(_) => warnings.push(Diagnostic::at_line(
                "ACTION_DELAY_INVALID",
                format!(
                    "Action \"{}\" has invalid delay \"{}\"; using 0.",
                    kind_name, raw_delay
                ),
                line,
            )),
        }
        if let Some(whole) = caps.get(0) {
            params.replace_range(whole.range(), " ");
        }
    }

    let bag = ParamBag::parse(params.trim().trim_matches(','));
    match build_kind(&kind_name, &bag) {
        Ok(kind) => Some(Action { kind, delay }),
        Err(diagnostic) => {
            warnings.push(Diagnostic::at_line(
                diagnostic.code,
                diagnostic.message,
                line,
            ));
            None
        }
    }
}

fn missing(kind: &str, field: &str) -> Diagnostic {
    Diagnostic::new(
        "ACTION_PARAM_MISSING",
        format!("Action \"{}\" requires \"{}\".", kind, field),
    )
}

fn invalid(kind: &str, field: &str, raw: &str) -> Diagnostic {
    Diagnostic::new(
        "ACTION_PARAM_INVALID",
        format!("Action \"{}\" has invalid {} \"{}\".", kind, field, raw),
    )
}

fn parse_ms(kind: &str, field: &str, raw: Option<String>, fallback: u64) -> Result<u64, Diagnostic> {
    match raw {
        None => Ok(fallback),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid(kind, field, &raw)),
    }
}

fn parse_coordinate(kind: &str, field: &str, raw: Option<String>) -> Result<Option<f64>, Diagnostic> {
    match raw {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(kind, field, &raw)),
    }
}

fn build_kind(kind: &str, bag: &ParamBag) -> Result<ActionKind, Diagnostic> {
    let contact = || {
        bag.named_or_position(&["contact", "name"], 0)
            .ok_or_else(|| missing(kind, "contact"))
    };

    let built = match kind {
        "unlock_contact" => ActionKind::UnlockContact { contact: contact()? },
        "open_thread" => ActionKind::OpenThread { contact: contact()? },
        "end_thread" => ActionKind::EndThread,
        "call_911" => ActionKind::Call911,
        "trigger_eli_needs_code" => ActionKind::TriggerEliNeedsCode,
        "delayed_message" => ActionKind::DelayedMessage {
            text: bag
                .text(&["text", "message"])
                .ok_or_else(|| missing(kind, "text"))?,
            contact: bag.get(&["contact"]).map(str::to_string),
        },
        "send_photo" | "send_video" => {
            let media = bag
                .named_or_position(&["media", "url", "src", "file", "photo", "video"], 0)
                .ok_or_else(|| missing(kind, "media"))?;
            let caption = bag.named_or_position(&["caption"], 1);
            if kind == "send_photo" {
                ActionKind::SendPhoto { media, caption }
            } else {
                ActionKind::SendVideo { media, caption }
            }
        }
        "drop_pin" => ActionKind::DropPin {
            location: LocationPin {
                label: bag
                    .named_or_position(&["label", "name", "location"], 0)
                    .ok_or_else(|| missing(kind, "label"))?,
                latitude: parse_coordinate(
                    kind,
                    "latitude",
                    bag.named_or_position(&["lat", "latitude"], 1),
                )?,
                longitude: parse_coordinate(
                    kind,
                    "longitude",
                    bag.named_or_position(&["lng", "lon", "longitude"], 2),
                )?,
            },
        },
        "typing_indicator" => ActionKind::TypingIndicator {
            duration: parse_ms(
                kind,
                "duration",
                bag.named_or_position(&["duration"], 0),
                TYPING_INDICATOR_MS,
            )?,
        },
        "set_typing_delay" => {
            let raw = bag
                .named_or_position(&["typing_delay", "ms", "value"], 0)
                .ok_or_else(|| missing(kind, "typing_delay"))?;
            ActionKind::SetTypingDelay {
                typing_delay: parse_ms(kind, "typing_delay", Some(raw), 0)?,
            }
        }
        "show_notification" => {
            let (title, text) = match bag.get(&["text", "message", "body"]) {
                Some(text) => (bag.get(&["title"]).map(str::to_string), text.to_string()),
                None if bag.positional.len() > 1 => (
                    bag.position(0).map(str::to_string),
                    bag.positional[1..].join(", "),
                ),
                None => (
                    bag.get(&["title"]).map(str::to_string),
                    bag.position(0).unwrap_or_default().to_string(),
                ),
            };
            if text.is_empty() {
                return Err(missing(kind, "text"));
            }
            ActionKind::ShowNotification { title, text }
        }
        "vibrate" => ActionKind::Vibrate {
            duration: parse_ms(
                kind,
                "duration",
                bag.named_or_position(&["duration"], 0),
                DEFAULT_VIBRATE_MS,
            )?,
        },
        "set_contact_status" => ActionKind::SetContactStatus {
            contact: contact()?,
            status: bag
                .named_or_position(&["status"], 1)
                .ok_or_else(|| missing(kind, "status"))?,
        },
        "trigger_emergency_call" => ActionKind::TriggerEmergencyCall {
            number: bag.named_or_position(&["number", "phone"], 0),
        },
        "set_variable" => build_set_variable(bag)?,
        other => {
            return Err(Diagnostic::new(
                "ACTION_KIND_UNKNOWN",
                format!("Unknown action kind \"{}\"; action dropped.", other),
            ))
        }
    };
    Ok(built)
}

fn build_set_variable(bag: &ParamBag) -> Result<ActionKind, Diagnostic> {
    const KIND: &str = "set_variable";
    if let Some(single) = bag.position(0).filter(|_| bag.positional.len() == 1) {
        if let Some((name, value)) = single.split_once(" to ") {
            return Ok(ActionKind::SetVariable {
                name: name.trim().trim_start_matches('$').to_string(),
                value: Value::parse_literal(value),
            });
        }
    }

    let name = bag
        .named_or_position(&["name", "variable", "var"], 0)
        .ok_or_else(|| missing(KIND, "name"))?;
    let raw_value = bag
        .named_or_position(&["value", "to"], 1)
        .ok_or_else(|| missing(KIND, "value"))?;
    Ok(ActionKind::SetVariable {
        name: name.trim_start_matches('$').to_string(),
        value: Value::parse_literal(&raw_value),
    })
}

#[cfg(test)]
mod action_tests {
    use super::*;

    fn parse_ok(source: &str) -> Action {
        let mut warnings = Vec::new();
        let action = parse_action(source, 1, &mut warnings).expect("action should parse");
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
        action
    }

    fn parse_err(source: &str) -> Diagnostic {
        let mut warnings = Vec::new();
        assert!(parse_action(source, 9, &mut warnings).is_none());
        warnings.pop().expect("a warning should be recorded")
    }

    #[test]
    fn bare_token_and_named_contact_are_equivalent() {
        let bare = parse_ok("unlock_contact: Mara");
        let named = parse_ok("unlock_contact: contact: \"Mara\"");
        assert_eq!(bare, named);
        assert_eq!(
            bare.kind,
            ActionKind::UnlockContact {
                contact: "Mara".to_string()
            }
        );
        assert_eq!(bare.delay, 0);
    }

    #[test]
    fn delay_is_stripped_before_params() {
        let action = parse_ok("unlock_contact: Mara delay: 1500");
        assert_eq!(action.delay, 1500);
        assert_eq!(
            action.kind,
            ActionKind::UnlockContact {
                contact: "Mara".to_string()
            }
        );

        let leading = parse_ok("send_photo: delay: 300, media: \"dock.jpg\", caption: \"Look\"");
        assert_eq!(leading.delay, 300);
        assert_eq!(
            leading.kind,
            ActionKind::SendPhoto {
                media: "dock.jpg".to_string(),
                caption: Some("Look".to_string()),
            }
        );
    }

    #[test]
    fn zero_parameter_actions_accept_colonless_form() {
        assert_eq!(parse_ok("end_thread").kind, ActionKind::EndThread);
        let delayed = parse_ok("end_thread delay: 250");
        assert_eq!(delayed.kind, ActionKind::EndThread);
        assert_eq!(delayed.delay, 250);
        assert_eq!(parse_ok("call_911").kind, ActionKind::Call911);
    }

    #[test]
    fn positional_values_fill_in_order() {
        let pin = parse_ok("drop_pin: \"Pier 9\", 37.8, -122.4");
        assert_eq!(
            pin.kind,
            ActionKind::DropPin {
                location: LocationPin {
                    label: "Pier 9".to_string(),
                    latitude: Some(37.8),
                    longitude: Some(-122.4),
                }
            }
        );

        let status = parse_ok("set_contact_status: Eli, offline");
        assert_eq!(
            status.kind,
            ActionKind::SetContactStatus {
                contact: "Eli".to_string(),
                status: "offline".to_string(),
            }
        );
    }

    #[test]
    fn delay_inside_quoted_text_is_left_alone() {
        let quoted = parse_ok(r#"delayed_message: "sorry for the delay: 5 min""#);
        assert_eq!(quoted.delay, 0);
        assert_eq!(
            quoted.kind,
            ActionKind::DelayedMessage {
                text: "sorry for the delay: 5 min".to_string(),
                contact: None,
            }
        );

        let trailing = parse_ok(r#"delayed_message: text: "delay: 9 is not a token", delay: 700"#);
        assert_eq!(trailing.delay, 700);
        assert!(matches!(
            trailing.kind,
            ActionKind::DelayedMessage { ref text, .. } if text == "delay: 9 is not a token"
        ));

        let apostrophe = parse_ok("delayed_message: don't wait delay: 300");
        assert_eq!(apostrophe.delay, 300);
    }

    #[test]
    fn delayed_message_keeps_unquoted_commas() {
        let action = parse_ok("delayed_message: hey, you there? delay: 4000");
        assert_eq!(action.delay, 4000);
        assert_eq!(
            action.kind,
            ActionKind::DelayedMessage {
                text: "hey, you there?".to_string(),
                contact: None,
            }
        );
    }

    #[test]
    fn quoted_value_may_contain_colon() {
        let action = parse_ok("show_notification: title: \"Eli\", text: \"at 10:30\"");
        assert_eq!(
            action.kind,
            ActionKind::ShowNotification {
                title: Some("Eli".to_string()),
                text: "at 10:30".to_string(),
            }
        );
    }

    #[test]
    fn timing_kinds_use_defaults() {
        assert_eq!(
            parse_ok("typing_indicator").kind,
            ActionKind::TypingIndicator { duration: 400 }
        );
        assert_eq!(
            parse_ok("vibrate").kind,
            ActionKind::Vibrate { duration: 200 }
        );
        assert_eq!(
            parse_ok("set_typing_delay: 3000").kind,
            ActionKind::SetTypingDelay { typing_delay: 3000 }
        );
    }

    #[test]
    fn set_variable_accepts_to_form_and_pairs() {
        let to_form = parse_ok("set_variable: $met to true");
        let pair = parse_ok("set_variable: met, true");
        assert_eq!(to_form, pair);
        assert_eq!(
            pair.kind,
            ActionKind::SetVariable {
                name: "met".to_string(),
                value: Value::Bool(true),
            }
        );
    }

    #[test]
    fn unknown_kind_is_warned_and_dropped() {
        let warning = parse_err("dance: wildly");
        assert_eq!(warning.code, "ACTION_KIND_UNKNOWN");
        assert_eq!(warning.line(), Some(9));
    }

    #[test]
    fn missing_and_invalid_params_are_warned() {
        assert_eq!(parse_err("unlock_contact").code, "ACTION_PARAM_MISSING");
        assert_eq!(parse_err("vibrate: long").code, "ACTION_PARAM_INVALID");
    }

    #[test]
    fn negative_delay_falls_back_to_zero() {
        let mut warnings = Vec::new();
        let action = parse_action("vibrate delay: -20", 3, &mut warnings).expect("action should parse");
        assert_eq!(action.delay, 0);
        assert_eq!(warnings[0].code, "ACTION_DELAY_INVALID");
    }
}
