use std::sync::OnceLock;

use regex::Regex;
use ts_core::{Action, Choice, Condition, Diagnostic, Fragment, RoundKey, Value};

use crate::action::parse_action;
use crate::prescan::parse_set_body;

const ACTION_OPEN: &str = "[action:";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenizedBody {
    pub fragments: Vec<Fragment>,
    pub warnings: Vec<Diagnostic>,
}

fn condition_regex() -> &'static Regex {
    static CONDITION: OnceLock<Regex> = OnceLock::new();
    CONDITION.get_or_init(|| {
        Regex::new(r"(?is)^\s*\$(\w+)(?:\s+is\s+(not\s+)?(.+?))?\s*$")
            .expect("condition regex must compile")
    })
}

/// `$v`, `$v is <literal>`, `$v is not <literal>`.
pub fn parse_condition(source: &str) -> Option<Condition> {
    let caps = condition_regex().captures(source)?;
    Some(Condition {
        variable: caps.get(1)?.as_str().to_string(),
        negated: caps.get(2).is_some(),
        expected: caps.get(3).map(|m| Value::parse_literal(m.as_str())),
    })
}

/// Splits passage content into text and markup fragments. `first_line` is the
/// source line of the first content line, used for diagnostics.
pub fn tokenize_body(content: &str, first_line: usize) -> TokenizedBody {
    let mut scanner = Scanner {
        source: content,
        cursor: 0,
        line: first_line,
        text: String::new(),
        body: TokenizedBody::default(),
    };
    scanner.run();
    scanner.body
}

struct Scanner<'a> {
    source: &'a str,
    cursor: usize,
    line: usize,
    text: String,
    body: TokenizedBody,
}

impl Scanner<'_> {
    fn run(&mut self) {
        while self.cursor < self.source.len() {
            let rest = &self.source[self.cursor..];

            if rest.starts_with("\r\n") || rest.starts_with('\n') {
                self.flush_text();
                self.body.fragments.push(Fragment::LineBreak);
                self.cursor += if rest.starts_with("\r\n") { 2 } else { 1 };
                self.line += 1;
                continue;
            }

            if rest.starts_with("[[") {
                if let Some(end) = find_link_end(rest) {
                    let inner = &rest[2..end];
                    self.flush_text();
                    let line = self.line;
                    let choice = parse_choice(inner, line, &mut self.body.warnings);
                    self.body.fragments.push(Fragment::Choice { choice });
                    self.advance(end + 2);
                    continue;
                }
                self.body.warnings.push(Diagnostic::at_line(
                    "CHOICE_UNTERMINATED",
                    "Link \"[[\" is never closed; kept as text.",
                    self.line,
                ));
            }

            if starts_with_ignore_case(rest, ACTION_OPEN) {
                if let Some(end) = find_bracket_end(rest) {
                    let inner = &rest[ACTION_OPEN.len()..end];
                    self.flush_text();
                    let line = self.line;
                    if let Some(action) = parse_action(inner, line, &mut self.body.warnings) {
                        self.body.fragments.push(Fragment::Action { action });
                    }
                    self.advance(end + 1);
                    continue;
                }
            }

            if rest.starts_with('(') {
                if let Some(consumed) = self.try_macro(rest) {
                    self.advance(consumed);
                    continue;
                }
            }

            let ch = rest.chars().next().unwrap_or_default();
            self.text.push(ch);
            self.cursor += ch.len_utf8();
        }
        self.flush_text();
    }

    fn advance(&mut self, bytes: usize) {
        let consumed = &self.source[self.cursor..self.cursor + bytes];
        self.line += consumed.matches('\n').count();
        self.cursor += bytes;
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            self.body.fragments.push(Fragment::Text {
                text: std::mem::take(&mut self.text),
            });
        }
    }

    /// Returns the byte length consumed when `rest` starts with a macro this
    /// dialect understands.
    fn try_macro(&mut self, rest: &str) -> Option<usize> {
        let end = find_paren_end(rest)?;
        let inner = &rest[1..end];
        let (name, argument) = match inner.split_once(':') {
            Some((name, argument)) => (name.trim().to_ascii_lowercase(), argument),
            None => (inner.trim().to_ascii_lowercase(), ""),
        };

        let fragment = match name.as_str() {
            "if" => {
                let condition = parse_condition(argument);
                if condition.is_none() {
                    self.body.warnings.push(Diagnostic::at_line(
                        "CONDITION_INVALID",
                        format!("Cannot read condition \"{}\"; block hidden.", argument.trim()),
                        self.line,
                    ));
                }
                Fragment::If { condition }
            }
            "else" if argument.trim().is_empty() => Fragment::Else,
            "endif" | "end-if" if argument.trim().is_empty() => Fragment::EndIf,
            "set" => match parse_set_body(argument) {
                Some((name, value)) => Fragment::Set { name, value },
                None => {
                    self.body.warnings.push(Diagnostic::at_line(
                        "SET_INVALID",
                        format!("Cannot read assignment \"{}\".", argument.trim()),
                        self.line,
                    ));
                    return Some(end + 1);
                }
            },
            "else-if" | "elseif" | "unless" => {
                self.body.warnings.push(Diagnostic::at_line(
                    "MACRO_UNSUPPORTED",
                    format!("Macro \"({}:)\" is not supported; kept as text.", name),
                    self.line,
                ));
                return None;
            }
            _ => return None,
        };

        self.flush_text();
        self.body.fragments.push(fragment);
        Some(end + 1)
    }
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Index of the `]]` that closes a `[[` at the start of `rest`. Single
/// brackets inside (an embedded `[Action: ...]`) are balanced first.
fn find_link_end(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut depth = 0usize;
    let mut index = 2;
    while index < bytes.len() {
        match bytes[index] {
            b'\n' => return None,
            b'[' => depth += 1,
            b']' if depth > 0 => depth -= 1,
            b']' if bytes.get(index + 1) == Some(&b']') => return Some(index),
            _ => {}
        }
        index += 1;
    }
    None
}

/// Index of the `]` closing a `[` at the start of `rest`.
fn find_bracket_end(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (index, ch) in rest.char_indices() {
        if let Some(open) = quote {
            if ch == '\n' {
                return None;
            }
            if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => quote = Some(ch),
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            '\n' => return None,
            _ => {}
        }
    }
    None
}

/// Index of the `)` closing a `(` at the start of `rest`, skipping quoted text.
fn find_paren_end(rest: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (index, ch) in rest.char_indices() {
        if let Some(open) = quote {
            if ch == '\n' {
                return None;
            }
            if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' if depth > 0 => quote = Some(ch),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            '\n' => return None,
            _ => {}
        }
    }
    None
}

/// Reads the inside of `[[...]]`: `display|target`, `display->target`,
/// `target<-display` or a bare `display`. An embedded `[Action: ...]` is
/// lifted out of the display text.
pub fn parse_choice(inner: &str, line: usize, warnings: &mut Vec<Diagnostic>) -> Choice {
    let mut embedded_action: Option<Action> = None;
    let mut remaining = String::new();
    let mut cursor = 0;
    while cursor < inner.len() {
        let rest = &inner[cursor..];
        if starts_with_ignore_case(rest, ACTION_OPEN) {
            if let Some(end) = find_bracket_end(rest) {
                let source = &rest[ACTION_OPEN.len()..end];
                if let Some(action) = parse_action(source, line, warnings) {
                    if embedded_action.is_some() {
                        warnings.push(Diagnostic::at_line(
                            "CHOICE_ACTION_DUPLICATE",
                            "Only the first embedded action of a choice is kept.",
                            line,
                        ));
                    } else {
                        embedded_action = Some(action);
                    }
                }
                remaining.push(' ');
                cursor += end + 1;
                continue;
            }
        }
        let ch = rest.chars().next().unwrap_or_default();
        remaining.push(ch);
        cursor += ch.len_utf8();
    }

    let (display, target) = if let Some((display, target)) = remaining.rsplit_once('|') {
        (display.to_string(), target.to_string())
    } else if let Some((display, target)) = remaining.rsplit_once("->") {
        (display.to_string(), target.to_string())
    } else if let Some((target, display)) = remaining.split_once("<-") {
        (display.to_string(), target.to_string())
    } else {
        (remaining.clone(), remaining.clone())
    };

    let text = display.split_whitespace().collect::<Vec<_>>().join(" ");
    let target = target.trim().to_string();
    let target = if target.is_empty() { text.clone() } else { target };

    Choice {
        target_round: RoundKey::extract(&target),
        text,
        target,
        embedded_action,
    }
}
