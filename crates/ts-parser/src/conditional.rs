use ts_core::{Action, Choice, Condition, Fragment, Value, Variables};

use crate::markup::tokenize_body;

/// What a body shows under one set of variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub text: String,
    pub choices: Vec<Choice>,
    pub actions: Vec<Action>,
    /// `(set:)` macros that ran, in order.
    pub assignments: Vec<(String, Value)>,
}

#[derive(Default)]
struct LineBuffer {
    text: String,
    markup: bool,
    visible_at_start: bool,
}

impl LineBuffer {
    fn starting(visible: bool) -> Self {
        Self {
            visible_at_start: visible,
            ..Self::default()
        }
    }

    /// Plain lines keep their spacing; lines that carried markup are trimmed
    /// and dropped when nothing visible is left.
    fn finish(self, lines: &mut Vec<String>) {
        if !self.markup {
            if self.visible_at_start {
                lines.push(self.text);
            }
            return;
        }
        let trimmed = self.text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
}

/// Walks a tokenized body. Blocks do not nest: an `(if:)` inside an open
/// block closes it first. `(set:)` updates `variables` as it is reached so
/// later conditions in the same body see the new value.
pub fn evaluate_body(fragments: &[Fragment], variables: &mut Variables) -> Evaluation {
    let mut evaluation = Evaluation::default();
    let mut lines: Vec<String> = Vec::new();
    let mut in_block = false;
    let mut visible = true;
    let mut line = LineBuffer::starting(true);

    for fragment in fragments {
        if fragment.is_markup() {
            line.markup = true;
        }
        match fragment {
            Fragment::Text { text } => {
                if visible {
                    line.text.push_str(text);
                }
            }
            Fragment::LineBreak => {
                std::mem::replace(&mut line, LineBuffer::starting(visible)).finish(&mut lines);
            }
            Fragment::If { condition } => {
                in_block = true;
                visible = condition
                    .as_ref()
                    .map(|condition| condition.evaluate(variables))
                    .unwrap_or(false);
            }
            Fragment::Else => {
                if in_block {
                    visible = !visible;
                }
            }
            Fragment::EndIf => {
                in_block = false;
                visible = true;
            }
            Fragment::Set { name, value } => {
                if visible {
                    variables.insert(name.clone(), value.clone());
                    evaluation.assignments.push((name.clone(), value.clone()));
                }
            }
            Fragment::Choice { choice } => {
                if visible {
                    evaluation.choices.push(choice.clone());
                }
            }
            Fragment::Action { action } => {
                if visible {
                    evaluation.actions.push(action.clone());
                }
            }
        }
    }
    line.finish(&mut lines);

    evaluation.text = lines.join("\n").trim().to_string();
    evaluation
}

/// Text-only convenience over [`evaluate_body`].
pub fn resolve_conditionals(content: &str, variables: &mut Variables) -> String {
    let tokenized = tokenize_body(content, 1);
    evaluate_body(&tokenized.fragments, variables).text
}

/// The condition of an `(if:)` that opens the body, ignoring leading blank
/// space.
pub fn leading_condition(fragments: &[Fragment]) -> Option<Condition> {
    let first = fragments.iter().find(|fragment| match fragment {
        Fragment::LineBreak => false,
        Fragment::Text { text } => !text.trim().is_empty(),
        _ => true,
    })?;
    match first {
        Fragment::If { condition } => condition.clone(),
        _ => None,
    }
}
