use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::program::RoundKey;
use crate::value::{Value, Variables};

/// `$name`, `$name is <literal>` or `$name is not <literal>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub variable: String,
    pub negated: bool,
    pub expected: Option<Value>,
}

impl Condition {
    pub fn is(variable: impl Into<String>, expected: Value) -> Self {
        Self {
            variable: variable.into(),
            negated: false,
            expected: Some(expected),
        }
    }

    /// Undefined variables read as `false`.
    pub fn evaluate(&self, variables: &Variables) -> bool {
        let fallback = Value::Bool(false);
        let actual = variables.get(&self.variable).unwrap_or(&fallback);
        let matched = match &self.expected {
            None => actual.is_truthy(),
            Some(expected) => values_match(actual, expected),
        };
        matched != self.negated
    }
}

fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.variable)?;
        if let Some(expected) = &self.expected {
            let op = if self.negated { "is not" } else { "is" };
            match expected {
                Value::String(text) => write!(f, " {} \"{}\"", op, text)?,
                other => write!(f, " {} {}", op, other)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub text: String,
    pub target: String,
    pub target_round: Option<RoundKey>,
    pub embedded_action: Option<Action>,
}

/// One element of a passage body after tokenizing. Bodies keep every
/// fragment, visible or not, so they can be re-evaluated against new
/// variables at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Fragment {
    Text { text: String },
    /// `condition` is `None` when the macro could not be read; such a block
    /// is never visible.
    If { condition: Option<Condition> },
    Else,
    EndIf,
    Set { name: String, value: Value },
    Choice { choice: Choice },
    Action { action: Action },
    LineBreak,
}

impl Fragment {
    pub fn is_markup(&self) -> bool {
        !matches!(self, Self::Text { .. } | Self::LineBreak)
    }
}

#[cfg(test)]
mod body_tests {
    use super::*;

    fn vars(entries: &[(&str, Value)]) -> Variables {
        entries
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn condition_compares_typed_values() {
        let variables = vars(&[
            ("met", Value::Bool(true)),
            ("count", Value::Number(3.0)),
            ("name", Value::String("Eli".to_string())),
        ]);

        assert!(Condition::is("met", Value::Bool(true)).evaluate(&variables));
        assert!(!Condition::is("met", Value::Bool(false)).evaluate(&variables));
        assert!(Condition::is("count", Value::Number(3.0)).evaluate(&variables));
        assert!(Condition::is("name", Value::String("Eli".to_string())).evaluate(&variables));
        assert!(!Condition::is("count", Value::String("3".to_string())).evaluate(&variables));
    }

    #[test]
    fn condition_treats_missing_variable_as_false() {
        let empty = Variables::new();
        assert!(Condition::is("ghost", Value::Bool(false)).evaluate(&empty));
        assert!(!Condition::is("ghost", Value::Bool(true)).evaluate(&empty));

        let bare = Condition {
            variable: "ghost".to_string(),
            negated: false,
            expected: None,
        };
        assert!(!bare.evaluate(&empty));
    }

    #[test]
    fn negated_condition_inverts_match() {
        let variables = vars(&[("met", Value::Bool(true))]);
        let condition = Condition {
            variable: "met".to_string(),
            negated: true,
            expected: Some(Value::Bool(true)),
        };
        assert!(!condition.evaluate(&variables));
        assert_eq!(condition.to_string(), "$met is not true");
    }
}
