use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    String(String),
}

pub type Variables = BTreeMap<String, Value>;

impl Value {
    /// Reads a script literal: `true`/`false`, a number, a single- or
    /// double-quoted string, or a bare word kept as a string.
    pub fn parse_literal(raw: &str) -> Value {
        let trimmed = raw.trim();
        match trimmed {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }

        if let Ok(number) = trimmed.parse::<f64>() {
            if number.is_finite() {
                return Value::Number(number);
            }
        }

        for quote in ['"', '\''] {
            if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
                return Value::String(trimmed[1..trimmed.len() - 1].to_string());
            }
        }

        Value::String(trimmed.to_string())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0,
            Self::String(value) => !value.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{}", value),
            Self::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Self::Number(value) => write!(f, "{}", value),
            Self::String(value) => f.write_str(value),
        }
    }
}

#[cfg(test)]
mod value_tests {
    use super::*;

    #[test]
    fn parse_literal_recognizes_each_shape() {
        assert_eq!(Value::parse_literal("true"), Value::Bool(true));
        assert_eq!(Value::parse_literal(" false "), Value::Bool(false));
        assert_eq!(Value::parse_literal("42"), Value::Number(42.0));
        assert_eq!(Value::parse_literal("-1.5"), Value::Number(-1.5));
        assert_eq!(
            Value::parse_literal("\"hello there\""),
            Value::String("hello there".to_string())
        );
        assert_eq!(
            Value::parse_literal("'single'"),
            Value::String("single".to_string())
        );
        assert_eq!(Value::parse_literal("bare"), Value::String("bare".to_string()));
    }

    #[test]
    fn display_drops_integral_fraction() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }

    #[test]
    fn untagged_serde_keeps_plain_json_shapes() {
        let mut vars = Variables::new();
        vars.insert("met".to_string(), Value::Bool(true));
        vars.insert("count".to_string(), Value::Number(2.0));
        vars.insert("name".to_string(), Value::String("Eli".to_string()));

        let json = serde_json::to_string(&vars).expect("variables should serialize");
        assert_eq!(json, r#"{"count":2.0,"met":true,"name":"Eli"}"#);
        let back: Variables = serde_json::from_str(&json).expect("variables should parse");
        assert_eq!(back, vars);
    }

    #[test]
    fn truthiness_follows_value_kind() {
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::String("x".to_string()).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
    }
}
