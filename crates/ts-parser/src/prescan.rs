use std::sync::OnceLock;

use regex::Regex;
use ts_core::{Value, Variables};

fn set_macro_regex() -> &'static Regex {
    static SET_MACRO: OnceLock<Regex> = OnceLock::new();
    SET_MACRO.get_or_init(|| {
        Regex::new(r#"(?i)\(\s*set:\s*(\$\w+\s+to\s+(?:"[^"]*"|'[^']*'|[^)]*?))\s*\)"#)
            .expect("set macro regex must compile")
    })
}

fn set_body_regex() -> &'static Regex {
    static SET_BODY: OnceLock<Regex> = OnceLock::new();
    SET_BODY.get_or_init(|| {
        Regex::new(r#"(?is)^\s*\$(\w+)\s+to\s+(.+?)\s*$"#).expect("set body regex must compile")
    })
}

/// Reads the inside of a `(set: ...)` macro: `$name to value`.
pub fn parse_set_body(body: &str) -> Option<(String, Value)> {
    let caps = set_body_regex().captures(body)?;
    let name = caps.get(1)?.as_str().to_string();
    let value = Value::parse_literal(caps.get(2)?.as_str());
    Some((name, value))
}

/// First pass over the whole script: every `(set: $name to value)` in text
/// order, regardless of passage boundaries or conditional blocks. A later
/// assignment to the same name wins.
pub fn prescan_variables(source: &str) -> Variables {
    let mut variables = Variables::new();
    for caps in set_macro_regex().captures_iter(source) {
        let Some(body) = caps.get(1) else {
            continue;
        };
        if let Some((name, value)) = parse_set_body(body.as_str()) {
            variables.insert(name, value);
        }
    }
    variables
}
