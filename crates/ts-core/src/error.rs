use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{SourceLocation, SourceSpan};

#[derive(Debug, Error, Clone)]
#[error("{code}: {message}")]
pub struct ThreadScriptError {
    pub code: String,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl ThreadScriptError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(
        code: impl Into<String>,
        message: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: Some(span),
        }
    }
}

/// A non-fatal compiler finding. Errors and warnings share this shape and are
/// separated by the list they are recorded in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location: None,
        }
    }

    pub fn at_line(code: impl Into<String>, message: impl Into<String>, line: usize) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location: Some(SourceLocation { line, column: 1 }),
        }
    }

    pub fn line(&self) -> Option<usize> {
        self.location.as_ref().map(|location| location.line)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} (line {}): {}", self.code, location.line, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn error_display_joins_code_and_message() {
        let error = ThreadScriptError::new("ENGINE_CONTACT_UNKNOWN", "Contact \"Zed\" is unknown.");
        assert_eq!(
            error.to_string(),
            "ENGINE_CONTACT_UNKNOWN: Contact \"Zed\" is unknown."
        );
        assert!(error.span.is_none());
    }

    #[test]
    fn diagnostic_display_includes_line_when_known() {
        let located = Diagnostic::at_line("PASSAGE_HEADER_INVALID", "bad header", 7);
        assert_eq!(located.line(), Some(7));
        assert_eq!(located.to_string(), "PASSAGE_HEADER_INVALID (line 7): bad header");

        let floating = Diagnostic::new("ACTION_KIND_UNKNOWN", "dance");
        assert_eq!(floating.to_string(), "ACTION_KIND_UNKNOWN: dance");
    }
}
