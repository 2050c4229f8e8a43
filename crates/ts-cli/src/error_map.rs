use std::fmt::Display;
use std::path::Path;

use ts_core::ThreadScriptError;

/// The file operation that failed. Each one has its own stable code, so
/// the calling agent can tell a bad script path from an unwritable state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileOp {
    ResolveScript,
    ScanScripts,
    ReadScript,
    ReadState,
    WriteState,
}

impl FileOp {
    fn code(self) -> &'static str {
        match self {
            Self::ResolveScript => "CLI_SOURCE_PATH",
            Self::ScanScripts => "CLI_SOURCE_SCAN",
            Self::ReadScript => "CLI_SOURCE_READ",
            Self::ReadState => "CLI_STATE_READ",
            Self::WriteState => "CLI_STATE_WRITE",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::ResolveScript => "resolve script path",
            Self::ScanScripts => "scan script directory",
            Self::ReadScript => "read script",
            Self::ReadState => "read state file",
            Self::WriteState => "write state file",
        }
    }
}

/// Wraps an I/O failure with the code for `op` and the path involved.
pub(crate) fn file_error(op: FileOp, path: &Path, error: impl Display) -> ThreadScriptError {
    ThreadScriptError::new(
        op.code(),
        format!("Cannot {} \"{}\": {}", op.describe(), path.display(), error),
    )
}

pub(crate) fn json_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

/// Prints the error block and returns the process exit code. Script errors
/// that point at a line also get an `ERROR_LINE` entry.
pub(crate) fn emit_error(error: ThreadScriptError) -> i32 {
    for line in error_lines(&error) {
        println!("{}", line);
    }
    1
}

fn error_lines(error: &ThreadScriptError) -> Vec<String> {
    let mut lines = vec![
        "RESULT:ERROR".to_string(),
        format!("ERROR_CODE:{}", error.code),
    ];
    if let Some(span) = &error.span {
        lines.push(format!("ERROR_LINE:{}", span.start.line));
    }
    lines.push(format!("ERROR_MSG_JSON:{}", json_string(&error.message)));
    lines
}

#[cfg(test)]
mod error_map_tests {
    use super::*;
    use ts_core::SourceSpan;

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        let code = emit_error(ThreadScriptError::new("ERR", "failed"));
        assert_eq!(code, 1);
    }

    #[test]
    fn json_string_escapes_quotes_and_newlines() {
        assert_eq!(json_string("say \"hi\"\nbye"), r#""say \"hi\"\nbye""#);
    }

    #[test]
    fn error_lines_report_script_line_when_known() {
        let plain = error_lines(&ThreadScriptError::new("CLI_CHOICE_REJECTED", "no"));
        assert_eq!(
            plain,
            vec!["RESULT:ERROR", "ERROR_CODE:CLI_CHOICE_REJECTED", r#"ERROR_MSG_JSON:"no""#]
        );

        let located = error_lines(&ThreadScriptError::with_span(
            "ROUND_KEY_DUPLICATE",
            "twice",
            SourceSpan::lines(4, 4),
        ));
        assert_eq!(located[2], "ERROR_LINE:4");
    }

    #[test]
    fn file_error_names_operation_and_path() {
        let error = file_error(
            FileOp::WriteState,
            Path::new("/tmp/out/state.json"),
            std::io::Error::other("disk full"),
        );
        assert_eq!(error.code, "CLI_STATE_WRITE");
        assert_eq!(
            error.message,
            "Cannot write state file \"/tmp/out/state.json\": disk full"
        );

        let codes = [
            FileOp::ResolveScript,
            FileOp::ScanScripts,
            FileOp::ReadScript,
            FileOp::ReadState,
        ]
        .map(|op| file_error(op, Path::new("x"), "boom").code);
        assert_eq!(
            codes,
            [
                "CLI_SOURCE_PATH",
                "CLI_SOURCE_SCAN",
                "CLI_SOURCE_READ",
                "CLI_STATE_READ"
            ]
        );
    }
}
