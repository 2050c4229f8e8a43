use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{TestCase, ToolError, TESTCASE_SCHEMA_V1};

pub const CASE_FILE_NAME: &str = "testcase.json";

/// Concatenates every `.twee` file under `scenario_dir` in path order.
pub fn read_twee_source_from_dir(scenario_dir: &Path) -> Result<String, ToolError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(scenario_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("twee") {
            continue;
        }
        let content = fs::read_to_string(path).map_err(|source| ToolError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        files.push(content);
    }

    if files.is_empty() {
        return Err(ToolError::SourceEmpty {
            path: scenario_dir.to_path_buf(),
        });
    }

    Ok(files.join("\n"))
}

pub fn read_test_case(case_path: &Path) -> Result<TestCase, ToolError> {
    let raw = fs::read_to_string(case_path).map_err(|source| ToolError::ReadFile {
        path: case_path.to_path_buf(),
        source,
    })?;
    let parsed: TestCase = serde_json::from_str(&raw).map_err(|source| ToolError::ParseCase {
        path: case_path.to_path_buf(),
        source,
    })?;

    if parsed.schema_version != TESTCASE_SCHEMA_V1 {
        return Err(ToolError::InvalidSchemaVersion {
            expected: TESTCASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}

/// Scenario directories under `root` that carry a `testcase.json`, sorted.
pub fn discover_cases(root: &Path) -> Vec<PathBuf> {
    let mut directories = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == CASE_FILE_NAME)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect::<Vec<_>>();
    directories.sort();
    directories
}

#[cfg(test)]
mod source_tests {
    use super::*;

    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should move forward")
            .as_nanos();
        std::env::temp_dir().join(format!("ts-tool-{}-{}", name, nanos))
    }

    fn write_file(path: &Path, content: &str) {
        let parent = path.parent().expect("path should have parent");
        fs::create_dir_all(parent).expect("parent dir should be created");
        fs::write(path, content).expect("file should be written");
    }

    #[test]
    fn read_twee_source_from_dir_joins_in_path_order() {
        let root = temp_dir("scripts");
        write_file(&root.join("b.twee"), ":: B-Round-1\nB");
        write_file(&root.join("a.twee"), ":: A-Round-1\nA");
        write_file(&root.join("testcase.json"), "{}");

        let source = read_twee_source_from_dir(&root).expect("scan should pass");
        assert_eq!(source, ":: A-Round-1\nA\n:: B-Round-1\nB");
    }

    #[test]
    fn read_twee_source_from_dir_fails_without_scripts() {
        let root = temp_dir("empty-scripts");
        write_file(&root.join("ignore.txt"), "skip");

        let error = read_twee_source_from_dir(&root).expect_err("empty source should fail");
        assert!(matches!(error, ToolError::SourceEmpty { .. }));
    }

    #[test]
    fn read_test_case_parses_valid_json() {
        let root = temp_dir("case-ok");
        let case_path = root.join(CASE_FILE_NAME);
        write_file(
            &case_path,
            r#"{
  "schemaVersion":"threadscript-case.v1",
  "actions":[{"kind":"choose","contact":"A","index":0}],
  "expectedEvents":[{"kind":"message","contact":"A","text":"Hi"}]
}"#,
        );

        let parsed = read_test_case(&case_path).expect("case should parse");
        assert_eq!(parsed.schema_version, TESTCASE_SCHEMA_V1);
        assert_eq!(parsed.actions.len(), 1);
        assert_eq!(parsed.expected_events.len(), 1);
    }

    #[test]
    fn read_test_case_reports_read_parse_and_schema_errors() {
        let root = temp_dir("case-errors");
        fs::create_dir_all(&root).expect("root should be created");

        let missing = read_test_case(&root.join("missing.json")).expect_err("missing should fail");
        assert!(matches!(missing, ToolError::ReadFile { .. }));

        let bad_json_path = root.join("bad.json");
        write_file(&bad_json_path, "{");
        let parse_error = read_test_case(&bad_json_path).expect_err("parse should fail");
        assert!(matches!(parse_error, ToolError::ParseCase { .. }));

        let bad_schema_path = root.join("bad-schema.json");
        write_file(&bad_schema_path, r#"{"schemaVersion":"v0"}"#);
        let schema_error = read_test_case(&bad_schema_path).expect_err("schema should fail");
        assert!(matches!(schema_error, ToolError::InvalidSchemaVersion { .. }));
    }

    #[test]
    fn discover_cases_finds_nested_case_directories() {
        let root = temp_dir("discover");
        write_file(&root.join("02-two").join(CASE_FILE_NAME), "{}");
        write_file(&root.join("01-one").join(CASE_FILE_NAME), "{}");
        write_file(&root.join("03-none").join("story.twee"), "");

        let found = discover_cases(&root);
        assert_eq!(found, vec![root.join("01-one"), root.join("02-two")]);
    }
}
