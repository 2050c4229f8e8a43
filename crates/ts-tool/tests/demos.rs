use std::path::PathBuf;

use ts_tool::{assert_case, discover_cases, CASE_FILE_NAME};

fn demos_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("demos")
}

#[test]
fn every_demo_case_passes() {
    let scenarios = discover_cases(&demos_root());
    assert!(scenarios.len() >= 3, "expected demo scenarios, found {:?}", scenarios);

    for scenario in scenarios {
        if let Err(error) = assert_case(&scenario, &scenario.join(CASE_FILE_NAME)) {
            panic!("demo {} failed: {}", scenario.display(), error);
        }
    }
}
