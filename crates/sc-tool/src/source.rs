use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use sc_core::PROJECT_FILE;
use walkdir::WalkDir;

use crate::{ScToolError, TestCase, TESTCASE_SCHEMA_V1};

/// Collects `.tgame` files and the root `project.json`, keyed by relative path.
pub fn read_story_files_from_dir(
    story_dir: &Path,
) -> Result<BTreeMap<String, String>, ScToolError> {
    let mut files = BTreeMap::new();

    for entry in WalkDir::new(story_dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Ok(relative) = path.strip_prefix(story_dir) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if !(sc_parser::is_story_file(&relative) || relative == PROJECT_FILE) {
            continue;
        }

        let content = fs::read_to_string(path).map_err(|source| ScToolError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        files.insert(relative, content);
    }

    if !files.keys().any(|path| sc_parser::is_story_file(path)) {
        return Err(ScToolError::SourceEmpty {
            path: story_dir.to_path_buf(),
        });
    }

    Ok(files)
}

pub fn read_test_case(case_path: &Path) -> Result<TestCase, ScToolError> {
    let raw = fs::read_to_string(case_path).map_err(|source| ScToolError::ReadFile {
        path: case_path.to_path_buf(),
        source,
    })?;
    let parsed: TestCase = serde_json::from_str(&raw).map_err(|source| ScToolError::ParseCase {
        path: case_path.to_path_buf(),
        source,
    })?;

    if parsed.schema_version != TESTCASE_SCHEMA_V1 {
        return Err(ScToolError::InvalidSchemaVersion {
            expected: TESTCASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }

    Ok(parsed)
}
