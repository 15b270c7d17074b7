use std::path::PathBuf;

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

pub fn stories_root() -> PathBuf {
    workspace_root().join("stories")
}

pub fn story_dir(name: &str) -> PathBuf {
    stories_root().join(name)
}

pub fn testcase_path(name: &str) -> PathBuf {
    story_dir(name).join("testcase.json")
}

/// Story directory names that carry a `testcase.json`, sorted.
pub fn story_names_with_cases() -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(stories_root()) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().join("testcase.json").is_file())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
