use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use sc_core::{ScribeError, PROJECT_FILE};
use walkdir::WalkDir;

use crate::{CliFailure, LoadedStory, STORY_REF_PREFIX};

pub(crate) fn load_story_by_dir(story_dir: &str) -> Result<LoadedStory, ScribeError> {
    let story_root = resolve_story_dir(story_dir)?;
    let files = read_story_files_from_dir(&story_root)?;
    Ok(LoadedStory {
        id: make_story_ref(&story_root),
        files,
    })
}

pub(crate) fn load_story_by_ref(story_ref: &str) -> Result<LoadedStory, ScribeError> {
    let Some(raw) = story_ref.strip_prefix(STORY_REF_PREFIX) else {
        return Err(ScribeError::config(
            "CLI_SOURCE_REF_INVALID",
            format!("Unsupported story ref: {}", story_ref),
        ));
    };
    load_story_by_dir(raw)
}

pub(crate) fn resolve_story_dir(story_dir: &str) -> Result<PathBuf, ScribeError> {
    let path = PathBuf::from(story_dir);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(CliFailure::SourcePath.wrap())?
            .join(path)
    };

    if !absolute.exists() {
        return Err(ScribeError::io(
            "CLI_SOURCE_NOT_FOUND",
            format!("story-dir does not exist: {}", absolute.display()),
        ));
    }

    if !absolute.is_dir() {
        return Err(ScribeError::io(
            "CLI_SOURCE_NOT_DIR",
            format!("story-dir is not a directory: {}", absolute.display()),
        ));
    }

    Ok(absolute)
}

/// Every `.tgame` file below the root plus the root `project.json`.
pub(crate) fn read_story_files_from_dir(
    story_dir: &Path,
) -> Result<BTreeMap<String, String>, ScribeError> {
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
        let relative = path
            .strip_prefix(story_dir)
            .map_err(CliFailure::SourceScan.wrap())?
            .to_string_lossy()
            .replace('\\', "/");

        if !(sc_parser::is_story_file(&relative) || relative == PROJECT_FILE) {
            continue;
        }

        let content = fs::read_to_string(path).map_err(CliFailure::SourceRead.wrap())?;
        files.insert(relative, content);
    }

    if !files.keys().any(|path| sc_parser::is_story_file(path)) {
        return Err(ScribeError::io(
            "CLI_SOURCE_EMPTY",
            format!("No .tgame files under {}", story_dir.display()),
        ));
    }

    Ok(files)
}

pub(crate) fn make_story_ref(story_dir: &Path) -> String {
    format!("{}{}", STORY_REF_PREFIX, story_dir.display())
}
