mod registry;
mod save;

use std::collections::BTreeMap;

use sc_core::{GameState, ProjectConfig, ScribeError, Story, PROJECT_FILE};
use sc_runtime::{LinkDescriptor, Session, SessionOptions};

pub use registry::{SessionId, SessionRegistry};
pub use save::{JsonFileSaveStore, MemorySaveStore, SavePayload, SaveStore, SlotId, SAVE_SCHEMA};

#[derive(Debug, Clone, Default)]
pub struct CreateSessionOptions {
    /// Story files keyed by relative path; `project.json` is optional.
    pub story_files: BTreeMap<String, String>,
    pub session: SessionOptions,
}

#[derive(Debug, Clone)]
pub struct ResumeSessionOptions {
    pub story_files: BTreeMap<String, String>,
    pub state: GameState,
    pub links: Vec<LinkDescriptor>,
    pub session: SessionOptions,
}

/// Reads `project.json` (defaults when absent) and parses every story file.
pub fn load_story(files: &BTreeMap<String, String>) -> Result<Story, ScribeError> {
    let config = match files.get(PROJECT_FILE) {
        Some(raw) => ProjectConfig::from_json(raw)?,
        None => ProjectConfig::default(),
    };
    sc_parser::build_story(config, files)
}

pub fn create_session(options: CreateSessionOptions) -> Result<Session, ScribeError> {
    let story = load_story(&options.story_files)?;
    if !story.contains(&story.config.starting_passage) {
        return Err(ScribeError::config(
            "API_STARTING_PASSAGE_NOT_FOUND",
            format!(
                "Starting passage \"{}\" is not defined.",
                story.config.starting_passage
            ),
        ));
    }
    Ok(Session::new(story, options.session))
}

pub fn resume_session(options: ResumeSessionOptions) -> Result<Session, ScribeError> {
    let story = load_story(&options.story_files)?;
    if !story.contains(&options.state.current_passage) {
        return Err(ScribeError::unknown_passage(&options.state.current_passage));
    }
    Ok(Session::resume(
        story,
        options.state,
        options.links,
        options.session,
    ))
}

#[cfg(test)]
pub(crate) mod api_test_support {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use sc_runtime::SessionOptions;

    pub(crate) fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(path, source)| ((*path).to_string(), (*source).to_string()))
            .collect()
    }

    pub(crate) fn seeded() -> SessionOptions {
        SessionOptions {
            random_seed: Some(3),
            ..SessionOptions::default()
        }
    }

    pub(crate) fn temp_path(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        std::env::temp_dir().join(format!("scribe-api-{}-{}", name, nanos))
    }
}
