use std::path::Path;

use sc_api::{create_session, resume_session, CreateSessionOptions, ResumeSessionOptions};
use sc_core::{ScValue, ScribeError};
use sc_runtime::{RenderedPassage, Session, SessionOptions};

use crate::{
    emit_render, load_agent_state, load_story_by_ref, save_agent_state, AgentState, LoadedStory,
    AGENT_STATE_SCHEMA,
};

pub(crate) fn create_session_for_story(
    story: &LoadedStory,
    options: SessionOptions,
) -> Result<Session, ScribeError> {
    create_session(CreateSessionOptions {
        story_files: story.files.clone(),
        session: options,
    })
}

pub(crate) fn resume_session_for_state(
    story: &LoadedStory,
    state: &AgentState,
) -> Result<Session, ScribeError> {
    resume_session(ResumeSessionOptions {
        story_files: story.files.clone(),
        state: state.state.clone(),
        links: state.links.clone(),
        session: SessionOptions {
            debug: state.debug,
            ..SessionOptions::default()
        },
    })
}

pub(crate) fn load_session_from_state(
    path: &Path,
) -> Result<(AgentState, Session), ScribeError> {
    let state = load_agent_state(path)?;
    let story = load_story_by_ref(&state.story_ref)?;
    let session = resume_session_for_state(&story, &state)?;
    Ok((state, session))
}

pub(crate) fn save_session_state(
    path: &Path,
    session: &Session,
    story_ref: &str,
) -> Result<(), ScribeError> {
    let state = AgentState {
        schema_version: AGENT_STATE_SCHEMA.to_string(),
        story_ref: story_ref.to_string(),
        debug: session.options().debug,
        state: session.snapshot(),
        links: session.links().to_vec(),
    };
    save_agent_state(path, &state)
}

pub(crate) fn emit_render_with_saved_state(
    session: &Session,
    rendered: &RenderedPassage,
    state_out: &str,
    story_ref: &str,
) -> Result<i32, ScribeError> {
    save_session_state(Path::new(state_out), session, story_ref)?;
    emit_render(rendered, Some(state_out))?;
    Ok(0)
}

/// Reads `raw` as a JSON literal, falling back to plain text.
pub(crate) fn parse_input_value(raw: &str) -> ScValue {
    serde_json::from_str(raw).unwrap_or_else(|_| ScValue::String(raw.to_string()))
}

#[cfg(test)]
mod session_ops_tests {
    use super::*;
    use crate::cli_test_support::*;
    use crate::load_story_by_dir;

    #[test]
    fn input_values_prefer_json_literals() {
        assert_eq!(parse_input_value("true"), ScValue::Bool(true));
        assert_eq!(parse_input_value("3"), ScValue::Number(3.0));
        assert_eq!(parse_input_value("\"quoted\""), ScValue::from("quoted"));
        assert_eq!(parse_input_value("Ada"), ScValue::from("Ada"));
    }

    #[test]
    fn saved_state_resumes_with_the_offered_links() {
        let story = load_story_by_dir(&story_dir("01-basic-links")).expect("story");
        let mut session =
            create_session_for_story(&story, SessionOptions::default()).expect("session");
        let rendered = session.start().expect("start");

        let path = temp_path("session-ops").join("state.json");
        emit_render_with_saved_state(&session, &rendered, path.to_string_lossy().as_ref(), &story.id)
            .expect("emit");

        let (state, mut resumed) = load_session_from_state(&path).expect("resume");
        assert_eq!(state.story_ref, story.id);
        assert_eq!(resumed.links().len(), 3);
        assert_eq!(resumed.choose(0).expect("choose").passage, "north");
    }
}
