use std::fs;
use std::path::Path;

use sc_core::ScribeError;

use crate::{AGENT_STATE_SCHEMA, AgentState, CliFailure};

pub(crate) fn save_agent_state(path: &Path, state: &AgentState) -> Result<(), ScribeError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(CliFailure::StateWrite.wrap())?;

    let payload = serde_json::to_string(state).map_err(CliFailure::JsonEncode.wrap())?;
    fs::write(path, payload).map_err(CliFailure::StateWrite.wrap())
}

pub(crate) fn load_agent_state(path: &Path) -> Result<AgentState, ScribeError> {
    if !path.exists() {
        return Err(ScribeError::io(
            "CLI_STATE_NOT_FOUND",
            format!("State file does not exist: {}", path.display()),
        ));
    }

    let raw = fs::read_to_string(path).map_err(CliFailure::StateRead.wrap())?;

    let state: AgentState = serde_json::from_str(&raw).map_err(CliFailure::StateInvalid.wrap())?;

    if state.schema_version != AGENT_STATE_SCHEMA {
        return Err(ScribeError::serialization(
            "CLI_STATE_SCHEMA",
            format!("Unsupported agent state schema: {}", state.schema_version),
        ));
    }

    Ok(state)
}
