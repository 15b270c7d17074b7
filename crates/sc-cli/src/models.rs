use std::collections::BTreeMap;

use sc_api::SaveStore;
use sc_core::GameState;
use sc_runtime::LinkDescriptor;
use serde::{Deserialize, Serialize};

pub(crate) const AGENT_STATE_SCHEMA: &str = "scribe-agent-state.v1";
pub(crate) const STORY_REF_PREFIX: &str = "story-dir:";
pub(crate) const DEFAULT_SAVES_DIR: &str = ".scribe/saves";

#[derive(Debug, Clone)]
pub(crate) struct LoadedStory {
    pub(crate) id: String,
    pub(crate) files: BTreeMap<String, String>,
}

/// What an agent command hands to the next one: the game state plus the
/// links the last render offered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AgentState {
    pub(crate) schema_version: String,
    pub(crate) story_ref: String,
    #[serde(default)]
    pub(crate) debug: bool,
    pub(crate) state: GameState,
    #[serde(default)]
    pub(crate) links: Vec<LinkDescriptor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineCommandAction {
    NotHandled,
    Continue,
    Rerender,
    Quit,
}

pub(crate) struct LineCommandContext<'a> {
    pub(crate) story: &'a LoadedStory,
    pub(crate) store: &'a dyn SaveStore,
}
