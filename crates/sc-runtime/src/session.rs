use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use sc_core::{
    DuplicatePassage, ErrorKind, GameState, LinkKind, Passage, PassageTable, ScValue, ScribeError,
    SourceSpan, Story,
};

use crate::navigator::{Diagnostic, LinkDescriptor, Navigator, RenderedPassage};
use crate::sandbox::{Capability, Sandbox, SandboxOptions, CAPABILITIES};

/// Host-owned switches; none of these are read from story files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionOptions {
    pub debug: bool,
    pub random_seed: Option<u32>,
    pub fixed_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugView<'a> {
    pub state: &'a GameState,
    pub passages: &'a PassageTable,
    pub duplicates: &'a [DuplicatePassage],
    pub capabilities: &'static [Capability],
}

/// One player's (or one preview's) exclusive game: story, state and sandbox.
#[derive(Debug, Clone)]
pub struct Session {
    story: Story,
    state: GameState,
    sandbox: Sandbox,
    options: SessionOptions,
    links: Vec<LinkDescriptor>,
}

/// Working copy of a session's mutable parts. A request edits the draft and
/// the session adopts it only when the render succeeds.
struct Draft {
    state: GameState,
    sandbox: Sandbox,
    diagnostics: Vec<Diagnostic>,
}

fn sandbox_options(story: &Story, options: &SessionOptions) -> SandboxOptions {
    SandboxOptions {
        fixed_time: options.fixed_time,
        random_seed: options.random_seed,
        ..SandboxOptions::from_config(&story.config)
    }
}

impl Session {
    pub fn new(story: Story, options: SessionOptions) -> Self {
        let sandbox = Sandbox::new(sandbox_options(&story, &options));
        let state = GameState::new(&story.config, sandbox.now());
        log::info!("session created for \"{}\"", story.config.title);
        Self {
            story,
            state,
            sandbox,
            options,
            links: Vec::new(),
        }
    }

    /// Rebuilds a session from persisted state and the link table of its last render.
    pub fn resume(
        story: Story,
        state: GameState,
        links: Vec<LinkDescriptor>,
        options: SessionOptions,
    ) -> Self {
        let sandbox = Sandbox::new(sandbox_options(&story, &options));
        Self {
            story,
            state,
            sandbox,
            options,
            links,
        }
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Links offered by the last render, body first then navigation menu.
    pub fn links(&self) -> &[LinkDescriptor] {
        &self.links
    }

    pub fn start(&mut self) -> Result<RenderedPassage, ScribeError> {
        let start = self.story.config.starting_passage.clone();
        self.goto(&start)
    }

    /// On failure the session is left exactly as it was before the call.
    pub fn goto(&mut self, passage: &str) -> Result<RenderedPassage, ScribeError> {
        let draft = self.draft();
        self.commit(draft, passage)
    }

    /// Follows a link from the last render. Action scripts run once, before
    /// navigation; a `redirect()` inside them replaces the link target.
    pub fn choose(&mut self, index: usize) -> Result<RenderedPassage, ScribeError> {
        let link = self
            .links
            .iter()
            .find(|link| link.index == index)
            .cloned()
            .ok_or_else(|| {
                ScribeError::navigation(
                    "NAV_INVALID_LINK",
                    format!("No link with index {} is on offer.", index),
                )
            })?;
        if link.kind == LinkKind::External {
            return Err(ScribeError::navigation(
                "NAV_EXTERNAL_LINK",
                format!("Link \"{}\" leaves the story: {}", link.text, link.target),
            ));
        }

        let mut draft = self.draft();
        let mut target = if link.target.is_empty() {
            draft.state.current_passage.clone()
        } else {
            link.target.clone()
        };
        if let Some(action) = &link.action {
            let origin = draft.state.current_passage.clone();
            let report =
                draft
                    .sandbox
                    .run_fragment(&mut draft.state, action, &SourceSpan::synthetic());
            if self.options.debug {
                for line in &report.logs {
                    draft.diagnostics.push(Diagnostic::log(&origin, line.clone()));
                }
            }
            if let Some(error) = report.error {
                draft
                    .diagnostics
                    .push(Diagnostic::error(&origin, error.in_passage(origin.clone())));
            }
            if let Some(redirect) = report.redirect {
                target = redirect;
            }
        }
        self.commit(draft, &target)
    }

    /// Stores a player-entered value at a state path, then renders `next`
    /// or re-renders the current passage.
    pub fn submit_input(
        &mut self,
        path: &str,
        value: ScValue,
        next: Option<&str>,
    ) -> Result<RenderedPassage, ScribeError> {
        let mut draft = self.draft();
        draft
            .state
            .set_path(path, value)
            .map_err(|message| ScribeError::navigation("INPUT_INVALID_PATH", message))?;
        let target = next
            .map(ToString::to_string)
            .unwrap_or_else(|| draft.state.current_passage.clone());
        self.commit(draft, &target)
    }

    /// Applies several path updates at once; nothing is applied if any fails.
    pub fn apply_updates(&mut self, updates: &BTreeMap<String, ScValue>) -> Result<(), ScribeError> {
        let mut next = self.state.clone();
        for (path, value) in updates {
            next.set_path(path, value.clone())
                .map_err(|message| ScribeError::navigation("INPUT_INVALID_PATH", message))?;
        }
        self.state = next;
        Ok(())
    }

    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    /// Replaces the live state wholesale, e.g. after loading a save.
    pub fn restore(&mut self, state: GameState) {
        self.state = state;
        self.links.clear();
        log::info!("session state restored at \"{}\"", self.state.current_passage);
    }

    /// Swaps in a freshly loaded story; the game state is kept.
    pub fn reload(&mut self, story: Story) {
        let rng_state = self.sandbox.rng_state();
        self.sandbox = Sandbox::new(sandbox_options(&story, &self.options));
        self.sandbox.set_rng_state(rng_state);
        self.story = story;
        self.links.clear();
        log::info!("story reloaded with {} passages", self.story.passages.len());
    }

    pub fn reset(&mut self) {
        self.state = GameState::new(&self.story.config, self.sandbox.now());
        self.links.clear();
    }

    pub fn debug_view(&self) -> Result<DebugView<'_>, ScribeError> {
        self.require_debug()?;
        Ok(DebugView {
            state: &self.state,
            passages: &self.story.passages,
            duplicates: &self.story.duplicates,
            capabilities: CAPABILITIES,
        })
    }

    pub fn passage_view(&self, name: &str) -> Result<&Passage, ScribeError> {
        self.require_debug()?;
        self.story
            .passage(name)
            .ok_or_else(|| ScribeError::unknown_passage(name))
    }

    fn draft(&self) -> Draft {
        Draft {
            state: self.state.clone(),
            sandbox: self.sandbox.clone(),
            diagnostics: Vec::new(),
        }
    }

    fn commit(&mut self, draft: Draft, target: &str) -> Result<RenderedPassage, ScribeError> {
        let Draft {
            mut state,
            mut sandbox,
            diagnostics,
        } = draft;
        let rendered = Navigator::new(&self.story, &mut state, &mut sandbox, self.options.debug)
            .with_diagnostics(diagnostics)
            .navigate(target)?;
        self.state = state;
        self.sandbox = sandbox;
        self.links = rendered.all_links();
        Ok(rendered)
    }

    fn require_debug(&self) -> Result<(), ScribeError> {
        if self.options.debug {
            Ok(())
        } else {
            Err(ScribeError::new(
                ErrorKind::Access,
                "DEBUG_DISABLED",
                "Debug views need a session started in debug mode.",
            ))
        }
    }
}
