use serde::{Deserialize, Serialize};

use sc_core::{
    GameState, LinkKind, Passage, ScribeError, Story, NAV_MENU_PASSAGE, POST_PASSAGE, PRE_PASSAGE,
};

use crate::sandbox::Sandbox;
use crate::template::{inline_error, render_segments, RenderedBody, RenderedLink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavState {
    Resolving(String),
    Executing,
    Templating,
    Composing,
    Emitted,
    Redirecting(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDescriptor {
    pub index: usize,
    pub text: String,
    /// Empty targets stay on the passage that offered the link.
    pub target: String,
    pub kind: LinkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Diagnostic {
    Error { passage: String, error: ScribeError },
    Log { passage: String, message: String },
}

impl Diagnostic {
    pub fn error(passage: &str, error: ScribeError) -> Self {
        Self::Error {
            passage: passage.to_string(),
            error,
        }
    }

    pub fn log(passage: &str, message: impl Into<String>) -> Self {
        Self::Log {
            passage: passage.to_string(),
            message: message.into(),
        }
    }

    pub fn as_error(&self) -> Option<&ScribeError> {
        match self {
            Self::Error { error, .. } => Some(error),
            Self::Log { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavRender {
    pub body: String,
    pub links: Vec<LinkDescriptor>,
}

/// Everything a host needs to display one emitted passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPassage {
    pub passage: String,
    pub body: String,
    pub links: Vec<LinkDescriptor>,
    pub tags: Vec<String>,
    pub last_passage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nav: Option<NavRender>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    /// Passages left through `redirect()` or a silent hop, in order.
    #[serde(default)]
    pub redirected_from: Vec<String>,
}

impl RenderedPassage {
    /// Body links followed by navigation-menu links, in index order.
    pub fn all_links(&self) -> Vec<LinkDescriptor> {
        let mut links = self.links.clone();
        if let Some(nav) = &self.nav {
            links.extend(nav.links.iter().cloned());
        }
        links
    }

    pub fn errors(&self) -> impl Iterator<Item = &ScribeError> {
        self.diagnostics.iter().filter_map(Diagnostic::as_error)
    }
}

struct Executed {
    outputs: Vec<String>,
    redirect: Option<String>,
}

/// Drives one navigation request through the passage state machine.
pub(crate) struct Navigator<'a> {
    story: &'a Story,
    state: &'a mut GameState,
    sandbox: &'a mut Sandbox,
    debug: bool,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Navigator<'a> {
    pub(crate) fn new(
        story: &'a Story,
        state: &'a mut GameState,
        sandbox: &'a mut Sandbox,
        debug: bool,
    ) -> Self {
        Self {
            story,
            state,
            sandbox,
            debug,
            diagnostics: Vec::new(),
        }
    }

    /// Diagnostics from before the request (e.g. a link action) lead the list.
    pub(crate) fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub(crate) fn navigate(mut self, target: &str) -> Result<RenderedPassage, ScribeError> {
        let story = self.story;
        let max_redirects = self.sandbox.options().limits.max_redirects;
        let mut nav_state = NavState::Resolving(target.to_string());
        let mut passage: Option<&Passage> = None;
        let mut executed = Executed {
            outputs: Vec::new(),
            redirect: None,
        };
        let mut body = RenderedBody::default();
        let mut redirected_from: Vec<String> = Vec::new();
        let mut rendered: Option<RenderedPassage> = None;
        let mut pre_text: Option<String> = None;

        loop {
            log::debug!("navigator state {:?}", nav_state);
            nav_state = match nav_state {
                NavState::Resolving(name) => {
                    let found = story
                        .passage(&name)
                        .ok_or_else(|| ScribeError::unknown_passage(&name))?;
                    self.state.passage_tags = found.tags.clone();
                    self.state.current_passage = found.name.clone();
                    passage = Some(found);
                    NavState::Executing
                }
                NavState::Executing => {
                    let current = resolved(passage)?;
                    // PrePassage runs once per request, before the first
                    // non-silent passage executes.
                    if pre_text.is_none() && !current.is_special() && !current.is_silent() {
                        pre_text = Some(
                            self.render_wrapper(PRE_PASSAGE)
                                .map(|pre| pre.text)
                                .unwrap_or_default(),
                        );
                    }
                    executed = self.execute(current);
                    match executed.redirect.take() {
                        Some(target) => NavState::Redirecting(target),
                        None => NavState::Templating,
                    }
                }
                NavState::Templating => {
                    let current = resolved(passage)?;
                    body = self.template(current, &executed.outputs);
                    self.diagnostics.append(&mut body.diagnostics);
                    if current.is_silent() {
                        let target = body
                            .links
                            .iter()
                            .find(|link| link.kind == LinkKind::Redirect)
                            .map(|link| link.target.clone())
                            .ok_or_else(|| {
                                ScribeError::navigation(
                                    "NAV_SILENT_WITHOUT_TARGET",
                                    format!(
                                        "Silent passage \"{}\" neither called redirect() nor rendered a redirect link.",
                                        current.name
                                    ),
                                )
                                .in_passage(current.name.clone())
                            })?;
                        let target = if target.is_empty() {
                            current.name.clone()
                        } else {
                            target
                        };
                        NavState::Redirecting(target)
                    } else {
                        NavState::Composing
                    }
                }
                NavState::Composing => {
                    let current = resolved(passage)?;
                    rendered = Some(self.compose(current, pre_text.take(), std::mem::take(&mut body)));
                    NavState::Emitted
                }
                NavState::Emitted => {
                    let current = resolved(passage)?;
                    if !current.is_menu() {
                        self.state.last_passage = Some(current.name.clone());
                    }
                    self.state.current_passage = current.name.clone();
                    self.state.touch(self.sandbox.now());
                    let mut out = rendered.take().ok_or_else(|| {
                        ScribeError::navigation("NAV_INTERNAL", "Passage was emitted before composing.")
                    })?;
                    out.last_passage = self.state.last_passage.clone();
                    out.diagnostics = std::mem::take(&mut self.diagnostics);
                    out.redirected_from = redirected_from;
                    log::debug!("emitted passage \"{}\"", out.passage);
                    return Ok(out);
                }
                NavState::Redirecting(target) => {
                    let from = resolved(passage)?.name.clone();
                    redirected_from.push(from.clone());
                    if redirected_from.len() > max_redirects {
                        return Err(ScribeError::navigation(
                            "NAV_REDIRECT_LOOP",
                            format!(
                                "More than {} redirects starting from \"{}\".",
                                max_redirects, redirected_from[0]
                            ),
                        )
                        .in_passage(from));
                    }
                    log::debug!("redirect \"{}\" -> \"{}\"", from, target);
                    NavState::Resolving(target)
                }
            };
        }
    }

    fn execute(&mut self, passage: &Passage) -> Executed {
        let mut outputs = Vec::with_capacity(passage.fragments.len());
        let mut redirect = None;
        for fragment in &passage.fragments {
            let report = self
                .sandbox
                .run_fragment(self.state, &fragment.source, &fragment.span);
            if self.debug {
                for line in report.logs {
                    self.diagnostics.push(Diagnostic::log(&passage.name, line));
                }
            }
            match report.error {
                Some(error) => {
                    let error = error.in_passage(passage.name.clone());
                    outputs.push(if self.debug {
                        inline_error(&error)
                    } else {
                        String::new()
                    });
                    self.diagnostics.push(Diagnostic::error(&passage.name, error));
                }
                None => outputs.push(report.output),
            }
            if report.redirect.is_some() {
                redirect = report.redirect;
                break;
            }
        }
        Executed { outputs, redirect }
    }

    fn template(&mut self, passage: &Passage, outputs: &[String]) -> RenderedBody {
        let debug = self.debug;
        let state: &GameState = self.state;
        self.sandbox.with_template(state, |template| {
            render_segments(template, passage, outputs, debug)
        })
    }

    /// Executes and renders a wrapper passage. Wrappers cannot redirect.
    fn render_wrapper(&mut self, name: &str) -> Option<RenderedBody> {
        let story = self.story;
        let wrapper = story.passage(name)?;
        let executed = self.execute(wrapper);
        if let Some(target) = executed.redirect {
            log::warn!("ignored redirect to \"{}\" from {}", target, name);
        }
        let mut body = self.template(wrapper, &executed.outputs);
        self.diagnostics.append(&mut body.diagnostics);
        Some(body)
    }

    fn compose(
        &mut self,
        passage: &Passage,
        pre_text: Option<String>,
        main: RenderedBody,
    ) -> RenderedPassage {
        let mut parts = Vec::new();
        if !passage.is_special() {
            parts.extend(pre_text);
        }
        parts.push(main.text);
        if !passage.is_special() {
            if let Some(post) = self.render_wrapper(POST_PASSAGE) {
                parts.push(post.text);
            }
        }
        let body = parts
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let links = descriptors(main.links, 0);
        let nav = if passage.name == NAV_MENU_PASSAGE {
            None
        } else {
            self.render_wrapper(NAV_MENU_PASSAGE).map(|menu| NavRender {
                body: menu.text,
                links: descriptors(menu.links, links.len()),
            })
        };

        RenderedPassage {
            passage: passage.name.clone(),
            body,
            links,
            tags: passage.tags.clone(),
            last_passage: None,
            nav,
            diagnostics: Vec::new(),
            redirected_from: Vec::new(),
        }
    }
}

fn resolved(passage: Option<&Passage>) -> Result<&Passage, ScribeError> {
    passage.ok_or_else(|| {
        ScribeError::navigation("NAV_INTERNAL", "Navigator left Resolving without a passage.")
    })
}

fn descriptors(links: Vec<RenderedLink>, offset: usize) -> Vec<LinkDescriptor> {
    links
        .into_iter()
        .enumerate()
        .map(|(index, link)| LinkDescriptor {
            index: offset + index,
            text: link.text,
            target: link.target,
            kind: link.kind,
            action: link.action,
        })
        .collect()
}
