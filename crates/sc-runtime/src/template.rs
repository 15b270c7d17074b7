use sc_core::{ErrorKind, Link, LinkKind, Passage, ScValue, ScribeError, Segment, SourceSpan};

use crate::navigator::Diagnostic;
use crate::sandbox::TemplateScope;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RenderedLink {
    pub text: String,
    pub target: String,
    pub kind: LinkKind,
    pub action: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct RenderedBody {
    pub text: String,
    pub links: Vec<RenderedLink>,
    pub diagnostics: Vec<Diagnostic>,
}

struct Renderer<'a, 't> {
    passage: &'a Passage,
    fragment_outputs: &'a [String],
    debug: bool,
    template: &'t mut TemplateScope,
    out: RenderedBody,
}

/// Substitutes fragment output, expressions, conditionals and loops. Links
/// are collected in render order and left out of the body text.
pub(crate) fn render_segments(
    template: &mut TemplateScope,
    passage: &Passage,
    fragment_outputs: &[String],
    debug: bool,
) -> RenderedBody {
    let mut renderer = Renderer {
        passage,
        fragment_outputs,
        debug,
        template,
        out: RenderedBody::default(),
    };
    renderer.render(&passage.segments);
    renderer.out.text = tidy(&renderer.out.text);
    renderer.out
}

impl Renderer<'_, '_> {
    fn render(&mut self, segments: &[Segment]) {
        for segment in segments {
            match segment {
                Segment::Text { value } => self.out.text.push_str(value),
                Segment::Expression { source, span } => match self.template.eval(source, span) {
                    Ok(value) => self.out.text.push_str(&value.to_text()),
                    Err(error) => self.fail(error),
                },
                Segment::Fragment { index } => {
                    if let Some(output) = self.fragment_outputs.get(*index) {
                        self.out.text.push_str(output);
                    }
                }
                Segment::Link { index } => {
                    if let Some(link) = self.passage.links.get(*index) {
                        self.link(link);
                    }
                }
                Segment::Conditional { branches } => {
                    for branch in branches {
                        let taken = match &branch.condition {
                            None => true,
                            Some(condition) => self.truthy(condition, &branch.span),
                        };
                        if taken {
                            self.render(&branch.body);
                            break;
                        }
                    }
                }
                Segment::Loop {
                    binding,
                    iterable,
                    span,
                    body,
                } => self.render_loop(binding, iterable, span, body),
            }
        }
    }

    fn truthy(&mut self, condition: &str, span: &SourceSpan) -> bool {
        match self.template.eval(condition, span) {
            Ok(value) => value.is_truthy(),
            Err(error) => {
                self.fail(error);
                false
            }
        }
    }

    fn render_loop(&mut self, binding: &str, iterable: &str, span: &SourceSpan, body: &[Segment]) {
        let items = match self.template.eval(iterable, span) {
            Ok(ScValue::Array(items)) => items,
            Ok(ScValue::Map(entries)) => entries.into_keys().map(ScValue::String).collect(),
            Ok(ScValue::Null) => Vec::new(),
            Ok(other) => {
                self.fail(ScribeError::with_span(
                    ErrorKind::SandboxRuntime,
                    "SANDBOX_NOT_ITERABLE",
                    format!("Cannot loop over a {}.", other.type_name()),
                    span.clone(),
                ));
                return;
            }
            Err(error) => {
                self.fail(error);
                return;
            }
        };
        for item in &items {
            let mark = self.template.bind(binding, item);
            self.render(body);
            self.template.rewind(mark);
        }
    }

    fn link(&mut self, link: &Link) {
        let text = interpolate(self.template, &link.text, &link.span);
        let target = interpolate(self.template, &link.target, &link.span);
        match (text, target) {
            (Ok(text), Ok(target)) => self.out.links.push(RenderedLink {
                text,
                target: target.trim().to_string(),
                kind: link.kind,
                action: link.action.clone(),
            }),
            (Err(error), _) | (_, Err(error)) => self.fail(error),
        }
    }

    fn fail(&mut self, error: ScribeError) {
        let error = error.in_passage(self.passage.name.clone());
        log::warn!("template error in \"{}\": {}", self.passage.name, error);
        if self.debug {
            self.out.text.push_str(&inline_error(&error));
        }
        self.out.diagnostics.push(Diagnostic::error(&self.passage.name, error));
    }
}

pub(crate) fn inline_error(error: &ScribeError) -> String {
    format!("[error: {}]", error)
}

/// Evaluates `{{ … }}` spans inside link text or targets.
fn interpolate(
    template: &mut TemplateScope,
    raw: &str,
    span: &SourceSpan,
) -> Result<String, ScribeError> {
    let mut out = String::new();
    let mut rest = raw;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let value = template.eval(after[..end].trim(), span)?;
        out.push_str(&value.to_text());
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Trims the body and collapses runs of blank lines left by statements.
pub(crate) fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.trim().lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(line);
    }
    out
}
