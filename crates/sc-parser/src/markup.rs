use std::sync::OnceLock;

use regex::Regex;
use sc_core::{
    Branch, Fragment, Link, Passage, ScribeError, Segment, SourceLocation, SourceSpan,
};

use crate::lexer::{advance_location, tokenize, Token};
use crate::link::parse_link;

pub const PASSAGE_MARKER: &str = "::";

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("tag regex must compile"))
}

fn identifier_regex() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex must compile")
    })
}

#[derive(Debug)]
struct RawPassage<'a> {
    name: String,
    tags: Vec<String>,
    header_line: usize,
    header_len: usize,
    lines: Vec<&'a str>,
}

pub fn parse_source(source: &str, source_file: Option<&str>) -> Result<Vec<Passage>, ScribeError> {
    let mut passages = Vec::new();
    for raw in split_passages(source)? {
        let passage = build_passage(raw, source_file)?;
        log::debug!(
            "parsed passage \"{}\" ({} fragments, {} links)",
            passage.name,
            passage.fragments.len(),
            passage.links.len()
        );
        passages.push(passage);
    }
    Ok(passages)
}

fn split_passages(source: &str) -> Result<Vec<RawPassage<'_>>, ScribeError> {
    let mut passages = Vec::new();
    let mut current: Option<RawPassage<'_>> = None;
    let mut ignored_preamble = false;

    for (index, line) in source.lines().enumerate() {
        let line_no = index + 1;
        if let Some(header) = line.strip_prefix(PASSAGE_MARKER) {
            if let Some(done) = current.take() {
                passages.push(done);
            }
            let (name, tags) = parse_header(header, line_no, line.chars().count())?;
            current = Some(RawPassage {
                name,
                tags,
                header_line: line_no,
                header_len: line.chars().count(),
                lines: Vec::new(),
            });
            continue;
        }
        match current.as_mut() {
            Some(passage) => passage.lines.push(line),
            None => ignored_preamble |= !line.trim().is_empty(),
        }
    }
    if let Some(done) = current {
        passages.push(done);
    }
    if ignored_preamble {
        log::warn!("ignored text before the first passage header");
    }
    Ok(passages)
}

fn parse_header(
    header: &str,
    line: usize,
    width: usize,
) -> Result<(String, Vec<String>), ScribeError> {
    let span = SourceSpan::new(
        SourceLocation { line, column: 1 },
        SourceLocation {
            line,
            column: width + 1,
        },
    );
    let (name, tag_part) = match header.find('#') {
        Some(index) => (header[..index].trim(), &header[index..]),
        None => (header.trim(), ""),
    };
    if name.is_empty() {
        return Err(ScribeError::parse(
            "PARSE_EMPTY_PASSAGE_NAME",
            "Passage header must name the passage.",
            span,
        ));
    }

    let mut tags: Vec<String> = Vec::new();
    for token in tag_part.split_whitespace() {
        if !token.starts_with('#') {
            return Err(ScribeError::parse(
                "PARSE_TAG_TOKEN",
                format!("Tag token \"{}\" must start with '#'.", token),
                span,
            )
            .in_passage(name));
        }
        for tag in token.split('#').filter(|tag| !tag.is_empty()) {
            if !tag_regex().is_match(tag) {
                return Err(ScribeError::parse(
                    "PARSE_TAG_TOKEN",
                    format!("Tag \"{}\" contains unsupported characters.", tag),
                    span,
                )
                .in_passage(name));
            }
            if !tags.iter().any(|existing| existing == tag) {
                tags.push(tag.to_string());
            }
        }
    }
    Ok((name.to_string(), tags))
}

fn build_passage(raw: RawPassage<'_>, source_file: Option<&str>) -> Result<Passage, ScribeError> {
    let joined = raw.lines.join("\n");
    let body_start = SourceLocation {
        line: raw.header_line + 1,
        column: 1,
    };
    let leading = joined.len() - joined.trim_start().len();
    let start = advance_location(&body_start, &joined[..leading]);
    let body = joined.trim();

    let name = raw.name;
    let (segments, fragments, links) =
        parse_body(body, start).map_err(|error| error.in_passage(name.clone()))?;

    Ok(Passage {
        name,
        tags: raw.tags,
        segments,
        fragments,
        links,
        span: SourceSpan::new(
            SourceLocation {
                line: raw.header_line,
                column: 1,
            },
            SourceLocation {
                line: raw.header_line,
                column: raw.header_len + 1,
            },
        ),
        source_file: source_file.map(ToString::to_string),
    })
}

enum OpenBlock {
    If {
        branches: Vec<Branch>,
        condition: Option<String>,
        span: SourceSpan,
        body: Vec<Segment>,
        has_else: bool,
    },
    For {
        binding: String,
        iterable: String,
        span: SourceSpan,
        body: Vec<Segment>,
    },
}

struct SegmentBuilder {
    root: Vec<Segment>,
    stack: Vec<OpenBlock>,
}

impl SegmentBuilder {
    fn body(&mut self) -> &mut Vec<Segment> {
        match self.stack.last_mut() {
            Some(OpenBlock::If { body, .. }) | Some(OpenBlock::For { body, .. }) => body,
            None => &mut self.root,
        }
    }

    fn push(&mut self, segment: Segment) {
        let body = self.body();
        if let (Segment::Text { value }, Some(Segment::Text { value: previous })) =
            (&segment, body.last_mut())
        {
            previous.push_str(value);
            return;
        }
        body.push(segment);
    }

    fn statement(&mut self, source: &str, span: SourceSpan) -> Result<(), ScribeError> {
        let (keyword, rest) = match source.split_once(char::is_whitespace) {
            Some((keyword, rest)) => (keyword, rest.trim()),
            None => (source, ""),
        };
        match keyword {
            "if" => {
                let condition = require_expression(rest, "if", &span)?;
                self.stack.push(OpenBlock::If {
                    branches: Vec::new(),
                    condition: Some(condition),
                    span,
                    body: Vec::new(),
                    has_else: false,
                });
            }
            "elif" | "else" => {
                let next_condition = if keyword == "elif" {
                    Some(require_expression(rest, "elif", &span)?)
                } else {
                    None
                };
                let Some(OpenBlock::If {
                    branches,
                    condition,
                    span: branch_span,
                    body,
                    has_else,
                }) = self.stack.last_mut()
                else {
                    return Err(unexpected(keyword, span));
                };
                if *has_else {
                    return Err(unexpected(keyword, span));
                }
                branches.push(Branch {
                    condition: condition.take(),
                    span: branch_span.clone(),
                    body: std::mem::take(body),
                });
                *condition = next_condition;
                *branch_span = span;
                *has_else = keyword == "else";
            }
            "endif" => match self.stack.pop() {
                Some(OpenBlock::If {
                    mut branches,
                    condition,
                    span: branch_span,
                    body,
                    ..
                }) => {
                    branches.push(Branch {
                        condition,
                        span: branch_span,
                        body,
                    });
                    self.push(Segment::Conditional { branches });
                }
                other => {
                    self.stack.extend(other);
                    return Err(unexpected(keyword, span));
                }
            },
            "for" => {
                let (binding, iterable) = rest
                    .split_once(" in ")
                    .map(|(binding, iterable)| (binding.trim(), iterable.trim()))
                    .filter(|(binding, iterable)| {
                        identifier_regex().is_match(binding) && !iterable.is_empty()
                    })
                    .ok_or_else(|| {
                        ScribeError::parse(
                            "PARSE_FOR_SYNTAX",
                            "Expected \"{% for name in expression %}\".",
                            span.clone(),
                        )
                    })?;
                self.stack.push(OpenBlock::For {
                    binding: binding.to_string(),
                    iterable: iterable.to_string(),
                    span,
                    body: Vec::new(),
                });
            }
            "endfor" => match self.stack.pop() {
                Some(OpenBlock::For {
                    binding,
                    iterable,
                    span: loop_span,
                    body,
                }) => self.push(Segment::Loop {
                    binding,
                    iterable,
                    span: loop_span,
                    body,
                }),
                other => {
                    self.stack.extend(other);
                    return Err(unexpected(keyword, span));
                }
            },
            _ => {
                return Err(ScribeError::parse(
                    "PARSE_UNKNOWN_STATEMENT",
                    format!("Unknown template statement \"{}\".", keyword),
                    span,
                ))
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<Segment>, ScribeError> {
        match self.stack.last() {
            Some(OpenBlock::If { span, .. }) => Err(unclosed("if", "endif", span)),
            Some(OpenBlock::For { span, .. }) => Err(unclosed("for", "endfor", span)),
            None => Ok(self.root),
        }
    }
}

fn require_expression(rest: &str, keyword: &str, span: &SourceSpan) -> Result<String, ScribeError> {
    if rest.is_empty() {
        return Err(ScribeError::parse(
            "PARSE_MISSING_CONDITION",
            format!("\"{}\" needs a condition.", keyword),
            span.clone(),
        ));
    }
    Ok(rest.to_string())
}

fn unexpected(keyword: &str, span: SourceSpan) -> ScribeError {
    ScribeError::parse(
        "PARSE_UNEXPECTED_STATEMENT",
        format!("\"{}\" does not match an open block.", keyword),
        span,
    )
}

fn unclosed(opened: &str, expected: &str, span: &SourceSpan) -> ScribeError {
    ScribeError::parse(
        "PARSE_UNCLOSED_BLOCK",
        format!("\"{}\" block is missing \"{}\".", opened, expected),
        span.clone(),
    )
}

type ParsedBody = (Vec<Segment>, Vec<Fragment>, Vec<Link>);

pub(crate) fn parse_body(body: &str, start: SourceLocation) -> Result<ParsedBody, ScribeError> {
    let mut builder = SegmentBuilder {
        root: Vec::new(),
        stack: Vec::new(),
    };
    let mut fragments = Vec::new();
    let mut links = Vec::new();

    for token in tokenize(body, start)? {
        match token {
            Token::Text(value) => builder.push(Segment::Text { value }),
            Token::Script { source, form, span } => {
                let index = fragments.len();
                fragments.push(Fragment {
                    index,
                    source,
                    form,
                    span,
                });
                builder.push(Segment::Fragment { index });
            }
            Token::Expression { source, span } => {
                builder.push(Segment::Expression { source, span });
            }
            Token::Statement { source, span } => builder.statement(&source, span)?,
            Token::Link { inner, span } => {
                let index = links.len();
                links.push(parse_link(&inner, span)?);
                builder.push(Segment::Link { index });
            }
        }
    }

    Ok((builder.finish()?, fragments, links))
}

#[cfg(test)]
mod markup_tests {
    use super::*;
    use sc_core::{FragmentForm, LinkKind};

    fn only(source: &str) -> Passage {
        let mut passages = parse_source(source, None).expect("parse should pass");
        assert_eq!(passages.len(), 1);
        passages.remove(0)
    }

    #[test]
    fn header_yields_name_and_tags() {
        let passage = only(":: Inventory #menu #ui#menu\nYou carry things.");
        assert_eq!(passage.name, "Inventory");
        assert_eq!(passage.tags, vec!["menu", "ui"]);
        assert!(passage.is_menu());
        assert_eq!(passage.span.start.line, 1);
    }

    #[test]
    fn body_runs_until_next_header_and_is_trimmed() {
        let passages =
            parse_source("ignored\n:: A\n\nHi\n[[Go->B]]\n\n:: B\nThere\n", Some("story.tgame"))
                .expect("parse");
        assert_eq!(passages.len(), 2);
        let a = &passages[0];
        assert_eq!(
            a.segments,
            vec![
                Segment::Text {
                    value: "Hi\n".to_string()
                },
                Segment::Link { index: 0 }
            ]
        );
        assert_eq!(a.links[0].span.start, SourceLocation { line: 5, column: 1 });
        assert_eq!(a.source_file.as_deref(), Some("story.tgame"));
        assert_eq!(
            passages[1].segments,
            vec![Segment::Text {
                value: "There".to_string()
            }]
        );
    }

    #[test]
    fn fragments_are_indexed_in_source_order() {
        let passage = only(":: A\n{$- set_flag(\"a\"); -$}\nmid {$ set_flag(\"b\") $}");
        assert_eq!(passage.fragments.len(), 2);
        assert_eq!(passage.fragments[0].form, FragmentForm::Block);
        assert_eq!(passage.fragments[1].form, FragmentForm::Inline);
        assert_eq!(passage.fragments[1].index, 1);
        assert_eq!(passage.fragments[0].span.start.line, 2);
        assert!(passage.segments.contains(&Segment::Fragment { index: 1 }));
    }

    #[test]
    fn statements_build_nested_segments() {
        let passage = only(
            ":: A\n{% if flags.lamp %}lit{% elif get_flag(\"dusk\") %}dim{% else %}dark{% endif %}\n{% for item in player.inventory %}[[{{ item.name }}->shop]]{% endfor %}",
        );
        let Segment::Conditional { branches } = &passage.segments[0] else {
            panic!("expected conditional, got {:?}", passage.segments[0]);
        };
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[0].condition.as_deref(), Some("flags.lamp"));
        assert_eq!(branches[2].condition, None);
        let Segment::Loop { binding, body, .. } = &passage.segments[2] else {
            panic!("expected loop, got {:?}", passage.segments[2]);
        };
        assert_eq!(binding, "item");
        assert_eq!(body, &vec![Segment::Link { index: 0 }]);
        assert_eq!(passage.links[0].kind, LinkKind::Plain);
    }

    #[test]
    fn malformed_markup_reports_passage_and_span() {
        for (source, code) in [
            (":: A\n{% if x %}open", "PARSE_UNCLOSED_BLOCK"),
            (":: A\n{% endif %}", "PARSE_UNEXPECTED_STATEMENT"),
            (":: A\n{% if x %}{% else %}{% elif y %}{% endif %}", "PARSE_UNEXPECTED_STATEMENT"),
            (":: A\n{% for x of y %}{% endfor %}", "PARSE_FOR_SYNTAX"),
            (":: A\n{% while x %}", "PARSE_UNKNOWN_STATEMENT"),
            (":: A\n{% if %}{% endif %}", "PARSE_MISSING_CONDITION"),
            (":: A\n[[->B]]", "PARSE_LINK_EMPTY_TEXT"),
            (":: A\n\n{$- x = 1", "PARSE_UNTERMINATED_SCRIPT"),
            (":: A #ok bad", "PARSE_TAG_TOKEN"),
            (":: A #ok #b@d", "PARSE_TAG_TOKEN"),
            (":: A #café", "PARSE_TAG_TOKEN"),
        ] {
            let error = parse_source(source, None).expect_err(source);
            assert_eq!(error.code, code, "source: {}", source);
            assert_eq!(error.passage.as_deref(), Some("A"), "source: {}", source);
            assert!(error.span.is_some());
        }

        let error = parse_source("::  #tag\nbody", None).expect_err("empty name");
        assert_eq!(error.code, "PARSE_EMPTY_PASSAGE_NAME");
    }

    #[test]
    fn unterminated_script_reports_story_line() {
        let error = parse_source(":: A\n\n{$- x = 1", None).expect_err("unterminated");
        assert_eq!(error.span.expect("span").start.line, 3);
    }

    #[test]
    fn parsing_is_idempotent() {
        let source = ":: A #x\nHi {{ player.name }}\n[[Go->B||{$ set_flag(\"go\") $}]]\n:: B\nThere";
        assert_eq!(
            parse_source(source, None).expect("first"),
            parse_source(source, None).expect("second")
        );
    }
}
