use sc_core::{FragmentForm, ScribeError, SourceLocation, SourceSpan};

const ESCAPABLE_MARKERS: [&str; 5] = ["[[", "{$", "{{", "{%", "{#"];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Text(String),
    Script {
        source: String,
        form: FragmentForm,
        /// Location of the first character of the trimmed source.
        span: SourceSpan,
    },
    Expression {
        source: String,
        span: SourceSpan,
    },
    Statement {
        source: String,
        span: SourceSpan,
    },
    Link {
        inner: String,
        span: SourceSpan,
    },
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str, start: SourceLocation) -> Self {
        Self {
            src,
            pos: 0,
            line: start.line,
            column: start.column,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn starts_with(&self, marker: &str) -> bool {
        self.rest().starts_with(marker)
    }

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.rest().chars().next()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip(&mut self, marker: &str) {
        for _ in marker.chars() {
            self.bump();
        }
    }

    /// Consumes everything up to and including `terminator`, returning the
    /// enclosed text. `None` when the input ends first or, for single-line
    /// constructs, when a newline is reached.
    fn read_until(&mut self, terminator: &str, single_line: bool) -> Option<String> {
        let mut out = String::new();
        while !self.at_end() {
            if self.starts_with(terminator) {
                self.skip(terminator);
                return Some(out);
            }
            if single_line && self.rest().starts_with('\n') {
                return None;
            }
            if let Some(ch) = self.bump() {
                out.push(ch);
            }
        }
        None
    }
}

pub(crate) fn advance_location(start: &SourceLocation, text: &str) -> SourceLocation {
    let mut location = start.clone();
    for ch in text.chars() {
        if ch == '\n' {
            location.line += 1;
            location.column = 1;
        } else {
            location.column += 1;
        }
    }
    location
}

/// Trims `raw` and reports where the trimmed text begins.
fn trimmed_with_start(raw: &str, start: &SourceLocation) -> (String, SourceLocation) {
    let leading = raw.len() - raw.trim_start().len();
    (
        raw.trim().to_string(),
        advance_location(start, &raw[..leading]),
    )
}

pub(crate) fn tokenize(body: &str, start: SourceLocation) -> Result<Vec<Token>, ScribeError> {
    let mut cursor = Cursor::new(body, start);
    let mut tokens = Vec::new();
    let mut text = String::new();

    while !cursor.at_end() {
        if cursor.starts_with("\\") {
            let escaped = ESCAPABLE_MARKERS
                .iter()
                .find(|marker| cursor.rest()[1..].starts_with(**marker));
            if let Some(marker) = escaped {
                cursor.bump();
                cursor.skip(marker);
                text.push_str(marker);
                continue;
            }
        }

        let opened_at = cursor.location();
        let token = if cursor.starts_with("{$-") {
            cursor.skip("{$-");
            let content_start = cursor.location();
            let raw = cursor.read_until("-$}", false).ok_or_else(|| {
                unterminated("PARSE_UNTERMINATED_SCRIPT", "script block", "-$}", &opened_at)
            })?;
            script_token(&raw, FragmentForm::Block, &content_start)
        } else if cursor.starts_with("{$") {
            cursor.skip("{$");
            let content_start = cursor.location();
            let raw = cursor.read_until("$}", true).ok_or_else(|| {
                ScribeError::parse(
                    "PARSE_UNTERMINATED_SCRIPT",
                    "Inline script must be closed with \"$}\" on the same line.",
                    SourceSpan::at(opened_at.clone()),
                )
            })?;
            script_token(&raw, FragmentForm::Inline, &content_start)
        } else if cursor.starts_with("{{") {
            cursor.skip("{{");
            let content_start = cursor.location();
            let raw = cursor.read_until("}}", false).ok_or_else(|| {
                unterminated("PARSE_UNTERMINATED_EXPRESSION", "expression", "}}", &opened_at)
            })?;
            let (source, source_start) = trimmed_with_start(&raw, &content_start);
            if source.is_empty() {
                return Err(ScribeError::parse(
                    "PARSE_EMPTY_EXPRESSION",
                    "Template expression is empty.",
                    SourceSpan::at(opened_at),
                ));
            }
            Some(Token::Expression {
                source,
                span: SourceSpan::new(source_start, cursor.location()),
            })
        } else if cursor.starts_with("{%") {
            cursor.skip("{%");
            let content_start = cursor.location();
            let raw = cursor.read_until("%}", false).ok_or_else(|| {
                unterminated("PARSE_UNTERMINATED_STATEMENT", "statement", "%}", &opened_at)
            })?;
            let (source, source_start) = trimmed_with_start(&raw, &content_start);
            Some(Token::Statement {
                source,
                span: SourceSpan::new(source_start, cursor.location()),
            })
        } else if cursor.starts_with("{#") {
            cursor.skip("{#");
            cursor.read_until("#}", false).ok_or_else(|| {
                unterminated("PARSE_UNTERMINATED_COMMENT", "comment", "#}", &opened_at)
            })?;
            None
        } else if cursor.starts_with("[[") {
            cursor.skip("[[");
            let inner = read_link_inner(&mut cursor).ok_or_else(|| {
                unterminated("PARSE_UNTERMINATED_LINK", "link", "]]", &opened_at)
            })?;
            Some(Token::Link {
                inner,
                span: SourceSpan::new(opened_at, cursor.location()),
            })
        } else {
            if let Some(ch) = cursor.bump() {
                text.push(ch);
            }
            continue;
        };

        if let Some(token) = token {
            if !text.is_empty() {
                tokens.push(Token::Text(std::mem::take(&mut text)));
            }
            tokens.push(token);
        }
    }

    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    Ok(tokens)
}

fn script_token(raw: &str, form: FragmentForm, content_start: &SourceLocation) -> Option<Token> {
    let (source, source_start) = trimmed_with_start(raw, content_start);
    if source.is_empty() {
        return None;
    }
    let end = advance_location(&source_start, &source);
    Some(Token::Script {
        source,
        form,
        span: SourceSpan::new(source_start, end),
    })
}

/// Link bodies may carry `{$ … $}` actions that themselves contain `]]`.
fn read_link_inner(cursor: &mut Cursor<'_>) -> Option<String> {
    let mut out = String::new();
    while !cursor.at_end() {
        if cursor.starts_with("]]") {
            cursor.skip("]]");
            return Some(out);
        }
        if cursor.starts_with("{$") {
            cursor.skip("{$");
            out.push_str("{$");
            let inner = cursor.read_until("$}", false)?;
            out.push_str(&inner);
            out.push_str("$}");
            continue;
        }
        if cursor.starts_with("\n\n") {
            return None;
        }
        out.push(cursor.bump()?);
    }
    None
}

fn unterminated(code: &str, what: &str, terminator: &str, at: &SourceLocation) -> ScribeError {
    ScribeError::parse(
        code,
        format!("Unterminated {}: expected \"{}\".", what, terminator),
        SourceSpan::at(at.clone()),
    )
}

#[cfg(test)]
mod lexer_tests {
    use super::*;

    fn origin() -> SourceLocation {
        SourceLocation { line: 1, column: 1 }
    }

    #[test]
    fn splits_text_scripts_expressions_and_links() {
        let tokens = tokenize("Hi {$ set_flag(\"a\") $} {{ player.name }} [[Go->B]]", origin())
            .expect("tokenize");
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0], Token::Text("Hi ".to_string()));
        assert!(matches!(
            &tokens[1],
            Token::Script { source, form: FragmentForm::Inline, span }
                if source == "set_flag(\"a\")" && span.start.column == 7
        ));
        assert!(matches!(&tokens[3], Token::Expression { source, .. } if source == "player.name"));
        assert!(matches!(&tokens[5], Token::Link { inner, .. } if inner == "Go->B"));
    }

    #[test]
    fn block_scripts_span_lines_and_track_start() {
        let tokens = tokenize("a\n{$-\n  let x = 1;\n  x += 1;\n-$}\nb", origin()).expect("tokenize");
        let Token::Script { source, form, span } = &tokens[1] else {
            panic!("expected script token, got {:?}", tokens[1]);
        };
        assert_eq!(*form, FragmentForm::Block);
        assert!(source.starts_with("let x = 1;"));
        assert_eq!(span.start, SourceLocation { line: 3, column: 3 });
    }

    #[test]
    fn empty_scripts_and_comments_leave_no_token() {
        let tokens = tokenize("a{$  $}b{# note #}c", origin()).expect("tokenize");
        assert_eq!(tokens, vec![Token::Text("abc".to_string())]);
    }

    #[test]
    fn escaped_markers_stay_literal() {
        let tokens = tokenize(r"\[[not a link]] \{{ raw }}", origin()).expect("tokenize");
        assert_eq!(tokens, vec![Token::Text("[[not a link]] {{ raw }}".to_string())]);
    }

    #[test]
    fn link_actions_may_contain_closing_brackets() {
        let tokens =
            tokenize("[[Take->room||{$ bag[\"x\"] = arr[0]]; $}]]", origin()).expect("tokenize");
        assert!(matches!(&tokens[0], Token::Link { inner, .. } if inner.ends_with("$}")));
    }

    #[test]
    fn unterminated_markers_are_parse_errors_with_location() {
        let error = tokenize("line\n  {$- never closed", origin()).expect_err("unterminated");
        assert_eq!(error.code, "PARSE_UNTERMINATED_SCRIPT");
        assert_eq!(error.span.expect("span").start, SourceLocation { line: 2, column: 3 });

        let error = tokenize("{$ a\n $}", origin()).expect_err("inline across lines");
        assert_eq!(error.code, "PARSE_UNTERMINATED_SCRIPT");

        for (source, code) in [
            ("{{ x", "PARSE_UNTERMINATED_EXPRESSION"),
            ("{{   }}", "PARSE_EMPTY_EXPRESSION"),
            ("{% if x", "PARSE_UNTERMINATED_STATEMENT"),
            ("{# c", "PARSE_UNTERMINATED_COMMENT"),
            ("[[Go->B", "PARSE_UNTERMINATED_LINK"),
            ("[[Go\n\n->B]]", "PARSE_UNTERMINATED_LINK"),
        ] {
            let error = tokenize(source, origin()).expect_err(source);
            assert_eq!(error.code, code, "source: {}", source);
        }
    }
}
