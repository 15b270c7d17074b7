use sc_core::{Link, LinkKind, ScribeError, SourceSpan};

const PLAIN_SEPARATOR: &str = "->";
const REDIRECT_SEPARATOR: &str = "=>";
const ACTION_SEPARATOR: &str = "||";

/// Parses the text between `[[` and `]]`.
pub(crate) fn parse_link(inner: &str, span: SourceSpan) -> Result<Link, ScribeError> {
    let (link_part, action) = match inner.find(ACTION_SEPARATOR) {
        Some(index) => (
            &inner[..index],
            unwrap_action(&inner[index + ACTION_SEPARATOR.len()..]),
        ),
        None => (inner, None),
    };

    let separator = [PLAIN_SEPARATOR, REDIRECT_SEPARATOR]
        .into_iter()
        .filter_map(|separator| link_part.find(separator).map(|index| (index, separator)))
        .min_by_key(|(index, _)| *index);

    let (text, target, redirect) = match separator {
        Some((index, separator)) => (
            link_part[..index].trim(),
            link_part[index + separator.len()..].trim(),
            separator == REDIRECT_SEPARATOR,
        ),
        None => (link_part.trim(), link_part.trim(), false),
    };

    if text.is_empty() {
        return Err(ScribeError::parse(
            "PARSE_LINK_EMPTY_TEXT",
            "Link text must not be empty.",
            span,
        ));
    }

    let external = target.starts_with("http://") || target.starts_with("https://");
    let kind = match (redirect, action.is_some(), external) {
        (true, true, _) => {
            return Err(ScribeError::parse(
                "PARSE_LINK_REDIRECT_ACTION",
                "Redirect links cannot carry an action.",
                span,
            ))
        }
        (false, true, true) => {
            return Err(ScribeError::parse(
                "PARSE_LINK_EXTERNAL_ACTION",
                "External links cannot carry an action.",
                span,
            ))
        }
        (true, false, _) => LinkKind::Redirect,
        (false, true, false) => LinkKind::Action,
        (false, false, true) => LinkKind::External,
        (false, false, false) => LinkKind::Plain,
    };

    Ok(Link {
        text: text.to_string(),
        target: target.to_string(),
        kind,
        action,
        span,
    })
}

fn unwrap_action(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let code = if let Some(inner) = trimmed
        .strip_prefix("{$-")
        .and_then(|rest| rest.strip_suffix("-$}"))
    {
        inner
    } else if let Some(inner) = trimmed
        .strip_prefix("{$")
        .and_then(|rest| rest.strip_suffix("$}"))
    {
        inner
    } else {
        trimmed
    };
    let code = code.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}
