use std::fmt::Display;

use sc_core::{ErrorKind, ScribeError};

/// CLI-side failure sites. Story and engine errors arrive as `ScribeError`
/// already; these cover the host's own file and terminal work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CliFailure {
    PlayIo,
    SourcePath,
    SourceScan,
    SourceRead,
    StateRead,
    StateWrite,
    StateInvalid,
    JsonEncode,
}

impl CliFailure {
    pub(crate) fn code(self) -> &'static str {
        match self {
            Self::PlayIo => "PLAY_IO",
            Self::SourcePath => "CLI_SOURCE_PATH",
            Self::SourceScan => "CLI_SOURCE_SCAN",
            Self::SourceRead => "CLI_SOURCE_READ",
            Self::StateRead => "CLI_STATE_READ",
            Self::StateWrite => "CLI_STATE_WRITE",
            Self::StateInvalid => "CLI_STATE_INVALID",
            Self::JsonEncode => "CLI_JSON_ENCODE",
        }
    }

    fn kind(self) -> ErrorKind {
        match self {
            Self::StateInvalid | Self::JsonEncode => ErrorKind::Serialization,
            _ => ErrorKind::Io,
        }
    }

    /// `map_err` adapter for this site.
    pub(crate) fn wrap<E: Display>(self) -> impl Fn(E) -> ScribeError {
        move |error| ScribeError::new(self.kind(), self.code(), error.to_string())
    }
}

/// Error protocol lines; passage and source location only when known.
pub(crate) fn error_lines(error: &ScribeError) -> Vec<String> {
    let mut lines = vec![
        "RESULT:ERROR".to_string(),
        format!("ERROR_CODE:{}", error.code),
        format!("ERROR_KIND:{}", error.kind),
        format!(
            "ERROR_MSG_JSON:{}",
            serde_json::to_string(&error.message).expect("string json")
        ),
    ];
    if let Some(passage) = &error.passage {
        lines.push(format!("ERROR_PASSAGE:{}", passage));
    }
    if let Some(span) = &error.span {
        lines.push(format!("ERROR_AT:{}:{}", span.start.line, span.start.column));
    }
    lines
}

pub(crate) fn emit_error(error: ScribeError) -> i32 {
    for line in error_lines(&error) {
        println!("{}", line);
    }
    1
}

#[cfg(test)]
mod error_map_tests {
    use super::*;
    use sc_core::{SourceLocation, SourceSpan};

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        let code = emit_error(ScribeError::navigation("NAV_INVALID_LINK", "failed"));
        assert_eq!(code, 1);
    }

    #[test]
    fn error_lines_carry_passage_and_location() {
        let error = ScribeError::parse(
            "PARSE_TAG_TOKEN",
            "bad \"tag\"",
            SourceSpan::at(SourceLocation { line: 3, column: 7 }),
        )
        .in_passage("cellar");
        assert_eq!(
            error_lines(&error),
            vec![
                "RESULT:ERROR",
                "ERROR_CODE:PARSE_TAG_TOKEN",
                "ERROR_KIND:parse",
                "ERROR_MSG_JSON:\"bad \\\"tag\\\"\"",
                "ERROR_PASSAGE:cellar",
                "ERROR_AT:3:7",
            ]
        );

        let bare = error_lines(&ScribeError::navigation("NAV_INVALID_LINK", "no"));
        assert_eq!(bare.len(), 4);
    }

    #[test]
    fn failure_sites_pick_kind_and_code() {
        let read = CliFailure::StateRead.wrap()(std::io::Error::other("gone"));
        assert_eq!(read.code, "CLI_STATE_READ");
        assert_eq!(read.kind, ErrorKind::Io);
        assert_eq!(read.message, "gone");

        let strip_error = std::path::Path::new("/a")
            .strip_prefix("/b")
            .expect_err("strip prefix");
        assert_eq!(CliFailure::SourceScan.wrap()(strip_error).code, "CLI_SOURCE_SCAN");

        let invalid = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
        let mapped = CliFailure::StateInvalid.wrap()(invalid);
        assert_eq!(mapped.code, "CLI_STATE_INVALID");
        assert_eq!(mapped.kind, ErrorKind::Serialization);
        assert_eq!(CliFailure::PlayIo.code(), "PLAY_IO");
    }
}
