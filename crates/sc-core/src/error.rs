use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Parse,
    UnknownPassage,
    SandboxCapability,
    SandboxRuntime,
    Serialization,
    Navigation,
    Config,
    Io,
    Access,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::UnknownPassage => "unknownPassage",
            Self::SandboxCapability => "sandboxCapability",
            Self::SandboxRuntime => "sandboxRuntime",
            Self::Serialization => "serialization",
            Self::Navigation => "navigation",
            Self::Config => "config",
            Self::Io => "io",
            Self::Access => "access",
        }
    }

    /// Fragment-scoped kinds are contained at the passage render boundary.
    pub fn is_sandbox(self) -> bool {
        matches!(self, Self::SandboxCapability | Self::SandboxRuntime)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ScribeError {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
}

impl ScribeError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            passage: None,
            span: None,
        }
    }

    pub fn with_span(
        kind: ErrorKind,
        code: impl Into<String>,
        message: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        Self {
            span: Some(span),
            ..Self::new(kind, code, message)
        }
    }

    pub fn parse(code: impl Into<String>, message: impl Into<String>, span: SourceSpan) -> Self {
        Self::with_span(ErrorKind::Parse, code, message, span)
    }

    pub fn unknown_passage(name: &str) -> Self {
        Self::new(
            ErrorKind::UnknownPassage,
            "NAV_UNKNOWN_PASSAGE",
            format!("Passage \"{}\" not found.", name),
        )
        .in_passage(name)
    }

    pub fn navigation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Navigation, code, message)
    }

    pub fn serialization(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, code, message)
    }

    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, code, message)
    }

    pub fn io(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, code, message)
    }

    pub fn in_passage(mut self, passage: impl Into<String>) -> Self {
        self.passage = Some(passage.into());
        self
    }
}
