use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ProjectConfig;

pub const NAV_MENU_PASSAGE: &str = "NavMenu";
pub const PRE_PASSAGE: &str = "PrePassage";
pub const POST_PASSAGE: &str = "PostPassage";
pub const SPECIAL_PASSAGES: [&str; 3] = [NAV_MENU_PASSAGE, PRE_PASSAGE, POST_PASSAGE];

pub const TAG_SILENT: &str = "silent";
pub const TAG_MENU: &str = "menu";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourceLocation,
    pub end: SourceLocation,
}

impl SourceSpan {
    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }

    pub fn at(location: SourceLocation) -> Self {
        Self {
            start: location.clone(),
            end: location,
        }
    }

    pub fn synthetic() -> Self {
        Self::at(SourceLocation { line: 1, column: 1 })
    }

    /// Maps a 1-based line/column inside a snippet that starts at `self.start`
    /// back to story-file coordinates.
    pub fn offset(&self, line: usize, column: usize) -> SourceLocation {
        if line <= 1 {
            SourceLocation {
                line: self.start.line,
                column: self.start.column + column.saturating_sub(1),
            }
        } else {
            SourceLocation {
                line: self.start.line + line - 1,
                column,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FragmentForm {
    Block,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub index: usize,
    pub source: String,
    pub form: FragmentForm,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkKind {
    Plain,
    Redirect,
    Action,
    External,
}

impl LinkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Redirect => "redirect",
            Self::Action => "action",
            Self::External => "external",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub text: String,
    /// Empty means "stay on the current passage".
    pub target: String,
    pub kind: LinkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub span: SourceSpan,
}

impl Link {
    pub fn has_template_target(&self) -> bool {
        self.target.contains("{{")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    /// `None` for the trailing `{% else %}` branch.
    pub condition: Option<String>,
    pub span: SourceSpan,
    pub body: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Segment {
    Text {
        value: String,
    },
    Expression {
        source: String,
        span: SourceSpan,
    },
    Fragment {
        index: usize,
    },
    Link {
        index: usize,
    },
    Conditional {
        branches: Vec<Branch>,
    },
    Loop {
        binding: String,
        iterable: String,
        span: SourceSpan,
        body: Vec<Segment>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passage {
    pub name: String,
    pub tags: Vec<String>,
    pub segments: Vec<Segment>,
    pub fragments: Vec<Fragment>,
    pub links: Vec<Link>,
    pub span: SourceSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl Passage {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    pub fn is_silent(&self) -> bool {
        self.has_tag(TAG_SILENT)
    }

    pub fn is_menu(&self) -> bool {
        self.has_tag(TAG_MENU)
    }

    pub fn is_special(&self) -> bool {
        SPECIAL_PASSAGES.contains(&self.name.as_str())
    }
}

pub type PassageTable = BTreeMap<String, Passage>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePassage {
    pub name: String,
    pub span: SourceSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

/// A fully parsed file-set plus its project configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub config: ProjectConfig,
    pub passages: PassageTable,
    #[serde(default)]
    pub duplicates: Vec<DuplicatePassage>,
}

impl Story {
    pub fn passage(&self, name: &str) -> Option<&Passage> {
        self.passages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.passages.contains_key(name)
    }

    /// Plain, redirect and action links whose literal target names no passage.
    pub fn dangling_links(&self) -> Vec<(String, Link)> {
        let mut out = Vec::new();
        for passage in self.passages.values() {
            for link in &passage.links {
                if link.kind == LinkKind::External
                    || link.target.is_empty()
                    || link.has_template_target()
                {
                    continue;
                }
                if !self.passages.contains_key(&link.target) {
                    out.push((passage.name.clone(), link.clone()));
                }
            }
        }
        out
    }
}
