use serde::{Deserialize, Serialize};

pub const TESTCASE_SCHEMA_V1: &str = "sc-tool-case.v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub schema_version: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_random_seed")]
    pub random_seed: u32,
    #[serde(default)]
    pub actions: Vec<TestAction>,
    #[serde(default)]
    pub expected_events: Vec<ExpectedEvent>,
}

fn default_random_seed() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TestAction {
    Goto {
        passage: String,
    },
    Choose {
        index: usize,
    },
    Input {
        path: String,
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        next: Option<String>,
    },
}

impl TestAction {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Goto { .. } => "goto",
            Self::Choose { .. } => "choose",
            Self::Input { .. } => "input",
        }
    }
}

/// One expected render. `None`/empty fields are not checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExpectedEvent {
    #[serde(rename_all = "camelCase")]
    Passage {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        body_contains: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        links: Option<Vec<String>>,
    },
    Error {
        code: String,
    },
}

/// What the runner saw after each step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ObservedEvent {
    Passage {
        name: String,
        body: String,
        links: Vec<String>,
    },
    Error {
        code: String,
    },
}

impl ExpectedEvent {
    pub fn matches(&self, observed: &ObservedEvent) -> bool {
        match (self, observed) {
            (
                Self::Passage {
                    name,
                    body,
                    body_contains,
                    links,
                },
                ObservedEvent::Passage {
                    name: seen_name,
                    body: seen_body,
                    links: seen_links,
                },
            ) => {
                name == seen_name
                    && body.as_ref().map_or(true, |body| body == seen_body)
                    && body_contains
                        .iter()
                        .all(|needle| seen_body.contains(needle.as_str()))
                    && links.as_ref().map_or(true, |links| links == seen_links)
            }
            (Self::Error { code }, ObservedEvent::Error { code: seen }) => code == seen,
            _ => false,
        }
    }
}
