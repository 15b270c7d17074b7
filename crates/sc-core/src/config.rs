use serde::{Deserialize, Serialize};

use crate::error::ScribeError;

pub const PROJECT_FILE: &str = "project.json";
pub const DEFAULT_STARTING_PASSAGE: &str = "start";

/// Contents of a story's `project.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub title: String,
    pub author: String,
    pub version: String,
    pub starting_passage: String,
    pub features: Features,
    pub sandbox: SandboxLimits,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            author: "Anonymous".to_string(),
            version: "1.0".to_string(),
            starting_passage: DEFAULT_STARTING_PASSAGE.to_string(),
            features: Features::default(),
            sandbox: SandboxLimits::default(),
        }
    }
}

impl ProjectConfig {
    pub fn from_json(raw: &str) -> Result<Self, ScribeError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|error| ScribeError::config("CONFIG_INVALID", error.to_string()))?;
        if config.starting_passage.trim().is_empty() {
            return Err(ScribeError::config(
                "CONFIG_STARTING_PASSAGE",
                "starting_passage must not be empty.",
            ));
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub use_default_player: bool,
    pub use_default_inventory: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            use_default_player: true,
            use_default_inventory: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
    pub max_redirects: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_operations: 100_000,
            max_call_levels: 32,
            max_string_size: 65_536,
            max_array_size: 10_000,
            max_map_size: 10_000,
            max_redirects: 32,
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn from_json_fills_missing_fields_with_defaults() {
        let config = ProjectConfig::from_json(
            r#"{"title":"Cave","features":{"use_default_inventory":true},"theme":{"enabled":true}}"#,
        )
        .expect("config should parse");
        assert_eq!(config.title, "Cave");
        assert_eq!(config.starting_passage, "start");
        assert!(config.features.use_default_player);
        assert!(config.features.use_default_inventory);
        assert_eq!(config.sandbox.max_operations, 100_000);
    }

    #[test]
    fn from_json_rejects_invalid_payloads() {
        let error = ProjectConfig::from_json("{").expect_err("invalid json");
        assert_eq!(error.code, "CONFIG_INVALID");

        let error = ProjectConfig::from_json(r#"{"starting_passage":"  "}"#)
            .expect_err("blank start passage");
        assert_eq!(error.code, "CONFIG_STARTING_PASSAGE");
    }
}
