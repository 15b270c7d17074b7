use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ScValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ScValue>),
    Map(BTreeMap<String, ScValue>),
}

impl ScValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ScValue>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    /// Template truthiness: empty strings, collections, zero and null are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(value) => *value,
            Self::Number(value) => *value != 0.0 && !value.is_nan(),
            Self::String(value) => !value.is_empty(),
            Self::Array(values) => !values.is_empty(),
            Self::Map(entries) => !entries.is_empty(),
        }
    }

    /// Text substituted into rendered passage bodies.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => format_number(*value),
            Self::String(value) => value.clone(),
            Self::Array(_) | Self::Map(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract().abs() < f64::EPSILON && value.abs() < 9.0e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

impl From<bool> for ScValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for ScValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for ScValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for ScValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ScValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[cfg(test)]
mod value_tests {
    use super::*;

    #[test]
    fn to_text_formats_integral_numbers_without_fraction() {
        assert_eq!(ScValue::Number(100.0).to_text(), "100");
        assert_eq!(ScValue::Number(2.5).to_text(), "2.5");
        assert_eq!(ScValue::Null.to_text(), "");
        assert_eq!(
            ScValue::Array(vec![ScValue::from("a"), ScValue::from(1i64)]).to_text(),
            "[\"a\",1.0]"
        );
    }

    #[test]
    fn truthiness_follows_template_rules() {
        assert!(!ScValue::Null.is_truthy());
        assert!(!ScValue::from("").is_truthy());
        assert!(ScValue::from("x").is_truthy());
        assert!(!ScValue::Number(0.0).is_truthy());
        assert!(ScValue::Number(-1.0).is_truthy());
        assert!(!ScValue::Array(Vec::new()).is_truthy());
    }

    #[test]
    fn untagged_json_roundtrip_keeps_nested_values() {
        let value = ScValue::Map(BTreeMap::from([
            ("flag".to_string(), ScValue::Bool(true)),
            ("count".to_string(), ScValue::Number(3.0)),
            ("none".to_string(), ScValue::Null),
            (
                "list".to_string(),
                ScValue::Array(vec![ScValue::from("a"), ScValue::Number(1.5)]),
            ),
        ]));
        let json = serde_json::to_string(&value).expect("serialize");
        let back: ScValue = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, value);

        let from_int: ScValue = serde_json::from_str("7").expect("integer json");
        assert_eq!(from_int, ScValue::Number(7.0));
    }
}
