use std::collections::BTreeMap;

use rhai::{Array, Dynamic, ImmutableString, Map, FLOAT, INT};
use sc_core::{ErrorKind, ScValue, ScribeError};

const MAX_EXACT_INT: f64 = 9.0e15;

pub(crate) fn scvalue_to_dynamic(value: &ScValue) -> Dynamic {
    match value {
        ScValue::Null => Dynamic::UNIT,
        ScValue::Bool(value) => Dynamic::from_bool(*value),
        ScValue::Number(value) => {
            if value.fract() == 0.0 && value.abs() < MAX_EXACT_INT {
                Dynamic::from_int(*value as INT)
            } else {
                Dynamic::from_float(*value as FLOAT)
            }
        }
        ScValue::String(value) => Dynamic::from(value.clone()),
        ScValue::Array(values) => {
            Dynamic::from_array(values.iter().map(scvalue_to_dynamic).collect::<Array>())
        }
        ScValue::Map(values) => {
            let mut map = Map::new();
            for (key, value) in values {
                map.insert(key.as_str().into(), scvalue_to_dynamic(value));
            }
            Dynamic::from_map(map)
        }
    }
}

pub(crate) fn dynamic_to_scvalue(value: Dynamic) -> Result<ScValue, ScribeError> {
    if value.is_unit() {
        return Ok(ScValue::Null);
    }
    if value.is::<bool>() {
        return Ok(ScValue::Bool(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        return Ok(ScValue::Number(value.cast::<INT>() as f64));
    }
    if value.is::<FLOAT>() {
        let number = value.cast::<FLOAT>();
        if !number.is_finite() {
            return Err(ScribeError::new(
                ErrorKind::SandboxRuntime,
                "SANDBOX_VALUE_NON_FINITE",
                format!("Script number {} cannot be stored.", number),
            ));
        }
        return Ok(ScValue::Number(number));
    }
    if value.is::<ImmutableString>() {
        return Ok(ScValue::String(value.cast::<ImmutableString>().to_string()));
    }
    if value.is::<char>() {
        return Ok(ScValue::String(value.cast::<char>().to_string()));
    }
    if value.is::<Array>() {
        let array = value.cast::<Array>();
        let mut out = Vec::with_capacity(array.len());
        for item in array {
            out.push(dynamic_to_scvalue(item)?);
        }
        return Ok(ScValue::Array(out));
    }
    if value.is::<Map>() {
        let map = value.cast::<Map>();
        let mut out = BTreeMap::new();
        for (key, value) in map {
            out.insert(key.to_string(), dynamic_to_scvalue(value)?);
        }
        return Ok(ScValue::Map(out));
    }

    Err(ScribeError::new(
        ErrorKind::SandboxRuntime,
        "SANDBOX_VALUE_UNSUPPORTED",
        format!("Script value of type \"{}\" cannot be stored.", value.type_name()),
    ))
}

/// Text form used for `write`, `str` and template substitution.
pub(crate) fn dynamic_to_text(value: &Dynamic) -> String {
    match dynamic_to_scvalue(value.clone()) {
        Ok(value) => value.to_text(),
        Err(_) => value.to_string(),
    }
}

pub(crate) fn dynamic_to_number(value: &Dynamic) -> Option<f64> {
    if value.is::<INT>() {
        return Some(value.clone().cast::<INT>() as f64);
    }
    if value.is::<FLOAT>() {
        return Some(value.clone().cast::<FLOAT>());
    }
    None
}

/// Converts a whole-valued number back to an integer script value.
pub(crate) fn number_to_dynamic(value: f64) -> Dynamic {
    scvalue_to_dynamic(&ScValue::Number(value))
}
