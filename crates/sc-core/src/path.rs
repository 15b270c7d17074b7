use std::collections::BTreeMap;

use crate::value::ScValue;

pub fn parse_ref_path(path: &str) -> Vec<String> {
    path.split('.')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Writes `value` at `path`, creating (or replacing non-map values with) maps
/// for every intermediate segment.
pub fn assign_nested_path(
    entries: &mut BTreeMap<String, ScValue>,
    path: &[String],
    value: ScValue,
) -> bool {
    let Some((head, rest)) = path.split_first() else {
        return false;
    };
    if rest.is_empty() {
        entries.insert(head.clone(), value);
        return true;
    }

    let next = entries
        .entry(head.clone())
        .or_insert_with(|| ScValue::Map(BTreeMap::new()));
    if !matches!(next, ScValue::Map(_)) {
        *next = ScValue::Map(BTreeMap::new());
    }
    match next {
        ScValue::Map(inner) => assign_nested_path(inner, rest, value),
        _ => false,
    }
}

pub fn lookup_path<'a>(
    entries: &'a BTreeMap<String, ScValue>,
    path: &[String],
) -> Option<&'a ScValue> {
    let (head, rest) = path.split_first()?;
    let value = entries.get(head)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        ScValue::Map(inner) => lookup_path(inner, rest),
        _ => None,
    }
}
