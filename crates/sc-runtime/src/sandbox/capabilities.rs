use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Position, FLOAT, INT};
use sc_core::{Features, GameState, ScValue};
use serde::Serialize;

use super::bridge::{
    dynamic_to_number, dynamic_to_scvalue, dynamic_to_text, number_to_dynamic, scvalue_to_dynamic,
};
use super::rng::{next_random_bounded, next_random_u32, next_random_unit};
use super::Effects;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CapabilityClass {
    /// Side-effect free helpers.
    Pure,
    /// Randomness, math and clock.
    Library,
    /// Reads or writes the session's game state.
    State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub name: &'static str,
    pub signature: &'static str,
    pub class: CapabilityClass,
    pub in_templates: bool,
    pub requires_inventory: bool,
}

const fn capability(
    name: &'static str,
    signature: &'static str,
    class: CapabilityClass,
    in_templates: bool,
) -> Capability {
    Capability {
        name,
        signature,
        class,
        in_templates,
        requires_inventory: false,
    }
}

const fn inventory(name: &'static str, signature: &'static str, in_templates: bool) -> Capability {
    Capability {
        name,
        signature,
        class: CapabilityClass::State,
        in_templates,
        requires_inventory: true,
    }
}

/// Every name a fragment or template can resolve beyond the Rhai operators and
/// the string/array/map/math package methods.
pub const CAPABILITIES: &[Capability] = &[
    capability("upper", "upper(text) -> string", CapabilityClass::Pure, true),
    capability("lower", "lower(text) -> string", CapabilityClass::Pure, true),
    capability("trim", "trim(text) -> string", CapabilityClass::Pure, true),
    capability("str", "str(value) -> string", CapabilityClass::Pure, true),
    capability("int", "int(value) -> int", CapabilityClass::Pure, true),
    capability("float", "float(value) -> float", CapabilityClass::Pure, true),
    capability("sum", "sum(array) -> number", CapabilityClass::Pure, true),
    capability("min", "min(a, b) -> value", CapabilityClass::Pure, true),
    capability("max", "max(a, b) -> value", CapabilityClass::Pure, true),
    capability("abs", "abs(number) -> number", CapabilityClass::Pure, true),
    capability("round", "round(number) -> number", CapabilityClass::Pure, true),
    capability("floor", "floor(number) -> number", CapabilityClass::Pure, true),
    capability("ceil", "ceil(number) -> number", CapabilityClass::Pure, true),
    capability("sqrt", "sqrt(number) -> float", CapabilityClass::Library, true),
    capability("pow", "pow(base, exponent) -> float", CapabilityClass::Library, true),
    capability("random", "random(n) -> int in 0..n", CapabilityClass::Library, true),
    capability(
        "random_range",
        "random_range(lo, hi) -> int in lo..=hi",
        CapabilityClass::Library,
        true,
    ),
    capability("random_float", "random_float() -> float in [0, 1)", CapabilityClass::Library, true),
    capability("pick", "pick(array) -> value", CapabilityClass::Library, true),
    capability("now", "now() -> RFC 3339 string", CapabilityClass::Library, true),
    capability("timestamp", "timestamp() -> unix seconds", CapabilityClass::Library, true),
    capability("get_flag", "get_flag(name[, default])", CapabilityClass::State, true),
    capability("set_flag", "set_flag(name[, value])", CapabilityClass::State, false),
    capability("get_variable", "get_variable(path[, default])", CapabilityClass::State, true),
    capability("set_variable", "set_variable(path, value)", CapabilityClass::State, false),
    capability("write", "write(value)", CapabilityClass::State, false),
    capability("redirect", "redirect(passage)", CapabilityClass::State, false),
    capability("debug_log", "debug_log(value)", CapabilityClass::State, false),
    inventory("add_to_inventory", "add_to_inventory(item[, quantity])", false),
    inventory("remove_from_inventory", "remove_from_inventory(item[, quantity]) -> bool", false),
    inventory("has_item", "has_item(item) -> bool", true),
    inventory("get_item_count", "get_item_count(item) -> int", true),
];

pub(crate) fn runtime_error(message: impl Into<String>) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(message.into()),
        Position::NONE,
    ))
}

fn require_number(name: &str, value: &Dynamic) -> Result<f64, Box<EvalAltResult>> {
    dynamic_to_number(value)
        .ok_or_else(|| runtime_error(format!("{}() expects a number, got {}.", name, value.type_name())))
}

fn compare(name: &str, a: &Dynamic, b: &Dynamic) -> Result<std::cmp::Ordering, Box<EvalAltResult>> {
    if let (Some(left), Some(right)) = (dynamic_to_number(a), dynamic_to_number(b)) {
        return left
            .partial_cmp(&right)
            .ok_or_else(|| runtime_error(format!("{}() cannot compare NaN.", name)));
    }
    if a.is_string() && b.is_string() {
        return Ok(dynamic_to_text(a).cmp(&dynamic_to_text(b)));
    }
    Err(runtime_error(format!(
        "{}() cannot compare {} with {}.",
        name,
        a.type_name(),
        b.type_name()
    )))
}

pub(crate) fn register_pure(engine: &mut Engine) {
    engine.register_fn("upper", |text: &str| text.to_uppercase());
    engine.register_fn("lower", |text: &str| text.to_lowercase());
    engine.register_fn("trim", |text: &str| text.trim().to_string());
    engine.register_fn("str", |value: Dynamic| dynamic_to_text(&value));

    engine.register_fn("int", |value: Dynamic| -> Result<INT, Box<EvalAltResult>> {
        if let Some(number) = dynamic_to_number(&value) {
            return Ok(number.trunc() as INT);
        }
        if value.is::<bool>() {
            return Ok(INT::from(value.cast::<bool>()));
        }
        let text = dynamic_to_text(&value);
        let trimmed = text.trim();
        trimmed
            .parse::<INT>()
            .ok()
            .or_else(|| trimmed.parse::<FLOAT>().ok().map(|number| number.trunc() as INT))
            .ok_or_else(|| runtime_error(format!("int() cannot convert \"{}\".", text)))
    });

    engine.register_fn("float", |value: Dynamic| -> Result<FLOAT, Box<EvalAltResult>> {
        if let Some(number) = dynamic_to_number(&value) {
            return Ok(number);
        }
        let text = dynamic_to_text(&value);
        text.trim()
            .parse::<FLOAT>()
            .map_err(|_| runtime_error(format!("float() cannot convert \"{}\".", text)))
    });

    engine.register_fn("sum", |values: Array| -> Result<Dynamic, Box<EvalAltResult>> {
        let mut total = 0.0;
        for value in &values {
            total += require_number("sum", value)?;
        }
        Ok(number_to_dynamic(total))
    });

    // The math package only covers floats; whole numbers arrive as INT.
    engine.register_fn("round", |value: INT| value);
    engine.register_fn("floor", |value: INT| value);
    engine.register_fn("ceil", |value: INT| value);
    engine.register_fn("ceil", |value: FLOAT| value.ceil());

    engine.register_fn("min", |a: Dynamic, b: Dynamic| -> Result<Dynamic, Box<EvalAltResult>> {
        Ok(if compare("min", &a, &b)?.is_gt() { b } else { a })
    });
    engine.register_fn("max", |a: Dynamic, b: Dynamic| -> Result<Dynamic, Box<EvalAltResult>> {
        Ok(if compare("max", &a, &b)?.is_lt() { b } else { a })
    });
}

pub(crate) fn register_library(
    engine: &mut Engine,
    rng: &Rc<Cell<u32>>,
    fixed_time: Option<DateTime<Utc>>,
) {
    let state = Rc::clone(rng);
    engine.register_fn("random", move |bound: INT| -> Result<INT, Box<EvalAltResult>> {
        let bound = u32::try_from(bound)
            .ok()
            .filter(|bound| *bound > 0)
            .ok_or_else(|| runtime_error("random(n) expects 0 < n <= 4294967295."))?;
        let mut seed = state.get();
        let value = next_random_bounded(&mut seed, bound);
        state.set(seed);
        Ok(INT::from(value))
    });

    let state = Rc::clone(rng);
    engine.register_fn(
        "random_range",
        move |low: INT, high: INT| -> Result<INT, Box<EvalAltResult>> {
            let width = high
                .checked_sub(low)
                .and_then(|span| span.checked_add(1))
                .and_then(|span| u32::try_from(span).ok())
                .filter(|span| *span > 0)
                .ok_or_else(|| runtime_error("random_range(lo, hi) expects lo <= hi."))?;
            let mut seed = state.get();
            let value = next_random_bounded(&mut seed, width);
            state.set(seed);
            Ok(low + INT::from(value))
        },
    );

    let state = Rc::clone(rng);
    engine.register_fn("random_float", move || -> FLOAT {
        let mut seed = state.get();
        let value = next_random_unit(&mut seed);
        state.set(seed);
        value
    });

    let state = Rc::clone(rng);
    engine.register_fn("pick", move |values: Array| -> Dynamic {
        let Ok(len) = u32::try_from(values.len()) else {
            return Dynamic::UNIT;
        };
        if len == 0 {
            return Dynamic::UNIT;
        }
        let mut seed = state.get();
        let index = if len == 1 {
            next_random_u32(&mut seed);
            0
        } else {
            next_random_bounded(&mut seed, len)
        };
        state.set(seed);
        values[index as usize].clone()
    });

    for (name, op) in [
        ("sqrt", f64::sqrt as fn(f64) -> f64),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("exp", f64::exp),
        ("ln", f64::ln),
    ] {
        engine.register_fn(name, move |value: INT| -> FLOAT { op(value as FLOAT) });
    }
    engine.register_fn("pow", |base: FLOAT, exponent: FLOAT| base.powf(exponent));
    engine.register_fn("pow", |base: INT, exponent: INT| (base as FLOAT).powf(exponent as FLOAT));
    engine.register_fn("pow", |base: INT, exponent: FLOAT| (base as FLOAT).powf(exponent));
    engine.register_fn("pow", |base: FLOAT, exponent: INT| base.powf(exponent as FLOAT));

    engine.register_fn("now", move || fixed_time.unwrap_or_else(Utc::now).to_rfc3339());
    engine.register_fn("timestamp", move || -> INT {
        fixed_time.unwrap_or_else(Utc::now).timestamp()
    });
}

/// Read-only state functions available to fragments and templates.
pub(crate) fn register_state_readers(
    engine: &mut Engine,
    state: &Rc<RefCell<GameState>>,
    features: Features,
) {
    let shared = Rc::clone(state);
    engine.register_fn("get_flag", move |name: &str| shared.borrow().get_flag(name, false));
    let shared = Rc::clone(state);
    engine.register_fn("get_flag", move |name: &str, default: bool| {
        shared.borrow().get_flag(name, default)
    });

    let shared = Rc::clone(state);
    engine.register_fn("get_variable", move |path: &str| {
        shared
            .borrow()
            .get_variable(path)
            .map(scvalue_to_dynamic)
            .unwrap_or(Dynamic::UNIT)
    });
    let shared = Rc::clone(state);
    engine.register_fn("get_variable", move |path: &str, default: Dynamic| {
        shared
            .borrow()
            .get_variable(path)
            .map(scvalue_to_dynamic)
            .unwrap_or(default)
    });

    if !features.use_default_inventory {
        return;
    }
    let shared = Rc::clone(state);
    engine.register_fn("has_item", move |item: &str| shared.borrow().has_item(item));
    let shared = Rc::clone(state);
    engine.register_fn("get_item_count", move |item: &str| -> INT {
        shared.borrow().item_count(item)
    });
}

/// Mutating entry points; only registered for fragments and link actions.
pub(crate) fn register_state_writers(
    engine: &mut Engine,
    state: &Rc<RefCell<GameState>>,
    effects: &Rc<RefCell<Effects>>,
    features: Features,
) {
    let shared = Rc::clone(state);
    engine.register_fn("set_flag", move |name: &str| shared.borrow_mut().set_flag(name, true));
    let shared = Rc::clone(state);
    engine.register_fn("set_flag", move |name: &str, value: bool| {
        shared.borrow_mut().set_flag(name, value)
    });

    let shared = Rc::clone(state);
    engine.register_fn(
        "set_variable",
        move |path: &str, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let value = dynamic_to_scvalue(value).map_err(|error| runtime_error(error.message))?;
            if shared.borrow_mut().set_variable(path, value) {
                Ok(())
            } else {
                Err(runtime_error(format!(
                    "set_variable() needs a non-empty path, got \"{}\".",
                    path
                )))
            }
        },
    );

    let sink = Rc::clone(effects);
    engine.register_fn("write", move |value: Dynamic| {
        sink.borrow_mut().output.push_str(&dynamic_to_text(&value));
    });

    let sink = Rc::clone(effects);
    engine.register_fn(
        "redirect",
        move |passage: &str| -> Result<(), Box<EvalAltResult>> {
            let passage = passage.trim();
            if passage.is_empty() {
                return Err(runtime_error("redirect() needs a passage name."));
            }
            sink.borrow_mut().redirect = Some(passage.to_string());
            Ok(())
        },
    );

    let sink = Rc::clone(effects);
    engine.register_fn("debug_log", move |value: Dynamic| {
        let line = dynamic_to_text(&value);
        log::debug!(target: "scribe::script", "{}", line);
        sink.borrow_mut().logs.push(line);
    });

    if !features.use_default_inventory {
        return;
    }
    let shared = Rc::clone(state);
    engine.register_fn("add_to_inventory", move |item: &str| {
        shared.borrow_mut().add_to_inventory(item, 1)
    });
    let shared = Rc::clone(state);
    engine.register_fn("add_to_inventory", move |item: &str, quantity: INT| {
        shared.borrow_mut().add_to_inventory(item, quantity)
    });
    let shared = Rc::clone(state);
    engine.register_fn("remove_from_inventory", move |item: &str| {
        shared.borrow_mut().remove_from_inventory(item, 1)
    });
    let shared = Rc::clone(state);
    engine.register_fn("remove_from_inventory", move |item: &str, quantity: INT| {
        shared.borrow_mut().remove_from_inventory(item, quantity)
    });
}

/// Scope values every fragment and template sees, as constants.
pub(crate) fn context_constants(state: &GameState) -> Vec<(&'static str, Dynamic)> {
    let tags = state
        .passage_tags
        .iter()
        .map(|tag| Dynamic::from(tag.clone()))
        .collect::<Array>();
    vec![
        ("passage_tags", Dynamic::from_array(tags)),
        ("current_passage", Dynamic::from(state.current_passage.clone())),
        (
            "last_passage",
            state
                .last_passage
                .clone()
                .map(Dynamic::from)
                .unwrap_or(Dynamic::UNIT),
        ),
    ]
}

/// Extra read-only snapshot handed to template expressions.
pub(crate) fn template_constants(state: &GameState, features: Features) -> Vec<(&'static str, Dynamic)> {
    let flags = state
        .flags
        .iter()
        .map(|(name, value)| (name.clone(), ScValue::Bool(*value)))
        .collect();
    let metadata = serde_json::to_value(&state.metadata)
        .ok()
        .and_then(|value| serde_json::from_value::<ScValue>(value).ok())
        .unwrap_or_default();

    let mut constants = vec![
        ("flags", scvalue_to_dynamic(&ScValue::Map(flags))),
        ("variables", scvalue_to_dynamic(&ScValue::Map(state.variables.clone()))),
        ("metadata", scvalue_to_dynamic(&metadata)),
        ("game_title", Dynamic::from(state.metadata.title.clone())),
    ];
    if features.use_default_player {
        constants.push(("player", scvalue_to_dynamic(&state.player.to_value())));
    }
    constants.extend(context_constants(state));
    constants
}
