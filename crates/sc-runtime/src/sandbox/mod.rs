//! Rhai host for story fragments and template expressions.
//!
//! The engine starts from `Engine::new_raw()`; only the packages and
//! functions listed in [`CAPABILITIES`] are resolvable. A fresh engine is
//! built for every fragment (and once per template pass) so a `Session` never
//! holds Rhai state between calls.

mod bridge;
mod capabilities;
mod rng;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use rhai::module_resolvers::DummyModuleResolver;
use rhai::packages::{
    ArithmeticPackage, BasicArrayPackage, BasicIteratorPackage, BasicMapPackage,
    BasicMathPackage, BasicStringPackage, LogicPackage, MoreStringPackage, Package,
};
use rhai::{Dynamic, Engine, EvalAltResult, LexError, ParseErrorType, Position, Scope};
use sc_core::{
    ErrorKind, Features, GameState, Player, ProjectConfig, SandboxLimits, ScValue, ScribeError,
    SourceSpan,
};

pub use capabilities::{Capability, CapabilityClass, CAPABILITIES};

pub(crate) use bridge::{dynamic_to_scvalue, scvalue_to_dynamic};

const DISABLED_SYMBOLS: [&str; 8] = [
    "import",
    "export",
    "eval",
    "Fn",
    "call",
    "curry",
    "is_def_fn",
    "is_def_var",
];

const MAX_EXPR_DEPTH: usize = 64;
const MAX_FUNCTION_EXPR_DEPTH: usize = 32;

/// Which part of [`CAPABILITIES`] an engine was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Surface {
    template: bool,
    features: Features,
}

impl Surface {
    fn offers(self, name: &str) -> bool {
        CAPABILITIES.iter().any(|entry| {
            entry.name == name
                && (entry.in_templates || !self.template)
                && (!entry.requires_inventory || self.features.use_default_inventory)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxOptions {
    pub limits: SandboxLimits,
    pub features: Features,
    /// Pins `now()`/`timestamp()` and state timestamps.
    pub fixed_time: Option<DateTime<Utc>>,
    pub random_seed: Option<u32>,
}

impl SandboxOptions {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            limits: config.sandbox,
            features: config.features,
            fixed_time: None,
            random_seed: None,
        }
    }
}

/// Side channel filled by `write`, `redirect`, `print` and `debug_log`.
#[derive(Debug, Default)]
pub(crate) struct Effects {
    pub(crate) output: String,
    pub(crate) redirect: Option<String>,
    pub(crate) logs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentReport {
    /// Text produced through `write`; empty when the fragment failed.
    pub output: String,
    pub redirect: Option<String>,
    pub logs: Vec<String>,
    pub error: Option<ScribeError>,
}

impl FragmentReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Sandbox {
    options: SandboxOptions,
    rng_state: u32,
}

impl Sandbox {
    pub fn new(options: SandboxOptions) -> Self {
        let rng_state = options.random_seed.unwrap_or_else(rng::seed_from_clock);
        Self { options, rng_state }
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.options
    }

    pub fn capabilities() -> &'static [Capability] {
        CAPABILITIES
    }

    pub fn rng_state(&self) -> u32 {
        self.rng_state
    }

    pub fn set_rng_state(&mut self, state: u32) {
        self.rng_state = state;
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.options.fixed_time.unwrap_or_else(Utc::now)
    }

    fn base_engine(&self, rng: &Rc<Cell<u32>>, effects: &Rc<RefCell<Effects>>) -> Engine {
        let limits = &self.options.limits;
        let mut engine = Engine::new_raw();
        engine.register_global_module(ArithmeticPackage::new().as_shared_module());
        engine.register_global_module(LogicPackage::new().as_shared_module());
        engine.register_global_module(BasicStringPackage::new().as_shared_module());
        engine.register_global_module(MoreStringPackage::new().as_shared_module());
        engine.register_global_module(BasicArrayPackage::new().as_shared_module());
        engine.register_global_module(BasicMapPackage::new().as_shared_module());
        engine.register_global_module(BasicMathPackage::new().as_shared_module());
        engine.register_global_module(BasicIteratorPackage::new().as_shared_module());

        engine.set_module_resolver(DummyModuleResolver::new());
        for symbol in DISABLED_SYMBOLS {
            engine.disable_symbol(symbol);
        }
        engine.set_strict_variables(true);
        engine.set_max_operations(limits.max_operations);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);
        engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FUNCTION_EXPR_DEPTH);

        let sink = Rc::clone(effects);
        engine.on_print(move |text| {
            log::debug!(target: "scribe::script", "{}", text);
            sink.borrow_mut().logs.push(text.to_string());
        });
        let sink = Rc::clone(effects);
        engine.on_debug(move |text, _source, position| {
            let line = match position.line() {
                Some(line) => format!("[line {}] {}", line, text),
                None => text.to_string(),
            };
            log::debug!(target: "scribe::script", "{}", line);
            sink.borrow_mut().logs.push(line);
        });

        capabilities::register_pure(&mut engine);
        capabilities::register_library(&mut engine, rng, self.options.fixed_time);
        engine
    }

    /// Runs one fragment against `state`. Errors are contained in the report;
    /// state changes made before a failure are kept, the player attribute map
    /// is only merged back when the fragment completes.
    pub fn run_fragment(
        &mut self,
        state: &mut GameState,
        source: &str,
        span: &SourceSpan,
    ) -> FragmentReport {
        let features = self.options.features;
        let rng = Rc::new(Cell::new(self.rng_state));
        let effects = Rc::new(RefCell::new(Effects::default()));
        let shared = Rc::new(RefCell::new(std::mem::take(state)));
        let player_before = shared.borrow().player.to_value();

        let (result, player_after) = {
            let mut engine = self.base_engine(&rng, &effects);
            capabilities::register_state_readers(&mut engine, &shared, features);
            capabilities::register_state_writers(&mut engine, &shared, &effects, features);

            let mut scope = Scope::new();
            for (name, value) in capabilities::context_constants(&shared.borrow()) {
                scope.push_constant_dynamic(name, value);
            }
            if features.use_default_player {
                scope.push_dynamic("player", scvalue_to_dynamic(&player_before));
            }
            let result = engine.run_with_scope(&mut scope, source);
            let player_after = if features.use_default_player {
                scope.get_value::<Dynamic>("player")
            } else {
                None
            };
            (result, player_after)
        };

        self.rng_state = rng.get();
        *state = match Rc::try_unwrap(shared) {
            Ok(cell) => cell.into_inner(),
            Err(shared) => shared.borrow().clone(),
        };
        let Effects {
            output,
            redirect,
            logs,
        } = effects.take();

        let error = match result {
            Ok(()) => player_after.and_then(|after| {
                merge_player(&mut state.player, &player_before, after)
                    .err()
                    .map(|error| ScribeError { span: Some(span.clone()), ..error })
            }),
            Err(error) => Some(script_error(
                &error,
                span,
                Surface {
                    template: false,
                    features,
                },
            )),
        };

        match error {
            Some(error) => {
                log::warn!("fragment failed: {}", error);
                FragmentReport {
                    output: String::new(),
                    redirect: None,
                    logs,
                    error: Some(error),
                }
            }
            None => FragmentReport {
                output,
                redirect,
                logs,
                error: None,
            },
        }
    }

    /// Evaluates template expressions against a read-only copy of `state`.
    pub fn with_template<R>(
        &mut self,
        state: &GameState,
        render: impl FnOnce(&mut TemplateScope) -> R,
    ) -> R {
        let features = self.options.features;
        let rng = Rc::new(Cell::new(self.rng_state));
        let effects = Rc::new(RefCell::new(Effects::default()));
        let snapshot = Rc::new(RefCell::new(state.clone()));

        let mut engine = self.base_engine(&rng, &effects);
        capabilities::register_state_readers(&mut engine, &snapshot, features);

        let mut scope = Scope::new();
        for (name, value) in capabilities::template_constants(state, features) {
            scope.push_constant_dynamic(name, value);
        }

        let mut template = TemplateScope {
            engine,
            scope,
            surface: Surface {
                template: true,
                features,
            },
        };
        let out = render(&mut template);
        drop(template);
        self.rng_state = rng.get();
        out
    }
}

/// Expression evaluator handed out by [`Sandbox::with_template`].
pub struct TemplateScope {
    engine: Engine,
    scope: Scope<'static>,
    surface: Surface,
}

impl TemplateScope {
    pub fn eval(&mut self, source: &str, span: &SourceSpan) -> Result<ScValue, ScribeError> {
        let value = self
            .engine
            .eval_expression_with_scope::<Dynamic>(&mut self.scope, source)
            .map_err(|error| script_error(&error, span, self.surface))?;
        dynamic_to_scvalue(value).map_err(|error| ScribeError {
            span: Some(span.clone()),
            ..error
        })
    }

    /// Binds a loop variable; pair with [`TemplateScope::rewind`].
    pub fn bind(&mut self, name: &str, value: &ScValue) -> usize {
        let mark = self.scope.len();
        self.scope
            .push_constant_dynamic(name.to_string(), scvalue_to_dynamic(value));
        mark
    }

    pub fn rewind(&mut self, mark: usize) {
        self.scope.rewind(mark);
    }
}

fn merge_player(player: &mut Player, before: &ScValue, after: Dynamic) -> Result<(), ScribeError> {
    let after = dynamic_to_scvalue(after)?;
    let (Some(before), ScValue::Map(after)) = (before.as_map(), after) else {
        return Err(ScribeError::new(
            ErrorKind::SandboxRuntime,
            "SANDBOX_PLAYER_FIELD",
            "player must remain a map.",
        ));
    };
    for (key, value) in &after {
        if before.get(key) != Some(value) {
            player.set_field(key, value.clone()).map_err(|message| {
                ScribeError::new(ErrorKind::SandboxRuntime, "SANDBOX_PLAYER_FIELD", message)
            })?;
        }
    }
    for key in before.keys().filter(|key| !after.contains_key(*key)) {
        player.remove_field(key);
    }
    Ok(())
}

/// `set_flag (&str | ImmutableString | String, i64)` -> `set_flag`
fn called_name(signature: &str) -> &str {
    signature
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or(signature)
}

fn classify(error: &EvalAltResult, surface: Surface) -> (ErrorKind, &'static str) {
    match error {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => classify(inner, surface),
        EvalAltResult::ErrorFunctionNotFound(signature, _)
            if surface.offers(called_name(signature)) =>
        {
            (ErrorKind::SandboxRuntime, "SANDBOX_BAD_ARGUMENTS")
        }
        EvalAltResult::ErrorFunctionNotFound(..)
        | EvalAltResult::ErrorVariableNotFound(..)
        | EvalAltResult::ErrorModuleNotFound(..) => {
            (ErrorKind::SandboxCapability, "SANDBOX_NAME_NOT_FOUND")
        }
        EvalAltResult::ErrorTooManyOperations(..)
        | EvalAltResult::ErrorStackOverflow(..)
        | EvalAltResult::ErrorDataTooLarge(..) => {
            (ErrorKind::SandboxCapability, "SANDBOX_BUDGET_EXCEEDED")
        }
        EvalAltResult::ErrorParsing(kind, _) => match kind {
            ParseErrorType::VariableUndefined(_) | ParseErrorType::Reserved(_) => {
                (ErrorKind::SandboxCapability, "SANDBOX_NAME_NOT_FOUND")
            }
            ParseErrorType::BadInput(LexError::ImproperSymbol(symbol, _))
                if DISABLED_SYMBOLS.contains(&symbol.as_str()) =>
            {
                (ErrorKind::SandboxCapability, "SANDBOX_NAME_NOT_FOUND")
            }
            ParseErrorType::ExprTooDeep => {
                (ErrorKind::SandboxCapability, "SANDBOX_BUDGET_EXCEEDED")
            }
            _ => (ErrorKind::SandboxRuntime, "SANDBOX_SYNTAX"),
        },
        _ => (ErrorKind::SandboxRuntime, "SANDBOX_RUNTIME"),
    }
}

fn story_location(position: Position, span: &SourceSpan) -> SourceSpan {
    match (position.line(), position.position()) {
        (Some(line), Some(column)) => SourceSpan::at(span.offset(line, column)),
        (Some(line), None) => SourceSpan::at(span.offset(line, 1)),
        _ => span.clone(),
    }
}

pub(crate) fn script_error(
    error: &EvalAltResult,
    span: &SourceSpan,
    surface: Surface,
) -> ScribeError {
    let (kind, code) = classify(error, surface);
    ScribeError::with_span(kind, code, error.to_string(), story_location(error.position(), span))
}
