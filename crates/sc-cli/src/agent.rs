use std::path::Path;

use sc_core::ScribeError;
use sc_runtime::{RenderedPassage, Session, SessionOptions};

use crate::{
    create_session_for_story, emit_render_with_saved_state, load_session_from_state,
    load_story_by_dir, parse_input_value, AgentArgs, AgentCommand, ChooseArgs, GoArgs, InputArgs,
    StartArgs,
};

pub(super) fn run_agent(args: AgentArgs) -> Result<i32, ScribeError> {
    match args.command {
        AgentCommand::Start(args) => run_start(args),
        AgentCommand::Go(args) => run_go(args),
        AgentCommand::Choose(args) => run_choose(args),
        AgentCommand::Input(args) => run_input(args),
    }
}

pub(super) fn run_start(args: StartArgs) -> Result<i32, ScribeError> {
    let story = load_story_by_dir(&args.story_dir)?;
    let mut session = create_session_for_story(
        &story,
        SessionOptions {
            debug: args.debug,
            random_seed: args.seed,
            fixed_time: None,
        },
    )?;
    let rendered = session.start()?;
    emit_render_with_saved_state(&session, &rendered, &args.state_out, &story.id)
}

pub(super) fn run_go(args: GoArgs) -> Result<i32, ScribeError> {
    run_state_transition(&args.state_in, &args.state_out, |session| {
        session.goto(&args.passage)
    })
}

pub(super) fn run_choose(args: ChooseArgs) -> Result<i32, ScribeError> {
    run_state_transition(&args.state_in, &args.state_out, |session| {
        session.choose(args.link)
    })
}

pub(super) fn run_input(args: InputArgs) -> Result<i32, ScribeError> {
    let value = parse_input_value(&args.value);
    run_state_transition(&args.state_in, &args.state_out, |session| {
        session.submit_input(&args.var, value, args.next.as_deref())
    })
}

fn run_state_transition(
    state_in: &str,
    state_out: &str,
    transition: impl FnOnce(&mut Session) -> Result<RenderedPassage, ScribeError>,
) -> Result<i32, ScribeError> {
    let (state, mut session) = load_session_from_state(Path::new(state_in))?;
    let rendered = transition(&mut session)?;
    emit_render_with_saved_state(&session, &rendered, state_out, &state.story_ref)
}
