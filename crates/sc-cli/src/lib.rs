use std::ffi::OsString;

use clap::Parser;
use sc_core::ScribeError;

mod agent;
mod cli_args;
mod error_map;
mod inspect;
mod line_play;
mod logger;
mod models;
mod render_output;
mod session_ops;
mod source_loader;
mod state_store;

pub(crate) use cli_args::{
    AgentArgs, AgentCommand, CheckArgs, ChooseArgs, Cli, GoArgs, InputArgs, InspectArgs, Mode,
    PlayArgs, StartArgs,
};
pub(crate) use error_map::{emit_error, CliFailure};
pub(crate) use models::{
    AgentState, LineCommandAction, LineCommandContext, LoadedStory, AGENT_STATE_SCHEMA,
    DEFAULT_SAVES_DIR, STORY_REF_PREFIX,
};
pub(crate) use render_output::emit_render;
pub(crate) use session_ops::{
    create_session_for_story, emit_render_with_saved_state, load_session_from_state,
    parse_input_value,
};
pub(crate) use source_loader::{load_story_by_dir, load_story_by_ref};
pub(crate) use state_store::{load_agent_state, save_agent_state};

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    logger::init_logger(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, ScribeError> {
    match cli.command {
        Mode::Agent(args) => agent::run_agent(args),
        Mode::Check(args) => inspect::run_check(args),
        Mode::Inspect(args) => inspect::run_inspect(args),
        Mode::Play(args) => line_play::run_play(args),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_arguments_return_clap_exit_code() {
        assert_eq!(run_cli_from_args(["scribe", "agent", "choose"]), 2);
        assert_eq!(run_cli_from_args(["scribe", "unknown"]), 2);
    }

    #[test]
    fn command_errors_exit_with_one() {
        assert_eq!(
            run_cli_from_args([
                "scribe",
                "agent",
                "go",
                "--state-in",
                "/definitely/missing/state.json",
                "--passage",
                "start",
                "--state-out",
                "/tmp/unused.json",
            ]),
            1
        );
    }
}
