use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "scribe")]
#[command(about = "Scribe interactive-fiction engine CLI")]
pub(crate) struct Cli {
    /// Log engine traces to stderr.
    #[arg(long, global = true)]
    pub(crate) verbose: bool,
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    Agent(AgentArgs),
    /// Parse a story and report duplicate passages and dangling links.
    Check(CheckArgs),
    /// Dump the debug view of a fresh session as JSON.
    Inspect(InspectArgs),
    /// Play a story line by line on the terminal.
    Play(PlayArgs),
}

#[derive(Debug, Args)]
pub(crate) struct AgentArgs {
    #[command(subcommand)]
    pub(crate) command: AgentCommand,
}

#[derive(Debug, Subcommand)]
pub(crate) enum AgentCommand {
    Start(StartArgs),
    Go(GoArgs),
    Choose(ChooseArgs),
    Input(InputArgs),
}

#[derive(Debug, Args)]
pub(crate) struct StartArgs {
    #[arg(long = "story-dir")]
    pub(crate) story_dir: String,
    #[arg(long = "state-out")]
    pub(crate) state_out: String,
    #[arg(long)]
    pub(crate) debug: bool,
    #[arg(long)]
    pub(crate) seed: Option<u32>,
}

#[derive(Debug, Args)]
pub(crate) struct GoArgs {
    #[arg(long = "state-in")]
    pub(crate) state_in: String,
    #[arg(long = "passage")]
    pub(crate) passage: String,
    #[arg(long = "state-out")]
    pub(crate) state_out: String,
}

#[derive(Debug, Args)]
pub(crate) struct ChooseArgs {
    #[arg(long = "state-in")]
    pub(crate) state_in: String,
    #[arg(long = "link")]
    pub(crate) link: usize,
    #[arg(long = "state-out")]
    pub(crate) state_out: String,
}

#[derive(Debug, Args)]
pub(crate) struct InputArgs {
    #[arg(long = "state-in")]
    pub(crate) state_in: String,
    /// Dotted state path, e.g. `player.name` or `variables.quest.stage`.
    #[arg(long = "var")]
    pub(crate) var: String,
    /// JSON literal, or plain text when it does not parse as JSON.
    #[arg(long = "value")]
    pub(crate) value: String,
    #[arg(long = "next")]
    pub(crate) next: Option<String>,
    #[arg(long = "state-out")]
    pub(crate) state_out: String,
}

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    #[arg(long = "story-dir")]
    pub(crate) story_dir: String,
}

#[derive(Debug, Args)]
pub(crate) struct InspectArgs {
    #[arg(long = "story-dir")]
    pub(crate) story_dir: String,
    #[arg(long = "passage")]
    pub(crate) passage: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct PlayArgs {
    #[arg(long = "story-dir")]
    pub(crate) story_dir: String,
    #[arg(long = "saves-dir")]
    pub(crate) saves_dir: Option<String>,
    #[arg(long)]
    pub(crate) debug: bool,
    #[arg(long)]
    pub(crate) seed: Option<u32>,
}
