use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "threadscript")]
#[command(about = "ThreadScript compiler and agent player")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Compile a script and report its contacts and diagnostics.
    Compile(CompileArgs),
    Agent(AgentArgs),
}

#[derive(Debug, Args)]
pub(crate) struct CompileArgs {
    /// A .twee file, or a directory whose .twee files are read in path order.
    #[arg(long = "script")]
    pub(crate) script: String,
}

#[derive(Debug, Args)]
pub(crate) struct AgentArgs {
    #[command(subcommand)]
    pub(crate) command: AgentCommand,
}

#[derive(Debug, Subcommand)]
pub(crate) enum AgentCommand {
    Start(StartArgs),
    Choose(ChooseArgs),
    SetVar(SetVarArgs),
}

#[derive(Debug, Args)]
pub(crate) struct StartArgs {
    #[arg(long = "script")]
    pub(crate) script: String,
    #[arg(long = "state-out")]
    pub(crate) state_out: String,
    #[arg(long = "typing-delay")]
    pub(crate) typing_delay: Option<u64>,
}

#[derive(Debug, Args)]
pub(crate) struct ChooseArgs {
    #[arg(long = "state-in")]
    pub(crate) state_in: String,
    #[arg(long = "contact")]
    pub(crate) contact: String,
    #[arg(long = "choice")]
    pub(crate) choice: usize,
    #[arg(long = "state-out")]
    pub(crate) state_out: String,
}

#[derive(Debug, Args)]
pub(crate) struct SetVarArgs {
    #[arg(long = "state-in")]
    pub(crate) state_in: String,
    #[arg(long = "name")]
    pub(crate) name: String,
    /// Script literal: true/false, a number, or a string.
    #[arg(long = "value")]
    pub(crate) value: String,
    #[arg(long = "state-out")]
    pub(crate) state_out: String,
}
