use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dealprobe",
    version,
    about = "QA test orchestration for the Dealdesk admin console"
)]
pub struct Cli {
    /// Target environment config
    #[arg(long, default_value = "dealprobe.yaml", global = true)]
    pub config: PathBuf,

    /// Results database
    #[arg(long, default_value = ".dealprobe/results.db", global = true)]
    pub db: PathBuf,

    /// Reject unknown config keys instead of warning
    #[arg(long, global = true)]
    pub strict_config: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a sample config and create the results directory
    Init(InitArgs),
    Checks(ChecksArgs),
    Scenarios(ScenariosArgs),
    Scenario(ScenarioArgs),
    /// Print stored results plus a paste-ready failure report
    Report,
}

#[derive(clap::Args, Clone)]
pub struct InitArgs {
    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Clone)]
pub struct ChecksArgs {
    #[command(subcommand)]
    pub cmd: ChecksSub,
}

#[derive(Subcommand, Clone)]
pub enum ChecksSub {
    /// Run the automated check catalog against the target environment
    Run(RunArgs),
}

#[derive(Parser, Clone)]
pub struct ScenariosArgs {
    #[command(subcommand)]
    pub cmd: ScenariosSub,
}

#[derive(Subcommand, Clone)]
pub enum ScenariosSub {
    /// Run the automatic scenario catalog through the chat endpoint
    Run(RunArgs),
}

#[derive(clap::Args, Clone)]
pub struct RunArgs {
    /// Re-run only entries that failed last time
    #[arg(long)]
    pub failed_only: bool,
}

#[derive(Parser, Clone)]
pub struct ScenarioArgs {
    #[command(subcommand)]
    pub cmd: ScenarioSub,
}

#[derive(Subcommand, Clone)]
pub enum ScenarioSub {
    /// Record a manual tester verdict for one scenario
    Set {
        id: String,
        /// pass | fail | skip
        verdict: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Clear a scenario back to pending
    Reset { id: String },
    /// List the scenario catalog with current statuses
    List,
}
