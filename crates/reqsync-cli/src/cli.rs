use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "reqsync",
    about = "Version control and sync for API request collections",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "reqsync.toml")]
    pub config: PathBuf,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute or apply binary deltas
    Delta(DeltaArgs),
    /// Pull a backend project into the local repository
    Pull(PullArgs),
    /// Stage every document of a project and commit
    Commit(CommitArgs),
    /// Push the current branch of a project
    Push(ProjectArgs),
    /// Show commit history of the current branch
    Log(LogArgs),
    /// List local branches
    Branches(ProjectArgs),
    /// List branches on the remote
    RemoteBranches(ProjectArgs),
    /// Manage team access on the remote directory
    Access(AccessArgs),
}

#[derive(Args)]
pub struct DeltaArgs {
    #[command(subcommand)]
    pub action: DeltaAction,
}

#[derive(Subcommand)]
pub enum DeltaAction {
    /// Write a delta that turns SOURCE into TARGET
    Diff {
        source: PathBuf,
        target: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = reqsync_delta::DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// Apply DELTA to SOURCE
    Patch {
        source: PathBuf,
        delta: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args)]
pub struct PullArgs {
    /// JSON file describing the backend project
    pub project: PathBuf,
}

#[derive(Args)]
pub struct ProjectArgs {
    /// Backend project id
    pub project: String,
}

#[derive(Args)]
pub struct CommitArgs {
    pub project: String,
    #[arg(short, long)]
    pub message: String,
}

#[derive(Args)]
pub struct LogArgs {
    pub project: String,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct AccessArgs {
    #[command(subcommand)]
    pub action: AccessAction,
}

#[derive(Subcommand)]
pub enum AccessAction {
    Grant { team: String },
    Revoke { team: String },
}
