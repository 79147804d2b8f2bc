//! CLI interface using clap
//!
//! Provides the command-line interface for stitcher

mod commands;

pub use commands::*;

use clap::{Parser, Subcommand};

/// stitcher - keep Python doc strings in sidecar files, in sync with code
#[derive(Parser, Debug)]
#[command(name = "stitcher")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path inside the workspace (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub path: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move code doc strings into sidecars and record baselines
    Init,

    /// Compare code, sidecars and baselines
    Check(CheckArgs),

    /// Pump new code doc strings into sidecars
    Pump(PumpArgs),

    /// Write sidecar docs back into code
    Inject,

    /// Remove all doc strings from code
    Strip(StripArgs),

    /// Generate .pyi stubs carrying the sidecar docs
    Generate,

    /// Show documentation coverage of public symbols
    Cov,

    /// Manage the semantic index
    Index(IndexArgs),

    /// Apply declarative refactorings
    Refactor(RefactorArgs),
}

/// Arguments for check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Accept changed signatures whose documentation did not change
    #[arg(long)]
    pub force_relink: bool,

    /// Accept changed signatures together with changed documentation
    #[arg(long)]
    pub reconcile: bool,

    /// Never prompt; unresolved conflicts fail the check
    #[arg(long)]
    pub non_interactive: bool,
}

/// Arguments for pump command
#[derive(Parser, Debug)]
pub struct PumpArgs {
    /// Strip pumped doc strings from code
    #[arg(long)]
    pub strip: bool,

    /// Code wins conflicts
    #[arg(long, conflicts_with = "reconcile")]
    pub force: bool,

    /// Sidecar wins conflicts
    #[arg(long)]
    pub reconcile: bool,

    /// Never prompt; unresolved conflicts fail the pump
    #[arg(long)]
    pub non_interactive: bool,
}

/// Arguments for strip command
#[derive(Parser, Debug)]
pub struct StripArgs {
    /// Strip without confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for index command
#[derive(Parser, Debug)]
pub struct IndexArgs {
    #[command(subcommand)]
    pub command: IndexCommands,
}

#[derive(Subcommand, Debug)]
pub enum IndexCommands {
    /// Refresh the index from the workspace
    Build,
}

/// Arguments for refactor command
#[derive(Parser, Debug)]
pub struct RefactorArgs {
    #[command(subcommand)]
    pub command: RefactorCommands,
}

#[derive(Subcommand, Debug)]
pub enum RefactorCommands {
    /// Plan and apply a migration spec
    Apply(ApplyArgs),
}

/// Arguments for refactor apply
#[derive(Parser, Debug)]
pub struct ApplyArgs {
    /// Migration spec (.toml, .json or .yaml)
    pub spec: String,

    /// Show the planned operations without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Apply without confirmation
    #[arg(short, long)]
    pub yes: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
