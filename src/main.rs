//! stitcher - Python doc strings kept in sidecar files
//!
//! Externalises doc strings into YAML sidecars, keeps them in step with the
//! code through baselines in lock files, and refactors code, sidecars and
//! locks together.

use anyhow::Result;
use stitcher::app::{error_message, StitcherApp};
use stitcher::cli::{self, Cli, Commands, IndexCommands, RefactorCommands};
use stitcher::feedback::{ConsoleFeedback, Feedback};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();

    let feedback = ConsoleFeedback;
    match run(&cli, &feedback) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            feedback.emit(error_message(&e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, feedback: &dyn Feedback) -> Result<bool> {
    let app = StitcherApp::discover(Path::new(&cli.path), feedback)?;

    // Execute command
    match &cli.command {
        Commands::Init => cli::init(&app),
        Commands::Check(args) => cli::check(&app, args),
        Commands::Pump(args) => cli::pump(&app, args),
        Commands::Inject => cli::inject(&app),
        Commands::Strip(args) => cli::strip(&app, args),
        Commands::Generate => cli::generate(&app),
        Commands::Cov => cli::coverage(&app),
        Commands::Index(args) => match args.command {
            IndexCommands::Build => cli::index_build(&app),
        },
        Commands::Refactor(args) => match &args.command {
            RefactorCommands::Apply(apply) => cli::refactor_apply(&app, apply),
        },
    }
}
