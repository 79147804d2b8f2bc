//! Command implementations
//!
//! Each command returns whether it succeeded; `main` turns that into the
//! exit code.

use super::{ApplyArgs, CheckArgs, PumpArgs, StripArgs};
use crate::app::{PumpOptions, StitcherApp};
use crate::check::CheckOptions;
use crate::refactor::MigrationSpec;
use anyhow::{Context, Result};
use console::Term;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use std::path::Path;

/// Ask a yes/no question; a non-interactive terminal answers no
pub fn confirm(prompt: &str) -> Result<bool> {
    if !Term::stdout().is_term() {
        return Ok(false);
    }
    let answer = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact_opt()
        .context("Failed to read confirmation")?;
    Ok(answer.unwrap_or(false))
}

/// Initialize sidecars and lock files
pub fn init(app: &StitcherApp) -> Result<bool> {
    app.init()?;
    Ok(true)
}

/// Run the consistency check
pub fn check(app: &StitcherApp, args: &CheckArgs) -> Result<bool> {
    let options = CheckOptions {
        force_relink: args.force_relink,
        reconcile: args.reconcile,
    };
    let report = app.check(&options, args.non_interactive)?;
    Ok(report.success())
}

/// Pump code doc strings into sidecars
pub fn pump(app: &StitcherApp, args: &PumpArgs) -> Result<bool> {
    let options = PumpOptions {
        strip: args.strip,
        force: args.force,
        reconcile: args.reconcile,
    };
    let report = app.pump(&options, args.non_interactive)?;
    Ok(report.success())
}

/// Inject sidecar docs into code
pub fn inject(app: &StitcherApp) -> Result<bool> {
    app.inject()?;
    Ok(true)
}

/// Strip doc strings from code after confirmation
pub fn strip(app: &StitcherApp, args: &StripArgs) -> Result<bool> {
    if !args.yes && !confirm("Remove all doc strings from source files?")? {
        println!("Strip cancelled.");
        return Ok(false);
    }
    app.strip()?;
    Ok(true)
}

/// Generate type stubs
pub fn generate(app: &StitcherApp) -> Result<bool> {
    app.generate()?;
    Ok(true)
}

/// Print documentation coverage
pub fn coverage(app: &StitcherApp) -> Result<bool> {
    app.coverage()?;
    Ok(true)
}

/// Refresh the index
pub fn index_build(app: &StitcherApp) -> Result<bool> {
    app.index_build()?;
    Ok(true)
}

/// Plan, preview, confirm and commit a migration
pub fn refactor_apply(app: &StitcherApp, args: &ApplyArgs) -> Result<bool> {
    let spec = MigrationSpec::load(Path::new(&args.spec))
        .with_context(|| format!("Failed to load migration spec {}", args.spec))?;
    let prepared = app.refactor_plan(&spec)?;

    if !app.refactor_preview(&prepared) || args.dry_run {
        return Ok(true);
    }
    if !args.yes && !confirm("Apply these changes?")? {
        app.refactor_aborted();
        return Ok(false);
    }

    app.refactor_commit(prepared)?;
    Ok(true)
}
