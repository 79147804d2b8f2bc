//! Prompting handler for interactive terminals

use super::{InteractionContext, InteractionHandler, ResolutionAction};
use crate::error::{Result, StitcherError};
use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;

/// Asks the user about each violation with a selection menu
pub struct TerminalInteractionHandler {
    term: Term,
    theme: ColorfulTheme,
}

impl TerminalInteractionHandler {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            theme: ColorfulTheme::default(),
        }
    }

    /// Whether prompting makes sense for the current process
    pub fn is_available() -> bool {
        Term::stdout().is_term() && Term::stderr().is_term()
    }

    fn show(&self, idx: usize, total: usize, ctx: &InteractionContext) -> Result<()> {
        self.term.write_line("")?;
        self.term.write_line(&format!(
            "{} {} {}",
            style(format!("[{}/{}]", idx + 1, total)).dim(),
            style(ctx.kind.to_string()).yellow().bold(),
            style(format!("{}::{}", ctx.file_path, ctx.fragment)).cyan()
        ))?;

        if let Some(diff) = &ctx.signature_diff {
            self.term.write_line(&style("Signature:").bold().to_string())?;
            self.write_diff(diff)?;
        }
        if let Some(diff) = &ctx.doc_diff {
            self.term.write_line(&style("Documentation:").bold().to_string())?;
            self.write_diff(diff)?;
        } else if let Some(text) = &ctx.doc_text {
            self.term.write_line(&style("Documentation:").bold().to_string())?;
            for line in text.lines() {
                self.term.write_line(&format!("  {}", line))?;
            }
        }
        Ok(())
    }

    fn write_diff(&self, diff: &str) -> Result<()> {
        for line in diff.lines() {
            let styled = if line.starts_with("+++") || line.starts_with("---") {
                style(line).dim()
            } else if line.starts_with('+') {
                style(line).green()
            } else if line.starts_with('-') {
                style(line).red()
            } else if line.starts_with("@@") {
                style(line).cyan()
            } else {
                style(line)
            };
            self.term.write_line(&format!("  {}", styled))?;
        }
        Ok(())
    }
}

impl Default for TerminalInteractionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionHandler for TerminalInteractionHandler {
    fn decide(&mut self, contexts: &[InteractionContext]) -> Result<Vec<ResolutionAction>> {
        let mut actions = Vec::with_capacity(contexts.len());

        for (idx, ctx) in contexts.iter().enumerate() {
            self.show(idx, contexts.len(), ctx)?;

            let allowed = ctx.kind.allowed_actions();
            let labels: Vec<&str> = allowed.iter().map(|a| a.label()).collect();
            let choice = Select::with_theme(&self.theme)
                .with_prompt("Resolution")
                .items(&labels)
                .default(0)
                .interact_on_opt(&self.term)
                .map_err(|e| StitcherError::Io(std::io::Error::other(e.to_string())))?;

            // Escape counts as skip
            let action = choice
                .and_then(|i| allowed.get(i).copied())
                .unwrap_or(ResolutionAction::Skip);
            actions.push(action);
            if action == ResolutionAction::Abort {
                break;
            }
        }

        Ok(actions)
    }
}
