//! Decisions the engine cannot make on its own
//!
//! Check and pump collect every violation that needs a human (or a policy)
//! into [`InteractionContext`] values and ask an [`InteractionHandler`] for
//! one [`ResolutionAction`] per context.

mod terminal;

pub use crate::check::violation::{InteractionContext, ViolationKind};
pub use terminal::TerminalInteractionHandler;

use crate::error::Result;
use std::collections::HashMap;
use std::fmt;

/// Resolution chosen for one interactive violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionAction {
    /// Accept the new signature, keep the accepted doc
    Relink,
    /// Accept both signature and doc as the new baseline
    Reconcile,
    /// Remove a dangling sidecar entry
    PurgeDoc,
    /// Code doc replaces the sidecar entry
    HydrateOverwrite,
    /// Sidecar entry is kept
    HydrateKeepExisting,
    /// Leave unresolved
    Skip,
    /// Stop the whole run
    Abort,
}

impl ResolutionAction {
    pub fn label(&self) -> &'static str {
        match self {
            ResolutionAction::Relink => "Relink (accept new signature, keep doc)",
            ResolutionAction::Reconcile => "Reconcile (accept signature and doc)",
            ResolutionAction::PurgeDoc => "Purge (remove the sidecar entry)",
            ResolutionAction::HydrateOverwrite => "Overwrite (code doc wins)",
            ResolutionAction::HydrateKeepExisting => "Keep existing (sidecar wins)",
            ResolutionAction::Skip => "Skip",
            ResolutionAction::Abort => "Abort",
        }
    }
}

impl fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionAction::Relink => write!(f, "RELINK"),
            ResolutionAction::Reconcile => write!(f, "RECONCILE"),
            ResolutionAction::PurgeDoc => write!(f, "PURGE_DOC"),
            ResolutionAction::HydrateOverwrite => write!(f, "HYDRATE_OVERWRITE"),
            ResolutionAction::HydrateKeepExisting => write!(f, "HYDRATE_KEEP_EXISTING"),
            ResolutionAction::Skip => write!(f, "SKIP"),
            ResolutionAction::Abort => write!(f, "ABORT"),
        }
    }
}

/// External decision maker
pub trait InteractionHandler {
    /// One action per context, in order
    fn decide(&mut self, contexts: &[InteractionContext]) -> Result<Vec<ResolutionAction>>;
}

/// Normalize handler output against the contexts it answered
///
/// Missing answers and actions a kind does not allow become `Skip`. Once
/// `Abort` appears every remaining decision becomes `Skip`. Returns the
/// actions and whether the run was aborted.
pub fn settle(contexts: &[InteractionContext], actions: Vec<ResolutionAction>) -> (Vec<ResolutionAction>, bool) {
    let mut aborted = false;
    let mut settled = Vec::with_capacity(contexts.len());

    for (idx, ctx) in contexts.iter().enumerate() {
        let action = actions.get(idx).copied().unwrap_or(ResolutionAction::Skip);
        if aborted {
            settled.push(ResolutionAction::Skip);
            continue;
        }
        match action {
            ResolutionAction::Abort => {
                aborted = true;
                settled.push(ResolutionAction::Skip);
            }
            action if ctx.kind.allowed_actions().contains(&action) => settled.push(action),
            _ => settled.push(ResolutionAction::Skip),
        }
    }

    (settled, aborted)
}

/// Non-interactive handler answering from command-line flags
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpInteractionHandler {
    pub force_relink: bool,
    pub reconcile: bool,
    /// Code wins pump conflicts
    pub force: bool,
}

impl NoOpInteractionHandler {
    pub fn for_check(force_relink: bool, reconcile: bool) -> Self {
        Self {
            force_relink,
            reconcile,
            force: false,
        }
    }

    pub fn for_pump(force: bool, reconcile: bool) -> Self {
        Self {
            force_relink: false,
            reconcile,
            force,
        }
    }

    /// Action the flags imply for a kind; `Skip` when they say nothing
    pub fn default_for(&self, kind: ViolationKind) -> ResolutionAction {
        match kind {
            ViolationKind::SignatureDrift if self.force_relink || self.reconcile => {
                ResolutionAction::Relink
            }
            ViolationKind::CoEvolution if self.reconcile => ResolutionAction::Reconcile,
            ViolationKind::Conflict if self.force => ResolutionAction::HydrateOverwrite,
            ViolationKind::Conflict if self.reconcile => ResolutionAction::HydrateKeepExisting,
            _ => ResolutionAction::Skip,
        }
    }
}

impl InteractionHandler for NoOpInteractionHandler {
    fn decide(&mut self, contexts: &[InteractionContext]) -> Result<Vec<ResolutionAction>> {
        Ok(contexts.iter().map(|ctx| self.default_for(ctx.kind)).collect())
    }
}

/// Handler answering from a fixed table, recording what it was asked
///
/// Useful for embedding the engine in other tools and in tests.
#[derive(Debug, Clone)]
pub struct ScriptedInteractionHandler {
    default: ResolutionAction,
    by_kind: HashMap<ViolationKind, ResolutionAction>,
    by_fragment: HashMap<String, ResolutionAction>,
    seen: Vec<InteractionContext>,
}

impl ScriptedInteractionHandler {
    pub fn new(default: ResolutionAction) -> Self {
        Self {
            default,
            by_kind: HashMap::new(),
            by_fragment: HashMap::new(),
            seen: Vec::new(),
        }
    }

    pub fn on_kind(mut self, kind: ViolationKind, action: ResolutionAction) -> Self {
        self.by_kind.insert(kind, action);
        self
    }

    /// Fragment answers take precedence over kind answers
    pub fn on_fragment(mut self, fragment: impl Into<String>, action: ResolutionAction) -> Self {
        self.by_fragment.insert(fragment.into(), action);
        self
    }

    pub fn seen(&self) -> &[InteractionContext] {
        &self.seen
    }
}

impl InteractionHandler for ScriptedInteractionHandler {
    fn decide(&mut self, contexts: &[InteractionContext]) -> Result<Vec<ResolutionAction>> {
        self.seen.extend(contexts.iter().cloned());
        Ok(contexts
            .iter()
            .map(|ctx| {
                self.by_fragment
                    .get(&ctx.fragment)
                    .or_else(|| self.by_kind.get(&ctx.kind))
                    .copied()
                    .unwrap_or(self.default)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(kind: ViolationKind, fragment: &str) -> InteractionContext {
        InteractionContext::new(kind, "src/m.py", fragment)
    }

    #[test]
    fn test_noop_flag_defaults() {
        let contexts = vec![
            ctx(ViolationKind::SignatureDrift, "a"),
            ctx(ViolationKind::CoEvolution, "b"),
            ctx(ViolationKind::DanglingDoc, "c"),
        ];

        let mut plain = NoOpInteractionHandler::default();
        assert_eq!(plain.decide(&contexts).unwrap(), vec![ResolutionAction::Skip; 3]);

        let mut relink = NoOpInteractionHandler::for_check(true, false);
        assert_eq!(
            relink.decide(&contexts).unwrap(),
            vec![ResolutionAction::Relink, ResolutionAction::Skip, ResolutionAction::Skip]
        );

        let mut reconcile = NoOpInteractionHandler::for_check(false, true);
        assert_eq!(
            reconcile.decide(&contexts).unwrap(),
            vec![ResolutionAction::Relink, ResolutionAction::Reconcile, ResolutionAction::Skip]
        );
    }

    #[test]
    fn test_settle_abort_skips_rest() {
        let contexts = vec![
            ctx(ViolationKind::SignatureDrift, "a"),
            ctx(ViolationKind::SignatureDrift, "b"),
            ctx(ViolationKind::SignatureDrift, "c"),
        ];
        let (actions, aborted) = settle(
            &contexts,
            vec![ResolutionAction::Relink, ResolutionAction::Abort, ResolutionAction::Relink],
        );
        assert!(aborted);
        assert_eq!(
            actions,
            vec![ResolutionAction::Relink, ResolutionAction::Skip, ResolutionAction::Skip]
        );
    }

    #[test]
    fn test_settle_rejects_foreign_actions() {
        let contexts = vec![ctx(ViolationKind::DanglingDoc, "gone"), ctx(ViolationKind::CoEvolution, "x")];
        let (actions, aborted) = settle(&contexts, vec![ResolutionAction::Relink]);
        assert!(!aborted);
        assert_eq!(actions, vec![ResolutionAction::Skip, ResolutionAction::Skip]);
    }

    #[test]
    fn test_scripted_handler() {
        let mut handler = ScriptedInteractionHandler::new(ResolutionAction::Skip)
            .on_kind(ViolationKind::DanglingDoc, ResolutionAction::PurgeDoc)
            .on_fragment("keep", ResolutionAction::Skip);
        let actions = handler
            .decide(&[ctx(ViolationKind::DanglingDoc, "gone"), ctx(ViolationKind::DanglingDoc, "keep")])
            .unwrap();
        assert_eq!(actions, vec![ResolutionAction::PurgeDoc, ResolutionAction::Skip]);
        assert_eq!(handler.seen().len(), 2);
    }
}
