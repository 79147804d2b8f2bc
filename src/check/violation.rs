//! Typed violations and the context handed to an interaction handler

use crate::feedback::{msg, Level, Message};
use crate::interaction::ResolutionAction;
use similar::TextDiff;
use std::fmt;

/// Kind of problem found for one fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViolationKind {
    Missing,
    Pending,
    Redundant,
    Conflict,
    DanglingDoc,
    SignatureDrift,
    CoEvolution,
}

impl ViolationKind {
    /// Severity when the violation is left unresolved
    pub fn level(&self) -> Level {
        match self {
            ViolationKind::Missing | ViolationKind::Redundant => Level::Warning,
            _ => Level::Error,
        }
    }

    pub fn message_id(&self) -> &'static str {
        match self {
            ViolationKind::Missing => msg::check::ISSUE_MISSING,
            ViolationKind::Pending => msg::check::ISSUE_PENDING,
            ViolationKind::Redundant => msg::check::ISSUE_REDUNDANT,
            ViolationKind::Conflict => msg::check::ISSUE_CONFLICT,
            ViolationKind::DanglingDoc => msg::check::STATE_DANGLING_DOC,
            ViolationKind::SignatureDrift => msg::check::STATE_SIGNATURE_DRIFT,
            ViolationKind::CoEvolution => msg::check::STATE_CO_EVOLUTION,
        }
    }

    /// Actions an interaction handler may choose for this kind
    pub fn allowed_actions(&self) -> &'static [ResolutionAction] {
        use ResolutionAction::*;
        match self {
            ViolationKind::SignatureDrift => &[Relink, Skip, Abort],
            ViolationKind::CoEvolution => &[Reconcile, Relink, Skip, Abort],
            ViolationKind::DanglingDoc => &[PurgeDoc, Skip, Abort],
            ViolationKind::Conflict => &[HydrateOverwrite, HydrateKeepExisting, Skip, Abort],
            _ => &[Skip, Abort],
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            ViolationKind::DanglingDoc | ViolationKind::SignatureDrift | ViolationKind::CoEvolution
        )
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Missing => write!(f, "missing"),
            ViolationKind::Pending => write!(f, "pending"),
            ViolationKind::Redundant => write!(f, "redundant"),
            ViolationKind::Conflict => write!(f, "conflict"),
            ViolationKind::DanglingDoc => write!(f, "dangling_doc"),
            ViolationKind::SignatureDrift => write!(f, "signature_drift"),
            ViolationKind::CoEvolution => write!(f, "co_evolution"),
        }
    }
}

/// A reported problem for one fragment of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub file_path: String,
    pub fragment: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, file_path: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            kind,
            file_path: file_path.into(),
            fragment: fragment.into(),
        }
    }

    /// Feedback line for this violation
    pub fn message(&self) -> Message {
        Message::new(self.kind.level(), self.kind.message_id())
            .with("key", &self.fragment)
            .with("path", &self.file_path)
    }
}

/// What a handler sees when asked to decide on a violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionContext {
    pub file_path: String,
    pub fragment: String,
    pub kind: ViolationKind,
    /// Unified diff of the accepted vs current signature text
    pub signature_diff: Option<String>,
    /// Unified diff of two doc texts (pump conflicts)
    pub doc_diff: Option<String>,
    /// Current sidecar doc, rendered
    pub doc_text: Option<String>,
}

impl InteractionContext {
    pub fn new(kind: ViolationKind, file_path: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            fragment: fragment.into(),
            kind,
            signature_diff: None,
            doc_diff: None,
            doc_text: None,
        }
    }

    /// Attach a signature diff; nothing is attached when either side is unknown
    pub fn with_signature_diff(mut self, baseline: Option<&str>, current: Option<&str>) -> Self {
        if let (Some(old), Some(new)) = (baseline, current) {
            self.signature_diff = Some(unified_diff(old, new, "baseline", "current"));
        }
        self
    }

    pub fn with_doc_diff(mut self, old: &str, new: &str, old_label: &str, new_label: &str) -> Self {
        self.doc_diff = Some(unified_diff(old, new, old_label, new_label));
        self
    }

    pub fn with_doc_text(mut self, text: Option<String>) -> Self {
        self.doc_text = text;
        self
    }
}

/// Line-based unified diff with labelled headers
pub fn unified_diff(old: &str, new: &str, old_label: &str, new_label: &str) -> String {
    let old = ensure_newline(old);
    let new = ensure_newline(new);
    TextDiff::from_lines(old.as_str(), new.as_str())
        .unified_diff()
        .context_radius(3)
        .header(old_label, new_label)
        .to_string()
}

fn ensure_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_diff() {
        let ctx = InteractionContext::new(ViolationKind::SignatureDrift, "src/m.py", "func")
            .with_signature_diff(Some("def func(a: int):"), Some("def func(a: str):"));
        let diff = ctx.signature_diff.unwrap();
        assert!(diff.contains("--- baseline"));
        assert!(diff.contains("-def func(a: int):"));
        assert!(diff.contains("+def func(a: str):"));
    }

    #[test]
    fn test_missing_side_has_no_diff() {
        let ctx = InteractionContext::new(ViolationKind::SignatureDrift, "src/m.py", "func")
            .with_signature_diff(None, Some("def func():"));
        assert!(ctx.signature_diff.is_none());
    }

    #[test]
    fn test_violation_message() {
        let violation = Violation::new(ViolationKind::Missing, "src/m.py", "func");
        let message = violation.message();
        assert_eq!(message.level, Level::Warning);
        assert_eq!(message.id, msg::check::ISSUE_MISSING);
        assert_eq!(message.param("key"), Some("func"));
        assert_eq!(ViolationKind::CoEvolution.level(), Level::Error);
    }
}
