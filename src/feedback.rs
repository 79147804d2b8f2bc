//! User feedback channel
//!
//! The core never formats user-facing prose. Operations emit a [`Message`]
//! carrying an opaque identifier from [`msg`] plus structured parameters, and
//! a [`Feedback`] sink decides how to present it. [`ConsoleFeedback`] renders
//! the built-in English catalogue; [`MemoryFeedback`] records messages so tests
//! can assert on identifiers.

use console::style;
use std::cell::RefCell;
use std::fmt;

/// Message identifiers, grouped by the operation that emits them
pub mod msg {
    pub mod check {
        pub const RUN_SUCCESS: &str = "check.run.success";
        pub const RUN_SUCCESS_WITH_WARNINGS: &str = "check.run.success_with_warnings";
        pub const RUN_FAIL: &str = "check.run.fail";
        pub const RUN_ABORTED: &str = "check.run.aborted";
        pub const FILE_UNTRACKED: &str = "check.file.untracked";
        pub const FILE_WARN: &str = "check.file.warn";
        pub const FILE_FAIL: &str = "check.file.fail";
        pub const ISSUE_MISSING: &str = "check.issue.missing";
        pub const ISSUE_PENDING: &str = "check.issue.pending";
        pub const ISSUE_REDUNDANT: &str = "check.issue.redundant";
        pub const ISSUE_CONFLICT: &str = "check.issue.conflict";
        pub const STATE_DANGLING_DOC: &str = "check.state.dangling_doc";
        pub const STATE_SIGNATURE_DRIFT: &str = "check.state.signature_drift";
        pub const STATE_CO_EVOLUTION: &str = "check.state.co_evolution";
        pub const STATE_DOC_UPDATED: &str = "check.state.doc_updated";
        pub const STATE_RELINKED: &str = "check.state.relinked";
        pub const STATE_RECONCILED: &str = "check.state.reconciled";
        pub const STATE_PURGED: &str = "check.state.purged";
        pub const STATE_SIDECAR_DELETED: &str = "check.state.sidecar_deleted";
    }

    pub mod pump {
        pub const FILE_SUCCESS: &str = "pump.file.success";
        pub const ERROR_CONFLICT: &str = "pump.error.conflict";
        pub const INFO_RECONCILED: &str = "pump.info.reconciled";
        pub const RUN_COMPLETE: &str = "pump.run.complete";
        pub const RUN_NO_CHANGES: &str = "pump.run.no_changes";
        pub const RUN_CONFLICT: &str = "pump.run.conflict";
        pub const RUN_ABORTED: &str = "pump.run.aborted";
        pub const STRIP_FILE: &str = "pump.strip.file";
    }

    pub mod init {
        pub const FILE_CREATED: &str = "init.file.created";
        pub const RUN_COMPLETE: &str = "init.run.complete";
        pub const NO_DOCS_FOUND: &str = "init.no_docs_found";
    }

    pub mod inject {
        pub const FILE_SUCCESS: &str = "inject.file.success";
        pub const RUN_COMPLETE: &str = "inject.run.complete";
        pub const NO_DOCS_FOUND: &str = "inject.no_docs_found";
    }

    pub mod strip {
        pub const FILE_SUCCESS: &str = "strip.file.success";
        pub const RUN_COMPLETE: &str = "strip.run.complete";
    }

    pub mod generate {
        pub const FILE_SUCCESS: &str = "generate.file.success";
        pub const RUN_COMPLETE: &str = "generate.run.complete";
    }

    pub mod index {
        pub const RUN_START: &str = "index.run.start";
        pub const RUN_COMPLETE: &str = "index.run.complete";
        pub const FILE_FAILED: &str = "index.file.failed";
    }

    pub mod refactor {
        pub const PLANNING: &str = "refactor.run.planning";
        pub const NO_CHANGES: &str = "refactor.run.no_changes";
        pub const PREVIEW_HEADER: &str = "refactor.run.preview_header";
        pub const APPLYING: &str = "refactor.run.applying";
        pub const SUCCESS: &str = "refactor.run.success";
        pub const ABORTED: &str = "refactor.run.aborted";
        pub const SYMBOL_NOT_FOUND: &str = "refactor.warning.symbol_not_found";
    }

    pub mod lock {
        pub const CORRUPT: &str = "lock.warning.corrupt";
        pub const LEGACY_MIGRATED: &str = "lock.info.legacy_migrated";
    }

    pub mod error {
        pub const GENERIC: &str = "error.generic";
        pub const CONFIG: &str = "error.config";
    }
}

/// Severity of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => write!(f, "info"),
            Level::Success => write!(f, "success"),
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
        }
    }
}

/// A message identifier plus its structured parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub level: Level,
    pub id: &'static str,
    pub params: Vec<(&'static str, String)>,
}

impl Message {
    pub fn new(level: Level, id: &'static str) -> Self {
        Self {
            level,
            id,
            params: Vec::new(),
        }
    }

    pub fn info(id: &'static str) -> Self {
        Self::new(Level::Info, id)
    }

    pub fn success(id: &'static str) -> Self {
        Self::new(Level::Success, id)
    }

    pub fn warning(id: &'static str) -> Self {
        Self::new(Level::Warning, id)
    }

    pub fn error(id: &'static str) -> Self {
        Self::new(Level::Error, id)
    }

    /// Attach a named parameter
    pub fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.params.push((key, value.to_string()));
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Sink for user-facing messages
pub trait Feedback {
    fn emit(&self, message: Message);

    /// Free-form text that is not part of the catalogue (previews, tables)
    fn raw(&self, text: &str);
}

/// Renders messages to the terminal in English
#[derive(Debug, Default)]
pub struct ConsoleFeedback;

impl Feedback for ConsoleFeedback {
    fn emit(&self, message: Message) {
        let text = render(&message);
        match message.level {
            Level::Info => println!("{}", text),
            Level::Success => println!("{} {}", style("✓").green(), text),
            Level::Warning => eprintln!("{} {}", style("⚠").yellow(), text),
            Level::Error => eprintln!("{} {}", style("✗").red(), text),
        }
    }

    fn raw(&self, text: &str) {
        println!("{}", text);
    }
}

/// Records messages in memory
#[derive(Debug, Default)]
pub struct MemoryFeedback {
    messages: RefCell<Vec<Message>>,
    raw: RefCell<Vec<String>>,
}

impl MemoryFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.borrow().clone()
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.messages.borrow().iter().map(|m| m.id).collect()
    }

    pub fn has(&self, id: &str) -> bool {
        self.messages.borrow().iter().any(|m| m.id == id)
    }

    /// Messages with the given id
    pub fn find(&self, id: &str) -> Vec<Message> {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.id == id)
            .cloned()
            .collect()
    }

    pub fn at_level(&self, level: Level) -> Vec<Message> {
        self.messages
            .borrow()
            .iter()
            .filter(|m| m.level == level)
            .cloned()
            .collect()
    }

    pub fn raw_output(&self) -> String {
        self.raw.borrow().join("\n")
    }

    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
        self.raw.borrow_mut().clear();
    }
}

impl Feedback for MemoryFeedback {
    fn emit(&self, message: Message) {
        self.messages.borrow_mut().push(message);
    }

    fn raw(&self, text: &str) {
        self.raw.borrow_mut().push(text.to_string());
    }
}

fn template(id: &str) -> Option<&'static str> {
    use msg::*;

    let text = match id {
        check::RUN_SUCCESS => "Check passed.",
        check::RUN_SUCCESS_WITH_WARNINGS => "Check passed with {count} warning(s).",
        check::RUN_FAIL => "Check failed with {count} error(s).",
        check::RUN_ABORTED => "Check aborted; nothing was written.",
        check::FILE_UNTRACKED => "{path}: untracked ({count} public symbol(s) without a sidecar)",
        check::FILE_WARN => "{path}: {count} warning(s)",
        check::FILE_FAIL => "{path}: {count} error(s)",
        check::ISSUE_MISSING => "  [missing] {key}: public symbol is undocumented",
        check::ISSUE_PENDING => "  [pending] {key}: doc string in code is not in the sidecar",
        check::ISSUE_REDUNDANT => "  [redundant] {key}: doc string duplicated in code and sidecar",
        check::ISSUE_CONFLICT => "  [conflict] {key}: code and sidecar doc strings differ",
        check::STATE_DANGLING_DOC => "  [dangling] {key}: sidecar documents a symbol that no longer exists",
        check::STATE_SIGNATURE_DRIFT => "  [drift] {key}: signature changed but documentation did not",
        check::STATE_CO_EVOLUTION => "  [co-evolution] {key}: signature and documentation both changed",
        check::STATE_DOC_UPDATED => "  [doc updated] {key}: sidecar change accepted",
        check::STATE_RELINKED => "  [relinked] {key}: new signature accepted",
        check::STATE_RECONCILED => "  [reconciled] {key}: signature and documentation accepted",
        check::STATE_PURGED => "  [purged] {key}: dangling sidecar entry removed",
        check::STATE_SIDECAR_DELETED => "{path}: sidecar removed (no entries left)",
        pump::FILE_SUCCESS => "{path}: {count} doc string(s) pumped into the sidecar",
        pump::ERROR_CONFLICT => "  [conflict] {path}:{key}: code and sidecar doc strings differ",
        pump::INFO_RECONCILED => "{path}: {count} conflict(s) kept from the sidecar",
        pump::RUN_COMPLETE => "Pump complete: {count} file(s) updated.",
        pump::RUN_NO_CHANGES => "Nothing to pump.",
        pump::RUN_CONFLICT => "Pump stopped: {count} unresolved conflict(s).",
        pump::RUN_ABORTED => "Pump aborted; nothing was written.",
        pump::STRIP_FILE => "{path}: doc strings stripped",
        init::FILE_CREATED => "{path}: sidecar created",
        init::RUN_COMPLETE => "Initialized {count} file(s).",
        init::NO_DOCS_FOUND => "No doc strings found to initialize.",
        inject::FILE_SUCCESS => "{path}: doc strings injected",
        inject::RUN_COMPLETE => "Injected documentation into {count} file(s).",
        inject::NO_DOCS_FOUND => "No sidecar documentation found to inject.",
        strip::FILE_SUCCESS => "{path}: doc strings stripped",
        strip::RUN_COMPLETE => "Stripped doc strings from {count} file(s).",
        generate::FILE_SUCCESS => "{path}: stub written",
        generate::RUN_COMPLETE => "Generated {count} stub file(s).",
        index::RUN_START => "Indexing workspace...",
        index::RUN_COMPLETE => "Index updated: {added} added, {updated} updated, {deleted} deleted, {skipped} unchanged.",
        index::FILE_FAILED => "{path}: could not be analyzed ({reason})",
        refactor::PLANNING => "Planning refactor...",
        refactor::NO_CHANGES => "The migration produces no changes.",
        refactor::PREVIEW_HEADER => "Planned operations ({count}):",
        refactor::APPLYING => "Applying changes...",
        refactor::SUCCESS => "Refactor complete: {count} operation(s) applied.",
        refactor::ABORTED => "Refactor aborted.",
        refactor::SYMBOL_NOT_FOUND => "Symbol {fqn} was not found in the index.",
        lock::CORRUPT => "{path}: lock file is corrupt and was ignored",
        lock::LEGACY_MIGRATED => "Migrated {count} legacy signature file(s) into lock files.",
        error::GENERIC => "Error: {error}",
        error::CONFIG => "Configuration error: {error}",
        _ => return None,
    };
    Some(text)
}

/// Render a message with the English catalogue
pub fn render(message: &Message) -> String {
    match template(message.id) {
        Some(text) => {
            let mut out = text.to_string();
            for (key, value) in &message.params {
                out = out.replace(&format!("{{{}}}", key), value);
            }
            out
        }
        None => {
            let params: Vec<String> = message
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            format!("{} {}", message.id, params.join(" "))
        }
    }
}
