//! stitcher - Python doc strings kept in sidecar files
//!
//! This library provides the engine behind the `stitcher` command: a
//! semantic index of Python sources, YAML sidecars holding the
//! documentation, per-package lock files with accepted baselines, the
//! consistency check between the three, and a refactoring engine that
//! moves code, sidecars and locks together.

pub mod app;
pub mod check;
pub mod cli;
pub mod doc;
pub mod docstring;
pub mod error;
pub mod feedback;
pub mod fingerprint;
pub mod index;
pub mod interaction;
pub mod lang;
pub mod lock;
pub mod refactor;
pub mod suri;
pub mod transaction;
pub mod workspace;

/// Re-export commonly used types
pub use app::StitcherApp;
pub use error::{Result, StitcherError};
pub use suri::Suri;
pub use workspace::Workspace;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "stitcher";
