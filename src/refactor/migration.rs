//! Declarative migration specs
//!
//! A spec is a file with an `operations` list, in TOML, JSON or YAML:
//!
//! ```toml
//! [[operations]]
//! op = "rename_symbol"
//! old_fqn = "pkg.bus.MessageBus"
//! new_fqn = "pkg.bus.FeedbackBus"
//! ```

use crate::error::{Result, StitcherError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One declared refactoring operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    RenameSymbol { old_fqn: String, new_fqn: String },
    MoveFile { src: String, dest: String },
    DeleteFile { path: String },
    DeleteDirectory { path: String },
    Scaffold {
        path: String,
        #[serde(default)]
        content: String,
    },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::RenameSymbol { old_fqn, new_fqn } => {
                write!(f, "rename_symbol({}, {})", old_fqn, new_fqn)
            }
            Operation::MoveFile { src, dest } => write!(f, "move_file({}, {})", src, dest),
            Operation::DeleteFile { path } => write!(f, "delete_file({})", path),
            Operation::DeleteDirectory { path } => write!(f, "delete_directory({})", path),
            Operation::Scaffold { path, .. } => write!(f, "scaffold({})", path),
        }
    }
}

/// Ordered list of operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSpec {
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl MigrationSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename_symbol(mut self, old_fqn: impl Into<String>, new_fqn: impl Into<String>) -> Self {
        self.operations.push(Operation::RenameSymbol {
            old_fqn: old_fqn.into(),
            new_fqn: new_fqn.into(),
        });
        self
    }

    pub fn move_file(mut self, src: impl Into<String>, dest: impl Into<String>) -> Self {
        self.operations.push(Operation::MoveFile {
            src: src.into(),
            dest: dest.into(),
        });
        self
    }

    pub fn delete_file(mut self, path: impl Into<String>) -> Self {
        self.operations.push(Operation::DeleteFile { path: path.into() });
        self
    }

    pub fn delete_directory(mut self, path: impl Into<String>) -> Self {
        self.operations
            .push(Operation::DeleteDirectory { path: path.into() });
        self
    }

    pub fn scaffold(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.operations.push(Operation::Scaffold {
            path: path.into(),
            content: content.into(),
        });
        self
    }

    /// Load a spec, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StitcherError::MigrationSpec {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

        let parsed = match ext {
            "toml" => toml::from_str::<Self>(&content).map_err(|e| e.to_string()),
            "json" => serde_json::from_str::<Self>(&content).map_err(|e| e.to_string()),
            "yaml" | "yml" => serde_yaml::from_str::<Self>(&content).map_err(|e| e.to_string()),
            other => Err(format!("unsupported spec format '.{}'", other)),
        };

        let spec = parsed.map_err(|reason| StitcherError::MigrationSpec {
            path: path.to_path_buf(),
            reason,
        })?;
        spec.validate().map_err(|reason| StitcherError::MigrationSpec {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(spec)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        for op in &self.operations {
            let empty = match op {
                Operation::RenameSymbol { old_fqn, new_fqn } => old_fqn.is_empty() || new_fqn.is_empty(),
                Operation::MoveFile { src, dest } => src.is_empty() || dest.is_empty(),
                Operation::DeleteFile { path }
                | Operation::DeleteDirectory { path }
                | Operation::Scaffold { path, .. } => path.is_empty(),
            };
            if empty {
                return Err(format!("{} has an empty argument", op));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_each_format() {
        let dir = TempDir::new().unwrap();
        let expected = MigrationSpec::new()
            .rename_symbol("pkg.bus.MessageBus", "pkg.bus.FeedbackBus")
            .move_file("pkg/bus.py", "pkg/transport.py");

        let toml_path = dir.path().join("m.toml");
        std::fs::write(
            &toml_path,
            r#"
[[operations]]
op = "rename_symbol"
old_fqn = "pkg.bus.MessageBus"
new_fqn = "pkg.bus.FeedbackBus"

[[operations]]
op = "move_file"
src = "pkg/bus.py"
dest = "pkg/transport.py"
"#,
        )
        .unwrap();
        assert_eq!(MigrationSpec::load(&toml_path).unwrap(), expected);

        let json_path = dir.path().join("m.json");
        std::fs::write(&json_path, serde_json::to_string(&expected).unwrap()).unwrap();
        assert_eq!(MigrationSpec::load(&json_path).unwrap(), expected);

        let yaml_path = dir.path().join("m.yaml");
        std::fs::write(
            &yaml_path,
            "operations:\n  - op: rename_symbol\n    old_fqn: pkg.bus.MessageBus\n    new_fqn: pkg.bus.FeedbackBus\n  - op: move_file\n    src: pkg/bus.py\n    dest: pkg/transport.py\n",
        )
        .unwrap();
        assert_eq!(MigrationSpec::load(&yaml_path).unwrap(), expected);
    }

    #[test]
    fn test_rejects_bad_specs() {
        let dir = TempDir::new().unwrap();
        let unknown = dir.path().join("m.toml");
        std::fs::write(&unknown, "[[operations]]\nop = \"explode\"\n").unwrap();
        assert!(matches!(
            MigrationSpec::load(&unknown),
            Err(StitcherError::MigrationSpec { .. })
        ));

        let empty = dir.path().join("e.json");
        std::fs::write(&empty, r#"{"operations": [{"op": "delete_file", "path": ""}]}"#).unwrap();
        assert!(MigrationSpec::load(&empty).is_err());

        let txt = dir.path().join("m.txt");
        std::fs::write(&txt, "").unwrap();
        assert!(MigrationSpec::load(&txt).is_err());
    }
}
