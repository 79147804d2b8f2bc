//! Stitcher configuration read from `pyproject.toml`

use super::{Workspace, MANIFEST};
use crate::docstring::DocstringStyle;
use crate::error::{Result, StitcherError};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Settings for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    /// Target name (`default` when no targets table exists)
    pub name: String,
    /// Workspace-relative directories to scan (`.` for everything)
    pub scan_paths: Vec<String>,
    /// Sidecar value style
    pub docstring_style: DocstringStyle,
    /// Directory for generated stubs; stubs sit next to sources when unset
    pub stub_path: Option<String>,
    /// Path patterns to skip
    pub exclude: Vec<String>,
}

impl TargetConfig {
    /// Whether a workspace-relative path belongs to this target
    pub fn includes(&self, path: &str) -> bool {
        let in_scan = self.scan_paths.iter().any(|scan| {
            let scan = scan.trim_end_matches('/');
            scan == "." || scan.is_empty() || path == scan || path.starts_with(&format!("{}/", scan))
        });
        in_scan && !self.exclude.iter().any(|p| matches_pattern(p, path))
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            scan_paths: vec![".".to_string()],
            docstring_style: DocstringStyle::default(),
            stub_path: None,
            exclude: Vec::new(),
        }
    }
}

/// Full configuration: one or more targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StitcherConfig {
    pub targets: Vec<TargetConfig>,
}

impl Default for StitcherConfig {
    fn default() -> Self {
        Self {
            targets: vec![TargetConfig::default()],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    tool: Option<ToolTable>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    #[serde(default)]
    stitcher: Option<RawStitcher>,
}

#[derive(Debug, Default, Clone, Deserialize)]
struct RawTarget {
    scan_paths: Option<Vec<String>>,
    docstring_style: Option<DocstringStyle>,
    stub_path: Option<String>,
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStitcher {
    #[serde(flatten)]
    base: RawTarget,
    #[serde(default)]
    targets: BTreeMap<String, RawTarget>,
}

impl RawTarget {
    fn resolve(&self, name: &str, defaults: &RawTarget) -> TargetConfig {
        let fallback = TargetConfig::default();
        TargetConfig {
            name: name.to_string(),
            scan_paths: self
                .scan_paths
                .clone()
                .or_else(|| defaults.scan_paths.clone())
                .unwrap_or(fallback.scan_paths),
            docstring_style: self
                .docstring_style
                .or(defaults.docstring_style)
                .unwrap_or(fallback.docstring_style),
            stub_path: self.stub_path.clone().or_else(|| defaults.stub_path.clone()),
            exclude: self
                .exclude
                .clone()
                .or_else(|| defaults.exclude.clone())
                .unwrap_or_default(),
        }
    }
}

impl StitcherConfig {
    /// Load `[tool.stitcher]` from the root manifest or return defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let manifest = root.join(MANIFEST);
        if !manifest.is_file() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&manifest)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from manifest text
    pub fn from_toml(content: &str) -> Result<Self> {
        let project: PyProject = toml::from_str(content)
            .map_err(|e| StitcherError::Config(format!("{}: {}", MANIFEST, e)))?;

        let Some(raw) = project.tool.and_then(|t| t.stitcher) else {
            return Ok(Self::default());
        };

        if raw.targets.is_empty() {
            return Ok(Self {
                targets: vec![raw.base.resolve("default", &RawTarget::default())],
            });
        }

        let targets = raw
            .targets
            .iter()
            .map(|(name, target)| target.resolve(name, &raw.base))
            .collect();

        Ok(Self { targets })
    }

    /// Reject targets whose source sets overlap, since they would share sidecars
    pub fn validate_disjoint(&self, workspace: &Workspace) -> Result<()> {
        if self.targets.len() < 2 {
            return Ok(());
        }

        let mut owner: BTreeMap<String, String> = BTreeMap::new();
        for target in &self.targets {
            let files: BTreeSet<String> = workspace.source_files(target)?.into_iter().collect();
            for file in files {
                if let Some(previous) = owner.insert(file.clone(), target.name.clone()) {
                    return Err(StitcherError::Config(format!(
                        "targets '{}' and '{}' both include {}; targets may not share sidecars",
                        previous, target.name, file
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Simple glob matching helper supporting `*` and `**`
fn matches_pattern(pattern: &str, path: &str) -> bool {
    if pattern.contains("**") {
        let parts: Vec<&str> = pattern.split("**").collect();
        if parts.len() == 2 {
            let prefix = parts[0].trim_end_matches('/');
            let suffix = parts[1].trim_start_matches('/');
            let suffix = suffix.trim_start_matches('*');
            return (prefix.is_empty() || path.starts_with(prefix))
                && (suffix.is_empty() || path.ends_with(suffix));
        }
    }

    if pattern.contains('*') {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 2 {
            return path.starts_with(parts[0]) && path.ends_with(parts[1]);
        }
    }

    let pattern = pattern.trim_end_matches('/');
    path == pattern || path.starts_with(&format!("{}/", pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = StitcherConfig::from_toml("[project]\nname = \"x\"\n").unwrap();
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].scan_paths, vec!["."]);
        assert_eq!(config.targets[0].docstring_style, DocstringStyle::Raw);
    }

    #[test]
    fn test_single_target() {
        let config = StitcherConfig::from_toml(
            r#"
[tool.stitcher]
scan_paths = ["src"]
docstring_style = "google"
stub_path = "typings"
"#,
        )
        .unwrap();
        let target = &config.targets[0];
        assert_eq!(target.scan_paths, vec!["src"]);
        assert_eq!(target.docstring_style, DocstringStyle::Google);
        assert_eq!(target.stub_path.as_deref(), Some("typings"));
    }

    #[test]
    fn test_multi_target_inherits_base() {
        let config = StitcherConfig::from_toml(
            r#"
[tool.stitcher]
docstring_style = "google"

[tool.stitcher.targets.core]
scan_paths = ["packages/core"]

[tool.stitcher.targets.cli]
scan_paths = ["packages/cli"]
docstring_style = "raw"
"#,
        )
        .unwrap();
        assert_eq!(config.targets.len(), 2);
        let cli = config.targets.iter().find(|t| t.name == "cli").unwrap();
        let core = config.targets.iter().find(|t| t.name == "core").unwrap();
        assert_eq!(cli.docstring_style, DocstringStyle::Raw);
        assert_eq!(core.docstring_style, DocstringStyle::Google);
    }

    #[test]
    fn test_target_includes() {
        let target = TargetConfig {
            scan_paths: vec!["src".into()],
            exclude: vec!["src/generated/**".into()],
            ..TargetConfig::default()
        };
        assert!(target.includes("src/m.py"));
        assert!(!target.includes("srcx/m.py"));
        assert!(!target.includes("src/generated/x.py"));
        assert!(!target.includes("tests/t.py"));
    }

    #[test]
    fn test_overlapping_targets_rejected() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/a")).unwrap();
        fs::write(dir.path().join("src/a/m.py"), "x = 1\n").unwrap();
        fs::write(
            dir.path().join("pyproject.toml"),
            r#"
[tool.stitcher.targets.one]
scan_paths = ["src"]

[tool.stitcher.targets.two]
scan_paths = ["src/a"]
"#,
        )
        .unwrap();

        let ws = Workspace::open(dir.path()).unwrap();
        let err = ws.config().validate_disjoint(&ws).unwrap_err();
        assert!(err.to_string().contains("share sidecars"));
    }

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("*.py", "m.py"));
        assert!(matches_pattern("build", "build/x.py"));
        assert!(matches_pattern("docs/**/*.py", "docs/a/b.py"));
        assert!(!matches_pattern("build", "builder/x.py"));
    }
}
