//! `cov`: documentation coverage of public symbols

use super::StitcherApp;
use crate::doc::code_fragments;
use crate::lang::is_public_fragment;
use anyhow::Result;

/// Coverage of one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageRow {
    pub path: String,
    /// Public definitions with a sidecar doc
    pub documented: usize,
    /// Public definitions
    pub total: usize,
}

impl CoverageRow {
    pub fn percent(&self) -> f64 {
        percent(self.documented, self.total)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageReport {
    pub rows: Vec<CoverageRow>,
}

impl CoverageReport {
    pub fn documented(&self) -> usize {
        self.rows.iter().map(|r| r.documented).sum()
    }

    pub fn total(&self) -> usize {
        self.rows.iter().map(|r| r.total).sum()
    }

    pub fn percent(&self) -> f64 {
        percent(self.documented(), self.total())
    }

    /// Plain-text table with a total line
    pub fn render(&self) -> String {
        let width = self
            .rows
            .iter()
            .map(|r| r.path.len())
            .max()
            .unwrap_or(0)
            .max("TOTAL".len())
            .max("Name".len());

        let mut out = format!("{:<width$}  {:>6}  {:>6}  {:>6}\n", "Name", "Docs", "Total", "Cover");
        out.push_str(&"-".repeat(width + 24));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&format!(
                "{:<width$}  {:>6}  {:>6}  {:>5.0}%\n",
                row.path,
                row.documented,
                row.total,
                row.percent()
            ));
        }
        out.push_str(&"-".repeat(width + 24));
        out.push('\n');
        out.push_str(&format!(
            "{:<width$}  {:>6}  {:>6}  {:>5.0}%",
            "TOTAL",
            self.documented(),
            self.total(),
            self.percent()
        ));
        out
    }
}

fn percent(documented: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        documented as f64 * 100.0 / total as f64
    }
}

impl StitcherApp<'_> {
    /// `cov`: count documented public symbols per file and print the table
    pub fn coverage(&self) -> Result<CoverageReport> {
        let mut report = CoverageReport::default();

        for (target, path) in self.sources()? {
            let Some((_, _, module)) = self.load_module(&path)? else {
                continue;
            };
            let sidecar_docs = self.documents(target).load_docs_for_module(&path)?;

            let public: Vec<String> = code_fragments(&module)
                .into_iter()
                .filter(|(fragment, can_be_missing)| *can_be_missing && is_public_fragment(fragment))
                .map(|(fragment, _)| fragment)
                .collect();
            if public.is_empty() {
                continue;
            }
            let documented = public
                .iter()
                .filter(|f| sidecar_docs.get(*f).is_some_and(|ir| !ir.is_empty()))
                .count();

            report.rows.push(CoverageRow {
                path,
                documented,
                total: public.len(),
            });
        }

        self.feedback.raw(&report.render());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::MemoryFeedback;
    use crate::workspace::Workspace;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_coverage_counts_sidecar_docs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(
            dir.path().join("m.py"),
            "def a():\n    pass\n\n\ndef b():\n    pass\n\n\ndef _hidden():\n    pass\n",
        )
        .unwrap();
        fs::write(dir.path().join("m.stitcher.yaml"), "a: Does a.\n").unwrap();
        fs::write(dir.path().join("empty.py"), "import os\n").unwrap();

        let feedback = MemoryFeedback::new();
        let app = StitcherApp::new(Workspace::open(dir.path()).unwrap(), &feedback).unwrap();
        let report = app.coverage().unwrap();

        assert_eq!(
            report.rows,
            vec![CoverageRow {
                path: "m.py".to_string(),
                documented: 1,
                total: 2,
            }]
        );
        assert_eq!(report.percent(), 50.0);
        let table = feedback.raw_output();
        assert!(table.contains("m.py"));
        assert!(table.contains("TOTAL"));
        assert!(table.contains("50%"));
    }
}
