//! Running every scenario file under a set of paths

use crate::diagnostics::Diagnostics;
use crate::runner::ScenarioRunner;
use crate::{RunnerConfig, RunnerError, RunnerResult};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Outcome of a suite run. A failing file does not stop the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteReport {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Failing files with the error that stopped them
    pub failures: Vec<(PathBuf, String)>,
}

impl SuiteReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} skipped",
            self.passed, self.failed, self.skipped
        )
    }
}

/// Scenario files under `root` in name order. A file path is returned
/// as is, whatever its extension.
pub fn scenario_files(config: &RunnerConfig, root: &Path) -> RunnerResult<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| RunnerError::Io {
            path: root.display().to_string(),
            source: err.into(),
        })?;
        if entry.file_type().is_file() && config.is_scenario_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

impl ScenarioRunner {
    /// Run each scenario file found under `paths` on a fresh ledger
    pub fn run_suite(
        &mut self,
        paths: &[PathBuf],
        diagnostics: &mut Diagnostics,
    ) -> RunnerResult<SuiteReport> {
        let mut report = SuiteReport::default();
        for root in paths {
            for file in scenario_files(self.config(), root)? {
                if self.config().is_excluded(&file) {
                    warn!("Skipping excluded scenario {}", file.display());
                    report.skipped += 1;
                    continue;
                }

                self.reset();
                match self.run_file(&file, diagnostics) {
                    Ok(()) => report.passed += 1,
                    Err(err) => {
                        warn!("Scenario {} failed: {}", file.display(), err);
                        report.failed += 1;
                        report.failures.push((file, err.to_string()));
                    }
                }
            }
        }
        info!("Scenario suite finished: {}", report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_world::{GasSchedule, MockHost};
    use std::fs;

    const SET_ALICE: &str = r#"{
        "steps": [
            { "step": "setState", "accounts": { "address:alice": { "balance": "7" } } },
            { "step": "checkState", "accounts": { "address:alice": { "balance": "7" } } }
        ]
    }"#;

    const EMPTY_LEDGER: &str = r#"{
        "steps": [ { "step": "checkState", "accounts": {} } ]
    }"#;

    const WRONG_BALANCE: &str = r#"{
        "steps": [
            { "step": "setState", "accounts": { "address:bob": { "balance": "1" } } },
            { "step": "checkState", "accounts": { "address:bob": { "balance": "2" } } }
        ]
    }"#;

    fn suite_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.scen.json"), SET_ALICE).unwrap();
        fs::write(dir.path().join("b.scen.json"), EMPTY_LEDGER).unwrap();
        fs::write(dir.path().join("nested/c.scen.json"), WRONG_BALANCE).unwrap();
        fs::write(dir.path().join("nested/skip.scen.json"), "not json").unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();
        dir
    }

    fn runner(config: RunnerConfig) -> ScenarioRunner {
        ScenarioRunner::new(config, Box::new(MockHost::new(GasSchedule::default()))).unwrap()
    }

    #[test]
    fn test_scenario_files_sorted() {
        let dir = suite_dir();
        let files = scenario_files(&RunnerConfig::default(), dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.scen.json"),
                PathBuf::from("b.scen.json"),
                PathBuf::from("nested/c.scen.json"),
                PathBuf::from("nested/skip.scen.json"),
            ]
        );

        let single = dir.path().join("notes.json");
        assert_eq!(
            scenario_files(&RunnerConfig::default(), &single).unwrap(),
            vec![single]
        );
    }

    #[test]
    fn test_failures_are_isolated() {
        let dir = suite_dir();
        let config = RunnerConfig::default().with_exclude(vec!["skip.scen.json".to_string()]);
        let mut runner = runner(config);
        let mut diagnostics = Diagnostics::new();

        let report = runner
            .run_suite(&[dir.path().to_path_buf()], &mut diagnostics)
            .unwrap();
        assert_eq!(report.passed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total(), 4);
        assert!(!report.is_success());
        assert_eq!(report.to_string(), "2 passed, 1 failed, 1 skipped");

        let (path, message) = &report.failures[0];
        assert!(path.ends_with("nested/c.scen.json"));
        assert!(message.contains("bad account balance"));
    }

    #[test]
    fn test_broken_file_counts_as_failure() {
        let dir = suite_dir();
        let mut runner = runner(RunnerConfig::default());
        let mut diagnostics = Diagnostics::new();
        let report = runner
            .run_suite(&[dir.path().join("nested")], &mut diagnostics)
            .unwrap();
        assert_eq!(report.failed, 2);
        assert!(report.failures[1].1.starts_with("error parsing"));
    }
}
