use anyhow::Context;
use scenario_core::{DefaultFileResolver, ExprInterpreter};
use scenario_runner::{
    scenario_files, Diagnostics, RunnerConfig, ScenarioParser, ScenarioRunner, ScenarioWriter,
};
use scenario_world::{GasSchedule, MockHost};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Run every scenario under `paths` and print a summary
pub fn run(config: RunnerConfig, paths: &[PathBuf]) -> anyhow::Result<bool> {
    let host = MockHost::new(GasSchedule::default());
    let mut runner =
        ScenarioRunner::new(config, Box::new(host)).context("invalid runner configuration")?;
    let mut diagnostics = Diagnostics::new();
    let report = runner.run_suite(paths, &mut diagnostics)?;

    for (path, message) in &report.failures {
        println!("FAIL {}\n  {}", path.display(), message.replace('\n', "\n  "));
    }
    println!("{report}");
    Ok(report.is_success())
}

/// Rewrite scenario files in canonical form. With `check`, files are
/// left untouched and the result says whether all were canonical.
pub fn fmt(config: &RunnerConfig, paths: &[PathBuf], check: bool) -> anyhow::Result<bool> {
    let interpreter = ExprInterpreter::new()
        .with_vm_type(config.vm_type_bytes()?)
        .with_resolver(Arc::new(DefaultFileResolver::new()));
    let parser = ScenarioParser::new(interpreter);

    let mut unformatted = 0;
    for root in paths {
        for file in scenario_files(config, root)? {
            if !format_file(&parser, &file, check)? {
                continue;
            }
            unformatted += 1;
            if check {
                println!("would reformat {}", file.display());
            } else {
                info!("Reformatted {}", file.display());
            }
        }
    }
    Ok(!check || unformatted == 0)
}

/// Returns whether the canonical form differs from the file
fn format_file(parser: &ScenarioParser, path: &Path, check: bool) -> anyhow::Result<bool> {
    let current =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let scenario = parser.parse_scenario_file(path)?;
    let writer = ScenarioWriter::new();
    let canonical = writer.scenario_to_string(&scenario);
    if canonical == current {
        return Ok(false);
    }
    if !check {
        writer.write_scenario_file(&scenario, path)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSFER: &str = r#"{"name":"pay","steps":[{"step":"setState","accounts":{"address:a":{"nonce":"0","balance":"10"},"address:b":{"nonce":"0","balance":"0"}}},{"step":"transfer","id":"1","tx":{"from":"address:a","to":"address:b","value":"4"}},{"step":"checkState","accounts":{"address:a":{"nonce":"1","balance":"6"},"address:b":{"nonce":"0","balance":"4"}}}]}"#;

    #[test]
    fn test_fmt_check_then_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pay.scen.json");
        fs::write(&path, TRANSFER).unwrap();
        let config = RunnerConfig::default();
        let paths = vec![dir.path().to_path_buf()];

        assert!(!fmt(&config, &paths, true).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), TRANSFER);

        assert!(fmt(&config, &paths, false).unwrap());
        let formatted = fs::read_to_string(&path).unwrap();
        assert!(formatted.starts_with("{\n    \"name\": \"pay\""));
        assert!(fmt(&config, &paths, true).unwrap());
    }

    #[test]
    fn test_run_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pay.scen.json"), TRANSFER).unwrap();
        assert!(run(RunnerConfig::default(), &[dir.path().to_path_buf()]).unwrap());

        fs::write(
            dir.path().join("zzz.scen.json"),
            r#"{"steps":[{"step":"checkState","accounts":{"address:a":{}}}]}"#,
        )
        .unwrap();
        assert!(!run(RunnerConfig::default(), &[dir.path().to_path_buf()]).unwrap());
    }
}
