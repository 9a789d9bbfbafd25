use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Scenario runner for smart contract tests
#[derive(Parser, Debug)]
#[command(name = "scenario")]
#[command(about = "Run and format smart contract scenario files")]
#[command(version)]
pub struct Cli {
    /// Settings file (defaults to ./scenario.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenario files, or every scenario file under directories
    Run {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Skip files whose path ends with this suffix (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// TOML gas schedule overriding the scenarios' presets
        #[arg(long)]
        gas_schedule: Option<PathBuf>,
    },
    /// Rewrite scenario files in canonical form
    Fmt {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only report files that would change
        #[arg(long)]
        check: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "scenario",
            "--json-logs",
            "run",
            "tests/",
            "-e",
            "slow.scen.json",
            "--exclude",
            "wip.scen.json",
        ])
        .unwrap();
        assert!(cli.json_logs);
        match cli.command {
            Commands::Run { paths, exclude, gas_schedule } => {
                assert_eq!(paths, vec![PathBuf::from("tests/")]);
                assert_eq!(exclude, vec!["slow.scen.json", "wip.scen.json"]);
                assert!(gas_schedule.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_paths_required() {
        assert!(Cli::try_parse_from(["scenario", "fmt", "--check"]).is_err());
    }
}
