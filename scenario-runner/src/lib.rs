//! Scenario harness: reading, running, checking and writing scenarios
//!
//! A scenario is a JSON file listing steps (state setup, transactions,
//! state checks) to run against the mock ledger of `scenario-world`.

pub mod checker;
pub mod config;
mod convert;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod parse;
pub mod runner;
pub mod suite;
pub mod write;

pub use checker::Checker;
pub use config::RunnerConfig;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{RunnerError, RunnerResult};
pub use model::Scenario;
pub use parse::ScenarioParser;
pub use runner::ScenarioRunner;
pub use suite::{scenario_files, SuiteReport};
pub use write::ScenarioWriter;
