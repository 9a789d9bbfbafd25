//! Layered settings: defaults, then `scenario.toml`, then `SCENARIO_*`
//! environment variables

use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use scenario_runner::RunnerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings file looked up in the working directory
const DEFAULT_SETTINGS_FILE: &str = "scenario";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub runner: RunnerConfig,
}

impl Settings {
    /// Load settings. An explicit `path` must exist; the default file is
    /// optional. Nested keys use `__` in variable names, e.g.
    /// `SCENARIO_LOGGING__FORMAT=json`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => File::from(path),
            None => File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };
        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("SCENARIO")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("runner.exclude")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
}
