//! Runner configuration

use crate::{RunnerError, RunnerResult};
use scenario_core::expression::DEFAULT_VM_TYPE;
use scenario_core::VM_TYPE_LEN;
use scenario_world::{GasSchedule, GasScheduleKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// VM type embedded in `sc:` addresses, as hex
    pub vm_type: String,

    /// Files picked up when running a directory
    pub file_extension: String,

    /// Path suffixes skipped when running a directory
    pub exclude: Vec<String>,

    /// TOML gas schedule used instead of the scenario's preset
    pub gas_schedule_path: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            vm_type: hex::encode(DEFAULT_VM_TYPE),
            file_extension: ".scen.json".to_string(),
            exclude: Vec::new(),
            gas_schedule_path: None,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml(toml_str: &str) -> RunnerResult<Self> {
        toml::from_str(toml_str)
            .map_err(|e| RunnerError::Validation(format!("invalid runner config: {e}")))
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn vm_type_bytes(&self) -> RunnerResult<[u8; VM_TYPE_LEN]> {
        let bytes = hex::decode(&self.vm_type)
            .map_err(|e| RunnerError::Validation(format!("invalid vm type {}: {e}", self.vm_type)))?;
        bytes.try_into().map_err(|_| {
            RunnerError::Validation(format!(
                "vm type must be {VM_TYPE_LEN} bytes, got {}",
                self.vm_type
            ))
        })
    }

    /// Schedule for a scenario: the configured file when there is one,
    /// the scenario's preset otherwise
    pub fn gas_schedule(&self, kind: GasScheduleKind) -> RunnerResult<GasSchedule> {
        match &self.gas_schedule_path {
            Some(path) => Ok(GasSchedule::from_file(path)?),
            None => Ok(GasSchedule::for_kind(kind)),
        }
    }

    pub fn is_scenario_file(&self, path: &Path) -> bool {
        path.to_string_lossy().ends_with(&self.file_extension)
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.exclude.iter().any(|suffix| path.ends_with(suffix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.vm_type_bytes().unwrap(), DEFAULT_VM_TYPE);
        assert!(config.is_scenario_file(Path::new("a/transfer.scen.json")));
        assert!(!config.is_scenario_file(Path::new("a/transfer.json")));
        assert_eq!(
            config.gas_schedule(GasScheduleKind::Dummy).unwrap(),
            GasSchedule::dummy()
        );
    }

    #[test]
    fn test_from_toml() {
        let config = RunnerConfig::from_toml(
            r#"
            vm_type = "0504"
            exclude = ["skip.scen.json"]
            "#,
        )
        .unwrap();
        assert_eq!(config.vm_type_bytes().unwrap(), [5, 4]);
        assert_eq!(config.file_extension, ".scen.json");
        assert!(config.is_excluded(Path::new("dir/skip.scen.json")));
        assert!(!config.is_excluded(Path::new("dir/run.scen.json")));

        let bad = RunnerConfig {
            vm_type: "050000".to_string(),
            ..RunnerConfig::default()
        };
        assert!(bad.vm_type_bytes().is_err());
        assert!(RunnerConfig::from_toml("exclude = 5").is_err());
    }

    #[test]
    fn test_gas_schedule_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gas.toml");
        let mut schedule = GasSchedule::default();
        schedule.contract_call = 77;
        std::fs::write(&path, schedule.to_toml().unwrap()).unwrap();

        let config = RunnerConfig {
            gas_schedule_path: Some(path),
            ..RunnerConfig::default()
        };
        assert_eq!(config.gas_schedule(GasScheduleKind::Dummy).unwrap().contract_call, 77);
    }
}
