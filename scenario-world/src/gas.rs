//! Gas costs charged by the ledger and the mock host

use crate::{WorldError, WorldResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Preset selected by a scenario's `gasSchedule` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GasScheduleKind {
    #[default]
    Default,
    Dummy,
    V3,
    V4,
}

impl GasScheduleKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::Default),
            "dummy" => Some(Self::Dummy),
            "v3" => Some(Self::V3),
            "v4" => Some(Self::V4),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Dummy => "dummy",
            Self::V3 => "v3",
            Self::V4 => "v4",
        }
    }
}

/// Gas costs for the operations the harness itself performs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    /// Direct fungible ESDT transfer
    pub esdt_transfer: u64,
    /// Direct NFT/SFT transfer
    pub esdt_nft_transfer: u64,
    /// Fixed part of a multi-token transfer, added to the per-item cost
    pub multi_esdt_transfer_base: u64,
    /// Charged by the mock host when a contract is entered
    pub contract_call: u64,
    /// Charged by the mock host for a contract deployment
    pub contract_deploy: u64,
    /// Storage read
    pub storage_load: u64,
    /// Storage write, per byte stored
    pub storage_store_per_byte: u64,
    /// Per returned or logged byte
    pub data_copy_per_byte: u64,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            esdt_transfer: 200_000,
            esdt_nft_transfer: 250_000,
            multi_esdt_transfer_base: 200_000,
            contract_call: 1_000,
            contract_deploy: 10_000,
            storage_load: 1_000,
            storage_store_per_byte: 50,
            data_copy_per_byte: 2,
        }
    }
}

impl GasSchedule {
    /// All costs set to zero
    pub fn dummy() -> Self {
        Self {
            esdt_transfer: 0,
            esdt_nft_transfer: 0,
            multi_esdt_transfer_base: 0,
            contract_call: 0,
            contract_deploy: 0,
            storage_load: 0,
            storage_store_per_byte: 0,
            data_copy_per_byte: 0,
        }
    }

    pub fn for_kind(kind: GasScheduleKind) -> Self {
        match kind {
            GasScheduleKind::Default | GasScheduleKind::V4 => Self::default(),
            GasScheduleKind::Dummy => Self::dummy(),
            GasScheduleKind::V3 => Self {
                esdt_nft_transfer: 200_000,
                storage_store_per_byte: 100,
                ..Self::default()
            },
        }
    }

    /// Load gas schedule from TOML configuration
    pub fn from_toml(toml_str: &str) -> WorldResult<Self> {
        toml::from_str(toml_str)
            .map_err(|e| WorldError::Config(format!("Failed to parse gas schedule: {}", e)))
    }

    /// Load gas schedule from a TOML file
    pub fn from_file(path: &Path) -> WorldResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WorldError::Config(format!("Failed to read gas schedule {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Convert to TOML string
    pub fn to_toml(&self) -> WorldResult<String> {
        toml::to_string(self)
            .map_err(|e| WorldError::Config(format!("Failed to serialize gas schedule: {}", e)))
    }

    /// Cost of settling the token transfers attached to a transaction
    pub fn esdt_transfer_cost(&self, nonces: &[u64]) -> u64 {
        let per_item = |nonce: &u64| {
            if *nonce == 0 {
                self.esdt_transfer
            } else {
                self.esdt_nft_transfer
            }
        };
        match nonces {
            [] => 0,
            [single] => per_item(single),
            many => many
                .iter()
                .map(per_item)
                .fold(self.multi_esdt_transfer_base, u64::saturating_add),
        }
    }

    /// Calculate storage operation cost
    pub fn storage_cost(&self, operation: StorageOp, bytes: usize) -> u64 {
        match operation {
            StorageOp::Read => self.storage_load,
            StorageOp::Write => self.storage_store_per_byte.saturating_mul(bytes as u64),
        }
    }
}

/// Storage operation types
#[derive(Debug, Clone, Copy)]
pub enum StorageOp {
    Read,
    Write,
}

/// Gas meter for one host invocation
#[derive(Debug, Clone)]
pub struct GasMeter {
    /// Gas available to the invocation
    limit: u64,
    /// Gas consumed so far
    consumed: u64,
    schedule: GasSchedule,
    /// Consumption per operation, reported when gas tracing is on
    breakdown: BTreeMap<String, u64>,
}

impl GasMeter {
    pub fn new(limit: u64, schedule: GasSchedule) -> Self {
        Self {
            limit,
            consumed: 0,
            schedule,
            breakdown: BTreeMap::new(),
        }
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn schedule(&self) -> &GasSchedule {
        &self.schedule
    }

    /// Consume gas for an operation, failing once the limit would be exceeded
    pub fn consume(&mut self, amount: u64, operation: &str) -> Result<(), OutOfGas> {
        if amount > self.remaining() {
            return Err(OutOfGas {
                required: amount,
                available: self.remaining(),
            });
        }
        self.consumed += amount;
        *self.breakdown.entry(operation.to_string()).or_insert(0) += amount;
        Ok(())
    }

    pub fn consume_storage(&mut self, operation: StorageOp, bytes: usize) -> Result<(), OutOfGas> {
        let cost = self.schedule.storage_cost(operation, bytes);
        let op_name = match operation {
            StorageOp::Read => "storage_load",
            StorageOp::Write => "storage_store",
        };
        self.consume(cost, op_name)
    }

    pub fn consume_data_copy(&mut self, bytes: usize) -> Result<(), OutOfGas> {
        let cost = self.schedule.data_copy_per_byte.saturating_mul(bytes as u64);
        self.consume(cost, "data_copy")
    }

    pub fn breakdown(&self) -> &BTreeMap<String, u64> {
        &self.breakdown
    }
}

/// Raised by [`GasMeter::consume`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfGas {
    pub required: u64,
    pub available: u64,
}

impl std::fmt::Display for OutOfGas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "out of gas: required {}, available {}",
            self.required, self.available
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_presets() {
        assert_eq!(GasSchedule::for_kind(GasScheduleKind::Default), GasSchedule::default());
        assert_eq!(GasSchedule::for_kind(GasScheduleKind::Dummy).esdt_transfer, 0);
        assert_eq!(GasScheduleKind::from_name("v3"), Some(GasScheduleKind::V3));
        assert_eq!(GasScheduleKind::from_name("v9"), None);
        assert_eq!(GasScheduleKind::V4.name(), "v4");
    }

    #[test]
    fn test_toml_round_trip_and_partial() {
        let schedule = GasSchedule::default();
        let text = schedule.to_toml().unwrap();
        assert_eq!(GasSchedule::from_toml(&text).unwrap(), schedule);

        let partial = GasSchedule::from_toml("esdt_transfer = 7").unwrap();
        assert_eq!(partial.esdt_transfer, 7);
        assert_eq!(partial.contract_call, schedule.contract_call);

        assert!(GasSchedule::from_toml("esdt_transfer = \"x\"").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gas.toml");
        std::fs::write(&path, "storage_load = 3").unwrap();
        assert_eq!(GasSchedule::from_file(&path).unwrap().storage_load, 3);
        assert!(GasSchedule::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_esdt_transfer_cost() {
        let schedule = GasSchedule::default();
        assert_eq!(schedule.esdt_transfer_cost(&[]), 0);
        assert_eq!(schedule.esdt_transfer_cost(&[0]), 200_000);
        assert_eq!(schedule.esdt_transfer_cost(&[3]), 250_000);
        assert_eq!(schedule.esdt_transfer_cost(&[0, 3]), 200_000 + 200_000 + 250_000);
    }

    #[test]
    fn test_gas_meter() {
        let mut meter = GasMeter::new(10_000, GasSchedule::default());
        meter.consume(1_000, "contract_call").unwrap();
        meter.consume_storage(StorageOp::Write, 10).unwrap();
        assert_eq!(meter.consumed(), 1_500);
        assert_eq!(meter.remaining(), 8_500);

        let err = meter.consume(9_000, "big").unwrap_err();
        assert_eq!(err, OutOfGas { required: 9_000, available: 8_500 });
        assert_eq!(meter.consumed(), 1_500);
        assert_eq!(meter.breakdown().get("storage_store"), Some(&500));
    }
}
