//! Typed form of a scenario file
//!
//! Every parsed value keeps its original text so that a scenario can be
//! written back unchanged and so that check failures quote what the author
//! wrote rather than raw bytes.

mod account;
mod step;
mod transaction;
mod value;

pub use account::{
    Account, BlockInfo, CheckAccount, CheckAccounts, CheckEsdt, CheckEsdtData, CheckEsdtInstance,
    CheckStorage, CheckStorageEntry, EsdtData, EsdtInstance, NewAddressMock, StorageEntry,
};
pub use step::{
    CheckStateStep, DumpStateStep, ExternalStepsStep, SetStateStep, Step, TxStep,
    STEP_CHECK_STATE, STEP_DUMP_STATE, STEP_EXTERNAL_STEPS, STEP_SET_STATE,
};
pub use transaction::{CheckLogEntry, CheckLogs, EsdtTxData, Transaction, TxExpect};
pub use value::{CheckValue, CheckValueList, Expected, JsonBigInt, JsonBytes, JsonUint64};

use scenario_world::GasScheduleKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub name: Option<String>,
    pub comment: Option<String>,
    pub check_gas: bool,
    pub trace_gas: bool,
    pub gas_schedule: GasScheduleKind,
    pub steps: Vec<Step>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: None,
            comment: None,
            check_gas: true,
            trace_gas: false,
            gas_schedule: GasScheduleKind::Default,
            steps: Vec::new(),
        }
    }
}
