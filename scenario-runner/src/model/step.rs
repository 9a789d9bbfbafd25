use super::account::{Account, BlockInfo, CheckAccounts, NewAddressMock};
use super::transaction::{Transaction, TxExpect};
use super::value::JsonBytes;

pub const STEP_EXTERNAL_STEPS: &str = "externalSteps";
pub const STEP_SET_STATE: &str = "setState";
pub const STEP_CHECK_STATE: &str = "checkState";
pub const STEP_DUMP_STATE: &str = "dumpState";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExternalStepsStep {
    pub comment: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetStateStep {
    pub id: Option<String>,
    pub comment: Option<String>,
    pub accounts: Vec<Account>,
    pub new_address_mocks: Vec<NewAddressMock>,
    pub previous_block_info: Option<BlockInfo>,
    pub current_block_info: Option<BlockInfo>,
    pub block_hashes: Option<Vec<JsonBytes>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckStateStep {
    pub id: Option<String>,
    pub comment: Option<String>,
    pub accounts: CheckAccounts,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DumpStateStep {
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxStep {
    pub id: String,
    pub comment: Option<String>,
    pub display_logs: bool,
    pub tx: Transaction,
    pub expect: Option<TxExpect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    ExternalSteps(ExternalStepsStep),
    SetState(SetStateStep),
    CheckState(CheckStateStep),
    DumpState(DumpStateStep),
    Tx(TxStep),
}

impl Step {
    /// Value of the `step` field
    pub fn type_name(&self) -> &'static str {
        match self {
            Step::ExternalSteps(_) => STEP_EXTERNAL_STEPS,
            Step::SetState(_) => STEP_SET_STATE,
            Step::CheckState(_) => STEP_CHECK_STATE,
            Step::DumpState(_) => STEP_DUMP_STATE,
            Step::Tx(step) => step.tx.kind.step_name(),
        }
    }

    /// Short label for logs and diagnostics
    pub fn label(&self) -> String {
        let id = match self {
            Step::SetState(step) => step.id.as_deref(),
            Step::CheckState(step) => step.id.as_deref(),
            Step::Tx(step) => Some(step.id.as_str()),
            Step::ExternalSteps(_) | Step::DumpState(_) => None,
        };
        match id {
            Some(id) if !id.is_empty() => format!("{} '{}'", self.type_name(), id),
            _ => self.type_name().to_string(),
        }
    }
}
