//! Contract between the ledger and the contract execution host

use crate::gas::GasSchedule;
use crate::world::World;
use crate::WorldResult;
use num_bigint::{BigInt, BigUint};
use scenario_core::Address;
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of a host invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u64)]
pub enum ReturnCode {
    #[default]
    Ok = 0,
    FunctionNotFound = 1,
    FunctionWrongSignature = 2,
    ContractNotFound = 3,
    UserError = 4,
    OutOfGas = 5,
    AccountCollision = 6,
    OutOfFunds = 7,
    CallStackOverFlow = 8,
    ContractInvalid = 9,
    ExecutionFailed = 10,
    UpgradeFailed = 11,
    SimulateFailed = 12,
}

impl ReturnCode {
    pub fn from_u64(code: u64) -> Option<Self> {
        let code = match code {
            0 => Self::Ok,
            1 => Self::FunctionNotFound,
            2 => Self::FunctionWrongSignature,
            3 => Self::ContractNotFound,
            4 => Self::UserError,
            5 => Self::OutOfGas,
            6 => Self::AccountCollision,
            7 => Self::OutOfFunds,
            8 => Self::CallStackOverFlow,
            9 => Self::ContractInvalid,
            10 => Self::ExecutionFailed,
            11 => Self::UpgradeFailed,
            12 => Self::SimulateFailed,
            _ => return None,
        };
        Some(code)
    }

    pub fn as_u64(&self) -> u64 {
        *self as u64
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ok => "ok",
            Self::FunctionNotFound => "function not found",
            Self::FunctionWrongSignature => "wrong signature for function",
            Self::ContractNotFound => "contract not found",
            Self::UserError => "user error",
            Self::OutOfGas => "out of gas",
            Self::AccountCollision => "account collision",
            Self::OutOfFunds => "out of funds",
            Self::CallStackOverFlow => "call stack overflow",
            Self::ContractInvalid => "contract invalid",
            Self::ExecutionFailed => "execution failed",
            Self::UpgradeFailed => "upgrade failed",
            Self::SimulateFailed => "simulate failed",
        };
        f.write_str(text)
    }
}

/// One token transfer attached to a transaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EsdtTransfer {
    pub token_identifier: Vec<u8>,
    pub nonce: u64,
    pub value: BigUint,
}

/// Fields shared by deploy and call requests
#[derive(Debug, Clone, Default)]
pub struct VmInput {
    pub caller: Address,
    pub arguments: Vec<Vec<u8>>,
    pub call_value: BigUint,
    /// Already settled by the ledger before the host runs
    pub esdt_transfers: Vec<EsdtTransfer>,
    pub gas_price: u64,
    pub gas_provided: u64,
    pub tx_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ContractCreateInput {
    pub input: VmInput,
    pub code: Vec<u8>,
    /// Address the ledger assigned to the new contract
    pub new_address: Address,
}

#[derive(Debug, Clone, Default)]
pub struct ContractCallInput {
    pub input: VmInput,
    pub recipient: Address,
    pub function: String,
}

/// Changes the host made to one account
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputAccount {
    pub address: Address,
    pub balance_delta: BigInt,
    /// Applied only when higher than the current nonce
    pub nonce: u64,
    /// Replaces the account code when non-empty
    pub code: Vec<u8>,
    /// Owner recorded when the account is created by this output
    pub code_deployer: Option<Address>,
    /// Empty values delete the key
    pub storage_updates: BTreeMap<Vec<u8>, Vec<u8>>,
    pub developer_reward_delta: BigUint,
}

impl OutputAccount {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogEntry {
    pub address: Address,
    pub identifier: Vec<u8>,
    pub topics: Vec<Vec<u8>>,
    pub data: Vec<u8>,
}

/// Result of a deploy or call as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VmOutput {
    pub return_code: ReturnCode,
    pub return_message: String,
    pub return_data: Vec<Vec<u8>>,
    pub gas_remaining: u64,
    pub gas_refund: BigUint,
    pub output_accounts: BTreeMap<Address, OutputAccount>,
    pub deleted_accounts: Vec<Address>,
    pub logs: Vec<LogEntry>,
}

impl VmOutput {
    pub fn ok(gas_remaining: u64) -> Self {
        Self {
            gas_remaining,
            ..Self::default()
        }
    }

    pub fn failure(return_code: ReturnCode, message: impl Into<String>) -> Self {
        Self {
            return_code,
            return_message: message.into(),
            ..Self::default()
        }
    }

    /// Synthetic result for a sender that cannot cover the declared value
    pub fn out_of_funds() -> Self {
        Self::failure(ReturnCode::OutOfFunds, "")
    }

    pub fn is_ok(&self) -> bool {
        self.return_code == ReturnCode::Ok
    }

    /// Entry for `address`, created empty on first access
    pub fn output_account_mut(&mut self, address: Address) -> &mut OutputAccount {
        self.output_accounts
            .entry(address)
            .or_insert_with(|| OutputAccount::new(address))
    }

    pub fn balance_delta_sum(&self) -> BigInt {
        self.output_accounts
            .values()
            .map(|account| &account.balance_delta)
            .sum()
    }
}

/// Executes contract code on behalf of the ledger.
///
/// The host reads the world but never mutates it; all changes travel back
/// in the returned [`VmOutput`] and are applied by the executor.
pub trait ExecutionHost {
    fn create_contract(&mut self, world: &World, input: &ContractCreateInput)
        -> WorldResult<VmOutput>;

    fn call_contract(&mut self, world: &World, input: &ContractCallInput) -> WorldResult<VmOutput>;

    /// Called when a scenario selects its gas schedule
    fn set_gas_schedule(&mut self, _schedule: &GasSchedule) {}
}
