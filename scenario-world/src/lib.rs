//! Mock ledger and transaction execution
//!
//! This crate provides the world a scenario runs against: accounts with
//! their ESDT holdings, block metadata, snapshot and rollback, and the
//! executor that drives deploys, calls and transfers through an
//! [`ExecutionHost`].

pub mod account;
pub mod error;
pub mod esdt;
pub mod executor;
pub mod gas;
pub mod host;
pub mod mock_host;
pub mod world;

pub use account::{Account, AccountPatch};
pub use error::{WorldError, WorldResult};
pub use esdt::{Storage, TokenInstance, TokenRecord};
pub use executor::{tx_hash, ExecutionResult, TransactionExecutor, TxKind, TxRequest};
pub use gas::{GasMeter, GasSchedule, GasScheduleKind};
pub use host::{
    ContractCallInput, ContractCreateInput, EsdtTransfer, ExecutionHost, LogEntry, OutputAccount,
    ReturnCode, VmInput, VmOutput,
};
pub use mock_host::{ContractError, ContractResult, MockContext, MockContract, MockHost};
pub use world::{AccountEntry, BlockInfo, NewAddressMock, SetState, World, WorldSnapshot};
