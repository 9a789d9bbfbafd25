//! Execution host backed by Rust closures instead of WASM code
//!
//! Contracts are registered under the code bytes that a scenario deploys or
//! places in an account. Each endpoint receives a [`MockContext`] that
//! stages storage writes, return data and logs into a [`VmOutput`].

use crate::esdt;
use crate::gas::{GasMeter, GasSchedule, OutOfGas, StorageOp};
use crate::host::{
    ContractCallInput, ContractCreateInput, EsdtTransfer, ExecutionHost, LogEntry, ReturnCode,
    VmInput, VmOutput,
};
use crate::world::{BlockInfo, World};
use crate::WorldResult;
use num_bigint::{BigInt, BigUint};
use scenario_core::Address;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Endpoint run by the constructor of a deployed contract
pub const INIT_FUNCTION: &str = "init";

/// Failure raised by a mock endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("{0}")]
    User(String),

    #[error("not enough gas")]
    OutOfGas,

    #[error("wrong number of arguments")]
    WrongArguments,

    #[error("cannot write to storage under reserved key")]
    ReservedKey,

    #[error("insufficient funds")]
    InsufficientFunds,
}

impl ContractError {
    pub fn return_code(&self) -> ReturnCode {
        match self {
            ContractError::User(_) => ReturnCode::UserError,
            ContractError::OutOfGas => ReturnCode::OutOfGas,
            ContractError::WrongArguments => ReturnCode::FunctionWrongSignature,
            ContractError::ReservedKey | ContractError::InsufficientFunds => {
                ReturnCode::ExecutionFailed
            }
        }
    }
}

impl From<OutOfGas> for ContractError {
    fn from(_: OutOfGas) -> Self {
        ContractError::OutOfGas
    }
}

pub type ContractResult<T> = Result<T, ContractError>;

pub type Endpoint = Box<dyn Fn(&mut MockContext<'_>) -> ContractResult<()> + Send + Sync>;

/// A contract made of named endpoints
#[derive(Default)]
pub struct MockContract {
    endpoints: BTreeMap<String, Endpoint>,
}

impl MockContract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint
    pub fn endpoint<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut MockContext<'_>) -> ContractResult<()> + Send + Sync + 'static,
    {
        self.endpoints.insert(name.into(), Box::new(f));
        self
    }

    pub fn has_endpoint(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }
}

impl std::fmt::Debug for MockContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockContract")
            .field("endpoints", &self.endpoints.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// What a running endpoint can see and do
pub struct MockContext<'a> {
    world: &'a World,
    address: Address,
    input: &'a VmInput,
    meter: GasMeter,
    output: VmOutput,
}

impl<'a> MockContext<'a> {
    fn new(world: &'a World, address: Address, input: &'a VmInput, meter: GasMeter) -> Self {
        let mut output = VmOutput::ok(0);
        output.output_account_mut(address).balance_delta = BigInt::from(input.call_value.clone());
        Self {
            world,
            address,
            input,
            meter,
            output,
        }
    }

    pub fn self_address(&self) -> Address {
        self.address
    }

    pub fn caller(&self) -> Address {
        self.input.caller
    }

    pub fn call_value(&self) -> &BigUint {
        &self.input.call_value
    }

    pub fn esdt_transfers(&self) -> &[EsdtTransfer] {
        &self.input.esdt_transfers
    }

    pub fn tx_hash(&self) -> &[u8] {
        &self.input.tx_hash
    }

    pub fn arguments(&self) -> &[Vec<u8>] {
        &self.input.arguments
    }

    /// Fails with a signature error unless exactly `count` arguments were sent
    pub fn expect_arguments(&self, count: usize) -> ContractResult<&[Vec<u8>]> {
        if self.input.arguments.len() != count {
            return Err(ContractError::WrongArguments);
        }
        Ok(&self.input.arguments)
    }

    pub fn block_info(&self) -> &BlockInfo {
        self.world.current_block_info()
    }

    pub fn gas_left(&self) -> u64 {
        self.meter.remaining()
    }

    /// Charge extra gas from inside an endpoint
    pub fn use_gas(&mut self, amount: u64) -> ContractResult<()> {
        self.meter.consume(amount, "endpoint")?;
        Ok(())
    }

    /// Reads see writes staged earlier in the same call
    pub fn storage_load(&mut self, key: &[u8]) -> ContractResult<Vec<u8>> {
        self.meter.consume_storage(StorageOp::Read, 0)?;
        let staged = self
            .output
            .output_accounts
            .get(&self.address)
            .and_then(|account| account.storage_updates.get(key));
        if let Some(value) = staged {
            return Ok(value.clone());
        }
        Ok(self
            .world
            .account(&self.address)
            .map(|account| account.storage_value(key).to_vec())
            .unwrap_or_default())
    }

    pub fn storage_store(&mut self, key: &[u8], value: &[u8]) -> ContractResult<()> {
        if esdt::is_protected_key(key) {
            return Err(ContractError::ReservedKey);
        }
        self.meter.consume_storage(StorageOp::Write, value.len())?;
        self.output
            .output_account_mut(self.address)
            .storage_updates
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    /// Token balance the contract holds, incoming transfers included
    pub fn esdt_balance(&self, identifier: &[u8], nonce: u64) -> ContractResult<BigUint> {
        match self.world.account(&self.address) {
            Some(account) => account
                .token_balance(identifier, nonce)
                .map_err(|e| ContractError::User(e.to_string())),
            None => Ok(BigUint::default()),
        }
    }

    /// Push one return data entry
    pub fn finish(&mut self, data: impl Into<Vec<u8>>) -> ContractResult<()> {
        let data = data.into();
        self.meter.consume_data_copy(data.len())?;
        self.output.return_data.push(data);
        Ok(())
    }

    pub fn log(
        &mut self,
        identifier: impl Into<Vec<u8>>,
        topics: Vec<Vec<u8>>,
        data: impl Into<Vec<u8>>,
    ) -> ContractResult<()> {
        let data = data.into();
        self.meter.consume_data_copy(data.len())?;
        self.output.logs.push(LogEntry {
            address: self.address,
            identifier: identifier.into(),
            topics,
            data,
        });
        Ok(())
    }

    /// Send native balance from the contract
    pub fn transfer_value(&mut self, to: Address, amount: &BigUint) -> ContractResult<()> {
        let held = self
            .world
            .account(&self.address)
            .map(|account| BigInt::from(account.balance.clone()))
            .unwrap_or_default();
        let staged = self
            .output
            .output_accounts
            .get(&self.address)
            .map(|account| account.balance_delta.clone())
            .unwrap_or_default();
        let amount = BigInt::from(amount.clone());
        if held + &staged < amount {
            return Err(ContractError::InsufficientFunds);
        }
        self.output.output_account_mut(self.address).balance_delta -= &amount;
        self.output.output_account_mut(to).balance_delta += &amount;
        Ok(())
    }

    pub fn signal_error(&self, message: impl Into<String>) -> ContractError {
        ContractError::User(message.into())
    }

    fn finish_call(self, result: ContractResult<()>) -> VmOutput {
        debug!(
            "Mock contract {} used {} gas: {:?}",
            self.address,
            self.meter.consumed(),
            self.meter.breakdown()
        );
        match result {
            Ok(()) => VmOutput {
                gas_remaining: self.meter.remaining(),
                ..self.output
            },
            Err(err) => VmOutput::failure(err.return_code(), err.to_string()),
        }
    }
}

/// [`ExecutionHost`] dispatching to registered [`MockContract`]s
#[derive(Debug, Default)]
pub struct MockHost {
    contracts: HashMap<Vec<u8>, Arc<MockContract>>,
    schedule: GasSchedule,
}

impl MockHost {
    pub fn new(schedule: GasSchedule) -> Self {
        Self {
            contracts: HashMap::new(),
            schedule,
        }
    }

    /// Register a contract under the code bytes scenarios refer to it by
    pub fn register(&mut self, code: impl Into<Vec<u8>>, contract: MockContract) {
        self.contracts.insert(code.into(), Arc::new(contract));
    }

    pub fn with_contract(mut self, code: impl Into<Vec<u8>>, contract: MockContract) -> Self {
        self.register(code, contract);
        self
    }

    pub fn gas_schedule(&self) -> &GasSchedule {
        &self.schedule
    }

    fn run(
        &self,
        world: &World,
        contract: &MockContract,
        address: Address,
        function: &str,
        input: &VmInput,
        base_cost: u64,
        prepare: impl FnOnce(&mut VmOutput),
    ) -> VmOutput {
        let mut meter = GasMeter::new(input.gas_provided, self.schedule.clone());
        if let Err(err) = meter.consume(base_cost, "base") {
            return VmOutput::failure(ReturnCode::OutOfGas, err.to_string());
        }

        let mut ctx = MockContext::new(world, address, input, meter);
        prepare(&mut ctx.output);
        let result = match contract.endpoints.get(function) {
            Some(endpoint) => endpoint(&mut ctx),
            None => Ok(()),
        };
        ctx.finish_call(result)
    }
}

impl ExecutionHost for MockHost {
    fn create_contract(
        &mut self,
        world: &World,
        input: &ContractCreateInput,
    ) -> WorldResult<VmOutput> {
        let Some(contract) = self.contracts.get(&input.code).cloned() else {
            return Ok(VmOutput::failure(
                ReturnCode::ContractInvalid,
                "invalid contract code",
            ));
        };
        if world.account(&input.new_address).is_some() {
            return Ok(VmOutput::failure(
                ReturnCode::AccountCollision,
                "account already exists",
            ));
        }

        debug!("Mock deploy of {} by {}", input.new_address, input.input.caller);
        let output = self.run(
            world,
            &contract,
            input.new_address,
            INIT_FUNCTION,
            &input.input,
            self.schedule.contract_deploy,
            |output| {
                let account = output.output_account_mut(input.new_address);
                account.code = input.code.clone();
                account.code_deployer = Some(input.input.caller);
            },
        );
        Ok(output)
    }

    fn call_contract(&mut self, world: &World, input: &ContractCallInput) -> WorldResult<VmOutput> {
        let Some(account) = world.account(&input.recipient) else {
            return Ok(VmOutput::failure(
                ReturnCode::ContractNotFound,
                "contract not found",
            ));
        };
        let Some(contract) = self.contracts.get(&account.code).cloned() else {
            return Ok(VmOutput::failure(
                ReturnCode::ContractInvalid,
                "invalid contract code",
            ));
        };
        if !contract.has_endpoint(&input.function) || input.function == INIT_FUNCTION {
            return Ok(VmOutput::failure(
                ReturnCode::FunctionNotFound,
                "invalid function (not found)",
            ));
        }

        debug!("Mock call of {} on {}", input.function, input.recipient);
        Ok(self.run(
            world,
            &contract,
            input.recipient,
            &input.function,
            &input.input,
            self.schedule.contract_call,
            |_| {},
        ))
    }

    fn set_gas_schedule(&mut self, schedule: &GasSchedule) {
        self.schedule = schedule.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 32])
    }

    fn sc(byte: u8) -> Address {
        let mut bytes = [byte; 32];
        bytes[..8].copy_from_slice(&[0; 8]);
        Address::new(bytes)
    }

    fn counter() -> MockContract {
        MockContract::new()
            .endpoint("init", |ctx| ctx.storage_store(b"count", &[1]))
            .endpoint("increment", |ctx| {
                let current = ctx.storage_load(b"count")?;
                let next = current.first().copied().unwrap_or(0) + 1;
                ctx.storage_store(b"count", &[next])?;
                ctx.log("incremented", vec![vec![next]], Vec::new())?;
                ctx.finish(vec![next])
            })
            .endpoint("fail", |ctx| Err(ctx.signal_error("boom")))
            .endpoint("pay", |ctx| {
                let to = Address::from_slice(&ctx.expect_arguments(1)?[0])
                    .map_err(|e| ContractError::User(e.to_string()))?;
                ctx.transfer_value(to, &BigUint::from(3u32))
            })
    }

    fn world_with_counter() -> World {
        let mut world = World::new();
        let contract = Account {
            code: b"counter".to_vec(),
            owner: addr(1).as_bytes().to_vec(),
            balance: BigUint::from(5u32),
            ..Account::new(sc(2))
        };
        world.put_account(contract).unwrap();
        world
    }

    fn call(function: &str, arguments: Vec<Vec<u8>>) -> ContractCallInput {
        ContractCallInput {
            input: VmInput {
                caller: addr(1),
                arguments,
                gas_provided: 100_000,
                ..VmInput::default()
            },
            recipient: sc(2),
            function: function.to_string(),
        }
    }

    #[test]
    fn test_deploy_runs_init() {
        let mut host = MockHost::new(GasSchedule::default()).with_contract("counter", counter());
        let input = ContractCreateInput {
            input: VmInput {
                caller: addr(1),
                gas_provided: 100_000,
                ..VmInput::default()
            },
            code: b"counter".to_vec(),
            new_address: sc(3),
        };
        let output = host.create_contract(&World::new(), &input).unwrap();
        assert!(output.is_ok());
        let account = &output.output_accounts[&sc(3)];
        assert_eq!(account.code, b"counter");
        assert_eq!(account.code_deployer, Some(addr(1)));
        assert_eq!(account.storage_updates.get(b"count".as_slice()), Some(&vec![1]));
        assert_eq!(output.gas_remaining, 100_000 - 10_000 - 50);
    }

    #[test]
    fn test_call_endpoint() {
        let world = world_with_counter();
        let mut host = MockHost::new(GasSchedule::dummy()).with_contract("counter", counter());
        let output = host.call_contract(&world, &call("increment", vec![])).unwrap();
        assert!(output.is_ok());
        assert_eq!(output.return_data, vec![vec![1]]);
        assert_eq!(output.logs.len(), 1);
        assert_eq!(output.logs[0].identifier, b"incremented");
        assert_eq!(output.gas_remaining, 100_000);
    }

    #[test]
    fn test_call_failures() {
        let world = world_with_counter();
        let mut host = MockHost::new(GasSchedule::default()).with_contract("counter", counter());

        let output = host.call_contract(&world, &call("fail", vec![])).unwrap();
        assert_eq!(output.return_code, ReturnCode::UserError);
        assert_eq!(output.return_message, "boom");

        let output = host.call_contract(&world, &call("missing", vec![])).unwrap();
        assert_eq!(output.return_code, ReturnCode::FunctionNotFound);

        let output = host.call_contract(&world, &call("pay", vec![])).unwrap();
        assert_eq!(output.return_code, ReturnCode::FunctionWrongSignature);

        let mut starved = call("increment", vec![]);
        starved.input.gas_provided = 10;
        let output = host.call_contract(&world, &starved).unwrap();
        assert_eq!(output.return_code, ReturnCode::OutOfGas);

        let output = MockHost::default()
            .call_contract(&world, &call("increment", vec![]))
            .unwrap();
        assert_eq!(output.return_code, ReturnCode::ContractInvalid);
    }

    #[test]
    fn test_transfer_value_keeps_delta_sum() {
        let world = world_with_counter();
        let mut host = MockHost::new(GasSchedule::dummy()).with_contract("counter", counter());
        let mut input = call("pay", vec![addr(4).as_bytes().to_vec()]);
        input.input.call_value = BigUint::from(2u32);

        let output = host.call_contract(&world, &input).unwrap();
        assert!(output.is_ok());
        assert_eq!(output.output_accounts[&sc(2)].balance_delta, BigInt::from(-1));
        assert_eq!(output.output_accounts[&addr(4)].balance_delta, BigInt::from(3));
        assert_eq!(output.balance_delta_sum(), BigInt::from(2));
    }
}
