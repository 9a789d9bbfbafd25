//! Transaction execution against the mock ledger

use crate::gas::GasSchedule;
use crate::host::{
    ContractCallInput, ContractCreateInput, EsdtTransfer, ExecutionHost, VmInput, VmOutput,
};
use crate::world::World;
use crate::{WorldError, WorldResult};
use num_bigint::{BigInt, BigUint};
use scenario_core::Address;
use tracing::{debug, info, warn};

/// Length of the synthetic transaction hash handed to the host
pub const TX_HASH_LEN: usize = 32;

/// Kind of a transaction step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Deploy,
    Call,
    Query,
    Transfer,
    ValidatorReward,
}

impl TxKind {
    /// Kind for a scenario `step` name
    pub fn from_step_name(name: &str) -> WorldResult<Self> {
        match name {
            "scDeploy" => Ok(Self::Deploy),
            "scCall" => Ok(Self::Call),
            "scQuery" => Ok(Self::Query),
            "transfer" => Ok(Self::Transfer),
            "validatorReward" => Ok(Self::ValidatorReward),
            other => Err(WorldError::UnknownTxType(other.to_string())),
        }
    }

    pub fn step_name(&self) -> &'static str {
        match self {
            Self::Deploy => "scDeploy",
            Self::Call => "scCall",
            Self::Query => "scQuery",
            Self::Transfer => "transfer",
            Self::ValidatorReward => "validatorReward",
        }
    }

    pub fn has_sender(&self) -> bool {
        !matches!(self, Self::Query | Self::ValidatorReward)
    }

    pub fn has_receiver(&self) -> bool {
        !matches!(self, Self::Deploy)
    }

    pub fn has_function(&self) -> bool {
        matches!(self, Self::Call | Self::Query)
    }

    pub fn has_esdt(&self) -> bool {
        matches!(self, Self::Call | Self::Transfer)
    }

    pub fn has_gas(&self) -> bool {
        matches!(self, Self::Deploy | Self::Call | Self::Transfer)
    }

    /// Steps that invoke the host and may carry an `expect` block
    pub fn is_smart_contract(&self) -> bool {
        matches!(self, Self::Deploy | Self::Call | Self::Query)
    }
}

/// A transaction ready to run
#[derive(Debug, Clone)]
pub struct TxRequest {
    /// Step id, also the source of the transaction hash
    pub id: String,
    pub kind: TxKind,
    pub from: Address,
    pub to: Address,
    pub value: BigUint,
    pub esdt: Vec<EsdtTransfer>,
    pub function: String,
    pub arguments: Vec<Vec<u8>>,
    pub code: Vec<u8>,
    pub gas_limit: u64,
    pub gas_price: u64,
}

impl TxRequest {
    pub fn new(id: impl Into<String>, kind: TxKind) -> Self {
        Self {
            id: id.into(),
            kind,
            from: Address::zero(),
            to: Address::zero(),
            value: BigUint::default(),
            esdt: Vec::new(),
            function: String::new(),
            arguments: Vec::new(),
            code: Vec::new(),
            gas_limit: 0,
            gas_price: 0,
        }
    }
}

/// Transaction execution result
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Host output, or the synthetic one for non-contract kinds
    pub output: VmOutput,
    /// Gas forwarded to the host after up-front settlements
    pub gas_provided: u64,
    /// Address chosen for a deployed contract
    pub new_address: Option<Address>,
}

impl ExecutionResult {
    pub fn gas_used(&self) -> u64 {
        self.gas_provided.saturating_sub(self.output.gas_remaining)
    }
}

/// Transaction hash derived from a step id: the id bytes right-padded
/// with `.`, truncated to 32 bytes
pub fn tx_hash(id: &str) -> Vec<u8> {
    let mut hash: Vec<u8> = id.bytes().take(TX_HASH_LEN).collect();
    hash.resize(TX_HASH_LEN, b'.');
    hash
}

/// Main transaction executor
#[derive(Debug, Clone, Default)]
pub struct TransactionExecutor {
    gas_schedule: GasSchedule,
}

impl TransactionExecutor {
    pub fn new(gas_schedule: GasSchedule) -> Self {
        Self { gas_schedule }
    }

    pub fn gas_schedule(&self) -> &GasSchedule {
        &self.gas_schedule
    }

    /// Run a transaction. A non-OK host result rolls the ledger back and
    /// is returned for checking; errors roll back and propagate.
    pub fn execute(
        &self,
        world: &mut World,
        host: &mut dyn ExecutionHost,
        tx: &TxRequest,
    ) -> WorldResult<ExecutionResult> {
        info!("Executing {} tx '{}'", tx.kind.step_name(), tx.id);
        let snapshot = world.begin_tx();

        match self.apply(world, host, tx) {
            Ok(result) => {
                if !result.output.is_ok() {
                    warn!(
                        "Tx '{}' failed: retcode={} ({}), msg={}; rolling back",
                        tx.id,
                        result.output.return_code.as_u64(),
                        result.output.return_code,
                        result.output.return_message
                    );
                    world.rollback_tx(snapshot);
                }
                Ok(result)
            }
            Err(err) => {
                warn!("Tx '{}' aborted: {}; rolling back", tx.id, err);
                world.rollback_tx(snapshot);
                Err(err)
            }
        }
    }

    fn apply(
        &self,
        world: &mut World,
        host: &mut dyn ExecutionHost,
        tx: &TxRequest,
    ) -> WorldResult<ExecutionResult> {
        let mut gas_provided = 0;
        let creator_nonce = world.account(&tx.from).map(|a| a.nonce).unwrap_or_default();

        if tx.kind.has_sender() {
            world
                .update_world_state_before(&tx.from, tx.gas_limit, tx.gas_price)
                .map_err(|e| WorldError::Execution(format!("could not set up tx {}: {}", tx.id, e)))?;
            gas_provided = tx.gas_limit;

            if !tx.esdt.is_empty() {
                world.transfer_esdt(&tx.from, &tx.to, &tx.esdt)?;
                let nonces: Vec<u64> = tx.esdt.iter().map(|t| t.nonce).collect();
                let cost = self.gas_schedule.esdt_transfer_cost(&nonces);
                debug!("ESDT settlement of {} transfer(s) cost {} gas", nonces.len(), cost);
                gas_provided = gas_provided.saturating_sub(cost);
            }
        }

        let mut new_address = None;
        let output = if !sender_has_enough_balance(world, tx) {
            VmOutput::out_of_funds()
        } else {
            match tx.kind {
                TxKind::Deploy => {
                    let address = world.new_address(&tx.from, creator_nonce);
                    new_address = Some(address);
                    let input = ContractCreateInput {
                        input: self.vm_input(tx, tx.from, gas_provided),
                        code: tx.code.clone(),
                        new_address: address,
                    };
                    host.create_contract(world, &input)?
                }
                TxKind::Query => {
                    gas_provided = u64::MAX;
                    let input = ContractCallInput {
                        input: self.vm_input(tx, tx.to, gas_provided),
                        recipient: tx.to,
                        function: tx.function.clone(),
                    };
                    self.call(world, host, &input)?
                }
                TxKind::Call => {
                    let input = ContractCallInput {
                        input: self.vm_input(tx, tx.from, gas_provided),
                        recipient: tx.to,
                        function: tx.function.clone(),
                    };
                    self.call(world, host, &input)?
                }
                TxKind::Transfer => {
                    let mut output = VmOutput::ok(0);
                    output.output_account_mut(tx.to).balance_delta = BigInt::from(tx.value.clone());
                    output
                }
                TxKind::ValidatorReward => {
                    let mut output = VmOutput::ok(0);
                    let account = world.validator_reward_output(&tx.to, &tx.value)?;
                    output.output_accounts.insert(account.address, account);
                    output
                }
            }
        };

        let result = ExecutionResult {
            output,
            gas_provided,
            new_address,
        };
        if tx.kind.is_smart_contract() {
            debug!("Tx '{}' total gas used: {}", tx.id, result.gas_used());
        }

        if result.output.is_ok() {
            self.update_state_after_tx(world, tx, &result.output)?;
        }
        Ok(result)
    }

    fn vm_input(&self, tx: &TxRequest, caller: Address, gas_provided: u64) -> VmInput {
        VmInput {
            caller,
            arguments: tx.arguments.clone(),
            call_value: tx.value.clone(),
            esdt_transfers: tx.esdt.clone(),
            gas_price: tx.gas_price,
            gas_provided,
            tx_hash: tx_hash(&tx.id),
        }
    }

    fn call(
        &self,
        world: &World,
        host: &mut dyn ExecutionHost,
        input: &ContractCallInput,
    ) -> WorldResult<VmOutput> {
        let recipient = world.account(&input.recipient).ok_or_else(|| {
            WorldError::Execution(format!(
                "tx recipient (address: {}) does not exist",
                input.recipient.to_hex()
            ))
        })?;
        if !recipient.is_smart_contract() {
            return Err(WorldError::Execution(format!(
                "tx recipient (address: {}) is not a smart contract",
                input.recipient.to_hex()
            )));
        }
        host.call_contract(world, input)
    }

    fn update_state_after_tx(
        &self,
        world: &mut World,
        tx: &TxRequest,
        output: &VmOutput,
    ) -> WorldResult<()> {
        let value = BigInt::from(tx.value.clone());

        // the call value leaves the sender here, it is not part of the deltas
        if tx.kind.has_sender() {
            world.update_balance_with_delta(&tx.from, &-value.clone())?;
        }

        world.update_accounts(&output.output_accounts, &output.deleted_accounts)?;

        if tx.kind != TxKind::ValidatorReward {
            let sum = output.balance_delta_sum();
            if sum != value {
                return Err(WorldError::InvariantViolation(format!(
                    "sum of balance deltas should equal call value. Sum of balance deltas: {} (0x{:x}). Call value: {} (0x{:x})",
                    sum, sum, value, value
                )));
            }
        }
        Ok(())
    }
}

fn sender_has_enough_balance(world: &World, tx: &TxRequest) -> bool {
    if !tx.kind.has_sender() {
        return true;
    }
    world
        .account(&tx.from)
        .is_some_and(|sender| sender.balance >= tx.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::host::{OutputAccount, ReturnCode};
    use crate::mock_host::{MockContract, MockHost};

    fn addr(byte: u8) -> Address {
        Address::new([byte; 32])
    }

    fn sc(byte: u8) -> Address {
        let mut bytes = [byte; 32];
        bytes[..8].copy_from_slice(&[0; 8]);
        Address::new(bytes)
    }

    fn world() -> World {
        let mut world = World::new();
        world.put_account(Account::with_balance(addr(1), 48u32)).unwrap();
        world.put_account(Account::new(addr(2))).unwrap();
        world
    }

    fn transfer(value: u32) -> TxRequest {
        TxRequest {
            from: addr(1),
            to: addr(2),
            value: BigUint::from(value),
            ..TxRequest::new("1", TxKind::Transfer)
        }
    }

    /// Host whose call output never balances
    struct LeakyHost;

    impl ExecutionHost for LeakyHost {
        fn create_contract(
            &mut self,
            _world: &World,
            _input: &ContractCreateInput,
        ) -> WorldResult<VmOutput> {
            Ok(VmOutput::failure(ReturnCode::ExecutionFailed, "unused"))
        }

        fn call_contract(&mut self, _world: &World, input: &ContractCallInput) -> WorldResult<VmOutput> {
            let mut output = VmOutput::ok(0);
            let mut account = OutputAccount::new(input.recipient);
            account.balance_delta = BigInt::from(1_000);
            output.output_accounts.insert(input.recipient, account);
            Ok(output)
        }
    }

    #[test]
    fn test_tx_kind_names() {
        for kind in [
            TxKind::Deploy,
            TxKind::Call,
            TxKind::Query,
            TxKind::Transfer,
            TxKind::ValidatorReward,
        ] {
            assert_eq!(TxKind::from_step_name(kind.step_name()).unwrap(), kind);
        }
        assert!(matches!(
            TxKind::from_step_name("scUpgrade"),
            Err(WorldError::UnknownTxType(_))
        ));
        assert!(!TxKind::Query.has_sender());
        assert!(!TxKind::Deploy.has_receiver());
        assert!(TxKind::Transfer.has_esdt());
    }

    #[test]
    fn test_tx_hash_padding() {
        assert_eq!(tx_hash("ab"), [b"ab".as_slice(), &[b'.'; 30]].concat());
        assert_eq!(tx_hash(&"x".repeat(40)).len(), 32);
    }

    #[test]
    fn test_simple_transfer() {
        let mut world = world();
        let executor = TransactionExecutor::default();
        let result = executor
            .execute(&mut world, &mut MockHost::default(), &transfer(10))
            .unwrap();
        assert!(result.output.is_ok());
        assert_eq!(world.account(&addr(1)).unwrap().balance, BigUint::from(38u32));
        assert_eq!(world.account(&addr(1)).unwrap().nonce, 1);
        assert_eq!(world.account(&addr(2)).unwrap().balance, BigUint::from(10u32));
    }

    #[test]
    fn test_transfer_out_of_funds_rolls_back() {
        let mut world = world();
        let root = world.state_root();
        let result = TransactionExecutor::default()
            .execute(&mut world, &mut MockHost::default(), &transfer(100))
            .unwrap();
        assert_eq!(result.output.return_code, ReturnCode::OutOfFunds);
        assert_eq!(world.state_root(), root);
    }

    #[test]
    fn test_gas_upfront_error() {
        let mut world = world();
        let mut tx = transfer(1);
        tx.gas_limit = 100;
        tx.gas_price = 1;
        let err = TransactionExecutor::default()
            .execute(&mut world, &mut MockHost::default(), &tx)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "could not set up tx 1: not enough balance to pay gas upfront"
        );
        assert_eq!(world.account(&addr(1)).unwrap().nonce, 0);
    }

    #[test]
    fn test_invariant_violation_rolls_back() {
        let mut world = world();
        world
            .put_account(Account {
                code: b"leaky".to_vec(),
                owner: addr(1).as_bytes().to_vec(),
                ..Account::new(sc(3))
            })
            .unwrap();
        let root = world.state_root();

        let tx = TxRequest {
            from: addr(1),
            to: sc(3),
            function: "drain".to_string(),
            ..TxRequest::new("leak", TxKind::Call)
        };
        let err = TransactionExecutor::default()
            .execute(&mut world, &mut LeakyHost, &tx)
            .unwrap_err();
        assert!(matches!(err, WorldError::InvariantViolation(_)));
        assert_eq!(world.state_root(), root);
    }

    #[test]
    fn test_call_requires_contract() {
        let mut world = world();
        let tx = TxRequest {
            from: addr(1),
            to: addr(2),
            function: "f".to_string(),
            ..TxRequest::new("c", TxKind::Call)
        };
        let err = TransactionExecutor::default()
            .execute(&mut world, &mut MockHost::default(), &tx)
            .unwrap_err();
        assert!(err.to_string().ends_with("is not a smart contract"));
    }

    #[test]
    fn test_deploy_and_call() {
        let mut world = world();
        let contract = MockContract::new()
            .endpoint("init", |ctx| {
                let value = ctx.expect_arguments(1)?[0].clone();
                ctx.storage_store(b"value", &value)
            })
            .endpoint("get", |ctx| {
                let value = ctx.storage_load(b"value")?;
                ctx.finish(value)
            });
        let mut host = MockHost::new(GasSchedule::dummy()).with_contract("adder", contract);
        let executor = TransactionExecutor::new(GasSchedule::dummy());

        let deploy = TxRequest {
            from: addr(1),
            code: b"adder".to_vec(),
            arguments: vec![vec![7]],
            value: BigUint::from(3u32),
            gas_limit: 1_000,
            ..TxRequest::new("deploy", TxKind::Deploy)
        };
        let result = executor.execute(&mut world, &mut host, &deploy).unwrap();
        assert!(result.output.is_ok());
        let address = result.new_address.unwrap();
        assert_eq!(address, world.new_address(&addr(1), 0));

        let contract_account = world.account(&address).unwrap();
        assert_eq!(contract_account.owner, addr(1).as_bytes().to_vec());
        assert_eq!(contract_account.balance, BigUint::from(3u32));
        assert_eq!(contract_account.storage_value(b"value"), [7]);
        assert_eq!(world.account(&addr(1)).unwrap().balance, BigUint::from(45u32));

        let query = TxRequest {
            to: address,
            function: "get".to_string(),
            ..TxRequest::new("query", TxKind::Query)
        };
        let result = executor.execute(&mut world, &mut host, &query).unwrap();
        assert_eq!(result.output.return_data, vec![vec![7]]);
        assert_eq!(result.gas_provided, u64::MAX);
    }

    #[test]
    fn test_validator_reward() {
        let mut world = world();
        let tx = TxRequest {
            to: addr(2),
            value: BigUint::from(5u32),
            ..TxRequest::new("reward", TxKind::ValidatorReward)
        };
        TransactionExecutor::default()
            .execute(&mut world, &mut MockHost::default(), &tx)
            .unwrap();
        TransactionExecutor::default()
            .execute(&mut world, &mut MockHost::default(), &tx)
            .unwrap();
        let account = world.account(&addr(2)).unwrap();
        assert_eq!(account.balance, BigUint::from(10u32));
        assert_eq!(account.storage_value(crate::world::REWARD_KEY), [10]);
    }
}
