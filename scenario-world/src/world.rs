//! Mock ledger and snapshots

use crate::account::{Account, AccountPatch};
use crate::esdt;
use crate::host::{EsdtTransfer, OutputAccount};
use crate::{WorldError, WorldResult};
use num_bigint::{BigInt, BigUint};
use scenario_core::expression::{biguint_minimal, DEFAULT_VM_TYPE};
use scenario_core::{
    Address, ExprHint, ExprReconstructor, Hash, ADDRESS_LEN, SC_ADDRESS_LEADING_ZEROS,
    VM_TYPE_LEN,
};
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::debug;

pub const BLOCK_RANDOM_SEED_LEN: usize = 48;

/// Protocol storage counter incremented by validator rewards
pub const REWARD_KEY: &[u8] = b"ELRONDreward";

/// Block metadata visible to contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub timestamp: u64,
    pub nonce: u64,
    pub round: u64,
    pub epoch: u32,
    pub random_seed: [u8; BLOCK_RANDOM_SEED_LEN],
}

impl Default for BlockInfo {
    fn default() -> Self {
        Self {
            timestamp: 0,
            nonce: 0,
            round: 0,
            epoch: 0,
            random_seed: [0u8; BLOCK_RANDOM_SEED_LEN],
        }
    }
}

impl BlockInfo {
    /// Copies at most 48 bytes of `seed`, zero-filling the rest
    pub fn seed_from_slice(seed: &[u8]) -> [u8; BLOCK_RANDOM_SEED_LEN] {
        let mut result = [0u8; BLOCK_RANDOM_SEED_LEN];
        let len = seed.len().min(BLOCK_RANDOM_SEED_LEN);
        result[..len].copy_from_slice(&seed[..len]);
        result
    }
}

/// Reserved deploy address for a creator at a given nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAddressMock {
    pub creator_address: Address,
    pub creator_nonce: u64,
    pub new_address: Address,
}

/// One account line of a `setState` step
#[derive(Debug, Clone)]
pub enum AccountEntry {
    /// Insert or overwrite
    Put(Account),
    /// Merge into an existing account
    Update(AccountPatch),
}

/// Everything a `setState` step can change
#[derive(Debug, Clone, Default)]
pub struct SetState {
    pub accounts: Vec<AccountEntry>,
    pub new_address_mocks: Vec<NewAddressMock>,
    pub previous_block_info: Option<BlockInfo>,
    pub current_block_info: Option<BlockInfo>,
    pub block_hashes: Option<Vec<Vec<u8>>>,
}

/// Ledger contents saved by [`World::begin_tx`]
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    accounts: BTreeMap<Address, Account>,
}

/// In-memory ledger owned by a scenario runner
#[derive(Debug, Clone)]
pub struct World {
    accounts: BTreeMap<Address, Account>,
    previous_block_info: BlockInfo,
    current_block_info: BlockInfo,
    block_hashes: Vec<Vec<u8>>,
    new_address_mocks: Vec<NewAddressMock>,
    vm_type: [u8; VM_TYPE_LEN],
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            accounts: BTreeMap::new(),
            previous_block_info: BlockInfo::default(),
            current_block_info: BlockInfo::default(),
            block_hashes: Vec::new(),
            new_address_mocks: Vec::new(),
            vm_type: DEFAULT_VM_TYPE,
        }
    }

    pub fn with_vm_type(mut self, vm_type: [u8; VM_TYPE_LEN]) -> Self {
        self.vm_type = vm_type;
        self
    }

    pub fn vm_type(&self) -> [u8; VM_TYPE_LEN] {
        self.vm_type
    }

    /// Drop all accounts, block data and reservations
    pub fn clear(&mut self) {
        *self = Self::new().with_vm_type(self.vm_type);
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn account_mut(&mut self, address: &Address) -> Option<&mut Account> {
        self.accounts.get_mut(address)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Insert or overwrite an account after validating it
    pub fn put_account(&mut self, account: Account) -> WorldResult<()> {
        account.validate()?;
        self.accounts.insert(account.address, account);
        Ok(())
    }

    pub fn delete_account(&mut self, address: &Address) -> Option<Account> {
        self.accounts.remove(address)
    }

    pub fn previous_block_info(&self) -> &BlockInfo {
        &self.previous_block_info
    }

    pub fn current_block_info(&self) -> &BlockInfo {
        &self.current_block_info
    }

    pub fn new_address_mocks(&self) -> &[NewAddressMock] {
        &self.new_address_mocks
    }

    /// Apply a `setState` step. Every entry is validated before anything
    /// is written, so a failing step leaves the ledger untouched.
    pub fn apply_set_state(&mut self, state: SetState) -> WorldResult<()> {
        let mut staged = Vec::with_capacity(state.accounts.len());
        for entry in state.accounts {
            let account = match entry {
                AccountEntry::Put(account) => account,
                AccountEntry::Update(patch) => {
                    let mut account = self
                        .accounts
                        .get(&patch.address)
                        .cloned()
                        .ok_or_else(|| {
                            WorldError::Validation(format!(
                                "account not found. could not update {}",
                                patch.address
                            ))
                        })?;
                    patch.apply_to(&mut account)?;
                    account
                }
            };
            account.validate()?;
            staged.push(account);
        }

        for mock in &state.new_address_mocks {
            if !mock.new_address.is_smart_contract() {
                return Err(WorldError::Validation(format!(
                    "new address mock {} is not a smart contract address",
                    mock.new_address
                )));
            }
        }

        for account in staged {
            debug!("Set state for account {}", account.address);
            self.accounts.insert(account.address, account);
        }
        if let Some(info) = state.previous_block_info {
            self.previous_block_info = info;
        }
        if let Some(info) = state.current_block_info {
            self.current_block_info = info;
        }
        if let Some(hashes) = state.block_hashes {
            self.block_hashes = hashes;
        }
        self.new_address_mocks.extend(state.new_address_mocks);
        Ok(())
    }

    /// Save the accounts before a transaction runs
    pub fn begin_tx(&self) -> WorldSnapshot {
        WorldSnapshot {
            accounts: self.accounts.clone(),
        }
    }

    /// Restore the accounts saved by [`World::begin_tx`]
    pub fn rollback_tx(&mut self, snapshot: WorldSnapshot) {
        self.accounts = snapshot.accounts;
    }

    /// Fingerprint of all account data, equal for byte-identical ledgers
    pub fn state_root(&self) -> Hash {
        let mut hasher = blake3::Hasher::new();
        let mut field = |bytes: &[u8]| {
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };

        for (address, account) in &self.accounts {
            field(address.as_bytes());
            field(&account.nonce.to_le_bytes());
            field(&account.balance.to_bytes_be());
            field(&account.username);
            field(&account.code);
            field(&account.code_metadata);
            field(&account.owner);
            field(account.async_call_data.as_bytes());
            field(&account.developer_rewards.to_bytes_be());
            field(&account.shard.to_le_bytes());
            field(&(account.storage.len() as u64).to_le_bytes());
            for (key, value) in &account.storage {
                field(key);
                field(value);
            }
        }

        Hash::new(*hasher.finalize().as_bytes())
    }

    /// Address for a contract deployed by `creator` at `creator_nonce`.
    ///
    /// Reservations win. Otherwise the address is the contract prefix and
    /// VM type, 21 bytes of `keccak256(creator | nonce_be)` and the
    /// creator's last byte.
    pub fn new_address(&self, creator: &Address, creator_nonce: u64) -> Address {
        if let Some(mock) = self
            .new_address_mocks
            .iter()
            .find(|m| m.creator_address == *creator && m.creator_nonce == creator_nonce)
        {
            return mock.new_address;
        }

        let mut preimage = creator.as_bytes().to_vec();
        preimage.extend_from_slice(&creator_nonce.to_be_bytes());
        let digest = Hash::keccak256(&preimage);

        let mut bytes = [0u8; ADDRESS_LEN];
        let name_start = SC_ADDRESS_LEADING_ZEROS + VM_TYPE_LEN;
        bytes[SC_ADDRESS_LEADING_ZEROS..name_start].copy_from_slice(&self.vm_type);
        bytes[name_start..ADDRESS_LEN - 1]
            .copy_from_slice(&digest.as_bytes()[..ADDRESS_LEN - 1 - name_start]);
        bytes[ADDRESS_LEN - 1] = creator.shard_byte();
        Address::new(bytes)
    }

    /// Hash of the block at `nonce`, counted back from the current block
    pub fn block_hash(&self, nonce: u64) -> WorldResult<&[u8]> {
        let current = self.current_block_info.nonce;
        if nonce > current {
            return Err(WorldError::Execution(
                "blockhash nonce exceeds current nonce".to_string(),
            ));
        }
        usize::try_from(current - nonce)
            .ok()
            .and_then(|offset| self.block_hashes.get(offset))
            .map(Vec::as_slice)
            .ok_or_else(|| {
                WorldError::Execution("blockhash nonce is older than what is available".to_string())
            })
    }

    /// Nonce increment and up-front gas payment of a transaction sender
    pub fn update_world_state_before(
        &mut self,
        from: &Address,
        gas_limit: u64,
        gas_price: u64,
    ) -> WorldResult<()> {
        let account = self
            .accounts
            .get_mut(from)
            .ok_or(WorldError::AccountNotFound(*from))?;
        account.increment_nonce();
        let gas_payment = BigUint::from(gas_limit) * BigUint::from(gas_price);
        if account.balance < gas_payment {
            return Err(WorldError::InsufficientFunds(
                "not enough balance to pay gas upfront".to_string(),
            ));
        }
        account.balance -= gas_payment;
        Ok(())
    }

    /// Settle token transfers between two accounts. The receiver is
    /// created when it does not exist yet.
    pub fn transfer_esdt(
        &mut self,
        from: &Address,
        to: &Address,
        transfers: &[EsdtTransfer],
    ) -> WorldResult<()> {
        let sender = self
            .accounts
            .get(from)
            .ok_or(WorldError::AccountNotFound(*from))?;

        if from == to {
            for transfer in transfers {
                let held = sender.token_balance(&transfer.token_identifier, transfer.nonce)?;
                if held < transfer.value {
                    return Err(WorldError::InsufficientFunds(format!(
                        "insufficient ESDT funds for {}: have {}, need {}",
                        String::from_utf8_lossy(&transfer.token_identifier),
                        held,
                        transfer.value
                    )));
                }
            }
            return Ok(());
        }

        let mut from_storage = sender.storage.clone();
        let mut to_storage = self
            .accounts
            .get(to)
            .map(|account| account.storage.clone())
            .unwrap_or_default();

        for transfer in transfers {
            debug!(
                "ESDT transfer of {} {} (nonce {}) from {} to {}",
                transfer.value,
                String::from_utf8_lossy(&transfer.token_identifier),
                transfer.nonce,
                from,
                to
            );
            esdt::transfer(
                &mut from_storage,
                &mut to_storage,
                &transfer.token_identifier,
                transfer.nonce,
                &transfer.value,
            )?;
        }

        if let Some(sender) = self.accounts.get_mut(from) {
            sender.storage = from_storage;
        }
        self.accounts
            .entry(*to)
            .or_insert_with(|| Account::new(*to))
            .storage = to_storage;
        Ok(())
    }

    /// Add a signed delta to an account balance
    pub fn update_balance_with_delta(&mut self, address: &Address, delta: &BigInt) -> WorldResult<()> {
        let account = self
            .accounts
            .get_mut(address)
            .ok_or(WorldError::AccountNotFound(*address))?;
        account.balance = apply_delta(address, &account.balance, delta)?;
        Ok(())
    }

    /// Apply the account changes reported by a successful host run
    pub fn update_accounts(
        &mut self,
        output_accounts: &BTreeMap<Address, OutputAccount>,
        deleted: &[Address],
    ) -> WorldResult<()> {
        for output in output_accounts.values() {
            let account = self.accounts.entry(output.address).or_insert_with(|| {
                let mut created = Account::new(output.address);
                if let Some(deployer) = output.code_deployer {
                    created.owner = deployer.as_bytes().to_vec();
                }
                created
            });

            account.balance = apply_delta(&output.address, &account.balance, &output.balance_delta)?;
            account.nonce = account.nonce.max(output.nonce);
            if !output.code.is_empty() {
                account.code = output.code.clone();
            }
            for (key, value) in &output.storage_updates {
                account.set_storage(key.clone(), value.clone());
            }
            account.developer_rewards += &output.developer_reward_delta;
        }

        for address in deleted {
            self.accounts.remove(address);
        }
        Ok(())
    }

    /// Output of a validator reward: balance credit plus the reward counter
    pub fn validator_reward_output(
        &self,
        recipient: &Address,
        reward: &BigUint,
    ) -> WorldResult<OutputAccount> {
        let account = self.accounts.get(recipient).ok_or_else(|| {
            WorldError::Execution(format!(
                "tx recipient (address: {}) does not exist",
                recipient.to_hex()
            ))
        })?;
        let total = BigUint::from_bytes_be(account.storage_value(REWARD_KEY)) + reward;

        let mut output = OutputAccount::new(*recipient);
        output.balance_delta = BigInt::from(reward.clone());
        output
            .storage_updates
            .insert(REWARD_KEY.to_vec(), biguint_minimal(&total));
        Ok(output)
    }

    /// Human readable listing of all accounts and their storage
    pub fn dump(&self) -> String {
        let er = ExprReconstructor::new();
        let mut out = String::from("world state dump:\n");
        for account in self.accounts.values() {
            let _ = writeln!(
                out,
                "\t{}",
                er.reconstruct(account.address.as_bytes(), ExprHint::Address)
            );
            let _ = writeln!(out, "\t\tnonce: {}", account.nonce);
            let _ = writeln!(out, "\t\tbalance: {}", account.balance);
            if !account.storage.is_empty() {
                out.push_str("\t\tstorage:\n");
                for (key, value) in &account.storage {
                    let _ = writeln!(
                        out,
                        "\t\t\t{} => {}",
                        er.reconstruct(key, ExprHint::NoHint),
                        er.reconstruct(value, ExprHint::NoHint)
                    );
                }
            }
        }
        out
    }
}

fn apply_delta(address: &Address, balance: &BigUint, delta: &BigInt) -> WorldResult<BigUint> {
    (BigInt::from(balance.clone()) + delta)
        .to_biguint()
        .ok_or_else(|| {
            WorldError::InvariantViolation(format!(
                "balance of {} would become negative (balance {}, delta {})",
                address, balance, delta
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 32])
    }

    fn contract(byte: u8) -> Address {
        let mut bytes = [byte; 32];
        bytes[..8].copy_from_slice(&[0; 8]);
        Address::new(bytes)
    }

    #[test]
    fn test_set_state_validates_before_writing() {
        let mut world = World::new();
        let bad = Account {
            code: b"code".to_vec(),
            ..Account::new(addr(2))
        };
        let state = SetState {
            accounts: vec![
                AccountEntry::Put(Account::with_balance(addr(1), 5u32)),
                AccountEntry::Put(bad),
            ],
            ..SetState::default()
        };
        assert!(world.apply_set_state(state).is_err());
        assert_eq!(world.account_count(), 0);
    }

    #[test]
    fn test_set_state_update_merges() {
        let mut world = World::new();
        world.put_account(Account::with_balance(addr(1), 5u32)).unwrap();

        let patch = AccountPatch {
            address: addr(1),
            nonce: Some(3),
            ..AccountPatch::default()
        };
        world
            .apply_set_state(SetState {
                accounts: vec![AccountEntry::Update(patch)],
                current_block_info: Some(BlockInfo {
                    nonce: 7,
                    ..BlockInfo::default()
                }),
                ..SetState::default()
            })
            .unwrap();
        let account = world.account(&addr(1)).unwrap();
        assert_eq!(account.nonce, 3);
        assert_eq!(account.balance, BigUint::from(5u32));
        assert_eq!(world.current_block_info().nonce, 7);

        let missing = AccountPatch {
            address: addr(9),
            ..AccountPatch::default()
        };
        let err = world
            .apply_set_state(SetState {
                accounts: vec![AccountEntry::Update(missing)],
                ..SetState::default()
            })
            .unwrap_err();
        assert!(err.to_string().starts_with("account not found. could not update"));
    }

    #[test]
    fn test_new_address_mock_must_be_contract() {
        let mut world = World::new();
        let state = SetState {
            new_address_mocks: vec![NewAddressMock {
                creator_address: addr(1),
                creator_nonce: 0,
                new_address: addr(2),
            }],
            ..SetState::default()
        };
        assert!(world.apply_set_state(state).is_err());
    }

    #[test]
    fn test_new_address() {
        let mut world = World::new();
        world
            .apply_set_state(SetState {
                new_address_mocks: vec![NewAddressMock {
                    creator_address: addr(1),
                    creator_nonce: 4,
                    new_address: contract(7),
                }],
                ..SetState::default()
            })
            .unwrap();
        assert_eq!(world.new_address(&addr(1), 4), contract(7));

        let derived = world.new_address(&addr(1), 5);
        assert!(derived.is_smart_contract());
        assert_eq!(&derived.as_bytes()[8..10], &DEFAULT_VM_TYPE);
        assert_eq!(derived.shard_byte(), 1);
        assert_ne!(derived, world.new_address(&addr(1), 6));
        assert_eq!(derived, world.new_address(&addr(1), 5));
    }

    #[test]
    fn test_snapshot_rollback() {
        let mut world = World::new();
        world.put_account(Account::with_balance(addr(1), 100u32)).unwrap();
        let root = world.state_root();

        let snapshot = world.begin_tx();
        world
            .update_balance_with_delta(&addr(1), &BigInt::from(-40))
            .unwrap();
        world.put_account(Account::new(addr(2))).unwrap();
        assert_ne!(world.state_root(), root);

        world.rollback_tx(snapshot);
        assert_eq!(world.state_root(), root);
        assert_eq!(world.account_count(), 1);
    }

    #[test]
    fn test_state_root_sees_storage() {
        let mut a = World::new();
        a.put_account(Account::new(addr(1))).unwrap();
        let b = a.clone();
        a.account_mut(&addr(1))
            .unwrap()
            .set_storage(b"k".to_vec(), b"v".to_vec());
        assert_ne!(a.state_root(), b.state_root());
    }

    #[test]
    fn test_block_hash() {
        let mut world = World::new();
        world
            .apply_set_state(SetState {
                current_block_info: Some(BlockInfo {
                    nonce: 10,
                    ..BlockInfo::default()
                }),
                block_hashes: Some(vec![b"h10".to_vec(), b"h9".to_vec()]),
                ..SetState::default()
            })
            .unwrap();
        assert_eq!(world.block_hash(10).unwrap(), b"h10");
        assert_eq!(world.block_hash(9).unwrap(), b"h9");
        assert!(world.block_hash(11).is_err());
        assert!(world.block_hash(8).is_err());
    }

    #[test]
    fn test_block_hash_far_behind_current_nonce() {
        for current in [1u64 << 32, u64::MAX] {
            let mut world = World::new();
            world
                .apply_set_state(SetState {
                    current_block_info: Some(BlockInfo {
                        nonce: current,
                        ..BlockInfo::default()
                    }),
                    block_hashes: Some(vec![b"latest".to_vec()]),
                    ..SetState::default()
                })
                .unwrap();
            assert_eq!(world.block_hash(current).unwrap(), b"latest");
            let err = world.block_hash(0).unwrap_err();
            assert!(err.to_string().contains("older than what is available"));
        }
    }

    #[test]
    fn test_gas_upfront() {
        let mut world = World::new();
        world.put_account(Account::with_balance(addr(1), 100u32)).unwrap();
        world.update_world_state_before(&addr(1), 10, 5).unwrap();
        let account = world.account(&addr(1)).unwrap();
        assert_eq!(account.nonce, 1);
        assert_eq!(account.balance, BigUint::from(50u32));

        let err = world.update_world_state_before(&addr(1), 100, 1).unwrap_err();
        assert_eq!(err.to_string(), "not enough balance to pay gas upfront");
    }

    #[test]
    fn test_update_accounts() {
        let mut world = World::new();
        world.put_account(Account::with_balance(addr(1), 10u32)).unwrap();
        world.put_account(Account::new(addr(3))).unwrap();

        let mut outputs = BTreeMap::new();
        let mut created = OutputAccount::new(contract(2));
        created.code = b"code".to_vec();
        created.code_deployer = Some(addr(1));
        created.balance_delta = BigInt::from(4);
        created.nonce = 0;
        created.storage_updates.insert(b"k".to_vec(), b"v".to_vec());
        outputs.insert(created.address, created);

        let mut existing = OutputAccount::new(addr(1));
        existing.balance_delta = BigInt::from(-4);
        outputs.insert(existing.address, existing);

        world.update_accounts(&outputs, &[addr(3)]).unwrap();

        let new_contract = world.account(&contract(2)).unwrap();
        assert_eq!(new_contract.owner, addr(1).as_bytes().to_vec());
        assert_eq!(new_contract.balance, BigUint::from(4u32));
        assert_eq!(new_contract.storage_value(b"k"), b"v");
        assert_eq!(world.account(&addr(1)).unwrap().balance, BigUint::from(6u32));
        assert!(world.account(&addr(3)).is_none());
    }

    #[test]
    fn test_transfer_esdt() {
        let mut world = World::new();
        let mut sender = Account::new(addr(1));
        esdt::write_records(
            &mut sender.storage,
            &[esdt::TokenRecord {
                identifier: b"TOK-123456".to_vec(),
                instances: vec![esdt::TokenInstance::fungible(BigUint::from(10u32))],
                ..esdt::TokenRecord::default()
            }],
        )
        .unwrap();
        world.put_account(sender).unwrap();

        let transfer = EsdtTransfer {
            token_identifier: b"TOK-123456".to_vec(),
            nonce: 0,
            value: BigUint::from(4u32),
        };
        world
            .transfer_esdt(&addr(1), &addr(2), std::slice::from_ref(&transfer))
            .unwrap();
        assert_eq!(
            world.account(&addr(1)).unwrap().token_balance(b"TOK-123456", 0).unwrap(),
            BigUint::from(6u32)
        );
        assert_eq!(
            world.account(&addr(2)).unwrap().token_balance(b"TOK-123456", 0).unwrap(),
            BigUint::from(4u32)
        );

        let too_much = EsdtTransfer {
            value: BigUint::from(100u32),
            ..transfer
        };
        assert!(world.transfer_esdt(&addr(1), &addr(2), &[too_much]).is_err());
    }

    #[test]
    fn test_validator_reward_output() {
        let mut world = World::new();
        let mut account = Account::new(addr(1));
        account.set_storage(REWARD_KEY.to_vec(), vec![5]);
        world.put_account(account).unwrap();

        let output = world
            .validator_reward_output(&addr(1), &BigUint::from(10u32))
            .unwrap();
        assert_eq!(output.balance_delta, BigInt::from(10));
        assert_eq!(output.storage_updates.get(REWARD_KEY), Some(&vec![15]));
        assert!(world
            .validator_reward_output(&addr(2), &BigUint::from(1u32))
            .is_err());
    }

    #[test]
    fn test_dump() {
        let mut world = World::new();
        let mut account = Account::with_balance(addr(b'a'), 3u32);
        account.set_storage(b"key".to_vec(), b"val".to_vec());
        world.put_account(account).unwrap();
        let dump = world.dump();
        assert!(dump.starts_with("world state dump:\n"));
        assert!(dump.contains("\t\tbalance: 3\n"));
        assert!(dump.contains("0x6b6579 (str:key) => 0x76616c (str:val)"));
    }
}
