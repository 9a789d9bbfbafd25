//! Account model

use crate::esdt::{self, Storage, TokenRecord};
use crate::{WorldError, WorldResult};
use num_bigint::BigUint;
use scenario_core::Address;
use std::collections::BTreeMap;

/// Account information held by the mock ledger
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Account {
    pub address: Address,
    /// Number of transactions sent
    pub nonce: u64,
    pub balance: BigUint,
    pub username: Vec<u8>,
    /// Contract storage, ESDT records included
    pub storage: Storage,
    /// Contract code, empty for user accounts
    pub code: Vec<u8>,
    pub code_metadata: Vec<u8>,
    /// Deployer of a contract, empty for user accounts
    pub owner: Vec<u8>,
    pub async_call_data: String,
    pub developer_rewards: BigUint,
    pub shard: u32,
}

impl Account {
    /// Create a new empty account
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// Create an account with initial balance
    pub fn with_balance(address: Address, balance: impl Into<BigUint>) -> Self {
        Self {
            address,
            balance: balance.into(),
            ..Self::default()
        }
    }

    /// Check if account is a contract
    pub fn is_smart_contract(&self) -> bool {
        !self.code.is_empty()
    }

    /// Code and owner go together: a contract has an owner and only contracts do
    pub fn validate(&self) -> WorldResult<()> {
        if self.is_smart_contract() && self.owner.is_empty() {
            return Err(WorldError::Validation(format!(
                "contract account {} has code but no owner",
                self.address
            )));
        }
        if !self.is_smart_contract() && !self.owner.is_empty() {
            return Err(WorldError::Validation(format!(
                "account {} has an owner but no code",
                self.address
            )));
        }
        Ok(())
    }

    pub fn increment_nonce(&mut self) {
        self.nonce += 1;
    }

    pub fn add_balance(&mut self, amount: &BigUint) {
        self.balance += amount;
    }

    /// Subtract from balance
    pub fn sub_balance(&mut self, amount: &BigUint) -> WorldResult<()> {
        if self.balance < *amount {
            return Err(WorldError::InsufficientFunds(format!(
                "insufficient balance for {}: required {}, available {}",
                self.address, amount, self.balance
            )));
        }
        self.balance -= amount;
        Ok(())
    }

    /// Value under `key`, empty when unset
    pub fn storage_value(&self, key: &[u8]) -> &[u8] {
        self.storage.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// An empty value deletes the key
    pub fn set_storage(&mut self, key: Vec<u8>, value: Vec<u8>) {
        if value.is_empty() {
            self.storage.remove(&key);
        } else {
            self.storage.insert(key, value);
        }
    }

    /// All ESDT records held in storage, keyed by identifier
    pub fn token_records(&self) -> WorldResult<BTreeMap<Vec<u8>, TokenRecord>> {
        esdt::decode_records(&self.storage)
    }

    pub fn token_balance(&self, identifier: &[u8], nonce: u64) -> WorldResult<BigUint> {
        esdt::token_balance(&self.storage, identifier, nonce)
    }

    /// Storage without the protocol-reserved keys
    pub fn user_storage(&self) -> impl Iterator<Item = (&Vec<u8>, &Vec<u8>)> {
        self.storage
            .iter()
            .filter(|(key, _)| !esdt::is_protected_key(key))
    }
}

/// Field-by-field changes applied to an existing account by a `setState`
/// entry marked as an update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub address: Address,
    pub nonce: Option<u64>,
    pub balance: Option<BigUint>,
    pub username: Option<Vec<u8>>,
    /// Merged into existing storage key by key
    pub storage: Option<Storage>,
    pub code: Option<Vec<u8>>,
    pub owner: Option<Vec<u8>>,
    pub async_call_data: Option<String>,
    pub developer_rewards: Option<BigUint>,
    pub shard: Option<u32>,
    /// Written through the ESDT codec on top of existing records
    pub esdt: Vec<TokenRecord>,
}

impl AccountPatch {
    pub fn apply_to(&self, account: &mut Account) -> WorldResult<()> {
        if let Some(nonce) = self.nonce {
            account.nonce = nonce;
        }
        if let Some(balance) = &self.balance {
            account.balance = balance.clone();
        }
        if let Some(username) = &self.username {
            account.username = username.clone();
        }
        if let Some(storage) = &self.storage {
            for (key, value) in storage {
                account.set_storage(key.clone(), value.clone());
            }
        }
        if let Some(code) = &self.code {
            account.code = code.clone();
        }
        if let Some(owner) = &self.owner {
            account.owner = owner.clone();
        }
        if let Some(data) = &self.async_call_data {
            account.async_call_data = data.clone();
        }
        if let Some(rewards) = &self.developer_rewards {
            account.developer_rewards = rewards.clone();
        }
        if let Some(shard) = self.shard {
            account.shard = shard;
        }
        esdt::write_records(&mut account.storage, &self.esdt)
    }
}
