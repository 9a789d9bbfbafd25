use super::value::{CheckValue, JsonBigInt, JsonBytes, JsonUint64};

/// One NFT/SFT or fungible instance of an account's token
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EsdtInstance {
    pub nonce: JsonUint64,
    pub balance: JsonBigInt,
    pub creator: Option<JsonBytes>,
    pub royalties: Option<JsonUint64>,
    pub hash: Option<JsonBytes>,
    pub uris: Vec<JsonBytes>,
    pub attributes: Option<JsonBytes>,
}

/// Token holdings of an account in a `setState` step
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EsdtData {
    pub token_identifier: JsonBytes,
    pub instances: Vec<EsdtInstance>,
    pub last_nonce: Option<JsonUint64>,
    pub roles: Vec<String>,
    pub frozen: Option<JsonUint64>,
    /// Written as a bare balance string
    pub is_short_form: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageEntry {
    pub key: JsonBytes,
    pub value: JsonBytes,
}

/// Account as written in a `setState` step
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Account {
    pub address: JsonBytes,
    pub comment: Option<String>,
    pub shard: Option<JsonUint64>,
    pub nonce: Option<JsonUint64>,
    pub balance: Option<JsonBigInt>,
    pub esdt: Vec<EsdtData>,
    pub username: Option<JsonBytes>,
    pub storage: Option<Vec<StorageEntry>>,
    pub code: Option<JsonBytes>,
    pub owner: Option<JsonBytes>,
    pub async_call_data: Option<JsonBytes>,
    pub developer_rewards: Option<JsonBigInt>,
    /// Merge into the existing account instead of replacing it
    pub update: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckEsdtInstance {
    pub nonce: JsonUint64,
    pub balance: CheckValue<JsonBigInt>,
    pub creator: CheckValue<JsonBytes>,
    pub royalties: CheckValue<JsonUint64>,
    pub hash: CheckValue<JsonBytes>,
    pub uri: CheckValue<JsonBytes>,
    pub attributes: CheckValue<JsonBytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckEsdtData {
    pub token_identifier: JsonBytes,
    pub instances: Vec<CheckEsdtInstance>,
    pub last_nonce: CheckValue<JsonUint64>,
    pub roles: Vec<String>,
    pub frozen: CheckValue<JsonUint64>,
    pub is_short_form: bool,
}

/// Expected token holdings of one account
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckEsdt {
    /// Field absent: the account must hold no tokens
    #[default]
    Unspecified,
    /// `"*"`: tokens are not checked
    Star,
    Tokens {
        tokens: Vec<CheckEsdtData>,
        /// A `"+"` key allows tokens not listed
        more_allowed: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckStorageEntry {
    pub key: JsonBytes,
    pub value: CheckValue<JsonBytes>,
}

/// Expected storage of one account
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckStorage {
    /// Field absent: storage is not checked
    #[default]
    Unspecified,
    Star,
    Entries {
        entries: Vec<CheckStorageEntry>,
        /// A `"+"` key allows keys not listed
        more_allowed: bool,
    },
}

/// Account as written in a `checkState` step
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckAccount {
    pub address: JsonBytes,
    pub comment: Option<String>,
    pub nonce: CheckValue<JsonUint64>,
    pub balance: CheckValue<JsonBigInt>,
    pub esdt: CheckEsdt,
    pub username: CheckValue<JsonBytes>,
    pub storage: CheckStorage,
    pub code: CheckValue<JsonBytes>,
    pub owner: CheckValue<JsonBytes>,
    pub async_call_data: CheckValue<JsonBytes>,
    pub developer_rewards: CheckValue<JsonBigInt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckAccounts {
    /// A `"+"` key allows ledger accounts not listed
    pub other_accounts_allowed: bool,
    pub accounts: Vec<CheckAccount>,
}

impl CheckAccounts {
    pub fn find(&self, address: &[u8]) -> Option<&CheckAccount> {
        self.accounts
            .iter()
            .find(|account| account.address.value == address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewAddressMock {
    pub creator_address: JsonBytes,
    pub creator_nonce: JsonUint64,
    pub new_address: JsonBytes,
}

/// Block metadata; absent fields are zero
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockInfo {
    pub timestamp: Option<JsonUint64>,
    pub nonce: Option<JsonUint64>,
    pub round: Option<JsonUint64>,
    pub epoch: Option<JsonUint64>,
    pub random_seed: Option<JsonBytes>,
}
