use super::value::{CheckValue, CheckValueList, JsonBigInt, JsonBytes, JsonUint64};
use scenario_world::TxKind;

/// Token attached to a transaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EsdtTxData {
    pub token_identifier: JsonBytes,
    pub nonce: JsonUint64,
    pub value: JsonBigInt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub kind: TxKind,
    pub from: JsonBytes,
    pub to: JsonBytes,
    pub function: String,
    pub egld_value: JsonBigInt,
    pub esdt_value: Vec<EsdtTxData>,
    pub arguments: Vec<JsonBytes>,
    pub code: JsonBytes,
    pub gas_limit: JsonUint64,
    pub gas_price: JsonUint64,
}

impl Transaction {
    pub fn new(kind: TxKind) -> Self {
        Self {
            kind,
            from: JsonBytes::default(),
            to: JsonBytes::default(),
            function: String::new(),
            egld_value: JsonBigInt::default(),
            esdt_value: Vec::new(),
            arguments: Vec::new(),
            code: JsonBytes::default(),
            gas_limit: JsonUint64::default(),
            gas_price: JsonUint64::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckLogEntry {
    pub address: CheckValue<JsonBytes>,
    pub identifier: CheckValue<JsonBytes>,
    pub topics: CheckValueList,
    pub data: CheckValue<JsonBytes>,
}

/// Expected logs of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckLogs {
    #[default]
    Unspecified,
    Star,
    List {
        entries: Vec<CheckLogEntry>,
        /// The list ended with `"+"`: extra actual logs are fine
        more_allowed_at_end: bool,
    },
}

/// The `expect` block of a transaction step
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxExpect {
    pub out: CheckValueList,
    pub status: CheckValue<JsonBigInt>,
    pub message: CheckValue<JsonBytes>,
    pub logs: CheckLogs,
    pub gas: CheckValue<JsonUint64>,
    pub refund: CheckValue<JsonBigInt>,
}
