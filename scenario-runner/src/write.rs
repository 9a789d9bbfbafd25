//! [`Scenario`] model back to ordered JSON
//!
//! Values are written with the text they were parsed from, so parsing a
//! file and writing it again keeps its expressions intact. Values built in
//! code without source text come out as `0x` hex.

use crate::model::{
    Account, BlockInfo, CheckAccount, CheckAccounts, CheckEsdt, CheckEsdtData, CheckEsdtInstance,
    CheckLogEntry, CheckLogs, CheckStorage, CheckValue, CheckValueList, EsdtData, EsdtInstance,
    EsdtTxData, Expected, JsonBytes, NewAddressMock, Scenario, Step, Transaction, TxExpect,
    TxStep,
};
use crate::{RunnerError, RunnerResult};
use scenario_core::{ojson, OrderedJson, OrderedMap};
use scenario_world::{GasScheduleKind, TxKind};
use std::path::Path;

const MORE_ALLOWED_KEY: &str = "+";

#[derive(Debug, Clone, Copy, Default)]
pub struct ScenarioWriter;

impl ScenarioWriter {
    pub fn new() -> Self {
        Self
    }

    /// Formatted JSON text with a trailing newline
    pub fn scenario_to_string(&self, scenario: &Scenario) -> String {
        let mut text = ojson::to_json_string(&self.scenario_to_json(scenario));
        text.push('\n');
        text
    }

    pub fn write_scenario_file(&self, scenario: &Scenario, path: &Path) -> RunnerResult<()> {
        std::fs::write(path, self.scenario_to_string(scenario)).map_err(|source| RunnerError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn scenario_to_json(&self, scenario: &Scenario) -> OrderedJson {
        let mut root = OrderedMap::new();
        if let Some(name) = &scenario.name {
            root.put("name", OrderedJson::str(name));
        }
        if let Some(comment) = &scenario.comment {
            root.put("comment", OrderedJson::str(comment));
        }
        if !scenario.check_gas {
            root.put("checkGas", false);
        }
        if scenario.trace_gas {
            root.put("traceGas", true);
        }
        if scenario.gas_schedule != GasScheduleKind::Default {
            root.put("gasSchedule", OrderedJson::str(scenario.gas_schedule.name()));
        }
        let steps: Vec<OrderedJson> = scenario.steps.iter().map(|step| self.step_to_json(step)).collect();
        root.put("steps", steps);
        root.into()
    }

    pub fn step_to_json(&self, step: &Step) -> OrderedJson {
        let mut map = OrderedMap::new();
        map.put("step", OrderedJson::str(step.type_name()));
        match step {
            Step::ExternalSteps(step) => {
                put_comment(&mut map, &step.comment);
                map.put("path", OrderedJson::str(&step.path));
            }
            Step::SetState(step) => {
                put_id(&mut map, "id", step.id.as_deref());
                put_comment(&mut map, &step.comment);
                if !step.accounts.is_empty() {
                    map.put("accounts", accounts_to_json(&step.accounts));
                }
                if !step.new_address_mocks.is_empty() {
                    let mocks: Vec<OrderedJson> =
                        step.new_address_mocks.iter().map(new_address_to_json).collect();
                    map.put("newAddresses", mocks);
                }
                if let Some(info) = &step.previous_block_info {
                    map.put("previousBlockInfo", block_info_to_json(info));
                }
                if let Some(info) = &step.current_block_info {
                    map.put("currentBlockInfo", block_info_to_json(info));
                }
                if let Some(hashes) = &step.block_hashes {
                    let hashes: Vec<OrderedJson> = hashes.iter().map(JsonBytes::to_json).collect();
                    map.put("blockHashes", hashes);
                }
            }
            Step::CheckState(step) => {
                put_id(&mut map, "id", step.id.as_deref());
                put_comment(&mut map, &step.comment);
                map.put("accounts", check_accounts_to_json(&step.accounts));
            }
            Step::DumpState(step) => put_comment(&mut map, &step.comment),
            Step::Tx(step) => tx_step_to_json(&mut map, step),
        }
        map.into()
    }
}

fn put_id(map: &mut OrderedMap, key: &str, id: Option<&str>) {
    if let Some(id) = id.filter(|id| !id.is_empty()) {
        map.put(key, OrderedJson::str(id));
    }
}

fn put_comment(map: &mut OrderedMap, comment: &Option<String>) {
    if let Some(comment) = comment {
        map.put("comment", OrderedJson::str(comment));
    }
}

fn put_check<T: Expected>(map: &mut OrderedMap, key: &str, value: &CheckValue<T>) {
    if let Some(json) = value.to_json() {
        map.put(key, json);
    }
}

fn put_opt<T: Expected>(map: &mut OrderedMap, key: &str, value: &Option<T>) {
    if let Some(value) = value {
        map.put(key, value.to_json());
    }
}

fn check_list_to_json(list: &CheckValueList) -> Option<OrderedJson> {
    match list {
        CheckValueList::Unspecified => None,
        CheckValueList::Star => Some(OrderedJson::str("*")),
        CheckValueList::Values(values) => Some(OrderedJson::List(
            values
                .iter()
                .map(|value| value.to_json().unwrap_or_else(|| OrderedJson::str("")))
                .collect(),
        )),
    }
}

fn accounts_to_json(accounts: &[Account]) -> OrderedJson {
    let mut map = OrderedMap::new();
    for account in accounts {
        map.put(account.address.original_text(), account_to_json(account));
    }
    map.into()
}

fn account_to_json(account: &Account) -> OrderedJson {
    let mut map = OrderedMap::new();
    put_comment(&mut map, &account.comment);
    put_opt(&mut map, "shard", &account.shard);
    put_opt(&mut map, "nonce", &account.nonce);
    put_opt(&mut map, "balance", &account.balance);
    if !account.esdt.is_empty() {
        let mut tokens = OrderedMap::new();
        for token in &account.esdt {
            tokens.put(token.token_identifier.original_text(), esdt_to_json(token));
        }
        map.put("esdt", tokens);
    }
    put_opt(&mut map, "username", &account.username);
    if let Some(storage) = &account.storage {
        let mut entries = OrderedMap::new();
        for entry in storage {
            entries.put(entry.key.original_text(), entry.value.to_json());
        }
        map.put("storage", entries);
    }
    put_opt(&mut map, "code", &account.code);
    put_opt(&mut map, "owner", &account.owner);
    put_opt(&mut map, "asyncCallData", &account.async_call_data);
    put_opt(&mut map, "developerRewards", &account.developer_rewards);
    if account.update {
        map.put("update", true);
    }
    map.into()
}

fn esdt_to_json(token: &EsdtData) -> OrderedJson {
    if token.is_short_form {
        if let Some(instance) = token.instances.first() {
            return instance.balance.to_json();
        }
    }
    let mut map = OrderedMap::new();
    if !token.instances.is_empty() {
        let instances: Vec<OrderedJson> = token.instances.iter().map(esdt_instance_to_json).collect();
        map.put("instances", instances);
    }
    put_opt(&mut map, "lastNonce", &token.last_nonce);
    if !token.roles.is_empty() {
        map.put("roles", roles_to_json(&token.roles));
    }
    put_opt(&mut map, "frozen", &token.frozen);
    map.into()
}

fn esdt_instance_to_json(instance: &EsdtInstance) -> OrderedJson {
    let mut map = OrderedMap::new();
    map.put("nonce", instance.nonce.to_json());
    map.put("balance", instance.balance.to_json());
    put_opt(&mut map, "creator", &instance.creator);
    put_opt(&mut map, "royalties", &instance.royalties);
    put_opt(&mut map, "hash", &instance.hash);
    match instance.uris.as_slice() {
        [] => {}
        [uri] => map.put("uri", uri.to_json()),
        uris => map.put(
            "uri",
            uris.iter().map(JsonBytes::to_json).collect::<Vec<_>>(),
        ),
    }
    put_opt(&mut map, "attributes", &instance.attributes);
    map.into()
}

fn roles_to_json(roles: &[String]) -> OrderedJson {
    OrderedJson::List(roles.iter().map(OrderedJson::str).collect())
}

fn new_address_to_json(mock: &NewAddressMock) -> OrderedJson {
    let mut map = OrderedMap::new();
    map.put("creatorAddress", mock.creator_address.to_json());
    map.put("creatorNonce", mock.creator_nonce.to_json());
    map.put("newAddress", mock.new_address.to_json());
    map.into()
}

fn block_info_to_json(info: &BlockInfo) -> OrderedJson {
    let mut map = OrderedMap::new();
    put_opt(&mut map, "blockTimestamp", &info.timestamp);
    put_opt(&mut map, "blockNonce", &info.nonce);
    put_opt(&mut map, "blockRound", &info.round);
    put_opt(&mut map, "blockEpoch", &info.epoch);
    put_opt(&mut map, "blockRandomSeed", &info.random_seed);
    map.into()
}

fn check_accounts_to_json(check: &CheckAccounts) -> OrderedJson {
    let mut map = OrderedMap::new();
    for account in &check.accounts {
        map.put(account.address.original_text(), check_account_to_json(account));
    }
    if check.other_accounts_allowed {
        map.put(MORE_ALLOWED_KEY, OrderedJson::str(""));
    }
    map.into()
}

fn check_account_to_json(account: &CheckAccount) -> OrderedJson {
    let mut map = OrderedMap::new();
    put_comment(&mut map, &account.comment);
    put_check(&mut map, "nonce", &account.nonce);
    put_check(&mut map, "balance", &account.balance);
    match &account.esdt {
        CheckEsdt::Unspecified => {}
        CheckEsdt::Star => map.put("esdt", OrderedJson::str("*")),
        CheckEsdt::Tokens {
            tokens,
            more_allowed,
        } => {
            let mut entries = OrderedMap::new();
            for token in tokens {
                entries.put(token.token_identifier.original_text(), check_esdt_to_json(token));
            }
            if *more_allowed {
                entries.put(MORE_ALLOWED_KEY, OrderedJson::str(""));
            }
            map.put("esdt", entries);
        }
    }
    put_check(&mut map, "username", &account.username);
    match &account.storage {
        CheckStorage::Unspecified => {}
        CheckStorage::Star => map.put("storage", OrderedJson::str("*")),
        CheckStorage::Entries {
            entries,
            more_allowed,
        } => {
            let mut storage = OrderedMap::new();
            for entry in entries {
                if let Some(value) = entry.value.to_json() {
                    storage.put(entry.key.original_text(), value);
                }
            }
            if *more_allowed {
                storage.put(MORE_ALLOWED_KEY, OrderedJson::str(""));
            }
            map.put("storage", storage);
        }
    }
    put_check(&mut map, "code", &account.code);
    put_check(&mut map, "owner", &account.owner);
    put_check(&mut map, "asyncCallData", &account.async_call_data);
    put_check(&mut map, "developerRewards", &account.developer_rewards);
    map.into()
}

fn check_esdt_to_json(token: &CheckEsdtData) -> OrderedJson {
    if token.is_short_form {
        if let Some(json) = token.instances.first().and_then(|i| i.balance.to_json()) {
            return json;
        }
    }
    let mut map = OrderedMap::new();
    if !token.instances.is_empty() {
        let instances: Vec<OrderedJson> =
            token.instances.iter().map(check_esdt_instance_to_json).collect();
        map.put("instances", instances);
    }
    put_check(&mut map, "lastNonce", &token.last_nonce);
    if !token.roles.is_empty() {
        map.put("roles", roles_to_json(&token.roles));
    }
    put_check(&mut map, "frozen", &token.frozen);
    map.into()
}

fn check_esdt_instance_to_json(instance: &CheckEsdtInstance) -> OrderedJson {
    let mut map = OrderedMap::new();
    map.put("nonce", instance.nonce.to_json());
    put_check(&mut map, "balance", &instance.balance);
    put_check(&mut map, "creator", &instance.creator);
    put_check(&mut map, "royalties", &instance.royalties);
    put_check(&mut map, "hash", &instance.hash);
    put_check(&mut map, "uri", &instance.uri);
    put_check(&mut map, "attributes", &instance.attributes);
    map.into()
}

fn tx_step_to_json(map: &mut OrderedMap, step: &TxStep) {
    put_id(map, "txId", Some(step.id.as_str()));
    put_comment(map, &step.comment);
    if step.display_logs {
        map.put("displayLogs", true);
    }
    map.put("tx", tx_to_json(&step.tx));
    if step.tx.kind.is_smart_contract() {
        if let Some(expect) = &step.expect {
            map.put("expect", expect_to_json(expect));
        }
    }
}

fn tx_to_json(tx: &Transaction) -> OrderedJson {
    let kind = tx.kind;
    let mut map = OrderedMap::new();
    if kind.has_sender() {
        map.put("from", tx.from.to_json());
    }
    if kind.has_receiver() {
        map.put("to", tx.to.to_json());
    }
    map.put("value", tx.egld_value.to_json());
    if kind.has_esdt() && !tx.esdt_value.is_empty() {
        let esdt: Vec<OrderedJson> = tx.esdt_value.iter().map(esdt_tx_to_json).collect();
        map.put("esdtValue", esdt);
    }
    if kind.has_function() {
        map.put("function", OrderedJson::str(&tx.function));
    }
    if kind == TxKind::Deploy {
        map.put("contractCode", tx.code.to_json());
    }
    if !matches!(kind, TxKind::Transfer | TxKind::ValidatorReward) {
        let arguments: Vec<OrderedJson> = tx.arguments.iter().map(JsonBytes::to_json).collect();
        map.put("arguments", arguments);
    }
    if kind.has_gas() {
        map.put("gasLimit", tx.gas_limit.to_json());
        map.put("gasPrice", tx.gas_price.to_json());
    }
    map.into()
}

fn esdt_tx_to_json(esdt: &EsdtTxData) -> OrderedJson {
    let mut map = OrderedMap::new();
    map.put("tokenIdentifier", esdt.token_identifier.to_json());
    if esdt.nonce.value != 0 || !esdt.nonce.original.is_empty() {
        map.put("nonce", esdt.nonce.to_json());
    }
    map.put("value", esdt.value.to_json());
    map.into()
}

fn expect_to_json(expect: &TxExpect) -> OrderedJson {
    let mut map = OrderedMap::new();
    if let Some(out) = check_list_to_json(&expect.out) {
        map.put("out", out);
    }
    put_check(&mut map, "status", &expect.status);
    put_check(&mut map, "message", &expect.message);
    match &expect.logs {
        CheckLogs::Unspecified => {}
        CheckLogs::Star => map.put("logs", OrderedJson::str("*")),
        CheckLogs::List {
            entries,
            more_allowed_at_end,
        } => {
            let mut logs: Vec<OrderedJson> = entries.iter().map(log_to_json).collect();
            if *more_allowed_at_end {
                logs.push(OrderedJson::str(MORE_ALLOWED_KEY));
            }
            map.put("logs", logs);
        }
    }
    put_check(&mut map, "gas", &expect.gas);
    put_check(&mut map, "refund", &expect.refund);
    map.into()
}

fn log_to_json(entry: &CheckLogEntry) -> OrderedJson {
    let mut map = OrderedMap::new();
    put_check(&mut map, "address", &entry.address);
    put_check(&mut map, "identifier", &entry.identifier);
    if let Some(topics) = check_list_to_json(&entry.topics) {
        map.put("topics", topics);
    }
    put_check(&mut map, "data", &entry.data);
    map.into()
}
