use super::value::is_star;
use super::{parse_str, FieldContext, FieldError, FieldResult, ScenarioParser};
use crate::model::{CheckLogEntry, CheckLogs, EsdtTxData, Transaction, TxExpect};
use scenario_core::OrderedJson;
use scenario_world::TxKind;

/// Trailing entry of a log list that allows further logs
const MORE_LOGS_MARKER: &str = "+";

fn not_allowed(field: &str, kind: TxKind) -> FieldError {
    FieldError::new(format!(
        "`{field}` not allowed in {} transactions",
        kind.step_name()
    ))
}

impl ScenarioParser {
    pub(crate) fn process_tx(&self, kind: TxKind, obj: &OrderedJson) -> FieldResult<Transaction> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("unmarshalled transaction is not a map"))?;
        let mut tx = Transaction::new(kind);

        for (key, value) in map.iter() {
            match key {
                "from" => {
                    if !kind.has_sender() {
                        return Err(not_allowed(key, kind));
                    }
                    tx.from = self
                        .parse_account_address(parse_str(value)?)
                        .context("invalid transaction sender")?;
                }
                "to" => {
                    let raw = parse_str(value)?;
                    if !kind.has_receiver() {
                        if raw.is_empty() {
                            continue;
                        }
                        return Err(not_allowed(key, kind));
                    }
                    tx.to = self
                        .parse_account_address(raw)
                        .context("invalid transaction receiver")?;
                }
                "function" => {
                    let function = parse_str(value).context("invalid transaction function")?;
                    if !kind.has_function() && !function.is_empty() {
                        return Err(not_allowed(key, kind));
                    }
                    tx.function = function.to_string();
                }
                "value" | "egldValue" => {
                    tx.egld_value = self
                        .process_big_int(value)
                        .context("invalid transaction value")?
                }
                "esdt" | "esdtValue" => {
                    if !kind.has_esdt() {
                        return Err(not_allowed(key, kind));
                    }
                    tx.esdt_value = self
                        .process_tx_esdt_list(value)
                        .context("invalid transaction ESDT value")?;
                }
                "arguments" => {
                    if matches!(kind, TxKind::Transfer | TxKind::ValidatorReward) {
                        return Err(not_allowed(key, kind));
                    }
                    tx.arguments = self
                        .process_value_list(value)
                        .context("invalid transaction arguments")?;
                }
                "contractCode" => {
                    if kind != TxKind::Deploy {
                        return Err(not_allowed(key, kind));
                    }
                    tx.code = self
                        .process_string_as_bytes(value)
                        .context("invalid transaction contract code")?;
                }
                "gasLimit" => {
                    if !kind.has_gas() {
                        return Err(not_allowed(key, kind));
                    }
                    tx.gas_limit = self
                        .process_uint64(value)
                        .context("invalid transaction gas limit")?;
                }
                "gasPrice" => {
                    if !kind.has_gas() {
                        return Err(not_allowed(key, kind));
                    }
                    tx.gas_price = self
                        .process_uint64(value)
                        .context("invalid transaction gas price")?;
                }
                other => {
                    return Err(FieldError::new(format!("unknown field in transaction: {other}")))
                }
            }
        }
        Ok(tx)
    }

    /// A list of token transfers, or a single one written as a map
    fn process_tx_esdt_list(&self, obj: &OrderedJson) -> FieldResult<Vec<EsdtTxData>> {
        match obj {
            OrderedJson::List(items) => items.iter().map(|item| self.process_tx_esdt(item)).collect(),
            _ => Ok(vec![self.process_tx_esdt(obj)?]),
        }
    }

    fn process_tx_esdt(&self, obj: &OrderedJson) -> FieldResult<EsdtTxData> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("ESDT transfer is not a map"))?;
        let mut esdt = EsdtTxData::default();
        for (key, value) in map.iter() {
            match key {
                "tokenIdentifier" => {
                    esdt.token_identifier = self
                        .process_string_as_bytes(value)
                        .context("invalid ESDT token identifier")?
                }
                "nonce" => esdt.nonce = self.process_uint64(value).context("invalid ESDT nonce")?,
                "value" => esdt.value = self.process_big_int(value).context("invalid ESDT value")?,
                other => return Err(FieldError::new(format!("unknown ESDT data field: {other}"))),
            }
        }
        Ok(esdt)
    }

    pub(crate) fn process_tx_expect(&self, obj: &OrderedJson) -> FieldResult<TxExpect> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("unmarshalled expected result is not a map"))?;
        let mut expect = TxExpect::default();
        for (key, value) in map.iter() {
            match key {
                "out" => {
                    expect.out = self
                        .process_check_list(value)
                        .context("invalid expected result out")?
                }
                "status" => {
                    expect.status = self
                        .process_check_big_int(value)
                        .context("invalid expected result status")?
                }
                "message" => {
                    expect.message = self
                        .process_check_bytes(value)
                        .context("invalid expected result message")?
                }
                "logs" => {
                    expect.logs = self
                        .process_check_logs(value)
                        .context("invalid expected result logs")?
                }
                "gas" => {
                    expect.gas = self
                        .process_check_uint64(value)
                        .context("invalid expected result gas")?
                }
                "refund" => {
                    expect.refund = self
                        .process_check_big_int(value)
                        .context("invalid expected result refund")?
                }
                other => {
                    return Err(FieldError::new(format!(
                        "unknown tx expected result field: {other}"
                    )))
                }
            }
        }
        Ok(expect)
    }

    fn process_check_logs(&self, obj: &OrderedJson) -> FieldResult<CheckLogs> {
        if is_star(obj) {
            return Ok(CheckLogs::Star);
        }
        let items = obj
            .as_list()
            .ok_or_else(|| FieldError::new("logs not a list"))?;
        let (items, more_allowed_at_end) = match items.split_last() {
            Some((last, rest)) if last.as_str() == Some(MORE_LOGS_MARKER) => (rest, true),
            _ => (items, false),
        };
        let entries = items
            .iter()
            .map(|item| self.process_check_log_entry(item))
            .collect::<FieldResult<Vec<_>>>()?;
        Ok(CheckLogs::List {
            entries,
            more_allowed_at_end,
        })
    }

    fn process_check_log_entry(&self, obj: &OrderedJson) -> FieldResult<CheckLogEntry> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("unmarshalled log entry is not a map"))?;
        let mut entry = CheckLogEntry::default();
        for (key, value) in map.iter() {
            match key {
                "address" => {
                    entry.address = self
                        .process_check_bytes(value)
                        .context("invalid log address")?
                }
                "identifier" | "endpoint" => {
                    entry.identifier = self
                        .process_check_bytes(value)
                        .context("invalid log identifier")?
                }
                "topics" => {
                    entry.topics = self
                        .process_check_list(value)
                        .context("invalid log topics")?
                }
                "data" => entry.data = self.process_check_bytes(value).context("invalid log data")?,
                other => return Err(FieldError::new(format!("unknown log field: {other}"))),
            }
        }
        Ok(entry)
    }
}
