//! Comparison of expectations against transaction outcomes and the ledger
//!
//! Transaction results fail on the first mismatch. Account checks collect
//! every difference of a `checkState` step into a single failure.

use crate::diagnostics::Diagnostics;
use crate::model::{
    CheckAccount, CheckAccounts, CheckEsdt, CheckEsdtData, CheckEsdtInstance, CheckLogEntry,
    CheckLogs, CheckStorage, CheckValue, Expected, TxExpect,
};
use crate::{RunnerError, RunnerResult};
use num_bigint::BigUint;
use num_traits::Zero;
use scenario_core::{Address, ExprHint, ExprReconstructor};
use scenario_world::{Account, LogEntry, TokenInstance, TokenRecord, VmOutput, World};
use std::collections::BTreeMap;

/// Compares expected values with what execution produced
#[derive(Debug, Clone, Copy)]
pub struct Checker {
    er: ExprReconstructor,
    check_gas: bool,
}

impl Checker {
    /// `check_gas` is the scenario's `checkGas` flag
    pub fn new(check_gas: bool) -> Self {
        Self {
            er: ExprReconstructor::new(),
            check_gas,
        }
    }

    /// Check a transaction outcome. A mismatch is pushed to `diagnostics`
    /// and returned as a check failure.
    pub fn check_tx_result(
        &self,
        tx_id: &str,
        expect: &TxExpect,
        output: &VmOutput,
        diagnostics: &mut Diagnostics,
    ) -> RunnerResult<()> {
        match self.tx_result_error(tx_id, expect, output) {
            Some(message) => {
                diagnostics.error(tx_id, &message);
                Err(RunnerError::CheckFailure(message))
            }
            None => Ok(()),
        }
    }

    fn tx_result_error(&self, tx_id: &str, expect: &TxExpect, output: &VmOutput) -> Option<String> {
        let code = output.return_code.as_u64();
        let status_ok = match &expect.status {
            CheckValue::Unspecified => code == 0,
            status => status.check(&BigUint::from(code)),
        };
        if !status_ok {
            let want = match &expect.status {
                CheckValue::Unspecified => "0".to_string(),
                status => status.original_text(),
            };
            return Some(format!(
                "result code mismatch. Tx '{}'. Want: {}. Have: {} ({}). Message: {}",
                tx_id, want, code, output.return_code, output.return_message
            ));
        }

        if !expect
            .message
            .check_if_specified(output.return_message.as_bytes())
        {
            return Some(format!(
                "result message mismatch. Tx '{}'. Want: {}. Have: {}",
                tx_id,
                expect.message.original_text(),
                output.return_message
            ));
        }

        if !expect.out.is_unspecified() && !expect.out.check_list(&output.return_data) {
            return Some(format!(
                "result mismatch. Tx '{}'. Want: {}. Have: {}",
                tx_id,
                expect.out.pretty(),
                self.er.reconstruct_list(&output.return_data, ExprHint::NoHint)
            ));
        }

        if !expect.refund.check_if_specified(&output.gas_refund) {
            return Some(format!(
                "result gas refund mismatch. Tx '{}'. Want: {}. Have: 0x{:x}",
                tx_id,
                expect.refund.original_text(),
                output.gas_refund
            ));
        }

        if self.check_gas && !expect.gas.check_if_specified(&output.gas_remaining) {
            return Some(format!(
                "result gas mismatch. Tx '{}'. Want: {}. Got: {} (0x{:x})",
                tx_id,
                expect.gas.original_text(),
                output.gas_remaining,
                output.gas_remaining
            ));
        }

        self.logs_error(tx_id, &expect.logs, &output.logs)
    }

    fn logs_error(&self, tx_id: &str, expected: &CheckLogs, actual: &[LogEntry]) -> Option<String> {
        let (entries, more_allowed_at_end) = match expected {
            CheckLogs::Unspecified | CheckLogs::Star => return None,
            CheckLogs::List {
                entries,
                more_allowed_at_end,
            } => (entries, *more_allowed_at_end),
        };

        if actual.len() < entries.len() {
            return Some(format!(
                "too few logs. Tx '{}'. Want:{}. Got:{}",
                tx_id,
                entries.len(),
                actual.len()
            ));
        }

        for (index, log) in actual.iter().enumerate() {
            let Some(expected) = entries.get(index) else {
                if more_allowed_at_end {
                    break;
                }
                return Some(format!(
                    "unexpected log. Tx '{}'. Log index: {}. Log:\n{}",
                    tx_id,
                    index,
                    self.log_pretty(log)
                ));
            };
            if let Some(message) = self.log_entry_error(tx_id, index, expected, log) {
                return Some(message);
            }
        }
        None
    }

    fn log_entry_error(
        &self,
        tx_id: &str,
        index: usize,
        expected: &CheckLogEntry,
        log: &LogEntry,
    ) -> Option<String> {
        let fields: [(&str, &CheckValue<_>, &[u8], ExprHint); 3] = [
            ("address", &expected.address, log.address.as_bytes(), ExprHint::Address),
            ("identifier", &expected.identifier, log.identifier.as_slice(), ExprHint::Str),
            ("data", &expected.data, log.data.as_slice(), ExprHint::NoHint),
        ];
        for (name, want, have, hint) in fields {
            if !want.check_if_specified(have) {
                return Some(format!(
                    "bad log {}. Tx '{}'. Log index: {}. Want:\n{}\nGot:\n{}",
                    name,
                    tx_id,
                    index,
                    want.original_text(),
                    self.er.reconstruct(have, hint)
                ));
            }
        }
        if !expected.topics.is_unspecified() && !expected.topics.check_list(&log.topics) {
            return Some(format!(
                "bad log topics. Tx '{}'. Log index: {}. Want: {}. Have: {}",
                tx_id,
                index,
                expected.topics.pretty(),
                self.er.reconstruct_list(&log.topics, ExprHint::NoHint)
            ));
        }
        None
    }

    pub(crate) fn log_pretty(&self, log: &LogEntry) -> String {
        format!(
            "  address: {}\n  identifier: {}\n  topics: {}\n  data: {}",
            self.er.reconstruct(log.address.as_bytes(), ExprHint::Address),
            self.er.reconstruct(&log.identifier, ExprHint::Str),
            self.er.reconstruct_list(&log.topics, ExprHint::NoHint),
            self.er.reconstruct(&log.data, ExprHint::NoHint)
        )
    }

    /// Check the ledger against a `checkState` step. All differences are
    /// reported together.
    pub fn check_accounts(
        &self,
        step: &str,
        expected: &CheckAccounts,
        world: &World,
        diagnostics: &mut Diagnostics,
    ) -> RunnerResult<()> {
        let errors = self.account_errors(expected, world)?;
        if errors.is_empty() {
            return Ok(());
        }
        for error in &errors {
            diagnostics.error(step, error);
        }
        Err(RunnerError::CheckFailure(errors.join("\n")))
    }

    fn account_errors(&self, expected: &CheckAccounts, world: &World) -> RunnerResult<Vec<String>> {
        let mut errors = Vec::new();

        if !expected.other_accounts_allowed {
            for account in world.accounts() {
                if expected.find(account.address.as_bytes()).is_none() {
                    errors.push(format!(
                        "unexpected account address: {}",
                        self.er.reconstruct(account.address.as_bytes(), ExprHint::Address)
                    ));
                }
            }
        }

        for check in &expected.accounts {
            let address = Address::from_slice(&check.address.value)?;
            let name = check.address.original_text();
            match world.account(&address) {
                Some(account) => errors.extend(self.account_mismatches(&name, check, account)?),
                None => errors.push(format!(
                    "account {name} expected but not found after running test"
                )),
            }
        }
        Ok(errors)
    }

    fn account_mismatches(
        &self,
        name: &str,
        check: &CheckAccount,
        account: &Account,
    ) -> RunnerResult<Vec<String>> {
        let mut errors = Vec::new();

        if !check.nonce.check_if_specified(&account.nonce) {
            errors.push(format!(
                "bad account nonce. Account: {}. Want: \"{}\". Have: {}",
                name,
                check.nonce.original_text(),
                account.nonce
            ));
        }
        if !check.balance.check_if_specified(&account.balance) {
            errors.push(format!(
                "bad account balance. Account: {}. Want: \"{}\". Have: \"{}\"",
                name,
                check.balance.original_text(),
                account.balance
            ));
        }
        if !check.username.check_if_specified(&account.username) {
            errors.push(format!(
                "bad account username. Account: {}. Want: {}. Have: \"{}\"",
                name,
                check.username.original_text(),
                String::from_utf8_lossy(&account.username)
            ));
        }
        if !check.code.check_if_specified(&account.code) {
            errors.push(format!(
                "bad account code. Account: {}. Want: [{}]. Have: [{}]",
                name,
                check.code.original_text(),
                self.er.reconstruct(&account.code, ExprHint::Code)
            ));
        }
        if !check.owner.check_if_specified(&account.owner) {
            errors.push(format!(
                "bad account owner. Account: {}. Want: {}. Have: {}",
                name,
                check.owner.original_text(),
                self.er.reconstruct(&account.owner, ExprHint::Address)
            ));
        }
        if !check
            .async_call_data
            .check_if_specified(account.async_call_data.as_bytes())
        {
            errors.push(format!(
                "bad async call data. Account: {}. Want: [{}]. Have: [{}]",
                name,
                check.async_call_data.original_text(),
                account.async_call_data
            ));
        }
        if !check
            .developer_rewards
            .check_if_specified(&account.developer_rewards)
        {
            errors.push(format!(
                "bad account developer rewards. Account: {}. Want: \"{}\". Have: \"{}\"",
                name,
                check.developer_rewards.original_text(),
                account.developer_rewards
            ));
        }

        if let Some(error) = self.storage_error(name, &check.storage, account) {
            errors.push(error);
        }

        let token_errors = self.esdt_errors(name, &check.esdt, account)?;
        if !token_errors.is_empty() {
            errors.push(format!(
                "mismatch for account {}: {}",
                name,
                token_errors.join("\n")
            ));
        }
        Ok(errors)
    }

    fn storage_error(&self, name: &str, expected: &CheckStorage, account: &Account) -> Option<String> {
        let (entries, more_allowed) = match expected {
            CheckStorage::Unspecified | CheckStorage::Star => return None,
            CheckStorage::Entries {
                entries,
                more_allowed,
            } => (entries, *more_allowed),
        };

        let mut keys: Vec<&[u8]> = entries.iter().map(|e| e.key.value.as_slice()).collect();
        for (key, _) in account.user_storage() {
            if !keys.contains(&key.as_slice()) {
                keys.push(key);
            }
        }

        let mut message = String::new();
        for key in keys {
            let have = account.storage_value(key);
            let ok = match entries.iter().find(|e| e.key.value == key) {
                Some(entry) => match &entry.value {
                    CheckValue::Unspecified => have.is_empty(),
                    value => value.check(have),
                },
                None => more_allowed || have.is_empty(),
            };
            if !ok {
                let want = entries
                    .iter()
                    .find(|e| e.key.value == key)
                    .map(|e| e.value.original_text())
                    .unwrap_or_default();
                message.push_str(&format!(
                    "\n  for key {}: Want: {}. Have: {}",
                    self.er.reconstruct(key, ExprHint::NoHint),
                    want,
                    self.er.reconstruct(have, ExprHint::NoHint)
                ));
            }
        }

        if message.is_empty() {
            None
        } else {
            Some(format!("wrong account storage for account \"{name}\":{message}"))
        }
    }

    fn esdt_errors(&self, name: &str, expected: &CheckEsdt, account: &Account) -> RunnerResult<Vec<String>> {
        let (tokens, more_allowed) = match expected {
            CheckEsdt::Star => return Ok(Vec::new()),
            CheckEsdt::Unspecified => (&[][..], false),
            CheckEsdt::Tokens {
                tokens,
                more_allowed,
            } => (tokens.as_slice(), *more_allowed),
        };
        let actual: BTreeMap<Vec<u8>, TokenRecord> = account.token_records()?;

        let mut identifiers: Vec<&[u8]> = tokens
            .iter()
            .map(|t| t.token_identifier.value.as_slice())
            .collect();
        for identifier in actual.keys() {
            if !identifiers.contains(&identifier.as_slice()) {
                identifiers.push(identifier);
            }
        }

        let mut errors = Vec::new();
        for identifier in identifiers {
            let expected_token = tokens
                .iter()
                .find(|t| t.token_identifier.value == identifier);
            if expected_token.is_none() && more_allowed {
                continue;
            }
            let context = TokenContext {
                account: name,
                token: String::from_utf8_lossy(identifier).into_owned(),
            };
            self.token_errors(&context, expected_token, actual.get(identifier), &mut errors);
        }
        Ok(errors)
    }

    fn token_errors(
        &self,
        context: &TokenContext<'_>,
        expected: Option<&CheckEsdtData>,
        actual: Option<&TokenRecord>,
        errors: &mut Vec<String>,
    ) {
        let default_expected = CheckEsdtData::default();
        let default_actual = TokenRecord::default();
        let expected = expected.unwrap_or(&default_expected);
        let actual = actual.unwrap_or(&default_actual);

        let mut nonces: Vec<u64> = expected.instances.iter().map(|i| i.nonce.value).collect();
        for instance in &actual.instances {
            if !nonces.contains(&instance.nonce) {
                nonces.push(instance.nonce);
            }
        }

        let default_instance = TokenInstance::default();
        for nonce in nonces {
            let default_check = CheckEsdtInstance::default();
            let want = expected
                .instances
                .iter()
                .find(|i| i.nonce.value == nonce)
                .unwrap_or(&default_check);
            let have = actual.instance(nonce).unwrap_or(&default_instance);
            self.instance_errors(context, nonce, want, have, errors);
        }

        let last_nonce_ok = match &expected.last_nonce {
            CheckValue::Unspecified => actual.last_nonce == 0,
            value => value.check(&actual.last_nonce),
        };
        if !last_nonce_ok {
            errors.push(format!(
                "bad account ESDT last nonce. Account: {}. Token: {}. Want: \"{}\". Have: {}",
                context.account,
                context.token,
                text_or_zero(&expected.last_nonce),
                actual.last_nonce
            ));
        }

        let frozen = u64::from(actual.instances.iter().any(|i| i.frozen));
        if !expected.frozen.check_if_specified(&frozen) {
            errors.push(format!(
                "bad ESDT frozen flag. Account: {}. Token: {}. Want: {}. Have: {}",
                context.account,
                context.token,
                expected.frozen.original_text(),
                frozen
            ));
        }

        for role in &actual.roles {
            if !expected.roles.iter().any(|r| r.as_bytes() == role.as_slice()) {
                errors.push(format!(
                    "unexpected ESDT role. Account: {}. Token: {}. Role: {}",
                    context.account,
                    context.token,
                    String::from_utf8_lossy(role)
                ));
            }
        }
        for role in &expected.roles {
            if !actual.roles.iter().any(|r| r.as_slice() == role.as_bytes()) {
                errors.push(format!(
                    "missing ESDT role. Account: {}. Token: {}. Role: {}",
                    context.account, context.token, role
                ));
            }
        }
    }

    fn instance_errors(
        &self,
        context: &TokenContext<'_>,
        nonce: u64,
        want: &CheckEsdtInstance,
        have: &TokenInstance,
        errors: &mut Vec<String>,
    ) {
        let balance_ok = match &want.balance {
            CheckValue::Unspecified => have.balance.is_zero(),
            balance => balance.check(&have.balance),
        };
        if !balance_ok {
            errors.push(format!(
                "bad ESDT balance. Account: {}. Token: {}. Nonce: {}. Want: {}. Have: {}",
                context.account,
                context.token,
                nonce,
                text_or_zero(&want.balance),
                have.balance
            ));
        }

        // only the first stored URI is compared, and none means no check
        let byte_fields: [(&str, &CheckValue<_>, Option<&[u8]>, ExprHint); 4] = [
            ("Creator", &want.creator, Some(have.creator.as_slice()), ExprHint::Address),
            ("Hash", &want.hash, Some(have.hash.as_slice()), ExprHint::NoHint),
            ("Uri", &want.uri, have.uris.first().map(Vec::as_slice), ExprHint::NoHint),
            ("attributes", &want.attributes, Some(have.attributes.as_slice()), ExprHint::NoHint),
        ];
        for (field, value, actual, hint) in byte_fields {
            let Some(actual) = actual else {
                continue;
            };
            if !value.check_if_specified(actual) {
                errors.push(format!(
                    "bad ESDT NFT {}. Account: {}. Token: {}. Nonce: {}. Want: {}. Have: {}",
                    field,
                    context.account,
                    context.token,
                    nonce,
                    value.original_text(),
                    self.er.reconstruct(actual, hint)
                ));
            }
        }

        let royalties = u64::from(have.royalties);
        if !want.royalties.check_if_specified(&royalties) {
            errors.push(format!(
                "bad ESDT NFT Royalties. Account: {}. Token: {}. Nonce: {}. Want: {}. Have: {}",
                context.account,
                context.token,
                nonce,
                want.royalties.original_text(),
                royalties
            ));
        }
    }
}

fn text_or_zero<T: Expected>(value: &CheckValue<T>) -> String {
    match value {
        CheckValue::Unspecified => "0".to_string(),
        value => value.original_text(),
    }
}

struct TokenContext<'a> {
    account: &'a str,
    token: String,
}
