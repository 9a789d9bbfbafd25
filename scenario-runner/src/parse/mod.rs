//! Scenario JSON to [`Scenario`] model
//!
//! Unknown fields are rejected at every level. Errors name the field path
//! that failed, e.g. `error processing steps: cannot parse tx step
//! transaction: invalid transaction value: ...`.

mod account;
mod transaction;
mod value;

use crate::model::{
    CheckStateStep, DumpStateStep, ExternalStepsStep, Scenario, SetStateStep, Step, TxStep,
    STEP_CHECK_STATE, STEP_DUMP_STATE, STEP_EXTERNAL_STEPS, STEP_SET_STATE,
};
use crate::{RunnerError, RunnerResult};
use scenario_core::{ojson, CoreError, ExprInterpreter, OrderedJson, OrderedMap};
use scenario_world::{GasScheduleKind, TxKind};
use std::fmt;
use std::path::Path;

/// Message describing why a part of the scenario could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldError(String);

impl FieldError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        FieldError(message.into())
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CoreError> for FieldError {
    fn from(err: CoreError) -> Self {
        FieldError(err.to_string())
    }
}

pub(crate) type FieldResult<T> = Result<T, FieldError>;

/// Prefixes an error with the field being read
pub(crate) trait FieldContext<T> {
    fn context(self, what: &str) -> FieldResult<T>;
}

impl<T, E: fmt::Display> FieldContext<T> for Result<T, E> {
    fn context(self, what: &str) -> FieldResult<T> {
        self.map_err(|err| FieldError(format!("{what}: {err}")))
    }
}

/// Reads scenario files; values are evaluated with the given interpreter
#[derive(Debug, Clone, Default)]
pub struct ScenarioParser {
    interpreter: ExprInterpreter,
}

impl ScenarioParser {
    pub fn new(interpreter: ExprInterpreter) -> Self {
        Self { interpreter }
    }

    pub fn interpreter(&self) -> &ExprInterpreter {
        &self.interpreter
    }

    /// Parser whose `file:` references resolve next to `path`
    pub fn for_file(&self, path: &Path) -> Self {
        let interpreter = match self.interpreter.resolver() {
            Some(resolver) => self.interpreter.clone().with_resolver(resolver.with_context(path)),
            None => self.interpreter.clone(),
        };
        Self { interpreter }
    }

    /// Read and parse a scenario file
    pub fn parse_scenario_file(&self, path: &Path) -> RunnerResult<Scenario> {
        let bytes = std::fs::read(path).map_err(|source| RunnerError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.for_file(path)
            .parse_scenario(&bytes)
            .map_err(|err| RunnerError::parse(path.display().to_string(), err.to_string()))
    }

    /// Parse scenario text; `source` names it in errors
    pub fn parse_scenario_str(&self, source: &str, json: &str) -> RunnerResult<Scenario> {
        self.parse_scenario(json.as_bytes())
            .map_err(|err| RunnerError::parse(source, err.to_string()))
    }

    /// Parse one step object, handy for embedding step snippets in tests
    pub fn parse_step_str(&self, json: &str) -> RunnerResult<Step> {
        let obj = ojson::parse(json.as_bytes())?;
        self.process_step(&obj)
            .map_err(|err| RunnerError::parse("<step>", err.to_string()))
    }

    fn parse_scenario(&self, json: &[u8]) -> FieldResult<Scenario> {
        let root = ojson::parse(json)?;
        let map = root
            .as_map()
            .ok_or_else(|| FieldError::new("unmarshalled test top level object is not a map"))?;

        let mut scenario = Scenario::default();
        for (key, value) in map.iter() {
            match key {
                "name" => {
                    scenario.name = Some(parse_str(value).context("bad scenario name")?.to_string())
                }
                "comment" => {
                    scenario.comment =
                        Some(parse_str(value).context("bad scenario comment")?.to_string())
                }
                "checkGas" => {
                    scenario.check_gas = value
                        .as_bool()
                        .ok_or_else(|| FieldError::new("scenario checkGas flag is not boolean"))?
                }
                "traceGas" => {
                    scenario.trace_gas = value
                        .as_bool()
                        .ok_or_else(|| FieldError::new("scenario traceGas flag is not boolean"))?
                }
                "gasSchedule" => {
                    scenario.gas_schedule =
                        parse_gas_schedule(value).context("bad scenario gasSchedule")?
                }
                "steps" => {
                    scenario.steps = self.process_step_list(value).context("error processing steps")?
                }
                other => return Err(FieldError::new(format!("unknown scenario field: {other}"))),
            }
        }
        Ok(scenario)
    }

    fn process_step_list(&self, obj: &OrderedJson) -> FieldResult<Vec<Step>> {
        let items = obj
            .as_list()
            .ok_or_else(|| FieldError::new("steps not a JSON list"))?;
        items.iter().map(|item| self.process_step(item)).collect()
    }

    fn process_step(&self, obj: &OrderedJson) -> FieldResult<Step> {
        let map = obj
            .as_map()
            .ok_or_else(|| FieldError::new("unmarshalled step object is not a map"))?;
        let step_type = match map.get("step") {
            Some(value) => parse_str(value).context("step type not a string")?,
            None => return Err(FieldError::new("no step type field provided")),
        };

        match step_type {
            STEP_EXTERNAL_STEPS => self.process_external_steps(map).map(Step::ExternalSteps),
            STEP_SET_STATE => self.process_set_state(map).map(Step::SetState),
            STEP_CHECK_STATE => self.process_check_state(map).map(Step::CheckState),
            STEP_DUMP_STATE => {
                let mut step = DumpStateStep::default();
                for (key, value) in map.iter() {
                    match key {
                        "step" => {}
                        "comment" => step.comment = Some(parse_comment(value)?),
                        other => {
                            return Err(FieldError::new(format!(
                                "invalid dump state field: {other}"
                            )))
                        }
                    }
                }
                Ok(Step::DumpState(step))
            }
            other => match TxKind::from_step_name(other) {
                Ok(kind) => self.process_tx_step(kind, map).map(Step::Tx),
                Err(_) => Err(FieldError::new(format!("unknown step type: {other}"))),
            },
        }
    }

    fn process_external_steps(&self, map: &OrderedMap) -> FieldResult<ExternalStepsStep> {
        let mut step = ExternalStepsStep::default();
        for (key, value) in map.iter() {
            match key {
                "step" => {}
                "comment" => step.comment = Some(parse_comment(value)?),
                "path" => step.path = parse_str(value).context("bad externalSteps path")?.to_string(),
                other => {
                    return Err(FieldError::new(format!("invalid externalSteps field: {other}")))
                }
            }
        }
        Ok(step)
    }

    fn process_set_state(&self, map: &OrderedMap) -> FieldResult<SetStateStep> {
        let mut step = SetStateStep::default();
        for (key, value) in map.iter() {
            match key {
                "step" => {}
                "id" => step.id = Some(parse_str(value).context("bad set state step id")?.to_string()),
                "comment" => step.comment = Some(parse_comment(value)?),
                "accounts" => {
                    step.accounts = self
                        .process_account_map(value)
                        .context("cannot parse set state step")?
                }
                "newAddresses" => {
                    step.new_address_mocks = self
                        .process_new_address_mocks(value)
                        .context("error parsing new addresses")?
                }
                "previousBlockInfo" => {
                    step.previous_block_info = Some(
                        self.process_block_info(value)
                            .context("error parsing previousBlockInfo")?,
                    )
                }
                "currentBlockInfo" => {
                    step.current_block_info = Some(
                        self.process_block_info(value)
                            .context("error parsing currentBlockInfo")?,
                    )
                }
                "blockHashes" => {
                    step.block_hashes =
                        Some(self.process_value_list(value).context("error parsing block hashes")?)
                }
                other => return Err(FieldError::new(format!("invalid set state field: {other}"))),
            }
        }
        Ok(step)
    }

    fn process_check_state(&self, map: &OrderedMap) -> FieldResult<CheckStateStep> {
        let mut step = CheckStateStep::default();
        for (key, value) in map.iter() {
            match key {
                "step" => {}
                "id" => {
                    step.id = Some(parse_str(value).context("bad check state step id")?.to_string())
                }
                "comment" => step.comment = Some(parse_comment(value)?),
                "accounts" => {
                    step.accounts = self
                        .process_check_account_map(value)
                        .context("cannot parse check state step")?
                }
                other => {
                    return Err(FieldError::new(format!("invalid check state field: {other}")))
                }
            }
        }
        Ok(step)
    }

    fn process_tx_step(&self, kind: TxKind, map: &OrderedMap) -> FieldResult<TxStep> {
        let mut id = String::new();
        let mut comment = None;
        let mut display_logs = false;
        let mut tx = None;
        let mut expect = None;

        for (key, value) in map.iter() {
            match key {
                "step" => {}
                "id" | "txId" => id = parse_str(value).context("bad tx step id")?.to_string(),
                "comment" => comment = Some(parse_comment(value)?),
                "displayLogs" => {
                    display_logs = value
                        .as_bool()
                        .ok_or_else(|| FieldError::new("bad tx step displayLogs: not a bool value"))?
                }
                "tx" => {
                    tx = Some(
                        self.process_tx(kind, value)
                            .context("cannot parse tx step transaction")?,
                    )
                }
                "expect" => {
                    if !kind.is_smart_contract() {
                        return Err(FieldError::new(format!(
                            "no expected result allowed for step of type {}",
                            kind.step_name()
                        )));
                    }
                    expect = Some(
                        self.process_tx_expect(value)
                            .context("cannot parse tx expected result")?,
                    );
                }
                other => return Err(FieldError::new(format!("invalid tx step field: {other}"))),
            }
        }

        let tx = tx.ok_or_else(|| {
            FieldError::new(format!("{} step has no tx field", kind.step_name()))
        })?;
        Ok(TxStep {
            id,
            comment,
            display_logs,
            tx,
            expect,
        })
    }
}

pub(crate) fn parse_str(obj: &OrderedJson) -> FieldResult<&str> {
    obj.as_str().ok_or_else(|| FieldError::new("not a string value"))
}

fn parse_comment(obj: &OrderedJson) -> FieldResult<String> {
    Ok(parse_str(obj).context("bad step comment")?.to_string())
}

fn parse_gas_schedule(obj: &OrderedJson) -> FieldResult<GasScheduleKind> {
    let name = parse_str(obj).context("gasSchedule type not a string")?;
    GasScheduleKind::from_name(name)
        .ok_or_else(|| FieldError::new(format!("invalid gasSchedule: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckStorage, CheckValueList};
    use num_bigint::BigUint;

    fn parser() -> ScenarioParser {
        ScenarioParser::default()
    }

    #[test]
    fn test_parse_minimal_scenario() {
        let scenario = parser()
            .parse_scenario_str(
                "t",
                r#"{
                    "name": "transfer",
                    "gasSchedule": "dummy",
                    "steps": [
                        {
                            "step": "setState",
                            "accounts": {
                                "address:a": { "nonce": "0", "balance": "48" }
                            }
                        },
                        {
                            "step": "transfer",
                            "id": "1",
                            "tx": { "from": "address:a", "to": "address:b", "value": "10" }
                        },
                        { "step": "dumpState" }
                    ]
                }"#,
            )
            .unwrap();

        assert_eq!(scenario.name.as_deref(), Some("transfer"));
        assert!(scenario.check_gas);
        assert!(!scenario.trace_gas);
        assert_eq!(scenario.gas_schedule, GasScheduleKind::Dummy);
        assert_eq!(scenario.steps.len(), 3);

        let Step::SetState(set_state) = &scenario.steps[0] else {
            panic!("expected setState");
        };
        let account = &set_state.accounts[0];
        assert_eq!(&account.address.value[..1], b"a");
        assert_eq!(account.address.value.len(), 32);
        assert_eq!(account.balance.as_ref().unwrap().value, BigUint::from(48u32));
        assert_eq!(account.balance.as_ref().unwrap().original, "48");

        let Step::Tx(tx_step) = &scenario.steps[1] else {
            panic!("expected transfer");
        };
        assert_eq!(tx_step.id, "1");
        assert_eq!(tx_step.tx.kind, TxKind::Transfer);
        assert_eq!(tx_step.tx.egld_value.value, BigUint::from(10u32));
        assert_eq!(scenario.steps[2].type_name(), "dumpState");
    }

    #[test]
    fn test_unknown_fields_are_errors() {
        let err = parser()
            .parse_scenario_str("s.json", r#"{ "nme": "x" }"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "error parsing s.json: unknown scenario field: nme");

        let err = parser()
            .parse_step_str(r#"{ "step": "checkState", "accountz": {} }"#)
            .unwrap_err();
        assert!(err.to_string().contains("invalid check state field: accountz"));

        let err = parser()
            .parse_step_str(r#"{ "step": "nope" }"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown step type: nope"));
    }

    #[test]
    fn test_expect_only_on_contract_steps() {
        let err = parser()
            .parse_step_str(
                r#"{
                    "step": "transfer",
                    "tx": { "from": "address:a", "to": "address:b", "value": "1" },
                    "expect": { "status": "0" }
                }"#,
            )
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("no expected result allowed for step of type transfer"));
    }

    #[test]
    fn test_tx_id_alias_and_expect() {
        let step = parser()
            .parse_step_str(
                r#"{
                    "step": "scCall",
                    "txId": "call-1",
                    "displayLogs": true,
                    "tx": {
                        "from": "address:a",
                        "to": "sc:adder",
                        "function": "add",
                        "arguments": ["5", ["u8:1", "u8:2"]],
                        "gasLimit": "1,000,000",
                        "gasPrice": "0"
                    },
                    "expect": {
                        "out": ["*", "0x05"],
                        "status": "",
                        "logs": "*",
                        "gas": "*",
                        "refund": "*"
                    }
                }"#,
            )
            .unwrap();
        let Step::Tx(step) = step else {
            panic!("expected scCall");
        };
        assert_eq!(step.id, "call-1");
        assert!(step.display_logs);
        assert_eq!(step.tx.function, "add");
        assert_eq!(step.tx.arguments[1].value, vec![1, 2]);
        assert_eq!(step.tx.gas_limit.value, 1_000_000);

        let expect = step.expect.unwrap();
        let CheckValueList::Values(out) = &expect.out else {
            panic!("expected out values");
        };
        assert!(out[0].is_star());
        assert_eq!(out[1].exact().unwrap().value, vec![5]);
        assert_eq!(expect.status.exact().unwrap().value, BigUint::default());
        assert!(expect.message.is_unspecified());
        assert!(expect.gas.is_star());
    }

    #[test]
    fn test_field_admission_per_kind() {
        let err = parser()
            .parse_step_str(
                r#"{ "step": "scQuery", "tx": { "from": "address:a", "to": "sc:x", "function": "f" } }"#,
            )
            .unwrap_err();
        assert!(err.to_string().contains("`from` not allowed in scQuery transactions"));

        let err = parser()
            .parse_step_str(
                r#"{ "step": "transfer", "tx": { "from": "address:a", "to": "address:b", "function": "f" } }"#,
            )
            .unwrap_err();
        assert!(err.to_string().contains("`function` not allowed in transfer transactions"));

        let err = parser()
            .parse_step_str(
                r#"{ "step": "scDeploy", "tx": { "from": "address:a", "to": "address:b" } }"#,
            )
            .unwrap_err();
        assert!(err.to_string().contains("`to` not allowed in scDeploy transactions"));

        let err = parser()
            .parse_step_str(r#"{ "step": "validatorReward", "tx": { "to": "address:b", "gasLimit": "5" } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("`gasLimit` not allowed in validatorReward transactions"));
    }

    #[test]
    fn test_check_state_storage_defaults() {
        let step = parser()
            .parse_step_str(
                r#"{
                    "step": "checkState",
                    "accounts": {
                        "address:a": { "balance": "*" },
                        "address:b": { "storage": "*" },
                        "address:c": { "storage": { "str:x": "5", "+": "" } },
                        "+": ""
                    }
                }"#,
            )
            .unwrap();
        let Step::CheckState(step) = step else {
            panic!("expected checkState");
        };
        assert!(step.accounts.other_accounts_allowed);
        assert_eq!(step.accounts.accounts.len(), 3);
        assert!(step.accounts.accounts[0].balance.is_star());
        assert!(step.accounts.accounts[0].nonce.is_unspecified());
        assert_eq!(step.accounts.accounts[0].storage, CheckStorage::Unspecified);
        assert_eq!(step.accounts.accounts[1].storage, CheckStorage::Star);
        match &step.accounts.accounts[2].storage {
            CheckStorage::Entries {
                entries,
                more_allowed,
            } => {
                assert!(*more_allowed);
                assert_eq!(entries[0].key.value, b"x");
                assert_eq!(entries[0].value.exact().unwrap().value, vec![5]);
            }
            other => panic!("unexpected storage check {other:?}"),
        }
    }

    #[test]
    fn test_bad_gas_schedule() {
        let err = parser()
            .parse_scenario_str("g", r#"{ "gasSchedule": "v9" }"#)
            .unwrap_err();
        assert!(err.to_string().contains("invalid gasSchedule: v9"));
    }

    #[test]
    fn test_parse_file_resolves_code_next_to_it() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("code.wasm"), b"mock-code").unwrap();
        let path = dir.path().join("deploy.scen.json");
        std::fs::write(
            &path,
            r#"{
                "steps": [
                    {
                        "step": "scDeploy",
                        "tx": {
                            "from": "address:owner",
                            "contractCode": "file:code.wasm",
                            "arguments": [],
                            "gasLimit": "100",
                            "gasPrice": "0"
                        }
                    }
                ]
            }"#,
        )
        .unwrap();

        let resolver = std::sync::Arc::new(scenario_core::DefaultFileResolver::new());
        let parser = ScenarioParser::new(ExprInterpreter::new().with_resolver(resolver));
        let scenario = parser.parse_scenario_file(&path).unwrap();
        let Step::Tx(step) = &scenario.steps[0] else {
            panic!("expected scDeploy");
        };
        assert_eq!(step.tx.code.value, b"mock-code");
        assert_eq!(step.tx.code.original_text(), "file:code.wasm");
    }
}
