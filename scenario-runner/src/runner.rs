//! Step engine: drives a scenario against the mock ledger

use crate::checker::Checker;
use crate::config::RunnerConfig;
use crate::convert;
use crate::diagnostics::Diagnostics;
use crate::model::{ExternalStepsStep, Scenario, Step, TxStep};
use crate::parse::ScenarioParser;
use crate::{RunnerError, RunnerResult};
use scenario_core::{DefaultFileResolver, ExprInterpreter, FileResolver};
use scenario_world::{ExecutionHost, GasSchedule, TransactionExecutor, World};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Runs scenarios one step at a time, stopping at the first failure.
///
/// The ledger persists between runs until [`ScenarioRunner::reset`].
pub struct ScenarioRunner {
    world: World,
    executor: TransactionExecutor,
    host: Box<dyn ExecutionHost>,
    parser: ScenarioParser,
    config: RunnerConfig,
    check_gas: bool,
    trace_gas: bool,
}

impl ScenarioRunner {
    pub fn new(config: RunnerConfig, host: Box<dyn ExecutionHost>) -> RunnerResult<Self> {
        let vm_type = config.vm_type_bytes()?;
        let interpreter = ExprInterpreter::new()
            .with_vm_type(vm_type)
            .with_resolver(Arc::new(DefaultFileResolver::new()));
        Ok(Self {
            world: World::new().with_vm_type(vm_type),
            executor: TransactionExecutor::new(GasSchedule::default()),
            host,
            parser: ScenarioParser::new(interpreter),
            config,
            check_gas: true,
            trace_gas: false,
        })
    }

    /// Replace the resolver used for `file:` values and external steps
    pub fn with_resolver(mut self, resolver: Arc<dyn FileResolver>) -> Self {
        let interpreter = self.parser.interpreter().clone().with_resolver(resolver);
        self.parser = ScenarioParser::new(interpreter);
        self
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn parser(&self) -> &ScenarioParser {
        &self.parser
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Drop every account and block setting
    pub fn reset(&mut self) {
        self.world.clear();
    }

    pub fn run_file(&mut self, path: &Path, diagnostics: &mut Diagnostics) -> RunnerResult<()> {
        info!("Running scenario file {}", path.display());
        let scenario = self.parser.parse_scenario_file(path)?;
        let parser = self.parser.for_file(path);
        self.run_with(&scenario, &parser, diagnostics)
    }

    /// Run an already parsed scenario. External step paths resolve
    /// against the runner's resolver as it is.
    pub fn run_scenario(
        &mut self,
        scenario: &Scenario,
        diagnostics: &mut Diagnostics,
    ) -> RunnerResult<()> {
        let parser = self.parser.clone();
        self.run_with(scenario, &parser, diagnostics)
    }

    fn run_with(
        &mut self,
        scenario: &Scenario,
        parser: &ScenarioParser,
        diagnostics: &mut Diagnostics,
    ) -> RunnerResult<()> {
        let schedule = self.config.gas_schedule(scenario.gas_schedule)?;
        self.set_gas_schedule(schedule);
        self.check_gas = scenario.check_gas;
        self.trace_gas = scenario.trace_gas;
        info!(
            name = scenario.name.as_deref().unwrap_or_default(),
            steps = scenario.steps.len(),
            gas_schedule = scenario.gas_schedule.name(),
            "Running scenario"
        );

        for step in &scenario.steps {
            debug!("Step {}", step.label());
            self.run_step(step, parser, diagnostics)?;
        }
        Ok(())
    }

    fn set_gas_schedule(&mut self, schedule: GasSchedule) {
        self.host.set_gas_schedule(&schedule);
        self.executor = TransactionExecutor::new(schedule);
    }

    fn run_step(
        &mut self,
        step: &Step,
        parser: &ScenarioParser,
        diagnostics: &mut Diagnostics,
    ) -> RunnerResult<()> {
        match step {
            Step::ExternalSteps(external) => self.run_external_steps(external, parser, diagnostics),
            Step::SetState(set_state) => {
                let state = convert::set_state(set_state)?;
                self.world.apply_set_state(state)?;
                Ok(())
            }
            Step::CheckState(check_state) => Checker::new(self.check_gas).check_accounts(
                &step.label(),
                &check_state.accounts,
                &self.world,
                diagnostics,
            ),
            Step::DumpState(_) => {
                diagnostics.info(step.label(), self.world.dump());
                Ok(())
            }
            Step::Tx(tx_step) => self.run_tx(tx_step, diagnostics),
        }
    }

    /// The nested file runs with its own gas settings; the outer ones
    /// are restored afterwards
    fn run_external_steps(
        &mut self,
        step: &ExternalStepsStep,
        parser: &ScenarioParser,
        diagnostics: &mut Diagnostics,
    ) -> RunnerResult<()> {
        let path = match parser.interpreter().resolver() {
            Some(resolver) => resolver.resolve_path(&step.path),
            None => PathBuf::from(&step.path),
        };
        let schedule = self.executor.gas_schedule().clone();
        let (check_gas, trace_gas) = (self.check_gas, self.trace_gas);

        let result = self.run_file(&path, diagnostics);

        self.set_gas_schedule(schedule);
        self.check_gas = check_gas;
        self.trace_gas = trace_gas;
        result
    }

    fn run_tx(&mut self, step: &TxStep, diagnostics: &mut Diagnostics) -> RunnerResult<()> {
        let request = convert::tx_request(&step.id, &step.tx)?;
        let result = self
            .executor
            .execute(&mut self.world, self.host.as_mut(), &request)?;
        let output = &result.output;

        if let Some(address) = result.new_address {
            debug!("Tx '{}' deployed contract at {}", step.id, address.to_hex());
        }
        if self.trace_gas && step.tx.kind.is_smart_contract() {
            diagnostics.info(&step.id, format!("gas used: {}", result.gas_used()));
        }
        let checker = Checker::new(self.check_gas);
        if step.display_logs {
            for log in &output.logs {
                diagnostics.info(&step.id, format!("log:\n{}", checker.log_pretty(log)));
            }
        }

        match &step.expect {
            Some(expect) => checker.check_tx_result(&step.id, expect, output, diagnostics),
            None if !output.is_ok() => Err(RunnerError::Execution(format!(
                "tx '{}' failed: retcode={} ({}), message: {}",
                step.id,
                output.return_code.as_u64(),
                output.return_code,
                output.return_message
            ))),
            None => Ok(()),
        }
    }
}
