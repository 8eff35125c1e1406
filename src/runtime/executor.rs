// src/runtime/executor.rs
// ============================================================================
// Module: Agent Engine Run Executor
// Description: Drives a run through the state machine by consulting a planner.
// Purpose: Implement the specification's §4.7/§4.7a driver loop and guards.
// Dependencies: crate::runtime::{run_store, ledger, tool_executor, policy}
// ============================================================================

//! ## Overview
//! The run executor is the specification's largest component by weight: for
//! a run in `Running` status it repeatedly asks a [`crate::interfaces::Planner`]
//! for the next [`Decision`], records it, dispatches it, and either loops,
//! transitions, or terminates. It is the only component that mutates a run's
//! `current_state`/`status`, and the only component that enforces the step
//! budget and no-progress guard described below.
//!
//! ## Progress guarantees
//! Two independent guards bound an otherwise unbounded loop under a buggy
//! planner: the `tool_calls` budget (enforced inside [`tool_executor`], which
//! is treated here as an unrecoverable guard — a single exhaustion fails the
//! run immediately) and a step budget counting total decisions. A third,
//! softer guard detects *lack of progress*: if the planner re-issues an
//! identical `CallTool` decision that just failed for a policy reason other
//! than budget exhaustion, the run is failed rather than looped forever.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::core::event::EventPayload;
use crate::core::identifiers::RunId;
use crate::core::state::Decision;
use crate::core::state::Run;
use crate::core::state::RunStatus;
use crate::core::state::State;
use crate::core::time::Clock;
use crate::interfaces::Approver;
use crate::interfaces::CancelToken;
use crate::interfaces::Planner;
use crate::interfaces::PlannerContext;
use crate::runtime::ledger::Ledger;
use crate::runtime::ledger::LedgerError;
use crate::runtime::policy::Policy;
use crate::runtime::policy::PolicyError;
use crate::runtime::run_store::RunStore;
use crate::runtime::run_store::RunStoreError;
use crate::runtime::tool_executor::ToolExecutor;
use crate::runtime::tool_executor::ToolExecutorError;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default maximum number of decisions a single run may take before the
/// executor fails it as a progress-guard violation.
pub const DEFAULT_STEP_BUDGET: u64 = 1_000;

/// Default size of the recent-ledger window offered to the planner.
pub const DEFAULT_LEDGER_WINDOW: usize = 50;

/// Engine-instance-wide options for the run executor.
///
/// Mirrors the teacher's `ControlPlaneConfig` shape: a small, `Copy`,
/// `Default`-able struct of the knobs named by the specification's §6
/// configuration surface that are not already owned by [`Policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Maximum total decisions a run may take before the progress guard
    /// fails it, independent of any configured `tool_calls` budget.
    pub step_budget: u64,
    /// Number of most recent ledger events offered to the planner per step.
    pub ledger_window: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { step_budget: DEFAULT_STEP_BUDGET, ledger_window: DEFAULT_LEDGER_WINDOW }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by [`RunExecutor::drive`].
///
/// These are reserved for failures the executor cannot attribute to the run
/// itself — an unknown run, or an infrastructure-level store/ledger error.
/// Every run-level failure (illegal transition, exhausted budget, planner
/// error, no progress, cancellation) is instead recorded on the run and
/// returned as an `Ok(Run)` with `status = Failed` or `Cancelled`.
#[derive(Debug, Error)]
pub enum RunExecutorError {
    /// The run store reported an error (including "run not found").
    #[error(transparent)]
    RunStore(#[from] RunStoreError),
    /// The ledger reported an error while appending or reading events.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ============================================================================
// SECTION: Run Executor
// ============================================================================

/// Drives a single run through the state machine, one decision at a time.
pub struct RunExecutor {
    run_store: Arc<RunStore>,
    ledger: Arc<Ledger>,
    tool_executor: Arc<ToolExecutor>,
    clock: Arc<dyn Clock>,
    config: ExecutorConfig,
}

impl RunExecutor {
    /// Builds a run executor over the given run store, ledger, and tool
    /// executor.
    #[must_use]
    pub fn new(
        run_store: Arc<RunStore>,
        ledger: Arc<Ledger>,
        tool_executor: Arc<ToolExecutor>,
        clock: Arc<dyn Clock>,
        config: ExecutorConfig,
    ) -> Self {
        Self { run_store, ledger, tool_executor, clock, config }
    }

    /// Creates a new run in `Intake`, `Running` status, recording
    /// `RunStarted`.
    ///
    /// # Errors
    ///
    /// Returns [`RunExecutorError::RunStore`] if `run_id` already exists, or
    /// [`RunExecutorError::Ledger`] if recording `RunStarted` fails.
    pub fn start_run(
        &self,
        run_id: RunId,
        goal: impl Into<String>,
        cancel: &CancelToken,
    ) -> Result<Run, RunExecutorError> {
        let goal = goal.into();
        let now = self.clock.now();
        let run = self.run_store.create(run_id.clone(), goal.clone(), now)?;
        self.ledger.append_one(&run_id, Some(State::INITIAL), EventPayload::RunStarted { goal }, cancel)?;
        Ok(run)
    }

    /// Drives `run_id` to a terminal status, consulting `planner` for every
    /// decision and enforcing `policy` via the tool executor.
    ///
    /// Returns as soon as the run reaches `Done`, `Failed`, or `Cancelled`;
    /// a run already terminal when called is returned unchanged. Every
    /// run-level failure mode (illegal transition, budget exhaustion,
    /// planner error, lack of progress, cancellation) is recorded on the
    /// run itself rather than surfaced as an `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`RunExecutorError`] only for infrastructure failures: an
    /// unknown `run_id`, or a run store/ledger error.
    pub fn drive(
        &self,
        run_id: &RunId,
        planner: &dyn Planner,
        approver: &dyn Approver,
        policy: &Policy,
        cancel: &CancelToken,
    ) -> Result<Run, RunExecutorError> {
        let mut last_losing_decision: Option<Decision> = None;
        let mut steps: u64 = 0;

        loop {
            let run = self.run_store.get(run_id)?;
            if run.status != RunStatus::Running {
                return Ok(run);
            }
            let current_state = run.current_state;

            if cancel.is_cancelled() {
                return self.cancel_run(run_id, current_state);
            }

            steps += 1;
            if steps > self.config.step_budget {
                return self.fail_run(run_id, current_state, "step budget exhausted", cancel);
            }

            let recent_ledger = self.recent_ledger(run_id)?;
            let context = PlannerContext { run_id: run_id.clone(), current_state, recent_ledger };

            let decision = match planner.plan(&context, cancel) {
                Ok(decision) => decision,
                Err(err) => return self.fail_run(run_id, current_state, &format!("planner error: {err}"), cancel),
            };

            self.record_decision(run_id, current_state, &decision, cancel)?;

            match decision.clone() {
                Decision::CallTool { tool_name, input, reason } => {
                    match self.tool_executor.execute(run_id, current_state, policy, approver, &tool_name, &input, &reason, cancel) {
                        Ok(_) => last_losing_decision = None,
                        Err(err) => {
                            if matches!(err, ToolExecutorError::Policy(PolicyError::BudgetExceeded { .. })) {
                                return self.fail_run(run_id, current_state, &format!("budget exceeded: {err}"), cancel);
                            }
                            if last_losing_decision.as_ref() == Some(&decision) {
                                return self.fail_run(
                                    run_id,
                                    current_state,
                                    &format!("no progress: planner repeated a losing decision ({err})"),
                                    cancel,
                                );
                            }
                            last_losing_decision = Some(decision);
                        }
                    }
                }
                Decision::Transition { to_state, reason } => {
                    if let Err(err) = policy.check_transition(current_state, to_state) {
                        return self.fail_run(run_id, current_state, &err.to_string(), cancel);
                    }
                    self.run_store.update(run_id, |run| run.current_state = to_state)?;
                    self.ledger.append_one(
                        run_id,
                        Some(to_state),
                        EventPayload::StateTransitioned { from_state: current_state, to_state, reason },
                        cancel,
                    )?;
                    last_losing_decision = None;
                    if to_state == State::Done {
                        return self.complete_run(run_id, to_state, "transitioned to done", JsonValue::Null, cancel);
                    }
                    if to_state == State::Failed {
                        return self.fail_run(run_id, to_state, "transitioned to failed", cancel);
                    }
                }
                Decision::Finish { summary, result } => {
                    return self.complete_run(run_id, current_state, &summary, result, cancel);
                }
                Decision::Fail { reason } => {
                    return self.fail_run(run_id, current_state, &reason, cancel);
                }
            }
        }
    }

    fn recent_ledger(&self, run_id: &RunId) -> Result<Vec<crate::core::event::Event>, RunExecutorError> {
        let events = self.ledger.load_events(run_id)?;
        let window_start = events.len().saturating_sub(self.config.ledger_window);
        Ok(events[window_start..].to_vec())
    }

    fn record_decision(
        &self,
        run_id: &RunId,
        state: State,
        decision: &Decision,
        cancel: &CancelToken,
    ) -> Result<(), RunExecutorError> {
        let (tool_name, to_state, input, reason) = match decision {
            Decision::CallTool { tool_name, input, reason } => (Some(tool_name.clone()), None, Some(input.clone()), reason.clone()),
            Decision::Transition { to_state, reason } => (None, Some(*to_state), None, reason.clone()),
            Decision::Finish { summary, .. } => (None, None, None, summary.clone()),
            Decision::Fail { reason } => (None, None, None, reason.clone()),
        };
        self.ledger.append_one(
            run_id,
            Some(state),
            EventPayload::Decision { decision_type: decision.kind().to_string(), tool_name, to_state, reason, input },
            cancel,
        )?;
        Ok(())
    }

    /// Mutates the run to `Completed`/`Done`, emitting `StateTransitioned`
    /// (only if not already in `Done`) followed by `RunCompleted`.
    fn complete_run(
        &self,
        run_id: &RunId,
        from_state: State,
        summary: &str,
        result: JsonValue,
        cancel: &CancelToken,
    ) -> Result<Run, RunExecutorError> {
        let now = self.clock.now();
        let run = self.run_store.update(run_id, |run| {
            run.status = RunStatus::Completed;
            run.result = Some(result.clone());
            run.end_time = now;
            run.current_state = State::Done;
        })?;
        if from_state != State::Done {
            self.ledger.append_one(
                run_id,
                Some(State::Done),
                EventPayload::StateTransitioned { from_state, to_state: State::Done, reason: summary.to_string() },
                cancel,
            )?;
        }
        let duration_millis = now.as_unix_millis() - run.start_time.as_unix_millis();
        self.ledger.append_one(
            run_id,
            Some(State::Done),
            EventPayload::RunCompleted { summary: summary.to_string(), duration_millis, result },
            cancel,
        )?;
        Ok(run)
    }

    /// Mutates the run to `Failed`, emitting `StateTransitioned` (only if
    /// not already in `Failed`) followed by `RunFailed`.
    fn fail_run(&self, run_id: &RunId, from_state: State, reason: &str, cancel: &CancelToken) -> Result<Run, RunExecutorError> {
        let now = self.clock.now();
        let run = self.run_store.update(run_id, |run| {
            run.status = RunStatus::Failed;
            run.error = Some(reason.to_string());
            run.end_time = now;
            run.current_state = State::Failed;
        })?;
        if from_state != State::Failed {
            self.ledger.append_one(
                run_id,
                Some(State::Failed),
                EventPayload::StateTransitioned { from_state, to_state: State::Failed, reason: reason.to_string() },
                cancel,
            )?;
        }
        let duration_millis = now.as_unix_millis() - run.start_time.as_unix_millis();
        self.ledger.append_one(
            run_id,
            Some(State::Failed),
            EventPayload::RunFailed { reason: reason.to_string(), duration_millis, state: from_state },
            cancel,
        )?;
        Ok(run)
    }

    /// Mutates the run to the distinct `Cancelled` status (see spec §9 open
    /// question) while still landing `current_state` on the terminal
    /// `Failed` state, emitting the same transition/terminal event pair as
    /// [`Self::fail_run`] with reason `"cancelled"`.
    fn cancel_run(&self, run_id: &RunId, from_state: State) -> Result<Run, RunExecutorError> {
        let now = self.clock.now();
        let run = self.run_store.update(run_id, |run| {
            run.status = RunStatus::Cancelled;
            run.error = Some("cancelled".to_string());
            run.end_time = now;
            run.current_state = State::Failed;
        })?;
        // cancel is already tripped here; a fresh token lets the terminal
        // events actually get recorded instead of being rejected as cancelled.
        let recording_token = CancelToken::new();
        if from_state != State::Failed {
            self.ledger.append_one(
                run_id,
                Some(State::Failed),
                EventPayload::StateTransitioned { from_state, to_state: State::Failed, reason: "cancelled".to_string() },
                &recording_token,
            )?;
        }
        let duration_millis = now.as_unix_millis() - run.start_time.as_unix_millis();
        self.ledger.append_one(
            run_id,
            Some(State::Failed),
            EventPayload::RunFailed { reason: "cancelled".to_string(), duration_millis, state: from_state },
            &recording_token,
        )?;
        Ok(run)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;
    use crate::core::event::EventKind;
    use crate::core::identifiers::BudgetName;
    use crate::core::identifiers::ToolName;
    use crate::core::time::FixedClock;
    use crate::core::tool::ToolAnnotations;
    use crate::core::tool::ToolDescriptor;
    use crate::interfaces::ApprovalResponse;
    use crate::interfaces::ApproverError;
    use crate::interfaces::PlannerError;
    use crate::interfaces::Tool;
    use crate::interfaces::ToolError;
    use crate::interfaces::ToolOutcome;
    use crate::runtime::cache::Cache;
    use crate::runtime::policy::ApprovalPolicy;
    use crate::runtime::policy::budget::Budget;
    use crate::runtime::policy::eligibility::Eligibility;
    use crate::runtime::policy::transitions::Transitions;
    use crate::runtime::registry::ToolRegistry;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct EchoTool;
    impl Tool for EchoTool {
        fn execute(&self, input: &JsonValue, _cancel: &CancelToken) -> Result<ToolOutcome, ToolError> {
            Ok(ToolOutcome { output: input.clone() })
        }
    }

    struct AlwaysApprove;
    impl Approver for AlwaysApprove {
        fn approve(&self, _request: &crate::interfaces::ApprovalRequest, _deadline_millis: u64, _cancel: &CancelToken) -> Result<ApprovalResponse, ApproverError> {
            Ok(ApprovalResponse { approved: true, approver: "auto".to_string(), reason: "ok".to_string(), timestamp: crate::core::time::Timestamp::ZERO })
        }
    }

    /// Planner that replays a fixed script of decisions in order, ignoring
    /// the ledger context it is offered.
    struct ScriptedPlanner {
        script: Mutex<Vec<Decision>>,
    }

    impl ScriptedPlanner {
        fn new(script: Vec<Decision>) -> Self {
            Self { script: Mutex::new(script) }
        }
    }

    impl Planner for ScriptedPlanner {
        fn plan(&self, _context: &PlannerContext, _cancel: &CancelToken) -> Result<Decision, PlannerError> {
            let mut script = self.script.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if script.is_empty() {
                return Err(PlannerError::Failed("script exhausted".to_string()));
            }
            Ok(script.remove(0))
        }
    }

    fn harness() -> (RunExecutor, Arc<Ledger>, Arc<RunStore>, Policy, RunId) {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1_000));
        let ledger = Arc::new(Ledger::new(clock.clone()));
        let run_store = Arc::new(RunStore::new());
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(
                ToolDescriptor {
                    name: ToolName::new("list_dir"),
                    input_schema: json!({"type": "object"}),
                    output_schema: json!({"type": "object"}),
                    annotations: ToolAnnotations::read_only_cacheable(),
                },
                Arc::new(EchoTool),
            )
            .expect("register succeeds");
        registry
            .register(
                ToolDescriptor {
                    name: ToolName::new("write_file"),
                    input_schema: json!({"type": "object"}),
                    output_schema: json!({"type": "object"}),
                    annotations: ToolAnnotations::default(),
                },
                Arc::new(EchoTool),
            )
            .expect("register succeeds");
        registry
            .register(
                ToolDescriptor {
                    name: ToolName::new("read_file"),
                    input_schema: json!({"type": "object"}),
                    output_schema: json!({"type": "object"}),
                    annotations: ToolAnnotations::read_only_cacheable(),
                },
                Arc::new(EchoTool),
            )
            .expect("register succeeds");

        let cache = Arc::new(Cache::new(clock.clone(), 10));
        let tool_executor = Arc::new(ToolExecutor::new(registry, ledger.clone(), cache, clock.clone()));
        let executor = RunExecutor::new(run_store.clone(), ledger.clone(), tool_executor, clock, ExecutorConfig::default());

        let mut eligibility = Eligibility::new();
        eligibility.allow(State::Explore, ToolName::new("list_dir"));
        eligibility.allow(State::Act, ToolName::new("write_file"));
        eligibility.allow(State::Validate, ToolName::new("read_file"));
        let budget = Budget::new(HashMap::from([(BudgetName::new("tool_calls"), 10)]));
        let policy = Policy::new(eligibility, Transitions::default(), budget, ApprovalPolicy::default());

        let run_id = RunId::new("r1");
        let cancel = CancelToken::new();
        executor.start_run(run_id.clone(), "write a greeting file", &cancel).expect("start succeeds");

        (executor, ledger, run_store, policy, run_id)
    }

    #[test]
    fn happy_path_completes_run_with_expected_events() {
        let (executor, ledger, run_store, policy, run_id) = harness();
        let approver = AlwaysApprove;
        let script = vec![
            Decision::Transition { to_state: State::Explore, reason: "begin".to_string() },
            Decision::CallTool { tool_name: ToolName::new("list_dir"), input: json!({"path": "."}), reason: "look around".to_string() },
            Decision::Transition { to_state: State::Decide, reason: "done exploring".to_string() },
            Decision::Transition { to_state: State::Act, reason: "create".to_string() },
            Decision::CallTool { tool_name: ToolName::new("write_file"), input: json!({"path": "a.txt", "content": "hi"}), reason: "write it".to_string() },
            Decision::Transition { to_state: State::Validate, reason: "check".to_string() },
            Decision::CallTool { tool_name: ToolName::new("read_file"), input: json!({"path": "a.txt"}), reason: "verify".to_string() },
            Decision::Finish { summary: "ok".to_string(), result: json!({"content": "hi"}) },
        ];
        let planner = ScriptedPlanner::new(script);

        let run = executor.drive(&run_id, &planner, &approver, &policy, &CancelToken::new()).expect("drive succeeds");
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.current_state, State::Done);
        assert_eq!(run.result, Some(json!({"content": "hi"})));

        let events = ledger.load_events(&run_id).expect("load succeeds");
        let kinds: Vec<_> = events.iter().map(crate::core::event::Event::kind).collect();
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::RunStarted).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::Decision).count(), 8);
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::ToolCalled).count(), 3);
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::ToolSucceeded).count(), 3);
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::BudgetConsumed).count(), 3);
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::RunCompleted).count(), 1);

        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        let mut sorted = sequences.clone();
        sorted.sort_unstable();
        assert_eq!(sequences, sorted, "sequences must already be in ascending order");
        assert_eq!(sequences, (1..=sequences.len() as u64).collect::<Vec<_>>());

        let stored_run = run_store.get(&run_id).expect("get succeeds");
        assert_eq!(stored_run.status, RunStatus::Completed);
    }

    #[test]
    fn illegal_transition_fails_run_immediately() {
        let (executor, ledger, _run_store, policy, run_id) = harness();
        let approver = AlwaysApprove;
        let planner = ScriptedPlanner::new(vec![Decision::Transition { to_state: State::Act, reason: "skip".to_string() }]);

        let run = executor.drive(&run_id, &planner, &approver, &policy, &CancelToken::new()).expect("drive succeeds");
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.current_state, State::Failed);
        assert!(run.error.as_deref().is_some_and(|e| e.contains("intake") || e.contains("Intake")));

        let events = ledger.load_events(&run_id).expect("load succeeds");
        let kinds: Vec<_> = events.iter().map(crate::core::event::Event::kind).collect();
        assert_eq!(kinds.last(), Some(&EventKind::RunFailed));
        assert!(kinds.contains(&EventKind::StateTransitioned));
        assert!(!kinds.contains(&EventKind::ToolFailed));
    }

    #[test]
    fn budget_exhaustion_fails_run_on_second_call() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1_000));
        let ledger = Arc::new(Ledger::new(clock.clone()));
        let run_store = Arc::new(RunStore::new());
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(
                ToolDescriptor {
                    name: ToolName::new("read_file"),
                    input_schema: json!({"type": "object"}),
                    output_schema: json!({"type": "object"}),
                    annotations: ToolAnnotations::read_only_cacheable(),
                },
                Arc::new(EchoTool),
            )
            .expect("register succeeds");
        let cache = Arc::new(Cache::new(clock.clone(), 10));
        let tool_executor = Arc::new(ToolExecutor::new(registry, ledger.clone(), cache, clock.clone()));
        let executor = RunExecutor::new(run_store, ledger.clone(), tool_executor, clock, ExecutorConfig::default());

        let mut eligibility = Eligibility::new();
        eligibility.allow(State::Explore, ToolName::new("read_file"));
        let budget = Budget::new(HashMap::from([(BudgetName::new("tool_calls"), 1)]));
        let policy = Policy::new(eligibility, Transitions::default(), budget, ApprovalPolicy::default());

        let run_id = RunId::new("r1");
        let cancel = CancelToken::new();
        executor.start_run(run_id.clone(), "read twice", &cancel).expect("start succeeds");

        let approver = AlwaysApprove;
        let script = vec![
            Decision::Transition { to_state: State::Explore, reason: "begin".to_string() },
            Decision::CallTool { tool_name: ToolName::new("read_file"), input: json!({"path": "a"}), reason: "first".to_string() },
            Decision::CallTool { tool_name: ToolName::new("read_file"), input: json!({"path": "b"}), reason: "second".to_string() },
        ];
        let planner = ScriptedPlanner::new(script);

        let run = executor.drive(&run_id, &planner, &approver, &policy, &CancelToken::new()).expect("drive succeeds");
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().is_some_and(|e| e.contains("budget")));

        let events = ledger.load_events(&run_id).expect("load succeeds");
        let kinds: Vec<_> = events.iter().map(crate::core::event::Event::kind).collect();
        assert!(kinds.contains(&EventKind::BudgetExhausted));
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::ToolSucceeded).count(), 1);
    }

    #[test]
    fn no_progress_guard_fails_run_on_repeated_losing_decision() {
        let (executor, ledger, _run_store, policy, run_id) = harness();
        let approver = AlwaysApprove;
        let repeated = Decision::CallTool { tool_name: ToolName::new("write_file"), input: json!({"path": "a"}), reason: "write".to_string() };
        let script = vec![repeated.clone(), repeated];
        let planner = ScriptedPlanner::new(script);

        let run = executor.drive(&run_id, &planner, &approver, &policy, &CancelToken::new()).expect("drive succeeds");
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().is_some_and(|e| e.contains("no progress")));

        let events = ledger.load_events(&run_id).expect("load succeeds");
        let tool_failed_count = events.iter().filter(|e| e.kind() == EventKind::ToolFailed).count();
        assert_eq!(tool_failed_count, 2, "both ineligible attempts are recorded before the guard fires");
    }

    #[test]
    fn cancellation_fails_run_with_cancelled_status() {
        let (executor, ledger, _run_store, policy, run_id) = harness();
        let approver = AlwaysApprove;
        let planner = ScriptedPlanner::new(vec![Decision::Transition { to_state: State::Explore, reason: "begin".to_string() }]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let run = executor.drive(&run_id, &planner, &approver, &policy, &cancel).expect("drive succeeds");
        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(run.current_state, State::Failed);

        let events = ledger.load_events(&run_id).expect("load succeeds");
        let kinds: Vec<_> = events.iter().map(crate::core::event::Event::kind).collect();
        assert_eq!(kinds.last(), Some(&EventKind::RunFailed));
    }

    #[test]
    fn step_budget_exhaustion_fails_run() {
        let (executor, _ledger, _run_store, policy, run_id) = harness();
        let approver = AlwaysApprove;
        let tight_config = ExecutorConfig { step_budget: 1, ledger_window: DEFAULT_LEDGER_WINDOW };
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1_000));
        let ledger = Arc::new(Ledger::new(clock.clone()));
        let run_store = Arc::new(RunStore::new());
        let registry = Arc::new(ToolRegistry::new());
        let cache = Arc::new(Cache::new(clock.clone(), 10));
        let tool_executor = Arc::new(ToolExecutor::new(registry, ledger.clone(), cache, clock.clone()));
        let tight_executor = RunExecutor::new(run_store.clone(), ledger.clone(), tool_executor, clock, tight_config);
        let cancel = CancelToken::new();
        tight_executor.start_run(run_id.clone(), "loop forever", &cancel).expect("start succeeds");

        let script = vec![
            Decision::Transition { to_state: State::Explore, reason: "1".to_string() },
            Decision::Transition { to_state: State::Decide, reason: "2".to_string() },
        ];
        let planner = ScriptedPlanner::new(script);

        let run = tight_executor.drive(&run_id, &planner, &approver, &policy, &CancelToken::new()).expect("drive succeeds");
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.as_deref().is_some_and(|e| e.contains("step budget")));
        let _ = executor;
    }
}
