// src/runtime/tool_executor.rs
// ============================================================================
// Module: Agent Engine Tool Executor
// Description: Validates, gates, runs, and records a single CallTool decision.
// Purpose: Implement the specification's §4.6 seven-step invocation sequence.
// Dependencies: crate::runtime::{registry, policy, cache, ledger}, jsonschema
// ============================================================================

//! ## Overview
//! The tool executor is the only component that actually invokes a
//! [`crate::interfaces::Tool`] handler. For one `CallTool` decision it
//! resolves the tool, applies the composite policy gate (eligibility,
//! schema, approval, budget), serves a cached result when possible, and
//! otherwise runs the handler and records every step as a ledger event —
//! before, not instead of, returning a result to the run executor.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::core::event::EventPayload;
use crate::core::event::RiskLevel as PayloadRiskLevel;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_key;
use crate::core::identifiers::RunId;
use crate::core::identifiers::ToolName;
use crate::core::state::State;
use crate::core::time::Clock;
use crate::interfaces::ApprovalRequest;
use crate::interfaces::Approver;
use crate::interfaces::CancelToken;
use crate::runtime::cache::Cache;
use crate::runtime::ledger::Ledger;
use crate::runtime::ledger::LedgerError;
use crate::runtime::policy::Policy;
use crate::runtime::policy::PolicyError;
use crate::runtime::registry::RegistryError;
use crate::runtime::registry::ToolRegistry;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by [`ToolExecutor::execute`].
///
/// Every variant except [`ToolExecutorError::Ledger`] corresponds to an
/// outcome the executor has already recorded as a ledger event before
/// returning; the run executor only needs this value to decide whether to
/// keep looping or fail the run.
#[derive(Debug, Error)]
pub enum ToolExecutorError {
    /// No tool is registered under the requested name.
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    /// The input failed schema validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A policy check (eligibility, budget, approval) failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// The tool handler itself returned an error.
    #[error("tool handler failed: {0}")]
    HandlerFailed(String),
    /// Appending the resulting events to the ledger failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// The result of a successful `CallTool` dispatch.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    /// The tool's output payload.
    pub output: JsonValue,
    /// Whether the result was served from the result cache.
    pub cached: bool,
}

// ============================================================================
// SECTION: Tool Executor
// ============================================================================

/// Orchestrates the specification's seven-step `CallTool` dispatch sequence.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    ledger: Arc<Ledger>,
    cache: Arc<Cache>,
    clock: Arc<dyn Clock>,
}

impl ToolExecutor {
    /// Builds a tool executor over the given registry, ledger, and cache.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, ledger: Arc<Ledger>, cache: Arc<Cache>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, ledger, cache, clock }
    }

    /// Executes one `CallTool` decision end to end: eligibility, schema
    /// validation, approval, budget consumption, cache lookup, dispatch, and
    /// ledger recording.
    ///
    /// `policy` and `approver` are supplied per call (rather than owned by
    /// the executor) because budgets and approval rules are configured per
    /// run, not per engine instance.
    ///
    /// # Errors
    ///
    /// Returns [`ToolExecutorError`] for every failure named by the
    /// specification's §4.6 sequence; by the time this returns an error the
    /// corresponding ledger event has already been recorded.
    #[allow(clippy::too_many_arguments, reason = "mirrors the composite policy gate's own parameter surface")]
    pub fn execute(
        &self,
        run_id: &RunId,
        state: State,
        policy: &Policy,
        approver: &dyn Approver,
        tool_name: &ToolName,
        input: &JsonValue,
        reason: &str,
        cancel: &CancelToken,
    ) -> Result<ToolCallOutcome, ToolExecutorError> {
        let Ok(registered) = self.registry.resolve(tool_name) else {
            self.record_tool_failed(run_id, tool_name, "tool not found", 0, cancel)?;
            return Err(ToolExecutorError::ToolNotFound(tool_name.to_string()));
        };

        if let Err(err) = policy.check_eligible(state, tool_name) {
            self.record_tool_failed(run_id, tool_name, &err.to_string(), 0, cancel)?;
            return Err(err.into());
        }

        let validator = jsonschema::validator_for(&registered.descriptor.input_schema)
            .map_err(|err| ToolExecutorError::InvalidInput(err.to_string()))?;
        if !validator.is_valid(input) {
            let msg = format!("input does not conform to schema for {tool_name}");
            self.record_tool_failed(run_id, tool_name, &msg, 0, cancel)?;
            return Err(ToolExecutorError::InvalidInput(msg));
        }

        let annotations = registered.descriptor.annotations;
        if policy.approval.requires_approval(tool_name, annotations) {
            self.approve(run_id, tool_name, input, reason, annotations, policy, approver, cancel)?;
        }

        let budget_name = crate::core::identifiers::BudgetName::new("tool_calls");
        match policy.budget.consume(&budget_name, 1) {
            Ok(remaining) => {
                self.ledger.append_one(
                    run_id,
                    Some(state),
                    EventPayload::BudgetConsumed { budget_name: budget_name.to_string(), amount: 1, remaining },
                    cancel,
                )?;
            }
            Err(limit) => {
                self.ledger.append_one(
                    run_id,
                    Some(state),
                    EventPayload::BudgetExhausted { budget_name: budget_name.to_string() },
                    cancel,
                )?;
                let msg = format!("budget exceeded: {budget_name}");
                self.record_tool_failed(run_id, tool_name, &msg, 0, cancel)?;
                return Err(ToolExecutorError::Policy(PolicyError::BudgetExceeded {
                    name: budget_name,
                    remaining: limit.limit - limit.consumed,
                }));
            }
        }

        let cache_key = self.cache_key(tool_name, input).ok();
        if annotations.cacheable
            && let Some(key) = &cache_key
            && let Ok(Some(cached_bytes)) = self.cache.get(key)
            && let Ok(output) = serde_json::from_slice::<JsonValue>(&cached_bytes)
        {
            self.ledger.append_one(
                run_id,
                Some(state),
                EventPayload::ToolSucceeded { tool_name: tool_name.clone(), output: output.clone(), duration_millis: 0, cached: true },
                cancel,
            )?;
            return Ok(ToolCallOutcome { output, cached: true });
        }

        self.ledger.append_one(
            run_id,
            Some(state),
            EventPayload::ToolCalled { tool_name: tool_name.clone(), input: input.clone(), state },
            cancel,
        )?;

        let started = self.clock.now();
        let result = registered.handler.execute(input, cancel);
        let duration_millis = (self.clock.now().as_unix_millis() - started.as_unix_millis()).max(0);

        match result {
            Ok(outcome) => {
                self.ledger.append_one(
                    run_id,
                    Some(state),
                    EventPayload::ToolSucceeded {
                        tool_name: tool_name.clone(),
                        output: outcome.output.clone(),
                        duration_millis,
                        cached: false,
                    },
                    cancel,
                )?;
                if annotations.cacheable
                    && annotations.idempotent
                    && let Some(key) = &cache_key
                    && let Ok(bytes) = serde_json::to_vec(&outcome.output)
                {
                    let _ = self.cache.set(key, &bytes, 0);
                }
                Ok(ToolCallOutcome { output: outcome.output, cached: false })
            }
            Err(err) => {
                let msg = err.to_string();
                self.record_tool_failed(run_id, tool_name, &msg, duration_millis, cancel)?;
                Err(ToolExecutorError::HandlerFailed(msg))
            }
        }
    }

    #[allow(clippy::too_many_arguments, reason = "approval bookkeeping needs every field of the request")]
    fn approve(
        &self,
        run_id: &RunId,
        tool_name: &ToolName,
        input: &JsonValue,
        reason: &str,
        annotations: crate::core::tool::ToolAnnotations,
        policy: &Policy,
        approver: &dyn Approver,
        cancel: &CancelToken,
    ) -> Result<(), ToolExecutorError> {
        let risk_level = match annotations.risk_level {
            crate::core::event::RiskLevel::Low => PayloadRiskLevel::Low,
            crate::core::event::RiskLevel::Medium => PayloadRiskLevel::Medium,
            crate::core::event::RiskLevel::High => PayloadRiskLevel::High,
        };
        self.ledger.append_one(
            run_id,
            None,
            EventPayload::ApprovalRequested { tool_name: tool_name.clone(), input: input.clone(), risk_level },
            cancel,
        )?;

        let request = ApprovalRequest {
            run_id: run_id.clone(),
            tool_name: tool_name.clone(),
            input: input.clone(),
            reason: reason.to_string(),
            risk_level: annotations.risk_level,
            timestamp: self.clock.now(),
        };
        let deadline = crate::runtime::policy::DEFAULT_APPROVAL_TIMEOUT_MILLIS;
        let outcome = approver.approve(&request, deadline, cancel);

        let (approved, approver_id, approver_reason) = match &outcome {
            Ok(response) => (response.approved, Some(response.approver.clone()), response.reason.clone()),
            Err(crate::interfaces::ApproverError::TimedOut) => (false, None, "approval timed out".to_string()),
            Err(err) => (false, None, err.to_string()),
        };
        self.ledger.append_one(
            run_id,
            None,
            EventPayload::ApprovalResolved {
                tool_name: tool_name.clone(),
                approved,
                approver: approver_id,
                reason: approver_reason.clone(),
            },
            cancel,
        )?;

        if approved {
            return Ok(());
        }
        let policy_err = if matches!(outcome, Err(crate::interfaces::ApproverError::TimedOut)) {
            PolicyError::ApprovalTimeout
        } else {
            PolicyError::ApprovalDenied(approver_reason.clone())
        };
        self.record_tool_failed(run_id, tool_name, &policy_err.to_string(), 0, cancel)?;
        let _ = policy;
        Err(policy_err.into())
    }

    fn record_tool_failed(
        &self,
        run_id: &RunId,
        tool_name: &ToolName,
        error: &str,
        duration_millis: i64,
        cancel: &CancelToken,
    ) -> Result<(), LedgerError> {
        self.ledger
            .append_one(
                run_id,
                None,
                EventPayload::ToolFailed { tool_name: tool_name.clone(), error: error.to_string(), duration_millis },
                cancel,
            )
            .map(|_| ())
    }

    fn cache_key(&self, tool_name: &ToolName, input: &JsonValue) -> Result<String, HashError> {
        #[derive(serde::Serialize)]
        struct Key<'a> {
            tool_name: &'a str,
            input: &'a JsonValue,
        }
        canonical_key(&Key { tool_name: tool_name.as_str(), input })
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
    use crate::core::identifiers::BudgetName;
    use crate::core::time::FixedClock;
    use crate::core::tool::ToolAnnotations;
    use crate::core::tool::ToolDescriptor;
    use crate::interfaces::ApprovalResponse;
    use crate::interfaces::ApproverError;
    use crate::interfaces::Tool;
    use crate::interfaces::ToolError;
    use crate::interfaces::ToolOutcome;
    use crate::runtime::policy::budget::Budget;
    use crate::runtime::policy::eligibility::Eligibility;
    use crate::runtime::policy::transitions::Transitions;
    use serde_json::json;
    use std::collections::HashMap;

    struct EchoTool;
    impl Tool for EchoTool {
        fn execute(&self, input: &JsonValue, _cancel: &CancelToken) -> Result<ToolOutcome, ToolError> {
            Ok(ToolOutcome { output: input.clone() })
        }
    }

    struct FailingTool;
    impl Tool for FailingTool {
        fn execute(&self, _input: &JsonValue, _cancel: &CancelToken) -> Result<ToolOutcome, ToolError> {
            Err(ToolError::Failed("boom".to_string()))
        }
    }

    struct AlwaysApprove;
    impl Approver for AlwaysApprove {
        fn approve(&self, _request: &ApprovalRequest, _deadline_millis: u64, _cancel: &CancelToken) -> Result<ApprovalResponse, ApproverError> {
            Ok(ApprovalResponse { approved: true, approver: "auto".to_string(), reason: "ok".to_string(), timestamp: Timestamp::ZERO })
        }
    }

    struct AlwaysDeny;
    impl Approver for AlwaysDeny {
        fn approve(&self, _request: &ApprovalRequest, _deadline_millis: u64, _cancel: &CancelToken) -> Result<ApprovalResponse, ApproverError> {
            Ok(ApprovalResponse { approved: false, approver: "auto".to_string(), reason: "policy violation".to_string(), timestamp: Timestamp::ZERO })
        }
    }

    use crate::core::time::Timestamp;

    fn setup() -> (ToolExecutor, Arc<Ledger>, Policy, RunId) {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1_000));
        let ledger = Arc::new(Ledger::new(clock.clone()));
        let cache = Arc::new(Cache::new(clock.clone(), 10));
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
        registry
            .register(
                ToolDescriptor {
                    name: ToolName::new("delete_file"),
                    input_schema: json!({"type": "object"}),
                    output_schema: json!({"type": "object"}),
                    annotations: ToolAnnotations::destructive(),
                },
                Arc::new(FailingTool),
            )
            .expect("register succeeds");

        let mut eligibility = Eligibility::new();
        eligibility.allow(State::Act, ToolName::new("read_file"));
        eligibility.allow(State::Act, ToolName::new("delete_file"));
        let budget = Budget::new(HashMap::from([(BudgetName::new("tool_calls"), 10)]));
        let policy = Policy::new(eligibility, Transitions::default(), budget, crate::runtime::policy::ApprovalPolicy::default());

        let executor = ToolExecutor::new(registry, ledger.clone(), cache, clock);
        (executor, ledger, policy, RunId::new("r1"))
    }

    #[test]
    fn successful_call_records_called_then_succeeded() {
        let (executor, ledger, policy, run_id) = setup();
        let cancel = CancelToken::new();
        let approver = AlwaysApprove;
        let outcome = executor
            .execute(&run_id, State::Act, &policy, &approver, &ToolName::new("read_file"), &json!({"path": "a"}), "read it", &cancel)
            .expect("execute succeeds");
        assert_eq!(outcome.output, json!({"path": "a"}));
        assert!(!outcome.cached);

        let events = ledger.load_events(&run_id).expect("load succeeds");
        let kinds: Vec<_> = events.iter().map(crate::core::event::Event::kind).collect();
        assert!(kinds.contains(&crate::core::event::EventKind::ToolCalled));
        assert!(kinds.contains(&crate::core::event::EventKind::ToolSucceeded));
        assert!(kinds.contains(&crate::core::event::EventKind::BudgetConsumed));
    }

    #[test]
    fn ineligible_tool_fails_without_budget_consumption() {
        let (executor, ledger, policy, run_id) = setup();
        let cancel = CancelToken::new();
        let approver = AlwaysApprove;
        let result = executor.execute(&run_id, State::Explore, &policy, &approver, &ToolName::new("read_file"), &json!({}), "x", &cancel);
        assert!(matches!(result, Err(ToolExecutorError::Policy(PolicyError::ToolNotEligible { .. }))));

        let events = ledger.load_events(&run_id).expect("load succeeds");
        assert!(events.iter().all(|e| e.kind() != crate::core::event::EventKind::BudgetConsumed));
    }

    #[test]
    fn denied_approval_fails_before_tool_call() {
        let (executor, ledger, policy, run_id) = setup();
        let cancel = CancelToken::new();
        let approver = AlwaysDeny;
        let result = executor.execute(&run_id, State::Act, &policy, &approver, &ToolName::new("delete_file"), &json!({"path": "x"}), "rm", &cancel);
        assert!(matches!(result, Err(ToolExecutorError::Policy(PolicyError::ApprovalDenied(_)))));

        let events = ledger.load_events(&run_id).expect("load succeeds");
        let kinds: Vec<_> = events.iter().map(crate::core::event::Event::kind).collect();
        assert!(kinds.contains(&crate::core::event::EventKind::ApprovalRequested));
        assert!(kinds.contains(&crate::core::event::EventKind::ApprovalResolved));
        assert!(!kinds.contains(&crate::core::event::EventKind::ToolCalled));
    }

    #[test]
    fn budget_exhaustion_fails_second_call() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(1_000));
        let ledger = Arc::new(Ledger::new(clock.clone()));
        let cache = Arc::new(Cache::new(clock.clone(), 10));
        let registry = Arc::new(ToolRegistry::new());
        registry
            .register(
                ToolDescriptor {
                    name: ToolName::new("read_file"),
                    input_schema: json!({"type": "object"}),
                    output_schema: json!({"type": "object"}),
                    annotations: ToolAnnotations::default(),
                },
                Arc::new(EchoTool),
            )
            .expect("register succeeds");
        let mut eligibility = Eligibility::new();
        eligibility.allow(State::Explore, ToolName::new("read_file"));
        let budget = Budget::new(HashMap::from([(BudgetName::new("tool_calls"), 1)]));
        let policy = Policy::new(eligibility, Transitions::default(), budget, crate::runtime::policy::ApprovalPolicy::default());
        let executor = ToolExecutor::new(registry, ledger.clone(), cache, clock);
        let run_id = RunId::new("r1");
        let cancel = CancelToken::new();
        let approver = AlwaysApprove;

        executor
            .execute(&run_id, State::Explore, &policy, &approver, &ToolName::new("read_file"), &json!({"path": "a"}), "r", &cancel)
            .expect("first call succeeds");
        let result = executor.execute(&run_id, State::Explore, &policy, &approver, &ToolName::new("read_file"), &json!({"path": "a"}), "r", &cancel);
        assert!(matches!(result, Err(ToolExecutorError::Policy(PolicyError::BudgetExceeded { .. }))));

        let events = ledger.load_events(&run_id).expect("load succeeds");
        assert!(events.iter().any(|e| e.kind() == crate::core::event::EventKind::BudgetExhausted));
    }

    #[test]
    fn cacheable_idempotent_tool_hits_cache_on_second_call() {
        let (executor, ledger, policy, run_id) = setup();
        let cancel = CancelToken::new();
        let approver = AlwaysApprove;
        let input = json!({"path": "a.txt"});

        executor
            .execute(&run_id, State::Act, &policy, &approver, &ToolName::new("read_file"), &input, "read", &cancel)
            .expect("first call succeeds");
        let second = executor
            .execute(&run_id, State::Act, &policy, &approver, &ToolName::new("read_file"), &input, "read", &cancel)
            .expect("second call succeeds");
        assert!(second.cached);

        let events = ledger.load_events(&run_id).expect("load succeeds");
        let tool_called_count = events.iter().filter(|e| e.kind() == crate::core::event::EventKind::ToolCalled).count();
        assert_eq!(tool_called_count, 1, "second call must not re-dispatch ToolCalled");
    }

    #[test]
    fn handler_failure_does_not_refund_budget() {
        let (executor, ledger, policy, run_id) = setup();
        let cancel = CancelToken::new();
        let approver = AlwaysApprove;
        let result = executor.execute(&run_id, State::Act, &policy, &approver, &ToolName::new("delete_file"), &json!({"path": "x"}), "rm", &cancel);
        assert!(result.is_err());
        let events = ledger.load_events(&run_id).expect("load succeeds");
        let consumed: i64 = events
            .iter()
            .filter_map(|e| match &e.payload {
                EventPayload::BudgetConsumed { amount, .. } => Some(i64::try_from(*amount).unwrap_or(0)),
                _ => None,
            })
            .sum();
        assert_eq!(consumed, 1, "the failed attempt is still the chargeable unit");
    }
}
