// src/core/state.rs
// ============================================================================
// Module: Agent Engine Run State
// Description: Run lifecycle states, decisions, and the run record itself.
// Purpose: Capture the closed state machine and its terminal outcomes.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! The run state machine is a closed set of seven states with `Intake` as the
//! initial state and `{Done, Failed}` as terminal. A [`Run`] carries the
//! mutable metadata the executor advances; everything else about a run's
//! history lives in the ledger (see `runtime::ledger`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::core::identifiers::RunId;
use crate::core::identifiers::ToolName;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: State
// ============================================================================

/// The closed set of run lifecycle states.
///
/// `Intake` is the initial state; `Done` and `Failed` are terminal. `Act` is
/// the only state in which side-effect-causing tools may run (enforced by
/// eligibility configuration, not by this type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Initial state: goal intake.
    Intake,
    /// Exploration of the problem space.
    Explore,
    /// Deciding on a course of action.
    Decide,
    /// Acting: the only state permitting side-effect-causing tools.
    Act,
    /// Validating the result of an action.
    Validate,
    /// Terminal success state.
    Done,
    /// Terminal failure state.
    Failed,
}

impl State {
    /// The initial state of every run.
    pub const INITIAL: Self = Self::Intake;

    /// Returns whether this state is terminal (`Done` or `Failed`).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// A planner's instruction to the executor for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    /// Invoke a named tool with the given input.
    CallTool {
        /// Name of the tool to invoke.
        tool_name: ToolName,
        /// Opaque input payload, validated against the tool's input schema.
        input: JsonValue,
        /// Planner's stated rationale.
        reason: String,
    },
    /// Move the run to a different state.
    Transition {
        /// Target state.
        to_state: State,
        /// Planner's stated rationale.
        reason: String,
    },
    /// Successfully conclude the run.
    Finish {
        /// Human-readable summary of the run's outcome.
        summary: String,
        /// Opaque result payload.
        result: JsonValue,
    },
    /// Conclude the run as failed.
    Fail {
        /// Reason the run is being failed.
        reason: String,
    },
}

impl Decision {
    /// Returns a short tag naming the decision variant, used in event payloads.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CallTool { .. } => "call_tool",
            Self::Transition { .. } => "transition",
            Self::Finish { .. } => "finish",
            Self::Fail { .. } => "fail",
        }
    }
}

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// The run's overall status, derived from terminal transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run is actively being driven by the executor.
    Running,
    /// The run reached `Done` via a `Finish` decision.
    Completed,
    /// The run reached `Failed` via a `Fail` decision, an illegal transition,
    /// budget/step exhaustion, or an unrecoverable internal error.
    Failed,
    /// The run was cancelled by the host before reaching a terminal state.
    Cancelled,
}

impl RunStatus {
    /// Returns whether the status represents a terminal outcome.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// Durable record of a single run's metadata.
///
/// # Invariants
/// - `end_time` is non-zero iff `status != Running`.
/// - `current_state` is terminal iff `status != Running`.
/// - `result` and `error` are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Stable run identifier.
    pub run_id: RunId,
    /// Immutable free-form goal text.
    pub goal: String,
    /// Time the run was created.
    pub start_time: Timestamp,
    /// Time the run reached a terminal state; zero while running.
    pub end_time: Timestamp,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// Current state in the state machine.
    pub current_state: State,
    /// Opaque result payload, present iff `status == Completed`.
    pub result: Option<JsonValue>,
    /// Human-readable failure reason, present iff the run ended unsuccessfully.
    pub error: Option<String>,
}

impl Run {
    /// Creates a new run in the initial state, `Running` status.
    #[must_use]
    pub fn new(run_id: RunId, goal: impl Into<String>, start_time: Timestamp) -> Self {
        Self {
            run_id,
            goal: goal.into(),
            start_time,
            end_time: Timestamp::ZERO,
            status: RunStatus::Running,
            current_state: State::INITIAL,
            result: None,
            error: None,
        }
    }

    /// Returns whether the run invariants described on [`Run`] hold.
    ///
    /// Exposed for tests and for hosts implementing an alternate run store.
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        let end_time_matches_status = self.end_time.is_zero() == (self.status == RunStatus::Running);
        let state_matches_status =
            self.current_state.is_terminal() == (self.status != RunStatus::Running);
        let result_error_exclusive = !(self.result.is_some() && self.error.is_some());
        end_time_matches_status && state_matches_status && result_error_exclusive
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
