// src/core/event.rs
// ============================================================================
// Module: Agent Engine Event Model
// Description: Append-only ledger event records and their typed payloads.
// Purpose: Define the closed set of event kinds and their wire shapes.
// Dependencies: crate::core::{identifiers, state, time, hashing}, serde
// ============================================================================

//! ## Overview
//! Events are immutable once appended. Each carries a per-run monotonic
//! [`Event::sequence`] assigned by the ledger (see `runtime::ledger`), never
//! by the caller. [`EventId`] is derived deterministically from the event's
//! content when the caller does not supply one, so replaying an identical
//! decision sequence against a fresh ledger reproduces identical IDs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::EventId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::ToolName;
use crate::core::state::State;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Event Kind
// ============================================================================

/// The closed set of ledger event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A run was created and entered `Intake`.
    RunStarted,
    /// A run reached `Done` via `Finish`.
    RunCompleted,
    /// A run reached `Failed`, was cancelled, or exhausted a guard.
    RunFailed,
    /// The run's `current_state` changed.
    StateTransitioned,
    /// The planner produced a decision.
    Decision,
    /// A tool invocation was dispatched to its handler.
    ToolCalled,
    /// A tool invocation completed successfully.
    ToolSucceeded,
    /// A tool invocation failed.
    ToolFailed,
    /// An approval request was issued to the approver.
    ApprovalRequested,
    /// An approval request was resolved (granted, denied, or timed out).
    ApprovalResolved,
    /// A named budget was consumed by an action.
    BudgetConsumed,
    /// A named budget reached its limit.
    BudgetExhausted,
    /// The planner requested input from a human operator.
    HumanInputRequested,
    /// A human input request was resolved.
    HumanInputResolved,
}

// ============================================================================
// SECTION: Event Payload
// ============================================================================

/// Risk level annotation carried by approval-related event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Low risk: typically read-only or idempotent.
    Low,
    /// Medium risk: may have limited side effects.
    Medium,
    /// High risk: destructive or hard to reverse.
    High,
}

/// Type-discriminated payload for one event kind.
///
/// Field names match the wire shapes enumerated in the specification's
/// external-interfaces section so hosts serializing these payloads keep a
/// stable contract across language implementations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details", rename_all = "snake_case")]
pub enum EventPayload {
    /// Payload for [`EventKind::RunStarted`].
    RunStarted {
        /// The run's immutable goal text.
        goal: String,
    },
    /// Payload for [`EventKind::RunCompleted`].
    RunCompleted {
        /// Planner-supplied summary of the outcome.
        summary: String,
        /// Run duration in milliseconds.
        duration_millis: i64,
        /// Opaque result payload.
        result: JsonValue,
    },
    /// Payload for [`EventKind::RunFailed`].
    RunFailed {
        /// Reason the run failed.
        reason: String,
        /// Run duration in milliseconds.
        duration_millis: i64,
        /// State the run was in when it failed.
        state: State,
    },
    /// Payload for [`EventKind::StateTransitioned`].
    StateTransitioned {
        /// Prior state.
        from_state: State,
        /// New state.
        to_state: State,
        /// Rationale carried from the triggering decision.
        reason: String,
    },
    /// Payload for [`EventKind::Decision`].
    Decision {
        /// Short tag for the decision variant (`call_tool`, `transition`, `finish`, `fail`).
        decision_type: String,
        /// Tool name, present only for `call_tool` decisions.
        tool_name: Option<ToolName>,
        /// Target state, present only for `transition` decisions.
        to_state: Option<State>,
        /// Planner-stated rationale.
        reason: String,
        /// Opaque input payload, present only for `call_tool` decisions.
        input: Option<JsonValue>,
    },
    /// Payload for [`EventKind::ToolCalled`].
    ToolCalled {
        /// Name of the invoked tool.
        tool_name: ToolName,
        /// Opaque input payload.
        input: JsonValue,
        /// State the run was in when the tool was invoked.
        state: State,
    },
    /// Payload for [`EventKind::ToolSucceeded`].
    ToolSucceeded {
        /// Name of the invoked tool.
        tool_name: ToolName,
        /// Opaque output payload.
        output: JsonValue,
        /// Invocation duration in milliseconds.
        duration_millis: i64,
        /// Whether the output was served from the result cache.
        cached: bool,
    },
    /// Payload for [`EventKind::ToolFailed`].
    ToolFailed {
        /// Name of the invoked tool.
        tool_name: ToolName,
        /// Human-readable error.
        error: String,
        /// Invocation duration in milliseconds.
        duration_millis: i64,
    },
    /// Payload for [`EventKind::ApprovalRequested`].
    ApprovalRequested {
        /// Name of the tool awaiting approval.
        tool_name: ToolName,
        /// Opaque input payload submitted for review.
        input: JsonValue,
        /// Risk level of the tool, as declared by its annotations.
        risk_level: RiskLevel,
    },
    /// Payload for [`EventKind::ApprovalResolved`].
    ApprovalResolved {
        /// Name of the tool the approval concerned.
        tool_name: ToolName,
        /// Whether the action was approved.
        approved: bool,
        /// Identifier of the approver that resolved the request, if known.
        approver: Option<String>,
        /// Approver-stated rationale.
        reason: String,
    },
    /// Payload for [`EventKind::BudgetConsumed`].
    BudgetConsumed {
        /// Name of the budget consumed.
        budget_name: String,
        /// Amount consumed by this action.
        amount: u64,
        /// Remaining capacity after consumption (`-1` sentinel means unlimited).
        remaining: i64,
    },
    /// Payload for [`EventKind::BudgetExhausted`].
    BudgetExhausted {
        /// Name of the budget that is now exhausted.
        budget_name: String,
    },
    /// Payload for [`EventKind::HumanInputRequested`].
    HumanInputRequested {
        /// Prompt shown to the human operator.
        prompt: String,
    },
    /// Payload for [`EventKind::HumanInputResolved`].
    HumanInputResolved {
        /// The human-supplied response.
        response: JsonValue,
    },
}

impl EventPayload {
    /// Returns the [`EventKind`] this payload corresponds to.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::RunStarted { .. } => EventKind::RunStarted,
            Self::RunCompleted { .. } => EventKind::RunCompleted,
            Self::RunFailed { .. } => EventKind::RunFailed,
            Self::StateTransitioned { .. } => EventKind::StateTransitioned,
            Self::Decision { .. } => EventKind::Decision,
            Self::ToolCalled { .. } => EventKind::ToolCalled,
            Self::ToolSucceeded { .. } => EventKind::ToolSucceeded,
            Self::ToolFailed { .. } => EventKind::ToolFailed,
            Self::ApprovalRequested { .. } => EventKind::ApprovalRequested,
            Self::ApprovalResolved { .. } => EventKind::ApprovalResolved,
            Self::BudgetConsumed { .. } => EventKind::BudgetConsumed,
            Self::BudgetExhausted { .. } => EventKind::BudgetExhausted,
            Self::HumanInputRequested { .. } => EventKind::HumanInputRequested,
            Self::HumanInputResolved { .. } => EventKind::HumanInputResolved,
        }
    }
}

// ============================================================================
// SECTION: Event
// ============================================================================

/// An immutable, append-only ledger record.
///
/// # Invariants
/// - Within a `run_id`, `sequence` is strictly increasing with no gaps,
///   starting at 1.
/// - Once appended, an event's fields never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: EventId,
    /// Run this event belongs to.
    pub run_id: RunId,
    /// Per-run monotonic sequence number, starting at 1.
    pub sequence: u64,
    /// Time the event was recorded.
    pub timestamp: Timestamp,
    /// State the run was in at emission time, if applicable.
    pub state: Option<State>,
    /// Type-discriminated event payload.
    pub payload: EventPayload,
}

impl Event {
    /// Returns this event's [`EventKind`].
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Derives a deterministic [`EventId`] from the event's content.
    ///
    /// Used by the ledger when a caller appends an event without an ID.
    /// Including the sequence number in the hash keeps IDs unique even for
    /// two structurally identical payloads appended back to back.
    #[must_use]
    pub fn derive_id(run_id: &RunId, sequence: u64, timestamp: Timestamp, payload: &EventPayload) -> EventId {
        #[derive(Serialize)]
        struct Seed<'a> {
            run_id: &'a str,
            sequence: u64,
            timestamp: i64,
            payload: &'a EventPayload,
        }
        let seed = Seed {
            run_id: run_id.as_str(),
            sequence,
            timestamp: timestamp.as_unix_millis(),
            payload,
        };
        // Canonicalization cannot fail for the payload shapes defined above;
        // fall back to a sequence-based id if it somehow does.
        hash_canonical_json(&seed).map_or_else(
            |_| EventId::new(format!("{}-{sequence}", run_id.as_str())),
            EventId::new,
        )
    }
}
