// src/runtime/policy/mod.rs
// ============================================================================
// Module: Agent Engine Policy Gate
// Description: Composes eligibility, transitions, budget, and approval checks.
// Purpose: Give the tool executor and run executor one gate to consult.
// Dependencies: crate::runtime::policy::{eligibility, transitions, budget, approval}
// ============================================================================

//! ## Overview
//! [`Policy`] composes the four independently-configured structures named by
//! the specification's §4.3 into the single gate the tool executor and run
//! executor consult. The composite check order for a `CallTool` decision is
//! owned by `runtime::tool_executor`, which calls into this module's pieces
//! in sequence; `Policy` itself only exposes the individual checks plus the
//! shared [`PolicyError`] type they report through.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod approval;
pub mod budget;
pub mod eligibility;
pub mod transitions;

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::identifiers::BudgetName;
use crate::core::identifiers::ToolName;
use crate::core::state::State;

pub use approval::ApprovalPolicy;
pub use approval::DEFAULT_APPROVAL_TIMEOUT_MILLIS;
pub use budget::Budget;
pub use eligibility::Eligibility;
pub use transitions::Transitions;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors reported by the composite policy gate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// The tool is not eligible for invocation in the current state.
    #[error("tool {tool} is not eligible in state {state:?}")]
    ToolNotEligible {
        /// State the call was attempted in.
        state: State,
        /// Tool that was not eligible.
        tool: ToolName,
    },
    /// The requested state transition is not legal.
    #[error("transition not allowed: {from:?} -> {to:?}")]
    TransitionNotAllowed {
        /// Source state.
        from: State,
        /// Attempted target state.
        to: State,
    },
    /// The named budget would be exceeded by the requested consumption.
    #[error("budget exceeded: {name}")]
    BudgetExceeded {
        /// Name of the exhausted budget.
        name: BudgetName,
        /// Remaining capacity before the failed consumption.
        remaining: u64,
    },
    /// An approver explicitly denied the action.
    #[error("approval denied: {0}")]
    ApprovalDenied(String),
    /// The approver did not respond within the allotted deadline.
    #[error("approval request timed out")]
    ApprovalTimeout,
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Bundles the four independently-configured policy structures behind one
/// handle.
pub struct Policy {
    /// Which tools are permitted in which states.
    pub eligibility: Eligibility,
    /// Which state-to-state transitions are legal.
    pub transitions: Transitions,
    /// Atomically-accounted named consumables.
    pub budget: Budget,
    /// Static rules deciding which calls require approval.
    pub approval: ApprovalPolicy,
}

impl Policy {
    /// Builds a policy gate from its four components.
    #[must_use]
    pub fn new(eligibility: Eligibility, transitions: Transitions, budget: Budget, approval: ApprovalPolicy) -> Self {
        Self { eligibility, transitions, budget, approval }
    }

    /// Checks `CanTransition(from, to)`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::TransitionNotAllowed`] if the transition is
    /// not legal.
    pub fn check_transition(&self, from: State, to: State) -> Result<(), PolicyError> {
        if self.transitions.can_transition(from, to) {
            Ok(())
        } else {
            Err(PolicyError::TransitionNotAllowed { from, to })
        }
    }

    /// Checks `IsAllowed(state, tool_name)`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::ToolNotEligible`] if the tool is not eligible
    /// in `state`.
    pub fn check_eligible(&self, state: State, tool_name: &ToolName) -> Result<(), PolicyError> {
        if self.eligibility.is_allowed(state, tool_name) {
            Ok(())
        } else {
            Err(PolicyError::ToolNotEligible { state, tool: tool_name.clone() })
        }
    }
}

impl Default for Policy {
    /// The specification's configuration surface defaults: the canonical
    /// transition graph, an unlimited budget, the default approval policy,
    /// and no tools eligible anywhere (hosts must configure eligibility
    /// explicitly — there is no sensible default).
    fn default() -> Self {
        Self::new(Eligibility::default(), Transitions::default(), Budget::default(), ApprovalPolicy::default())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
