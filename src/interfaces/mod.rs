// src/interfaces/mod.rs
// ============================================================================
// Module: Agent Engine Interfaces
// Description: Backend-agnostic interfaces for planning, approval, and tools.
// Purpose: Define the contract surfaces external collaborators must implement.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the engine integrates with external systems —
//! LLM/planner providers, human-or-chat approval channels, and concrete tool
//! implementations — without embedding backend-specific details into the
//! executor. Implementations must honor cancellation and return within the
//! deadline the engine supplies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::core::Decision;
use crate::core::Event;
use crate::core::RiskLevel;
use crate::core::RunId;
use crate::core::State;
use crate::core::Timestamp;
use crate::core::ToolName;

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Lightweight cooperative cancellation signal threaded through every
/// suspension point in the driver loop (planner, approver, tool handler,
/// ledger append).
///
/// This stands in for the specification's `ctx`/context-cancellation
/// parameter. It intentionally does not carry a deadline of its own —
/// per-call timeouts (e.g. the approval timeout) are modeled as explicit
/// arguments so policy around them stays visible at call sites.
#[derive(Debug, Clone)]
pub struct CancelToken {
    /// Shared cancellation flag.
    inner: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl CancelToken {
    /// Creates a new, not-yet-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Marks the token cancelled. Idempotent.
    pub fn cancel(&self) {
        self.inner.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Returns whether the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Planner
// ============================================================================

/// Recent ledger context offered to the planner, bounded to a configurable
/// window so prompt size stays bounded. The ledger itself remains complete;
/// only the context passed to `Plan` is windowed.
#[derive(Debug, Clone)]
pub struct PlannerContext {
    /// Identifier of the run being planned for.
    pub run_id: RunId,
    /// The run's current state.
    pub current_state: State,
    /// The most recent events for this run, oldest first, truncated to the
    /// planner's configured window.
    pub recent_ledger: Vec<Event>,
}

/// Errors a planner may return from [`Planner::plan`].
#[derive(Debug, Error)]
pub enum PlannerError {
    /// The planner reported an error.
    #[error("planner error: {0}")]
    Failed(String),
    /// The operation was cancelled before the planner responded.
    #[error("planner call cancelled")]
    Cancelled,
}

/// Pluggable decision-making collaborator consulted once per executor step.
///
/// The core does not interpret the planner's internal reasoning; its output
/// need only be a valid [`Decision`]. Concrete LLM-backed adapters live
/// outside this crate.
pub trait Planner: Send + Sync {
    /// Produces the next decision for a run given its current state and
    /// recent ledger context.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError`] when the planner fails or the call is
    /// cancelled via `cancel`.
    fn plan(&self, context: &PlannerContext, cancel: &CancelToken) -> Result<Decision, PlannerError>;
}

// ============================================================================
// SECTION: Approver
// ============================================================================

/// Request submitted to an [`Approver`] before a gated tool call proceeds.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    /// Run the request concerns.
    pub run_id: RunId,
    /// Tool awaiting approval.
    pub tool_name: ToolName,
    /// Opaque input payload submitted for review.
    pub input: JsonValue,
    /// Planner-stated rationale for the call.
    pub reason: String,
    /// Declared risk level of the tool.
    pub risk_level: RiskLevel,
    /// Time the request was issued.
    pub timestamp: Timestamp,
}

/// Outcome of an approval request.
#[derive(Debug, Clone)]
pub struct ApprovalResponse {
    /// Whether the action was approved.
    pub approved: bool,
    /// Identifier of the approver that resolved the request.
    pub approver: String,
    /// Approver-stated rationale.
    pub reason: String,
    /// Time the request was resolved.
    pub timestamp: Timestamp,
}

/// Errors an approver may return from [`Approver::approve`].
#[derive(Debug, Error)]
pub enum ApproverError {
    /// The approver reported an error.
    #[error("approver error: {0}")]
    Failed(String),
    /// The approver did not respond within the supplied deadline.
    #[error("approval timed out")]
    TimedOut,
    /// The operation was cancelled before the approver responded.
    #[error("approval call cancelled")]
    Cancelled,
}

/// Out-of-process approval channel (human-in-the-loop, chat-based, or
/// automated policy service) consulted by the tool executor before a
/// gated action proceeds.
pub trait Approver: Send + Sync {
    /// Resolves an approval request, honoring `deadline_millis` and
    /// `cancel`.
    ///
    /// # Errors
    ///
    /// Returns [`ApproverError`] when the approver fails, times out, or the
    /// call is cancelled.
    fn approve(
        &self,
        request: &ApprovalRequest,
        deadline_millis: u64,
        cancel: &CancelToken,
    ) -> Result<ApprovalResponse, ApproverError>;
}

// ============================================================================
// SECTION: Tool Handler
// ============================================================================

/// Result of a successful tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Opaque output payload.
    pub output: JsonValue,
}

/// Errors a tool handler may return from [`Tool::execute`].
#[derive(Debug, Error)]
pub enum ToolError {
    /// The handler reported an error.
    #[error("tool handler error: {0}")]
    Failed(String),
    /// The operation was cancelled before the handler completed.
    #[error("tool call cancelled")]
    Cancelled,
}

/// A named, schema-validated side-effect (or side-effect-free) operation
/// invocable by a decision.
///
/// Input has already been validated against the tool's declared input
/// schema by the time `execute` is called; the handler may assume validity.
pub trait Tool: Send + Sync {
    /// Executes the tool against a pre-validated input payload.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when the handler fails or is cancelled.
    fn execute(&self, input: &JsonValue, cancel: &CancelToken) -> Result<ToolOutcome, ToolError>;
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

    #[test]
    fn cancel_token_starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }
}
