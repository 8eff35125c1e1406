// src/core/error.rs
// ============================================================================
// Module: Agent Engine Error Taxonomy
// Description: Crate-wide closed set of error kinds aggregating module errors.
// Purpose: Give hosts one error type to match on while keeping module errors precise.
// Dependencies: crate::runtime::{ledger, knowledge, cache, policy, tool_executor, executor, inspector, registry}
// ============================================================================

//! ## Overview
//! Every module defines its own `thiserror` error enum (see
//! `runtime::ledger::LedgerError`, `runtime::policy::PolicyError`, and so on).
//! [`EngineError`] aggregates them into the closed taxonomy from the
//! specification so a host can match on one type at the outermost boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::runtime::cache::CacheError;
use crate::runtime::executor::RunExecutorError;
use crate::runtime::inspector::InspectorError;
use crate::runtime::knowledge::KnowledgeError;
use crate::runtime::ledger::LedgerError;
use crate::runtime::policy::PolicyError;
use crate::runtime::registry::RegistryError;
use crate::runtime::run_store::RunStoreError;
use crate::runtime::tool_executor::ToolExecutorError;

// ============================================================================
// SECTION: Engine Error
// ============================================================================

/// Crate-wide error taxonomy.
///
/// Variants correspond one-to-one with the closed error kind set named by
/// the specification: `InvalidInput`, `InvalidEvent`, `InvalidId`,
/// `InvalidEmbedding`, `DimensionMismatch`, `NotFound`, `Exists`,
/// `ToolNotEligible`, `TransitionNotAllowed`, `BudgetExceeded`,
/// `ApprovalRequired`, `ApprovalDenied`, `ApprovalTimeout`, `Cancelled`,
/// `Internal`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input failed schema or shape validation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// An event failed to validate before being appended.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    /// An identifier was empty or otherwise malformed.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// An embedding was empty or otherwise malformed.
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),
    /// An embedding's length did not match the store's bound dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension bound by the store.
        expected: usize,
        /// Dimension of the offending embedding.
        actual: usize,
    },
    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The entity already exists under that identifier.
    #[error("already exists: {0}")]
    Exists(String),
    /// The tool is not eligible for invocation in the current state.
    #[error("tool not eligible: {0}")]
    ToolNotEligible(String),
    /// The requested state transition is not legal.
    #[error("transition not allowed: {0}")]
    TransitionNotAllowed(String),
    /// A named budget would be exceeded by the requested consumption.
    #[error("budget exceeded: {0}")]
    BudgetExceeded(String),
    /// The action requires approval that has not yet been granted.
    #[error("approval required: {0}")]
    ApprovalRequired(String),
    /// An approver explicitly denied the action.
    #[error("approval denied: {0}")]
    ApprovalDenied(String),
    /// The approver did not respond within the allotted deadline.
    #[error("approval timed out: {0}")]
    ApprovalTimeout(String),
    /// The run or operation was cancelled.
    #[error("cancelled: {0}")]
    Cancelled(String),
    /// An unrecoverable internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidEvent(msg) => Self::InvalidEvent(msg),
            LedgerError::Cancelled => Self::Cancelled("ledger operation cancelled".to_string()),
            LedgerError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<RunStoreError> for EngineError {
    fn from(err: RunStoreError) -> Self {
        match err {
            RunStoreError::NotFound(id) => Self::NotFound(format!("run {id}")),
            RunStoreError::Exists(id) => Self::Exists(format!("run {id}")),
            RunStoreError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<KnowledgeError> for EngineError {
    fn from(err: KnowledgeError) -> Self {
        match err {
            KnowledgeError::InvalidId => Self::InvalidId("vector id must not be empty".to_string()),
            KnowledgeError::InvalidEmbedding => {
                Self::InvalidEmbedding("embedding must not be empty".to_string())
            }
            KnowledgeError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            KnowledgeError::NotFound(id) => Self::NotFound(format!("vector {id}")),
        }
    }
}

impl From<CacheError> for EngineError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::InvalidKey => Self::InvalidInput("cache key must not be empty".to_string()),
            CacheError::Cancelled => Self::Cancelled("cache operation cancelled".to_string()),
        }
    }
}

impl From<PolicyError> for EngineError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::ToolNotEligible { state, tool } => {
                Self::ToolNotEligible(format!("{tool} is not eligible in state {state:?}"))
            }
            PolicyError::TransitionNotAllowed { from, to } => {
                Self::TransitionNotAllowed(format!("{from:?}->{to:?}"))
            }
            PolicyError::BudgetExceeded { name, .. } => {
                Self::BudgetExceeded(format!("budget {name} exhausted"))
            }
            PolicyError::ApprovalDenied(reason) => Self::ApprovalDenied(reason),
            PolicyError::ApprovalTimeout => {
                Self::ApprovalTimeout("approval request timed out".to_string())
            }
        }
    }
}

impl From<ToolExecutorError> for EngineError {
    fn from(err: ToolExecutorError) -> Self {
        match err {
            ToolExecutorError::ToolNotFound(name) => Self::NotFound(format!("tool {name}")),
            ToolExecutorError::InvalidInput(msg) => Self::InvalidInput(msg),
            ToolExecutorError::Policy(policy_err) => policy_err.into(),
            ToolExecutorError::HandlerFailed(msg) => Self::Internal(msg),
            ToolExecutorError::Ledger(ledger_err) => ledger_err.into(),
        }
    }
}

impl From<RegistryError> for EngineError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ToolExists(name) => Self::Exists(format!("tool {name}")),
            RegistryError::NotFound(name) => Self::NotFound(format!("tool {name}")),
            RegistryError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<RunExecutorError> for EngineError {
    fn from(err: RunExecutorError) -> Self {
        match err {
            RunExecutorError::RunStore(run_store_err) => run_store_err.into(),
            RunExecutorError::Ledger(ledger_err) => ledger_err.into(),
        }
    }
}

impl From<InspectorError> for EngineError {
    fn from(err: InspectorError) -> Self {
        match err {
            InspectorError::RunStore(run_store_err) => run_store_err.into(),
            InspectorError::Ledger(ledger_err) => ledger_err.into(),
        }
    }
}
