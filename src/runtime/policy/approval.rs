// src/runtime/policy/approval.rs
// ============================================================================
// Module: Agent Engine Approval Policy
// Description: Static rules over tool annotations combined with a runtime Approver.
// Purpose: Decide whether a CallTool decision must clear human/automated approval.
// Dependencies: crate::core::{tool::ToolAnnotations, identifiers::ToolName}
// ============================================================================

//! ## Overview
//! [`ApprovalPolicy`] decides *whether* approval is required from static
//! configuration (destructive/high-risk rules, explicit require/exempt
//! lists); the actual grant/deny decision is delegated to a runtime
//! [`crate::interfaces::Approver`]. Exempt-list membership always overrides
//! the require rules.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;

use crate::core::identifiers::ToolName;
use crate::core::tool::ToolAnnotations;

// ============================================================================
// SECTION: Approval Policy
// ============================================================================

/// Static configuration deciding which tool calls require approval before
/// the registered [`crate::interfaces::Approver`] is consulted.
#[derive(Debug, Clone)]
pub struct ApprovalPolicy {
    /// Require approval for any tool annotated `destructive`.
    pub require_for_destructive: bool,
    /// Require approval for any tool annotated `risk_level = High`.
    pub require_for_high_risk: bool,
    /// Tools that always require approval, regardless of annotations.
    pub require_list: HashSet<ToolName>,
    /// Tools that never require approval. Takes precedence over every other
    /// rule.
    pub exempt_list: HashSet<ToolName>,
}

impl ApprovalPolicy {
    /// Returns whether `tool_name` with `annotations` requires approval
    /// before execution.
    #[must_use]
    pub fn requires_approval(&self, tool_name: &ToolName, annotations: ToolAnnotations) -> bool {
        if self.exempt_list.contains(tool_name) {
            return false;
        }
        if self.require_list.contains(tool_name) {
            return true;
        }
        (self.require_for_destructive && annotations.destructive)
            || (self.require_for_high_risk && annotations.risk_level == crate::core::event::RiskLevel::High)
    }
}

impl Default for ApprovalPolicy {
    /// The specification's `DefaultApprovalPolicy`: require approval for
    /// destructive and high-risk tools.
    fn default() -> Self {
        Self {
            require_for_destructive: true,
            require_for_high_risk: true,
            require_list: HashSet::new(),
            exempt_list: HashSet::new(),
        }
    }
}

/// Default approval wait before a request is treated as timed out, in
/// milliseconds (5 minutes, per the specification's `ApprovalTimeout`).
pub const DEFAULT_APPROVAL_TIMEOUT_MILLIS: u64 = 5 * 60 * 1000;

// ============================================================================
// SECTION: Tests
// ============================================================================
