// src/core/tool.rs
// ============================================================================
// Module: Agent Engine Tool Model
// Description: Tool annotations and the registry's view of a tool's contract.
// Purpose: Carry risk/caching metadata that the policy and tool executor consult.
// Dependencies: crate::core::event::RiskLevel, serde
// ============================================================================

//! ## Overview
//! A tool's [`ToolAnnotations`] are declared once at registration and read by
//! the policy layer (approval rules consult `destructive`/`risk_level`) and
//! the tool executor (caching consults `cacheable`/`idempotent`). The
//! handler itself is an external collaborator; see `interfaces::Tool`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::event::RiskLevel;

// ============================================================================
// SECTION: Tool Annotations
// ============================================================================

/// Declarative metadata about a tool's behavior, read by the policy layer and
/// the tool executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAnnotations {
    /// The tool has no side effects.
    pub read_only: bool,
    /// The tool has side effects that are hard to reverse.
    pub destructive: bool,
    /// Calling the tool more than once with the same input is safe.
    pub idempotent: bool,
    /// Results may be served from the result cache.
    pub cacheable: bool,
    /// Declared risk level, consulted by the default approval policy.
    pub risk_level: RiskLevel,
}

impl ToolAnnotations {
    /// Annotations for a read-only, idempotent, cacheable, low-risk tool —
    /// the common case for inspection tools like `list_dir` or `read_file`.
    #[must_use]
    pub const fn read_only_cacheable() -> Self {
        Self {
            read_only: true,
            destructive: false,
            idempotent: true,
            cacheable: true,
            risk_level: RiskLevel::Low,
        }
    }

    /// Annotations for a destructive, non-idempotent, high-risk tool like
    /// `delete_file`.
    #[must_use]
    pub const fn destructive() -> Self {
        Self {
            read_only: false,
            destructive: true,
            idempotent: false,
            cacheable: false,
            risk_level: RiskLevel::High,
        }
    }
}

impl Default for ToolAnnotations {
    fn default() -> Self {
        Self {
            read_only: false,
            destructive: false,
            idempotent: false,
            cacheable: false,
            risk_level: RiskLevel::Medium,
        }
    }
}

// ============================================================================
// SECTION: Tool Descriptor
// ============================================================================

/// The registry's view of a tool: its name, schemas, and annotations.
///
/// The handler itself is supplied separately (see
/// `runtime::registry::ToolRegistry::register`) because it is an external
/// collaborator (`interfaces::Tool`), not serializable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique name within a registry.
    pub name: crate::core::identifiers::ToolName,
    /// JSON Schema describing valid input payloads.
    pub input_schema: serde_json::Value,
    /// JSON Schema describing output payloads, for documentation purposes.
    pub output_schema: serde_json::Value,
    /// Risk/caching annotations.
    pub annotations: ToolAnnotations,
}
