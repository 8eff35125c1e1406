// src/runtime/policy/eligibility.rs
// ============================================================================
// Module: Agent Engine Eligibility Policy
// Description: Mapping of state to the set of tool names permitted in it.
// Purpose: Answer "is this tool callable from this state" before dispatch.
// Dependencies: crate::core::{state::State, identifiers::ToolName}
// ============================================================================

//! ## Overview
//! Eligibility is a pure read operation: unknown states or tools are simply
//! not allowed, never an error. `Act` is conventionally the only state
//! configured with side-effect-causing tools, but this module enforces
//! nothing beyond what the configured map says.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;

use crate::core::identifiers::ToolName;
use crate::core::state::State;

// ============================================================================
// SECTION: Eligibility
// ============================================================================

/// Read-mostly mapping from state to the tools permitted in it.
#[derive(Debug, Clone, Default)]
pub struct Eligibility {
    allowed: HashMap<State, HashSet<ToolName>>,
}

impl Eligibility {
    /// Creates an eligibility table with no tools allowed anywhere.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an eligibility table from `(state, tool names)` pairs.
    #[must_use]
    pub fn from_entries<I, N>(entries: I) -> Self
    where
        I: IntoIterator<Item = (State, N)>,
        N: IntoIterator<Item = ToolName>,
    {
        let mut allowed = HashMap::new();
        for (state, names) in entries {
            allowed.entry(state).or_insert_with(HashSet::new).extend(names);
        }
        Self { allowed }
    }

    /// Grants `tool_name` eligibility in `state`.
    pub fn allow(&mut self, state: State, tool_name: ToolName) {
        self.allowed.entry(state).or_insert_with(HashSet::new).insert(tool_name);
    }

    /// Returns whether `tool_name` is eligible to run in `state`.
    #[must_use]
    pub fn is_allowed(&self, state: State, tool_name: &ToolName) -> bool {
        self.allowed.get(&state).is_some_and(|tools| tools.contains(tool_name))
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

    #[test]
    fn unconfigured_state_is_never_allowed() {
        let eligibility = Eligibility::new();
        assert!(!eligibility.is_allowed(State::Act, &ToolName::new("write_file")));
    }

    #[test]
    fn allowed_tool_in_configured_state() {
        let mut eligibility = Eligibility::new();
        eligibility.allow(State::Act, ToolName::new("write_file"));
        assert!(eligibility.is_allowed(State::Act, &ToolName::new("write_file")));
        assert!(!eligibility.is_allowed(State::Explore, &ToolName::new("write_file")));
    }

    #[test]
    fn from_entries_builds_table() {
        let eligibility = Eligibility::from_entries([
            (State::Explore, vec![ToolName::new("list_dir"), ToolName::new("read_file")]),
            (State::Act, vec![ToolName::new("write_file")]),
        ]);
        assert!(eligibility.is_allowed(State::Explore, &ToolName::new("list_dir")));
        assert!(!eligibility.is_allowed(State::Explore, &ToolName::new("write_file")));
    }
}
