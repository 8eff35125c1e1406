// src/runtime/policy/transitions.rs
// ============================================================================
// Module: Agent Engine Transition Policy
// Description: Mapping of state to the set of states legally reachable from it.
// Purpose: Gate Transition decisions before the executor mutates CurrentState.
// Dependencies: crate::core::state::State
// ============================================================================

//! ## Overview
//! Terminal states have empty outgoing sets by construction. [`Transitions`]
//! is a pure lookup; [`Transitions::default`] implements the specification's
//! canonical graph (§6 "Configuration surface").

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;

use crate::core::state::State;

// ============================================================================
// SECTION: Transitions
// ============================================================================

/// Read-mostly mapping from state to the states legally reachable in one
/// step.
#[derive(Debug, Clone)]
pub struct Transitions {
    edges: HashMap<State, HashSet<State>>,
}

impl Transitions {
    /// Builds a transition graph from `(from, reachable states)` pairs.
    #[must_use]
    pub fn from_edges<I, N>(edges: I) -> Self
    where
        I: IntoIterator<Item = (State, N)>,
        N: IntoIterator<Item = State>,
    {
        let mut table = HashMap::new();
        for (from, to_states) in edges {
            table.entry(from).or_insert_with(HashSet::new).extend(to_states);
        }
        Self { edges: table }
    }

    /// Returns whether moving from `from` to `to` is legal. An unknown
    /// `from` state, or a terminal `from` state, is never legal.
    #[must_use]
    pub fn can_transition(&self, from: State, to: State) -> bool {
        if from.is_terminal() {
            return false;
        }
        self.edges.get(&from).is_some_and(|reachable| reachable.contains(&to))
    }
}

impl Default for Transitions {
    /// The specification's `DefaultTransitions` graph: any non-terminal
    /// state may also transition to `Failed`.
    fn default() -> Self {
        Self::from_edges([
            (State::Intake, vec![State::Explore, State::Failed]),
            (State::Explore, vec![State::Decide, State::Failed]),
            (State::Decide, vec![State::Act, State::Done, State::Failed]),
            (State::Act, vec![State::Validate, State::Failed]),
            (State::Validate, vec![State::Done, State::Explore, State::Failed]),
        ])
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
