// src/core/query.rs
// ============================================================================
// Module: Agent Engine Ledger Query Filter
// Description: Conjunctive filter shape for ledger queries.
// Purpose: Give Ledger::query a single, serializable filter argument.
// Dependencies: crate::core::{event::EventKind, time::Timestamp}, serde
// ============================================================================

//! ## Overview
//! [`EventFilter`] filters are conjunctive: every populated field must match.
//! Sorting is always by sequence ascending; offset/limit are applied after
//! filtering, matching the specification's query contract.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::event::EventKind;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Event Filter
// ============================================================================

/// Conjunctive filter for [`crate::runtime::ledger::Ledger::query`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Restrict results to these event kinds; empty means no restriction.
    pub types: Vec<EventKind>,
    /// Restrict results to events at or after this time.
    pub from_time: Option<Timestamp>,
    /// Restrict results to events at or before this time.
    pub to_time: Option<Timestamp>,
    /// Number of matching events to skip before collecting results.
    pub offset: usize,
    /// Maximum number of events to return; `None` means no limit.
    pub limit: Option<usize>,
}

impl EventFilter {
    /// Returns whether an event's kind/timestamp match this filter's
    /// type/time predicates (offset/limit are applied by the caller after
    /// collecting all matches).
    #[must_use]
    pub fn matches(&self, kind: EventKind, timestamp: Timestamp) -> bool {
        if !self.types.is_empty() && !self.types.contains(&kind) {
            return false;
        }
        if let Some(from) = self.from_time
            && timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to_time
            && timestamp > to
        {
            return false;
        }
        true
    }
}
