// src/core/budget.rs
// ============================================================================
// Module: Agent Engine Budget Model
// Description: Named consumable counters with a limit/consumed pair.
// Purpose: Define the data shape the policy layer's budget gate operates on.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A budget is a mapping of name to `{limit, consumed}`. The absence of a
//! named budget means that name is unlimited. Atomic `consume`/`reset`
//! operations live in `runtime::policy::budget` since they require
//! synchronization; this module only defines the data shape.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Budget Limit
// ============================================================================

/// A single named budget's limit and current consumption.
///
/// # Invariants
/// - `0 <= consumed <= limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLimit {
    /// Maximum total consumption allowed.
    pub limit: u64,
    /// Amount consumed so far.
    pub consumed: u64,
}

impl BudgetLimit {
    /// Creates a new budget limit with zero consumption.
    #[must_use]
    pub const fn new(limit: u64) -> Self {
        Self { limit, consumed: 0 }
    }

    /// Returns whether `consumed == limit`.
    #[must_use]
    pub const fn is_exhausted(self) -> bool {
        self.consumed >= self.limit
    }

    /// Returns remaining capacity, or `None` if consuming `n` more would
    /// exceed the limit.
    #[must_use]
    pub const fn can_consume(self, n: u64) -> bool {
        match self.consumed.checked_add(n) {
            Some(total) => total <= self.limit,
            None => false,
        }
    }
}

/// Sentinel returned by `Remaining` for a budget with no configured limit.
pub const UNLIMITED_SENTINEL: i64 = -1;
