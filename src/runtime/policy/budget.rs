// src/runtime/policy/budget.rs
// ============================================================================
// Module: Agent Engine Budget Gate
// Description: Atomic accounting over named consumable counters.
// Purpose: Guarantee Consumed never exceeds Limit even under concurrent calls.
// Dependencies: crate::core::{budget::BudgetLimit, identifiers::BudgetName}
// ============================================================================

//! ## Overview
//! `Budget` wraps a map of [`BudgetName`] to [`BudgetLimit`] behind a single
//! mutex so `consume` is atomic: either it increments `consumed` by the
//! requested amount and succeeds, or it leaves state unchanged and fails.
//! Absence of a named budget means that name is unlimited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::budget::BudgetLimit;
use crate::core::budget::UNLIMITED_SENTINEL;
use crate::core::identifiers::BudgetName;

// ============================================================================
// SECTION: Budget
// ============================================================================

/// Atomically-accounted set of named budgets.
pub struct Budget {
    limits: Mutex<HashMap<BudgetName, BudgetLimit>>,
}

impl Budget {
    /// Creates a budget gate from configured named limits. Names absent from
    /// `limits` are treated as unlimited.
    #[must_use]
    pub fn new(limits: HashMap<BudgetName, u64>) -> Self {
        Self {
            limits: Mutex::new(limits.into_iter().map(|(name, limit)| (name, BudgetLimit::new(limit))).collect()),
        }
    }

    /// Creates a budget gate with no configured limits (every name
    /// unlimited).
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(HashMap::new())
    }

    /// Returns whether consuming `n` more of `name` would stay within its
    /// limit. Always `true` for an unconfigured name.
    #[must_use]
    pub fn can_consume(&self, name: &BudgetName, n: u64) -> bool {
        let Ok(limits) = self.limits.lock() else { return false };
        limits.get(name).is_none_or(|limit| limit.can_consume(n))
    }

    /// Atomically consumes `n` of the named budget.
    ///
    /// # Errors
    ///
    /// Returns `Err(remaining_limit)` if consuming `n` would exceed the
    /// configured limit; state is left unchanged in that case.
    pub fn consume(&self, name: &BudgetName, n: u64) -> Result<i64, BudgetLimit> {
        let mut limits = self.limits.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(limit) = limits.get_mut(name) else {
            return Ok(UNLIMITED_SENTINEL);
        };
        if !limit.can_consume(n) {
            return Err(*limit);
        }
        limit.consumed += n;
        Ok(i64::try_from(limit.limit - limit.consumed).unwrap_or(i64::MAX))
    }

    /// Returns the remaining capacity for `name`, or the unlimited sentinel
    /// (`-1`) if `name` is unconfigured.
    #[must_use]
    pub fn remaining(&self, name: &BudgetName) -> i64 {
        let Ok(limits) = self.limits.lock() else { return UNLIMITED_SENTINEL };
        limits.get(name).map_or(UNLIMITED_SENTINEL, |limit| i64::try_from(limit.limit - limit.consumed).unwrap_or(i64::MAX))
    }

    /// Returns whether any configured budget has reached its limit.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        let Ok(limits) = self.limits.lock() else { return false };
        limits.values().any(|limit| limit.is_exhausted())
    }

    /// Returns the names of every configured budget currently exhausted.
    #[must_use]
    pub fn exhausted_names(&self) -> Vec<BudgetName> {
        let Ok(limits) = self.limits.lock() else { return Vec::new() };
        limits.iter().filter(|(_, limit)| limit.is_exhausted()).map(|(name, _)| name.clone()).collect()
    }

    /// Resets every configured budget's consumption to zero, preserving
    /// limits.
    pub fn reset(&self) {
        if let Ok(mut limits) = self.limits.lock() {
            for limit in limits.values_mut() {
                limit.consumed = 0;
            }
        }
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self::unlimited()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
