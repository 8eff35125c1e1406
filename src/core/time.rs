// src/core/time.rs
// ============================================================================
// Module: Agent Engine Time Model
// Description: Canonical timestamp representation and clock abstraction.
// Purpose: Keep run/event timestamps explicit and injectable for replay and tests.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The engine never calls `SystemTime::now()` from inside the ledger, policy,
//! or executor modules. All timestamps flow through a [`Clock`] supplied by
//! the host, so a deterministic [`FixedClock`] can stand in for tests and a
//! [`SystemClock`] can stand in for production without touching engine logic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp used in events, run metadata, and cache entries.
///
/// # Invariants
/// - Represents milliseconds since the Unix epoch.
/// - Zero is reserved to mean "unset" for optional timestamp fields
///   (`Run.EndTime`, `CacheEntry.ExpiresAt`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The sentinel "unset" timestamp (zero).
    pub const ZERO: Self = Self(0);

    /// Creates a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns whether the timestamp is the unset sentinel.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of wall-clock or logical time for the engine.
///
/// The engine itself never reads the system clock directly; every component
/// that needs "now" takes a `&dyn Clock` (or a generic `C: Clock`) so callers
/// can substitute a deterministic clock in tests.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Clock backed by the operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
        Timestamp::from_unix_millis(millis)
    }
}

/// Deterministic, manually-advanced clock for tests and replay.
#[derive(Debug, Default)]
pub struct FixedClock {
    /// Current logical time, in milliseconds.
    millis: AtomicI64,
}

impl FixedClock {
    /// Creates a fixed clock starting at the given unix milliseconds.
    #[must_use]
    pub const fn new(start_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(start_millis),
        }
    }

    /// Advances the clock by the given number of milliseconds and returns the
    /// new timestamp.
    pub fn advance(&self, delta_millis: i64) -> Timestamp {
        let next = self.millis.fetch_add(delta_millis, Ordering::SeqCst) + delta_millis;
        Timestamp::from_unix_millis(next)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.millis.load(Ordering::SeqCst))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
