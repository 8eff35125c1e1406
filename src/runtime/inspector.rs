// src/runtime/inspector.rs
// ============================================================================
// Module: Agent Engine Inspector
// Description: Read-only timeline and metrics projections over a run.
// Purpose: Give hosts a data shape to render without coupling to any format.
// Dependencies: crate::runtime::{ledger, run_store}
// ============================================================================

//! ## Overview
//! The inspector derives two read-only views from a run's ledger and run
//! record: [`RunTimeline`], a flattened sequence of human-describable steps,
//! and [`RunMetrics`], aggregate counters. Neither view renders to any
//! concrete format (DOT, Mermaid, HTML, Prometheus); producing one is a
//! host concern built on top of these data shapes. Mirrors the teacher's
//! `ScenarioStatus::from_state` projection: a pure function from stored
//! state to a response struct, with no side effects of its own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::event::Event;
use crate::core::event::EventKind;
use crate::core::identifiers::RunId;
use crate::core::state::Run;
use crate::core::state::RunStatus;
use crate::runtime::ledger::Ledger;
use crate::runtime::ledger::LedgerError;
use crate::runtime::run_store::RunStore;
use crate::runtime::run_store::RunStoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by [`Inspector`] operations.
#[derive(Debug, Error)]
pub enum InspectorError {
    /// The run store reported an error.
    #[error(transparent)]
    RunStore(#[from] RunStoreError),
    /// The ledger reported an error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ============================================================================
// SECTION: Timeline
// ============================================================================

/// One entry in a [`RunTimeline`]: an event's sequence, state, and kind,
/// stripped of its full payload so the view stays cheap to serialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Per-run monotonic sequence number.
    pub sequence: u64,
    /// Event kind.
    pub kind: EventKind,
    /// State the run was in when the event was recorded, if applicable.
    pub state: Option<crate::core::state::State>,
    /// Event timestamp.
    pub timestamp: crate::core::time::Timestamp,
}

impl From<&Event> for TimelineEntry {
    fn from(event: &Event) -> Self {
        Self { sequence: event.sequence, kind: event.kind(), state: event.state, timestamp: event.timestamp }
    }
}

/// A run's full event history, flattened into a display-friendly sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTimeline {
    /// Run identifier.
    pub run_id: RunId,
    /// Current run status.
    pub status: RunStatus,
    /// Ordered, oldest-first entries.
    pub entries: Vec<TimelineEntry>,
}

// ============================================================================
// SECTION: Metrics
// ============================================================================

/// Aggregate counters derived from a run's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Total events recorded for this run.
    pub event_count: usize,
    /// Number of `ToolCalled` events.
    pub tool_calls: usize,
    /// Number of `ToolSucceeded` events.
    pub tool_successes: usize,
    /// Number of `ToolFailed` events.
    pub tool_failures: usize,
    /// Number of `StateTransitioned` events.
    pub transitions: usize,
    /// Number of `ApprovalRequested` events.
    pub approvals_requested: usize,
    /// Number of `BudgetExhausted` events.
    pub budgets_exhausted: usize,
    /// Run duration in milliseconds (`0` while still running).
    pub duration_millis: i64,
}

impl RunMetrics {
    fn from_parts(events: &[Event], run: &Run) -> Self {
        let count_kind = |kind: EventKind| events.iter().filter(|e| e.kind() == kind).count();
        let duration_millis =
            if run.end_time.is_zero() { 0 } else { run.end_time.as_unix_millis() - run.start_time.as_unix_millis() };
        Self {
            event_count: events.len(),
            tool_calls: count_kind(EventKind::ToolCalled),
            tool_successes: count_kind(EventKind::ToolSucceeded),
            tool_failures: count_kind(EventKind::ToolFailed),
            transitions: count_kind(EventKind::StateTransitioned),
            approvals_requested: count_kind(EventKind::ApprovalRequested),
            budgets_exhausted: count_kind(EventKind::BudgetExhausted),
            duration_millis,
        }
    }
}

// ============================================================================
// SECTION: Inspector
// ============================================================================

/// Read-only projections over a run's ledger and run record.
pub struct Inspector {
    run_store: Arc<RunStore>,
    ledger: Arc<Ledger>,
}

impl Inspector {
    /// Builds an inspector over the given run store and ledger.
    #[must_use]
    pub fn new(run_store: Arc<RunStore>, ledger: Arc<Ledger>) -> Self {
        Self { run_store, ledger }
    }

    /// Returns the flattened event timeline for `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`InspectorError::RunStore`] if no such run exists, or
    /// [`InspectorError::Ledger`] if the ledger cannot be read.
    pub fn timeline(&self, run_id: &RunId) -> Result<RunTimeline, InspectorError> {
        let run = self.run_store.get(run_id)?;
        let events = self.ledger.load_events(run_id)?;
        let entries = events.iter().map(TimelineEntry::from).collect();
        Ok(RunTimeline { run_id: run_id.clone(), status: run.status, entries })
    }

    /// Returns aggregate metrics for `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`InspectorError::RunStore`] if no such run exists, or
    /// [`InspectorError::Ledger`] if the ledger cannot be read.
    pub fn metrics(&self, run_id: &RunId) -> Result<RunMetrics, InspectorError> {
        let run = self.run_store.get(run_id)?;
        let events = self.ledger.load_events(run_id)?;
        Ok(RunMetrics::from_parts(&events, &run))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
