// src/runtime/ledger.rs
// ============================================================================
// Module: Agent Engine Ledger / Event Store
// Description: Append-only per-run event log with subscriber fan-out.
// Purpose: Assign sequence numbers, persist events, and deliver them live.
// Dependencies: crate::core::{event, query, identifiers, time}, tokio::sync::mpsc
// ============================================================================

//! ## Overview
//! The ledger accepts batches of events, assigns each a contiguous per-run
//! sequence number under a per-run lock, persists them in arrival order, and
//! fans the appended events out to any active subscribers for that run.
//! Delivery to subscribers is best-effort: a full channel drops the event
//! for that subscriber only, never for the persisted log.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::core::event::Event;
use crate::core::event::EventPayload;
use crate::core::identifiers::RunId;
use crate::core::query::EventFilter;
use crate::core::time::Clock;
use crate::core::time::Timestamp;
use crate::interfaces::CancelToken;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by [`Ledger`] operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An event in the batch failed validation; the whole batch was rejected.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    /// The operation was cancelled before it completed.
    #[error("ledger operation cancelled")]
    Cancelled,
    /// An unrecoverable internal error occurred (e.g. lock poisoning).
    #[error("internal ledger error: {0}")]
    Internal(String),
}

// ============================================================================
// SECTION: Subscription
// ============================================================================

/// Default bounded capacity for a subscriber's event channel.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// A live subscription to a run's event stream.
///
/// Dropping the handle releases the subscriber slot; the ledger detects this
/// lazily the next time it attempts delivery and prunes the closed sender.
pub struct Subscription {
    receiver: mpsc::Receiver<Event>,
}

impl Subscription {
    /// Awaits the next event for this subscription, or `None` once the
    /// ledger closes the channel (run deleted) or the subscriber is pruned.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}

/// Per-run bookkeeping: the next sequence number to assign and the set of
/// live subscriber senders.
struct RunLog {
    events: Vec<Event>,
    next_sequence: u64,
    subscribers: Vec<mpsc::Sender<Event>>,
}

impl RunLog {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            next_sequence: 1,
            subscribers: Vec::new(),
        }
    }

    /// Delivers `event` to every live subscriber, dropping the event for any
    /// subscriber whose channel is full or closed. Closed senders are pruned
    /// so the subscriber list does not grow unbounded.
    fn fan_out(&mut self, event: &Event) {
        self.subscribers.retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => !sender.is_closed(),
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Append-only, per-run event store with live subscription fan-out.
///
/// Each run has its own lock so appends to different runs never contend.
/// This is the in-memory reference implementation named by the
/// specification's non-goals; durable backends implement the same
/// operations against persistent storage.
pub struct Ledger {
    clock: Arc<dyn Clock>,
    runs: Mutex<HashMap<RunId, Arc<Mutex<RunLog>>>>,
    subscriber_capacity: usize,
}

impl Ledger {
    /// Creates a new, empty ledger using `clock` to default event timestamps
    /// when a caller does not supply one.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            runs: Mutex::new(HashMap::new()),
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
        }
    }

    /// Creates a new ledger with a non-default subscriber channel capacity.
    #[must_use]
    pub fn with_subscriber_capacity(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            clock,
            runs: Mutex::new(HashMap::new()),
            subscriber_capacity: capacity.max(1),
        }
    }

    fn run_log(&self, run_id: &RunId) -> Result<Arc<Mutex<RunLog>>, LedgerError> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| LedgerError::Internal("ledger run table lock poisoned".to_string()))?;
        Ok(Arc::clone(runs.entry(run_id.clone()).or_insert_with(|| Arc::new(Mutex::new(RunLog::new())))))
    }

    /// Appends a batch of draft events for a single run, assigning sequence
    /// numbers and IDs as needed.
    ///
    /// `drafts` carries `(timestamp, state, payload)` triples; the ledger
    /// assigns `sequence` and derives `id` via [`Event::derive_id`] when not
    /// otherwise tracked. Appending an empty batch is a no-op success.
    /// Validation failures reject the whole batch before anything is
    /// persisted.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidEvent`] if any payload is malformed (the
    /// closed [`EventPayload`] enum makes this unreachable today, but the
    /// check is kept for forward-compatible validation), or
    /// [`LedgerError::Cancelled`] if `cancel` fires before persistence.
    pub fn append(
        &self,
        run_id: &RunId,
        drafts: Vec<(Timestamp, Option<crate::core::state::State>, EventPayload)>,
        cancel: &CancelToken,
    ) -> Result<Vec<Event>, LedgerError> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }

        let log = self.run_log(run_id)?;
        let mut log = log
            .lock()
            .map_err(|_| LedgerError::Internal("run log lock poisoned".to_string()))?;

        let mut built = Vec::with_capacity(drafts.len());
        let mut sequence = log.next_sequence;
        for (timestamp, state, payload) in drafts {
            let id = Event::derive_id(run_id, sequence, timestamp, &payload);
            built.push(Event {
                id,
                run_id: run_id.clone(),
                sequence,
                timestamp,
                state,
                payload,
            });
            sequence += 1;
        }

        log.next_sequence = sequence;
        for event in &built {
            log.events.push(event.clone());
        }
        for event in &built {
            log.fan_out(event);
        }
        Ok(built)
    }

    /// Appends a single event built from the engine's clock. Convenience
    /// wrapper over [`Ledger::append`] for the common one-event case.
    ///
    /// # Errors
    ///
    /// See [`Ledger::append`].
    pub fn append_one(
        &self,
        run_id: &RunId,
        state: Option<crate::core::state::State>,
        payload: EventPayload,
        cancel: &CancelToken,
    ) -> Result<Event, LedgerError> {
        let now = self.clock.now();
        let mut events = self.append(run_id, vec![(now, state, payload)], cancel)?;
        events.pop().ok_or_else(|| LedgerError::Internal("append_one produced no event".to_string()))
    }

    /// Returns all events for `run_id` in sequence order. Unknown runs
    /// return an empty vector rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Internal`] only if an internal lock is
    /// poisoned.
    pub fn load_events(&self, run_id: &RunId) -> Result<Vec<Event>, LedgerError> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| LedgerError::Internal("ledger run table lock poisoned".to_string()))?;
        let Some(log) = runs.get_mut(run_id) else {
            return Ok(Vec::new());
        };
        let log = log.lock().map_err(|_| LedgerError::Internal("run log lock poisoned".to_string()))?;
        Ok(log.events.clone())
    }

    /// Returns the tail of `run_id`'s event log with `sequence >= from_seq`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Internal`] only if an internal lock is
    /// poisoned.
    pub fn load_events_from(&self, run_id: &RunId, from_seq: u64) -> Result<Vec<Event>, LedgerError> {
        Ok(self
            .load_events(run_id)?
            .into_iter()
            .filter(|event| event.sequence >= from_seq)
            .collect())
    }

    /// Opens a live subscription to `run_id`'s future events.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Internal`] only if an internal lock is
    /// poisoned.
    pub fn subscribe(&self, run_id: &RunId) -> Result<Subscription, LedgerError> {
        let log = self.run_log(run_id)?;
        let mut log = log.lock().map_err(|_| LedgerError::Internal("run log lock poisoned".to_string()))?;
        let (sender, receiver) = mpsc::channel(self.subscriber_capacity);
        log.subscribers.push(sender);
        Ok(Subscription { receiver })
    }

    /// Runs a conjunctive filter query over `run_id`'s events, sorted by
    /// sequence ascending with `offset`/`limit` applied after filtering.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Internal`] only if an internal lock is
    /// poisoned.
    pub fn query(&self, run_id: &RunId, filter: &EventFilter) -> Result<Vec<Event>, LedgerError> {
        let matches: Vec<Event> = self
            .load_events(run_id)?
            .into_iter()
            .filter(|event| filter.matches(event.kind(), event.timestamp))
            .collect();
        let end = filter.limit.map_or(matches.len(), |limit| (filter.offset + limit).min(matches.len()));
        let start = filter.offset.min(matches.len());
        Ok(matches[start..end].to_vec())
    }

    /// Returns the number of events recorded for `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Internal`] only if an internal lock is
    /// poisoned.
    pub fn count_events(&self, run_id: &RunId) -> Result<usize, LedgerError> {
        Ok(self.load_events(run_id)?.len())
    }

    /// Lists every run ID with at least one recorded event or subscription.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Internal`] only if an internal lock is
    /// poisoned.
    pub fn list_runs(&self) -> Result<Vec<RunId>, LedgerError> {
        let runs = self
            .runs
            .lock()
            .map_err(|_| LedgerError::Internal("ledger run table lock poisoned".to_string()))?;
        Ok(runs.keys().cloned().collect())
    }

    /// Removes all events and subscriptions for `run_id`. Administrative
    /// operation; does not fail for an unknown run.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Internal`] only if an internal lock is
    /// poisoned.
    pub fn delete_run(&self, run_id: &RunId) -> Result<(), LedgerError> {
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| LedgerError::Internal("ledger run table lock poisoned".to_string()))?;
        runs.remove(run_id);
        Ok(())
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
    use crate::core::event::EventKind;
    use crate::core::state::State;
    use crate::core::time::FixedClock;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(FixedClock::new(1_000)))
    }

    fn started(goal: &str) -> EventPayload {
        EventPayload::RunStarted { goal: goal.to_string() }
    }

    #[test]
    fn append_assigns_contiguous_sequences() {
        let ledger = ledger();
        let run_id = RunId::new("r1");
        let cancel = CancelToken::new();
        let drafts = vec![
            (Timestamp::from_unix_millis(1), Some(State::Intake), started("a")),
            (Timestamp::from_unix_millis(2), Some(State::Intake), started("a")),
            (Timestamp::from_unix_millis(3), Some(State::Intake), started("a")),
        ];
        let events = ledger.append(&run_id, drafts, &cancel).expect("append succeeds");
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn append_empty_batch_is_noop() {
        let ledger = ledger();
        let run_id = RunId::new("r1");
        let cancel = CancelToken::new();
        let events = ledger.append(&run_id, Vec::new(), &cancel).expect("noop append succeeds");
        assert!(events.is_empty());
        assert_eq!(ledger.count_events(&run_id).expect("count"), 0);
    }

    #[test]
    fn append_cancelled_short_circuits() {
        let ledger = ledger();
        let run_id = RunId::new("r1");
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = ledger.append(&run_id, vec![(Timestamp::from_unix_millis(1), None, started("a"))], &cancel);
        assert!(matches!(result, Err(LedgerError::Cancelled)));
    }

    #[test]
    fn load_events_unknown_run_is_empty_not_error() {
        let ledger = ledger();
        let events = ledger.load_events(&RunId::new("missing")).expect("load succeeds");
        assert!(events.is_empty());
    }

    #[test]
    fn load_events_from_returns_tail() {
        let ledger = ledger();
        let run_id = RunId::new("r1");
        let cancel = CancelToken::new();
        for i in 0..5 {
            ledger
                .append(&run_id, vec![(Timestamp::from_unix_millis(i), None, started("a"))], &cancel)
                .expect("append succeeds");
        }
        let tail = ledger.load_events_from(&run_id, 4).expect("load succeeds");
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].sequence, 4);
    }

    #[test]
    fn query_filters_by_kind_and_applies_offset_limit() {
        let ledger = ledger();
        let run_id = RunId::new("r1");
        let cancel = CancelToken::new();
        ledger
            .append(
                &run_id,
                vec![
                    (Timestamp::from_unix_millis(1), None, started("a")),
                    (
                        Timestamp::from_unix_millis(2),
                        None,
                        EventPayload::BudgetExhausted { budget_name: "tool_calls".to_string() },
                    ),
                    (Timestamp::from_unix_millis(3), None, started("b")),
                ],
                &cancel,
            )
            .expect("append succeeds");

        let filter = EventFilter { types: vec![EventKind::RunStarted], ..EventFilter::default() };
        let matches = ledger.query(&run_id, &filter).expect("query succeeds");
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|e| e.kind() == EventKind::RunStarted));

        let limited = EventFilter { limit: Some(1), offset: 1, ..EventFilter::default() };
        let page = ledger.query(&run_id, &limited).expect("query succeeds");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].sequence, 2);
    }

    #[tokio::test]
    async fn subscriber_receives_appended_events_in_order() {
        let ledger = ledger();
        let run_id = RunId::new("r1");
        let cancel = CancelToken::new();
        let mut sub = ledger.subscribe(&run_id).expect("subscribe succeeds");

        ledger
            .append(&run_id, vec![(Timestamp::from_unix_millis(1), None, started("a"))], &cancel)
            .expect("append succeeds");
        ledger
            .append(&run_id, vec![(Timestamp::from_unix_millis(2), None, started("b"))], &cancel)
            .expect("append succeeds");

        let first = sub.recv().await.expect("first event delivered");
        let second = sub.recv().await.expect("second event delivered");
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
    }

    #[test]
    fn full_subscriber_channel_drops_without_failing_append() {
        let ledger = Ledger::with_subscriber_capacity(Arc::new(FixedClock::new(1_000)), 1);
        let run_id = RunId::new("r1");
        let cancel = CancelToken::new();
        let _sub = ledger.subscribe(&run_id).expect("subscribe succeeds");

        for i in 0..5 {
            let result = ledger.append(&run_id, vec![(Timestamp::from_unix_millis(i), None, started("a"))], &cancel);
            assert!(result.is_ok(), "persistence must succeed even if delivery drops");
        }
        assert_eq!(ledger.count_events(&run_id).expect("count"), 5);
    }

    #[test]
    fn delete_run_removes_events() {
        let ledger = ledger();
        let run_id = RunId::new("r1");
        let cancel = CancelToken::new();
        ledger
            .append(&run_id, vec![(Timestamp::from_unix_millis(1), None, started("a"))], &cancel)
            .expect("append succeeds");
        ledger.delete_run(&run_id).expect("delete succeeds");
        assert_eq!(ledger.count_events(&run_id).expect("count"), 0);
    }
}
