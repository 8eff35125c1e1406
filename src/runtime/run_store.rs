// src/runtime/run_store.rs
// ============================================================================
// Module: Agent Engine Run Store
// Description: Durable record of run metadata, status, result/error, timestamps.
// Purpose: Give the run executor a place to create, read, and mutate runs.
// Dependencies: crate::core::{state, identifiers, time}
// ============================================================================

//! ## Overview
//! The run store holds one [`Run`] record per `RunId`. Only the run executor
//! mutates a run (state, status, end time, result/error); everything else
//! about a run's causal history lives in the ledger.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use thiserror::Error;

use crate::core::identifiers::RunId;
use crate::core::state::Run;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by [`RunStore`] operations.
#[derive(Debug, Error)]
pub enum RunStoreError {
    /// No run exists with the given ID.
    #[error("run not found: {0}")]
    NotFound(RunId),
    /// A run already exists with the given ID.
    #[error("run already exists: {0}")]
    Exists(RunId),
    /// An unrecoverable internal error occurred (e.g. lock poisoning).
    #[error("internal run store error: {0}")]
    Internal(String),
}

// ============================================================================
// SECTION: Run Store
// ============================================================================

/// In-memory reference implementation of the run store.
pub struct RunStore {
    runs: RwLock<HashMap<RunId, Run>>,
}

impl RunStore {
    /// Creates a new, empty run store.
    #[must_use]
    pub fn new() -> Self {
        Self { runs: RwLock::new(HashMap::new()) }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<RunId, Run>>, RunStoreError> {
        self.runs.read().map_err(|_| RunStoreError::Internal("run store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<RunId, Run>>, RunStoreError> {
        self.runs.write().map_err(|_| RunStoreError::Internal("run store lock poisoned".to_string()))
    }

    /// Creates a new run in the initial state.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError::Exists`] if `run_id` is already present.
    pub fn create(&self, run_id: RunId, goal: impl Into<String>, start_time: Timestamp) -> Result<Run, RunStoreError> {
        let mut runs = self.write()?;
        if runs.contains_key(&run_id) {
            return Err(RunStoreError::Exists(run_id));
        }
        let run = Run::new(run_id.clone(), goal, start_time);
        runs.insert(run_id, run.clone());
        Ok(run)
    }

    /// Returns a copy of the run record for `run_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError::NotFound`] if no such run exists.
    pub fn get(&self, run_id: &RunId) -> Result<Run, RunStoreError> {
        self.read()?.get(run_id).cloned().ok_or_else(|| RunStoreError::NotFound(run_id.clone()))
    }

    /// Replaces the stored record for `run.run_id` with `run`.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError::NotFound`] if no prior record exists for
    /// that ID — callers must `create` before `save`.
    pub fn save(&self, run: Run) -> Result<(), RunStoreError> {
        let mut runs = self.write()?;
        let entry = runs.get_mut(&run.run_id).ok_or_else(|| RunStoreError::NotFound(run.run_id.clone()))?;
        *entry = run;
        Ok(())
    }

    /// Applies `mutate` to the stored run for `run_id` under the store's
    /// write lock, persisting the result. The common path for the run
    /// executor's state/status mutations.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError::NotFound`] if no such run exists.
    pub fn update(&self, run_id: &RunId, mutate: impl FnOnce(&mut Run)) -> Result<Run, RunStoreError> {
        let mut runs = self.write()?;
        let entry = runs.get_mut(run_id).ok_or_else(|| RunStoreError::NotFound(run_id.clone()))?;
        mutate(entry);
        Ok(entry.clone())
    }

    /// Lists every stored run.
    ///
    /// # Errors
    ///
    /// Returns [`RunStoreError::Internal`] only if an internal lock is
    /// poisoned.
    pub fn list(&self) -> Result<Vec<Run>, RunStoreError> {
        Ok(self.read()?.values().cloned().collect())
    }
}

impl Default for RunStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Cheaply clonable handle to a shared [`RunStore`].
///
/// Mirrors the teacher's `SharedRunStateStore` wrapper so multiple engine
/// components (executor, inspector) can hold a handle to the same store
/// without threading lifetimes through every call site.
#[derive(Clone)]
pub struct SharedRunStore(Arc<RunStore>);

impl SharedRunStore {
    /// Wraps a [`RunStore`] for cheap cloning.
    #[must_use]
    pub fn new(store: RunStore) -> Self {
        Self(Arc::new(store))
    }
}

impl std::ops::Deref for SharedRunStore {
    type Target = RunStore;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
