// src/runtime/knowledge.rs
// ============================================================================
// Module: Agent Engine Knowledge Store
// Description: Fixed-dimension vector store with cosine-similarity retrieval.
// Purpose: Serve retrieval-augmented planning queries over stored embeddings.
// Dependencies: crate::core::{identifiers::VectorId, time::{Clock, Timestamp}}
// ============================================================================

//! ## Overview
//! The knowledge store binds its embedding dimension on first upsert (or
//! accepts a configured dimension up front) and serves cosine-similarity
//! top-K search. Writes are serialized behind one lock; reads take a
//! consistent snapshot of the backing map so results are deep copies never
//! aliasing storage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::VectorId;
use crate::core::time::Clock;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by [`KnowledgeStore`] operations.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// `ID` was empty.
    #[error("vector id must not be empty")]
    InvalidId,
    /// `Embedding` was empty.
    #[error("embedding must not be empty")]
    InvalidEmbedding,
    /// The embedding's length did not match the store's bound dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension bound by the store.
        expected: usize,
        /// Dimension of the offending embedding.
        actual: usize,
    },
    /// No vector exists with the given ID.
    #[error("vector not found: {0}")]
    NotFound(VectorId),
}

// ============================================================================
// SECTION: Vector
// ============================================================================

/// A stored embedding with accompanying text and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// Unique identifier within the store.
    pub id: VectorId,
    /// Fixed-dimension embedding.
    pub embedding: Vec<f32>,
    /// Source text the embedding represents.
    pub text: String,
    /// Arbitrary string-keyed metadata.
    pub metadata: HashMap<String, String>,
    /// Time the vector was created or last replaced.
    pub created_at: Timestamp,
}

/// A search result: a vector paired with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredVector {
    /// The matched vector.
    pub vector: Vector,
    /// Cosine similarity score in `[-1, 1]`.
    pub score: f32,
}

/// Conjunctive filter for [`KnowledgeStore::list`].
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    /// Restrict results to IDs with this prefix.
    pub id_prefix: Option<String>,
    /// Restrict results to vectors whose metadata matches every given key.
    pub metadata: HashMap<String, String>,
    /// Restrict results to vectors created at or after this time.
    pub from_time: Option<Timestamp>,
    /// Restrict results to vectors created at or before this time.
    pub to_time: Option<Timestamp>,
    /// Number of matching vectors to skip.
    pub offset: usize,
    /// Maximum number of vectors to return.
    pub limit: Option<usize>,
}

impl VectorFilter {
    fn matches(&self, vector: &Vector) -> bool {
        if let Some(prefix) = &self.id_prefix
            && !vector.id.as_str().starts_with(prefix.as_str())
        {
            return false;
        }
        if !self.metadata.iter().all(|(key, value)| vector.metadata.get(key) == Some(value)) {
            return false;
        }
        if let Some(from) = self.from_time
            && vector.created_at < from
        {
            return false;
        }
        if let Some(to) = self.to_time
            && vector.created_at > to
        {
            return false;
        }
        true
    }
}

/// Aggregate statistics over a knowledge store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnowledgeStats {
    /// Total number of stored vectors.
    pub vector_count: usize,
    /// Bound dimension, or zero if not yet bound.
    pub dimension: usize,
}

// ============================================================================
// SECTION: Cosine Similarity
// ============================================================================

/// Computes cosine similarity between two equal-length embeddings.
///
/// Returns `0.0` if either vector has zero norm. Callers must check length
/// equality themselves; mismatched lengths are rejected earlier as
/// [`KnowledgeError::DimensionMismatch`].
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
}

// ============================================================================
// SECTION: Knowledge Store
// ============================================================================

struct Inner {
    vectors: HashMap<VectorId, Vector>,
    dimension: usize,
}

/// In-memory reference implementation of the vector knowledge store.
pub struct KnowledgeStore {
    clock: std::sync::Arc<dyn Clock>,
    inner: RwLock<Inner>,
}

impl KnowledgeStore {
    /// Creates a new store. A `configured_dimension` of zero means the
    /// dimension is bound by the first successful upsert.
    #[must_use]
    pub fn new(clock: std::sync::Arc<dyn Clock>, configured_dimension: usize) -> Self {
        Self { clock, inner: RwLock::new(Inner { vectors: HashMap::new(), dimension: configured_dimension }) }
    }

    /// Inserts or replaces the vector with `v.id`, binding the store's
    /// dimension from `v.embedding.len()` if not already bound.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::InvalidId`] for an empty ID,
    /// [`KnowledgeError::InvalidEmbedding`] for an empty embedding, or
    /// [`KnowledgeError::DimensionMismatch`] if the embedding's length does
    /// not match the bound dimension.
    pub fn upsert(&self, mut v: Vector) -> Result<(), KnowledgeError> {
        if v.id.as_str().is_empty() {
            return Err(KnowledgeError::InvalidId);
        }
        if v.embedding.is_empty() {
            return Err(KnowledgeError::InvalidEmbedding);
        }
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.dimension == 0 {
            inner.dimension = v.embedding.len();
        } else if v.embedding.len() != inner.dimension {
            return Err(KnowledgeError::DimensionMismatch { expected: inner.dimension, actual: v.embedding.len() });
        }
        if v.created_at.is_zero() {
            v.created_at = self.clock.now();
        }
        inner.vectors.insert(v.id.clone(), v);
        Ok(())
    }

    /// Inserts or replaces each vector in `batch`, aborting on the first
    /// error. Vectors before the failing one remain committed, matching the
    /// specification's element-wise, first-error-aborts semantics.
    ///
    /// # Errors
    ///
    /// Returns the first [`KnowledgeError`] encountered.
    pub fn upsert_batch(&self, batch: Vec<Vector>) -> Result<(), KnowledgeError> {
        for v in batch {
            self.upsert(v)?;
        }
        Ok(())
    }

    /// Returns a deep copy of the vector with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::NotFound`] if no such vector exists.
    pub fn get(&self, id: &VectorId) -> Result<Vector, KnowledgeError> {
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.vectors.get(id).cloned().ok_or_else(|| KnowledgeError::NotFound(id.clone()))
    }

    /// Removes the vector with `id`. Deleting an unknown ID is not an
    /// error.
    pub fn delete(&self, id: &VectorId) {
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.vectors.remove(id);
    }

    /// Removes every vector whose ID is in `ids`.
    pub fn delete_batch(&self, ids: &[VectorId]) {
        let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        for id in ids {
            inner.vectors.remove(id);
        }
    }

    /// Computes cosine similarity against `query` for every stored vector,
    /// ranks descending, and truncates to `top_k`.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::DimensionMismatch`] if `query`'s length does
    /// not match the bound dimension, and [`KnowledgeError::InvalidEmbedding`]
    /// for an empty query.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredVector>, KnowledgeError> {
        if query.is_empty() {
            return Err(KnowledgeError::InvalidEmbedding);
        }
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.dimension != 0 && query.len() != inner.dimension {
            return Err(KnowledgeError::DimensionMismatch { expected: inner.dimension, actual: query.len() });
        }
        let mut scored: Vec<ScoredVector> = inner
            .vectors
            .values()
            .map(|v| ScoredVector { vector: v.clone(), score: cosine_similarity(query, &v.embedding) })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Lists vectors matching `filter`, sorted by ID for determinism, with
    /// offset/limit applied after filtering.
    #[must_use]
    pub fn list(&self, filter: &VectorFilter) -> Vec<Vector> {
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut matches: Vec<Vector> = inner.vectors.values().filter(|v| filter.matches(v)).cloned().collect();
        matches.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        let start = filter.offset.min(matches.len());
        let end = filter.limit.map_or(matches.len(), |limit| (filter.offset + limit).min(matches.len()));
        matches[start..end].to_vec()
    }

    /// Returns the number of stored vectors.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner).vectors.len()
    }

    /// Returns aggregate statistics about the store.
    #[must_use]
    pub fn stats(&self) -> KnowledgeStats {
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        KnowledgeStats { vector_count: inner.vectors.len(), dimension: inner.dimension }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
