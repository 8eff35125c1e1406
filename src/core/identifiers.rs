// src/core/identifiers.rs
// ============================================================================
// Module: Agent Engine Identifiers
// Description: Canonical opaque identifiers for runs, events, tools, and budgets.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical string-based identifiers used throughout
//! the engine. Identifiers are opaque and serialize as strings. Validation is
//! handled at the boundaries that create them (run creation, event append)
//! rather than within these simple wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Macro: newtype identifier
// ============================================================================

macro_rules! string_identifier {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

string_identifier!(RunId, "Stable identifier for a run.");
string_identifier!(EventId, "Unique identifier for a ledger event.");
string_identifier!(ToolName, "Unique name of a tool within a registry.");
string_identifier!(BudgetName, "Name of a named consumable budget.");
string_identifier!(VectorId, "Identifier of a vector in the knowledge store.");
string_identifier!(ApproverId, "Identifier of the approver that resolved a request.");
