// src/runtime/registry.rs
// ============================================================================
// Module: Agent Engine Tool Registry
// Description: Name-to-tool resolution with schema and annotation exposure.
// Purpose: Let the tool executor resolve a tool handler by name at call time.
// Dependencies: crate::core::{tool, identifiers}, crate::interfaces::Tool
// ============================================================================

//! ## Overview
//! The registry is a read-mostly map from [`ToolName`] to a registered
//! [`ToolDescriptor`] plus its handler. Hot re-registration is permitted but
//! does not affect in-flight executions: each invocation resolves the tool
//! by name at the moment it is called, never holding a stale reference.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use thiserror::Error;

use crate::core::identifiers::ToolName;
use crate::core::tool::ToolDescriptor;
use crate::interfaces::Tool;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by [`ToolRegistry`] operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A tool is already registered under that name.
    #[error("tool already registered: {0}")]
    ToolExists(ToolName),
    /// No tool is registered under that name.
    #[error("tool not found: {0}")]
    NotFound(ToolName),
    /// An unrecoverable internal error occurred (e.g. lock poisoning).
    #[error("internal registry error: {0}")]
    Internal(String),
}

/// A registered tool's static contract together with its handler.
#[derive(Clone)]
pub struct RegisteredTool {
    /// Schema and annotation contract.
    pub descriptor: ToolDescriptor,
    /// The handler invoked at execution time.
    pub handler: Arc<dyn Tool>,
}

// ============================================================================
// SECTION: Tool Registry
// ============================================================================

/// In-memory, read-mostly name-to-tool registry.
pub struct ToolRegistry {
    tools: RwLock<HashMap<ToolName, RegisteredTool>>,
}

impl ToolRegistry {
    /// Creates a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { tools: RwLock::new(HashMap::new()) }
    }

    /// Registers `handler` under `descriptor.name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ToolExists`] if a tool is already registered
    /// under that name.
    pub fn register(&self, descriptor: ToolDescriptor, handler: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let mut tools =
            self.tools.write().map_err(|_| RegistryError::Internal("registry lock poisoned".to_string()))?;
        if tools.contains_key(&descriptor.name) {
            return Err(RegistryError::ToolExists(descriptor.name));
        }
        tools.insert(descriptor.name.clone(), RegisteredTool { descriptor, handler });
        Ok(())
    }

    /// Replaces any existing registration for `descriptor.name`. Does not
    /// affect tool executions already in flight, since each execution
    /// resolves the tool fresh.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Internal`] only if an internal lock is
    /// poisoned.
    pub fn replace(&self, descriptor: ToolDescriptor, handler: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let mut tools =
            self.tools.write().map_err(|_| RegistryError::Internal("registry lock poisoned".to_string()))?;
        tools.insert(descriptor.name.clone(), RegisteredTool { descriptor, handler });
        Ok(())
    }

    /// Resolves a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no tool is registered under
    /// that name.
    pub fn resolve(&self, name: &ToolName) -> Result<RegisteredTool, RegistryError> {
        let tools = self.tools.read().map_err(|_| RegistryError::Internal("registry lock poisoned".to_string()))?;
        tools.get(name).cloned().ok_or_else(|| RegistryError::NotFound(name.clone()))
    }

    /// Lists the descriptors of every registered tool.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Internal`] only if an internal lock is
    /// poisoned.
    pub fn list(&self) -> Result<Vec<ToolDescriptor>, RegistryError> {
        let tools = self.tools.read().map_err(|_| RegistryError::Internal("registry lock poisoned".to_string()))?;
        Ok(tools.values().map(|t| t.descriptor.clone()).collect())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
