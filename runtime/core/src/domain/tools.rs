// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tool runner interface and the in-core tool registry
//!
//! The runner is trusted to execute only tools whose names are registered
//! here. The registry is populated at engine warmup from the agent
//! definition; each tool carries a JSON Schema that proposals are checked
//! against before canonicalization.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;

/// Raw outcome from the external tool runner.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub ok: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success(output: Value) -> Self {
        Self { ok: true, output: Some(output), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { ok: false, output: None, error: Some(error.into()) }
    }
}

#[derive(Debug, Error)]
pub enum ToolRunnerError {
    #[error("tool invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("tool transport error: {0}")]
    Transport(String),

    #[error("tool '{0}' not available at runner")]
    NotAvailable(String),
}

/// External tool execution boundary, consumed by the Tools node.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn call(
        &self,
        name: &str,
        args: &Value,
        timeout: Duration,
    ) -> Result<ToolOutcome, ToolRunnerError>;
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is not registered")]
    UnknownTool(String),

    #[error("invalid schema for tool '{name}': {detail}")]
    InvalidSchema { name: String, detail: String },

    #[error("arguments rejected by schema for '{name}': {detail}")]
    SchemaViolation { name: String, detail: String },
}

struct RegisteredTool {
    schema: Value,
    compiled: Option<jsonschema::Validator>,
}

/// Registered tool names and their argument schemas. Concurrent: engines
/// share one registry per agent and warmup may race with lookups.
pub struct ToolRegistry {
    tools: DashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: DashMap::new() }
    }

    /// Register a tool with its argument schema. A `null` schema skips
    /// argument validation for that tool.
    pub fn register(&self, name: impl Into<String>, schema: Value) -> Result<(), RegistryError> {
        let name = name.into();
        let compiled = if schema.is_null() {
            None
        } else {
            Some(jsonschema::validator_for(&schema).map_err(|e| {
                RegistryError::InvalidSchema { name: name.clone(), detail: e.to_string() }
            })?)
        };
        self.tools.insert(name, RegisteredTool { schema, compiled });
        Ok(())
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.tools.get(name).map(|e| e.schema.clone())
    }

    pub fn allowed(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Check proposed arguments against the tool's schema.
    pub fn validate_args(&self, name: &str, args: &Value) -> Result<(), RegistryError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;

        if let Some(validator) = &entry.compiled {
            if !validator.is_valid(args) {
                let detail = validator
                    .iter_errors(args)
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(RegistryError::SchemaViolation {
                    name: name.to_string(),
                    detail,
                });
            }
        }
        Ok(())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
