// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent definitions and the loader seam
//!
//! Agent definitions are authored externally (Markdown with frontmatter in
//! the production deployment); the core only sees this parsed form via the
//! loader trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A tool made available to an agent, with the JSON Schema its arguments
/// must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolManifest {
    pub name: String,
    #[serde(default)]
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub role: String,
    pub instructions: String,
    #[serde(default)]
    pub tools: Vec<ToolManifest>,
}

#[derive(Debug, Error)]
pub enum AgentLoadError {
    #[error("agent '{0}' not found")]
    NotFound(String),

    #[error("agent definition invalid: {0}")]
    Invalid(String),

    #[error("loader I/O failure: {0}")]
    Io(String),
}

/// External agent-definition loader (Markdown/frontmatter based in
/// production; in-memory maps in tests).
#[async_trait]
pub trait AgentDefinitionLoader: Send + Sync {
    async fn load(&self, name: &str) -> Result<AgentDefinition, AgentLoadError>;
}
