// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tool proposal and result value objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::canonical::{canonicalize, sha256_hex};

/// A validated, canonicalized intent to call a tool, not yet executed.
///
/// Invariants: `canonical_args == canonicalize(&args)` and
/// `args_hash == sha256_hex(&canonical_args)`. Both are recomputed by
/// RiskGate before any trust is placed in them; a mismatch is a fatal
/// tamper event for the proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedTool {
    pub name: String,
    pub args: Value,
    pub canonical_args: String,
    pub args_hash: String,
    pub tool_call_id: String,
    pub step_idx: usize,
    pub created_at: DateTime<Utc>,
}

impl ProposedTool {
    /// Build a proposal with server-computed integrity fields. This is the
    /// only constructor; LLM-provided canonical forms or hashes are never
    /// accepted.
    pub fn from_args(name: impl Into<String>, args: Value, step_idx: usize) -> Self {
        let canonical_args = canonicalize(&args);
        let args_hash = sha256_hex(&canonical_args);
        Self {
            name: name.into(),
            args,
            canonical_args,
            args_hash,
            tool_call_id: format!("tc_{}", Uuid::new_v4().simple()),
            step_idx,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Failed,
}

/// The interpreted outcome of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    pub output: Value,
    pub evicted: bool,
    pub pointer: Option<std::path::PathBuf>,
    pub size_chars: usize,
    pub rehydration_allowed: bool,
    pub summary: Option<String>,
    pub source_path: Option<std::path::PathBuf>,
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        let size_chars = render_output(&output).chars().count();
        Self {
            status: ToolStatus::Success,
            output,
            evicted: false,
            pointer: None,
            size_chars,
            rehydration_allowed: true,
            summary: None,
            source_path: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        let summary: String = message.chars().take(100).collect();
        Self {
            status: ToolStatus::Failed,
            output: Value::String(message),
            evicted: false,
            pointer: None,
            size_chars: 0,
            rehydration_allowed: true,
            summary: Some(summary),
            source_path: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// Deterministic stringification of tool output: strings verbatim,
/// structured values as compact JSON. This is the form whose length drives
/// eviction decisions.
pub fn render_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_proposal_integrity_fields() {
        let proposal = ProposedTool::from_args("read_file", json!({"path": "a.txt", "mode": "r"}), 2);
        assert_eq!(proposal.canonical_args, r#"{"mode":"r","path":"a.txt"}"#);
        assert_eq!(proposal.args_hash, sha256_hex(&proposal.canonical_args));
        assert_eq!(proposal.step_idx, 2);
        assert!(proposal.tool_call_id.starts_with("tc_"));
    }

    #[test]
    fn test_render_output_string_verbatim() {
        assert_eq!(render_output(&json!("plain text")), "plain text");
    }

    #[test]
    fn test_render_output_structured_compact() {
        let rendered = render_output(&json!({"b": 1, "a": 2}));
        assert!(!rendered.contains(' '));
        let reparsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(reparsed, json!({"a": 2, "b": 1}));
    }

    #[test]
    fn test_failed_result_shape() {
        let result = ToolResult::failed("nope");
        assert_eq!(result.status, ToolStatus::Failed);
        assert_eq!(result.output, Value::String("nope".into()));
        assert!(!result.evicted);
    }
}
