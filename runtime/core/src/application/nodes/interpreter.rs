// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Interpreter node: normalize tool results and evict oversized outputs
//!
//! Outputs over the eviction threshold move to the content store and the
//! in-state result keeps only a pointer string plus a PII-sanitized
//! summary. The proposal is cleared here unconditionally — this is what
//! makes a later traversal of Tools a no-op instead of a double execution.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::canonical::sha256_hex;
use crate::domain::content_store::{ContentStore, ContentStoreError};
use crate::domain::dlp::DlpScanner;
use crate::domain::node::{GraphNode, NodeCommand, NodeError, NodeId};
use crate::domain::state::{Field, StateUpdate, StepStatus, WorkingState};
use crate::domain::tool::{render_output, ToolResult};

pub struct InterpreterNode {
    store: Arc<dyn ContentStore>,
    dlp: Arc<dyn DlpScanner>,
    eviction_threshold_chars: usize,
    summary_max_chars: usize,
    rehydration_max_chars: usize,
}

impl InterpreterNode {
    pub fn new(
        store: Arc<dyn ContentStore>,
        dlp: Arc<dyn DlpScanner>,
        eviction_threshold_chars: usize,
        summary_max_chars: usize,
        rehydration_max_chars: usize,
    ) -> Self {
        Self {
            store,
            dlp,
            eviction_threshold_chars,
            summary_max_chars,
            rehydration_max_chars,
        }
    }

    fn evict(
        &self,
        result: &mut ToolResult,
        raw: &str,
        size: usize,
        thread_id: &str,
    ) -> Result<(), ContentStoreError> {
        let digest = sha256_hex(raw);
        let filename = format!(
            "eviction_{}_{}.txt",
            sanitize_component(thread_id),
            &digest[..8],
        );

        let path = self.store.write(&filename, raw)?;

        let truncated: String = raw.chars().take(self.summary_max_chars).collect();
        let (summary, findings) = self.dlp.sanitize_pii(&truncated);
        if !findings.is_empty() {
            tracing::debug!(count = findings.len(), "PII redacted from eviction summary");
        }

        result.evicted = true;
        result.size_chars = size;
        result.output = Value::String(format!(
            "[EVICTED size={size} chars] pointer={}",
            path.display(),
        ));
        result.summary = Some(format!("{summary}…"));
        result.rehydration_allowed = size <= self.rehydration_max_chars;
        result.pointer = Some(path.clone());
        result.source_path = Some(path);
        Ok(())
    }
}

/// Thread ids come from the transport; keep only filename-safe characters
/// before they participate in an eviction filename.
fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

#[async_trait]
impl GraphNode for InterpreterNode {
    fn id(&self) -> NodeId {
        NodeId::Interpreter
    }

    async fn run(&self, state: &WorkingState) -> Result<NodeCommand, NodeError> {
        let mut result = state
            .last_tool_result
            .clone()
            .unwrap_or_else(|| ToolResult::failed("No result found"));

        let raw = render_output(&result.output);
        let size = raw.chars().count();

        if size > self.eviction_threshold_chars {
            tracing::info!(chars = size, threshold = self.eviction_threshold_chars, "evicting oversized output");
            match self.evict(&mut result, &raw, size, &state.thread_id) {
                Ok(()) => {}
                Err(e @ ContentStoreError::OutsideBase(_)) => {
                    // A pointer escaping the store base is a security fault,
                    // not a degradation: the run fails
                    tracing::error!(error = %e, "eviction aborted");
                    result = ToolResult::failed(format!("Eviction aborted: {e}"));
                }
                Err(e) => {
                    // Disk trouble degrades: keep the oversized output
                    tracing::error!(error = %e, "eviction write failed; keeping output in state");
                    result.size_chars = size;
                }
            }
        } else {
            result.evicted = false;
            result.size_chars = size;
            result.rehydration_allowed = true;
        }

        let mut step_status = state.step_status.clone();
        step_status.insert(
            state.current_step,
            if result.is_success() { StepStatus::Done } else { StepStatus::Failed },
        );

        let update = StateUpdate {
            last_tool_result: Field::Set(Some(result)),
            // Clearing the proposal here prevents double execution
            proposed_tool: Field::Set(None),
            step_status: Field::Set(step_status),
            ..StateUpdate::default()
        };
        Ok(NodeCommand::with_update(update, NodeId::Supervisor))
    }
}
