// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Finalizer node: produce the user-visible assistant message
//!
//! Every run ends here (the executor guarantees it), so this node is the
//! invariant point for "at least one assistant message per run".

use async_trait::async_trait;

use crate::domain::node::{GraphNode, NodeCommand, NodeError, NodeId};
use crate::domain::state::{Intent, Message, StateUpdate, StepStatus, WorkingState};

pub struct FinalizerNode;

impl FinalizerNode {
    pub fn new() -> Self {
        Self
    }

    fn progress_summary(state: &WorkingState) -> String {
        let done = state
            .step_status
            .values()
            .filter(|s| **s == StepStatus::Done)
            .count();

        let mut text = format!("Progress: {done}/{} steps completed.\n", state.plan.len());
        for (idx, step) in state.plan.iter().enumerate() {
            let glyph = match state.step_status.get(&idx).copied() {
                Some(StepStatus::Done) => "[done]",
                Some(StepStatus::Failed) => "[failed]",
                Some(StepStatus::Running) => "[running]",
                _ => "[pending]",
            };
            text.push_str(&format!("{glyph} {}. {step}\n", idx + 1));
        }

        if let Some(result) = &state.last_tool_result {
            if !result.is_success() {
                if let Some(detail) = result.output.as_str() {
                    text.push_str(&format!("\nLast failure: {detail}\n"));
                }
            }
        }
        text
    }
}

impl Default for FinalizerNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphNode for FinalizerNode {
    fn id(&self) -> NodeId {
        NodeId::Finalizer
    }

    async fn run(&self, state: &WorkingState) -> Result<NodeCommand, NodeError> {
        let content = if state.awaiting_approval {
            let tool = state
                .proposed_tool
                .as_ref()
                .map(|p| (p.name.clone(), p.canonical_args.clone()))
                .unwrap_or_else(|| ("unknown".into(), "{}".into()));
            let approval_id = state.approval_id.as_deref().unwrap_or("");
            format!(
                "A sensitive action needs your approval.\n\
                 Tool: {}\nArgs: {}\n\
                 Reply `APPROVE {approval_id} <TOKEN>` to run it, or `REJECT {approval_id}` to refuse.",
                tool.0, tool.1,
            )
        } else if state.awaiting_user_input {
            state
                .question
                .clone()
                .unwrap_or_else(|| "I need more information to continue.".to_string())
        } else if state.intent == Intent::Conversation {
            "Understood. What else can I help with?".to_string()
        } else if state.plan.is_empty() {
            "No task in progress.".to_string()
        } else {
            Self::progress_summary(state)
        };

        tracing::debug!("finalizer emitting run summary");
        Ok(NodeCommand::with_update(
            StateUpdate::message(Message::assistant(content)),
            NodeId::Terminal,
        ))
    }
}
