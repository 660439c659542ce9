// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Supervisor node: orchestrates plan progress without LLM calls
//!
//! Advances past completed steps, retries failed ones up to the limit,
//! surfaces a retry/skip/cancel question when the limit is hit, and
//! consumes the user's answer to that question on the next turn.

use async_trait::async_trait;

use crate::domain::node::{GraphNode, NodeCommand, NodeError, NodeId};
use crate::domain::state::{Field, StateUpdate, StepStatus, WorkingState};

pub struct SupervisorNode {
    max_retries: u32,
}

impl SupervisorNode {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    fn handle_user_reply(&self, state: &WorkingState) -> NodeCommand {
        let reply = state
            .last_user_message()
            .map(|m| m.trim().to_ascii_uppercase())
            .unwrap_or_default();
        let step_idx = state.current_step;

        match reply.as_str() {
            "RETRY" => {
                let mut tries = state.tries.clone();
                tries.insert(step_idx, 0);
                let mut step_status = state.step_status.clone();
                step_status.insert(step_idx, StepStatus::Pending);
                let update = StateUpdate {
                    awaiting_user_input: Field::Set(false),
                    question: Field::Set(None),
                    tries: Field::Set(tries),
                    step_status: Field::Set(step_status),
                    ..StateUpdate::default()
                };
                NodeCommand::with_update(update, NodeId::Executor)
            }
            "SKIP" => {
                let mut step_status = state.step_status.clone();
                step_status.insert(step_idx, StepStatus::Done);
                let next_idx = step_idx + 1;
                let next = if next_idx >= state.plan.len() {
                    NodeId::Finalizer
                } else {
                    NodeId::Executor
                };
                let update = StateUpdate {
                    awaiting_user_input: Field::Set(false),
                    question: Field::Set(None),
                    step_status: Field::Set(step_status),
                    current_step: Field::Set(next_idx),
                    ..StateUpdate::default()
                };
                NodeCommand::with_update(update, next)
            }
            "CANCEL" => {
                let mut plan = state.plan.clone();
                plan.truncate(step_idx);
                let update = StateUpdate {
                    awaiting_user_input: Field::Set(false),
                    question: Field::Set(None),
                    plan: Field::Set(plan),
                    ..StateUpdate::default()
                };
                NodeCommand::with_update(update, NodeId::Finalizer)
            }
            // Unrecognized answer: re-ask
            _ => NodeCommand::goto(NodeId::Finalizer),
        }
    }
}

#[async_trait]
impl GraphNode for SupervisorNode {
    fn id(&self) -> NodeId {
        NodeId::Supervisor
    }

    async fn run(&self, state: &WorkingState) -> Result<NodeCommand, NodeError> {
        if state.awaiting_user_input {
            return Ok(self.handle_user_reply(state));
        }

        let step_idx = state.current_step;

        if state.plan.is_empty() || step_idx >= state.plan.len() {
            return Ok(NodeCommand::goto(NodeId::Finalizer));
        }

        match state.step_status.get(&step_idx).copied().unwrap_or(StepStatus::Pending) {
            StepStatus::Done => {
                let next_idx = step_idx + 1;
                if next_idx >= state.plan.len() {
                    return Ok(NodeCommand::goto(NodeId::Finalizer));
                }
                let update = StateUpdate {
                    current_step: Field::Set(next_idx),
                    ..StateUpdate::default()
                };
                Ok(NodeCommand::with_update(update, NodeId::Executor))
            }
            StepStatus::Failed => {
                let current_tries = state.tries.get(&step_idx).copied().unwrap_or(0);
                if current_tries >= self.max_retries {
                    tracing::warn!(step = step_idx, tries = current_tries, "retry limit reached");
                    let last_error = state
                        .last_tool_result
                        .as_ref()
                        .filter(|r| !r.is_success())
                        .and_then(|r| r.output.as_str())
                        .map(|detail| format!("\nLast result:\n{detail}\n"))
                        .unwrap_or_default();
                    let question = format!(
                        "Step {} failed: \"{}\"\n{last_error}\
                         Reply RETRY to try again, SKIP to move on, or CANCEL to stop the task.",
                        step_idx + 1,
                        state.plan[step_idx],
                    );
                    let update = StateUpdate {
                        awaiting_user_input: Field::Set(true),
                        question: Field::Set(Some(question)),
                        ..StateUpdate::default()
                    };
                    return Ok(NodeCommand::with_update(update, NodeId::Finalizer));
                }

                let mut tries = state.tries.clone();
                tries.insert(step_idx, current_tries + 1);
                let mut step_status = state.step_status.clone();
                step_status.insert(step_idx, StepStatus::Pending);
                let update = StateUpdate {
                    tries: Field::Set(tries),
                    step_status: Field::Set(step_status),
                    ..StateUpdate::default()
                };
                Ok(NodeCommand::with_update(update, NodeId::Executor))
            }
            StepStatus::Pending | StepStatus::Running => {
                Ok(NodeCommand::goto(NodeId::Executor))
            }
        }
    }
}
