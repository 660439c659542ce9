// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tools node: physical tool execution behind the idempotency cache
//!
//! Looks up `(thread, step, args_hash)` before calling the runner; a hit
//! reuses the cached result and skips execution entirely. Completed runner
//! outcomes (success or tool-level failure) are cached; transport faults
//! and timeouts are not, so a genuine retry can re-execute.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::node::{GraphNode, NodeCommand, NodeError, NodeId};
use crate::domain::state::{StateUpdate, WorkingState};
use crate::domain::tool::ToolResult;
use crate::domain::tools::ToolRunner;
use crate::infrastructure::idempotency::{idempotency_key, IdempotencyStore};

pub struct ToolsNode {
    runner: Arc<dyn ToolRunner>,
    idempotency: Arc<IdempotencyStore>,
    tool_timeout: Duration,
    cache_ttl: Duration,
}

impl ToolsNode {
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        idempotency: Arc<IdempotencyStore>,
        tool_timeout: Duration,
        cache_ttl: Duration,
    ) -> Self {
        Self { runner, idempotency, tool_timeout, cache_ttl }
    }
}

#[async_trait]
impl GraphNode for ToolsNode {
    fn id(&self) -> NodeId {
        NodeId::Tools
    }

    async fn run(&self, state: &WorkingState) -> Result<NodeCommand, NodeError> {
        let Some(proposal) = &state.proposed_tool else {
            return Ok(NodeCommand::with_update(
                StateUpdate::result(ToolResult::failed("System error: no tool proposed")),
                NodeId::Interpreter,
            ));
        };

        let key = idempotency_key(&state.thread_id, proposal.step_idx, &proposal.args_hash);

        if let Some(cached) = self.idempotency.get(&key) {
            tracing::info!(tool = %proposal.name, step = proposal.step_idx, "idempotency cache hit");
            return Ok(NodeCommand::with_update(
                StateUpdate::result(cached),
                NodeId::Interpreter,
            ));
        }

        let called = tokio::time::timeout(
            self.tool_timeout,
            self.runner.call(&proposal.name, &proposal.args, self.tool_timeout),
        )
        .await;

        let result = match called {
            Err(_) => {
                tracing::warn!(tool = %proposal.name, timeout = ?self.tool_timeout, "tool timed out");
                ToolResult::failed(format!(
                    "Tool '{}' timed out after {}s",
                    proposal.name,
                    self.tool_timeout.as_secs(),
                ))
            }
            Ok(Err(e)) => {
                tracing::warn!(tool = %proposal.name, error = %e, "tool runner fault");
                ToolResult::failed(format!("Tool runner error: {e}"))
            }
            Ok(Ok(outcome)) => {
                let result = if outcome.ok {
                    ToolResult::success(outcome.output.unwrap_or(serde_json::Value::Null))
                } else {
                    ToolResult::failed(
                        outcome.error.unwrap_or_else(|| "tool reported failure".to_string()),
                    )
                };
                // Only completed invocations enter the cache
                self.idempotency.set(key, result.clone(), self.cache_ttl);
                result
            }
        };

        Ok(NodeCommand::with_update(
            StateUpdate::result(result),
            NodeId::Interpreter,
        ))
    }
}
