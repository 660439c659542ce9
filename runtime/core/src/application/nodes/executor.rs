// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Executor node: propose one tool call for the current step
//!
//! The LLM proposes `{name, args}` only. Everything that matters for
//! security — registry membership, argument validation, schema check,
//! canonical form, hash — is computed server-side here. LLM-provided
//! integrity fields are never read.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::application::nodes::parse::JsonExtractor;
use crate::domain::llm::LlmAdapter;
use crate::domain::node::{GraphNode, NodeCommand, NodeError, NodeId};
use crate::domain::state::{Field, Message, StateUpdate, WorkingState};
use crate::domain::tool::{ProposedTool, ToolResult};
use crate::domain::tools::ToolRegistry;
use crate::domain::validator::ArgumentValidator;

pub struct ExecutorNode {
    llm: Arc<dyn LlmAdapter>,
    registry: Arc<ToolRegistry>,
    validator: Arc<ArgumentValidator>,
    extractor: JsonExtractor,
}

impl ExecutorNode {
    pub fn new(
        llm: Arc<dyn LlmAdapter>,
        registry: Arc<ToolRegistry>,
        validator: Arc<ArgumentValidator>,
    ) -> Self {
        Self { llm, registry, validator, extractor: JsonExtractor::new() }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are the EXECUTOR for an agent runtime.\n\
             Propose exactly ONE tool call for the current step.\n\
             Rules:\n\
             - Return ONLY valid JSON, no markdown, no explanations\n\
             - Use only allowed tools\n\
             - Provide complete arguments\n\
             Allowed tools: {:?}\n\
             Format: {{\"name\": \"tool_name\", \"args\": {{...}}}}\n",
            self.registry.list(),
        )
    }
}

fn failed_to_interpreter(message: String) -> NodeCommand {
    NodeCommand::with_update(
        StateUpdate::result(ToolResult::failed(message)),
        NodeId::Interpreter,
    )
}

#[async_trait]
impl GraphNode for ExecutorNode {
    fn id(&self) -> NodeId {
        NodeId::Executor
    }

    async fn run(&self, state: &WorkingState) -> Result<NodeCommand, NodeError> {
        let step_idx = state.current_step;
        let Some(step_text) = state.plan.get(step_idx) else {
            return Ok(NodeCommand::goto(NodeId::Finalizer));
        };

        let prompt = [
            Message::system(self.system_prompt()),
            Message::user(format!("Execute step: {step_text}")),
        ];
        let response = self.llm.invoke(&prompt).await?;

        let parsed = self.extractor.extract(&response).unwrap_or(Value::Null);
        let name = parsed
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let args = match parsed.get("args") {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            _ => Value::Object(serde_json::Map::new()),
        };

        if !self.registry.allowed(&name) {
            tracing::warn!(tool = %name, "executor proposed unregistered tool");
            return Ok(failed_to_interpreter(format!(
                "Tool '{}' not allowed. Choose from: {:?}",
                name,
                self.registry.list(),
            )));
        }

        if let Err(e) = self.validator.validate(&name, &args) {
            tracing::warn!(tool = %name, error = %e, "argument validation rejected proposal");
            return Ok(failed_to_interpreter(format!("Validation error: {e}")));
        }

        if let Err(e) = self.registry.validate_args(&name, &args) {
            tracing::warn!(tool = %name, error = %e, "schema validation rejected proposal");
            return Ok(failed_to_interpreter(format!("Schema error: {e}")));
        }

        // Server-side canonicalization + hash; never trust the model's
        let proposal = ProposedTool::from_args(name, args, step_idx);
        tracing::debug!(tool = %proposal.name, hash = %proposal.args_hash, "tool proposed");

        let update = StateUpdate {
            proposed_tool: Field::Set(Some(proposal)),
            ..StateUpdate::default()
        };
        Ok(NodeCommand::with_update(update, NodeId::RiskGate))
    }
}
