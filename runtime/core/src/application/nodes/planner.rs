// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Planner node: decompose the latest user goal into atomic steps

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::application::nodes::parse::JsonExtractor;
use crate::domain::llm::LlmAdapter;
use crate::domain::node::{GraphNode, NodeCommand, NodeError, NodeId};
use crate::domain::state::{Field, Message, StateUpdate, StepStatus, WorkingState};

const PLANNER_SYSTEM_PROMPT: &str = "\
You are the PLANNER for an agent runtime.\n\
Break the user's goal into atomic steps.\n\
Rules:\n\
- Return ONLY valid JSON, no markdown, no explanations\n\
- Each step is a single human-readable action\n\
- Do not name tools; describe the action\n\
Format: {\"plan\": [\"step1\", \"step2\"]}\n";

pub struct PlannerNode {
    llm: Arc<dyn LlmAdapter>,
    extractor: JsonExtractor,
    max_steps: usize,
}

impl PlannerNode {
    pub fn new(llm: Arc<dyn LlmAdapter>, max_steps: usize) -> Self {
        Self { llm, extractor: JsonExtractor::new(), max_steps }
    }

    fn parse_plan(&self, response: &str, goal: &str) -> Vec<String> {
        let fallback = || vec![goal.to_string()];

        let Some(parsed) = self.extractor.extract(response) else {
            tracing::warn!("planner response unparseable; falling back to single-step plan");
            return fallback();
        };

        let steps: Vec<String> = parsed
            .get("plan")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let mut plan = if steps.is_empty() { fallback() } else { steps };
        if plan.len() > self.max_steps {
            tracing::debug!(proposed = plan.len(), kept = self.max_steps, "plan truncated");
            plan.truncate(self.max_steps);
        }
        plan
    }
}

#[async_trait]
impl GraphNode for PlannerNode {
    fn id(&self) -> NodeId {
        NodeId::Planner
    }

    async fn run(&self, state: &WorkingState) -> Result<NodeCommand, NodeError> {
        let goal = state.last_user_message().unwrap_or("No goal specified").to_string();

        let prompt = [
            Message::system(PLANNER_SYSTEM_PROMPT),
            Message::user(format!("Goal: {goal}")),
        ];
        let response = self.llm.invoke(&prompt).await?;

        let plan = self.parse_plan(&response, &goal);
        tracing::info!(steps = plan.len(), "plan created");

        let step_status: HashMap<usize, StepStatus> =
            (0..plan.len()).map(|i| (i, StepStatus::Pending)).collect();
        let tries: HashMap<usize, u32> = (0..plan.len()).map(|i| (i, 0)).collect();

        let update = StateUpdate {
            plan: Field::Set(plan),
            current_step: Field::Set(0),
            step_status: Field::Set(step_status),
            tries: Field::Set(tries),
            ..StateUpdate::default()
        };
        Ok(NodeCommand::with_update(update, NodeId::Supervisor))
    }
}
