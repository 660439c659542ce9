// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Router node: decides the entry route for each invocation

use async_trait::async_trait;

use crate::application::nodes::approval::ApprovalGrammar;
use crate::domain::node::{GraphNode, NodeCommand, NodeError, NodeId};
use crate::domain::state::{Intent, WorkingState};

pub struct RouterNode {
    grammar: ApprovalGrammar,
}

impl RouterNode {
    pub fn new() -> Self {
        Self { grammar: ApprovalGrammar::new() }
    }
}

impl Default for RouterNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphNode for RouterNode {
    fn id(&self) -> NodeId {
        NodeId::Router
    }

    async fn run(&self, state: &WorkingState) -> Result<NodeCommand, NodeError> {
        // 1. HITL reply check: only a well-formed APPROVE/REJECT goes to the
        // handler; anything else while approval is pending is a regular turn
        if state.awaiting_approval {
            let is_approval_reply = state
                .last_user_message()
                .map(|msg| self.grammar.parse(msg).is_some())
                .unwrap_or(false);
            let next = if is_approval_reply {
                NodeId::ApprovalHandler
            } else {
                NodeId::Supervisor
            };
            tracing::debug!(%next, "router: approval pending");
            return Ok(NodeCommand::goto(next));
        }

        // 2. Pending question reply
        if state.awaiting_user_input {
            return Ok(NodeCommand::goto(NodeId::Supervisor));
        }

        // 3. Intent routing
        let next = match state.intent {
            Intent::Conversation => NodeId::Finalizer,
            Intent::Task if state.plan.is_empty() => NodeId::Planner,
            Intent::Task => NodeId::Supervisor,
            Intent::Requirements => NodeId::Supervisor,
        };
        Ok(NodeCommand::goto(next))
    }
}
