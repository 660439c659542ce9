// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HITL approval nodes
//!
//! AwaitApproval ends the invocation: it emits the approval instructions
//! (with a freshly signed convenience token) and hands off to Finalizer;
//! the run state is persisted by the transport and the next user reply
//! re-enters through Router. ApprovalHandler validates that reply — id
//! match, expiry, then an atomic verify-and-consume of the token bound to
//! `thread_id:user_id:approval_hash`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;

use crate::domain::node::{GraphNode, NodeCommand, NodeError, NodeId};
use crate::domain::state::{Field, Message, StateUpdate, WorkingState};
use crate::domain::tool::ToolResult;
use crate::infrastructure::token_manager::TokenManager;

/// The user-visible approval grammar. Case-insensitive, trimmed,
/// whitespace-insensitive between fields.
pub struct ApprovalGrammar {
    approve: Regex,
    reject: Regex,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalReply {
    Approve { id: String, token: String },
    Reject { id: String },
}

impl ApprovalGrammar {
    pub fn new() -> Self {
        Self {
            approve: Regex::new(r"(?i)^APPROVE\s+([A-Za-z0-9_-]{6,})\s+([A-Za-z0-9._-]{10,})$")
                .expect("static approve regex"),
            reject: Regex::new(r"(?i)^REJECT\s+([A-Za-z0-9_-]{6,})$")
                .expect("static reject regex"),
        }
    }

    pub fn parse(&self, message: &str) -> Option<ApprovalReply> {
        let trimmed = message.trim();
        if let Some(captures) = self.approve.captures(trimmed) {
            return Some(ApprovalReply::Approve {
                id: captures[1].to_string(),
                token: captures[2].to_string(),
            });
        }
        if let Some(captures) = self.reject.captures(trimmed) {
            return Some(ApprovalReply::Reject { id: captures[1].to_string() });
        }
        None
    }
}

impl Default for ApprovalGrammar {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal-for-this-invocation node: emits the convenience token message.
pub struct AwaitApprovalNode {
    tokens: Arc<TokenManager>,
}

impl AwaitApprovalNode {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl GraphNode for AwaitApprovalNode {
    fn id(&self) -> NodeId {
        NodeId::AwaitApproval
    }

    async fn run(&self, state: &WorkingState) -> Result<NodeCommand, NodeError> {
        let approval_id = state.approval_id.as_deref().unwrap_or("");
        let token = self.tokens.sign(&state.approval_payload());

        let message = Message::assistant(format!(
            "Authorization required.\n\
             To approve, reply: APPROVE {approval_id} {token}\n\
             To reject, reply: REJECT {approval_id}",
        ));
        Ok(NodeCommand::with_update(StateUpdate::message(message), NodeId::Finalizer))
    }
}

pub struct ApprovalHandlerNode {
    tokens: Arc<TokenManager>,
    grammar: ApprovalGrammar,
    max_age_seconds: i64,
}

impl ApprovalHandlerNode {
    pub fn new(tokens: Arc<TokenManager>, max_age_seconds: i64) -> Self {
        Self { tokens, grammar: ApprovalGrammar::new(), max_age_seconds }
    }
}

#[async_trait]
impl GraphNode for ApprovalHandlerNode {
    fn id(&self) -> NodeId {
        NodeId::ApprovalHandler
    }

    async fn run(&self, state: &WorkingState) -> Result<NodeCommand, NodeError> {
        let Some(message) = state.last_user_message() else {
            return Ok(NodeCommand::goto(NodeId::Supervisor));
        };

        match self.grammar.parse(message) {
            Some(ApprovalReply::Reject { id }) => {
                tracing::info!(approval_id = %id, "user rejected action");
                let update = StateUpdate {
                    awaiting_approval: Field::Set(false),
                    proposed_tool: Field::Set(None),
                    approval_id: Field::Set(None),
                    approval_hash: Field::Set(None),
                    approval_expires_at: Field::Set(None),
                    last_tool_result: Field::Set(Some(ToolResult::failed("User rejected action"))),
                    ..StateUpdate::default()
                };
                Ok(NodeCommand::with_update(update, NodeId::Supervisor))
            }
            Some(ApprovalReply::Approve { id, token }) => {
                // 1. Id must match the pending approval
                if Some(id.as_str()) != state.approval_id.as_deref() {
                    tracing::warn!(approval_id = %id, "approval id mismatch");
                    return Ok(NodeCommand::goto(NodeId::Supervisor));
                }

                // 2. Expiry
                let expired = state
                    .approval_expires_at
                    .map(|expires| Utc::now() > expires)
                    .unwrap_or(true);
                if expired {
                    tracing::warn!(approval_id = %id, "approval expired");
                    let update = StateUpdate {
                        awaiting_approval: Field::Set(false),
                        approval_id: Field::Set(None),
                        ..StateUpdate::default()
                    };
                    return Ok(NodeCommand::with_update(update, NodeId::Supervisor));
                }

                // 3. Atomic verify + consume under the binding payload
                let payload = state.approval_payload();
                if !self.tokens.verify_and_consume(&token, &payload, self.max_age_seconds) {
                    tracing::warn!(approval_id = %id, "approval token rejected");
                    return Ok(NodeCommand::goto(NodeId::Supervisor));
                }

                tracing::info!(approval_id = %id, "approval accepted");
                let update = StateUpdate {
                    awaiting_approval: Field::Set(false),
                    approval_id: Field::Set(None),
                    approval_expires_at: Field::Set(None),
                    audit_trail: vec![format!("approval {id} consumed")],
                    ..StateUpdate::default()
                };
                Ok(NodeCommand::with_update(update, NodeId::Tools))
            }
            // Router should have filtered this, but stay safe
            None => Ok(NodeCommand::goto(NodeId::Supervisor)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::Intent;
    use crate::domain::tool::{ProposedTool, ToolStatus};
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    fn tokens() -> Arc<TokenManager> {
        Arc::new(TokenManager::new("unit-test-secret-key-0123456789abcd", false).unwrap())
    }

    fn pending_state() -> WorkingState {
        let mut state = WorkingState::new("thread-1", "user-1", Intent::Task);
        state.plan = vec!["step".into()];
        let proposal = ProposedTool::from_args("read_file", json!({"path": ".env"}), 0);
        state.approval_hash = Some(proposal.args_hash.clone());
        state.proposed_tool = Some(proposal);
        state.awaiting_approval = true;
        state.approval_id = Some("auth_abcd1234".into());
        state.approval_expires_at = Some(Utc::now() + ChronoDuration::seconds(300));
        state
    }

    #[test]
    fn test_grammar_case_and_whitespace() {
        let grammar = ApprovalGrammar::new();
        assert!(matches!(
            grammar.parse("  approve auth_abcd1234   v1.1.2.3456789012  "),
            Some(ApprovalReply::Approve { .. })
        ));
        assert!(matches!(
            grammar.parse("ReJeCt auth_abcd1234"),
            Some(ApprovalReply::Reject { .. })
        ));
        assert!(grammar.parse("APPROVE short x").is_none());
        assert!(grammar.parse("yes please").is_none());
    }

    #[tokio::test]
    async fn test_await_approval_emits_usable_token() {
        let tokens = tokens();
        let node = AwaitApprovalNode::new(tokens.clone());
        let mut state = pending_state();

        let cmd = node.run(&state).await.unwrap();
        cmd.update.apply(&mut state);
        assert_eq!(cmd.goto, NodeId::Finalizer);

        let text = state.messages.last().unwrap().content.clone();
        assert!(text.contains("APPROVE auth_abcd1234 "));

        // The embedded token verifies against the binding payload
        let token = text
            .lines()
            .find(|l| l.contains("APPROVE"))
            .and_then(|l| l.split_whitespace().last())
            .unwrap()
            .to_string();
        assert!(tokens.verify(&token, &state.approval_payload(), 300));
    }

    #[tokio::test]
    async fn test_reject_clears_state_and_fails_result() {
        let tokens = tokens();
        let node = ApprovalHandlerNode::new(tokens, 300);
        let mut state = pending_state();
        state.messages.push(Message::user("REJECT auth_abcd1234"));

        let cmd = node.run(&state).await.unwrap();
        cmd.update.apply(&mut state);

        assert_eq!(cmd.goto, NodeId::Supervisor);
        assert!(!state.awaiting_approval);
        assert!(state.proposed_tool.is_none());
        assert_eq!(state.last_tool_result.unwrap().status, ToolStatus::Failed);
    }

    #[tokio::test]
    async fn test_correct_approval_goes_to_tools() {
        let tokens = tokens();
        let node = ApprovalHandlerNode::new(tokens.clone(), 300);
        let mut state = pending_state();
        let token = tokens.sign(&state.approval_payload());
        state
            .messages
            .push(Message::user(format!("APPROVE auth_abcd1234 {token}")));

        let cmd = node.run(&state).await.unwrap();
        cmd.update.apply(&mut state);

        assert_eq!(cmd.goto, NodeId::Tools);
        assert!(!state.awaiting_approval);
        // Proposal survives so Tools can execute it
        assert!(state.proposed_tool.is_some());
    }

    #[tokio::test]
    async fn test_wrong_id_goes_to_supervisor() {
        let tokens = tokens();
        let node = ApprovalHandlerNode::new(tokens.clone(), 300);
        let mut state = pending_state();
        let token = tokens.sign(&state.approval_payload());
        state
            .messages
            .push(Message::user(format!("APPROVE auth_ffffffff {token}")));

        let cmd = node.run(&state).await.unwrap();
        assert_eq!(cmd.goto, NodeId::Supervisor);
    }

    #[tokio::test]
    async fn test_wrong_token_goes_to_supervisor() {
        let tokens = tokens();
        let node = ApprovalHandlerNode::new(tokens.clone(), 300);
        let mut state = pending_state();
        let forged = tokens.sign("some:other:payload");
        state
            .messages
            .push(Message::user(format!("APPROVE auth_abcd1234 {forged}")));

        let cmd = node.run(&state).await.unwrap();
        assert_eq!(cmd.goto, NodeId::Supervisor);
    }

    #[tokio::test]
    async fn test_expired_approval_rejected() {
        let tokens = tokens();
        let node = ApprovalHandlerNode::new(tokens.clone(), 300);
        let mut state = pending_state();
        state.approval_expires_at = Some(Utc::now() - ChronoDuration::seconds(1));
        let token = tokens.sign(&state.approval_payload());
        state
            .messages
            .push(Message::user(format!("APPROVE auth_abcd1234 {token}")));

        let cmd = node.run(&state).await.unwrap();
        let mut state = state;
        cmd.update.apply(&mut state);

        assert_eq!(cmd.goto, NodeId::Supervisor);
        assert!(!state.awaiting_approval);
    }

    #[tokio::test]
    async fn test_token_replay_rejected() {
        let tokens = tokens();
        let node = ApprovalHandlerNode::new(tokens.clone(), 300);
        let mut state = pending_state();
        let token = tokens.sign(&state.approval_payload());
        state
            .messages
            .push(Message::user(format!("APPROVE auth_abcd1234 {token}")));

        let cmd = node.run(&state).await.unwrap();
        assert_eq!(cmd.goto, NodeId::Tools);

        // Same reply again: token already consumed
        let cmd = node.run(&state).await.unwrap();
        assert_eq!(cmd.goto, NodeId::Supervisor);
    }
}
