// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Per-run working state and its reducer
//!
//! `WorkingState` is the single mutable value a run carries between nodes.
//! Nodes never touch it directly: they return a [`StateUpdate`] and the graph
//! executor merges it through [`StateUpdate::apply`]. The merge rules are
//! field-specific — `messages`, `security_findings`, and `audit_trail` are
//! append-only; every other field is replace-on-present.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Run state aggregate + reducer

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::tool::{ProposedTool, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// What the caller wants from this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Conversation,
    #[default]
    Task,
    Requirements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// A security-relevant observation appended by RiskGate or the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityFinding {
    pub kind: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl SecurityFinding {
    pub fn new(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { kind: kind.into(), detail: detail.into(), at: Utc::now() }
    }
}

/// The mutable state of one run through the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingState {
    pub thread_id: String,
    pub user_id: String,
    pub intent: Intent,
    /// Whether the submitting caller passed upstream authentication.
    /// Consumed by RiskGate's sandbox rule.
    pub authenticated: bool,

    pub messages: Vec<Message>,

    pub plan: Vec<String>,
    pub current_step: usize,
    pub step_status: HashMap<usize, StepStatus>,
    pub tries: HashMap<usize, u32>,

    pub proposed_tool: Option<ProposedTool>,
    pub last_tool_result: Option<ToolResult>,

    pub awaiting_user_input: bool,
    pub question: Option<String>,

    pub awaiting_approval: bool,
    pub approval_id: Option<String>,
    pub approval_hash: Option<String>,
    pub approval_expires_at: Option<DateTime<Utc>>,

    pub do_not_store: bool,

    pub security_findings: Vec<SecurityFinding>,
    pub audit_trail: Vec<String>,
}

impl WorkingState {
    pub fn new(
        thread_id: impl Into<String>,
        user_id: impl Into<String>,
        intent: Intent,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            user_id: user_id.into(),
            intent,
            authenticated: false,
            messages: Vec::new(),
            plan: Vec::new(),
            current_step: 0,
            step_status: HashMap::new(),
            tries: HashMap::new(),
            proposed_tool: None,
            last_tool_result: None,
            awaiting_user_input: false,
            question: None,
            awaiting_approval: false,
            approval_id: None,
            approval_hash: None,
            approval_expires_at: None,
            do_not_store: false,
            security_findings: Vec::new(),
            audit_trail: Vec::new(),
        }
    }

    /// Content of the most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// The approval binding payload `thread_id:user_id:approval_hash`.
    pub fn approval_payload(&self) -> String {
        format!(
            "{}:{}:{}",
            self.thread_id,
            self.user_id,
            self.approval_hash.as_deref().unwrap_or("")
        )
    }
}

/// Replace-on-present cell for the reducer. `Keep` leaves the target field
/// untouched; `Set` overwrites it, including `Set(None)` for clearing
/// optional fields such as `proposed_tool`.
#[derive(Debug, Clone, Default)]
pub enum Field<T> {
    #[default]
    Keep,
    Set(T),
}

impl<T> Field<T> {
    fn apply_to(self, slot: &mut T) {
        if let Field::Set(value) = self {
            *slot = value;
        }
    }
}

/// The only way nodes mutate [`WorkingState`].
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    /// Appended in order; never replaced.
    pub messages: Vec<Message>,

    pub intent: Field<Intent>,
    pub plan: Field<Vec<String>>,
    pub current_step: Field<usize>,
    pub step_status: Field<HashMap<usize, StepStatus>>,
    pub tries: Field<HashMap<usize, u32>>,
    pub proposed_tool: Field<Option<ProposedTool>>,
    pub last_tool_result: Field<Option<ToolResult>>,
    pub awaiting_user_input: Field<bool>,
    pub question: Field<Option<String>>,
    pub awaiting_approval: Field<bool>,
    pub approval_id: Field<Option<String>>,
    pub approval_hash: Field<Option<String>>,
    pub approval_expires_at: Field<Option<DateTime<Utc>>>,

    /// Appended; security findings are never retracted.
    pub security_findings: Vec<SecurityFinding>,
    /// Appended; human-readable audit breadcrumbs for the run transcript.
    pub audit_trail: Vec<String>,
}

impl StateUpdate {
    pub fn apply(self, state: &mut WorkingState) {
        state.messages.extend(self.messages);
        self.intent.apply_to(&mut state.intent);
        self.plan.apply_to(&mut state.plan);
        self.current_step.apply_to(&mut state.current_step);
        self.step_status.apply_to(&mut state.step_status);
        self.tries.apply_to(&mut state.tries);
        self.proposed_tool.apply_to(&mut state.proposed_tool);
        self.last_tool_result.apply_to(&mut state.last_tool_result);
        self.awaiting_user_input.apply_to(&mut state.awaiting_user_input);
        self.question.apply_to(&mut state.question);
        self.awaiting_approval.apply_to(&mut state.awaiting_approval);
        self.approval_id.apply_to(&mut state.approval_id);
        self.approval_hash.apply_to(&mut state.approval_hash);
        self.approval_expires_at.apply_to(&mut state.approval_expires_at);
        state.security_findings.extend(self.security_findings);
        state.audit_trail.extend(self.audit_trail);
    }

    /// Shorthand for an update that only appends one message.
    pub fn message(message: Message) -> Self {
        Self { messages: vec![message], ..Self::default() }
    }

    /// Shorthand for an update that only records a tool result.
    pub fn result(result: ToolResult) -> Self {
        Self { last_tool_result: Field::Set(Some(result)), ..Self::default() }
    }
}
