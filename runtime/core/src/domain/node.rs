// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Graph node vocabulary
//!
//! The execution graph has no static edges: a node returns a
//! [`NodeCommand`] naming the next node, and the executor follows it. The
//! only fixed transition is `Finalizer → Terminal`.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Node identity, routing commands, node trait

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::content_store::ContentStoreError;
use crate::domain::llm::LlmError;
use crate::domain::state::{StateUpdate, WorkingState};
use crate::domain::tools::ToolRunnerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Router,
    Planner,
    Supervisor,
    Executor,
    RiskGate,
    Tools,
    AwaitApproval,
    ApprovalHandler,
    Interpreter,
    Finalizer,
    /// Pseudo-node: reaching it ends the invocation.
    Terminal,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeId::Router => "Router",
            NodeId::Planner => "Planner",
            NodeId::Supervisor => "Supervisor",
            NodeId::Executor => "Executor",
            NodeId::RiskGate => "RiskGate",
            NodeId::Tools => "Tools",
            NodeId::AwaitApproval => "AwaitApproval",
            NodeId::ApprovalHandler => "ApprovalHandler",
            NodeId::Interpreter => "Interpreter",
            NodeId::Finalizer => "Finalizer",
            NodeId::Terminal => "Terminal",
        };
        f.write_str(name)
    }
}

/// What a node hands back to the executor: a state delta plus the next node.
#[derive(Debug)]
pub struct NodeCommand {
    pub update: StateUpdate,
    pub goto: NodeId,
}

impl NodeCommand {
    pub fn goto(next: NodeId) -> Self {
        Self { update: StateUpdate::default(), goto: next }
    }

    pub fn with_update(update: StateUpdate, next: NodeId) -> Self {
        Self { update, goto: next }
    }
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("LLM adapter failure: {0}")]
    Llm(#[from] LlmError),

    #[error("tool runner failure: {0}")]
    ToolRunner(#[from] ToolRunnerError),

    #[error("content store failure: {0}")]
    ContentStore(#[from] ContentStoreError),

    #[error("internal node fault: {0}")]
    Internal(String),
}

/// A node is a pure function of state — I/O only through collaborators
/// injected at construction time.
#[async_trait]
pub trait GraphNode: Send + Sync {
    fn id(&self) -> NodeId;

    async fn run(&self, state: &WorkingState) -> Result<NodeCommand, NodeError>;
}
