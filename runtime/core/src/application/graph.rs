// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Graph executor
//!
//! Drives the node state machine: apply the current node, merge its update
//! through the reducer, follow its `goto`. Edges are data, not structure —
//! the executor holds only a `NodeId → node` map.
//!
//! Fault containment: a node error becomes a failed tool result routed to
//! Finalizer; the transition ceiling and cancellation checks also route
//! there, so every run terminates with a user-visible message.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::node::{GraphNode, NodeId};
use crate::domain::state::{Message, WorkingState};
use crate::domain::tool::ToolResult;

pub struct GraphExecutor {
    nodes: HashMap<NodeId, Arc<dyn GraphNode>>,
    transition_limit: usize,
}

impl GraphExecutor {
    pub fn new(transition_limit: usize) -> Self {
        Self { nodes: HashMap::new(), transition_limit }
    }

    pub fn register(&mut self, node: Arc<dyn GraphNode>) {
        self.nodes.insert(node.id(), node);
    }

    pub async fn invoke(&self, initial: WorkingState) -> WorkingState {
        self.invoke_cancellable(initial, CancellationToken::new()).await
    }

    /// Advance node-by-node until a node yields `goto = Terminal`.
    /// Cancellation is observed between nodes, where state is consistent.
    pub async fn invoke_cancellable(
        &self,
        initial: WorkingState,
        cancel: CancellationToken,
    ) -> WorkingState {
        let mut state = initial;
        let mut current = NodeId::Router;
        let mut transitions = 0usize;

        while current != NodeId::Terminal {
            if current != NodeId::Finalizer {
                if cancel.is_cancelled() {
                    tracing::warn!(thread_id = %state.thread_id, "run cancelled between nodes");
                    state.last_tool_result = Some(ToolResult::failed("Run cancelled"));
                    current = NodeId::Finalizer;
                    continue;
                }
                if transitions >= self.transition_limit {
                    tracing::error!(
                        thread_id = %state.thread_id,
                        limit = self.transition_limit,
                        "node transition limit exceeded"
                    );
                    state.last_tool_result = Some(ToolResult::failed(format!(
                        "Step limit exceeded ({} node transitions)",
                        self.transition_limit,
                    )));
                    current = NodeId::Finalizer;
                    continue;
                }
            }

            let Some(node) = self.nodes.get(&current) else {
                tracing::error!(node = %current, "no implementation registered for node");
                if current == NodeId::Finalizer {
                    break;
                }
                state.last_tool_result =
                    Some(ToolResult::failed(format!("System error: unknown node {current}")));
                current = NodeId::Finalizer;
                continue;
            };

            tracing::debug!(node = %current, transitions, "applying node");
            match node.run(&state).await {
                Ok(command) => {
                    command.update.apply(&mut state);
                    current = command.goto;
                }
                Err(e) => {
                    tracing::error!(node = %current, error = %e, "node fault");
                    if current == NodeId::Finalizer {
                        // Finalizer itself failed; still leave the user a message
                        state
                            .messages
                            .push(Message::assistant("The run ended with an internal error."));
                        break;
                    }
                    state.last_tool_result = Some(ToolResult::failed(format!("{e}")));
                    current = NodeId::Finalizer;
                }
            }

            transitions += 1;
            // Cooperative: yield between nodes
            tokio::task::yield_now().await;
        }

        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::node::{NodeCommand, NodeError};
    use crate::domain::state::{Intent, StateUpdate};
    use async_trait::async_trait;

    struct StaticNode {
        id: NodeId,
        next: NodeId,
    }

    #[async_trait]
    impl GraphNode for StaticNode {
        fn id(&self) -> NodeId {
            self.id
        }

        async fn run(&self, _state: &WorkingState) -> Result<NodeCommand, NodeError> {
            Ok(NodeCommand::goto(self.next))
        }
    }

    struct EmitNode {
        id: NodeId,
        next: NodeId,
        text: &'static str,
    }

    #[async_trait]
    impl GraphNode for EmitNode {
        fn id(&self) -> NodeId {
            self.id
        }

        async fn run(&self, _state: &WorkingState) -> Result<NodeCommand, NodeError> {
            Ok(NodeCommand::with_update(
                StateUpdate::message(Message::assistant(self.text)),
                self.next,
            ))
        }
    }

    struct FaultyNode;

    #[async_trait]
    impl GraphNode for FaultyNode {
        fn id(&self) -> NodeId {
            NodeId::Router
        }

        async fn run(&self, _state: &WorkingState) -> Result<NodeCommand, NodeError> {
            Err(NodeError::Internal("router exploded".into()))
        }
    }

    fn finalizer() -> Arc<dyn GraphNode> {
        Arc::new(EmitNode { id: NodeId::Finalizer, next: NodeId::Terminal, text: "done" })
    }

    #[tokio::test]
    async fn test_simple_run_terminates() {
        let mut executor = GraphExecutor::new(64);
        executor.register(Arc::new(StaticNode { id: NodeId::Router, next: NodeId::Finalizer }));
        executor.register(finalizer());

        let state = executor.invoke(WorkingState::new("t", "u", Intent::Task)).await;
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].content, "done");
    }

    #[tokio::test]
    async fn test_node_fault_routes_to_finalizer() {
        let mut executor = GraphExecutor::new(64);
        executor.register(Arc::new(FaultyNode));
        executor.register(finalizer());

        let state = executor.invoke(WorkingState::new("t", "u", Intent::Task)).await;
        let result = state.last_tool_result.unwrap();
        assert!(result.output.as_str().unwrap().contains("router exploded"));
        assert_eq!(state.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_transition_limit_enforced() {
        struct PingPong {
            id: NodeId,
            next: NodeId,
        }

        #[async_trait]
        impl GraphNode for PingPong {
            fn id(&self) -> NodeId {
                self.id
            }
            async fn run(&self, _state: &WorkingState) -> Result<NodeCommand, NodeError> {
                Ok(NodeCommand::goto(self.next))
            }
        }

        let mut executor = GraphExecutor::new(10);
        executor.register(Arc::new(PingPong { id: NodeId::Router, next: NodeId::Supervisor }));
        executor.register(Arc::new(PingPong { id: NodeId::Supervisor, next: NodeId::Router }));
        executor.register(finalizer());

        let state = executor.invoke(WorkingState::new("t", "u", Intent::Task)).await;
        let result = state.last_tool_result.unwrap();
        assert!(result.output.as_str().unwrap().contains("Step limit exceeded"));
        // Finalizer still produced a message
        assert_eq!(state.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_node_fails_cleanly() {
        let mut executor = GraphExecutor::new(64);
        // Router registered, Finalizer registered, but Router routes to an
        // unregistered Planner
        executor.register(Arc::new(StaticNode { id: NodeId::Router, next: NodeId::Planner }));
        executor.register(finalizer());

        let state = executor.invoke(WorkingState::new("t", "u", Intent::Task)).await;
        let result = state.last_tool_result.unwrap();
        assert!(result.output.as_str().unwrap().contains("unknown node"));
    }

    #[tokio::test]
    async fn test_cancellation_routes_to_finalizer() {
        let mut executor = GraphExecutor::new(64);
        executor.register(Arc::new(StaticNode { id: NodeId::Router, next: NodeId::Supervisor }));
        executor.register(Arc::new(StaticNode { id: NodeId::Supervisor, next: NodeId::Finalizer }));
        executor.register(finalizer());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let state = executor
            .invoke_cancellable(WorkingState::new("t", "u", Intent::Task), cancel)
            .await;

        let result = state.last_tool_result.unwrap();
        assert!(result.output.as_str().unwrap().contains("cancelled"));
        assert_eq!(state.messages.len(), 1);
    }
}
