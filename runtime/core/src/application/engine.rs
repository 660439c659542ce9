// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Engine: one agent's wired execution graph
//!
//! An engine binds an agent definition to the node graph and the injected
//! services (LLM adapter, tool runner, caches, audit). Engines are created
//! and cached by the [`crate::application::engine_registry::EngineRegistry`];
//! closing an engine cancels its scoped token, which interrupts in-flight
//! runs at the next node boundary.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::application::events::{RuntimeEvent, RuntimeEventBus};
use crate::application::graph::GraphExecutor;
use crate::application::nodes::{
    ApprovalHandlerNode, AwaitApprovalNode, ExecutorNode, FinalizerNode, InterpreterNode,
    PlannerNode, RiskGateNode, RouterNode, SupervisorNode, ToolsNode,
};
use crate::config::RuntimeConfig;
use crate::domain::agent::{AgentDefinition, AgentLoadError};
use crate::domain::content_store::ContentStore;
use crate::domain::dlp::DlpScanner;
use crate::domain::llm::LlmAdapter;
use crate::domain::risk::RiskPolicy;
use crate::domain::state::{Intent, Message, StepStatus, WorkingState};
use crate::domain::tools::{RegistryError, ToolRegistry, ToolRunner};
use crate::domain::validator::ArgumentValidator;
use crate::infrastructure::audit::AuditLogger;
use crate::infrastructure::idempotency::IdempotencyStore;
use crate::infrastructure::token_manager::TokenManager;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("agent load failure: {0}")]
    Load(#[from] AgentLoadError),

    #[error("tool registration failure: {0}")]
    Registry(#[from] RegistryError),

    #[error("engine initialization failure: {0}")]
    Init(String),
}

/// External collaborators and shared caches an engine is wired with.
/// Shared across engines: the caches and audit chain are process-wide.
#[derive(Clone)]
pub struct EngineServices {
    pub llm: Arc<dyn LlmAdapter>,
    pub runner: Arc<dyn ToolRunner>,
    pub dlp: Arc<dyn DlpScanner>,
    pub content_store: Arc<dyn ContentStore>,
    pub audit: Arc<AuditLogger>,
    pub tokens: Arc<TokenManager>,
    pub idempotency: Arc<IdempotencyStore>,
    pub events: RuntimeEventBus,
}

/// One run submission.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub thread_id: String,
    pub user_id: String,
    pub goal: String,
    pub intent: Intent,
    pub authenticated: bool,
    pub do_not_store: bool,
}

pub struct Engine {
    agent: AgentDefinition,
    graph: GraphExecutor,
    events: RuntimeEventBus,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        agent: AgentDefinition,
        services: EngineServices,
        config: &RuntimeConfig,
    ) -> Result<Self, EngineError> {
        // Warmup: populate the registry from the agent definition
        let registry = Arc::new(ToolRegistry::new());
        for tool in &agent.tools {
            registry.register(tool.name.clone(), tool.schema.clone())?;
        }
        tracing::info!(agent = %agent.name, tools = agent.tools.len(), "engine warmup");

        let validator = Arc::new(ArgumentValidator::new(
            &config.sandbox_root,
            config.email_domain_allowlist.clone(),
        ));
        let policy = Arc::new(RiskPolicy::new(&config.sandbox_root));

        let mut graph = GraphExecutor::new(config.node_transition_limit);
        graph.register(Arc::new(RouterNode::new()));
        graph.register(Arc::new(PlannerNode::new(
            services.llm.clone(),
            config.max_plan_steps,
        )));
        graph.register(Arc::new(SupervisorNode::new(config.max_retries_per_step)));
        graph.register(Arc::new(ExecutorNode::new(
            services.llm.clone(),
            registry.clone(),
            validator,
        )));
        graph.register(Arc::new(RiskGateNode::new(
            policy,
            services.dlp.clone(),
            services.audit.clone(),
            services.events.clone(),
            config.approval_ttl_seconds,
            config.max_retries_per_step,
        )));
        graph.register(Arc::new(ToolsNode::new(
            services.runner.clone(),
            services.idempotency.clone(),
            Duration::from_secs(config.tool_timeout_seconds),
            Duration::from_secs(config.idempotency_ttl_seconds),
        )));
        graph.register(Arc::new(InterpreterNode::new(
            services.content_store.clone(),
            services.dlp.clone(),
            config.eviction_threshold_chars,
            config.summary_max_chars,
            config.rehydration_max_chars,
        )));
        graph.register(Arc::new(AwaitApprovalNode::new(services.tokens.clone())));
        graph.register(Arc::new(ApprovalHandlerNode::new(
            services.tokens.clone(),
            config.approval_ttl_seconds,
        )));
        graph.register(Arc::new(FinalizerNode::new()));

        Ok(Self {
            agent,
            graph,
            events: services.events,
            cancel: CancellationToken::new(),
        })
    }

    pub fn agent_name(&self) -> &str {
        &self.agent.name
    }

    /// Start a fresh run for a goal.
    pub async fn run(&self, request: RunRequest) -> WorkingState {
        let mut state =
            WorkingState::new(request.thread_id, request.user_id, request.intent);
        state.authenticated = request.authenticated;
        state.do_not_store = request.do_not_store;
        state.messages.push(Message::user(request.goal));
        self.resume(state).await
    }

    /// Re-enter the graph with persisted state (the transport appends the
    /// new user message before calling this).
    pub async fn resume(&self, state: WorkingState) -> WorkingState {
        let thread_id = state.thread_id.clone();
        self.events.publish(RuntimeEvent::RunStarted {
            thread_id: thread_id.clone(),
            agent: self.agent.name.clone(),
        });

        let final_state = self
            .graph
            .invoke_cancellable(state, self.cancel.child_token())
            .await;

        let steps_done = final_state
            .step_status
            .values()
            .filter(|s| **s == StepStatus::Done)
            .count();
        self.events.publish(RuntimeEvent::RunFinished {
            thread_id,
            agent: self.agent.name.clone(),
            steps_done,
            steps_total: final_state.plan.len(),
        });
        final_state
    }

    /// Cancel in-flight runs and refuse further work from this instance.
    pub fn close(&self) {
        tracing::info!(agent = %self.agent.name, "engine closed");
        self.cancel.cancel();
    }
}
