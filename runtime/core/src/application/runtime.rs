// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Runtime bootstrap
//!
//! Wires the process-wide services (token manager, audit chain,
//! idempotency cache + sweeper, event bus) from a validated config and
//! exposes the engine registry behind one handle with explicit init and
//! teardown. Transports hold a `WardRuntime` and submit runs through it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::application::engine::{Engine, EngineError, EngineServices, RunRequest};
use crate::application::engine_registry::{EngineFactory, EngineRegistry};
use crate::application::events::RuntimeEventBus;
use crate::config::RuntimeConfig;
use crate::domain::agent::{AgentDefinition, AgentDefinitionLoader};
use crate::domain::llm::LlmAdapter;
use crate::domain::state::WorkingState;
use crate::domain::tools::ToolRunner;
use crate::infrastructure::audit::AuditLogger;
use crate::infrastructure::content_store::LocalContentStore;
use crate::infrastructure::dlp::RegexDlpScanner;
use crate::infrastructure::idempotency::IdempotencyStore;
use crate::infrastructure::token_manager::TokenManager;

struct ServiceEngineFactory {
    services: EngineServices,
    config: RuntimeConfig,
}

#[async_trait::async_trait]
impl EngineFactory for ServiceEngineFactory {
    async fn create(&self, definition: AgentDefinition) -> Result<Arc<Engine>, EngineError> {
        Ok(Arc::new(Engine::new(
            definition,
            self.services.clone(),
            &self.config,
        )?))
    }
}

pub struct WardRuntime {
    config: RuntimeConfig,
    registry: Arc<EngineRegistry>,
    events: RuntimeEventBus,
    sweeper: tokio::task::JoinHandle<()>,
}

impl WardRuntime {
    /// Build the process singletons from config. Must run inside a tokio
    /// runtime (the idempotency sweeper is spawned here).
    pub async fn init(
        config: RuntimeConfig,
        llm: Arc<dyn LlmAdapter>,
        runner: Arc<dyn ToolRunner>,
        loader: Arc<dyn AgentDefinitionLoader>,
    ) -> anyhow::Result<Self> {
        config.validate().context("invalid runtime configuration")?;

        let tokens = Arc::new(
            TokenManager::new(&config.secret_key, config.dev_mode)
                .context("token manager initialization")?,
        );
        let audit = Arc::new(AuditLogger::new(&config.audit_log_path));
        let idempotency = Arc::new(IdempotencyStore::new());
        let sweeper = IdempotencyStore::start_sweeper(Arc::clone(&idempotency));
        let events = RuntimeEventBus::with_default_capacity();

        let services = EngineServices {
            llm,
            runner,
            dlp: Arc::new(RegexDlpScanner::new()),
            content_store: Arc::new(LocalContentStore::new(&config.eviction_dir)),
            audit,
            tokens,
            idempotency,
            events: events.clone(),
        };

        let factory = Arc::new(ServiceEngineFactory {
            services,
            config: config.clone(),
        });
        let registry = Arc::new(EngineRegistry::new(loader, factory));

        tracing::info!(sandbox = %config.sandbox_root.display(), "runtime initialized");
        Ok(Self { config, registry, events, sweeper })
    }

    pub fn registry(&self) -> Arc<EngineRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn events(&self) -> &RuntimeEventBus {
        &self.events
    }

    /// Submit a run to the named agent's engine.
    pub async fn run(
        &self,
        agent_name: &str,
        request: RunRequest,
    ) -> Result<WorkingState, EngineError> {
        let engine = self.registry.get_engine(agent_name).await?;
        Ok(engine.run(request).await)
    }

    /// Re-enter a persisted run after a user reply.
    pub async fn resume(
        &self,
        agent_name: &str,
        state: WorkingState,
    ) -> Result<WorkingState, EngineError> {
        let engine = self.registry.get_engine(agent_name).await?;
        Ok(engine.resume(state).await)
    }

    /// Evict engines idle past the configured TTL.
    pub async fn prune_idle_engines(&self) {
        self.registry
            .prune(Duration::from_secs(self.config.engine_idle_ttl_seconds))
            .await;
    }

    /// Teardown: stop the sweeper, close every engine.
    pub async fn shutdown(self) {
        self.sweeper.abort();
        self.registry.reload_all().await;
        tracing::info!("runtime shut down");
    }
}
