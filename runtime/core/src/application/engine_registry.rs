// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Engine registry: per-agent engine lifecycle
//!
//! Double-checked cache behind a per-agent async mutex: one initialization
//! in flight per agent, and prune/close serialize against get on the same
//! mutex, so a looked-up engine cannot be closed underneath its caller.
//! Failed constructions are never cached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::application::engine::{Engine, EngineError};
use crate::domain::agent::{AgentDefinition, AgentDefinitionLoader};

/// Builds an engine from a loaded definition. Kept as a seam so deployments
/// control service wiring (and tests inject scripted collaborators).
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self, definition: AgentDefinition) -> Result<Arc<Engine>, EngineError>;
}

struct EngineSlot {
    engine: Arc<Engine>,
    last_used: Instant,
}

pub struct EngineRegistry {
    loader: Arc<dyn AgentDefinitionLoader>,
    factory: Arc<dyn EngineFactory>,
    engines: DashMap<String, EngineSlot>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EngineRegistry {
    pub fn new(loader: Arc<dyn AgentDefinitionLoader>, factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            loader,
            factory,
            engines: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, agent_name: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(agent_name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Cached engine for the agent, creating it on demand. `last_used` is
    /// refreshed on both hit and miss.
    pub async fn get_engine(&self, agent_name: &str) -> Result<Arc<Engine>, EngineError> {
        let lock = self.lock_for(agent_name);
        let _guard = lock.lock().await;

        if let Some(mut slot) = self.engines.get_mut(agent_name) {
            slot.last_used = Instant::now();
            return Ok(slot.engine.clone());
        }

        tracing::info!(agent = agent_name, "initializing new engine");
        let definition = self.loader.load(agent_name).await?;
        let engine = self.factory.create(definition).await?;

        self.engines.insert(
            agent_name.to_string(),
            EngineSlot { engine: engine.clone(), last_used: Instant::now() },
        );
        Ok(engine)
    }

    /// Evict engines idle past the TTL. Each removal happens under that
    /// agent's mutex and re-checks idleness, so a concurrent `get_engine`
    /// either wins the lock first (refreshing `last_used`) or waits for
    /// the close to complete.
    pub async fn prune(&self, ttl: Duration) {
        let stale: Vec<String> = self
            .engines
            .iter()
            .filter(|entry| entry.last_used.elapsed() > ttl)
            .map(|entry| entry.key().clone())
            .collect();

        for agent_name in stale {
            let lock = self.lock_for(&agent_name);
            let _guard = lock.lock().await;

            let still_stale = self
                .engines
                .get(&agent_name)
                .map(|slot| slot.last_used.elapsed() > ttl)
                .unwrap_or(false);
            if !still_stale {
                continue;
            }

            if let Some((_, slot)) = self.engines.remove(&agent_name) {
                tracing::info!(agent = %agent_name, "pruning inactive engine");
                slot.engine.close();
            }
            drop(_guard);
            self.locks.remove(&agent_name);
        }
    }

    /// Close every engine and clear the cache. Used on definition reload.
    /// Engines close concurrently, each under its own agent mutex.
    pub async fn reload_all(&self) {
        let names: Vec<String> = self.engines.iter().map(|e| e.key().clone()).collect();
        futures::future::join_all(names.into_iter().map(|agent_name| async move {
            let lock = self.lock_for(&agent_name);
            let _guard = lock.lock().await;
            if let Some((_, slot)) = self.engines.remove(&agent_name) {
                slot.engine.close();
            }
        }))
        .await;
        self.locks.clear();
        tracing::info!("engine registry cleared");
    }

    pub fn active_count(&self) -> usize {
        self.engines.len()
    }
}
