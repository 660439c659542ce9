// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Runtime event bus
//!
//! In-memory pub/sub over tokio broadcast channels. Observers (SSE
//! bridges, CLI followers, security monitors) subscribe for run lifecycle
//! and security events. Events are lost on restart; persistence belongs to
//! the external event store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    RunStarted {
        thread_id: String,
        agent: String,
    },
    RunFinished {
        thread_id: String,
        agent: String,
        steps_done: usize,
        steps_total: usize,
    },
    ApprovalRequested {
        thread_id: String,
        approval_id: String,
        tool: String,
    },
    SecurityAlert {
        thread_id: String,
        kind: String,
        detail: String,
    },
}

#[derive(Clone)]
pub struct RuntimeEventBus {
    sender: Arc<broadcast::Sender<RuntimeEvent>>,
}

impl RuntimeEventBus {
    /// Capacity bounds how many events buffer before old ones drop.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender: Arc::new(sender) }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: RuntimeEvent) {
        // send() errors only when there are no subscribers; that's fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
