// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Idempotency store
//!
//! TTL cache of interpreted tool results keyed by
//! `sha256(thread_id:step_idx:args_hash)`. Guarantees at-most-once tool
//! execution for a given triple within the TTL, including across
//! concurrent retries inside a live process. The interface matches a
//! distributed kv (get / set-with-ttl) so a Redis-class backend can
//! replace it unchanged.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::domain::canonical::sha256_hex;
use crate::domain::tool::ToolResult;

/// Sweep cadence for the background expiry task.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Key for one `(thread, step, args)` execution context.
pub fn idempotency_key(thread_id: &str, step_idx: usize, args_hash: &str) -> String {
    sha256_hex(&format!("{thread_id}:{step_idx}:{args_hash}"))
}

struct Entry {
    value: ToolResult,
    expires_at: Instant,
}

pub struct IdempotencyStore {
    entries: DashMap<String, Entry>,
}

impl IdempotencyStore {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    /// Cached result, or `None` if missing or expired. Expired entries are
    /// removed lazily here in addition to the background sweep.
    pub fn get(&self, key: &str) -> Option<ToolResult> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, value: ToolResult, ttl: Duration) {
        self.entries.insert(
            key.into(),
            Entry { value, expires_at: Instant::now() + ttl },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    /// Spawn the 60 s background sweep. The returned handle aborts the task
    /// when dropped by the owning registry's teardown.
    pub fn start_sweeper(store: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.sweep();
            }
        })
    }
}

impl Default for IdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}
