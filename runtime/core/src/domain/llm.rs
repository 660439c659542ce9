// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! LLM adapter interface (Anti-Corruption Layer)
//!
//! Planner, Executor, and optionally Finalizer talk to the language model
//! only through this trait. Implementations live outside the core crate;
//! callers must treat `invoke` as retry-safe.

use async_trait::async_trait;

use crate::domain::state::Message;

/// Domain interface for LLM providers. Isolates node logic from vendor
/// APIs; no streaming requirement for correctness.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn invoke(&self, messages: &[Message]) -> Result<String, LlmError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limit exceeded")]
    RateLimit,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
