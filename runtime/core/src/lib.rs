// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # ward-core
//!
//! The central crate of WARD, the 100monkeys.ai zero-trust agentic
//! execution runtime. It owns the execution-graph domain model, the node
//! state machine, and the security chokepoints every tool call must pass.
//!
//! ## Execution flow
//!
//! ```text
//! Router → Planner → Supervisor → Executor → RiskGate ─┬→ Tools → Interpreter → Supervisor
//!                                                      ├→ AwaitApproval → Finalizer (suspend)
//!                                                      └→ Interpreter (blocked)
//! Finalizer → Terminal
//! ```
//!
//! Routing is dynamic: nodes return `(update, goto)` commands and the
//! [`application::graph::GraphExecutor`] follows them; edges are data.
//!
//! ## Security model
//!
//! - **Zero trust at the gate.** The LLM proposes `{name, args}` only;
//!   canonical forms and hashes are computed server-side and recomputed at
//!   [`application::nodes::RiskGateNode`] before any policy decision.
//! - **HITL approvals.** Sensitive actions suspend the run and require a
//!   single-use HMAC token bound to `(thread, user, args_hash)` —
//!   [`infrastructure::token_manager::TokenManager`].
//! - **At-most-once tools.** Completed invocations are cached by
//!   `(thread, step, args_hash)` — [`infrastructure::idempotency`].
//! - **Tamper-evident audit.** Every gate decision lands in a hash-chained
//!   JSONL log — [`infrastructure::audit`].
//!
//! ## Layer structure
//!
//! ```text
//! application/    ← graph executor, nodes, engine + registry, event bus
//!     ↓
//! domain/         ← state + reducer, policy, validator, trait seams
//!     ↓
//! infrastructure/ ← token manager, idempotency, audit chain, content store, DLP
//! ```
//!
//! Transport, persistence, LLM providers, and agent-definition loading are
//! external collaborators behind the trait seams in [`domain`].

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::engine::{Engine, EngineError, EngineServices, RunRequest};
pub use application::engine_registry::{EngineFactory, EngineRegistry};
pub use application::graph::GraphExecutor;
pub use application::runtime::WardRuntime;
pub use config::RuntimeConfig;
pub use domain::state::{Intent, Message, Role, StepStatus, WorkingState};
pub use domain::tool::{ProposedTool, ToolResult, ToolStatus};
