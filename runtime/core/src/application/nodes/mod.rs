// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Node implementations for the execution graph
//!
//! Each node is a pure function of state: I/O happens only through the
//! collaborators injected at construction (LLM adapter, tool runner, token
//! manager, audit logger, content store). Routing is dynamic — nodes name
//! their successor in the returned command.

pub mod approval;
pub mod executor;
pub mod finalizer;
pub mod interpreter;
pub mod parse;
pub mod planner;
pub mod risk_gate;
pub mod router;
pub mod supervisor;
pub mod tools;

pub use approval::{ApprovalHandlerNode, AwaitApprovalNode};
pub use executor::ExecutorNode;
pub use finalizer::FinalizerNode;
pub use interpreter::InterpreterNode;
pub use planner::PlannerNode;
pub use risk_gate::RiskGateNode;
pub use router::RouterNode;
pub use supervisor::SupervisorNode;
pub use tools::ToolsNode;
