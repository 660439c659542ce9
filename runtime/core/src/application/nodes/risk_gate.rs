// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! RiskGate node: the only path to tool execution
//!
//! Operates purely on server-recomputed data. The canonical form and hash
//! of the proposal are rebuilt here and compared against the stored
//! fields; any divergence means something rewrote the proposal between
//! Executor and this gate, and the proposal dies. Survivors go through the
//! policy table: ALLOW proceeds, AUTH_REQUIRED suspends into the approval
//! flow, BLOCKED fails the step. Every decision lands in the audit chain.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rand_core::{OsRng, RngCore};
use serde_json::json;

use crate::application::events::{RuntimeEvent, RuntimeEventBus};
use crate::domain::canonical::{canonicalize, sha256_hex};
use crate::domain::dlp::DlpScanner;
use crate::domain::node::{GraphNode, NodeCommand, NodeError, NodeId};
use crate::domain::risk::{RiskDecision, RiskPolicy};
use crate::domain::state::{Field, SecurityFinding, StateUpdate, WorkingState};
use crate::domain::tool::ToolResult;
use crate::infrastructure::audit::AuditLogger;

pub struct RiskGateNode {
    policy: Arc<RiskPolicy>,
    dlp: Arc<dyn DlpScanner>,
    audit: Arc<AuditLogger>,
    events: RuntimeEventBus,
    approval_ttl_seconds: i64,
    max_retries_per_step: u32,
}

impl RiskGateNode {
    pub fn new(
        policy: Arc<RiskPolicy>,
        dlp: Arc<dyn DlpScanner>,
        audit: Arc<AuditLogger>,
        events: RuntimeEventBus,
        approval_ttl_seconds: i64,
        max_retries_per_step: u32,
    ) -> Self {
        Self { policy, dlp, audit, events, approval_ttl_seconds, max_retries_per_step }
    }

    fn fresh_approval_id() -> String {
        let mut bytes = [0u8; 4];
        OsRng.fill_bytes(&mut bytes);
        format!("auth_{}", hex::encode(bytes))
    }

    /// Security decisions are never retried: exhausting the step's tries
    /// keeps Supervisor from re-proposing the same rejected call.
    fn exhausted_tries(&self, state: &WorkingState, step_idx: usize) -> std::collections::HashMap<usize, u32> {
        let mut tries = state.tries.clone();
        tries.insert(step_idx, self.max_retries_per_step);
        tries
    }
}

#[async_trait]
impl GraphNode for RiskGateNode {
    fn id(&self) -> NodeId {
        NodeId::RiskGate
    }

    async fn run(&self, state: &WorkingState) -> Result<NodeCommand, NodeError> {
        let Some(proposal) = &state.proposed_tool else {
            return Ok(NodeCommand::with_update(
                StateUpdate::result(ToolResult::failed("System error: no tool proposed")),
                NodeId::Interpreter,
            ));
        };

        // 1. Integrity re-check: rebuild canonical form and hash from the
        //    raw args, compare against what Executor recorded
        let canonical = canonicalize(&proposal.args);
        let computed_hash = sha256_hex(&canonical);

        if canonical != proposal.canonical_args || computed_hash != proposal.args_hash {
            tracing::error!(
                tool = %proposal.name,
                expected = %proposal.args_hash,
                computed = %computed_hash,
                "proposal integrity mismatch"
            );
            self.audit.log_event(
                "integrity_check",
                json!({
                    "tool": proposal.name,
                    "expected_hash": proposal.args_hash,
                    "computed_hash": computed_hash,
                }),
                "integrity_violation",
                "critical",
                state.do_not_store,
            );
            self.events.publish(RuntimeEvent::SecurityAlert {
                thread_id: state.thread_id.clone(),
                kind: "integrity_violation".into(),
                detail: format!("proposal for '{}' was tampered with", proposal.name),
            });

            let update = StateUpdate {
                last_tool_result: Field::Set(Some(ToolResult::failed(
                    "Integrity error: proposal hash mismatch (tampering detected)",
                ))),
                tries: Field::Set(self.exhausted_tries(state, proposal.step_idx)),
                security_findings: vec![SecurityFinding::new(
                    "integrity_violation",
                    format!("canonical/hash mismatch for tool '{}'", proposal.name),
                )],
                ..StateUpdate::default()
            };
            return Ok(NodeCommand::with_update(update, NodeId::Interpreter));
        }

        // 2. Policy evaluation over the verified args
        let decision = self.policy.evaluate(
            &proposal.name,
            &proposal.args,
            state.authenticated,
            self.dlp.as_ref(),
        );

        self.audit.log_event(
            "tool_risk_eval",
            json!({
                "tool": proposal.name,
                "args_hash": proposal.args_hash,
                "step_idx": proposal.step_idx,
                "authenticated": state.authenticated,
            }),
            decision.label(),
            decision.level().as_str(),
            state.do_not_store,
        );

        match decision {
            RiskDecision::Blocked { reason, panic, decoy, .. } => {
                tracing::warn!(tool = %proposal.name, reason = %reason, panic, "proposal blocked");
                if panic {
                    self.events.publish(RuntimeEvent::SecurityAlert {
                        thread_id: state.thread_id.clone(),
                        kind: "honeypot_trigger".into(),
                        detail: reason.clone(),
                    });
                }
                let output = match decoy {
                    Some(payload) => payload,
                    None => format!("Security blocked: {reason}"),
                };
                let update = StateUpdate {
                    last_tool_result: Field::Set(Some(ToolResult::failed(output))),
                    tries: Field::Set(self.exhausted_tries(state, proposal.step_idx)),
                    security_findings: vec![SecurityFinding::new("policy_blocked", reason)],
                    ..StateUpdate::default()
                };
                Ok(NodeCommand::with_update(update, NodeId::Interpreter))
            }
            RiskDecision::AuthRequired { class, reason, .. } => {
                let approval_id = Self::fresh_approval_id();
                let expires_at = Utc::now() + ChronoDuration::seconds(self.approval_ttl_seconds);
                tracing::info!(
                    tool = %proposal.name,
                    approval_id = %approval_id,
                    class = class.as_str(),
                    "approval required"
                );
                self.events.publish(RuntimeEvent::ApprovalRequested {
                    thread_id: state.thread_id.clone(),
                    approval_id: approval_id.clone(),
                    tool: proposal.name.clone(),
                });

                let update = StateUpdate {
                    awaiting_approval: Field::Set(true),
                    approval_id: Field::Set(Some(approval_id)),
                    approval_hash: Field::Set(Some(computed_hash)),
                    approval_expires_at: Field::Set(Some(expires_at)),
                    audit_trail: vec![format!("approval required: {reason}")],
                    ..StateUpdate::default()
                };
                Ok(NodeCommand::with_update(update, NodeId::AwaitApproval))
            }
            RiskDecision::Allow => Ok(NodeCommand::goto(NodeId::Tools)),
        }
    }
}
