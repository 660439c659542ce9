// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end scenario tests for the execution graph
//!
//! Each test drives a fully wired engine (scripted LLM adapter, recording
//! tool runner, real gate/caches/audit) through one of the canonical
//! runtime scenarios: happy-path reads, approval round-trips, tamper
//! detection, idempotent replay, and honeypot defense.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_test::assert_ok;

use ward_core::application::engine::{Engine, EngineServices, RunRequest};
use ward_core::application::events::RuntimeEventBus;
use ward_core::application::graph::GraphExecutor;
use ward_core::application::nodes::{
    FinalizerNode, InterpreterNode, RiskGateNode, SupervisorNode, ToolsNode,
};
use ward_core::config::RuntimeConfig;
use ward_core::domain::agent::{AgentDefinition, ToolManifest};
use ward_core::domain::llm::{LlmAdapter, LlmError};
use ward_core::domain::node::{GraphNode, NodeCommand, NodeError, NodeId};
use ward_core::domain::risk::RiskPolicy;
use ward_core::domain::state::{Intent, Message, StepStatus, WorkingState};
use ward_core::domain::tool::ProposedTool;
use ward_core::domain::tools::{ToolOutcome, ToolRunner, ToolRunnerError};
use ward_core::infrastructure::audit::{verify_chain, AuditLogger};
use ward_core::infrastructure::content_store::LocalContentStore;
use ward_core::infrastructure::dlp::RegexDlpScanner;
use ward_core::infrastructure::idempotency::IdempotencyStore;
use ward_core::infrastructure::token_manager::TokenManager;

const TEST_SECRET: &str = "scenario-test-secret-key-0123456789ab";

/// Returns scripted responses in order, repeating the last one when the
/// graph loops back (retries re-invoke the Executor).
struct ScriptedLlm {
    responses: parking_lot::Mutex<(Vec<String>, usize)>,
}

impl ScriptedLlm {
    fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: parking_lot::Mutex::new((
                responses.into_iter().map(String::from).collect(),
                0,
            )),
        }
    }
}

#[async_trait]
impl LlmAdapter for ScriptedLlm {
    async fn invoke(&self, _messages: &[Message]) -> Result<String, LlmError> {
        let mut guard = self.responses.lock();
        let (responses, idx) = &mut *guard;
        if responses.is_empty() {
            return Ok("{}".to_string());
        }
        let response = responses[(*idx).min(responses.len() - 1)].clone();
        *idx += 1;
        Ok(response)
    }
}

struct RecordingRunner {
    calls: AtomicUsize,
    outcome: Result<ToolOutcome, String>,
}

impl RecordingRunner {
    fn success(output: Value) -> Self {
        Self { calls: AtomicUsize::new(0), outcome: Ok(ToolOutcome::success(output)) }
    }

    fn transport_fault(message: &str) -> Self {
        Self { calls: AtomicUsize::new(0), outcome: Err(message.to_string()) }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolRunner for RecordingRunner {
    async fn call(
        &self,
        _name: &str,
        _args: &Value,
        _timeout: Duration,
    ) -> Result<ToolOutcome, ToolRunnerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(outcome) => Ok(outcome.clone()),
            Err(message) => Err(ToolRunnerError::Transport(message.clone())),
        }
    }
}

struct Harness {
    engine: Engine,
    runner: Arc<RecordingRunner>,
    audit_path: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness(responses: Vec<&str>, runner: RecordingRunner) -> Harness {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let runner = Arc::new(runner);

    let services = EngineServices {
        llm: Arc::new(ScriptedLlm::new(responses)),
        runner: runner.clone(),
        dlp: Arc::new(RegexDlpScanner::new()),
        content_store: Arc::new(LocalContentStore::new(dir.path().join("evictions"))),
        audit: Arc::new(AuditLogger::new(&audit_path)),
        tokens: Arc::new(TokenManager::new(TEST_SECRET, false).unwrap()),
        idempotency: Arc::new(IdempotencyStore::new()),
        events: RuntimeEventBus::new(64),
    };

    let agent = AgentDefinition {
        name: "scribe".into(),
        role: "Assistant".into(),
        instructions: "Complete the user's task".into(),
        tools: vec![
            ToolManifest {
                name: "read_file".into(),
                schema: json!({
                    "type": "object",
                    "properties": {"path": {"type": "string"}},
                    "required": ["path"]
                }),
            },
            ToolManifest { name: "write_file".into(), schema: Value::Null },
        ],
    };

    let mut config = RuntimeConfig::default();
    config.secret_key = TEST_SECRET.into();
    config.validate().unwrap();

    let engine = Engine::new(agent, services, &config).unwrap();
    Harness { engine, runner, audit_path, _dir: dir }
}

fn request(thread_id: &str, goal: &str) -> RunRequest {
    RunRequest {
        thread_id: thread_id.into(),
        user_id: "user-1".into(),
        goal: goal.into(),
        intent: Intent::Task,
        authenticated: false,
        do_not_store: false,
    }
}

/// Pull `<id>` and `<token>` out of the AwaitApproval instruction message.
fn approval_credentials(state: &WorkingState) -> (String, String) {
    let id = state.approval_id.clone().expect("approval id set");
    let token = state
        .messages
        .iter()
        .rev()
        .filter_map(|m| {
            m.content
                .lines()
                .find(|l| l.contains("To approve, reply: APPROVE"))
        })
        .next()
        .and_then(|line| line.split_whitespace().last())
        .expect("token present in approval instructions")
        .to_string();
    (id, token)
}

// ---------------------------------------------------------------------------
// Scenario 1: happy path, low-risk read
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_happy_path_low_risk_read() {
    let h = harness(
        vec![
            r#"{"plan": ["Read README.md"]}"#,
            r#"{"name": "read_file", "args": {"path": "workspace/README.md"}}"#,
        ],
        RecordingRunner::success(json!("# Hello")),
    );

    let state = h.engine.run(request("t-happy", "read the README")).await;

    assert_eq!(state.plan, vec!["Read README.md".to_string()]);
    assert_eq!(state.step_status[&0], StepStatus::Done);
    assert_eq!(h.runner.call_count(), 1);

    let result = state.last_tool_result.as_ref().unwrap();
    assert!(result.is_success());
    assert_eq!(result.output, json!("# Hello"));

    let summary = &state.messages.last().unwrap().content;
    assert!(summary.contains("1/1 steps completed"));

    // Gate decision was audited and the chain is intact
    assert_ok!(verify_chain(&h.audit_path));
    let audit = std::fs::read_to_string(&h.audit_path).unwrap();
    assert!(audit.contains("ALLOW"));
}

// ---------------------------------------------------------------------------
// Scenario 2: sensitive file prompts approval; wrong token never executes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sensitive_file_requires_approval_and_wrong_token_is_refused() {
    let h = harness(
        vec![
            r#"{"plan": ["Read the env file"]}"#,
            r#"{"name": "read_file", "args": {"path": "workspace/.env"}}"#,
        ],
        RecordingRunner::success(json!("SECRET=1")),
    );

    let mut state = h.engine.run(request("t-approval", "read the env file")).await;

    assert!(state.awaiting_approval);
    let (id, _) = approval_credentials(&state);
    let prompt = &state.messages.last().unwrap().content;
    assert!(prompt.contains(&format!("APPROVE {id}")));
    assert_eq!(h.runner.call_count(), 0);

    // Reply with a plausible but wrong token
    state
        .messages
        .push(Message::user(format!("APPROVE {id} v1.123.deadbeefdeadbeef.0badc0de0badc0de")));
    let state = h.engine.resume(state).await;

    // Tool still never executed; the run re-suspended with a fresh approval
    assert_eq!(h.runner.call_count(), 0);
    assert!(state.awaiting_approval);
    assert_ne!(state.approval_id.as_deref(), Some(id.as_str()));
}

// ---------------------------------------------------------------------------
// Scenario 3: correct approval executes the tool
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_correct_approval_executes_tool() {
    let h = harness(
        vec![
            r#"{"plan": ["Read the env file"]}"#,
            r#"{"name": "read_file", "args": {"path": "workspace/.env"}}"#,
        ],
        RecordingRunner::success(json!("SECRET=1")),
    );

    let mut state = h.engine.run(request("t-approve-ok", "read the env file")).await;
    assert!(state.awaiting_approval);

    let (id, token) = approval_credentials(&state);
    state.messages.push(Message::user(format!("approve {id} {token}")));
    let state = h.engine.resume(state).await;

    assert_eq!(h.runner.call_count(), 1);
    assert!(!state.awaiting_approval);
    assert_eq!(state.step_status[&0], StepStatus::Done);
    assert!(state
        .messages
        .last()
        .unwrap()
        .content
        .contains("1/1 steps completed"));
}

// ---------------------------------------------------------------------------
// Scenario 4: tampering between Executor and RiskGate is detected
// ---------------------------------------------------------------------------

struct EntryToRiskGate;

#[async_trait]
impl GraphNode for EntryToRiskGate {
    fn id(&self) -> NodeId {
        NodeId::Router
    }
    async fn run(&self, _state: &WorkingState) -> Result<NodeCommand, NodeError> {
        Ok(NodeCommand::goto(NodeId::RiskGate))
    }
}

#[tokio::test]
async fn test_tampered_proposal_never_reaches_tools() {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let runner = Arc::new(RecordingRunner::success(json!("should never run")));
    let dlp = Arc::new(RegexDlpScanner::new());

    let mut graph = GraphExecutor::new(64);
    graph.register(Arc::new(EntryToRiskGate));
    graph.register(Arc::new(RiskGateNode::new(
        Arc::new(RiskPolicy::new("/workspace")),
        dlp.clone(),
        Arc::new(AuditLogger::new(&audit_path)),
        RuntimeEventBus::new(16),
        300,
        3,
    )));
    graph.register(Arc::new(ToolsNode::new(
        runner.clone(),
        Arc::new(IdempotencyStore::new()),
        Duration::from_secs(30),
        Duration::from_secs(600),
    )));
    graph.register(Arc::new(InterpreterNode::new(
        Arc::new(LocalContentStore::new(dir.path().join("evictions"))),
        dlp,
        10_000,
        500,
        50_000,
    )));
    graph.register(Arc::new(SupervisorNode::new(3)));
    graph.register(Arc::new(FinalizerNode::new()));

    let mut state = WorkingState::new("t-tamper", "user-1", Intent::Task);
    state.plan = vec!["Read the README".into()];
    state.step_status.insert(0, StepStatus::Pending);
    state.tries.insert(0, 0);
    // The external layer rewrote args after canonicalization
    let mut proposal =
        ProposedTool::from_args("read_file", json!({"path": "workspace/README.md"}), 0);
    proposal.args = json!({"path": "workspace/.env"});
    state.proposed_tool = Some(proposal);

    let state = graph.invoke(state).await;

    assert_eq!(runner.call_count(), 0);
    assert_eq!(state.step_status[&0], StepStatus::Failed);
    assert!(state.proposed_tool.is_none());
    assert!(state
        .security_findings
        .iter()
        .any(|f| f.kind == "integrity_violation"));

    assert!(verify_chain(&audit_path).is_ok());
    let audit = std::fs::read_to_string(&audit_path).unwrap();
    assert!(audit.contains("integrity_violation"));
}

// ---------------------------------------------------------------------------
// Scenario 5: idempotent replay across invocations on the same thread
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_idempotent_replay_executes_upstream_once() {
    let h = harness(
        vec![
            r#"{"plan": ["Read README.md"]}"#,
            r#"{"name": "read_file", "args": {"path": "workspace/README.md"}}"#,
            r#"{"plan": ["Read README.md"]}"#,
            r#"{"name": "read_file", "args": {"path": "workspace/README.md"}}"#,
        ],
        RecordingRunner::success(json!("# Hello")),
    );

    let first = h.engine.run(request("t-replay", "read the README")).await;
    let second = h.engine.run(request("t-replay", "read the README")).await;

    // Same (thread, step, args_hash): exactly one upstream call
    assert_eq!(h.runner.call_count(), 1);
    assert_eq!(
        first.last_tool_result.as_ref().unwrap().output,
        second.last_tool_result.as_ref().unwrap().output,
    );
    assert_eq!(second.step_status[&0], StepStatus::Done);
}

// ---------------------------------------------------------------------------
// Scenario 6: honeyfile defense
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_honeyfile_access_triggers_panic_defense() {
    let h = harness(
        vec![
            r#"{"plan": ["Inspect the backup"]}"#,
            r#"{"name": "read_file", "args": {"path": "workspace/admin_backup.json"}}"#,
        ],
        RecordingRunner::success(json!("should never run")),
    );

    let state = h.engine.run(request("t-honey", "look at the admin backup")).await;

    // Never executed, never retried
    assert_eq!(h.runner.call_count(), 0);
    assert_eq!(state.step_status[&0], StepStatus::Failed);
    assert!(state.security_findings.iter().any(|f| f.kind == "policy_blocked"));

    // The decoy payload reaches the user-visible output
    let last = &state.messages.last().unwrap().content;
    assert!(last.contains("SECURITY ALERT"));

    // CRITICAL audit record, chain intact
    assert!(verify_chain(&h.audit_path).is_ok());
    let audit = std::fs::read_to_string(&h.audit_path).unwrap();
    assert!(audit.contains("\"risk\":\"critical\""));
    assert!(audit.contains("BLOCKED"));
}

// ---------------------------------------------------------------------------
// Retry exhaustion: transport faults retry, then ask the user
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_transport_faults_retry_then_ask_user() {
    let h = harness(
        vec![
            r#"{"plan": ["Read README.md"]}"#,
            r#"{"name": "read_file", "args": {"path": "workspace/README.md"}}"#,
        ],
        RecordingRunner::transport_fault("connection refused"),
    );

    let state = h.engine.run(request("t-retry", "read the README")).await;

    // Initial attempt + 3 retries, each reaching the runner (faults are
    // not cached)
    assert_eq!(h.runner.call_count(), 4);
    assert!(state.awaiting_user_input);
    let question = state.question.as_deref().unwrap();
    assert!(question.contains("RETRY"));
    assert!(question.contains("SKIP"));
    assert!(question.contains("CANCEL"));
    assert!(state.messages.last().unwrap().content.contains("RETRY"));
}

// ---------------------------------------------------------------------------
// Rejection path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_rejection_never_executes_and_consumes_the_approval() {
    let h = harness(
        vec![
            r#"{"plan": ["Read the env file"]}"#,
            r#"{"name": "read_file", "args": {"path": "workspace/.env"}}"#,
        ],
        RecordingRunner::success(json!("SECRET=1")),
    );

    let mut state = h.engine.run(request("t-reject", "read the env file")).await;
    let (id, token) = approval_credentials(&state);

    state.messages.push(Message::user(format!("REJECT {id}")));
    let state = h.engine.resume(state).await;

    // The rejected call never executed. The step is still open, so the
    // Executor re-proposed it and the run suspended on a fresh approval —
    // the rejected one is gone for good.
    assert_eq!(h.runner.call_count(), 0);
    assert_ne!(state.approval_id.as_deref(), Some(id.as_str()));

    // Replaying the old credentials against the new approval cannot work
    let mut state = state;
    state.messages.push(Message::user(format!("APPROVE {id} {token}")));
    let state = h.engine.resume(state).await;
    assert_eq!(h.runner.call_count(), 0);
}
