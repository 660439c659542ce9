// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Risk policy
//!
//! First-match rule table evaluated over a proposed tool call. Honeypot
//! rules outrank everything; the sandbox rule only applies to
//! unauthenticated callers; DLP rules only apply to write-class tools.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Policy evaluation for the RiskGate chokepoint

use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::domain::dlp::DlpScanner;

/// Tools whose arguments name filesystem paths.
pub const FILESYSTEM_TOOLS: &[&str] = &[
    "read_file", "write_file", "edit_file", "list_dir", "ls", "glob", "grep", "stat",
];

/// Filesystem tools that put content on disk.
pub const WRITE_TOOLS: &[&str] = &["write_file", "edit_file"];

pub fn is_filesystem_tool(name: &str) -> bool {
    FILESYSTEM_TOOLS.contains(&name)
}

pub fn is_write_tool(name: &str) -> bool {
    WRITE_TOOLS.contains(&name)
}

/// The path argument of a filesystem tool, under any of its accepted keys.
pub fn path_argument(args: &Value) -> Option<&str> {
    ["path", "file_path", "dir"]
        .iter()
        .find_map(|key| args.get(*key).and_then(Value::as_str))
}

/// The content argument of a write-class tool.
pub fn content_argument(args: &Value) -> Option<&str> {
    ["content", "new_string", "replacement"]
        .iter()
        .find_map(|key| args.get(*key).and_then(Value::as_str))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthClass {
    Simple,
    Strong,
    Biometric,
}

impl AuthClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthClass::Simple => "simple",
            AuthClass::Strong => "strong",
            AuthClass::Biometric => "biometric",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Outcome of policy evaluation. `Blocked { panic: true }` additionally
/// carries the active-defense decoy payload that replaces the tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
    Allow,
    AuthRequired {
        class: AuthClass,
        level: RiskLevel,
        reason: String,
    },
    Blocked {
        level: RiskLevel,
        reason: String,
        panic: bool,
        decoy: Option<String>,
    },
}

impl RiskDecision {
    pub fn label(&self) -> &'static str {
        match self {
            RiskDecision::Allow => "ALLOW",
            RiskDecision::AuthRequired { .. } => "AUTH_REQUIRED",
            RiskDecision::Blocked { .. } => "BLOCKED",
        }
    }

    pub fn level(&self) -> RiskLevel {
        match self {
            RiskDecision::Allow => RiskLevel::Low,
            RiskDecision::AuthRequired { level, .. } => *level,
            RiskDecision::Blocked { level, .. } => *level,
        }
    }
}

const DECOY_PAYLOAD: &str = "\
*** SECURITY ALERT ***\n\
Compromise detected: honeypot trigger.\n\
Source has been logged. Counter-measures active.\n";

/// The rule table behind RiskGate. Lists are defaults from the production
/// deployment; override through the constructors for tests or tenant
/// policy packs.
#[derive(Debug, Clone)]
pub struct RiskPolicy {
    sandbox_root: PathBuf,
    sensitive_files: Vec<String>,
    high_risk_tools: Vec<String>,
    critical_tools: Vec<String>,
    honey_files: Vec<String>,
    honey_tokens: Vec<String>,
}

impl RiskPolicy {
    pub fn new(sandbox_root: impl Into<PathBuf>) -> Self {
        Self {
            sandbox_root: sandbox_root.into(),
            sensitive_files: vec![
                ".env".into(),
                "id_rsa".into(),
                "credentials.json".into(),
                "secrets.yaml".into(),
            ],
            high_risk_tools: vec![
                "run_command".into(),
                "send_email".into(),
                "delete_file".into(),
            ],
            critical_tools: vec![
                "deploy_production".into(),
                "access_database_admin".into(),
            ],
            honey_files: vec![
                "admin_backup.json".into(),
                "prod_db_credentials.yaml".into(),
                ".aws/credentials.bak".into(),
            ],
            honey_tokens: vec![
                "sk-admin-canary-token-999".into(),
                "ghp_fake_github_token_for_trap".into(),
            ],
        }
    }

    pub fn with_honey_tokens(mut self, tokens: Vec<String>) -> Self {
        self.honey_tokens = tokens;
        self
    }

    pub fn with_honey_files(mut self, files: Vec<String>) -> Self {
        self.honey_files = files;
        self
    }

    /// Evaluate the rule table, first match wins.
    pub fn evaluate(
        &self,
        tool_name: &str,
        args: &Value,
        authenticated: bool,
        dlp: &dyn DlpScanner,
    ) -> RiskDecision {
        // Rule 0: honeytoken anywhere in the argument values
        if let Some(token) = self.find_honey_token(args) {
            tracing::warn!(tool = tool_name, "honeytoken observed in tool arguments");
            return RiskDecision::Blocked {
                level: RiskLevel::Critical,
                reason: format!("Intrusion alert: honeytoken '{token}' used"),
                panic: true,
                decoy: Some(DECOY_PAYLOAD.to_string()),
            };
        }

        // Rule 1: critical tool class
        if self.critical_tools.iter().any(|t| t == tool_name) {
            return RiskDecision::AuthRequired {
                class: AuthClass::Biometric,
                level: RiskLevel::Critical,
                reason: format!("Tool '{tool_name}' is classified as critical"),
            };
        }

        if is_filesystem_tool(tool_name) {
            let path = path_argument(args).unwrap_or("");

            // Rule 2: honeyfile access
            if self.honey_files.iter().any(|h| path.contains(h.as_str())) {
                tracing::warn!(tool = tool_name, path, "honeyfile access attempt");
                return RiskDecision::Blocked {
                    level: RiskLevel::Critical,
                    reason: format!("Intrusion alert: honeyfile '{path}' accessed"),
                    panic: true,
                    decoy: Some(DECOY_PAYLOAD.to_string()),
                };
            }

            // Rule 3: sandbox escape without authentication
            if !authenticated && !self.path_within_sandbox(path) {
                return RiskDecision::Blocked {
                    level: RiskLevel::Critical,
                    reason: format!(
                        "Sandbox violation: access to '{path}' blocked (unauthenticated)"
                    ),
                    panic: false,
                    decoy: None,
                };
            }

            // Rule 4: sensitive file names
            if self.sensitive_files.iter().any(|s| path.contains(s.as_str())) {
                return RiskDecision::AuthRequired {
                    class: AuthClass::Strong,
                    level: RiskLevel::High,
                    reason: format!("Access to sensitive file '{path}'"),
                };
            }

            if is_write_tool(tool_name) {
                if let Some(content) = content_argument(args) {
                    // Rule 5: secret egress
                    let secrets = dlp.scan_secrets(content);
                    if !secrets.is_empty() {
                        return RiskDecision::Blocked {
                            level: RiskLevel::Critical,
                            reason: format!(
                                "DLP: secret detected in write content ({} found)",
                                secrets.len()
                            ),
                            panic: false,
                            decoy: None,
                        };
                    }

                    // Rule 6: PII in write content
                    let (_, pii) = dlp.sanitize_pii(content);
                    if !pii.is_empty() {
                        return RiskDecision::AuthRequired {
                            class: AuthClass::Simple,
                            level: RiskLevel::Medium,
                            reason: "DLP: PII detected in write content".to_string(),
                        };
                    }
                }
            }
        }

        // Rule 7: high-risk tool class
        if self.high_risk_tools.iter().any(|t| t == tool_name) {
            return RiskDecision::AuthRequired {
                class: AuthClass::Strong,
                level: RiskLevel::High,
                reason: format!("Tool '{tool_name}' is high risk"),
            };
        }

        // Rule 8: default
        RiskDecision::Allow
    }

    fn find_honey_token(&self, args: &Value) -> Option<&str> {
        fn visit<'a>(value: &Value, tokens: &'a [String]) -> Option<&'a str> {
            match value {
                Value::String(s) => tokens
                    .iter()
                    .find(|t| s.contains(t.as_str()))
                    .map(|t| t.as_str()),
                Value::Array(items) => items.iter().find_map(|v| visit(v, tokens)),
                Value::Object(map) => map.values().find_map(|v| visit(v, tokens)),
                _ => None,
            }
        }
        visit(args, &self.honey_tokens)
    }

    /// Lexical sandbox containment: relative paths are joined onto the
    /// sandbox root; any `..` component or an absolute path escaping the
    /// root fails containment. No filesystem access.
    fn path_within_sandbox(&self, raw: &str) -> bool {
        if raw.is_empty() {
            // No path argument means nothing to contain
            return true;
        }
        let candidate = Path::new(raw);
        let mut resolved = if candidate.is_absolute() {
            PathBuf::new()
        } else {
            self.sandbox_root.clone()
        };
        for component in candidate.components() {
            match component {
                Component::ParentDir => return false,
                Component::CurDir => {}
                other => resolved.push(other.as_os_str()),
            }
        }
        resolved.starts_with(&self.sandbox_root)
    }
}
