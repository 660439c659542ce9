// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! DLP scanning interface
//!
//! RiskGate (policy rules 5/6) and the Interpreter consume this trait. The
//! default implementation is the in-core regex scanner; deployments can
//! swap in an external DLP service behind the same seam.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretFinding {
    /// Detector label, e.g. "AWS_ACCESS_KEY_ID"
    pub kind: String,
    /// 1-based line of the match within the scanned content
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiFinding {
    /// PII class, e.g. "EMAIL", "PCI_PAN"
    pub kind: String,
    /// Byte offset of the original match
    pub position: usize,
}

pub trait DlpScanner: Send + Sync {
    /// Detect secrets (API keys, tokens, private keys) in content bound
    /// for egress.
    fn scan_secrets(&self, content: &str) -> Vec<SecretFinding>;

    /// Redact PII in-place, returning the sanitized text and what was
    /// found. Substitutions use `[REDACTED_<KIND>]` markers.
    fn sanitize_pii(&self, text: &str) -> (String, Vec<PiiFinding>);
}
