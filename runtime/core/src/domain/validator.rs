// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Server-side argument validator
//!
//! Runs before any proposal is canonicalized or gated: filesystem paths are
//! checked for null bytes, absolute/UNC forms, traversal segments, and
//! sandbox containment; email tools get shape, allow-list, and length
//! checks. Validation is a core security rule, not an infrastructure
//! concern, so it lives in the domain layer.

use std::path::{Component, Path, PathBuf};

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::domain::risk::{is_filesystem_tool, path_argument};

const MAX_SUBJECT_CHARS: usize = 500;
const MAX_BODY_CHARS: usize = 50_000;

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("null byte in path argument")]
    NullByte,

    #[error("absolute paths not allowed: {0}")]
    AbsolutePath(String),

    #[error("UNC paths not allowed: {0}")]
    UncPath(String),

    #[error("path traversal blocked: {0}")]
    Traversal(String),

    #[error("path outside sandbox: {0}")]
    OutsideSandbox(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("email domain not in allowlist: {0}")]
    DomainNotAllowed(String),

    #[error("subject too long ({0} chars, max {MAX_SUBJECT_CHARS})")]
    SubjectTooLong(usize),

    #[error("body too long ({0} chars, max {MAX_BODY_CHARS})")]
    BodyTooLong(usize),
}

pub struct ArgumentValidator {
    sandbox_root: PathBuf,
    email_domain_allowlist: Vec<String>,
    email_re: Regex,
}

impl ArgumentValidator {
    pub fn new(sandbox_root: impl Into<PathBuf>, email_domain_allowlist: Vec<String>) -> Self {
        Self {
            sandbox_root: sandbox_root.into(),
            email_domain_allowlist,
            // RFC-like shape; strict parsing belongs to the mail gateway
            email_re: Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
                .expect("static email regex"),
        }
    }

    /// Validate a proposed tool call's arguments. `Ok(())` means the
    /// proposal may proceed to canonicalization and the risk gate.
    pub fn validate(&self, tool_name: &str, args: &Value) -> Result<(), ValidatorError> {
        if is_filesystem_tool(tool_name) {
            if let Some(path) = path_argument(args) {
                self.resolve_sandboxed(path)?;
            }
        }

        if tool_name == "send_email" {
            self.validate_email(args)?;
        }

        Ok(())
    }

    /// Normalize a path argument and resolve it under the sandbox root.
    /// Relative inputs only: absolute and UNC forms are rejected outright,
    /// as is any `..` segment surviving normalization.
    pub fn resolve_sandboxed(&self, raw: &str) -> Result<PathBuf, ValidatorError> {
        if raw.contains('\0') {
            tracing::warn!("null byte in path argument rejected");
            return Err(ValidatorError::NullByte);
        }
        if raw.starts_with("\\\\") {
            return Err(ValidatorError::UncPath(raw.to_string()));
        }

        let candidate = Path::new(raw);
        if candidate.is_absolute() {
            return Err(ValidatorError::AbsolutePath(raw.to_string()));
        }

        let mut normalized = PathBuf::new();
        for component in candidate.components() {
            match component {
                Component::ParentDir => {
                    tracing::warn!(path = raw, "path traversal attempt rejected");
                    return Err(ValidatorError::Traversal(raw.to_string()));
                }
                Component::CurDir => {}
                Component::Prefix(_) | Component::RootDir => {
                    return Err(ValidatorError::AbsolutePath(raw.to_string()));
                }
                Component::Normal(part) => normalized.push(part),
            }
        }

        let resolved = self.sandbox_root.join(&normalized);
        if !resolved.starts_with(&self.sandbox_root) {
            return Err(ValidatorError::OutsideSandbox(raw.to_string()));
        }

        Ok(resolved)
    }

    fn validate_email(&self, args: &Value) -> Result<(), ValidatorError> {
        let to = args.get("to").and_then(Value::as_str).unwrap_or("");
        if !self.email_re.is_match(to) {
            return Err(ValidatorError::InvalidEmail(to.to_string()));
        }

        if !self.email_domain_allowlist.is_empty() {
            let allowed = self
                .email_domain_allowlist
                .iter()
                .any(|domain| to.ends_with(&format!("@{domain}")));
            if !allowed {
                return Err(ValidatorError::DomainNotAllowed(to.to_string()));
            }
        }

        let subject_len = args
            .get("subject")
            .and_then(Value::as_str)
            .map(|s| s.chars().count())
            .unwrap_or(0);
        if subject_len > MAX_SUBJECT_CHARS {
            return Err(ValidatorError::SubjectTooLong(subject_len));
        }

        let body_len = args
            .get("body")
            .and_then(Value::as_str)
            .map(|s| s.chars().count())
            .unwrap_or(0);
        if body_len > MAX_BODY_CHARS {
            return Err(ValidatorError::BodyTooLong(body_len));
        }

        Ok(())
    }
}
