// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Hash-chained audit log
//!
//! Append-only JSONL; each record carries the previous record's integrity
//! hash, forming a tamper-evident chain (genesis = 64 zero hex digits).
//! The chain head is recovered from the last line on startup and updated
//! under a lock before each append.
//!
//! Persistence failures degrade: the event is traced and the run
//! continues, but the in-memory chain head still advances so later
//! appends stay consistent with what was written.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::canonical::{canonicalize, sha256_hex};

pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub ts: f64,
    pub event: String,
    pub details: Value,
    pub decision: String,
    pub risk: String,
    pub prev_hash: String,
    pub integrity_hash: String,
}

pub struct AuditLogger {
    log_path: PathBuf,
    last_hash: Mutex<String>,
}

impl AuditLogger {
    /// Open (or create) the audit log and recover the chain head from the
    /// last line. An unreadable tail falls back to genesis with a warning
    /// rather than refusing to start.
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        let log_path = log_path.into();
        let last_hash = recover_chain_head(&log_path);
        Self { log_path, last_hash: Mutex::new(last_hash) }
    }

    /// Append a signed event. `redact_details` substitutes
    /// `{"redacted": true}` for the details object (used when the run has
    /// `do_not_store` set — event type, decision, and risk still land in
    /// the chain).
    pub fn log_event(
        &self,
        event: &str,
        details: Value,
        decision: &str,
        risk: &str,
        redact_details: bool,
    ) {
        let details = if redact_details {
            serde_json::json!({"redacted": true})
        } else {
            details
        };

        let mut last_hash = self.last_hash.lock();

        let mut record = AuditRecord {
            ts: Utc::now().timestamp_millis() as f64 / 1000.0,
            event: event.to_string(),
            details,
            decision: decision.to_string(),
            risk: risk.to_string(),
            prev_hash: last_hash.clone(),
            integrity_hash: String::new(),
        };

        record.integrity_hash = integrity_hash(&record);

        match serde_json::to_string(&record) {
            Ok(line) => {
                if let Err(e) = append_line(&self.log_path, &line) {
                    tracing::error!(error = %e, path = %self.log_path.display(),
                        "audit append failed; continuing degraded");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "audit record serialization failed");
            }
        }

        *last_hash = record.integrity_hash;
    }

    pub fn chain_head(&self) -> String {
        self.last_hash.lock().clone()
    }
}

/// Integrity hash of a record: canonical (sorted-key, compact) JSON of the
/// record with `integrity_hash` emptied, then SHA-256.
pub fn integrity_hash(record: &AuditRecord) -> String {
    let mut unhashed = record.clone();
    unhashed.integrity_hash = String::new();
    match serde_json::to_value(&unhashed) {
        Ok(value) => sha256_hex(&canonicalize(&value)),
        // Serialization of this struct cannot fail in practice; chain a
        // sentinel rather than panic
        Err(_) => GENESIS_HASH.to_string(),
    }
}

/// Walk a log file and verify the chain: every record's `prev_hash` must
/// equal the prior record's `integrity_hash`, and each `integrity_hash`
/// must recompute. Returns the index of the first broken record.
pub fn verify_chain(path: &Path) -> Result<(), usize> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Ok(());
    };
    let mut prev = GENESIS_HASH.to_string();
    for (idx, line) in content.lines().filter(|l| !l.trim().is_empty()).enumerate() {
        let Ok(record) = serde_json::from_str::<AuditRecord>(line) else {
            return Err(idx);
        };
        if record.prev_hash != prev || integrity_hash(&record) != record.integrity_hash {
            return Err(idx);
        }
        prev = record.integrity_hash;
    }
    Ok(())
}

fn recover_chain_head(path: &Path) -> String {
    let Ok(content) = std::fs::read_to_string(path) else {
        return GENESIS_HASH.to_string();
    };
    let Some(last_line) = content.lines().rev().find(|l| !l.trim().is_empty()) else {
        return GENESIS_HASH.to_string();
    };
    match serde_json::from_str::<AuditRecord>(last_line) {
        Ok(record) => record.integrity_hash,
        Err(e) => {
            tracing::warn!(error = %e, "audit tail unreadable; restarting chain at genesis");
            GENESIS_HASH.to_string()
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chain_starts_at_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path().join("audit.jsonl"));
        assert_eq!(logger.chain_head(), GENESIS_HASH);
    }

    #[test]
    fn test_records_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let logger = AuditLogger::new(&path);

        logger.log_event("tool_risk_eval", json!({"tool": "read_file"}), "ALLOW", "low", false);
        logger.log_event("tool_risk_eval", json!({"tool": "send_email"}), "AUTH_REQUIRED", "high", false);

        assert!(verify_chain(&path).is_ok());

        let content = std::fs::read_to_string(&path).unwrap();
        let records: Vec<AuditRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].prev_hash, GENESIS_HASH);
        assert_eq!(records[1].prev_hash, records[0].integrity_hash);
        assert_eq!(logger.chain_head(), records[1].integrity_hash);
    }

    #[test]
    fn test_chain_head_recovered_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let head = {
            let logger = AuditLogger::new(&path);
            logger.log_event("e1", json!({}), "ALLOW", "low", false);
            logger.chain_head()
        };

        let reopened = AuditLogger::new(&path);
        assert_eq!(reopened.chain_head(), head);

        reopened.log_event("e2", json!({}), "BLOCKED", "critical", false);
        assert!(verify_chain(&path).is_ok());
    }

    #[test]
    fn test_tampering_breaks_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let logger = AuditLogger::new(&path);
        logger.log_event("e1", json!({"x": 1}), "ALLOW", "low", false);
        logger.log_event("e2", json!({"x": 2}), "ALLOW", "low", false);

        let tampered = std::fs::read_to_string(&path).unwrap().replace("\"x\":1", "\"x\":9");
        std::fs::write(&path, tampered).unwrap();

        assert_eq!(verify_chain(&path), Err(0));
    }

    #[test]
    fn test_redacted_details() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let logger = AuditLogger::new(&path);
        logger.log_event("e", json!({"secret": "value"}), "ALLOW", "low", true);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("value"));
        assert!(content.contains("redacted"));
        assert!(verify_chain(&path).is_ok());
    }
}
