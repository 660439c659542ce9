// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Runtime configuration
//!
//! Loadable from a YAML file or from `WARD_*` environment variables (env
//! wins when both are used via [`RuntimeConfig::from_env_over`]). The
//! secret-key policy is enforced at validation time, not at parse time, so
//! tooling can still inspect an incomplete config.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEV_SENTINEL: &str = "dev-secret-key";
const MIN_SECRET_CHARS: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("secret_key is required")]
    MissingSecret,

    #[error("secret_key too weak for production (minimum {MIN_SECRET_CHARS} chars, no dev sentinel)")]
    WeakSecret,

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("config file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Absolute prefix all filesystem tool arguments must resolve under.
    pub sandbox_root: PathBuf,
    /// Base directory for evicted tool outputs.
    pub eviction_dir: PathBuf,
    /// Append-only audit chain location.
    pub audit_log_path: PathBuf,
    pub email_domain_allowlist: Vec<String>,
    pub tool_timeout_seconds: u64,
    pub max_plan_steps: usize,
    pub max_retries_per_step: u32,
    pub approval_ttl_seconds: i64,
    pub idempotency_ttl_seconds: u64,
    pub engine_idle_ttl_seconds: u64,
    pub eviction_threshold_chars: usize,
    pub summary_max_chars: usize,
    pub rehydration_max_chars: usize,
    pub node_transition_limit: usize,
    /// HMAC secret for approval tokens. Required; >= 32 chars outside dev.
    pub secret_key: String,
    pub dev_mode: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sandbox_root: PathBuf::from("/workspace"),
            eviction_dir: PathBuf::from("/workspace/evictions"),
            audit_log_path: PathBuf::from("security_audit.jsonl"),
            email_domain_allowlist: Vec::new(),
            tool_timeout_seconds: 30,
            max_plan_steps: 8,
            max_retries_per_step: 3,
            approval_ttl_seconds: 300,
            idempotency_ttl_seconds: 600,
            engine_idle_ttl_seconds: 300,
            eviction_threshold_chars: 10_000,
            summary_max_chars: 500,
            rehydration_max_chars: 50_000,
            node_transition_limit: 64,
            secret_key: String::new(),
            dev_mode: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults overridden by `WARD_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().from_env_over()
    }

    /// Apply `WARD_*` environment variables over this config.
    pub fn from_env_over(mut self) -> Result<Self, ConfigError> {
        if let Ok(value) = std::env::var("WARD_SANDBOX_ROOT") {
            self.sandbox_root = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("WARD_EVICTION_DIR") {
            self.eviction_dir = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("WARD_AUDIT_LOG_PATH") {
            self.audit_log_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("WARD_EMAIL_DOMAIN_ALLOWLIST") {
            self.email_domain_allowlist = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(value) = std::env::var("WARD_SECRET_KEY") {
            self.secret_key = value;
        }
        if let Ok(value) = std::env::var("WARD_ENV") {
            self.dev_mode = matches!(value.as_str(), "dev" | "development" | "local");
        }

        parse_env("WARD_TOOL_TIMEOUT_SECONDS", &mut self.tool_timeout_seconds)?;
        parse_env("WARD_MAX_PLAN_STEPS", &mut self.max_plan_steps)?;
        parse_env("WARD_MAX_RETRIES_PER_STEP", &mut self.max_retries_per_step)?;
        parse_env("WARD_APPROVAL_TTL_SECONDS", &mut self.approval_ttl_seconds)?;
        parse_env("WARD_IDEMPOTENCY_TTL_SECONDS", &mut self.idempotency_ttl_seconds)?;
        parse_env("WARD_ENGINE_IDLE_TTL_SECONDS", &mut self.engine_idle_ttl_seconds)?;
        parse_env("WARD_EVICTION_THRESHOLD_CHARS", &mut self.eviction_threshold_chars)?;
        parse_env("WARD_SUMMARY_MAX_CHARS", &mut self.summary_max_chars)?;
        parse_env("WARD_REHYDRATION_MAX_CHARS", &mut self.rehydration_max_chars)?;
        parse_env("WARD_NODE_TRANSITION_LIMIT", &mut self.node_transition_limit)?;

        Ok(self)
    }

    /// Enforce the secret policy and structural requirements.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if !self.dev_mode
            && (self.secret_key == DEV_SENTINEL
                || self.secret_key.chars().count() < MIN_SECRET_CHARS)
        {
            return Err(ConfigError::WeakSecret);
        }
        if !self.sandbox_root.is_absolute() {
            return Err(ConfigError::InvalidValue {
                key: "sandbox_root".into(),
                value: self.sandbox_root.display().to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, slot: &mut T) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(key) {
        *slot = value.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        })?;
    }
    Ok(())
}
