// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Content store interface for evicted tool outputs

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContentStoreError {
    #[error("content path escapes store base directory: {0}")]
    OutsideBase(String),

    #[error("content store I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage boundary for evicted payloads. Implementations MUST constrain
/// all paths to a single base directory and verify containment after
/// joining — a violation aborts the eviction and fails the run.
pub trait ContentStore: Send + Sync {
    fn write(&self, filename: &str, content: &str) -> Result<PathBuf, ContentStoreError>;

    fn read(&self, path: &Path) -> Result<String, ContentStoreError>;
}
