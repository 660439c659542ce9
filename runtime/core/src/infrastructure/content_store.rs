// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Local filesystem content store
//!
//! Backs the Interpreter's eviction path. All writes land under a single
//! base directory; the target path is normalized and re-verified after the
//! join, so a hostile filename cannot traverse out.

use std::path::{Component, Path, PathBuf};

use crate::domain::content_store::{ContentStore, ContentStoreError};

pub struct LocalContentStore {
    base_dir: PathBuf,
}

impl LocalContentStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn resolve(&self, filename: &str) -> Result<PathBuf, ContentStoreError> {
        if filename.contains('\0') {
            return Err(ContentStoreError::OutsideBase(filename.to_string()));
        }

        let candidate = Path::new(filename);
        let mut resolved = self.base_dir.clone();
        for component in candidate.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                // Parent dirs, roots, and prefixes all count as escapes
                _ => {
                    tracing::warn!(filename, "eviction path escape attempt");
                    return Err(ContentStoreError::OutsideBase(filename.to_string()));
                }
            }
        }

        if !resolved.starts_with(&self.base_dir) {
            return Err(ContentStoreError::OutsideBase(filename.to_string()));
        }
        Ok(resolved)
    }
}

impl ContentStore for LocalContentStore {
    fn write(&self, filename: &str, content: &str) -> Result<PathBuf, ContentStoreError> {
        let path = self.resolve(filename)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        tracing::debug!(chars = content.len(), path = %path.display(), "evicted content written");
        Ok(path)
    }

    fn read(&self, path: &Path) -> Result<String, ContentStoreError> {
        if !path.starts_with(&self.base_dir) {
            return Err(ContentStoreError::OutsideBase(path.display().to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalContentStore::new(dir.path());

        let path = store.write("eviction_t1_abcd1234.txt", "payload").unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(store.read(&path).unwrap(), "payload");
    }

    #[test]
    fn test_traversal_filename_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalContentStore::new(dir.path());

        let result = store.write("../escape.txt", "x");
        assert!(matches!(result, Err(ContentStoreError::OutsideBase(_))));
    }

    #[test]
    fn test_absolute_filename_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalContentStore::new(dir.path());

        let result = store.write("/tmp/escape.txt", "x");
        assert!(matches!(result, Err(ContentStoreError::OutsideBase(_))));
    }

    #[test]
    fn test_read_outside_base_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalContentStore::new(dir.path());

        let result = store.read(Path::new("/etc/hostname"));
        assert!(matches!(result, Err(ContentStoreError::OutsideBase(_))));
    }
}
