// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Canonical JSON and content hashing
//!
//! Every integrity decision in the runtime (proposal hashes, idempotency
//! keys, audit chain links) goes through the same two functions so that a
//! byte-level mismatch anywhere is a tamper signal, never a formatting
//! artifact.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Deterministic serialization for hashing

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serialize a JSON value deterministically: object keys sorted
/// lexicographically, `","`/`":"` separators, no whitespace.
///
/// The output is stable across processes and serde_json versions, which is
/// what makes `sha256_hex(canonicalize(args))` usable as an integrity hash.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // serde_json string rendering handles escaping
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Display for scalars is already compact
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Hex-encoded SHA-256 of a UTF-8 string.
pub fn sha256_hex(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
