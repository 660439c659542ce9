// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Tolerant JSON extraction from LLM responses
//!
//! Models are prompted for bare JSON but routinely wrap it in fences or
//! prose. Extraction order: fenced blocks, direct parse, then the largest
//! balanced object found by a string-aware scan. `None` means the caller
//! falls back (single-step plan, empty proposal).

use regex::Regex;
use serde_json::Value;

pub struct JsonExtractor {
    fence_re: Regex,
}

impl JsonExtractor {
    pub fn new() -> Self {
        Self {
            fence_re: Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("static fence regex"),
        }
    }

    pub fn extract(&self, text: &str) -> Option<Value> {
        // 1. Fenced code blocks
        for captures in self.fence_re.captures_iter(text) {
            if let Some(block) = captures.get(1) {
                if let Ok(value) = serde_json::from_str::<Value>(block.as_str()) {
                    return Some(value);
                }
            }
        }

        // 2. Direct parse
        if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
            return Some(value);
        }

        // 3. Largest balanced object
        let mut candidates = balanced_objects(text);
        candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));
        for candidate in candidates {
            if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
                return Some(value);
            }
        }

        None
    }
}

impl Default for JsonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// All top-level balanced `{...}` spans in the text, tracked with a depth
/// counter that ignores braces inside JSON string literals.
fn balanced_objects(text: &str) -> Vec<String> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(idx);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            spans.push(text[s..=idx].to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    spans
}
