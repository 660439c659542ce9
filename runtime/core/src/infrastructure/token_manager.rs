// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! HMAC approval tokens
//!
//! Short-lived, single-use bearer capabilities binding an approval decision
//! to an opaque payload string (the core always passes
//! `"thread_id:user_id:approval_hash"`). Token format:
//!
//! ```text
//! v1.<unix_ts>.<nonce_hex16>.<hmac_sha256_hex(secret, "<ts>:<nonce>:<payload>")>
//! ```
//!
//! Single-process correctness comes from the internal lock around the
//! used-token set. Multi-process deployments MUST substitute a distributed
//! single-use store (atomic set-if-absent + TTL) behind the same calls.

use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: &str = "v1";
const DEV_SENTINEL: &str = "dev-secret-key";
const MIN_SECRET_CHARS: usize = 32;

/// Default token lifetime, aligned with the approval TTL.
pub const DEFAULT_MAX_AGE_SECONDS: i64 = 300;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token manager requires a non-empty secret key")]
    EmptySecret,

    #[error("secret key too weak for production (minimum {MIN_SECRET_CHARS} chars, no dev sentinel)")]
    WeakSecret,
}

pub struct TokenManager {
    secret: Vec<u8>,
    /// token -> expiry unix timestamp; guarded for atomic check-and-mark
    used: Mutex<HashMap<String, i64>>,
}

impl TokenManager {
    /// `dev_mode` relaxes the weak-secret rejection for local development.
    pub fn new(secret_key: &str, dev_mode: bool) -> Result<Self, TokenError> {
        if secret_key.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        if !dev_mode && (secret_key == DEV_SENTINEL || secret_key.chars().count() < MIN_SECRET_CHARS)
        {
            return Err(TokenError::WeakSecret);
        }

        Ok(Self {
            secret: secret_key.as_bytes().to_vec(),
            used: Mutex::new(HashMap::new()),
        })
    }

    /// Sign an opaque payload, producing a fresh token.
    pub fn sign(&self, payload: &str) -> String {
        let timestamp = Utc::now().timestamp();
        let mut nonce_bytes = [0u8; 8];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = hex::encode(nonce_bytes);

        let signature = self.signature(timestamp, &nonce, payload);
        format!("{TOKEN_VERSION}.{timestamp}.{nonce}.{signature}")
    }

    /// Verify signature and expiry WITHOUT consuming. Read-only checks
    /// only — approval flows must use [`TokenManager::verify_and_consume`].
    pub fn verify(&self, token: &str, payload: &str, max_age_seconds: i64) -> bool {
        let Some((timestamp, nonce, signature)) = split_token(token) else {
            return false;
        };

        let age = Utc::now().timestamp() - timestamp;
        if age < 0 || age > max_age_seconds {
            return false;
        }

        let expected = self.signature(timestamp, nonce, payload);
        constant_time_eq(signature, &expected)
    }

    /// ATOMIC verify + anti-replay consumption. Returns `true` exactly once
    /// per valid `(token, payload)` pair; any failure leaves no state
    /// change.
    pub fn verify_and_consume(&self, token: &str, payload: &str, max_age_seconds: i64) -> bool {
        let mut used = self.used.lock();

        if !self.verify(token, payload, max_age_seconds) {
            return false;
        }

        if used.contains_key(token) {
            tracing::warn!("approval token replay rejected");
            return false;
        }

        let expiry = Utc::now().timestamp() + max_age_seconds;
        used.insert(token.to_string(), expiry);

        // Opportunistic TTL cleanup keeps the set bounded
        let now = Utc::now().timestamp();
        used.retain(|_, exp| *exp >= now);

        true
    }

    fn signature(&self, timestamp: i64, nonce: &str, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{timestamp}:{nonce}:{payload}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn split_token(token: &str) -> Option<(i64, &str, &str)> {
    let mut parts = token.split('.');
    let version = parts.next()?;
    let timestamp = parts.next()?.parse::<i64>().ok()?;
    let nonce = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() || version != TOKEN_VERSION {
        return None;
    }
    Some((timestamp, nonce, signature))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}
