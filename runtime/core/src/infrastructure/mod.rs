// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod audit;
pub mod content_store;
pub mod dlp;
pub mod idempotency;
pub mod token_manager;
