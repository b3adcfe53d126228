// Copyright (c) 2026 Ballot Contributors. MIT License.
// See LICENSE for details.

//! # Ballot — Core Election Library
//!
//! The domain core of a housing-society election backend: one ballot per
//! voting household per elective position, defended against duplicate
//! submission and abusive retry traffic from a single network origin.
//!
//! The hard part is not storing houses and candidates — it is keeping the
//! at-most-one-vote guarantee honest while the internet does what the
//! internet does. The modules mirror those concerns:
//!
//! - **model** — Houses, positions, candidates, votes, and attempt records.
//! - **origin** — Resolves a stable identifier for a request's network origin.
//! - **fraud** — Per-origin sliding-window attempt tracking with escalating
//!   temporary blocks.
//! - **store** — Master-data registry and the append-only vote ledger. The
//!   ledger, not the caller, is the authority on uniqueness.
//! - **ballot** — The vote-acceptance procedure tying the above together.
//! - **results** — Tallies, winners, percentages, and a suspicious-activity
//!   report reconciled from the attempt log.
//! - **config** — Environment-sourced tuning knobs, read once at startup.
//!
//! ## Design Philosophy
//!
//! 1. The ledger enforces uniqueness atomically; duplicate pre-checks are an
//!    optimization, never the safety net.
//! 2. Every genuine vote attempt — accepted or rejected — lands in the audit
//!    trail exactly once. Blocked origins never reach the trail at all.
//! 3. Fraud tracking is a deterrent heuristic, not a safety property. It may
//!    go slightly stale; votes may not.

pub mod ballot;
pub mod config;
pub mod fraud;
pub mod model;
pub mod origin;
pub mod results;
pub mod store;
