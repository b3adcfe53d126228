//! # Per-Origin Fraud Tracking
//!
//! Counts failed vote attempts per network origin inside a sliding window
//! and issues temporary blocks once a configured threshold is reached.
//!
//! The window resets on success and on rollover, so the tracker punishes
//! *bursts* of failures, not lifetime totals: an origin that fails, waits
//! out the window, and fails again starts a fresh burst. Worst-case
//! blocking of well-behaved retry patterns stays bounded while rapid abuse
//! is still throttled.
//!
//! ## Concurrency
//!
//! State lives in a `DashMap` keyed by origin identifier. The entry API
//! holds the shard lock across the whole read-modify-write, so concurrent
//! attempts from the *same* origin serialize while different origins never
//! contend. There is no cross-origin shared state at all.
//!
//! ## Clocks
//!
//! All arithmetic is on unix-epoch milliseconds passed in explicitly; the
//! `*_at` variants exist so tests control time instead of sleeping through
//! fifteen-minute blocks.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::ElectionConfig;
use crate::model::FraudState;

/// Tunables for the fraud tracker, in the units it computes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FraudConfig {
    /// Length of the failed-attempt window in milliseconds.
    pub window_ms: i64,
    /// Failed attempts within one window before a block is issued.
    pub threshold: u32,
    /// Block duration in milliseconds.
    pub block_ms: i64,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            threshold: 5,
            block_ms: 15 * 60_000,
        }
    }
}

impl From<&ElectionConfig> for FraudConfig {
    fn from(cfg: &ElectionConfig) -> Self {
        Self {
            window_ms: cfg.rate_limit_window_ms,
            threshold: cfg.fraud_threshold,
            block_ms: cfg.fraud_block_ms(),
        }
    }
}

/// What [`FraudTracker::record_attempt`] decided about the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptOutcome {
    /// Whether the origin is blocked after this attempt was processed.
    pub blocked: bool,
    /// When the block lifts, if one is active (epoch millis).
    pub blocked_until: Option<i64>,
}

impl AttemptOutcome {
    fn clear() -> Self {
        Self {
            blocked: false,
            blocked_until: None,
        }
    }
}

/// Tracks attempt counts and blocks per origin identifier.
#[derive(Debug)]
pub struct FraudTracker {
    config: FraudConfig,
    states: DashMap<String, FraudState>,
}

impl FraudTracker {
    pub fn new(config: FraudConfig) -> Self {
        Self {
            config,
            states: DashMap::new(),
        }
    }

    /// Whether the origin is currently blocked. Pure read, no mutation —
    /// an expired block simply stops mattering; it is cleaned up lazily by
    /// the next recorded attempt.
    pub fn is_blocked(&self, origin: &str) -> bool {
        self.is_blocked_at(origin, now_ms())
    }

    /// Clock-injected variant of [`is_blocked`](Self::is_blocked).
    pub fn is_blocked_at(&self, origin: &str, now: i64) -> bool {
        self.states
            .get(origin)
            .map(|state| state.blocked_until.is_some_and(|until| until > now))
            .unwrap_or(false)
    }

    /// Records one vote attempt from `origin` and returns the origin's
    /// blocked status afterwards.
    ///
    /// Must be called exactly once per genuine vote attempt, after the
    /// ledger decision is made, so the attempt log and fraud state never
    /// diverge. Blocked requests are gated *before* the attempt exists and
    /// never reach this method.
    pub fn record_attempt(&self, origin: &str, success: bool) -> AttemptOutcome {
        self.record_attempt_at(origin, success, now_ms())
    }

    /// Clock-injected variant of [`record_attempt`](Self::record_attempt).
    pub fn record_attempt_at(&self, origin: &str, success: bool, now: i64) -> AttemptOutcome {
        match self.states.entry(origin.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(fresh_window(success, now));
                AttemptOutcome::clear()
            }
            Entry::Occupied(mut occupied) => {
                let state = occupied.get_mut();

                // An active block is returned untouched: further attempts
                // from a blocked origin neither extend nor shorten it.
                if let Some(until) = state.blocked_until {
                    if until > now {
                        return AttemptOutcome {
                            blocked: true,
                            blocked_until: Some(until),
                        };
                    }
                }

                // Window rolled over: start a fresh burst, clearing any
                // block that has meanwhile expired.
                if now - state.window_started_at > self.config.window_ms {
                    *state = fresh_window(success, now);
                    return AttemptOutcome::clear();
                }

                if success {
                    // A legitimate vote clears suspicion.
                    state.attempts = 0;
                } else {
                    state.attempts += 1;
                    if state.attempts >= self.config.threshold {
                        state.blocked_until = Some(now + self.config.block_ms);
                        tracing::warn!(
                            origin,
                            attempts = state.attempts,
                            blocked_until = state.blocked_until,
                            "origin blocked for repeated failed vote attempts"
                        );
                    }
                }

                AttemptOutcome {
                    blocked: state.blocked_until.is_some_and(|until| until > now),
                    blocked_until: state.blocked_until,
                }
            }
        }
    }

    /// Snapshot of one origin's state, mainly for diagnostics and tests.
    pub fn state(&self, origin: &str) -> Option<FraudState> {
        self.states.get(origin).map(|s| *s)
    }

    /// Number of origins ever seen.
    pub fn tracked_origins(&self) -> usize {
        self.states.len()
    }
}

fn fresh_window(success: bool, now: i64) -> FraudState {
    FraudState {
        attempts: if success { 0 } else { 1 },
        window_started_at: now,
        blocked_until: None,
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
