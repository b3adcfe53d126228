//! # Transport-Layer Rate Limiter
//!
//! A fixed-window per-origin request counter applied to the vote endpoint
//! before anything else runs — before fraud checks, before validation,
//! before any attempt record exists. Over-cap requests are refused with
//! 429 and leave no trace in the audit trail; they never counted as vote
//! attempts in the first place.
//!
//! Distinct from the fraud tracker on purpose: this caps *request volume*
//! per window regardless of outcome, while the fraud tracker reacts to
//! *failed attempts* and escalates to longer blocks.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use ballot_core::config::ElectionConfig;

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: i64,
    count: u32,
}

/// Per-origin fixed-window request counter.
#[derive(Debug)]
pub struct RateLimiter {
    window_ms: i64,
    max: u32,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(window_ms: i64, max: u32) -> Self {
        Self {
            window_ms,
            max,
            windows: DashMap::new(),
        }
    }

    pub fn from_config(cfg: &ElectionConfig) -> Self {
        Self::new(cfg.rate_limit_window_ms, cfg.rate_limit_max)
    }

    /// Counts one request from `origin` and returns whether it may
    /// proceed. The entry API serializes updates per origin.
    pub fn allow(&self, origin: &str) -> bool {
        self.allow_at(origin, Utc::now().timestamp_millis())
    }

    /// Clock-injected variant of [`allow`](Self::allow).
    pub fn allow_at(&self, origin: &str, now: i64) -> bool {
        match self.windows.entry(origin.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(Window {
                    started_at: now,
                    count: 1,
                });
                self.max >= 1
            }
            Entry::Occupied(mut occupied) => {
                let window = occupied.get_mut();
                if now - window.started_at > self.window_ms {
                    *window = Window {
                        started_at: now,
                        count: 1,
                    };
                    return self.max >= 1;
                }
                window.count += 1;
                window.count <= self.max
            }
        }
    }
}
