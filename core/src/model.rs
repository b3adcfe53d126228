//! # Domain Model
//!
//! The records an election is made of. Wire representations use camelCase
//! field names — the public API contract predates this implementation and
//! the frontend is not getting rewritten over a naming convention.
//!
//! [`Vote`] and [`VoteAttempt`] are append-only: once written they are never
//! updated or deleted. Everything that makes the results trustworthy
//! follows from that.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel household identifier recorded when a request omitted its
/// house number entirely. Keeps the attempt log one-row-per-request even
/// for requests too malformed to attribute.
pub const UNKNOWN_HOUSE: &str = "unknown";

/// A registered voting household. Created once at registration and
/// immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct House {
    /// Registry-unique identifier.
    pub id: String,
    /// The household number voters identify themselves by. Unique.
    pub house_number: String,
    /// Name of the registered owner.
    pub house_owner: String,
}

/// A candidate standing for exactly one position.
///
/// Candidate ids are unique across the *entire* position collection, not
/// just within one position — registration rejects an id already claimed
/// elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Globally unique candidate identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional photo URL or data reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    /// Optional campaign motto.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motto: Option<String>,
    /// Optional free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The position this candidate stands for.
    pub position_id: String,
}

/// An elective position with its slate of candidates.
///
/// Candidates are kept in registration order; tallying relies on that
/// order as the deterministic tie-break between equal vote counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Registry-unique position identifier.
    pub id: String,
    /// Human-readable title, e.g. "Society President".
    pub title: String,
    /// Optional description of the position's responsibilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Candidates standing for this position, in registration order.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl Position {
    /// Whether this position's slate contains the given candidate id.
    pub fn has_candidate(&self, candidate_id: &str) -> bool {
        self.candidates.iter().any(|c| c.id == candidate_id)
    }
}

/// An accepted vote. At most one exists per (house_number, position_id)
/// pair — the core correctness invariant of the whole system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// Server-assigned record id.
    pub id: Uuid,
    /// The household that cast the vote.
    pub house_number: String,
    /// The position voted on.
    pub position_id: String,
    /// The candidate voted for. Guaranteed to exist inside the position
    /// identified by `position_id` at acceptance time.
    pub candidate_id: String,
    /// When the ledger accepted the vote.
    pub timestamp: DateTime<Utc>,
}

/// One row per vote request, accepted or not. The audit trail and the
/// input to suspicious-pattern detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteAttempt {
    /// Household number as supplied, or [`UNKNOWN_HOUSE`] when omitted.
    pub house_number: String,
    /// Whether the attempt produced an accepted vote.
    pub success: bool,
    /// The resolved network-origin identifier of the request.
    pub origin: String,
    /// When the attempt was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Per-origin fraud-tracking state. One record per origin identifier,
/// created on the first attempt ever seen from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudState {
    /// Failed attempts counted within the current window.
    pub attempts: u32,
    /// Unix-epoch milliseconds of the first attempt in the current window.
    pub window_started_at: i64,
    /// If set, the origin is blocked until this instant (epoch millis).
    pub blocked_until: Option<i64>,
}
