//! # Master-Data Registry & Vote Ledger
//!
//! Two storage seams behind traits so the election core never cares what
//! actually holds the data:
//!
//! - [`Registry`] — houses, positions, candidates. Plain CRUD with the
//!   uniqueness constraints enforced *here*, where they can be made
//!   transactional.
//! - [`VoteLedger`] — the append-only records of accepted votes and of all
//!   attempts. [`VoteLedger::cast_vote`] is the sole authority on the
//!   one-vote-per-(house, position) invariant: it atomically
//!   checks-and-inserts, so two concurrent submissions for the same pair
//!   yield exactly one acceptance and one [`LedgerError::DuplicateVote`].
//!
//! [`MemoryStore`] implements both behind a single `parking_lot::RwLock`.
//! All trait methods return `Result` so a persistent backend can surface
//! connectivity faults; callers treat those as "system unavailable", never
//! as a failed vote.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Candidate, House, Position, Vote, VoteAttempt};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Faults of the storage backend itself, as opposed to anything the voter
/// did wrong. Never recorded as a failed attempt.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or the operation did not complete.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Rejections of master-data registration requests.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A house with the same id or house number already exists.
    #[error("House already registered")]
    HouseExists,

    /// The position referenced by a candidate registration does not exist.
    #[error("Position not found")]
    PositionNotFound,

    /// The candidate id is already claimed by a different position.
    /// Candidate ids are unique across the whole position collection.
    #[error("Candidate already registered for a different position")]
    CandidateConflict,

    /// The candidate id already exists within the target position.
    #[error("Candidate already registered for this position")]
    DuplicateCandidate,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Rejections of ledger writes.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An accepted vote already exists for this (house, position) pair.
    #[error("House already voted for this position")]
    DuplicateVote,

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Lookup and registration of election master data.
pub trait Registry: Send + Sync {
    /// Finds a house by its household number.
    fn house_by_number(&self, house_number: &str) -> Result<Option<House>, StoreError>;

    /// Finds a position by id.
    fn position(&self, position_id: &str) -> Result<Option<Position>, StoreError>;

    /// Snapshot of all positions in registration order.
    fn positions(&self) -> Result<Vec<Position>, StoreError>;

    /// Registers a new house. Rejects duplicates of either the id or the
    /// household number.
    fn register_house(&self, house: House) -> Result<House, RegistryError>;

    /// Creates or updates a position. On update, title and description are
    /// replaced; the slate is replaced only when `candidates` is `Some`.
    /// Returns the stored position and whether it already existed.
    fn upsert_position(
        &self,
        id: String,
        title: String,
        description: Option<String>,
        candidates: Option<Vec<Candidate>>,
    ) -> Result<(Position, bool), RegistryError>;

    /// Adds a candidate to its position's slate, enforcing global
    /// uniqueness of the candidate id across all positions.
    fn register_candidate(&self, candidate: Candidate) -> Result<Candidate, RegistryError>;
}

/// The append-only record of votes and attempts.
pub trait VoteLedger: Send + Sync {
    /// Whether an accepted vote already exists for the pair. An
    /// optimization for early rejection — [`cast_vote`](Self::cast_vote)
    /// re-checks under its own lock.
    fn has_voted(&self, house_number: &str, position_id: &str) -> Result<bool, StoreError>;

    /// Atomically checks-and-inserts an accepted vote for the pair.
    fn cast_vote(
        &self,
        house_number: &str,
        position_id: &str,
        candidate_id: &str,
    ) -> Result<Vote, LedgerError>;

    /// Appends one attempt record. Succeeds for any non-empty inputs.
    fn append_attempt(
        &self,
        house_number: &str,
        success: bool,
        origin: &str,
    ) -> Result<(), StoreError>;

    /// Snapshot of all accepted votes, in acceptance order.
    fn votes(&self) -> Result<Vec<Vote>, StoreError>;

    /// Snapshot of all attempt records, in arrival order.
    fn attempts(&self) -> Result<Vec<VoteAttempt>, StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Inner {
    /// Houses keyed by household number.
    houses: HashMap<String, House>,
    /// Registry-ids of houses, for the secondary uniqueness constraint.
    house_ids: HashSet<String>,
    /// Positions in registration order. The collection is small and the
    /// order is load-bearing (tie-breaks), so a Vec beats a map here.
    positions: Vec<Position>,
    /// Accepted votes in acceptance order.
    votes: Vec<Vote>,
    /// Uniqueness index over (house_number, position_id). Insertion into
    /// this set *is* the atomic check-and-insert of `cast_vote`.
    voted: HashSet<(String, String)>,
    /// All attempt records in arrival order.
    attempts: Vec<VoteAttempt>,
}

/// In-memory implementation of [`Registry`] and [`VoteLedger`].
///
/// A single `RwLock` keeps every invariant transactional: `cast_vote`
/// performs its duplicate check and its two inserts inside one write
/// critical section, which is the whole uniqueness argument.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registry for MemoryStore {
    fn house_by_number(&self, house_number: &str) -> Result<Option<House>, StoreError> {
        Ok(self.inner.read().houses.get(house_number).cloned())
    }

    fn position(&self, position_id: &str) -> Result<Option<Position>, StoreError> {
        Ok(self
            .inner
            .read()
            .positions
            .iter()
            .find(|p| p.id == position_id)
            .cloned())
    }

    fn positions(&self) -> Result<Vec<Position>, StoreError> {
        Ok(self.inner.read().positions.clone())
    }

    fn register_house(&self, house: House) -> Result<House, RegistryError> {
        let mut inner = self.inner.write();
        if inner.houses.contains_key(&house.house_number) || inner.house_ids.contains(&house.id) {
            return Err(RegistryError::HouseExists);
        }
        inner.house_ids.insert(house.id.clone());
        inner
            .houses
            .insert(house.house_number.clone(), house.clone());
        tracing::info!(house_number = %house.house_number, "house registered");
        Ok(house)
    }

    fn upsert_position(
        &self,
        id: String,
        title: String,
        description: Option<String>,
        candidates: Option<Vec<Candidate>>,
    ) -> Result<(Position, bool), RegistryError> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.positions.iter_mut().find(|p| p.id == id) {
            existing.title = title;
            existing.description = description;
            if let Some(slate) = candidates {
                existing.candidates = slate;
            }
            return Ok((existing.clone(), true));
        }

        let position = Position {
            id,
            title,
            description,
            candidates: candidates.unwrap_or_default(),
        };
        inner.positions.push(position.clone());
        tracing::info!(position_id = %position.id, "position registered");
        Ok((position, false))
    }

    fn register_candidate(&self, candidate: Candidate) -> Result<Candidate, RegistryError> {
        let mut inner = self.inner.write();

        // Candidate ids are globally unique: an id already present under a
        // *different* position is a conflict even before we look at the
        // target position.
        let claimed_elsewhere = inner
            .positions
            .iter()
            .any(|p| p.id != candidate.position_id && p.has_candidate(&candidate.id));
        if claimed_elsewhere {
            return Err(RegistryError::CandidateConflict);
        }

        let position = inner
            .positions
            .iter_mut()
            .find(|p| p.id == candidate.position_id)
            .ok_or(RegistryError::PositionNotFound)?;

        if position.has_candidate(&candidate.id) {
            return Err(RegistryError::DuplicateCandidate);
        }

        position.candidates.push(candidate.clone());
        tracing::info!(
            candidate_id = %candidate.id,
            position_id = %candidate.position_id,
            "candidate registered"
        );
        Ok(candidate)
    }
}

impl VoteLedger for MemoryStore {
    fn has_voted(&self, house_number: &str, position_id: &str) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .voted
            .contains(&(house_number.to_string(), position_id.to_string())))
    }

    fn cast_vote(
        &self,
        house_number: &str,
        position_id: &str,
        candidate_id: &str,
    ) -> Result<Vote, LedgerError> {
        let mut inner = self.inner.write();

        // HashSet::insert returning false is the compound-unique-constraint
        // violation; nothing else has been written at that point.
        if !inner
            .voted
            .insert((house_number.to_string(), position_id.to_string()))
        {
            return Err(LedgerError::DuplicateVote);
        }

        let vote = Vote {
            id: Uuid::new_v4(),
            house_number: house_number.to_string(),
            position_id: position_id.to_string(),
            candidate_id: candidate_id.to_string(),
            timestamp: Utc::now(),
        };
        inner.votes.push(vote.clone());
        Ok(vote)
    }

    fn append_attempt(
        &self,
        house_number: &str,
        success: bool,
        origin: &str,
    ) -> Result<(), StoreError> {
        self.inner.write().attempts.push(VoteAttempt {
            house_number: house_number.to_string(),
            success,
            origin: origin.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn votes(&self) -> Result<Vec<Vote>, StoreError> {
        Ok(self.inner.read().votes.clone())
    }

    fn attempts(&self) -> Result<Vec<VoteAttempt>, StoreError> {
        Ok(self.inner.read().attempts.clone())
    }
}
