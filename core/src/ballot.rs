//! # Vote Acceptance Procedure
//!
//! The decision procedure for a single inbound vote request. Validation
//! runs in a fixed order — missing fields, unknown house, duplicate vote,
//! invalid selection — and every rejection still leaves exactly one failed
//! row in the attempt log and one fraud-tracker update, so the audit trail
//! reflects all genuine attempts.
//!
//! Callers gate on [`FraudTracker::is_blocked`] *before* invoking
//! [`BallotBox::submit`]: a blocked origin's request never reaches
//! validation and produces no attempt record. A block is a hard gate, not
//! a logged rejection.
//!
//! Storage faults short-circuit without touching the attempt log or fraud
//! state — "the system was unavailable" must never be confused with "the
//! origin did something wrong".

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::fraud::FraudTracker;
use crate::model::{Vote, UNKNOWN_HOUSE};
use crate::store::{LedgerError, Registry, StoreError, VoteLedger};

/// A vote submission as it arrives off the wire. All fields optional so
/// the procedure, not the deserializer, owns the missing-field rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub house_number: Option<String>,
    pub position_id: Option<String>,
    pub candidate_id: Option<String>,
}

/// Why a vote request was not accepted.
#[derive(Debug, Error)]
pub enum VoteError {
    /// One of the three identifiers was absent or empty.
    #[error("houseNumber, positionId and candidateId required")]
    MissingField,

    /// No registered house carries the supplied household number.
    #[error("House not found")]
    UnknownHouse,

    /// The house has already voted for this position.
    #[error("House already voted for this position")]
    DuplicateVote,

    /// The position does not exist, or its slate does not contain the
    /// requested candidate.
    #[error("Invalid candidate or position")]
    InvalidSelection,

    /// The storage backend failed. Not a voter error and not recorded as
    /// a failed attempt.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VoteError {
    /// Whether this rejection counts against the origin in the attempt
    /// log and fraud tracker. Storage faults do not.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, VoteError::Store(_))
    }
}

/// Orchestrates validation, the ledger write, and fraud-state updates for
/// one store implementation. Cheap to clone — everything behind `Arc`.
pub struct BallotBox<S> {
    store: Arc<S>,
    fraud: Arc<FraudTracker>,
}

impl<S> Clone for BallotBox<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fraud: Arc::clone(&self.fraud),
        }
    }
}

impl<S> BallotBox<S>
where
    S: Registry + VoteLedger,
{
    pub fn new(store: Arc<S>, fraud: Arc<FraudTracker>) -> Self {
        Self { store, fraud }
    }

    /// The fraud tracker consulted by this ballot box. The transport layer
    /// uses it for the pre-submission block gate.
    pub fn fraud(&self) -> &FraudTracker {
        &self.fraud
    }

    /// Runs the acceptance procedure for one vote request from `origin`.
    ///
    /// On acceptance: the vote is in the ledger, a success attempt is
    /// logged, and the origin's failure count is reset. On rejection: a
    /// failed attempt is logged and counted against the origin before the
    /// error is returned.
    pub fn submit(&self, request: &VoteRequest, origin: &str) -> Result<Vote, VoteError> {
        let house_number = non_empty(&request.house_number);
        let position_id = non_empty(&request.position_id);
        let candidate_id = non_empty(&request.candidate_id);

        let (house_number, position_id, candidate_id) =
            match (house_number, position_id, candidate_id) {
                (Some(h), Some(p), Some(c)) => (h, p, c),
                (h, _, _) => {
                    let attributed = h.unwrap_or(UNKNOWN_HOUSE);
                    return Err(self.reject(attributed, origin, VoteError::MissingField));
                }
            };

        if self.store.house_by_number(house_number)?.is_none() {
            return Err(self.reject(house_number, origin, VoteError::UnknownHouse));
        }

        // Early duplicate check; the ledger re-checks atomically below.
        if self.store.has_voted(house_number, position_id)? {
            return Err(self.reject(house_number, origin, VoteError::DuplicateVote));
        }

        let selection_valid = self
            .store
            .position(position_id)?
            .is_some_and(|p| p.has_candidate(candidate_id));
        if !selection_valid {
            return Err(self.reject(house_number, origin, VoteError::InvalidSelection));
        }

        match self.store.cast_vote(house_number, position_id, candidate_id) {
            Ok(vote) => {
                self.log_attempt(house_number, true, origin);
                self.fraud.record_attempt(origin, true);
                tracing::info!(
                    house_number,
                    position_id,
                    candidate_id,
                    vote_id = %vote.id,
                    "vote accepted"
                );
                Ok(vote)
            }
            // Lost a race against a concurrent submission for the same
            // pair. Same rejection as the early check.
            Err(LedgerError::DuplicateVote) => {
                Err(self.reject(house_number, origin, VoteError::DuplicateVote))
            }
            Err(LedgerError::Store(e)) => Err(VoteError::Store(e)),
        }
    }

    /// Logs the failed attempt, updates fraud state, and hands the error
    /// back for returning.
    fn reject(&self, house_number: &str, origin: &str, error: VoteError) -> VoteError {
        debug_assert!(error.is_rejection());
        self.log_attempt(house_number, false, origin);
        self.fraud.record_attempt(origin, false);
        tracing::debug!(house_number, origin, %error, "vote rejected");
        error
    }

    fn log_attempt(&self, house_number: &str, success: bool, origin: &str) {
        // The attempt log is best-effort bookkeeping on the rejection
        // path; a fault here must not mask the real outcome.
        if let Err(e) = self.store.append_attempt(house_number, success, origin) {
            tracing::warn!(%e, "failed to append attempt record");
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fraud::FraudConfig;
    use crate::model::{Candidate, House, Position};
    use crate::store::{MemoryStore, RegistryError};

    /// A store whose backend can be made to fail at the lookup or the
    /// ledger-write stage, for exercising the storage-fault paths.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_lookups: bool,
        fail_cast: bool,
    }

    impl FlakyStore {
        fn unavailable() -> StoreError {
            StoreError::Unavailable("backend offline".into())
        }
    }

    impl Registry for FlakyStore {
        fn house_by_number(&self, house_number: &str) -> Result<Option<House>, StoreError> {
            if self.fail_lookups {
                return Err(Self::unavailable());
            }
            self.inner.house_by_number(house_number)
        }

        fn position(&self, position_id: &str) -> Result<Option<Position>, StoreError> {
            if self.fail_lookups {
                return Err(Self::unavailable());
            }
            self.inner.position(position_id)
        }

        fn positions(&self) -> Result<Vec<Position>, StoreError> {
            self.inner.positions()
        }

        fn register_house(&self, house: House) -> Result<House, RegistryError> {
            self.inner.register_house(house)
        }

        fn upsert_position(
            &self,
            id: String,
            title: String,
            description: Option<String>,
            candidates: Option<Vec<Candidate>>,
        ) -> Result<(Position, bool), RegistryError> {
            self.inner.upsert_position(id, title, description, candidates)
        }

        fn register_candidate(&self, candidate: Candidate) -> Result<Candidate, RegistryError> {
            self.inner.register_candidate(candidate)
        }
    }

    impl VoteLedger for FlakyStore {
        fn has_voted(&self, house_number: &str, position_id: &str) -> Result<bool, StoreError> {
            if self.fail_lookups {
                return Err(Self::unavailable());
            }
            self.inner.has_voted(house_number, position_id)
        }

        fn cast_vote(
            &self,
            house_number: &str,
            position_id: &str,
            candidate_id: &str,
        ) -> Result<Vote, LedgerError> {
            if self.fail_cast {
                return Err(LedgerError::Store(Self::unavailable()));
            }
            self.inner.cast_vote(house_number, position_id, candidate_id)
        }

        fn append_attempt(
            &self,
            house_number: &str,
            success: bool,
            origin: &str,
        ) -> Result<(), StoreError> {
            self.inner.append_attempt(house_number, success, origin)
        }

        fn votes(&self) -> Result<Vec<Vote>, StoreError> {
            self.inner.votes()
        }

        fn attempts(&self) -> Result<Vec<crate::model::VoteAttempt>, StoreError> {
            self.inner.attempts()
        }
    }

    fn fixture() -> BallotBox<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .register_house(House {
                id: "h1".into(),
                house_number: "A-101".into(),
                house_owner: "Owner".into(),
            })
            .unwrap();
        store
            .upsert_position("P1".into(), "President".into(), None, None)
            .unwrap();
        store
            .register_candidate(Candidate {
                id: "C1".into(),
                name: "Alice".into(),
                photo: None,
                motto: None,
                description: None,
                position_id: "P1".into(),
            })
            .unwrap();
        store
            .register_candidate(Candidate {
                id: "C2".into(),
                name: "Bob".into(),
                photo: None,
                motto: None,
                description: None,
                position_id: "P1".into(),
            })
            .unwrap();

        let fraud = Arc::new(FraudTracker::new(FraudConfig::default()));
        BallotBox::new(store, fraud)
    }

    fn request(house: &str, position: &str, candidate: &str) -> VoteRequest {
        VoteRequest {
            house_number: Some(house.into()),
            position_id: Some(position.into()),
            candidate_id: Some(candidate.into()),
        }
    }

    fn store_of(ballot: &BallotBox<MemoryStore>) -> &MemoryStore {
        &ballot.store
    }

    #[test]
    fn valid_vote_is_accepted_and_logged() {
        let ballot = fixture();
        let vote = ballot.submit(&request("A-101", "P1", "C1"), "1.2.3.4").unwrap();
        assert_eq!(vote.house_number, "A-101");
        assert_eq!(vote.candidate_id, "C1");

        let attempts = store_of(&ballot).attempts().unwrap();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].success);
        assert_eq!(attempts[0].origin, "1.2.3.4");
        // Success resets the origin's failure count.
        assert_eq!(ballot.fraud().state("1.2.3.4").unwrap().attempts, 0);
    }

    #[test]
    fn missing_fields_rejected_and_attributed_to_unknown() {
        let ballot = fixture();
        let err = ballot
            .submit(&VoteRequest::default(), "1.2.3.4")
            .unwrap_err();
        assert!(matches!(err, VoteError::MissingField));

        let attempts = store_of(&ballot).attempts().unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].house_number, UNKNOWN_HOUSE);
        assert!(!attempts[0].success);
        assert_eq!(ballot.fraud().state("1.2.3.4").unwrap().attempts, 1);
    }

    #[test]
    fn empty_string_fields_count_as_missing() {
        let ballot = fixture();
        let err = ballot
            .submit(&request("A-101", "", "C1"), "1.2.3.4")
            .unwrap_err();
        assert!(matches!(err, VoteError::MissingField));
        // The house number was supplied, so the attempt is attributed.
        let attempts = store_of(&ballot).attempts().unwrap();
        assert_eq!(attempts[0].house_number, "A-101");
    }

    #[test]
    fn unknown_house_rejected() {
        let ballot = fixture();
        let err = ballot
            .submit(&request("Z-999", "P1", "C1"), "1.2.3.4")
            .unwrap_err();
        assert!(matches!(err, VoteError::UnknownHouse));
        assert_eq!(store_of(&ballot).attempts().unwrap().len(), 1);
    }

    #[test]
    fn second_vote_for_same_position_rejected() {
        let ballot = fixture();
        ballot.submit(&request("A-101", "P1", "C1"), "1.2.3.4").unwrap();

        let err = ballot
            .submit(&request("A-101", "P1", "C2"), "1.2.3.4")
            .unwrap_err();
        assert!(matches!(err, VoteError::DuplicateVote));

        // Vote count unchanged, both attempts on record.
        assert_eq!(store_of(&ballot).votes().unwrap().len(), 1);
        assert_eq!(store_of(&ballot).attempts().unwrap().len(), 2);
    }

    #[test]
    fn unknown_position_or_candidate_rejected() {
        let ballot = fixture();
        let err = ballot
            .submit(&request("A-101", "P9", "C1"), "1.2.3.4")
            .unwrap_err();
        assert!(matches!(err, VoteError::InvalidSelection));

        let err = ballot
            .submit(&request("A-101", "P1", "C9"), "1.2.3.4")
            .unwrap_err();
        assert!(matches!(err, VoteError::InvalidSelection));
        assert_eq!(store_of(&ballot).attempts().unwrap().len(), 2);
    }

    #[test]
    fn rejections_accumulate_toward_a_block() {
        let ballot = fixture();
        for _ in 0..5 {
            let _ = ballot.submit(&VoteRequest::default(), "6.6.6.6");
        }
        assert!(ballot.fraud().is_blocked("6.6.6.6"));
        // Five genuine attempts on record; the block gate lives upstream.
        assert_eq!(store_of(&ballot).attempts().unwrap().len(), 5);
    }

    #[test]
    fn storage_fault_during_lookup_leaves_no_trace() {
        let store = Arc::new(FlakyStore {
            fail_lookups: true,
            ..Default::default()
        });
        let fraud = Arc::new(FraudTracker::new(FraudConfig::default()));
        let ballot = BallotBox::new(Arc::clone(&store), fraud);

        let err = ballot
            .submit(&request("A-101", "P1", "C1"), "1.2.3.4")
            .unwrap_err();
        assert!(matches!(err, VoteError::Store(_)));
        assert!(!err.is_rejection());

        // An unavailable backend is not a voter error: no attempt record,
        // no fraud state.
        assert!(store.attempts().unwrap().is_empty());
        assert!(ballot.fraud().state("1.2.3.4").is_none());
    }

    #[test]
    fn storage_fault_during_cast_leaves_no_trace() {
        let store = FlakyStore {
            fail_cast: true,
            ..Default::default()
        };
        store
            .register_house(House {
                id: "h1".into(),
                house_number: "A-101".into(),
                house_owner: "Owner".into(),
            })
            .unwrap();
        store
            .upsert_position("P1".into(), "President".into(), None, None)
            .unwrap();
        store
            .register_candidate(Candidate {
                id: "C1".into(),
                name: "Alice".into(),
                photo: None,
                motto: None,
                description: None,
                position_id: "P1".into(),
            })
            .unwrap();

        let store = Arc::new(store);
        let fraud = Arc::new(FraudTracker::new(FraudConfig::default()));
        let ballot = BallotBox::new(Arc::clone(&store), fraud);

        // Validation passes; the ledger write itself fails.
        let err = ballot
            .submit(&request("A-101", "P1", "C1"), "1.2.3.4")
            .unwrap_err();
        assert!(matches!(err, VoteError::Store(_)));

        assert!(store.votes().unwrap().is_empty());
        assert!(store.attempts().unwrap().is_empty());
        assert!(ballot.fraud().state("1.2.3.4").is_none());
    }

    #[test]
    fn error_messages_match_the_api_contract() {
        assert_eq!(
            VoteError::MissingField.to_string(),
            "houseNumber, positionId and candidateId required"
        );
        assert_eq!(VoteError::UnknownHouse.to_string(), "House not found");
        assert_eq!(
            VoteError::DuplicateVote.to_string(),
            "House already voted for this position"
        );
        assert_eq!(
            VoteError::InvalidSelection.to_string(),
            "Invalid candidate or position"
        );
    }
}
