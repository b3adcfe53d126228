//! # Results Aggregation
//!
//! Read-only reconciliation of the vote ledger and the attempt log into
//! per-position tallies, winners, percentages, and a suspicious-activity
//! report. Runs over plain snapshots, so it can execute concurrently with
//! live voting; the statistics are eventually consistent and that is fine.
//!
//! Tallying is deliberately defensive: a vote referencing a position or
//! candidate the registry no longer knows is skipped, never fatal. Ledger
//! and master data can drift; results must still render.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{Position, Vote, VoteAttempt};

/// One candidate's line in a position's tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTally {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub votes: u64,
    /// Share of the position's total, as a two-decimal percentage rounded
    /// half-up at the hundredths place.
    pub percentage: f64,
    pub is_winner: bool,
}

/// Tally for one position: candidates sorted by votes descending, with
/// registration order breaking ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResult {
    pub id: String,
    pub title: String,
    pub total_votes: u64,
    pub candidates: Vec<CandidateTally>,
    /// The winning candidate, or `None` when the position drew no votes.
    pub winner: Option<CandidateTally>,
}

/// A household flagged by suspicious-pattern detection: more than one
/// recorded attempt, none of them successful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspiciousHouse {
    pub house_number: String,
    pub attempts: u64,
    pub successes: u64,
}

/// The cross-cutting statistics block of the full results report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionStats {
    pub total_votes: u64,
    /// Distinct households with at least one accepted vote.
    pub voted_houses: u64,
    pub failed_attempts: u64,
    pub multiple_vote_attempts: Vec<SuspiciousHouse>,
}

/// Full aggregation output: statistics plus per-position results keyed by
/// position id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsReport {
    pub stats: ElectionStats,
    pub results: BTreeMap<String, PositionResult>,
}

/// The lightweight subset served on the stats endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickStats {
    pub total_votes: u64,
    pub voted_houses: u64,
    pub failed_attempts: u64,
}

/// Computes the full results report from snapshots of the registry and
/// the ledger.
pub fn aggregate(
    positions: &[Position],
    votes: &[Vote],
    attempts: &[VoteAttempt],
) -> ResultsReport {
    let mut results: BTreeMap<String, PositionResult> = positions
        .iter()
        .map(|pos| {
            let tallies = pos
                .candidates
                .iter()
                .map(|c| CandidateTally {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    photo: c.photo.clone(),
                    votes: 0,
                    percentage: 0.0,
                    is_winner: false,
                })
                .collect();
            (
                pos.id.clone(),
                PositionResult {
                    id: pos.id.clone(),
                    title: pos.title.clone(),
                    total_votes: 0,
                    candidates: tallies,
                    winner: None,
                },
            )
        })
        .collect();

    // Single pass over the ledger. Every vote's house counts as "voted"
    // even if its position has since vanished from the registry.
    let mut voted_houses: HashSet<&str> = HashSet::new();
    for vote in votes {
        voted_houses.insert(&vote.house_number);
        let Some(result) = results.get_mut(&vote.position_id) else {
            continue;
        };
        if let Some(tally) = result
            .candidates
            .iter_mut()
            .find(|c| c.id == vote.candidate_id)
        {
            tally.votes += 1;
            result.total_votes += 1;
        }
    }

    for result in results.values_mut() {
        if result.total_votes == 0 {
            continue;
        }
        for tally in &mut result.candidates {
            tally.percentage =
                (tally.votes as f64 / result.total_votes as f64 * 10_000.0).round() / 100.0;
        }
        // Stable sort: equal counts keep registration order, which is the
        // documented tie-break.
        result.candidates.sort_by(|a, b| b.votes.cmp(&a.votes));
        if let Some(top) = result.candidates.first_mut() {
            top.is_winner = true;
            result.winner = Some(top.clone());
        }
    }

    let failed_attempts = attempts.iter().filter(|a| !a.success).count() as u64;

    ResultsReport {
        stats: ElectionStats {
            total_votes: votes.len() as u64,
            voted_houses: voted_houses.len() as u64,
            failed_attempts,
            multiple_vote_attempts: suspicious_houses(attempts),
        },
        results,
    }
}

/// Computes the lightweight stats subset straight from ledger snapshots.
pub fn quick_stats(votes: &[Vote], attempts: &[VoteAttempt]) -> QuickStats {
    let voted_houses: HashSet<&str> = votes.iter().map(|v| v.house_number.as_str()).collect();
    QuickStats {
        total_votes: votes.len() as u64,
        voted_houses: voted_houses.len() as u64,
        failed_attempts: attempts.iter().filter(|a| !a.success).count() as u64,
    }
}

/// Flags households that retried without ever producing an accepted vote:
/// more than one attempt, zero successes.
///
/// Households keyed here include the "unknown" sentinel. Origins that
/// retry after already succeeding are deliberately *not* flagged — the
/// report targets fruitless retry patterns only.
fn suspicious_houses(attempts: &[VoteAttempt]) -> Vec<SuspiciousHouse> {
    let mut by_house: HashMap<&str, (u64, u64)> = HashMap::new();
    for attempt in attempts {
        let entry = by_house.entry(&attempt.house_number).or_default();
        entry.0 += 1;
        if attempt.success {
            entry.1 += 1;
        }
    }

    let mut flagged: Vec<SuspiciousHouse> = by_house
        .into_iter()
        .filter(|(_, (attempts, successes))| *attempts > 1 && *successes == 0)
        .map(|(house, (attempts, successes))| SuspiciousHouse {
            house_number: house.to_string(),
            attempts,
            successes,
        })
        .collect();
    // Deterministic output order regardless of hash-map iteration.
    flagged.sort_by(|a, b| a.house_number.cmp(&b.house_number));
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn candidate(id: &str, position_id: &str) -> crate::model::Candidate {
        crate::model::Candidate {
            id: id.into(),
            name: format!("Candidate {id}"),
            photo: None,
            motto: None,
            description: None,
            position_id: position_id.into(),
        }
    }

    fn position(id: &str, candidate_ids: &[&str]) -> Position {
        Position {
            id: id.into(),
            title: format!("Position {id}"),
            description: None,
            candidates: candidate_ids.iter().map(|c| candidate(c, id)).collect(),
        }
    }

    fn vote(house: &str, position: &str, candidate: &str) -> Vote {
        Vote {
            id: Uuid::new_v4(),
            house_number: house.into(),
            position_id: position.into(),
            candidate_id: candidate.into(),
            timestamp: Utc::now(),
        }
    }

    fn attempt(house: &str, success: bool) -> VoteAttempt {
        VoteAttempt {
            house_number: house.into(),
            success,
            origin: "1.2.3.4".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn two_one_split_yields_expected_percentages() {
        let positions = vec![position("P1", &["C1", "C2"])];
        let votes = vec![
            vote("A-101", "P1", "C1"),
            vote("A-102", "P1", "C1"),
            vote("A-103", "P1", "C2"),
        ];
        let report = aggregate(&positions, &votes, &[]);

        let p1 = &report.results["P1"];
        assert_eq!(p1.total_votes, 3);
        assert_eq!(p1.candidates[0].id, "C1");
        assert_eq!(p1.candidates[0].votes, 2);
        assert_eq!(p1.candidates[0].percentage, 66.67);
        assert_eq!(p1.candidates[1].votes, 1);
        assert_eq!(p1.candidates[1].percentage, 33.33);

        let winner = p1.winner.as_ref().unwrap();
        assert_eq!(winner.id, "C1");
        assert!(winner.is_winner);
        assert_eq!(report.stats.total_votes, 3);
        assert_eq!(report.stats.voted_houses, 3);
    }

    #[test]
    fn percentages_sum_to_one_hundred_within_tolerance() {
        let positions = vec![position("P1", &["C1", "C2", "C3"])];
        let votes = vec![
            vote("A-1", "P1", "C1"),
            vote("A-2", "P1", "C1"),
            vote("A-3", "P1", "C2"),
            vote("A-4", "P1", "C2"),
            vote("A-5", "P1", "C2"),
            vote("A-6", "P1", "C3"),
            vote("A-7", "P1", "C3"),
        ];
        let report = aggregate(&positions, &votes, &[]);
        let sum: f64 = report.results["P1"]
            .candidates
            .iter()
            .map(|c| c.percentage)
            .sum();
        assert!((sum - 100.0).abs() <= 0.01 * 3.0, "sum was {sum}");
    }

    #[test]
    fn zero_vote_position_has_null_winner() {
        let positions = vec![position("P1", &["C1", "C2"])];
        let report = aggregate(&positions, &[], &[]);
        let p1 = &report.results["P1"];
        assert_eq!(p1.total_votes, 0);
        assert!(p1.winner.is_none());
        assert!(p1.candidates.iter().all(|c| c.percentage == 0.0));
    }

    #[test]
    fn ties_resolve_to_registration_order() {
        let positions = vec![position("P1", &["C1", "C2", "C3"])];
        let votes = vec![
            vote("A-1", "P1", "C2"),
            vote("A-2", "P1", "C3"),
            vote("A-3", "P1", "C3"),
            vote("A-4", "P1", "C2"),
        ];
        let report = aggregate(&positions, &votes, &[]);
        // C2 and C3 tie at two votes each; C2 registered first.
        assert_eq!(report.results["P1"].winner.as_ref().unwrap().id, "C2");
    }

    #[test]
    fn aggregation_is_deterministic() {
        let positions = vec![position("P1", &["C1", "C2"]), position("P2", &["C3"])];
        let votes = vec![
            vote("A-1", "P1", "C1"),
            vote("A-2", "P1", "C2"),
            vote("A-3", "P2", "C3"),
        ];
        let attempts = vec![attempt("A-1", true), attempt("B-9", false)];

        let first = aggregate(&positions, &votes, &attempts);
        let second = aggregate(&positions, &votes, &attempts);
        assert_eq!(first, second);
    }

    #[test]
    fn vote_for_unknown_position_is_skipped() {
        let positions = vec![position("P1", &["C1"])];
        let votes = vec![vote("A-1", "P1", "C1"), vote("A-2", "P9", "C9")];
        let report = aggregate(&positions, &votes, &[]);

        assert_eq!(report.results["P1"].total_votes, 1);
        // The stray vote still counts toward the raw stats.
        assert_eq!(report.stats.total_votes, 2);
        assert_eq!(report.stats.voted_houses, 2);
    }

    #[test]
    fn vote_for_unknown_candidate_is_skipped() {
        let positions = vec![position("P1", &["C1"])];
        let votes = vec![vote("A-1", "P1", "C9")];
        let report = aggregate(&positions, &votes, &[]);
        assert_eq!(report.results["P1"].total_votes, 0);
        assert!(report.results["P1"].winner.is_none());
    }

    #[test]
    fn suspicious_report_flags_fruitless_retries_only() {
        let attempts = vec![
            // Two failures, no success: flagged.
            attempt("A-101", false),
            attempt("A-101", false),
            // One failure then a success: not flagged.
            attempt("B-202", false),
            attempt("B-202", true),
            // A single failure: not flagged.
            attempt("C-303", false),
            // The unattributable sentinel is a household like any other.
            attempt("unknown", false),
            attempt("unknown", false),
            attempt("unknown", false),
        ];
        let report = aggregate(&[], &[], &attempts);

        let flagged = &report.stats.multiple_vote_attempts;
        assert_eq!(flagged.len(), 2);
        assert_eq!(flagged[0].house_number, "A-101");
        assert_eq!(flagged[0].attempts, 2);
        assert_eq!(flagged[1].house_number, "unknown");
        assert_eq!(flagged[1].attempts, 3);
        assert_eq!(report.stats.failed_attempts, 7);
    }

    #[test]
    fn quick_stats_match_full_report() {
        let votes = vec![
            vote("A-1", "P1", "C1"),
            vote("A-1", "P2", "C2"),
            vote("B-2", "P1", "C1"),
        ];
        let attempts = vec![
            attempt("A-1", true),
            attempt("A-1", true),
            attempt("B-2", true),
            attempt("Z-9", false),
        ];
        let stats = quick_stats(&votes, &attempts);
        assert_eq!(stats.total_votes, 3);
        assert_eq!(stats.voted_houses, 2);
        assert_eq!(stats.failed_attempts, 1);
    }
}
