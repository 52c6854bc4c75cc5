//! Deterministic candidate ranking.

use std::cmp::Ordering;

use crate::config::RankingWeights;
use crate::core::availability::Candidate;

/// A candidate with its computed score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    /// The scored candidate.
    pub candidate: Candidate,
    /// Weighted score; higher is better.
    pub score: f64,
}

/// Orders eligible drivers by weighted score.
///
/// Ties fall back to rating, then completed jobs, then driver id, so the
/// order is total and reproducible.
#[derive(Debug, Clone)]
pub struct CandidateRanker {
    weights: RankingWeights,
}

impl CandidateRanker {
    /// Create a ranker with the given weights.
    pub const fn new(weights: RankingWeights) -> Self {
        Self { weights }
    }

    /// Weighted score of one candidate.
    pub fn score(&self, c: &Candidate) -> f64 {
        let w = &self.weights;
        let completed = f64::from(c.completed_jobs.min(w.completed_cap));
        let recent = f64::from(c.recent_jobs.min(w.recent_cap));
        let hours = c.available_hours.max(0.0).min(w.hours_cap);
        c.rating.mul_add(
            w.rating,
            completed.mul_add(w.completed, recent.mul_add(w.recent, hours * w.hours)),
        )
    }

    /// Score and sort, best first.
    pub fn rank(&self, candidates: Vec<Candidate>) -> Vec<RankedCandidate> {
        let mut ranked: Vec<RankedCandidate> = candidates
            .into_iter()
            .map(|candidate| RankedCandidate {
                score: self.score(&candidate),
                candidate,
            })
            .collect();
        ranked.sort_by(compare);
        ranked
    }
}

fn compare(a: &RankedCandidate, b: &RankedCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.candidate.rating.total_cmp(&a.candidate.rating))
        .then_with(|| b.candidate.completed_jobs.cmp(&a.candidate.completed_jobs))
        .then_with(|| a.candidate.driver_id.cmp(&b.candidate.driver_id))
}
