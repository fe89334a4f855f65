//! Vote aggregation.

use std::collections::BTreeMap;

use crate::model::common::election::{CandidateIndex, Position, PositionIndex, Selections};

/// Per-position, per-candidate vote counts for one election.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    vote_counts: BTreeMap<PositionIndex, BTreeMap<CandidateIndex, u64>>,
    total_votes: u64,
}

/// Who is ahead for a single position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leader {
    /// Nobody has voted for this position.
    Nobody,
    Winner(CandidateIndex),
    /// Several candidates share the maximum count.
    Tie(Vec<CandidateIndex>),
}

impl Tally {
    /// A tally with a zero count for every (position, candidate) pair.
    pub fn new(positions: &[Position]) -> Self {
        let vote_counts = positions
            .iter()
            .enumerate()
            .map(|(p, position)| (p, (0..position.candidates.len()).map(|c| (c, 0)).collect()))
            .collect();
        Self {
            vote_counts,
            total_votes: 0,
        }
    }

    /// Count every vote for an election with the given positions.
    pub fn count<'a>(
        positions: &[Position],
        votes: impl IntoIterator<Item = &'a Selections>,
    ) -> Self {
        let mut tally = Self::new(positions);
        for selections in votes {
            tally.add(selections);
        }
        tally
    }

    /// Add one vote. Selections for unknown positions or candidates are ignored,
    /// since the admission check never lets them in.
    fn add(&mut self, selections: &Selections) {
        self.total_votes += 1;
        for (position, candidate) in selections.iter() {
            if let Some(count) = self
                .vote_counts
                .get_mut(&position)
                .and_then(|candidates| candidates.get_mut(&candidate))
            {
                *count += 1;
            }
        }
    }

    /// Position index to candidate index to count.
    pub fn vote_counts(&self) -> &BTreeMap<PositionIndex, BTreeMap<CandidateIndex, u64>> {
        &self.vote_counts
    }

    /// Number of votes cast, including ones that skipped some positions.
    pub fn total_votes(&self) -> u64 {
        self.total_votes
    }

    pub fn votes_for(&self, position: PositionIndex, candidate: CandidateIndex) -> u64 {
        self.vote_counts
            .get(&position)
            .and_then(|candidates| candidates.get(&candidate))
            .copied()
            .unwrap_or(0)
    }

    /// Number of selections made for the given position.
    pub fn position_total(&self, position: PositionIndex) -> u64 {
        self.vote_counts
            .get(&position)
            .map(|candidates| candidates.values().sum())
            .unwrap_or(0)
    }

    /// Number of selections made across all positions.
    pub fn total_selections(&self) -> u64 {
        self.vote_counts
            .keys()
            .map(|position| self.position_total(*position))
            .sum()
    }

    pub fn leader(&self, position: PositionIndex) -> Leader {
        let Some(candidates) = self.vote_counts.get(&position) else {
            return Leader::Nobody;
        };
        let max = candidates.values().copied().max().unwrap_or(0);
        if max == 0 {
            return Leader::Nobody;
        }
        let mut leaders: Vec<_> = candidates
            .iter()
            .filter(|(_, count)| **count == max)
            .map(|(candidate, _)| *candidate)
            .collect();
        if leaders.len() == 1 {
            Leader::Winner(leaders.remove(0))
        } else {
            Leader::Tie(leaders)
        }
    }
}
