use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::serde_string_map;

/// Index of a position within its election.
pub type PositionIndex = usize;

/// Index of a candidate within its position.
pub type CandidateIndex = usize;

/// One decision within an election, with its ordered candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub name: String,
    pub candidates: Vec<String>,
}

impl Position {
    /// Get the name of the candidate at the given index, if it exists.
    pub fn candidate(&self, index: CandidateIndex) -> Option<&str> {
        self.candidates.get(index).map(String::as_str)
    }
}

/// A voter's choices: at most one candidate per position.
///
/// Positions may be left out; a partial vote is still a vote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selections(#[serde(with = "serde_string_map")] BTreeMap<PositionIndex, CandidateIndex>);

impl Selections {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PositionIndex, CandidateIndex)> + '_ {
        self.0.iter().map(|(p, c)| (*p, *c))
    }

    /// Does every selection name an existing position and candidate?
    pub fn fits(&self, positions: &[Position]) -> bool {
        self.iter().all(|(position, candidate)| {
            positions
                .get(position)
                .and_then(|p| p.candidate(candidate))
                .is_some()
        })
    }
}

impl FromIterator<(PositionIndex, CandidateIndex)> for Selections {
    fn from_iter<T: IntoIterator<Item = (PositionIndex, CandidateIndex)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}


#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn selections_use_string_keys_in_json() {
        let selections: Selections = [(0, 1), (2, 0)].into_iter().collect();
        let json = serde_json::to_string(&selections).unwrap();
        assert_eq!(json, r#"{"0":1,"2":0}"#);
        let back: Selections = serde_json::from_str(&json).unwrap();
        assert_eq!(back, selections);
    }

    #[test]
    fn selections_reject_non_numeric_keys() {
        assert!(serde_json::from_str::<Selections>(r#"{"zero":1}"#).is_err());
    }

    #[test]
    fn selections_must_fit_the_ballot() {
        let positions = vec![Position::president(), Position::treasurer()];
        let ok: Selections = [(0, 1), (1, 2)].into_iter().collect();
        let bad_candidate: Selections = [(0, 2)].into_iter().collect();
        let bad_position: Selections = [(2, 0)].into_iter().collect();
        assert!(ok.fits(&positions));
        assert!(!bad_candidate.fits(&positions));
        assert!(!bad_position.fits(&positions));
    }
}
