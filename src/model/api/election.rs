use chrono::{DateTime, Utc};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{election::Position, identity::Identity},
    db::election::{Election, NewElection},
};

/// An election specification, as submitted by a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    pub positions: Vec<Position>,
}

impl ElectionSpec {
    /// Validate and tidy the spec, turning it into a new election hosted by `host`.
    ///
    /// Names are trimmed and blank candidates dropped, but every position
    /// must keep a name and at least one candidate.
    pub fn into_election(self, host: &Identity) -> Result<NewElection> {
        let bad_request = |msg: String| Error::Status(Status::BadRequest, msg);

        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(bad_request("Please enter an election title".to_string()));
        }
        if self.positions.is_empty() {
            return Err(bad_request("An election needs at least one position".to_string()));
        }

        let mut positions = Vec::with_capacity(self.positions.len());
        for (i, position) in self.positions.into_iter().enumerate() {
            let name = position.name.trim().to_string();
            if name.is_empty() {
                return Err(bad_request(format!(
                    "Please enter a name for Position {}",
                    i + 1
                )));
            }
            let candidates: Vec<String> = position
                .candidates
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
            if candidates.is_empty() {
                return Err(bad_request(format!(
                    "Please add at least one candidate for {name}"
                )));
            }
            positions.push(Position { name, candidates });
        }

        Ok(NewElection::new(title, positions, host))
    }
}

/// Full public view of an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    pub id: String,
    pub title: String,
    pub positions: Vec<Position>,
    pub closed: bool,
    pub host: String,
    pub created_at: DateTime<Utc>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.to_string(),
            title: election.election.title,
            positions: election.election.positions,
            closed: election.election.closed,
            host: election.election.created_by,
            created_at: election.election.created_at,
        }
    }
}

/// A line in a host's list of their elections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    pub id: String,
    pub title: String,
    pub closed: bool,
    pub created_at: DateTime<Utc>,
    pub vote_count: u64,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.to_string(),
            title: election.election.title,
            closed: election.election.closed,
            created_at: election.election.created_at,
            vote_count: election.election.vote_count,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_is_tidied() {
        let spec = ElectionSpec {
            title: "  Club Vote ".to_string(),
            positions: vec![Position {
                name: " Chair ".to_string(),
                candidates: vec![" Ann ".to_string(), "".to_string(), "  ".to_string(), "Bo".to_string()],
            }],
        };
        let election = spec.into_election(&Identity::example_host()).unwrap();
        assert_eq!(election.title, "Club Vote");
        assert_eq!(election.positions[0].name, "Chair");
        assert_eq!(election.positions[0].candidates, vec!["Ann", "Bo"]);
        assert_eq!(election.created_by, "host@example.com");
        assert!(!election.closed);
    }

    #[test]
    fn spec_rejects_missing_parts() {
        let host = Identity::example_host();

        let mut spec = ElectionSpec::example();
        spec.title = " ".to_string();
        assert!(spec.into_election(&host).is_err());

        let mut spec = ElectionSpec::example();
        spec.positions.clear();
        assert!(spec.into_election(&host).is_err());

        let mut spec = ElectionSpec::example();
        spec.positions[1].name = String::new();
        let err = spec.into_election(&host).unwrap_err();
        assert_eq!(err.to_string(), "Please enter a name for Position 2");

        let mut spec = ElectionSpec::example();
        spec.positions[0].candidates = vec![" ".to_string()];
        assert_eq!(err_status(spec.into_election(&host)), Status::BadRequest);
    }

    fn err_status(result: Result<NewElection>) -> Status {
        result.unwrap_err().status()
    }
}
